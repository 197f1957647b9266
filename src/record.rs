//! Typed rows of the results file.
//!
//! Two layouts exist. The session layout holds one row per finished session
//! and feeds the leaderboard. The per-answer layout holds one row per submitted
//! answer. The header row tells them apart.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const SESSION_HEADER: [&str; 6] = [
    "Name",
    "Date",
    "Time",
    "Session Status",
    "Score",
    "Total Questions",
];

pub const ANSWER_HEADER: [&str; 8] = [
    "Name",
    "Date",
    "Time",
    "Question",
    "Correct Answer",
    "User Answer",
    "Result",
    "Score",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schema {
    Session,
    /// `with_score` is false for logs written without the trailing column.
    PerAnswer { with_score: bool },
}

impl Schema {
    pub fn detect(header: &str) -> Option<Schema> {
        Layout::detect(header).map(|layout| layout.schema())
    }

    pub fn header_line(&self) -> String {
        match self {
            Schema::Session => SESSION_HEADER.join(","),
            Schema::PerAnswer { with_score: true } => ANSWER_HEADER.join(","),
            Schema::PerAnswer { with_score: false } => ANSWER_HEADER[..7].join(","),
        }
    }
}

const SESSION_REQUIRED: [&str; 5] = ["Name", "Date", "Session Status", "Score", "Total Questions"];
const ANSWER_REQUIRED: [&str; 6] = [
    "Name",
    "Date",
    "Question",
    "Correct Answer",
    "User Answer",
    "Result",
];

/// Column positions looked up by name, so extra or reordered columns still
/// load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    index: HashMap<String, usize>,
    width: usize,
}

impl Columns {
    pub fn parse(header: &str) -> Self {
        let names: Vec<&str> = split_fields(header.trim_start_matches('\u{feff}'));
        Self::from_names(&names)
    }

    pub fn from_names(names: &[&str]) -> Self {
        let mut index = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            index.entry(unquote(name).to_string()).or_insert(i);
        }
        Self {
            index,
            width: names.len(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn has_all(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.index.contains_key(*n))
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn field<'a>(&self, fields: &[&'a str], name: &str) -> Option<&'a str> {
        self.index.get(name).and_then(|&i| fields.get(i)).map(|&f| unquote(f))
    }
}

/// A recognised header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Session(Columns),
    PerAnswer(Columns),
}

impl Layout {
    pub fn detect(header: &str) -> Option<Layout> {
        let columns = Columns::parse(header);
        if columns.has_all(&SESSION_REQUIRED) {
            Some(Layout::Session(columns))
        } else if columns.has_all(&ANSWER_REQUIRED) {
            Some(Layout::PerAnswer(columns))
        } else {
            None
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            Layout::Session(_) => Schema::Session,
            Layout::PerAnswer(columns) => Schema::PerAnswer {
                with_score: columns.has("Score"),
            },
        }
    }
}

pub fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Completed,
    TimedOut,
    Other(String),
}

impl SessionStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "Session Completed" => SessionStatus::Completed,
            "Session Timed Out" => SessionStatus::TimedOut,
            other => SessionStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Completed => f.write_str("Session Completed"),
            SessionStatus::TimedOut => f.write_str("Session Timed Out"),
            SessionStatus::Other(s) => f.write_str(s),
        }
    }
}

/// What a finished session reports before it is stamped with a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub name: String,
    pub status: SessionStatus,
    pub score: u32,
    pub total_questions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub date: String,
    pub time: String,
    pub status: SessionStatus,
    pub score: u32,
    pub total_questions: u32,
}

impl ResultRecord {
    pub fn stamp(outcome: SessionOutcome, at: NaiveDateTime) -> Self {
        Self {
            name: outcome.name,
            date: at.format(DATE_FORMAT).to_string(),
            time: at.format(TIME_FORMAT).to_string(),
            status: outcome.status,
            score: outcome.score,
            total_questions: outcome.total_questions,
        }
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            sanitize_field(&self.name),
            self.date,
            self.time,
            sanitize_field(&self.status.to_string()),
            self.score,
            self.total_questions
        )
    }

    /// Parses a row written in the default six-column layout.
    pub fn from_csv_line(line: &str) -> Option<Self> {
        Self::from_fields(&split_fields(line), &Columns::from_names(&SESSION_HEADER))
    }

    /// `None` for rows whose width differs from the header or whose counts
    /// are not numbers.
    pub fn from_fields(fields: &[&str], columns: &Columns) -> Option<Self> {
        if fields.len() != columns.width() {
            return None;
        }
        Some(Self {
            name: columns.field(fields, "Name")?.to_string(),
            date: columns.field(fields, "Date")?.to_string(),
            time: columns.field(fields, "Time").unwrap_or_default().to_string(),
            status: SessionStatus::parse(columns.field(fields, "Session Status")?),
            score: columns.field(fields, "Score")?.parse().ok()?,
            total_questions: columns.field(fields, "Total Questions")?.parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerResult {
    Correct,
    Wrong,
}

impl AnswerResult {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Correct" => Some(AnswerResult::Correct),
            "Wrong" => Some(AnswerResult::Wrong),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerResult::Correct => f.write_str("Correct"),
            AnswerResult::Wrong => f.write_str("Wrong"),
        }
    }
}

/// A single submitted answer, before it is stamped with a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub name: String,
    pub question: String,
    pub correct_answer: i64,
    pub user_answer: i64,
    pub result: AnswerResult,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub name: String,
    pub date: String,
    pub time: String,
    pub question: String,
    pub correct_answer: i64,
    pub user_answer: i64,
    pub result: AnswerResult,
    pub score: Option<u32>,
}

impl AnswerRecord {
    pub fn stamp(entry: AnswerEntry, at: NaiveDateTime) -> Self {
        Self {
            name: entry.name,
            date: at.format(DATE_FORMAT).to_string(),
            time: at.format(TIME_FORMAT).to_string(),
            question: entry.question,
            correct_answer: entry.correct_answer,
            user_answer: entry.user_answer,
            result: entry.result,
            score: Some(entry.score),
        }
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    pub fn to_csv_line(&self) -> String {
        let mut line = format!(
            "{},{},{},{},{},{},{}",
            sanitize_field(&self.name),
            self.date,
            self.time,
            sanitize_field(&self.question),
            self.correct_answer,
            self.user_answer,
            self.result
        );
        if let Some(score) = self.score {
            line.push_str(&format!(",{}", score));
        }
        line
    }

    pub fn from_csv_line(line: &str, with_score: bool) -> Option<Self> {
        let names = if with_score {
            &ANSWER_HEADER[..]
        } else {
            &ANSWER_HEADER[..7]
        };
        Self::from_fields(&split_fields(line), &Columns::from_names(names))
    }

    pub fn from_fields(fields: &[&str], columns: &Columns) -> Option<Self> {
        if fields.len() != columns.width() {
            return None;
        }
        let score = if columns.has("Score") {
            Some(columns.field(fields, "Score")?.parse().ok()?)
        } else {
            None
        };
        Some(Self {
            name: columns.field(fields, "Name")?.to_string(),
            date: columns.field(fields, "Date")?.to_string(),
            time: columns.field(fields, "Time").unwrap_or_default().to_string(),
            question: columns.field(fields, "Question")?.to_string(),
            correct_answer: columns.field(fields, "Correct Answer")?.parse().ok()?,
            user_answer: columns.field(fields, "User Answer")?.parse().ok()?,
            result: AnswerResult::parse(columns.field(fields, "Result")?)?,
            score,
        })
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Keeps a free-text value inside a single CSV field.
fn sanitize_field(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, ',' | '\n' | '\r') { ' ' } else { c })
        .collect()
}
