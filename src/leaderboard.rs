//! Ranked top-N view over finished sessions.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::record::{AnswerRecord, AnswerResult, ResultRecord, SessionStatus};
use crate::storage::{Loaded, ResultsFile};

pub const DEFAULT_LIMIT: usize = 10;
pub const EMPTY_MESSAGE: &str = "The leaderboard is empty. Play the quiz to add data!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankPolicy {
    /// Every completed session is a row: score descending, earliest date first.
    #[default]
    SessionBest,
    /// One row per name holding its best score; ties go to the latest date.
    PerNameMax,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub name: String,
    pub score: u32,
    pub total_questions: Option<u32>,
    /// `YYYY-MM-DD`, or `N/A` when the stored date does not parse.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LeaderboardView {
    Table(Vec<Standing>),
    Empty,
    Error(String),
}

impl LeaderboardView {
    /// Placeholder text for the non-table outcomes.
    pub fn message(&self) -> Option<String> {
        match self {
            LeaderboardView::Table(_) => None,
            LeaderboardView::Empty => Some(EMPTY_MESSAGE.to_string()),
            LeaderboardView::Error(e) => Some(format!("Error generating leaderboard: {}", e)),
        }
    }

    pub fn standings(&self) -> &[Standing] {
        match self {
            LeaderboardView::Table(rows) => rows.as_slice(),
            _ => &[],
        }
    }
}

/// A rankable row, whichever layout it came from.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    score: u32,
    total_questions: Option<u32>,
    date: Option<NaiveDate>,
}

impl Entry {
    fn from_session(record: &ResultRecord) -> Self {
        Self {
            name: record.name.trim().to_string(),
            score: record.score,
            total_questions: Some(record.total_questions),
            date: record.parsed_date(),
        }
    }
}

/// Earliest first; rows without a date sort after every dated row.
fn date_ascending(a: &Option<NaiveDate>, b: &Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Latest first; rows without a date still sort last.
fn date_descending(a: &Option<NaiveDate>, b: &Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        _ => date_ascending(a, b),
    }
}

fn session_best(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| date_ascending(&a.date, &b.date)));
    entries
}

fn per_name_max(entries: Vec<Entry>) -> Vec<Entry> {
    let mut best: Vec<Entry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        match index.get(&entry.name) {
            Some(&i) => {
                let held = &best[i];
                let better = entry.score > held.score
                    || (entry.score == held.score
                        && date_descending(&entry.date, &held.date) == Ordering::Less);
                if better {
                    best[i] = entry;
                }
            }
            None => {
                index.insert(entry.name.clone(), best.len());
                best.push(entry);
            }
        }
    }
    best.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| date_descending(&a.date, &b.date)));
    best
}

fn standings(entries: Vec<Entry>, limit: usize) -> Vec<Standing> {
    entries
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, e)| Standing {
            rank: i + 1,
            name: e.name,
            score: e.score,
            total_questions: e.total_questions,
            date: e
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        })
        .collect()
}

/// Ranks session rows. Only completed sessions are eligible.
pub fn rank_sessions(records: &[ResultRecord], policy: RankPolicy, limit: usize) -> Vec<Standing> {
    let entries: Vec<Entry> = records
        .iter()
        .filter(|r| r.status == SessionStatus::Completed)
        .map(Entry::from_session)
        .collect();
    let ordered = match policy {
        RankPolicy::SessionBest => session_best(entries),
        RankPolicy::PerNameMax => per_name_max(entries),
    };
    standings(ordered, limit)
}

/// Ranks per-answer rows by each name's best score.
///
/// Rows without a stored score count that name's correct answers so far.
pub fn rank_answers(records: &[AnswerRecord], limit: usize) -> Vec<Standing> {
    let mut running: HashMap<String, u32> = HashMap::new();
    let entries: Vec<Entry> = records
        .iter()
        .map(|r| {
            let name = r.name.trim().to_string();
            let score = match r.score {
                Some(score) => score,
                None => {
                    let count = running.entry(name.clone()).or_insert(0);
                    if r.result == AnswerResult::Correct {
                        *count += 1;
                    }
                    *count
                }
            };
            Entry {
                name,
                score,
                total_questions: None,
                date: r.parsed_date(),
            }
        })
        .collect();
    standings(per_name_max(entries), limit)
}

pub fn rank(loaded: &Loaded, policy: RankPolicy, limit: usize) -> LeaderboardView {
    let rows = match loaded {
        Loaded::Empty => return LeaderboardView::Empty,
        Loaded::Sessions(records) => rank_sessions(records, policy, limit),
        Loaded::Answers(records) => rank_answers(records, limit),
    };
    if rows.is_empty() {
        LeaderboardView::Empty
    } else {
        LeaderboardView::Table(rows)
    }
}

/// Re-reads the results file and ranks it. Read failures become
/// [`LeaderboardView::Error`].
pub fn load(file: &ResultsFile, policy: RankPolicy, limit: usize) -> LeaderboardView {
    match file.load() {
        Ok(loaded) => {
            let view = rank(&loaded, policy, limit);
            debug!(rows = view.standings().len(), "leaderboard loaded");
            view
        }
        Err(e) => {
            error!(path = %file.path().display(), "failed to read results: {}", e);
            LeaderboardView::Error(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str, date: &str, status: &str, score: u32) -> ResultRecord {
        ResultRecord {
            name: name.to_string(),
            date: date.to_string(),
            time: "12:00:00".to_string(),
            status: SessionStatus::parse(status),
            score,
            total_questions: 30,
        }
    }

    fn names(rows: &[Standing]) -> Vec<&str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn ties_break_on_earliest_date() {
        let records = vec![
            session("A", "2024-01-01", "Session Completed", 5),
            session("B", "2024-01-03", "Session Completed", 9),
            session("C", "2024-01-02", "Session Completed", 9),
        ];
        let rows = rank_sessions(&records, RankPolicy::SessionBest, DEFAULT_LIMIT);
        assert_eq!(names(&rows), vec!["C", "B", "A"]);
        assert_eq!(rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn full_ties_keep_file_order() {
        let records = vec![
            session("A", "2024-01-01", "Session Completed", 5),
            session("B", "2024-01-01", "Session Completed", 9),
            session("C", "2024-01-01", "Session Completed", 9),
        ];
        let rows = rank_sessions(&records, RankPolicy::SessionBest, DEFAULT_LIMIT);
        assert_eq!(names(&rows), vec!["B", "C", "A"]);
    }

    #[test]
    fn only_completed_sessions_rank() {
        let records = vec![
            session("A", "2024-01-01", "Session Timed Out", 29),
            session("B", "2024-01-01", "Session Completed", 3),
        ];
        let rows = rank_sessions(&records, RankPolicy::SessionBest, DEFAULT_LIMIT);
        assert_eq!(names(&rows), vec!["B"]);
    }

    #[test]
    fn limit_truncates_and_bad_dates_sort_last() {
        let mut records: Vec<ResultRecord> = (0..15)
            .map(|i| session(&format!("P{}", i), "2024-05-05", "Session Completed", 10))
            .collect();
        records.insert(0, session("Undated", "not a date", "Session Completed", 10));
        let rows = rank_sessions(&records, RankPolicy::SessionBest, DEFAULT_LIMIT);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].name, "P0");

        let all = rank_sessions(&records, RankPolicy::SessionBest, 100);
        let last = all.last().unwrap();
        assert_eq!(last.name, "Undated");
        assert_eq!(last.date, "N/A");
    }

    #[test]
    fn names_are_trimmed() {
        let records = vec![session("  Zed ", "2024-01-01", "Session Completed", 1)];
        let rows = rank_sessions(&records, RankPolicy::SessionBest, DEFAULT_LIMIT);
        assert_eq!(rows[0].name, "Zed");
        assert_eq!(rows[0].total_questions, Some(30));
    }

    #[test]
    fn per_name_max_keeps_best_score_per_name() {
        let records = vec![
            session("A", "2024-01-01", "Session Completed", 7),
            session("A", "2024-01-05", "Session Completed", 9),
            session("B", "2024-01-02", "Session Completed", 9),
            session("B", "2024-01-09", "Session Completed", 9),
            session("C", "2024-01-03", "Session Completed", 4),
        ];
        let rows = rank_sessions(&records, RankPolicy::PerNameMax, DEFAULT_LIMIT);
        assert_eq!(names(&rows), vec!["B", "A", "C"]);
        assert_eq!(rows[0].date, "2024-01-09");
        assert_eq!(rows[1].score, 9);
    }

    #[test]
    fn answer_logs_rank_by_best_running_score() {
        let answer = |name: &str, result: AnswerResult| AnswerRecord {
            name: name.to_string(),
            date: "2024-02-02".to_string(),
            time: "12:00:00".to_string(),
            question: "6 × 7 =".to_string(),
            correct_answer: 42,
            user_answer: if result == AnswerResult::Correct { 42 } else { 0 },
            result,
            score: None,
        };
        let records = vec![
            answer("Eve", AnswerResult::Correct),
            answer("Max", AnswerResult::Wrong),
            answer("Eve", AnswerResult::Correct),
            answer("Max", AnswerResult::Correct),
        ];
        let rows = rank_answers(&records, DEFAULT_LIMIT);
        assert_eq!(names(&rows), vec!["Eve", "Max"]);
        assert_eq!((rows[0].score, rows[1].score), (2, 1));
        assert_eq!(rows[0].total_questions, None);
    }

    #[test]
    fn empty_sources_render_placeholder() {
        assert_eq!(
            rank(&Loaded::Empty, RankPolicy::SessionBest, DEFAULT_LIMIT),
            LeaderboardView::Empty
        );
        let only_timeouts = Loaded::Sessions(vec![session("A", "2024-01-01", "Session Timed Out", 2)]);
        let view = rank(&only_timeouts, RankPolicy::SessionBest, DEFAULT_LIMIT);
        assert_eq!(view.message().as_deref(), Some(EMPTY_MESSAGE));
    }

    #[test]
    fn unreadable_file_renders_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let file = ResultsFile::sessions(dir.path());
        let view = load(&file, RankPolicy::SessionBest, DEFAULT_LIMIT);
        match &view {
            LeaderboardView::Error(_) => {
                assert!(view.message().unwrap().starts_with("Error generating leaderboard: "));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn header_with_extra_column_still_ranks() {
        let loaded = crate::storage::parse_contents(
            "Name,Date,Time,Session Status,Score,Total Questions,Notes\n\
             Ann,2024-01-01,10:00:00,Session Completed,20,30,\n\
             Ben,2024-01-02,10:00:00,Session Completed,25,30,retry\n",
        );
        let view = rank(&loaded, RankPolicy::SessionBest, DEFAULT_LIMIT);
        assert_eq!(names(view.standings()), vec!["Ben", "Ann"]);
    }
}
