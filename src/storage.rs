use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::record::{split_fields, AnswerRecord, Layout, ResultRecord, Schema};

/// Rows read back from a results file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    /// Missing file, blank file, or a header naming neither layout.
    Empty,
    Sessions(Vec<ResultRecord>),
    Answers(Vec<AnswerRecord>),
}

/// Append-only CSV file with a mandatory header row.
#[derive(Debug, Clone)]
pub struct ResultsFile {
    path: PathBuf,
    schema: Schema,
}

impl ResultsFile {
    pub fn new(path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    pub fn sessions(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Schema::Session)
    }

    pub fn answers(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Schema::PerAnswer { with_score: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Writes the header when the file is missing or empty.
    pub fn ensure_header(&self) -> Result<()> {
        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if !needs_header {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", self.schema.header_line())?;
        debug!(path = %self.path.display(), "created results file");
        Ok(())
    }

    pub fn append_session(&self, record: &ResultRecord) -> Result<()> {
        self.append_line(&record.to_csv_line())
    }

    pub fn append_answer(&self, record: &AnswerRecord) -> Result<()> {
        self.append_line(&record.to_csv_line())
    }

    fn append_line(&self, line: &str) -> Result<()> {
        self.ensure_header()?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Reads every well-formed row, skipping the rest.
    pub fn load(&self) -> Result<Loaded> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Loaded::Empty),
            Err(e) => return Err(e.into()),
        };
        Ok(parse_contents(&String::from_utf8_lossy(&bytes)))
    }
}

pub fn parse_contents(contents: &str) -> Loaded {
    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Loaded::Empty;
    };
    let Some(layout) = Layout::detect(header) else {
        warn!(header, "results file header names no known layout");
        return Loaded::Empty;
    };

    let mut skipped = 0usize;
    let loaded = match layout {
        Layout::Session(columns) => Loaded::Sessions(
            lines
                .filter_map(|line| {
                    counted(ResultRecord::from_fields(&split_fields(line), &columns), &mut skipped)
                })
                .collect(),
        ),
        Layout::PerAnswer(columns) => Loaded::Answers(
            lines
                .filter_map(|line| {
                    counted(AnswerRecord::from_fields(&split_fields(line), &columns), &mut skipped)
                })
                .collect(),
        ),
    };
    if skipped > 0 {
        debug!(skipped, "skipped malformed result rows");
    }
    loaded
}

fn counted<T>(parsed: Option<T>, skipped: &mut usize) -> Option<T> {
    if parsed.is_none() {
        *skipped += 1;
    }
    parsed
}
