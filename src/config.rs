use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DrillError, Result};
use crate::leaderboard::{RankPolicy, DEFAULT_LIMIT};
use crate::session::Rules;

const APP_NAME: &str = "times_drill";
const ORG_NAME: &str = "practice";
const RESULTS_FILE: &str = "math_results.csv";
const CONFIG_FILE: &str = "config.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", ORG_NAME, APP_NAME)
}

/// Results file in the per-user data directory, or the working directory
/// when no home directory can be determined.
pub fn default_results_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(RESULTS_FILE))
        .unwrap_or_else(|| PathBuf::from(RESULTS_FILE))
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillConfig {
    pub results_file: PathBuf,
    /// `None` disables the countdown.
    pub time_limit_secs: Option<u32>,
    pub leaderboard_limit: usize,
    pub rank_policy: RankPolicy,
    /// Per-answer log; answers are not logged when unset.
    pub answer_log: Option<PathBuf>,
    /// Sessions untouched for this long are dropped by the clock task.
    pub session_idle_secs: u64,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            results_file: default_results_path(),
            time_limit_secs: Some(300),
            leaderboard_limit: DEFAULT_LIMIT,
            rank_policy: RankPolicy::SessionBest,
            answer_log: None,
            session_idle_secs: 1800,
        }
    }
}

impl DrillConfig {
    /// Reads a JSON config. A missing file yields the defaults and missing
    /// keys fall back to their default values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map_err(|e| DrillError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn load_or_default() -> Self {
        default_config_path()
            .and_then(|path| Self::load(&path).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DrillError::Config(format!("Failed to serialize: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn rules(&self) -> Rules {
        Rules {
            time_limit_secs: self.time_limit_secs,
            log_answers: self.answer_log.is_some(),
        }
    }
}
