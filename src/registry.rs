//! Per-participant sessions.
//!
//! Each participant gets its own [`Machine`] under an opaque session id, so
//! one participant's answers, score and countdown never leak into another's.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use rand::RngCore;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::DrillConfig;
use crate::error::{DrillError, Result};
use crate::leaderboard::{self, LeaderboardView, RankPolicy};
use crate::question::Deck;
use crate::record::{AnswerRecord, ResultRecord};
use crate::session::{parse_answer, Effect, Event, Machine, Rules};
use crate::storage::ResultsFile;
use crate::view::View;
use crate::writer::ResultWriter;

pub type SessionId = String;

/// 256 random bits rendered as 64 lowercase hex characters.
fn generate_session_id() -> SessionId {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
        .iter()
        .fold(String::with_capacity(64), |mut id, byte| {
            let _ = write!(id, "{:02x}", byte);
            id
        })
}

struct Slot {
    machine: Machine,
    last_seen: Instant,
}

impl Slot {
    fn new(rules: Rules) -> Self {
        Self {
            machine: Machine::new(rules),
            last_seen: Instant::now(),
        }
    }
}

/// Owns every open session.
///
/// Front ends should [`close`](Self::close) a session when its participant
/// leaves. Sessions nobody touches for the configured idle period are dropped
/// by [`evict_idle`](Self::evict_idle), which [`spawn_clock`] runs every tick.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Slot>>,
    rules: Rules,
    writer: ResultWriter,
    results: ResultsFile,
    policy: RankPolicy,
    limit: usize,
    idle: Duration,
    clock: fn() -> NaiveDateTime,
}

impl SessionRegistry {
    pub fn new(config: &DrillConfig, writer: ResultWriter) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            rules: config.rules(),
            writer,
            results: ResultsFile::sessions(&config.results_file),
            policy: config.rank_policy,
            limit: config.leaderboard_limit,
            idle: Duration::from_secs(config.session_idle_secs),
            clock: || Local::now().naive_local(),
        }
    }

    /// Spawns the results writer for `config` and builds a registry on top.
    pub fn with_writer(config: &DrillConfig) -> (Self, JoinHandle<()>) {
        let answers = config.answer_log.as_ref().map(ResultsFile::answers);
        let (writer, handle) =
            ResultWriter::spawn(ResultsFile::sessions(&config.results_file), answers);
        (Self::new(config, writer), handle)
    }

    /// Replaces the wall clock used to stamp records.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub async fn open(&self) -> SessionId {
        let id = generate_session_id();
        self.sessions
            .lock()
            .await
            .insert(id.clone(), Slot::new(self.rules));
        debug!(session = %id, "session opened");
        id
    }

    pub async fn close(&self, id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(id).is_some();
        if removed {
            debug!(session = %id, "session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn view(&self, id: &str) -> Result<View> {
        let sessions = self.sessions.lock().await;
        let slot = sessions
            .get(id)
            .ok_or_else(|| DrillError::UnknownSession(id.to_string()))?;
        Ok(View::render(slot.machine.phase()))
    }

    /// Applies one event to one session and persists whatever it finished.
    ///
    /// Only a rejected event is an `Err`. Once the session has moved on, save
    /// failures are reported through [`View::storage_error`] so the caller
    /// never re-sends an event that was already applied.
    pub async fn dispatch(&self, id: &str, event: Event) -> Result<View> {
        let (mut view, effects) = {
            let mut sessions = self.sessions.lock().await;
            let slot = sessions
                .get_mut(id)
                .ok_or_else(|| DrillError::UnknownSession(id.to_string()))?;
            slot.last_seen = Instant::now();
            let effects = slot.machine.apply(event)?;
            (View::render(slot.machine.phase()), effects)
        };
        let failures = self.persist(effects).await;
        if !failures.is_empty() {
            view.storage_error = Some(failures.join("; "));
        }
        Ok(view)
    }

    pub async fn start(&self, id: &str, name: &str) -> Result<View> {
        let deck = Deck::shuffled(&mut rand::thread_rng());
        self.start_with_deck(id, name, deck).await
    }

    pub async fn start_with_deck(&self, id: &str, name: &str, deck: Deck) -> Result<View> {
        self.dispatch(
            id,
            Event::Start {
                name: name.to_string(),
                deck,
            },
        )
        .await
    }

    pub async fn submit(&self, id: &str, answer: i64) -> Result<View> {
        self.dispatch(id, Event::Submit(answer)).await
    }

    /// Like [`submit`](Self::submit) but takes the raw answer box text.
    pub async fn submit_text(&self, id: &str, text: &str) -> Result<View> {
        let answer = parse_answer(text)?;
        self.submit(id, answer).await
    }

    pub async fn reset(&self, id: &str) -> Result<View> {
        self.dispatch(id, Event::Reset).await
    }

    /// One countdown second for every session. Returns how many sessions
    /// ran out of time on this tick; their rows are written even when an
    /// earlier one fails.
    pub async fn tick_all(&self) -> usize {
        let mut effects = Vec::new();
        {
            let mut sessions = self.sessions.lock().await;
            for slot in sessions.values_mut() {
                match slot.machine.tick() {
                    Ok(more) => effects.extend(more),
                    Err(e) => warn!("tick rejected: {}", e),
                }
            }
        }
        let expired = effects
            .iter()
            .filter(|e| matches!(e, Effect::Persist(_)))
            .count();
        let failures = self.persist(effects).await;
        if !failures.is_empty() {
            error!(failed = failures.len(), "could not save timed-out sessions");
        }
        expired
    }

    /// Drops sessions nobody has dispatched to within the idle period.
    /// Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        self.evict_older_than(self.idle).await
    }

    pub async fn evict_older_than(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.last_seen.elapsed() < idle);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "idle sessions dropped");
        }
        evicted
    }

    /// Re-reads the results file on the blocking pool and ranks it.
    pub async fn leaderboard(&self) -> LeaderboardView {
        let file = self.results.clone();
        let (policy, limit) = (self.policy, self.limit);
        tokio::task::spawn_blocking(move || leaderboard::load(&file, policy, limit))
            .await
            .unwrap_or_else(|e| LeaderboardView::Error(e.to_string()))
    }

    /// Attempts every effect and returns the messages of those that failed.
    async fn persist(&self, effects: Vec<Effect>) -> Vec<String> {
        let mut failures = Vec::new();
        for effect in effects {
            let at = (self.clock)();
            let outcome = match effect {
                Effect::Persist(outcome) => {
                    self.writer
                        .append_session(ResultRecord::stamp(outcome, at))
                        .await
                }
                Effect::LogAnswer(entry) => {
                    self.writer
                        .append_answer(AnswerRecord::stamp(entry, at))
                        .await
                }
            };
            if let Err(e) = outcome {
                error!("could not save result: {}", e);
                failures.push(e.to_string());
            }
        }
        failures
    }
}

/// Ticks every session once per `period` until the returned handle is aborted.
pub fn spawn_clock(registry: Arc<SessionRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let expired = registry.tick_all().await;
            if expired > 0 {
                info!(expired, "sessions timed out");
            }
            registry.evict_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_hex_and_distinct() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
