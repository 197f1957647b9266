//! Multiplication drill engine: sessions over the 6, 7 and 8 times tables,
//! an append-only results file, and a leaderboard over finished sessions.

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod question;
pub mod record;
pub mod registry;
pub mod session;
pub mod storage;
pub mod view;
pub mod writer;

pub use config::DrillConfig;
pub use error::{DrillError, Result};
pub use leaderboard::{LeaderboardView, RankPolicy, Standing};
pub use question::{Deck, Question};
pub use record::{ResultRecord, SessionStatus};
pub use registry::{spawn_clock, SessionId, SessionRegistry};
pub use session::{Effect, Event, Machine, Phase, Rules};
pub use view::View;
pub use writer::ResultWriter;
