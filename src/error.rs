use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrillError {
    #[error("Please enter your name to start.")]
    EmptyName,

    #[error("Please enter a number.")]
    InvalidAnswer(String),

    #[error("No session is running.")]
    NotRunning,

    #[error("Session is over. Start a new session to play again.")]
    SessionOver,

    #[error("Deck has no questions")]
    EmptyDeck,

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Results writer has shut down")]
    WriterClosed,
}

impl DrillError {
    /// Errors caused by what the participant typed or clicked, as opposed to
    /// storage or wiring failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DrillError::EmptyName
                | DrillError::InvalidAnswer(_)
                | DrillError::NotRunning
                | DrillError::SessionOver
        )
    }
}

pub type Result<T> = std::result::Result<T, DrillError>;
