//! Single writer task for the results files.
//!
//! Every append in the process goes through one task, so rows from
//! concurrent sessions never interleave.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{DrillError, Result};
use crate::record::{AnswerRecord, ResultRecord};
use crate::storage::ResultsFile;

enum WriteRequest {
    Session(ResultRecord, oneshot::Sender<Result<()>>),
    Answer(AnswerRecord, oneshot::Sender<Result<()>>),
}

#[derive(Debug, Clone)]
pub struct ResultWriter {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl ResultWriter {
    /// Starts the writer task. It stops once every handle is dropped.
    pub fn spawn(results: ResultsFile, answers: Option<ResultsFile>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, results, answers));
        (Self { tx }, handle)
    }

    /// Resolves once the row is on disk.
    pub async fn append_session(&self, record: ResultRecord) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriteRequest::Session(record, ack))
            .map_err(|_| DrillError::WriterClosed)?;
        done.await.map_err(|_| DrillError::WriterClosed)?
    }

    pub async fn append_answer(&self, record: AnswerRecord) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriteRequest::Answer(record, ack))
            .map_err(|_| DrillError::WriterClosed)?;
        done.await.map_err(|_| DrillError::WriterClosed)?
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
    results: ResultsFile,
    answers: Option<ResultsFile>,
) {
    info!(path = %results.path().display(), "results writer started");
    if let Err(e) = results.ensure_header() {
        warn!(path = %results.path().display(), "could not prepare results file: {}", e);
    }
    if let Some(file) = &answers {
        if let Err(e) = file.ensure_header() {
            warn!(path = %file.path().display(), "could not prepare answer log: {}", e);
        }
    }

    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::Session(record, ack) => {
                let outcome = results.append_session(&record);
                match &outcome {
                    Ok(()) => debug!(name = %record.name, status = %record.status, "session saved"),
                    Err(e) => error!(name = %record.name, "Error saving session data: {}", e),
                }
                let _ = ack.send(outcome);
            }
            WriteRequest::Answer(record, ack) => {
                let outcome = match &answers {
                    Some(file) => file.append_answer(&record),
                    None => Ok(()),
                };
                if let Err(e) = &outcome {
                    error!(name = %record.name, "Error saving answer: {}", e);
                }
                let _ = ack.send(outcome);
            }
        }
    }
    info!("results writer stopped");
}
