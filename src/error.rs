// ⚠️ Error taxonomy - every failure the ledger can report
// Batch-level conditions abort before work starts, storage faults bubble up

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Access predicate failed; `reason` is already user-facing
    #[error("authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("ingestion invoked without any images")]
    NoAttachments,

    /// Recognition failed for one image; the batch carries on without it
    #[error("failed to process image {filename}: {reason}")]
    ImageProcessingFailed { filename: String, reason: String },

    #[error("ledger has no entries")]
    EmptyLedger,

    #[error("damage value {0} does not fit the ledger column")]
    DamageOutOfRange(u64),

    /// Storage failed part-way through a batch; the first `committed` records stay applied
    #[error("batch aborted after {committed} committed records: {source}")]
    BatchAborted {
        committed: usize,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid settings: {0}")]
    Config(#[from] serde_json::Error),

    #[error("ledger lock poisoned by a panicked writer")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// Plain text shown to whoever issued the command.
    ///
    /// Storage and IO faults collapse into one generic line so internal
    /// details never reach the chat channel.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::AuthorizationDenied { reason } => reason.clone(),
            LedgerError::NoAttachments => {
                "⚠️ Please attach 1 or more Bear Hunt screenshots.".to_string()
            }
            LedgerError::ImageProcessingFailed { filename, .. } => {
                format!("⚠️ Could not read any text from {}.", filename)
            }
            LedgerError::EmptyLedger => "⚠️ No data found.".to_string(),
            LedgerError::BatchAborted { committed, .. } => format!(
                "❌ Something went wrong while updating the event data. {} entries were saved before the failure.",
                committed
            ),
            _ => "❌ Something went wrong while updating the event data.".to_string(),
        }
    }
}
