// Error types for the feed notifier

use std::collections::TryReserveError;

use thiserror::Error;

use crate::destination::DestinationError;
use crate::target::SyncError;

/// Result type alias for notifier operations
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Errors that stop the notifier
///
/// Everything that only affects one publish cycle is logged where it
/// happens and never surfaces here.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Destination URI could not be parsed
    #[error("Bad destination: {0}")]
    Destination(#[from] DestinationError),

    /// Sync target could not be set up or primed
    #[error("Sync target error: {0}")]
    Sync(#[from] SyncError),

    /// No room for a new event record
    #[error("Unable to store event {sequence_number}: {source}")]
    RecordAllocation {
        sequence_number: i32,
        #[source]
        source: TryReserveError,
    },
}

impl NotifierError {
    /// Create a record allocation error
    pub fn record_allocation(sequence_number: i32, source: TryReserveError) -> Self {
        NotifierError::RecordAllocation {
            sequence_number,
            source,
        }
    }

    /// Whether the error happened before any event was consumed
    pub fn is_startup(&self) -> bool {
        !matches!(self, NotifierError::RecordAllocation { .. })
    }
}
