// Sync targets
//
// The feed is published either to a file in the local cache directory or
// to an HTTP resource on another host. The variant is chosen once, from the
// destination URI, and never changes for the life of the process.
//
// Both variants share the same life cycle:
//   prime    - establish the baseline document (working copy)
//   publish  - write the current log and deliver it
//   cleanup  - release staging files and connections

mod local;
mod remote;

use std::io;
use std::path::Path;

use reqwest::StatusCode;
use thiserror::Error;

use crate::codec::CodecError;
use crate::destination::{Destination, PublishMode};
use crate::event_log::EventLog;

pub use local::{LocalSettings, LocalTarget};
pub use remote::{Credentials, RemoteTarget};

/// Errors raised by sync targets
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local staging file could not be created
    #[error("Could not create temporary file: {0}")]
    StagingFile(#[source] io::Error),

    /// Cache directory could not be created
    #[error("Could not create cache directory {path}: {source}")]
    CacheDir {
        path: String,
        #[source]
        source: io::Error,
    },

    /// HTTP client could not be built
    #[error("Could not set up HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Request never got a response
    #[error("Unable to {method} {url}: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a status we cannot work with
    #[error("Unable to {method} {url}: {status}")]
    UnexpectedStatus {
        method: &'static str,
        url: String,
        status: StatusCode,
    },

    /// Document could not be written to the staging file
    #[error("Unable to stage feed document: {0}")]
    Stage(#[from] CodecError),

    /// Staged document could not replace the published one
    #[error("Unable to rename {from} to {to}: {source}")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    /// Whether the document never left the staging step
    ///
    /// Nothing was delivered, so the log is still unpublished.
    pub fn is_staging(&self) -> bool {
        matches!(self, SyncError::Stage(_))
    }
}

/// Publishing destination
#[derive(Debug)]
pub enum SyncTarget {
    Local(LocalTarget),
    Remote(RemoteTarget),
}

impl SyncTarget {
    /// Select and set up the target for a destination
    ///
    /// Local settings are only consulted for local destinations.
    pub fn from_destination(
        destination: &Destination,
        settings: &LocalSettings,
    ) -> Result<Self, SyncError> {
        match destination.mode() {
            PublishMode::Local => Ok(SyncTarget::Local(LocalTarget::new(destination, settings))),
            PublishMode::Remote => Ok(SyncTarget::Remote(RemoteTarget::new(destination)?)),
        }
    }

    /// Establish the baseline document
    pub async fn prime(&mut self) -> Result<(), SyncError> {
        match self {
            SyncTarget::Local(target) => target.prime().await,
            SyncTarget::Remote(target) => target.prime().await,
        }
    }

    /// File holding the baseline document after [`prime`](Self::prime)
    pub fn working_copy(&self) -> &Path {
        match self {
            SyncTarget::Local(target) => target.canonical(),
            SyncTarget::Remote(target) => target.staging(),
        }
    }

    /// Public URL of the feed
    pub fn feed_url(&self) -> &str {
        match self {
            SyncTarget::Local(target) => target.feed_url(),
            SyncTarget::Remote(target) => target.feed_url(),
        }
    }

    /// Write the log and deliver it
    pub async fn publish(&mut self, log: &EventLog) -> Result<(), SyncError> {
        match self {
            SyncTarget::Local(target) => target.publish(log).await,
            SyncTarget::Remote(target) => target.publish(log).await,
        }
    }

    /// Release staging files and connections
    pub async fn cleanup(self) {
        match self {
            SyncTarget::Local(_) => {}
            SyncTarget::Remote(target) => target.cleanup().await,
        }
    }
}
