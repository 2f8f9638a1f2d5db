// Printer Event Feed
//
// This crate keeps a bounded, ordered log of printer/job notifications and
// republishes it as a JSON feed, either to a file in the local cache
// directory or to an HTTP resource on another host.
//
// Key design decisions:
// - One producer, one log, one flow of control: no locks anywhere
// - The event source is a trait so the loop can be driven without a process
// - SyncTarget is a closed enum (Local, Remote) picked once from the destination
// - Publish failures are logged and retried with the next change, never fatal
// - The remote password lives in the remote target, not in global state

pub mod codec;
pub mod destination;
pub mod error;
pub mod event_log;
pub mod notifier;
pub mod record;
pub mod source;
pub mod target;

// Logging setup shared by binaries and tests
pub mod telemetry;

// Re-exports for convenience
pub use codec::CodecError;
pub use destination::{Destination, DestinationError, PublishMode};
pub use error::{NotifierError, Result};
pub use event_log::{EventLog, DEFAULT_MAX_EVENTS};
pub use notifier::{Notifier, NotifierConfig, Termination};
pub use record::{EventRecord, Notification};
pub use source::{EventSource, JsonLinesSource, SourceError, SourceEvent};
pub use target::{Credentials, LocalSettings, SyncError, SyncTarget};
