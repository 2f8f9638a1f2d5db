// Ingestion loop
//
// Owns the event log and drives the sync target:
//
//   Publishing --> Idle --> Decoding --> Updating --+
//       ^           |                               |
//       +-----------+-------------------------------+
//                   |
//                   v
//               Terminated (timeout, end of stream, source failure)
//
// A publish only happens when the log changed since the last one. Delivery
// failures are logged and retried with the next change; they never stop
// ingestion.

use std::path::Path;
use std::time::Duration;

use crate::codec;
use crate::destination::Destination;
use crate::error::{NotifierError, Result};
use crate::event_log::EventLog;
use crate::record::{EventRecord, Notification};
use crate::source::{EventSource, SourceEvent};
use crate::target::{LocalSettings, SyncTarget};

/// Loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// How long to wait for the next event before giving up
    pub idle_timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl NotifierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Why the loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No event arrived within the idle timeout
    IdleTimeout,
    /// The producer closed the stream
    EndOfStream,
    /// The stream could not be read or decoded
    SourceFailed,
}

enum State {
    Publishing,
    Idle,
    Decoding(Notification),
    Updating(EventRecord),
}

/// The feed notifier
pub struct Notifier<S> {
    source: S,
    target: SyncTarget,
    log: EventLog,
    config: NotifierConfig,
    dirty: bool,
}

impl<S: EventSource> Notifier<S> {
    /// Set up the target for `destination`, prime it and load the baseline
    ///
    /// Any failure here is fatal: nothing has been consumed yet and there
    /// is no baseline to reconcile against.
    pub async fn start(
        destination: &Destination,
        settings: &LocalSettings,
        source: S,
        config: NotifierConfig,
    ) -> Result<Self> {
        let mut target = SyncTarget::from_destination(destination, settings)?;

        tracing::debug!(
            mode = ?destination.mode(),
            feed_url = %target.feed_url(),
            max_events = destination.max_events,
            "Priming sync target"
        );

        if let Err(e) = target.prime().await {
            target.cleanup().await;
            return Err(e.into());
        }

        let log = load_baseline(target.working_copy(), destination.max_events).await;

        tracing::info!(
            feed_url = %target.feed_url(),
            events = log.len(),
            "Feed ready"
        );

        Ok(Self::new(source, target, log, config))
    }

    /// Assemble a notifier from parts
    ///
    /// An empty log starts dirty so that an (empty) feed document exists
    /// before the first event arrives.
    pub fn new(source: S, target: SyncTarget, log: EventLog, config: NotifierConfig) -> Self {
        let dirty = log.is_empty();
        Self {
            source,
            target,
            log,
            config,
            dirty,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// Whether the log changed since the last publish
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Run until the source goes idle, ends or fails
    ///
    /// The target is cleaned up on every exit path.
    pub async fn run(mut self) -> Result<Termination> {
        let mut state = State::Publishing;

        let outcome = loop {
            state = match state {
                State::Publishing => {
                    self.publish().await;
                    State::Idle
                }
                State::Idle => match self.source.next_event(self.config.idle_timeout).await {
                    SourceEvent::Ready(notification) => State::Decoding(notification),
                    SourceEvent::Timeout => {
                        tracing::error!(
                            timeout = ?self.config.idle_timeout,
                            "Timeout waiting for input on server side"
                        );
                        break Ok(Termination::IdleTimeout);
                    }
                    SourceEvent::EndOfStream => {
                        tracing::debug!("Event stream closed");
                        break Ok(Termination::EndOfStream);
                    }
                    SourceEvent::Failed(e) => {
                        tracing::debug!(error = %e, "Unable to read next event");
                        break Ok(Termination::SourceFailed);
                    }
                },
                // Notifications without the mandatory attributes are dropped silently
                State::Decoding(notification) => {
                    match EventRecord::from_notification(notification) {
                        Some(record) => State::Updating(record),
                        None => State::Idle,
                    }
                }
                State::Updating(record) => {
                    let sequence_number = record.sequence_number;
                    if let Err(e) = self.log.append(record) {
                        tracing::error!(
                            sequence_number,
                            error = %e,
                            "Unable to create event record"
                        );
                        break Err(NotifierError::record_allocation(sequence_number, e));
                    }
                    tracing::debug!(sequence_number, events = self.log.len(), "Added event");
                    self.dirty = true;
                    State::Publishing
                }
            };
        };

        self.target.cleanup().await;
        outcome
    }

    async fn publish(&mut self) {
        if !self.dirty {
            return;
        }

        match self.target.publish(&self.log).await {
            Ok(()) => self.dirty = false,
            Err(e) if e.is_staging() => {
                tracing::error!(error = %e, "Unable to write feed document");
            }
            Err(e) => {
                // Retried with the next change, not before
                tracing::error!(error = %e, "Unable to publish feed");
                self.dirty = false;
            }
        }
    }
}

/// Load the previously published feed, or start empty
async fn load_baseline(path: &Path, max_events: usize) -> EventLog {
    match codec::load_file(path).await {
        Ok(records) => EventLog::hydrate(records, max_events),
        Err(e) if e.is_no_document() => {
            tracing::debug!(path = %path.display(), "No previous feed, starting empty");
            EventLog::new(max_events)
        }
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Unable to load feed, starting empty"
            );
            EventLog::new(max_events)
        }
    }
}
