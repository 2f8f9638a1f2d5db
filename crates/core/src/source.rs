// Event sources
//
// The notifier waits on exactly one source. Each wait is bounded by a
// timeout and yields one of: a notification, a timeout, end of stream, or
// a failure that ends ingestion.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::record::Notification;

/// Errors that end reading from a source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading from the underlying stream failed
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be decoded
    #[error("malformed event on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of one bounded wait on a source
#[derive(Debug)]
pub enum SourceEvent {
    /// A notification was decoded
    Ready(Notification),
    /// Nothing arrived within the timeout
    Timeout,
    /// The producer closed the stream
    EndOfStream,
    /// The stream is unusable
    Failed(SourceError),
}

/// A stream of decoded notifications
#[async_trait]
pub trait EventSource: Send {
    /// Wait up to `timeout` for the next notification
    async fn next_event(&mut self, timeout: Duration) -> SourceEvent;
}

/// Notifications encoded as one JSON object per line
///
/// Keys are IPP attribute names (`notify-sequence-number`,
/// `printer-up-time`, ...). Blank lines are ignored.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl JsonLinesSource<tokio::io::BufReader<tokio::io::Stdin>> {
    /// Read notifications from the process's standard input
    pub fn stdin() -> Self {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_event(&mut self, timeout: Duration) -> SourceEvent {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // next_line is cancel safe, a partial line survives a timeout
            let next = match tokio::time::timeout_at(deadline, self.lines.next_line()).await {
                Ok(next) => next,
                Err(_) => return SourceEvent::Timeout,
            };

            let text = match next {
                Ok(Some(text)) => text,
                Ok(None) => return SourceEvent::EndOfStream,
                Err(e) => return SourceEvent::Failed(e.into()),
            };
            self.line += 1;

            if text.trim().is_empty() {
                continue;
            }

            return match serde_json::from_str(&text) {
                Ok(notification) => SourceEvent::Ready(notification),
                Err(source) => SourceEvent::Failed(SourceError::Malformed {
                    line: self.line,
                    source,
                }),
            };
        }
    }
}
