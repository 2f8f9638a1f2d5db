// Bounded event log
//
// Records are kept ascending by sequence number and the oldest ones are
// dropped once the log grows past its capacity. Sequence numbers are not
// deduplicated: a producer that restarts its numbering gets both ranges
// merged by plain numeric order.

use std::collections::{TryReserveError, VecDeque};

use crate::record::EventRecord;

/// Default number of events kept in the feed
pub const DEFAULT_MAX_EVENTS: usize = 20;

/// Ordered, bounded collection of event records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    max_events: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl EventLog {
    /// Create an empty log holding at most `max_events` records
    ///
    /// A capacity of zero falls back to [`DEFAULT_MAX_EVENTS`].
    pub fn new(max_events: usize) -> Self {
        let max_events = if max_events == 0 {
            DEFAULT_MAX_EVENTS
        } else {
            max_events
        };

        Self {
            records: VecDeque::new(),
            max_events,
        }
    }

    /// Create a log from previously persisted records, sorted and trimmed
    pub fn hydrate(records: impl IntoIterator<Item = EventRecord>, max_events: usize) -> Self {
        let mut log = Self::new(max_events);
        for record in records {
            log.insert_sorted(record);
        }
        log.trim();
        log
    }

    /// Maximum number of records kept
    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &EventRecord> + ExactSizeIterator {
        self.records.iter()
    }

    /// Add a record and trim the log back to capacity
    ///
    /// The record lands after every record with an equal or lower sequence
    /// number, which is the tail for a monotonic producer. Fails only when
    /// no memory can be reserved for the new record.
    pub fn append(&mut self, record: EventRecord) -> Result<(), TryReserveError> {
        self.records.try_reserve(1)?;
        self.insert_sorted(record);
        self.trim();
        Ok(())
    }

    /// Drop the oldest records until the log fits its capacity
    pub fn trim(&mut self) {
        self.trim_to(self.max_events);
    }

    /// Drop the oldest records until at most `max_events` remain
    pub fn trim_to(&mut self, max_events: usize) {
        while self.records.len() > max_events {
            if let Some(dropped) = self.records.pop_front() {
                tracing::trace!(
                    sequence_number = dropped.sequence_number,
                    "Dropping oldest event"
                );
            }
        }
    }

    fn insert_sorted(&mut self, record: EventRecord) {
        let at = self
            .records
            .partition_point(|r| r.sequence_number <= record.sequence_number);
        self.records.insert(at, record);
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a EventRecord;
    type IntoIter = std::collections::vec_deque::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
