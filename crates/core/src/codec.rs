// Feed document codec
//
// The published document is a single object with an `events` array:
//
//   {"events": [{"sequence-number": 1, "printer-state": 3, "job-state": -1,
//                "job-id": -1, "event-time": 1700000000, "job-name": "",
//                "link-url": "http://host:631/printers/p"}, ...]}
//
// Events are written oldest first. Absent integer attributes are written as
// -1 and read back as absent.

use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::event_log::EventLog;
use crate::record::EventRecord;

/// Marker written for absent integer attributes
pub const ABSENT: i64 = -1;

/// Document load/save errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// File could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Nothing to decode, e.g. a freshly created staging file
    #[error("empty document")]
    Empty,

    /// Bytes are not a JSON document
    #[error("invalid JSON document: {0}")]
    Parse(#[source] serde_json::Error),

    /// Document has no top-level `events` array
    #[error("document has no events array")]
    MissingEvents,

    /// Document could not be serialized
    #[error("unable to encode document: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    fn io(path: &Path, source: io::Error) -> Self {
        CodecError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether there simply was no previous document
    pub fn is_no_document(&self) -> bool {
        match self {
            CodecError::Empty => true,
            CodecError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct Document<'a> {
    events: Vec<Entry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Entry<'a> {
    sequence_number: i32,
    printer_state: i64,
    job_state: i64,
    job_id: i64,
    event_time: i64,
    job_name: &'a str,
    link_url: Option<&'a str>,
}

impl<'a> From<&'a EventRecord> for Entry<'a> {
    fn from(record: &'a EventRecord) -> Self {
        Self {
            sequence_number: record.sequence_number,
            printer_state: record.printer_state.map_or(ABSENT, i64::from),
            job_state: record.job_state.map_or(ABSENT, i64::from),
            job_id: record.job_id.map_or(ABSENT, i64::from),
            event_time: record.event_time,
            job_name: &record.job_name,
            link_url: record.link_url.as_deref(),
        }
    }
}

/// Encode records, oldest first, as a feed document
pub fn encode<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
) -> Result<Vec<u8>, CodecError> {
    let document = Document {
        events: records.into_iter().map(Entry::from).collect(),
    };
    serde_json::to_vec_pretty(&document).map_err(CodecError::Encode)
}

/// Decode the records of a feed document
///
/// Entries without `sequence-number`, `job-name` or `link-url` are skipped.
/// Other missing numbers read as absent (or 0 for `event-time`).
pub fn decode(bytes: &[u8]) -> Result<Vec<EventRecord>, CodecError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::Empty);
    }

    let root: Value = serde_json::from_slice(bytes).map_err(CodecError::Parse)?;
    let events = root
        .get("events")
        .and_then(Value::as_array)
        .ok_or(CodecError::MissingEvents)?;

    let mut records = Vec::with_capacity(events.len());
    for (index, entry) in events.iter().enumerate() {
        match decode_entry(entry) {
            Some(record) => records.push(record),
            None => tracing::debug!(index, "Skipping incomplete feed entry"),
        }
    }

    Ok(records)
}

fn decode_entry(entry: &Value) -> Option<EventRecord> {
    let sequence_number = entry.get("sequence-number")?;
    let job_name = entry.get("job-name")?;
    let link_url = entry.get("link-url")?;

    Some(EventRecord {
        sequence_number: number(Some(sequence_number)) as i32,
        printer_state: state(entry.get("printer-state")),
        job_id: state(entry.get("job-id")),
        job_state: state(entry.get("job-state")),
        job_name: job_name.as_str().unwrap_or_default().to_string(),
        link_url: link_url.as_str().map(str::to_string),
        event_time: number(entry.get("event-time")),
    })
}

/// JSON numbers may come back as floats from other writers
fn number(value: Option<&Value>) -> i64 {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn state(value: Option<&Value>) -> Option<i32> {
    match number(value) {
        0 | ABSENT => None,
        n => i32::try_from(n).ok(),
    }
}

/// Read and decode a feed document from disk
pub async fn load_file(path: &Path) -> Result<Vec<EventRecord>, CodecError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CodecError::io(path, e))?;
    decode(&bytes)
}

/// Encode the log and write it to `path`, replacing any previous content
pub async fn save_file(path: &Path, log: &EventLog) -> Result<(), CodecError> {
    let bytes = encode(log)?;
    write_file(path, &bytes).await
}

/// Write an encoded document to `path`
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CodecError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| CodecError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(sequence_number: i32) -> EventRecord {
        EventRecord {
            sequence_number,
            printer_state: Some(4),
            job_id: Some(100 + sequence_number),
            job_state: Some(5),
            job_name: format!("job-{}", sequence_number),
            link_url: Some("http://printhost:631/printers/lab".to_string()),
            event_time: 1_700_000_000 + i64::from(sequence_number),
        }
    }

    #[test]
    fn test_encode_layout() {
        let mut sparse = record(2);
        sparse.printer_state = None;
        sparse.job_id = None;
        sparse.job_state = None;
        sparse.job_name = String::new();
        let records = [record(1), sparse];

        let value: Value = serde_json::from_slice(&encode(&records).unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "events": [
                    {
                        "sequence-number": 1,
                        "printer-state": 4,
                        "job-state": 5,
                        "job-id": 101,
                        "event-time": 1_700_000_001,
                        "job-name": "job-1",
                        "link-url": "http://printhost:631/printers/lab"
                    },
                    {
                        "sequence-number": 2,
                        "printer-state": -1,
                        "job-state": -1,
                        "job-id": -1,
                        "event-time": 1_700_000_002,
                        "job-name": "",
                        "link-url": "http://printhost:631/printers/lab"
                    }
                ]
            })
        );
    }

    #[test]
    fn test_decode_reproduces_encoded_log() {
        let mut sparse = record(3);
        sparse.printer_state = None;
        sparse.link_url = None;
        let log = EventLog::hydrate([record(1), record(2), sparse], 20);

        let decoded = EventLog::hydrate(decode(&encode(&log).unwrap()).unwrap(), 20);

        assert_eq!(decoded, log);
    }

    #[test]
    fn test_decode_skips_incomplete_entries() {
        let bytes = serde_json::to_vec(&json!({
            "events": [
                {"sequence-number": 1, "job-name": "a", "link-url": "http://h/p"},
                {"sequence-number": 2, "job-name": "b"},
                {"sequence-number": 3, "link-url": "http://h/p"},
                {"job-name": "d", "link-url": "http://h/p"},
                {"sequence-number": 5.0, "job-name": "e", "link-url": "http://h/p",
                 "printer-state": -1, "event-time": 42}
            ]
        }))
        .unwrap();

        let records = decode(&bytes).unwrap();

        let sequence: Vec<_> = records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(sequence, vec![1, 5]);
        assert_eq!(records[0].event_time, 0);
        assert_eq!(records[1].printer_state, None);
        assert_eq!(records[1].event_time, 42);
    }

    #[test]
    fn test_decode_no_valid_entries_is_empty() {
        let bytes = br#"{"events": [{"job-name": "x"}]}"#;
        assert!(decode(bytes).unwrap().is_empty());
        assert!(decode(br#"{"events": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_broken_documents() {
        assert!(matches!(decode(b"{not json"), Err(CodecError::Parse(_))));
        assert!(matches!(
            decode(br#"{"items": []}"#),
            Err(CodecError::MissingEvents)
        ));
        assert!(matches!(
            decode(br#"{"events": {}}"#),
            Err(CodecError::MissingEvents)
        ));
        assert!(matches!(decode(b""), Err(CodecError::Empty)));
        assert!(matches!(decode(b"\n "), Err(CodecError::Empty)));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_no_document() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(err.is_no_document());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        let log = EventLog::hydrate((1..=3).map(record), 20);

        save_file(&path, &log).await.unwrap();
        let loaded = load_file(&path).await.unwrap();

        assert_eq!(loaded, log.iter().cloned().collect::<Vec<_>>());
    }
}
