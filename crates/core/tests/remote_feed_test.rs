// Integration tests for publishing to a remote HTTP server
//
// A wiremock server plays the feed host. Events are fed through the
// JSON-lines source, exactly as the binary reads them from stdin.
//
// Run with: cargo test -p httpfeed-core --test remote_feed_test

use std::io::Cursor;

use httpfeed_core::{
    codec, Destination, JsonLinesSource, LocalSettings, Notifier, NotifierConfig, NotifierError,
    SyncError, Termination,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const FEED_PATH: &str = "/notifications/sub1";

fn event_line(sequence_number: i32) -> String {
    let event = json!({
        "notify-sequence-number": sequence_number,
        "printer-up-time": 1_700_000_000 + sequence_number,
        "notify-printer-uri": "ipp://printserver/printers/lab",
        "printer-state": 4,
        "job-state": 5,
        "notify-job-id": 100 + sequence_number,
        "job-name": format!("job-{}", sequence_number),
    });
    format!("{}\n", event)
}

fn events(sequence_numbers: impl IntoIterator<Item = i32>) -> Vec<u8> {
    sequence_numbers
        .into_iter()
        .map(event_line)
        .collect::<String>()
        .into_bytes()
}

async fn puts(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .collect()
}

fn published(request: &Request) -> Vec<i32> {
    codec::decode(&request.body)
        .unwrap()
        .iter()
        .map(|r| r.sequence_number)
        .collect()
}

type Source = JsonLinesSource<Cursor<Vec<u8>>>;

async fn notifier(uri: &str, input: Vec<u8>) -> Result<Notifier<Source>, NotifierError> {
    let destination = Destination::parse(uri).unwrap();
    Notifier::start(
        &destination,
        &LocalSettings::default(),
        JsonLinesSource::new(Cursor::new(input)),
        NotifierConfig::default(),
    )
    .await
}

#[tokio::test]
async fn test_remote_feed_keeps_latest_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(FEED_PATH))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let uri = format!("{}{}?max_events=2", server.uri(), FEED_PATH);
    let notifier = notifier(&uri, events(1..=3)).await.unwrap();
    assert!(notifier.log().is_empty());
    let staging = notifier.target().working_copy().to_path_buf();
    assert!(staging.exists());

    assert_eq!(notifier.run().await.unwrap(), Termination::EndOfStream);
    assert!(!staging.exists());

    let puts = puts(&server).await;
    // Empty feed at startup, then one publish per event
    assert_eq!(puts.len(), 4);
    assert!(published(&puts[0]).is_empty());
    assert_eq!(published(&puts[3]), vec![2, 3]);
}

#[tokio::test]
async fn test_remote_baseline_is_merged() {
    let server = MockServer::start().await;
    let baseline = json!({
        "events": [
            {"sequence-number": 1, "printer-state": 3, "job-state": -1, "job-id": -1,
             "event-time": 10, "job-name": "", "link-url": "http://printserver:631/printers/lab"},
            {"sequence-number": 2, "printer-state": 3, "job-state": -1, "job-id": -1,
             "event-time": 11, "job-name": "", "link-url": "http://printserver:631/printers/lab"}
        ]
    });
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(baseline))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let uri = format!("{}{}", server.uri(), FEED_PATH);
    let notifier = notifier(&uri, events([3])).await.unwrap();
    assert_eq!(notifier.log().len(), 2);
    assert!(!notifier.is_dirty());

    notifier.run().await.unwrap();

    let puts = puts(&server).await;
    assert_eq!(puts.len(), 1);
    assert_eq!(published(&puts[0]), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_remote_server_error_is_fatal_at_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = format!("{}{}", server.uri(), FEED_PATH);
    let err = notifier(&uri, events(1..=2)).await.err().unwrap();
    assert!(err.is_startup());

    match err {
        NotifierError::Sync(SyncError::UnexpectedStatus { method, status, .. }) => {
            assert_eq!(method, "GET");
            assert_eq!(status.as_u16(), 500);
        }
        other => panic!("expected GET status error, got {:?}", other),
    }
    assert!(puts(&server).await.is_empty());
}

#[tokio::test]
async fn test_unreachable_host_is_fatal_at_startup() {
    // Bind and drop a listener to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let uri = format!("http://127.0.0.1:{}{}", port, FEED_PATH);

    let err = notifier(&uri, events([1])).await.err().unwrap();
    assert!(matches!(
        err,
        NotifierError::Sync(SyncError::Transport { method: "GET", .. })
    ));
}

#[tokio::test]
async fn test_failed_put_does_not_stop_ingestion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let uri = format!("{}{}", server.uri(), FEED_PATH);
    let notifier = notifier(&uri, events(1..=3)).await.unwrap();

    assert_eq!(notifier.run().await.unwrap(), Termination::EndOfStream);

    let puts = puts(&server).await;
    // Startup publish and event 1 are rejected; events 2 and 3 still go out
    assert_eq!(puts.len(), 4);
    assert_eq!(published(&puts[1]), vec![1]);
    assert_eq!(published(&puts[3]), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_password_answers_authentication_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(header("authorization", "Basic ZmVlZDpwdw=="))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let base = server.uri().replacen("http://", "http://feed:pw@", 1);
    let uri = format!("{}{}", base, FEED_PATH);
    let notifier = notifier(&uri, events([1])).await.unwrap();

    notifier.run().await.unwrap();

    let puts = puts(&server).await;
    // Only the first publish is challenged; later ones send credentials up front
    assert_eq!(puts.len(), 3);
    assert!(puts[0].headers.get("authorization").is_none());
    assert!(puts[1].headers.get("authorization").is_some());
    assert!(puts[2].headers.get("authorization").is_some());
    assert_eq!(published(&puts[2]), vec![1]);
}

#[tokio::test]
async fn test_encoded_password_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    // feed:p@ss
    Mock::given(method("PUT"))
        .and(header("authorization", "Basic ZmVlZDpwQHNz"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let base = server.uri().replacen("http://", "http://feed:p%40ss@", 1);
    let uri = format!("{}{}", base, FEED_PATH);
    notifier(&uri, Vec::new()).await.unwrap().run().await.unwrap();

    let puts = puts(&server).await;
    assert_eq!(puts.len(), 2);
    assert_eq!(
        puts[1].headers.get("authorization").unwrap(),
        "Basic ZmVlZDpwQHNz"
    );
}
