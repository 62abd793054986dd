//! Integration tests for the networking session (task ↔ stream multiplexing)

use std::time::Duration;

use pmostreaming::{
    NetworkError, NetworkingClient, ResponseInfo, StreamEvent, StreamId, StreamRequest,
    StreamingSettings,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Everything a stream received, in delivery order
struct Collected {
    response: Option<ResponseInfo>,
    body: Vec<u8>,
    result: Result<(), NetworkError>,
}

async fn collect(mut events: UnboundedReceiver<StreamEvent>) -> Collected {
    let mut response = None;
    let mut body = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("stream timed out")
            .expect("stream closed without completion");
        match event {
            StreamEvent::Response(info) => {
                assert!(response.is_none(), "response delivered twice");
                assert!(body.is_empty(), "data delivered before response");
                response = Some(info);
            }
            StreamEvent::Data(chunk) => body.extend_from_slice(&chunk),
            StreamEvent::Complete(result) => {
                return Collected {
                    response,
                    body,
                    result,
                }
            }
        }
    }
}

async fn wait_bound(client: &NetworkingClient, stream: StreamId) {
    for _ in 0..200 {
        if client.session_task(stream).is_some() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("{stream} was never bound");
}

fn client() -> NetworkingClient {
    NetworkingClient::new(&StreamingSettings::default()).unwrap()
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_each_stream_receives_its_own_task_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 3000]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'b'; 5000]))
        .mount(&server)
        .await;

    let client = client();
    let a = client.stream(StreamRequest::new(url(&server, "/a")));
    let b = client.stream(StreamRequest::new(url(&server, "/b")));
    assert_ne!(a.id(), b.id());

    let (a_events, b_events) = (a.take_events().unwrap(), b.take_events().unwrap());
    assert!(a.take_events().is_none());

    let (a_out, b_out) = tokio::join!(collect(a_events), collect(b_events));

    assert!(a_out.result.is_ok());
    assert_eq!(a_out.response.unwrap().status, 200);
    assert_eq!(a_out.body, vec![b'a'; 3000]);

    assert!(b_out.result.is_ok());
    assert_eq!(b_out.body, vec![b'b'; 5000]);

    // Les paires sont déliées à la fin de chaque tâche
    assert_eq!(client.active_streams(), 0);
    assert!(client.session_task(a.id()).is_none());
    assert_eq!(a.response().map(|info| info.status), Some(200));
}

#[tokio::test]
async fn test_requests_carry_icy_and_range_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live"))
        .and(header("icy-metadata", "1"))
        .and(header("range", "bytes=1024-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"tail".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/live")).with_range_start(1024));
    let out = collect(stream.take_events().unwrap()).await;

    assert!(out.result.is_ok());
    assert_eq!(out.response.unwrap().status, 206);
    assert_eq!(out.body, b"tail");
}

#[tokio::test]
async fn test_task_and_stream_lookups_while_running() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/slow")));
    wait_bound(&client, stream.id()).await;

    let task = client.session_task(stream.id()).unwrap();
    let found = client.data_stream(task).unwrap();
    assert_eq!(found.id(), stream.id());
    assert_eq!(client.active_streams(), 1);

    let out = collect(stream.take_events().unwrap()).await;
    assert!(out.result.is_ok());
    assert!(client.data_stream(task).is_none());
}

#[tokio::test]
async fn test_cancel_before_bind_creates_no_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/never")));
    stream.cancel();
    assert!(stream.is_cancelled());

    let out = collect(stream.take_events().unwrap()).await;
    assert!(out.response.is_none());
    assert!(matches!(out.result, Err(NetworkError::Cancelled)));
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_cancel_running_stream_completes_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/slow")));
    wait_bound(&client, stream.id()).await;
    let mut events = stream.take_events().unwrap();

    stream.cancel();
    stream.cancel();

    let first = timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert!(matches!(
        first,
        Some(StreamEvent::Complete(Err(NetworkError::Cancelled)))
    ));
    assert!(timeout(Duration::from_millis(200), events.recv()).await.is_err());
    assert_eq!(client.active_streams(), 0);
}

#[tokio::test]
async fn test_remove_unbinds_without_delivering() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/slow")));
    wait_bound(&client, stream.id()).await;
    let mut events = stream.take_events().unwrap();

    client.remove(&stream);
    assert!(client.session_task(stream.id()).is_none());
    assert_eq!(client.active_streams(), 0);

    // La fin de la tâche annulée ne trouve plus de flux
    assert!(timeout(Duration::from_millis(300), events.recv()).await.is_err());

    // Retirer un flux non lié est sans effet
    client.remove(&stream);
}

#[tokio::test]
async fn test_server_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/missing")));
    let out = collect(stream.take_events().unwrap()).await;

    assert_eq!(out.response.unwrap().status, 404);
    assert!(matches!(
        out.result,
        Err(NetworkError::ServerError { status: 404 })
    ));
}

#[tokio::test]
async fn test_transport_failure() {
    // Port libéré aussitôt réservé : la connexion est refusée
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let dead = Url::parse(&format!("http://127.0.0.1:{port}/gone")).unwrap();

    let client = client();
    let stream = client.stream(StreamRequest::new(dead));
    let out = collect(stream.take_events().unwrap()).await;

    assert!(out.response.is_none());
    assert!(matches!(out.result, Err(NetworkError::Failure(_))));
}

#[tokio::test]
async fn test_invalidated_session_refuses_new_streams() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let client = client();
    client.finish_tasks_and_invalidate();
    assert!(client.is_invalidated());

    let stream = client.stream(StreamRequest::new(url(&server, "/late")));
    let out = collect(stream.take_events().unwrap()).await;
    assert!(matches!(out.result, Err(NetworkError::Invalidated)));
}

#[tokio::test]
async fn test_running_task_finishes_after_invalidation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"done".to_vec())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/slow")));
    wait_bound(&client, stream.id()).await;
    client.finish_tasks_and_invalidate();

    let out = collect(stream.take_events().unwrap()).await;
    assert!(out.result.is_ok());
    assert_eq!(out.body, b"done");
}

#[tokio::test]
async fn test_invalidate_and_cancel_stops_running_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let client = client();
    let first = client.stream(StreamRequest::new(url(&server, "/one")));
    let second = client.stream(StreamRequest::new(url(&server, "/two")));
    wait_bound(&client, first.id()).await;
    wait_bound(&client, second.id()).await;

    client.invalidate_and_cancel();
    assert_eq!(client.active_streams(), 0);

    for stream in [first, second] {
        let out = collect(stream.take_events().unwrap()).await;
        assert!(matches!(out.result, Err(NetworkError::Cancelled)));
    }
}

#[tokio::test]
async fn test_dropped_client_lets_running_tasks_finish() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"still here".to_vec())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let client = client();
    let stream = client.stream(StreamRequest::new(url(&server, "/slow")));
    wait_bound(&client, stream.id()).await;
    drop(client);

    let out = collect(stream.take_events().unwrap()).await;
    assert!(out.result.is_ok());
    assert_eq!(out.body, b"still here");
}
