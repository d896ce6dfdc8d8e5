use std::sync::{Arc, Mutex};
use std::time::Duration;

use astor_metrics::metrics::{Config, HttpProperties, HttpReqProperties, Measure, Metrics, Recorder};
use astor_metrics::middleware::{measure, Chain};
use astor_metrics::{
    handler_fn, serve_with_shutdown, Context, Error, Flusher, Hijacker, ResponseWriter, Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Spy {
    requests: Mutex<Vec<(HttpReqProperties, u64)>>,
}

impl Recorder for Spy {
    fn observe_http_request_duration(&self, _: &Context, _: &HttpReqProperties, _: Duration) {}

    fn observe_http_response_size(&self, _: &Context, props: &HttpReqProperties, size: u64) {
        self.requests.lock().unwrap().push((props.clone(), size));
    }

    fn add_inflight_requests(&self, _: &Context, _: &HttpProperties, _: i64) {}
}

struct TestServer {
    addr: std::net::SocketAddr,
    spy: Arc<Spy>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let spy = Arc::new(Spy::default());
        let metrics: Arc<dyn Measure> = Arc::new(
            Metrics::new(Config { use_route_pattern: true, ..Config::default() })
                .with_recorder(spy.clone()),
        );

        let router = Router::new()
            .get("/users/{id}", handler_fn(|w, _| Box::pin(async move {
                let _ = w.write(b"0123456789");
            })))
            .get("/stream", handler_fn(|w, _| Box::pin(async move {
                let _ = w.write(b"first;");
                if let Some(f) = w.flusher() {
                    f.flush();
                }
                let _ = w.write(b"second");
            })))
            .get("/panic", handler_fn(|_, _| Box::pin(async move {
                panic!("boom");
            })))
            .get("/takeover", handler_fn(|w, _| Box::pin(async move {
                let outcome = match w.hijacker().map(|h| h.hijack()) {
                    Some(Err(Error::CapabilityUnsupported(_))) => "unsupported",
                    Some(Err(_)) => "failed",
                    Some(Ok(_)) => "hijacked",
                    None => "no probe",
                };
                let _ = w.write(outcome.as_bytes());
            })))
            .get("/echo", handler_fn(|w, _| Box::pin(async move {
                w.headers_mut().insert("connection", "upgrade".parse().unwrap());
                w.headers_mut().insert("upgrade", "echo".parse().unwrap());
                w.write_header(101);
                let hijacked = match w.hijacker().map(|h| h.hijack()) {
                    Some(Ok(hijacked)) => hijacked,
                    _ => return,
                };
                let Ok(mut io) = hijacked.connection().await else { return };
                let mut buf = [0u8; 4];
                if io.read_exact(&mut buf).await.is_ok() {
                    let _ = io.write_all(&buf).await;
                }
            })));

        let app = Chain::new().with(measure::handler_provider("", metrics)).then(router);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            serve_with_shutdown(listener, app, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
        });

        Self { addr, spy, stop, task }
    }

    async fn request(&self, raw: &str) -> String {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    async fn stop(self) {
        let _ = self.stop.send(());
        self.task.await.unwrap();
    }
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
}

#[tokio::test]
async fn measures_requests_served_over_tcp() {
    let server = TestServer::start().await;

    let response = server.request(&get("/users/42")).await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.contains("0123456789"), "{response}");
    {
        let requests = server.spy.requests.lock().unwrap();
        let (props, size) = &requests[0];
        assert_eq!(props.id, "/users/{id}");
        assert_eq!(props.method, "GET");
        assert_eq!(props.code, "200");
        assert_eq!(*size, 10);
    }

    server.stop().await;
}

#[tokio::test]
async fn unknown_route_and_wrong_method() {
    let server = TestServer::start().await;

    let not_found = server.request(&get("/nowhere")).await;
    let not_allowed = server
        .request("POST /users/1 HTTP/1.1\r\nhost: localhost\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
        .await;

    assert!(not_found.starts_with("HTTP/1.1 404"), "{not_found}");
    assert!(not_allowed.starts_with("HTTP/1.1 405"), "{not_allowed}");
    assert!(not_allowed.to_ascii_lowercase().contains("allow: get"), "{not_allowed}");
    {
        let requests = server.spy.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0.id, "");
        assert_eq!(requests[1].0.code, "405");
    }

    server.stop().await;
}

#[tokio::test]
async fn flushed_and_buffered_bytes_both_arrive() {
    let server = TestServer::start().await;

    let response = server.request(&get("/stream")).await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.contains("first;"), "{response}");
    assert!(response.contains("second"), "{response}");
    assert_eq!(server.spy.requests.lock().unwrap()[0].1, 12);

    server.stop().await;
}

#[tokio::test]
async fn panicking_handler_yields_500() {
    let server = TestServer::start().await;

    let response = server.request(&get("/panic")).await;

    assert!(response.starts_with("HTTP/1.1 500"), "{response}");
    assert!(server.spy.requests.lock().unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn takeover_without_upgrade_request_is_refused() {
    let server = TestServer::start().await;

    let response = server.request(&get("/takeover")).await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.contains("unsupported"), "{response}");
    {
        let requests = server.spy.requests.lock().unwrap();
        assert_eq!(requests[0].0.id, "/takeover");
        assert_eq!(requests[0].0.code, "200");
    }

    server.stop().await;
}

#[tokio::test]
async fn hijacked_connection_echoes() {
    let server = TestServer::start().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /echo HTTP/1.1\r\nhost: localhost\r\nconnection: upgrade\r\nupgrade: echo\r\n\r\n")
        .await
        .unwrap();

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8_lossy(&head).into_owned();
    assert!(head.starts_with("HTTP/1.1 101"), "{head}");

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");

    drop(stream);
    // The measurement lands once the handler is done with the connection.
    tokio::time::sleep(Duration::from_millis(50)).await;
    {
        let requests = server.spy.requests.lock().unwrap();
        assert_eq!(requests[0].0.code, "101");
        assert_eq!(requests[0].0.id, "/echo");
    }

    server.stop().await;
}
