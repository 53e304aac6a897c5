/// The Gemini client over real HTTP against a scripted local server
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use diet_coach::gemini::{AiError, Delay, GeminiClient, ReqwestTransport, RequestExecutor, RetryPolicy};

#[derive(Default)]
struct RecordingDelay {
    waits: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Answer one connection per scripted reply, closing each afterwards.
/// Returns the request lines that were received.
async fn serve_script(listener: TcpListener, script: Vec<(u16, &'static str, String)>) -> Vec<String> {
    let mut request_lines = Vec::new();
    for (status, reason, body) in script {
        let (mut stream, _) = listener.accept().await.unwrap();
        request_lines.push(read_request(&mut stream).await);

        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }
    request_lines
}

/// Read headers and body of one request; returns its request line
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    head.lines().next().unwrap_or_default().to_string()
}

fn client_for(addr: std::net::SocketAddr, delay: Arc<RecordingDelay>) -> GeminiClient {
    let transport = ReqwestTransport::new(Some(Duration::from_secs(10))).unwrap();
    let policy = RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(50),
    };
    GeminiClient::new(
        RequestExecutor::with_delay(Arc::new(transport), delay, policy),
        format!("http://{}", addr),
        "test-model",
        "test-key",
    )
}

fn candidate(text: &str) -> String {
    serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
}

#[tokio::test]
async fn test_server_errors_are_retried_over_http() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_script(
        listener,
        vec![
            (500, "Internal Server Error", String::new()),
            (500, "Internal Server Error", String::new()),
            (200, "OK", candidate("<p>Looks balanced.</p>")),
        ],
    ));

    let delay = Arc::new(RecordingDelay::default());
    let client = client_for(addr, delay.clone());

    let text = client.generate_text("system", "user").await.unwrap();
    assert_eq!(text, "<p>Looks balanced.</p>");

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|line| line.starts_with("POST /models/test-model:generateContent?key=test-key ")));
    assert_eq!(
        *delay.waits.lock().unwrap(),
        vec![Duration::from_millis(50), Duration::from_millis(100)]
    );
}

#[tokio::test]
async fn test_client_error_message_comes_from_body() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_script(
        listener,
        vec![(
            400,
            "Bad Request",
            r#"{"error":{"message":"API key not valid."}}"#.to_string(),
        )],
    ));

    let delay = Arc::new(RecordingDelay::default());
    let client = client_for(addr, delay.clone());

    let err = client.generate_text("system", "user").await.unwrap_err();
    match err {
        AiError::Http { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid.");
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert_eq!(server.await.unwrap().len(), 1);
    assert!(delay.waits.lock().unwrap().is_empty());
}
