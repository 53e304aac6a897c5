/// End-to-end MCP sessions over in-memory pipes
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::Notify;

use diet_coach::gemini::{AiError, GeminiClient, HttpReply, RequestExecutor, RetryPolicy, Transport};
use diet_coach::mcp::McpServer;
use diet_coach::{Coach, DietCoachServer, SqliteStorage};

/// Answers every request with the same model text and keeps the payloads
struct CannedModel {
    text: &'static str,
    payloads: Mutex<Vec<Value>>,
}

#[async_trait]
impl Transport for CannedModel {
    async fn post_json(&self, _url: &str, payload: &Value) -> Result<HttpReply, AiError> {
        self.payloads.lock().unwrap().push(payload.clone());
        let body = json!({"candidates": [{"content": {"parts": [{"text": self.text}]}}]});
        Ok(HttpReply {
            status: 200,
            reason: Some("OK".to_string()),
            body: body.to_string(),
        })
    }
}

/// Never answers
struct HangingModel;

#[async_trait]
impl Transport for HangingModel {
    async fn post_json(&self, _url: &str, _payload: &Value) -> Result<HttpReply, AiError> {
        std::future::pending().await
    }
}

/// Answers after a short pause
struct SlowModel;

#[async_trait]
impl Transport for SlowModel {
    async fn post_json(&self, _url: &str, _payload: &Value) -> Result<HttpReply, AiError> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let body = json!({"candidates": [{"content": {"parts": [{"text": "<p>Done.</p>"}]}}]});
        Ok(HttpReply {
            status: 200,
            reason: Some("OK".to_string()),
            body: body.to_string(),
        })
    }
}

/// Counts requests and never answers them
#[derive(Default)]
struct StallingModel {
    calls: AtomicUsize,
    started: Notify,
}

#[async_trait]
impl Transport for StallingModel {
    async fn post_json(&self, _url: &str, _payload: &Value) -> Result<HttpReply, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        std::future::pending().await
    }
}

fn server_with(transport: Arc<dyn Transport>) -> DietCoachServer {
    let policy = RetryPolicy {
        max_retries: 0,
        initial_delay: Duration::from_millis(1),
    };
    let client = GeminiClient::new(
        RequestExecutor::new(transport, policy),
        "http://ai.test",
        "test-model",
        "test-key",
    );
    let storage = Arc::new(SqliteStorage::in_memory("test-app").unwrap());
    DietCoachServer::with_coach(storage, Coach::new(client)).unwrap()
}

struct Client {
    input: Option<DuplexStream>,
    output: Lines<BufReader<DuplexStream>>,
}

impl Client {
    async fn send(&mut self, message: Value) {
        let input = self.input.as_mut().unwrap();
        input.write_all(format!("{}\n", message).as_bytes()).await.unwrap();
        input.flush().await.unwrap();
    }

    async fn receive(&mut self) -> Option<Value> {
        let line = self.output.next_line().await.unwrap()?;
        Some(serde_json::from_str(&line).unwrap())
    }

    async fn start_call(&mut self, id: u64, name: &str, arguments: Value) {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }))
        .await;
    }

    async fn call(&mut self, id: u64, name: &str, arguments: Value) -> Value {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }))
        .await;
        let response = self.receive().await.unwrap();
        assert_eq!(response["id"], id);
        response["result"].clone()
    }

    fn close(&mut self) {
        self.input = None;
    }
}

/// Wire a server to a client through two pipes
fn connect() -> (Client, DuplexStream, DuplexStream) {
    let (client_input, server_input) = tokio::io::duplex(64 * 1024);
    let (server_output, client_output) = tokio::io::duplex(64 * 1024);
    let client = Client {
        input: Some(client_input),
        output: BufReader::new(client_output).lines(),
    };
    (client, server_input, server_output)
}

fn text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_full_session() {
    let model = Arc::new(CannedModel {
        text: "<p>Add some greens to dinner.</p>",
        payloads: Mutex::new(Vec::new()),
    });
    let mut server = McpServer::new(server_with(model.clone()));
    let (mut client, server_input, server_output) = connect();

    let session = async move {
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {"protocolVersion": "2024-11-05", "clientInfo": {"name": "test-client"}}
            }))
            .await;
        let init = client.receive().await.unwrap();
        assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(init["result"]["serverInfo"]["name"], "Diet Coach MCP");

        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;

        client.send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        let list = client.receive().await.unwrap();
        assert_eq!(list["id"], 2);
        let tools = list["result"]["tools"].as_array().unwrap();
        let log_meal = tools.iter().find(|t| t["name"] == "log_meal").unwrap();
        assert_eq!(log_meal["inputSchema"]["required"], json!(["description"]));

        let logged = client
            .call(3, "log_meal", json!({"description": "Grilled salmon with rice"}))
            .await;
        assert_eq!(logged["isError"], false);
        let body: Value = serde_json::from_str(text(&logged)).unwrap();
        assert_eq!(body["log"]["type"], "meal");
        let log_id = body["log"]["id"].as_str().unwrap().to_string();

        let answer = client.call(4, "chat", json!({"question": "How was my week?"})).await;
        assert_eq!(answer["isError"], false);
        assert_eq!(text(&answer), "<p>Add some greens to dinner.</p>");

        let refused = client.call(5, "delete_log", json!({"log_id": log_id})).await;
        assert_eq!(refused["isError"], true);
        assert!(text(&refused).contains("confirm"));

        let deleted = client
            .call(6, "delete_log", json!({"log_id": log_id, "confirm": true}))
            .await;
        assert_eq!(deleted["isError"], false);

        let listed = client.call(7, "list_logs", json!({})).await;
        let body: Value = serde_json::from_str(text(&listed)).unwrap();
        assert!(body["logs"].as_array().unwrap().is_empty());

        let invalid = client.call(8, "log_water", json!({"amount": -5})).await;
        assert_eq!(invalid["isError"], true);
        assert_eq!(text(&invalid), "Please enter a valid water amount in ml.");

        client.send(json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"})).await;
        let unknown = client.receive().await.unwrap();
        assert_eq!(unknown["error"]["code"], -32601);

        client.close();
        assert!(client.receive().await.is_none());
    };

    let (served, ()) = tokio::join!(server.serve(BufReader::new(server_input), server_output), session);
    served.unwrap();

    // The chat prompt was built from the live diary, which already held the meal
    let payloads = model.payloads.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    let prompt = payloads[0]["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Grilled salmon with rice"));
    assert!(prompt.contains("How was my week?"));
}

#[tokio::test]
async fn test_cancelled_call_gets_no_response() {
    let mut server = McpServer::new(server_with(Arc::new(HangingModel)));
    let (mut client, server_input, server_output) = connect();

    let session = async move {
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "shopping_list", "arguments": {}}
            }))
            .await;
        client
            .send(json!({
                "jsonrpc": "2.0",
                "method": "notifications/cancelled",
                "params": {"requestId": 1, "reason": "user gave up"}
            }))
            .await;
        client.send(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await;

        // The first thing back is the ping; request 1 is never answered
        let next = client.receive().await.unwrap();
        assert_eq!(next["id"], 2);

        // Closing the input abandons a call still in flight
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "check_product", "arguments": {"product": "soy sauce"}}
            }))
            .await;
        client.close();
        assert!(client.receive().await.is_none());
    };

    let (served, ()) = tokio::join!(server.serve(BufReader::new(server_input), server_output), session);
    served.unwrap();
}

#[tokio::test]
async fn test_requests_queued_behind_a_pending_call_are_answered_in_order() {
    let model = Arc::new(CannedModel {
        text: "<ul><li>Rice</li></ul>",
        payloads: Mutex::new(Vec::new()),
    });
    let mut server = McpServer::new(server_with(model));
    let (mut client, server_input, server_output) = connect();

    let session = async move {
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": "list",
                "method": "tools/call",
                "params": {"name": "shopping_list", "arguments": {}}
            }))
            .await;
        client.send(json!({"jsonrpc": "2.0", "id": "ping", "method": "ping"})).await;

        let first = client.receive().await.unwrap();
        assert_eq!(first["id"], "list");
        assert_eq!(text(&first["result"]), "<ul><li>Rice</li></ul>");

        let second = client.receive().await.unwrap();
        assert_eq!(second["id"], "ping");

        client.close();
        assert!(client.receive().await.is_none());
    };

    let (served, ()) = tokio::join!(server.serve(BufReader::new(server_input), server_output), session);
    served.unwrap();
}

#[tokio::test]
async fn test_call_cancelled_while_queued_gets_no_response() {
    let mut server = McpServer::new(server_with(Arc::new(SlowModel)));
    let (mut client, server_input, server_output) = connect();

    let session = async move {
        client.start_call(1, "shopping_list", json!({})).await;
        client.start_call(2, "shopping_list", json!({})).await;
        client
            .send(json!({
                "jsonrpc": "2.0",
                "method": "notifications/cancelled",
                "params": {"requestId": 2}
            }))
            .await;
        client.send(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).await;

        let first = client.receive().await.unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(text(&first["result"]), "<p>Done.</p>");

        // Request 2 was cancelled before it started, so the ping comes next
        let second = client.receive().await.unwrap();
        assert_eq!(second["id"], 3);

        client.close();
        assert!(client.receive().await.is_none());
    };

    let (served, ()) = tokio::join!(server.serve(BufReader::new(server_input), server_output), session);
    served.unwrap();
}

#[tokio::test]
async fn test_queued_ai_call_is_not_started_after_input_closes() {
    let model = Arc::new(StallingModel::default());
    let mut server = McpServer::new(server_with(model.clone()));
    let (mut client, server_input, server_output) = connect();

    let started = model.clone();
    let session = async move {
        client.start_call(1, "shopping_list", json!({})).await;
        started.started.notified().await;

        client
            .start_call(2, "check_product", json!({"product": "soy sauce"}))
            .await;
        client.send(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).await;
        client.close();

        // Only the queued ping is still answered
        let reply = client.receive().await.unwrap();
        assert_eq!(reply["id"], 3);
        assert!(client.receive().await.is_none());
    };

    let (served, ()) = tokio::join!(server.serve(BufReader::new(server_input), server_output), session);
    served.unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}
