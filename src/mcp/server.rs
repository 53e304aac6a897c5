//! MCP server implementation that handles JSON-RPC communication
//!
//! Reads one JSON-RPC message per line, routes tool calls to the diary and
//! the coach, and writes one response per line. Only one request is served
//! at a time. While an AI tool call is pending the server keeps reading
//! input so that `notifications/cancelled` (or the input closing) can abort
//! it; anything else read meanwhile is queued and handled afterwards. A
//! queued request whose cancellation is also queued is dropped unanswered,
//! and once the input has closed queued AI calls are not started.

use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tracing::{debug, error, info, warn};

use crate::coach::{FeatureState, PendingRequest};
use crate::mcp::protocol::*;
use crate::tools::{self, *};
use crate::{DietCoachServer, ServerError};

/// What handling one message produced
enum Dispatch {
    /// Notifications and blank lines
    Silent,
    Reply(JsonRpcResponse),
    /// An AI tool call still running
    Pending { id: Value, request: PendingRequest<String> },
}

/// MCP server that handles communication with the client
pub struct McpServer {
    app: DietCoachServer,
    /// Whether the client has finished initialization
    initialized: bool,
    /// False once the input has closed; the client can no longer see replies to AI calls
    input_open: bool,
}

/// Tools that run as cancellable AI requests
const AI_TOOLS: &[&str] = &[
    "daily_report",
    "weekly_report",
    "weight_trend",
    "chat",
    "check_meal",
    "suggest_recipe",
    "shopping_list",
    "check_product",
];

impl McpServer {
    pub fn new(app: DietCoachServer) -> Self {
        Self {
            app,
            initialized: false,
            input_open: true,
        }
    }

    /// Run the MCP server, handling JSON-RPC over stdin/stdout
    pub async fn run(&mut self) -> Result<(), ServerError> {
        info!("Starting MCP server, waiting for JSON-RPC requests...");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }

    /// Serve JSON-RPC lines from `input` until it closes
    pub async fn serve<R, W>(&mut self, input: R, mut output: W) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut backlog: VecDeque<String> = VecDeque::new();
        self.input_open = true;

        loop {
            let line = match backlog.pop_front() {
                Some(line) => line,
                None if !self.input_open => break,
                None => match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("MCP server shutting down (stdin closed)");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read from stdin: {}", e);
                        break;
                    }
                },
            };

            if let Some(id) = withdraw_cancelled(&line, &mut backlog) {
                info!("Dropped request {} cancelled while queued", id);
                continue;
            }

            let response = match self.process_line(&line) {
                Dispatch::Silent => None,
                Dispatch::Reply(response) => Some(response),
                Dispatch::Pending { id, request } => {
                    Self::await_tool_call(id, request, &mut lines, &mut backlog, &mut self.input_open).await
                }
            };

            if let Some(response) = response {
                let response_str = serde_json::to_string(&response)?;
                output.write_all(response_str.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
                debug!("Sent response: {}", response_str);
            }
        }

        Ok(())
    }

    /// Wait for a pending AI call while watching the input for its cancellation
    async fn await_tool_call<R>(
        id: Value,
        mut request: PendingRequest<String>,
        lines: &mut Lines<R>,
        backlog: &mut VecDeque<String>,
        input_open: &mut bool,
    ) -> Option<JsonRpcResponse>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            tokio::select! {
                result = &mut request => {
                    return Some(tool_response(id, FeatureState::from_result(result)));
                }
                line = lines.next_line(), if *input_open => match line {
                    Ok(Some(line)) => {
                        if cancels(&line, &id) {
                            request.cancel();
                            info!("Cancelled {} request {}", request.feature(), id);
                            return None;
                        }
                        backlog.push_back(line);
                    }
                    Ok(None) | Err(_) => {
                        *input_open = false;
                        request.cancel();
                        info!("Input closed; abandoned pending {} request", request.feature());
                        return None;
                    }
                },
            }
        }
    }

    /// Process a single line of JSON-RPC input
    fn process_line(&mut self, line: &str) -> Dispatch {
        let line = line.trim();
        if line.is_empty() {
            return Dispatch::Silent;
        }

        debug!("Processing request: {}", line);

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse JSON-RPC request: {}", e);
                return Dispatch::Reply(JsonRpcResponse::error(
                    Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Invalid JSON: {}", e),
                    None,
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return match request.id {
                Some(id) => Dispatch::Reply(JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_REQUEST,
                    format!("Unsupported JSON-RPC version '{}'", request.jsonrpc),
                    None,
                )),
                None => Dispatch::Silent,
            };
        }

        match request.id {
            Some(id) => self.handle_request(id, &request.method, request.params),
            None => {
                self.handle_notification(&request.method, request.params);
                Dispatch::Silent
            }
        }
    }

    fn handle_notification(&mut self, method: &str, params: Option<Value>) {
        match method {
            "notifications/initialized" | "initialized" => {
                self.initialized = true;
                info!("MCP client initialized");
            }
            "notifications/cancelled" => {
                // Only pending AI calls can be cancelled; anything else already answered
                let request_id = params
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
                    .map(|p| p.request_id);
                debug!("Ignoring cancellation for finished request {:?}", request_id);
            }
            other => debug!("Ignoring notification '{}'", other),
        }
    }

    /// Handle a JSON-RPC request
    fn handle_request(&mut self, id: Value, method: &str, params: Option<Value>) -> Dispatch {
        let response = match method {
            "initialize" => self.handle_initialize(id, params),
            // Some clients send this as a request rather than a notification
            "initialized" => {
                self.initialized = true;
                JsonRpcResponse::success(id, Value::Null)
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => return self.handle_tools_call(id, params),
            _ => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method '{}' not found", method),
                None,
            ),
        };
        Dispatch::Reply(response)
    }

    /// Handle MCP initialization request
    fn handle_initialize(&mut self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => {
                let client = params.client_info.map(|c| c.name).unwrap_or_else(|| "unknown".to_string());
                info!("MCP client '{}' connected (protocol {})", client, params.protocol_version);
            }
            _ => info!("MCP client connected"),
        }

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: "Diet Coach MCP".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        respond(id, &result)
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": tool_definitions() }))
    }

    /// Handle tools/call request
    fn handle_tools_call(&mut self, id: Value, params: Option<Value>) -> Dispatch {
        let call: ToolCallParams = match params.map(serde_json::from_value) {
            Some(Ok(call)) => call,
            Some(Err(e)) => {
                return Dispatch::Reply(JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid parameters: {}", e),
                    None,
                ))
            }
            None => {
                return Dispatch::Reply(JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Missing parameters".to_string(),
                    None,
                ))
            }
        };

        if !self.initialized {
            debug!("Tool call '{}' before initialization completed", call.name);
        }

        if !self.input_open && AI_TOOLS.contains(&call.name.as_str()) {
            info!("Input closed; not starting queued {} request {}", call.name, id);
            return Dispatch::Silent;
        }

        match self.call_tool(&call.name, call.arguments) {
            Ok(ToolOutcome::Done(text)) => Dispatch::Reply(tool_response(id, FeatureState::Succeeded(text))),
            Ok(ToolOutcome::Pending(request)) => Dispatch::Pending { id, request },
            Err(e) => {
                warn!(code = tool_error_code(&e), "Tool '{}' failed: {}", call.name, e);
                if let ToolError::Save { source, .. } = &e {
                    error!("Store write failed: {}", source);
                }
                Dispatch::Reply(tool_response(id, FeatureState::Failed(e.to_string())))
            }
        }
    }

    /// Route a tool call to its implementation
    fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> Result<ToolOutcome, ToolError> {
        if name == "sign_out" {
            let session = self.app.sign_out()?;
            return Ok(ToolOutcome::Done(format!(
                "Signed out. New anonymous user: {}",
                session.user_id
            )));
        }

        let app = &self.app;
        let store = app.storage();
        let diary = app.diary();
        let user = diary.user_id();
        let coach = app.coach();

        let outcome = match name {
            "log_meal" => done(&tools::log_meal(store, user, args(arguments)?)?)?,
            "log_recipe" => done(&tools::log_recipe(store, user, args(arguments)?)?)?,
            "log_water" => done(&tools::log_water(store, user, args(arguments)?)?)?,
            "log_feelings" => done(&tools::log_feelings(store, user, args(arguments)?)?)?,
            "log_weight" => done(&tools::log_weight(store, user, args(arguments)?)?)?,
            "list_logs" => done(&tools::list_logs(diary, args(arguments)?)?)?,
            "list_weights" => done(&tools::list_weights(diary))?,
            "delete_log" => done(&tools::delete_log(store, user, args(arguments)?)?)?,
            "delete_weight" => done(&tools::delete_weight(store, user, args(arguments)?)?)?,
            "today_plan" => ToolOutcome::Done(tools::today_plan(coach.plan(), args(arguments)?)?),
            "daily_report" => ToolOutcome::Pending(tools::start_daily_report(coach, diary, args(arguments)?)?),
            "weekly_report" => ToolOutcome::Pending(tools::start_weekly_report(coach, diary)),
            "weight_trend" => ToolOutcome::Pending(tools::start_weight_trend(coach, diary)),
            "chat" => ToolOutcome::Pending(tools::start_chat(coach, diary, args(arguments)?)),
            "check_meal" => ToolOutcome::Pending(tools::start_check_meal(coach, args(arguments)?)),
            "suggest_recipe" => ToolOutcome::Pending(tools::start_suggest_recipe(coach, args(arguments)?)),
            "shopping_list" => ToolOutcome::Pending(tools::start_shopping_list(coach)),
            "check_product" => ToolOutcome::Pending(tools::start_check_product(coach, args(arguments)?)),
            _ => return Err(ToolError::Invalid(format!("Unknown tool: {}", name))),
        };

        Ok(outcome)
    }
}

enum ToolOutcome {
    Done(String),
    Pending(PendingRequest<String>),
}

fn args<P: DeserializeOwned>(arguments: Map<String, Value>) -> Result<P, ToolError> {
    tools::parse_arguments(arguments)
}

fn done<T: serde::Serialize>(response: &T) -> Result<ToolOutcome, ToolError> {
    Ok(ToolOutcome::Done(render_json(response)?))
}

/// Encode `result` as a success, or report why it could not be encoded
fn respond<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            error!("Failed to encode result for request {}: {}", id, e);
            JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string(), None)
        }
    }
}

fn tool_response(id: Value, state: FeatureState<String>) -> JsonRpcResponse {
    let result = match state {
        FeatureState::Succeeded(text) => ToolCallResult::success(text),
        FeatureState::Failed(message) => ToolCallResult::error(message),
    };
    respond(id, &result)
}

/// If `line` is a request whose cancellation is already queued, remove that
/// cancellation and return the request id
fn withdraw_cancelled(line: &str, backlog: &mut VecDeque<String>) -> Option<Value> {
    if backlog.is_empty() {
        return None;
    }
    let id = serde_json::from_str::<JsonRpcRequest>(line.trim()).ok()?.id?;
    let position = backlog.iter().position(|queued| cancels(queued, &id))?;
    backlog.remove(position);
    Some(id)
}

/// Whether `line` is a `notifications/cancelled` for request `id`
fn cancels(line: &str, id: &Value) -> bool {
    let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line.trim()) else {
        return false;
    };
    if request.method != "notifications/cancelled" || !request.is_notification() {
        return false;
    }
    request
        .params
        .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
        .map_or(false, |p| &p.request_id == id)
}

/// Every tool this server offers, with schemas derived from the parameter types
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new::<LogMealParams>("log_meal", "Log a meal, optionally backdated"),
        ToolDefinition::new::<LogRecipeParams>("log_recipe", "Log a recipe from suggest_recipe as a meal"),
        ToolDefinition::new::<LogWaterParams>("log_water", "Log water intake in ml"),
        ToolDefinition::new::<LogFeelingsParams>(
            "log_feelings",
            "Log skin, bloating and stool ratings, each 1 (worst) to 5 (best)",
        ),
        ToolDefinition::new::<LogWeightParams>("log_weight", "Log body weight"),
        ToolDefinition::new::<ListLogsParams>("list_logs", "List logs newest first, optionally for one day or kind"),
        ToolDefinition::new::<NoParams>("list_weights", "List weight entries oldest first"),
        ToolDefinition::new::<DeleteLogParams>("delete_log", "Delete a log; requires confirm: true"),
        ToolDefinition::new::<DeleteWeightParams>("delete_weight", "Delete a weight entry; requires confirm: true"),
        ToolDefinition::new::<TodayPlanParams>("today_plan", "Show the meal plan for today or a given weekday"),
        ToolDefinition::new::<DailyReportParams>("daily_report", "AI analysis of one day's meals, water and feelings"),
        ToolDefinition::new::<NoParams>("weekly_report", "AI insights over the last 7 days of logs"),
        ToolDefinition::new::<NoParams>("weight_trend", "AI analysis of the weight trend against recent logs"),
        ToolDefinition::new::<ChatParams>("chat", "Ask the diet coach a question; recent logs are used as memory"),
        ToolDefinition::new::<CheckMealParams>("check_meal", "Check a meal description for trigger foods"),
        ToolDefinition::new::<SuggestRecipeParams>("suggest_recipe", "Get a safe recipe for a meal idea"),
        ToolDefinition::new::<NoParams>("shopping_list", "AI shopping list for the weekly meal plan"),
        ToolDefinition::new::<CheckProductParams>("check_product", "Judge a product or ingredient list"),
        ToolDefinition::new::<NoParams>("sign_out", "Forget the anonymous identity and start a new one"),
    ]
}
