//! MCP (Model Context Protocol) client for browser automation
//!
//! Drives a `@playwright/mcp` server over stdio JSON-RPC. One connection is
//! shared by every caller and requests are serialized behind a mutex, so a
//! single browser tab is reused for the whole run.

use crate::PromoError;
use jsonrpc_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument, warn};

const SERVICE: &str = "MCP";

/// MCP client configuration
#[derive(Clone, Debug)]
pub struct McpConfig {
    /// Command used to start the MCP server
    pub server_command: Vec<String>,
    /// Run the browser without a window
    pub headless: bool,
    /// Origins the browser refuses to contact, passed as `--blocked-origins`
    pub blocked_origins: Vec<String>,
    /// Timeout for requests that carry no explicit deadline
    pub request_timeout: Duration,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_command: vec![
                "npx".to_string(),
                "-y".to_string(),
                "@playwright/mcp@latest".to_string(),
            ],
            headless: true,
            blocked_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl McpConfig {
    pub fn with_server_command(mut self, command: Vec<String>) -> Self {
        self.server_command = command;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_blocked_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_origins.extend(origins.into_iter().map(Into::into));
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Full server command line, including the flags derived from this config.
    pub fn command_line(&self) -> Vec<String> {
        let mut args = self.server_command.clone();
        if self.headless {
            args.push("--headless".to_string());
        }
        if !self.blocked_origins.is_empty() {
            args.push("--blocked-origins".to_string());
            args.push(self.blocked_origins.join(";"));
        }
        args
    }
}

/// MCP tool definition
#[derive(Debug, Serialize, Deserialize)]
struct McpTool {
    name: String,
    #[allow(dead_code)]
    #[serde(default)]
    description: String,
    #[allow(dead_code)]
    #[serde(rename = "inputSchema", default)]
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct McpRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct McpResponse {
    #[serde(flatten)]
    result: McpResult,
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum McpResult {
    Success { result: Value },
    Error { error: McpError },
}

#[derive(Debug, Deserialize)]
struct McpError {
    #[allow(dead_code)]
    code: i32,
    message: String,
}

struct McpConnection {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// MCP client for browser automation
pub struct McpClient {
    config: McpConfig,
    connection: Mutex<Option<McpConnection>>,
    request_id: AtomicU64,
    tools: Mutex<HashMap<String, McpTool>>,
}

fn service_error(message: impl Into<String>) -> PromoError {
    PromoError::ExternalServiceError {
        service: SERVICE.to_string(),
        message: message.into(),
    }
}

impl McpClient {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
            request_id: AtomicU64::new(0),
            tools: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    /// Start the MCP server and perform the protocol handshake
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), PromoError> {
        {
            let mut guard = self.connection.lock().await;
            if guard.is_some() {
                return Ok(());
            }

            let command_line = self.config.command_line();
            let (program, args) = command_line.split_first().ok_or_else(|| {
                PromoError::InvalidConfiguration("empty MCP server command".into())
            })?;
            debug!(command = ?command_line, "Starting MCP server");

            let mut child = Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| service_error(format!("Failed to start MCP server: {e}")))?;

            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!(line = %line.trim(), "MCP stderr");
                    }
                });
            }

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| service_error("No stdin available"))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| service_error("No stdout available"))?;

            *guard = Some(McpConnection {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            });
        }

        self.initialize().await
    }

    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), PromoError> {
        if let Some(mut connection) = self.connection.lock().await.take() {
            debug!("Stopping MCP server");
            if let Err(e) = connection.child.kill().await {
                warn!(error = %e, "Failed to stop MCP server");
            }
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    pub async fn has_tool(&self, name: &str) -> bool {
        self.tools.lock().await.contains_key(name)
    }

    async fn initialize(&self) -> Result<(), PromoError> {
        self.send_request(
            "initialize",
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": "sitemap-promo",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
            self.config.request_timeout,
        )
        .await?;

        self.send_notification("notifications/initialized").await?;

        let result = self
            .send_request(
                "tools/list",
                Value::Object(serde_json::Map::new()),
                self.config.request_timeout,
            )
            .await?;

        if let Some(tools) = result.get("tools").and_then(|t| t.as_array()) {
            let mut tools_map = self.tools.lock().await;
            for tool in tools {
                if let Ok(mcp_tool) = serde_json::from_value::<McpTool>(tool.clone()) {
                    tools_map.insert(mcp_tool.name.clone(), mcp_tool);
                }
            }
            debug!(count = tools_map.len(), "Discovered MCP tools");
        }

        Ok(())
    }

    async fn write_message(
        connection: &mut McpConnection,
        request: &McpRequest<'_>,
    ) -> Result<(), PromoError> {
        let mut line = serde_json::to_string(request)?;
        debug!(request = %line, "Sending MCP message");
        line.push('\n');

        connection
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| service_error(format!("Failed to write to stdin: {e}")))?;
        connection
            .stdin
            .flush()
            .await
            .map_err(|e| service_error(format!("Failed to flush stdin: {e}")))
    }

    async fn send_notification(&self, method: &str) -> Result<(), PromoError> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| service_error("MCP server not started"))?;

        let request = McpRequest {
            jsonrpc: "2.0",
            method,
            params: Value::Object(serde_json::Map::new()),
            id: None,
        };
        Self::write_message(connection, &request).await
    }

    async fn send_request(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, PromoError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| service_error("MCP server not started"))?;

        let request = McpRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: Some(id),
        };
        Self::write_message(connection, &request).await?;

        let reader = &mut connection.stdout;
        let response = timeout(deadline, async {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => return Err(service_error("MCP server closed connection")),
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        // Server notifications and stale replies are skipped
                        if let Ok(response) = serde_json::from_str::<McpResponse>(trimmed) {
                            if response.id == Some(id) {
                                return Ok(response);
                            }
                        }
                    }
                    Err(e) => return Err(service_error(format!("Failed to read from stdout: {e}"))),
                }
            }
        })
        .await
        .map_err(|_| {
            PromoError::TimeoutError(format!(
                "{method} did not answer within {} ms",
                deadline.as_millis()
            ))
        })??;

        match response.result {
            McpResult::Success { result } => Ok(result),
            McpResult::Error { error } => Err(service_error(error.message)),
        }
    }

    /// Call a tool, turning tool-level failures into errors.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        deadline: Duration,
    ) -> Result<Value, PromoError> {
        let result = self
            .send_request(
                "tools/call",
                serde_json::json!({ "name": name, "arguments": arguments }),
                deadline,
            )
            .await?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            let message = first_text(&result).unwrap_or_else(|| format!("{name} failed"));
            if message.contains("Timeout") || message.contains("timed out") {
                return Err(PromoError::TimeoutError(message));
            }
            return Err(service_error(message));
        }
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn resize(&self, width: u32, height: u32) -> Result<(), PromoError> {
        self.call_tool(
            "browser_resize",
            serde_json::json!({ "width": width, "height": height }),
            self.config.request_timeout,
        )
        .await
        .map(|_| ())
    }

    /// Open a URL, failing with `TimeoutError` when `deadline` passes first.
    #[instrument(skip(self))]
    pub async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), PromoError> {
        self.call_tool(
            "browser_navigate",
            serde_json::json!({ "url": url }),
            deadline,
        )
        .await
        .map(|_| ())
    }

    /// Evaluate a JavaScript function in the page and return its result.
    #[instrument(skip(self, script))]
    pub async fn evaluate(&self, script: &str) -> Result<Value, PromoError> {
        let result = self
            .call_tool(
                "browser_evaluate",
                serde_json::json!({ "function": script }),
                self.config.request_timeout,
            )
            .await?;

        Ok(first_text(&result)
            .map(|text| parse_tool_text(&text))
            .unwrap_or(result))
    }

    pub async fn wait_for_seconds(&self, seconds: f64) -> Result<(), PromoError> {
        self.call_tool(
            "browser_wait_for",
            serde_json::json!({ "time": seconds }),
            self.config.request_timeout + Duration::from_secs_f64(seconds),
        )
        .await
        .map(|_| ())
    }

    /// PNG bytes of the current viewport
    #[instrument(skip(self))]
    pub async fn take_screenshot(&self) -> Result<Vec<u8>, PromoError> {
        let result = self
            .call_tool(
                "browser_take_screenshot",
                serde_json::json!({ "raw": true }),
                self.config.request_timeout,
            )
            .await?;

        let data = result
            .get("content")
            .and_then(Value::as_array)
            .and_then(|items| {
                items.iter().find_map(|item| {
                    (item.get("type").and_then(Value::as_str) == Some("image"))
                        .then(|| item.get("data").and_then(Value::as_str))
                        .flatten()
                })
            })
            .ok_or_else(|| PromoError::ExtractError("No screenshot data in response".into()))?;

        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
            .map_err(|e| PromoError::ParseError(format!("Failed to decode screenshot: {e}")))
    }

    pub async fn get_page_html(&self) -> Result<String, PromoError> {
        let result = self
            .evaluate("() => document.documentElement.outerHTML")
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PromoError::ExtractError("Failed to extract page HTML".into()))
    }
}

fn first_text(result: &Value) -> Option<String> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// Decode the text block of a tool answer.
///
/// Newer servers wrap the value in a markdown report with a `### Result`
/// section; older ones return the bare JSON value.
fn parse_tool_text(text: &str) -> Value {
    let body = match text.find("### Result") {
        Some(start) => {
            let section = &text[start + "### Result".len()..];
            let end = section.find("\n###").unwrap_or(section.len());
            section[..end].trim()
        }
        None => text.trim(),
    };

    serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
