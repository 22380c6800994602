//! MCP server implementation: session lifecycle and method dispatch.
//!
//! Each session (one stdio stream or one TCP connection) owns an
//! [`McpServer`] and goes through two states:
//!
//! 1. **Uninitialised**: only `initialize` is accepted
//! 2. **Ready**: tools, prompts, and completion requests are served
//!
//! The registry and field configuration live in a shared, read-only
//! [`ServerContext`]; the only mutable state of a session is its lifecycle
//! flag.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::mcp::handler::{PromptResult, ToolCallResult, MAX_COMPLETION_VALUES};
use crate::mcp::protocol::{
    parse_message, ErrorCode, ErrorObject, JsonRpcRequest, JsonRpcResponse,
    MCP_PROTOCOL_VERSION, SERVER_NAME, SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::mcp::registry::CapabilityRegistry;
use crate::mcp::transport::{LineTransport, StdioTransport, TcpTransport};

/// Instructions returned to the client during initialisation.
const INSTRUCTIONS: &str = "Tools map friendly work item field names (title, priority, ...) to \
     Azure DevOps reference names, convert values, and check required fields. \
     Use describe_field or list_required_fields before preparing a work item.";

/// Session state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for initialize request.
    Uninitialized,
    /// Initialised with the negotiated protocol version.
    Ready {
        /// Protocol version agreed with the client.
        protocol_version: &'static str,
    },
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListCapabilities>,
    /// Prompt-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListCapabilities>,
    /// Argument completion support.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionCapabilities>,
}

impl ServerCapabilities {
    /// Advertises the capability classes the registry can serve.
    #[must_use]
    pub fn for_registry(registry: &CapabilityRegistry) -> Self {
        Self {
            tools: registry.has_tools().then(ListCapabilities::default),
            prompts: registry.has_prompts().then(ListCapabilities::default),
            completions: Some(CompletionCapabilities {}),
        }
    }
}

/// Capabilities of a listable collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListCapabilities {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Completion capabilities (no options).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompletionCapabilities {}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters for tools/list and prompts/list.
#[derive(Debug, Clone, Default, Deserialize)]
struct ListParams {
    #[serde(default)]
    cursor: Option<String>,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Parameters for prompts/get request.
#[derive(Debug, Clone, Deserialize)]
struct PromptGetParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

/// The target of a completion request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum CompletionReference {
    #[serde(rename = "ref/prompt")]
    Prompt { name: String },
    #[serde(rename = "ref/tool")]
    Tool { name: String },
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionArgument {
    name: String,
    #[serde(default)]
    value: String,
}

/// Parameters for completion/complete request.
#[derive(Debug, Clone, Deserialize)]
struct CompletionParams {
    #[serde(rename = "ref")]
    reference: CompletionReference,
    argument: CompletionArgument,
}

/// Read-only state shared by every session.
#[derive(Debug)]
pub struct ServerContext {
    registry: CapabilityRegistry,
    page_size: Option<usize>,
    tool_timeout: Option<Duration>,
}

impl ServerContext {
    /// Creates a context without pagination and with the default tool timeout.
    #[must_use]
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self::from_config(registry, &ServerConfig::default())
    }

    /// Creates a context using the `server` section of the configuration.
    #[must_use]
    pub fn from_config(registry: CapabilityRegistry, config: &ServerConfig) -> Self {
        Self {
            registry,
            page_size: config.page_size,
            tool_timeout: config.tool_timeout(),
        }
    }

    /// Sets the maximum number of entries per list page.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets how long a tool call may run.
    #[must_use]
    pub const fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Returns the capability registry.
    #[must_use]
    pub const fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }
}

/// One MCP session: lifecycle state plus the shared context.
pub struct McpServer {
    /// Current session state.
    state: SessionState,
    /// Registry and settings shared with other sessions.
    context: Arc<ServerContext>,
}

impl McpServer {
    /// Creates a new, uninitialised session.
    #[must_use]
    pub const fn new(context: Arc<ServerContext>) -> Self {
        Self {
            state: SessionState::Uninitialized,
            context,
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Serves requests from `transport` until the input is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let line = match transport.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(error = %e, "Discarding undecodable message");
                    transport
                        .write_response(&JsonRpcResponse::parse_error())
                        .await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                transport.write_response(&response).await?;
            }
        }
    }

    /// Handles a single line of input, returning the response to send, if any.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        match parse_message(line) {
            Ok(request) => self.dispatch(request).await,
            Err(response) => {
                debug!("Rejected malformed message");
                Some(response)
            }
        }
    }

    /// Dispatches a parsed request. Notifications yield `None`.
    pub async fn dispatch(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        debug!(method = %request.method, request_id = %id, "Handling request");

        let response = match self.handle_request(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                debug!(
                    method = %request.method,
                    request_id = %id,
                    code = error.code(),
                    message = error.message(),
                    "Request failed"
                );
                JsonRpcResponse::failure(Some(id), error)
            }
        };

        Some(response)
    }

    /// Resolves a request method to exactly one handler or one error.
    async fn handle_request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ErrorObject> {
        if method == "initialize" {
            return self.handle_initialize(params);
        }

        if self.state == SessionState::Uninitialized {
            return Err(ErrorObject::invalid_request(
                "Server not initialised: send initialize first",
            ));
        }

        match method {
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(params),
            "tools/call" => self.handle_tools_call(params).await,
            "prompts/list" => self.handle_prompts_list(params),
            "prompts/get" => self.handle_prompts_get(params),
            "completion/complete" => self.handle_completion(params),
            _ => Err(ErrorObject::method_not_found(method)),
        }
    }

    /// Handles an incoming notification.
    #[allow(clippy::unused_self)]
    fn handle_notification(&self, notification: &JsonRpcRequest) {
        match notification.method.as_str() {
            "notifications/initialized" => debug!("Client confirmed initialisation"),
            "notifications/cancelled" => {
                debug!("Ignoring cancellation, requests are handled sequentially");
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, params: Option<Value>) -> Result<Value, ErrorObject> {
        if self.state != SessionState::Uninitialized {
            return Err(ErrorObject::invalid_request("Server already initialised"));
        }

        let params: InitializeParams = parse_params(params, "initialize")?;

        let Some(version) = SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .copied()
            .find(|v| *v == params.protocol_version)
        else {
            return Err(ErrorObject::invalid_params(format!(
                "Unsupported protocol version: {} (latest is {MCP_PROTOCOL_VERSION})",
                params.protocol_version
            ))
            .with_data(json!({
                "supported": SUPPORTED_PROTOCOL_VERSIONS,
                "requested": params.protocol_version,
            })));
        };

        match &params.client_info {
            Some(client) => info!(
                client = %client.name,
                client_version = client.version.as_deref().unwrap_or("unknown"),
                protocol_version = version,
                "Session initialised"
            ),
            None => info!(protocol_version = version, "Session initialised"),
        }

        self.state = SessionState::Ready {
            protocol_version: version,
        };

        Ok(json!({
            "protocolVersion": version,
            "capabilities": ServerCapabilities::for_registry(self.context.registry()),
            "serverInfo": ServerInfo::default(),
            "instructions": INSTRUCTIONS,
        }))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, params: Option<Value>) -> Result<Value, ErrorObject> {
        let params: ListParams = parse_params(params, "tools/list")?;
        let tools = self.context.registry().list_tools();
        let (page, next_cursor) =
            paginate(&tools, params.cursor.as_deref(), self.context.page_size)?;

        let mut result = json!({ "tools": page });
        if let Some(cursor) = next_cursor {
            result["nextCursor"] = Value::String(cursor);
        }
        Ok(result)
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, ErrorObject> {
        let params: ToolCallParams = parse_params(params, "tools/call")?;

        let Some(handler) = self.context.registry().lookup_tool(&params.name) else {
            return Err(ErrorObject::with_message(
                ErrorCode::MethodNotFound,
                format!("Unknown tool: {}", params.name),
            ));
        };

        let arguments = match params.arguments {
            Value::Null => Value::Object(Map::new()),
            Value::Object(map) => Value::Object(map),
            _ => {
                return Err(ErrorObject::invalid_params(
                    "Tool arguments must be a JSON object",
                ))
            }
        };

        let name = params.name;
        let handler = Arc::clone(handler);
        let task = tokio::spawn(async move { handler.call(arguments).await });
        let abort = task.abort_handle();

        let joined = match self.context.tool_timeout {
            Some(limit) => {
                if let Ok(joined) = tokio::time::timeout(limit, task).await {
                    joined
                } else {
                    abort.abort();
                    warn!(tool = %name, timeout_secs = limit.as_secs(), "Tool call timed out");
                    return Err(ErrorObject::internal_error(format!(
                        "Tool '{name}' timed out after {}s",
                        limit.as_secs()
                    )));
                }
            }
            None => task.await,
        };

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                ToolCallResult::from_handler_error(&e)
            }
            Err(e) => {
                error!(tool = %name, error = %e, "Tool handler aborted");
                return Err(ErrorObject::internal_error(format!(
                    "Tool '{name}' failed unexpectedly"
                )));
            }
        };

        to_result_value(&result)
    }

    /// Handles the prompts/list request.
    fn handle_prompts_list(&self, params: Option<Value>) -> Result<Value, ErrorObject> {
        let params: ListParams = parse_params(params, "prompts/list")?;
        let prompts = self.context.registry().list_prompts();
        let (page, next_cursor) =
            paginate(&prompts, params.cursor.as_deref(), self.context.page_size)?;

        let mut result = json!({ "prompts": page });
        if let Some(cursor) = next_cursor {
            result["nextCursor"] = Value::String(cursor);
        }
        Ok(result)
    }

    /// Handles the prompts/get request.
    fn handle_prompts_get(&self, params: Option<Value>) -> Result<Value, ErrorObject> {
        let params: PromptGetParams = parse_params(params, "prompts/get")?;
        let registry = self.context.registry();

        let (Some(handler), Some(definition)) = (
            registry.lookup_prompt(&params.name),
            registry.prompt_definition(&params.name),
        ) else {
            return Err(ErrorObject::with_message(
                ErrorCode::MethodNotFound,
                format!("Unknown prompt: {}", params.name),
            ));
        };

        let arguments = params.arguments.unwrap_or_default();

        let non_string: Vec<&str> = arguments
            .iter()
            .filter(|(_, value)| !value.is_string())
            .map(|(name, _)| name.as_str())
            .collect();
        if !non_string.is_empty() {
            return Err(ErrorObject::invalid_params(format!(
                "Prompt arguments must be strings: {}",
                non_string.join(", ")
            )));
        }

        let missing: Vec<&str> = definition
            .arguments
            .iter()
            .filter(|arg| {
                arg.required
                    && arguments
                        .get(&arg.name)
                        .and_then(Value::as_str)
                        .map_or(true, |s| s.trim().is_empty())
            })
            .map(|arg| arg.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ErrorObject::invalid_params(format!(
                "Missing required arguments: {}",
                missing.join(", ")
            ))
            .with_data(json!({ "missing": missing })));
        }

        let result = handler.render(&arguments).unwrap_or_else(|e| {
            warn!(prompt = %params.name, error = %e, "Prompt rendering failed");
            PromptResult::from_handler_error(&e)
        });

        to_result_value(&result)
    }

    /// Handles the completion/complete request.
    fn handle_completion(&self, params: Option<Value>) -> Result<Value, ErrorObject> {
        let params: CompletionParams = parse_params(params, "completion/complete")?;
        let registry = self.context.registry();
        let argument = &params.argument;

        let suggestions = match &params.reference {
            CompletionReference::Prompt { name } => registry
                .lookup_prompt(name)
                .map(|prompt| prompt.complete(&argument.name, &argument.value))
                .ok_or_else(|| {
                    ErrorObject::with_message(
                        ErrorCode::MethodNotFound,
                        format!("Unknown prompt: {name}"),
                    )
                })?,
            CompletionReference::Tool { name } => registry
                .lookup_tool(name)
                .map(|tool| tool.complete(&argument.name, &argument.value))
                .ok_or_else(|| {
                    ErrorObject::with_message(
                        ErrorCode::MethodNotFound,
                        format!("Unknown tool: {name}"),
                    )
                })?,
        };

        let mut values = suggestions.unwrap_or_default();
        let total = values.len();
        values.truncate(MAX_COMPLETION_VALUES);

        Ok(json!({
            "completion": {
                "values": values,
                "total": total,
                "hasMore": total > MAX_COMPLETION_VALUES,
            }
        }))
    }
}

/// Deserialises request parameters, treating absent parameters as `{}`.
fn parse_params<T: DeserializeOwned>(params: Option<Value>, method: &str) -> Result<T, ErrorObject> {
    let value = params.unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(value)
        .map_err(|e| ErrorObject::invalid_params(format!("Invalid {method} params: {e}")))
}

/// Serialises a handler result into a response value.
fn to_result_value<T: Serialize>(result: &T) -> Result<Value, ErrorObject> {
    serde_json::to_value(result).map_err(|e| {
        error!(error = %e, "Failed to serialise result");
        ErrorObject::internal_error("Internal error: failed to serialise result")
    })
}

/// Returns one page of `items` and the cursor of the next page.
///
/// Cursors are opaque to clients; internally they are decimal offsets.
fn paginate<'a, T>(
    items: &'a [T],
    cursor: Option<&str>,
    page_size: Option<usize>,
) -> Result<(&'a [T], Option<String>), ErrorObject> {
    let start = match cursor {
        None => 0,
        Some(cursor) => cursor
            .parse::<usize>()
            .ok()
            .filter(|offset| *offset <= items.len())
            .ok_or_else(|| ErrorObject::invalid_params(format!("Invalid cursor: {cursor}")))?,
    };

    let end = page_size.map_or(items.len(), |size| items.len().min(start.saturating_add(size)));
    let next_cursor = (end < items.len()).then(|| end.to_string());

    Ok((&items[start..end], next_cursor))
}

/// Completes when the process is asked to stop.
#[cfg(unix)]
async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
    Ok(())
}

/// Completes when the process is asked to stop.
#[cfg(windows)]
async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}

/// Serves a single session over stdin/stdout until EOF or a shutdown signal.
///
/// # Errors
///
/// Returns an error if transport I/O or signal registration fails.
pub async fn serve_stdio(context: Arc<ServerContext>) -> io::Result<()> {
    let mut server = McpServer::new(context);
    let mut transport = StdioTransport::stdio();

    tokio::select! {
        result = server.run(&mut transport) => {
            info!("stdin closed");
            result
        }
        signal = shutdown_signal() => signal,
    }
}

/// Accepts TCP connections on `addr`, one session per connection, until a
/// shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if binding the listener or signal registration fails.
pub async fn serve_tcp(context: Arc<ServerContext>, addr: SocketAddr) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening for MCP connections");

    tokio::select! {
        () = serve_listener(context, listener) => Ok(()),
        signal = shutdown_signal() => signal,
    }
}

/// Accepts connections forever, spawning an isolated session task for each.
pub async fn serve_listener(context: Arc<ServerContext>, listener: TcpListener) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let context = Arc::clone(&context);
        tokio::spawn(async move {
            info!(%peer, "Session opened");
            let mut transport = TcpTransport::from_stream(stream);
            let mut server = McpServer::new(context);
            match server.run(&mut transport).await {
                Ok(()) => info!(%peer, "Session closed"),
                Err(e) => warn!(%peer, error = %e, "Session ended with error"),
            }
        });
    }
}
