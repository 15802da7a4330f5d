use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;
use vendorwatch_digest::{format_entries, format_state, DigestOutcome, DigestService, Format};
use vendorwatch_error::ErrorResponse;

use super::tools;
use super::types::*;

pub struct McpServer {
    service: Arc<DigestService>,
}

impl McpServer {
    pub fn new(service: Arc<DigestService>) -> Self {
        Self { service }
    }

    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        debug!("MCP server started, waiting for requests on stdin");

        while let Some(line) = lines.next_line().await? {
            if let Some(resp) = self.handle_line(&line).await {
                write_response(&mut stdout, &resp).await?;
            }
        }

        debug!("stdin closed, MCP server shutting down");
        Ok(())
    }

    /// `None` for blank lines and notifications.
    async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let msg: RpcMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                return Some(RpcResponse::err(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ))
            }
        };

        let Some(id) = msg.id.clone() else {
            if msg.method.as_deref() == Some("notifications/initialized") {
                debug!("client initialized");
            }
            return None;
        };

        if !msg.is_valid_jsonrpc() {
            return Some(RpcResponse::err(
                id,
                INVALID_REQUEST,
                "invalid jsonrpc version (expected \"2.0\")",
            ));
        }

        let resp = match msg.method.as_deref().unwrap_or("") {
            "" => RpcResponse::err(id, INVALID_REQUEST, "missing method"),
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, msg.params).await,
            "ping" => RpcResponse::ok(id, json!({})),
            method => RpcResponse::err(
                id,
                METHOD_NOT_FOUND,
                format!("unknown method: {method}"),
            ),
        };
        Some(resp)
    }

    fn handle_initialize(&self, id: Value) -> RpcResponse {
        debug!(page = self.service.has_page(), "initialized");
        RpcResponse::ok(
            id,
            json!({
                "protocolVersion": "2025-11-25",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "vendorwatch",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> RpcResponse {
        let tool_defs = tools::available_tools(self.service.has_page());
        RpcResponse::ok(id, json!({ "tools": tool_defs }))
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> RpcResponse {
        let params: CallToolParams = match params.and_then(|v| serde_json::from_value(v).ok()) {
            Some(p) => p,
            None => return RpcResponse::err(id, INVALID_PARAMS, "missing or invalid params"),
        };

        let args = params.arguments.unwrap_or(json!({}));
        let tool_result = match self.dispatch_tool(&params.name, &args).await {
            Ok((text, is_error)) => ToolResult::text(text, is_error),
            Err(e) => ToolResult::text(e, true),
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => RpcResponse::ok(id, val),
            Err(e) => RpcResponse::err(id, INTERNAL_ERROR, format!("serialization error: {e}")),
        }
    }

    /// Text for the caller and whether it reports a failure.
    async fn dispatch_tool(&self, name: &str, args: &Value) -> Result<(String, bool), String> {
        let show_emails = args
            .get("show_emails")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        match name {
            "track_vendor" => {
                let email = get_str(args, "email")?;
                let outcome = self
                    .service
                    .save_vendor_email(email)
                    .await
                    .map_err(|e| ErrorResponse::from(&e).to_compact())?;
                Ok(render_outcome(&outcome, show_emails))
            }
            "summarize_thread" => {
                let outcome = match args.get("subject").and_then(|v| v.as_str()) {
                    Some(subject) => self.service.summarize_subject(subject).await,
                    None => self.service.summarize_active_page().await,
                };
                Ok(render_outcome(&outcome, show_emails))
            }
            "get_state" => {
                let fmt = Format::parse(args.get("format").and_then(|v| v.as_str()));
                let state = self
                    .service
                    .load_state()
                    .await
                    .map_err(|e| ErrorResponse::from(&e).to_compact())?;
                Ok((format_state(&state, fmt), false))
            }
            _ => Err(format!("unknown tool: {name}")),
        }
    }
}

fn render_outcome(outcome: &DigestOutcome, show_emails: bool) -> (String, bool) {
    let text = if show_emails && !outcome.entries.is_empty() {
        format!(
            "{}\n\n{}",
            format_entries(&outcome.entries, Format::Compact),
            outcome.summary
        )
    } else {
        outcome.summary.clone()
    };
    (text, !outcome.is_done())
}

fn get_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or(format!("missing '{key}' parameter"))
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    resp: &RpcResponse,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(resp)?;
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vendorwatch_digest::{MailClient, Summarizer};
    use vendorwatch_domain::KeyValueStore;
    use vendorwatch_google::{GmailClient, GmailConfig, GoogleTokenProvider, TokenSource};
    use vendorwatch_openai::{OpenAiAdapter, OpenAiConfig};
    use vendorwatch_store::MemoryStore;

    // Offline wiring: none of these tests reach the network.
    fn server_with(store: Arc<MemoryStore>) -> McpServer {
        let service = DigestService::new(
            Arc::new(GoogleTokenProvider::new(TokenSource::Unavailable)),
            MailClient::new(Arc::new(GmailClient::new(GmailConfig::default()))),
            Summarizer::new(
                Arc::new(OpenAiAdapter::new(OpenAiConfig {
                    api_key: "unused".to_string(),
                    base_url: "http://127.0.0.1:1".to_string(),
                })),
                "test-model",
            ),
            store,
        );
        McpServer::new(Arc::new(service))
    }

    fn server() -> McpServer {
        server_with(Arc::new(MemoryStore::new()))
    }

    async fn call(server: &McpServer, line: &str) -> Value {
        let resp = server.handle_line(line).await.unwrap();
        serde_json::to_value(resp).unwrap()
    }

    fn tool_text(resp: &Value) -> (&str, bool) {
        (
            resp["result"]["content"][0]["text"].as_str().unwrap(),
            resp["result"]["isError"].as_bool().unwrap(),
        )
    }

    #[tokio::test]
    async fn lists_the_three_tools() {
        let resp = call(&server(), r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        let names: Vec<&str> = resp["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["track_vendor", "summarize_thread", "get_state"]);
    }

    #[tokio::test]
    async fn protocol_errors() {
        let s = server();
        assert!(s.handle_line("   ").await.is_none());
        assert!(s
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());

        let resp = call(&s, "{not json").await;
        assert_eq!(resp["error"]["code"], PARSE_ERROR);

        let resp = call(&s, r#"{"jsonrpc":"1.0","id":2,"method":"ping"}"#).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);

        let resp = call(&s, r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);

        let resp = call(&s, r#"{"jsonrpc":"2.0","id":4,"method":"tools/call"}"#).await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn track_vendor_rejects_bad_address() {
        let store = Arc::new(MemoryStore::new());
        let s = server_with(store.clone());
        let resp = call(
            &s,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"track_vendor","arguments":{"email":"nobody"}}}"#,
        )
        .await;

        let (text, is_error) = tool_text(&resp);
        assert!(is_error);
        assert!(text.starts_with("[INVALID_INPUT]"));
        assert_eq!(store.get("vendorEmail").await.unwrap(), None);
    }

    #[tokio::test]
    async fn summarize_without_page_reports_no_tab() {
        let resp = call(
            &server(),
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"summarize_thread"}}"#,
        )
        .await;
        assert_eq!(tool_text(&resp), ("No active tab.", true));
    }

    #[tokio::test]
    async fn get_state_reads_store() {
        let store = Arc::new(MemoryStore::new());
        store.set("vendorEmail", "vendor@example.com").await.unwrap();
        let s = server_with(store);

        let resp = call(
            &s,
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"get_state","arguments":{"format":"full"}}}"#,
        )
        .await;
        assert_eq!(
            tool_text(&resp),
            (r#"{"vendor_email":"vendor@example.com"}"#, false)
        );
    }
}
