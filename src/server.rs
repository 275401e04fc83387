//! Line-delimited JSON-RPC 2.0 over stdio, speaking the tool subset of the
//! Model Context Protocol.
//!
//! One request per line in, one response per line out. Notifications (no
//! `id`) get no response. Logs go to stderr, never to the protocol stream.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::service::StoryService;
use crate::tools::StoryTools;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    method: String,
    #[serde(default)]
    params: Value,
}

pub struct Server<S> {
    tools: StoryTools<S>,
    name: String,
    version: String,
}

impl<S: StoryService> Server<S> {
    pub fn new(tools: StoryTools<S>) -> Self {
        Self {
            tools,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn tools(&self) -> &StoryTools<S> {
        &self.tools
    }

    /// Serve until `reader` hits EOF.
    pub fn run<R: BufRead, W: Write>(&mut self, reader: R, mut writer: W) -> Result<()> {
        info!("{} {} serving on stdio", self.name, self.version);

        for line in reader.lines() {
            let line = line.context("failed to read request line")?;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line) {
                writeln!(writer, "{response}").context("failed to write response")?;
                writer.flush().context("failed to flush response")?;
            }
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle one raw message. `None` means nothing should be written back.
    pub fn handle_line(&mut self, line: &str) -> Option<Value> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unparseable message: {e}");
                return Some(error_response(Value::Null, PARSE_ERROR, &e.to_string()));
            }
        };

        // Only an absent id marks a notification; `"id": null` still gets an answer.
        let id = raw.get("id").cloned();
        let request: Request = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(e) => {
                let id = id.unwrap_or(Value::Null);
                return Some(error_response(id, INVALID_REQUEST, &e.to_string()));
            }
        };

        let Some(id) = id else {
            debug!("Notification: {}", request.method);
            return None;
        };

        debug!("Request {id}: {}", request.method);
        let response = match request.method.as_str() {
            "initialize" => success_response(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": self.name, "version": self.version },
                }),
            ),
            "ping" => success_response(id, json!({})),
            "tools/list" => success_response(
                id,
                json!({ "tools": StoryTools::<S>::definitions() }),
            ),
            "tools/call" => self.call_tool(id, &request.params),
            other => error_response(id, METHOD_NOT_FOUND, &format!("method not found: {other}")),
        };
        Some(response)
    }

    fn call_tool(&mut self, id: Value, params: &Value) -> Value {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return error_response(id, INVALID_PARAMS, "tools/call requires a tool name");
        };
        let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let record = self.tools.call(name, &args);
        let is_error = record.get("success") != Some(&Value::Bool(true));

        success_response(
            id,
            json!({
                "content": [{ "type": "text", "text": record.to_string() }],
                "isError": is_error,
            }),
        )
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}
