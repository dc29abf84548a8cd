//! Line-delimited JSON-RPC 2.0 tool surface over stdio.
//!
//! One request object per line in, one response object per line out.
//! Methods: `initialize`, `ping`, `tools/list`, `tools/call`. Requests
//! without an `id` are notifications and get no reply.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::service::{RetrievalError, RetrievalRequest, RetrievalService};

pub const ERR_PARSE: i64 = -32700;
pub const ERR_INVALID_REQUEST: i64 = -32600;
pub const ERR_METHOD_NOT_FOUND: i64 = -32601;
pub const ERR_INVALID_PARAMS: i64 = -32602;

pub const TOOL_NAME: &str = "get_image_link";
const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(RpcError { code, message: message.into() }) }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Handle one input line. Returns the serialized reply, or `None` for
/// blank lines and notifications.
pub fn handle_line(service: &RetrievalService, line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let response = match serde_json::from_str::<Value>(trimmed) {
        Err(e) => RpcResponse::err(Value::Null, ERR_PARSE, format!("parse error: {e}")),
        Ok(value) => match serde_json::from_value::<RpcRequest>(value.clone()) {
            Err(e) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                RpcResponse::err(id, ERR_INVALID_REQUEST, format!("invalid request: {e}"))
            }
            Ok(req) => {
                let Some(id) = req.id else {
                    debug!(method = %req.method, "notification ignored");
                    return None;
                };
                dispatch(service, id, &req.method, req.params)
            }
        },
    };

    encode(&response)
}

/// Reply for an input line that is not valid UTF-8.
fn invalid_utf8_reply() -> Option<String> {
    encode(&RpcResponse::err(Value::Null, ERR_PARSE, "parse error: line is not valid UTF-8"))
}

fn encode(response: &RpcResponse) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "failed to serialize response");
            None
        }
    }
}

fn dispatch(service: &RetrievalService, id: Value, method: &str, params: Value) -> RpcResponse {
    match method {
        "initialize" => RpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "image-cate", "version": env!("CARGO_PKG_VERSION") },
            }),
        ),
        "ping" => RpcResponse::ok(id, json!({})),
        "tools/list" => RpcResponse::ok(id, json!({ "tools": [tool_descriptor()] })),
        "tools/call" => match serde_json::from_value::<CallParams>(params) {
            Err(e) => RpcResponse::err(id, ERR_INVALID_PARAMS, format!("invalid params: {e}")),
            Ok(call) if call.name != TOOL_NAME => {
                RpcResponse::err(id, ERR_INVALID_PARAMS, format!("unknown tool: {}", call.name))
            }
            Ok(call) => match serde_json::from_value::<RetrievalRequest>(call.arguments) {
                Err(e) => RpcResponse::err(id, ERR_INVALID_PARAMS, format!("invalid arguments: {e}")),
                Ok(request) => RpcResponse::ok(id, call_tool(service, &request)),
            },
        },
        other => RpcResponse::err(id, ERR_METHOD_NOT_FOUND, format!("method not found: {other}")),
    }
}

/// Run `get_image_link` and shape the outcome as a tool result.
pub fn call_tool(service: &RetrievalService, request: &RetrievalRequest) -> Value {
    match service.get_image_link(request) {
        Ok(urls) => {
            info!(category = %request.category, count = urls.len(), "image links served");
            let content: Vec<Value> = urls.into_iter().map(|u| json!({ "type": "text", "text": u })).collect();
            json!({ "content": content, "isError": false })
        }
        Err(e) => {
            warn!(category = %request.category, error = %e, "image link request failed");
            let body = match &e {
                RetrievalError::Uninitialized => json!({
                    "error": "image store is not initialized",
                }),
                RetrievalError::UnknownCategory { category, known } => json!({
                    "error": "category not found",
                    "category": category,
                    "known_categories": known,
                }),
            };
            json!({ "content": [{ "type": "text", "text": body.to_string() }], "isError": true })
        }
    }
}

fn tool_descriptor() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Return random image URLs for a category.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "category": { "type": "string", "description": "Image category name" },
                "num": { "type": "integer", "minimum": 1, "default": 1, "description": "Number of URLs to return" },
            },
            "required": ["category"],
        },
    })
}

/// Serve `input` → `out` until `input` closes or `shutdown` fires.
///
/// A line that is not valid UTF-8 gets a parse error reply; the loop only
/// stops on EOF, cancellation, or a hard read error.
pub async fn serve<R, W>(
    service: &RetrievalService,
    mut input: R,
    mut out: W,
    shutdown: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    info!("tool server ready");

    loop {
        buf.clear();
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("tool server shutting down");
                break;
            }

            read = input.read_until(b'\n', &mut buf) => {
                match read {
                    Ok(0) => {
                        info!("tool server input closed");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("tool server read error: {e}");
                        break;
                    }
                }

                let reply = match std::str::from_utf8(&buf) {
                    Ok(line) => handle_line(service, line),
                    Err(e) => {
                        warn!(error = %e, "discarding non UTF-8 input line");
                        invalid_utf8_reply()
                    }
                };

                if let Some(reply) = reply {
                    out.write_all(reply.as_bytes()).await?;
                    out.write_all(b"\n").await?;
                    out.flush().await?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::manifest::ImageManifest;

    fn service() -> RetrievalService {
        RetrievalService::from_manifest(ImageManifest::from_json(r#"{"a": ["x", "y", "z"], "b": ["w"]}"#).unwrap())
    }

    fn reply(service: &RetrievalService, line: &str) -> Value {
        serde_json::from_str(&handle_line(service, line).expect("expected a reply")).unwrap()
    }

    #[test]
    fn blank_lines_and_notifications_are_silent() {
        let s = service();
        assert!(handle_line(&s, "   ").is_none());
        assert!(handle_line(&s, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).is_none());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let v = reply(&service(), "{oops");
        assert_eq!(v["error"]["code"], ERR_PARSE);
        assert_eq!(v["id"], Value::Null);
    }

    #[test]
    fn wrong_shape_keeps_request_id() {
        let v = reply(&service(), r#"{"jsonrpc":"2.0","id":9}"#);
        assert_eq!(v["error"]["code"], ERR_INVALID_REQUEST);
        assert_eq!(v["id"], 9);
    }

    #[test]
    fn unknown_method() {
        let v = reply(&service(), r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#);
        assert_eq!(v["error"]["code"], ERR_METHOD_NOT_FOUND);
    }

    #[test]
    fn lists_the_tool() {
        let v = reply(&service(), r#"{"jsonrpc":"2.0","id":"l","method":"tools/list"}"#);
        assert_eq!(v["id"], "l");
        assert_eq!(v["result"]["tools"][0]["name"], TOOL_NAME);
        assert_eq!(v["result"]["tools"][0]["inputSchema"]["required"][0], "category");
    }

    #[test]
    fn initialize_reports_server_info() {
        let v = reply(&service(), r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#);
        assert_eq!(v["result"]["serverInfo"]["name"], "image-cate");
    }

    #[test]
    fn call_returns_one_text_item_per_url() {
        let v = reply(
            &service(),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_image_link","arguments":{"category":"a","num":2}}}"#,
        );
        let content = v["result"]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(v["result"]["isError"], false);
        for item in content {
            assert_eq!(item["type"], "text");
            assert!(item["text"].as_str().unwrap().ends_with('\n'));
        }
    }

    #[test]
    fn num_defaults_to_one() {
        let v = reply(
            &service(),
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_image_link","arguments":{"category":"b"}}}"#,
        );
        assert_eq!(v["result"]["content"][0]["text"], "w\n");
    }

    #[test]
    fn unknown_category_is_tool_error() {
        let v = reply(
            &service(),
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"get_image_link","arguments":{"category":"nope"}}}"#,
        );
        assert_eq!(v["result"]["isError"], true);
        let body: Value = serde_json::from_str(v["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["category"], "nope");
        assert_eq!(body["known_categories"], json!(["a", "b"]));
    }

    #[test]
    fn uninitialized_is_tool_error() {
        let s = RetrievalService::uninitialized();
        let v = call_tool(&s, &RetrievalRequest { category: "a".into(), num: None });
        assert_eq!(v["isError"], true);
        assert!(v["content"][0]["text"].as_str().unwrap().contains("not initialized"));
    }

    #[test]
    fn missing_category_is_invalid_params() {
        let v = reply(
            &service(),
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"get_image_link","arguments":{}}}"#,
        );
        assert_eq!(v["error"]["code"], ERR_INVALID_PARAMS);
    }

    #[test]
    fn unknown_tool_is_invalid_params() {
        let v = reply(
            &service(),
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"other","arguments":{}}}"#,
        );
        assert_eq!(v["error"]["code"], ERR_INVALID_PARAMS);
    }

    async fn session(input: &[u8]) -> Vec<Value> {
        let mut out = Vec::new();
        serve(&service(), input, &mut out, CancellationToken::new()).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_stop_the_server() {
        let mut input = Vec::new();
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n");
        input.extend_from_slice(b"\xff\xfe\n");
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");

        let replies = session(&input).await;
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["error"]["code"], ERR_PARSE);
        assert_eq!(replies[1]["id"], Value::Null);
        assert_eq!(replies[2]["id"], 2);
        assert_eq!(replies[2]["result"], json!({}));
    }

    #[tokio::test]
    async fn last_line_without_newline_is_served() {
        let replies = session(b"\n{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"ping\"}").await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["id"], "a");
    }

    #[tokio::test]
    async fn cancelled_token_stops_serving() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut out = Vec::new();
        let input: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        serve(&service(), input, &mut out, shutdown).await.unwrap();
        assert!(out.is_empty());
    }
}
