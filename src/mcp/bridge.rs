//! MCP Stdio Bridge
//!
//! Adapts a line-oriented standard-I/O channel onto the gateway's
//! synchronous RPC endpoint for clients that only speak process stdio. The
//! bridge carries no business logic: it frames inbound lines into JSON-RPC
//! requests, forwards each to the configured tenant endpoint over HTTP, and
//! relays the replies back one per line.
//!
//! Framing: an accumulation buffer grows line by line until it parses as
//! one complete JSON value, so requests may span multiple lines.
//!
//! Ordering contract: requests are forwarded without waiting for earlier
//! replies, and replies are written in completion order. Each reply is one
//! atomic line; callers must correlate by `id`, never by line order.
//!
//! Every reply, success or error, goes to the output stream. Logging goes
//! to stderr so the output stays a pure reply channel.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::mcp::error::McpError;
use crate::mcp::protocol::{error_codes, JsonRpcError, JsonRpcId, JsonRpcResponse};

/// Local bridge process forwarding stdio JSON-RPC to the HTTP endpoint
pub struct StdioBridge {
    client: reqwest::Client,
    endpoint: String,
}

impl StdioBridge {
    /// Create a bridge for one tenant against a gateway base URL
    pub fn new(base_url: &str, tenant: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let endpoint = format!("{}/mcp/{}", base_url.trim_end_matches('/'), tenant);
        Self { client, endpoint }
    }

    /// The RPC endpoint requests are forwarded to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run the bridge over the given streams until input EOF.
    ///
    /// Forwarded requests run concurrently; the single writer task
    /// serializes replies so a full message is always written as one line.
    /// Replies still in flight at EOF are drained before returning.
    pub async fn run<R, W>(&self, input: R, output: W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel::<String>(64);
        let writer_task = tokio::spawn(write_replies(output, reply_rx));

        let reader = BufReader::new(input);
        let mut lines = reader.lines();
        let mut buffer = String::new();

        while let Some(line) = lines.next_line().await? {
            if buffer.is_empty() && line.trim().is_empty() {
                continue;
            }
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(&line);

            match serde_json::from_str::<serde_json::Value>(&buffer) {
                Ok(message) => {
                    buffer.clear();
                    self.spawn_forward(message, reply_tx.clone());
                }
                Err(e) if e.is_eof() => {
                    // Incomplete fragment; keep accumulating.
                    debug!(buffered = buffer.len(), "Waiting for rest of JSON message");
                }
                Err(e) => {
                    warn!(error = %e, "Discarding malformed input");
                    buffer.clear();
                    let reply = JsonRpcResponse::error(
                        None,
                        McpError::ParseError(e.to_string()).into(),
                    );
                    send_reply(&reply_tx, &reply).await;
                }
            }
        }

        debug!("Input stream closed, draining in-flight replies");

        // Dropping our sender lets the writer finish once every in-flight
        // forward task has delivered its reply.
        drop(reply_tx);
        writer_task.await??;
        Ok(())
    }

    fn spawn_forward(&self, message: serde_json::Value, reply_tx: mpsc::Sender<String>) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            let reply = forward(&client, &endpoint, message).await;
            send_reply(&reply_tx, &reply).await;
        });
    }
}

async fn send_reply(reply_tx: &mpsc::Sender<String>, reply: &JsonRpcResponse) {
    match serde_json::to_string(reply) {
        Ok(line) => {
            if reply_tx.send(line).await.is_err() {
                warn!("Reply writer is gone, dropping reply");
            }
        }
        Err(e) => warn!(error = %e, "Failed to serialize reply"),
    }
}

/// Forward one message to the gateway and normalize any failure into an
/// InternalError reply carrying the original id when known.
async fn forward(
    client: &reqwest::Client,
    endpoint: &str,
    message: serde_json::Value,
) -> JsonRpcResponse {
    let id = extract_id(&message);

    let response = match client.post(endpoint).json(&message).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, endpoint = %endpoint, "Failed to reach gateway");
            return internal_error(id, format!("Failed to reach gateway: {}", e));
        }
    };

    match response.json::<JsonRpcResponse>().await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Gateway returned a malformed reply");
            internal_error(id, format!("Invalid reply from gateway: {}", e))
        }
    }
}

fn extract_id(message: &serde_json::Value) -> Option<JsonRpcId> {
    message.get("id").and_then(|id| serde_json::from_value(id.clone()).ok())
}

fn internal_error(id: Option<JsonRpcId>, message: String) -> JsonRpcResponse {
    JsonRpcResponse::error(
        id,
        JsonRpcError { code: error_codes::INTERNAL_ERROR, message, data: None },
    )
}

async fn write_replies<W: AsyncWrite + Unpin>(
    mut output: W,
    mut reply_rx: mpsc::Receiver<String>,
) -> std::io::Result<()> {
    while let Some(line) = reply_rx.recv().await {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn read_replies(
        output: impl AsyncRead + Unpin,
        count: usize,
    ) -> Vec<JsonRpcResponse> {
        let mut lines = BufReader::new(output).lines();
        let mut replies = Vec::new();
        while replies.len() < count {
            let line = tokio::time::timeout(Duration::from_secs(10), lines.next_line())
                .await
                .expect("timed out waiting for reply")
                .expect("read reply line")
                .expect("output closed early");
            replies.push(serde_json::from_str(&line).expect("reply is JSON-RPC"));
        }
        replies
    }

    fn bridge(base_url: &str) -> StdioBridge {
        StdioBridge::new(base_url, "acme", Duration::from_secs(5))
    }

    #[test]
    fn test_endpoint_construction() {
        let bridge = StdioBridge::new("http://localhost:8080/", "acme", Duration::from_secs(5));
        assert_eq!(bridge.endpoint(), "http://localhost:8080/mcp/acme");
    }

    #[tokio::test]
    async fn test_forwards_single_line_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (mut input, bridge_input) = duplex(1024);
        let (bridge_output, output) = duplex(1024);
        let bridge = bridge(&server.uri());
        let run = tokio::spawn(async move { bridge.run(bridge_input, bridge_output).await });

        input
            .write_all(b"{\"jsonrpc\": \"2.0\", \"id\": 1, \"method\": \"tools/list\"}\n")
            .await
            .expect("write");
        drop(input);

        let replies = read_replies(output, 1).await;
        assert_eq!(replies[0].id, Some(JsonRpcId::Number(1)));
        assert!(replies[0].result.is_some());

        run.await.expect("join").expect("bridge run");
    }

    #[tokio::test]
    async fn test_multi_line_message_is_buffered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"jsonrpc": "2.0", "id": 3, "result": {}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (mut input, bridge_input) = duplex(1024);
        let (bridge_output, output) = duplex(1024);
        let bridge = bridge(&server.uri());
        let run = tokio::spawn(async move { bridge.run(bridge_input, bridge_output).await });

        input.write_all(b"{\"jsonrpc\": \"2.0\",\n").await.expect("write");
        input.write_all(b"\"id\": 3, \"method\": \"initialize\"}\n").await.expect("write");
        drop(input);

        let replies = read_replies(output, 1).await;
        assert_eq!(replies[0].id, Some(JsonRpcId::Number(3)));

        run.await.expect("join").expect("bridge run");
    }

    #[tokio::test]
    async fn test_malformed_input_gets_parse_error_on_output() {
        let server = MockServer::start().await;
        // Nothing should be forwarded.
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let (mut input, bridge_input) = duplex(1024);
        let (bridge_output, output) = duplex(1024);
        let bridge = bridge(&server.uri());
        let run = tokio::spawn(async move { bridge.run(bridge_input, bridge_output).await });

        input.write_all(b"{]\n").await.expect("write");
        drop(input);

        let replies = read_replies(output, 1).await;
        let error = replies[0].error.as_ref().expect("error reply");
        assert_eq!(error.code, error_codes::PARSE_ERROR);
        assert!(replies[0].id.is_none());

        run.await.expect("join").expect("bridge run");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_yields_internal_error_with_id() {
        let (mut input, bridge_input) = duplex(1024);
        let (bridge_output, output) = duplex(1024);
        // Nothing listens on port 1.
        let bridge = StdioBridge::new("http://127.0.0.1:1", "acme", Duration::from_secs(1));
        let run = tokio::spawn(async move { bridge.run(bridge_input, bridge_output).await });

        input
            .write_all(b"{\"jsonrpc\": \"2.0\", \"id\": 9, \"method\": \"tools/list\"}\n")
            .await
            .expect("write");
        drop(input);

        let replies = read_replies(output, 1).await;
        let error = replies[0].error.as_ref().expect("error reply");
        assert_eq!(error.code, error_codes::INTERNAL_ERROR);
        assert_eq!(replies[0].id, Some(JsonRpcId::Number(9)));

        run.await.expect("join").expect("bridge run");
    }

    #[tokio::test]
    async fn test_concurrent_requests_correlate_by_id() {
        let server = MockServer::start().await;
        // Request 1 is slow, request 2 is fast; both replies must arrive,
        // each tagged with its own id, whatever the output order.
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"id": 1})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(300))
                    .set_body_json(serde_json::json!({
                        "jsonrpc": "2.0", "id": 1, "result": {"call": "slow"}
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"id": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 2, "result": {"call": "fast"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (mut input, bridge_input) = duplex(1024);
        let (bridge_output, output) = duplex(1024);
        let bridge = bridge(&server.uri());
        let run = tokio::spawn(async move { bridge.run(bridge_input, bridge_output).await });

        input
            .write_all(b"{\"jsonrpc\": \"2.0\", \"id\": 1, \"method\": \"tools/call\", \"params\": {\"name\": \"slow\"}}\n")
            .await
            .expect("write");
        input
            .write_all(b"{\"jsonrpc\": \"2.0\", \"id\": 2, \"method\": \"tools/call\", \"params\": {\"name\": \"fast\"}}\n")
            .await
            .expect("write");
        drop(input);

        let replies = read_replies(output, 2).await;

        // The fast call completes first even though it was submitted second.
        assert_eq!(replies[0].id, Some(JsonRpcId::Number(2)));
        assert_eq!(replies[0].result.as_ref().expect("result")["call"], "fast");
        assert_eq!(replies[1].id, Some(JsonRpcId::Number(1)));
        assert_eq!(replies[1].result.as_ref().expect("result")["call"], "slow");

        run.await.expect("join").expect("bridge run");
    }
}
