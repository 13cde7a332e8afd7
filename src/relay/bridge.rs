//! WebSocket bridge to a local relay agent
//!
//! The agent owns the relay protocol (pairing crypto, envelopes, relay
//! transport). We talk JSON-RPC 2.0 to it over a WebSocket:
//!
//! | Direction     | Method               | Params                                           | Result    |
//! |---------------|----------------------|--------------------------------------------------|-----------|
//! | request       | `wc_init`            | `{relayUrl, projectId, metadata}`                | `{}`      |
//! | request       | `wc_connect`         | `{approvalId, pairingTopic, requiredNamespaces}` | `{uri?}`  |
//! | request       | `wc_disconnect`      | `{topic, reason: {code, message}}`               | `{}`      |
//! | notification  | `wc_sessionApproved` | `{approvalId, session}`                          |           |
//! | notification  | `wc_sessionRejected` | `{approvalId, message}`                          |           |
//!
//! Closing the socket fails every pending request and approval.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::session::types::Session;

use super::{
    ClientOptions, ConnectParams, DisconnectReason, PendingSession, RelayClient,
    RelayClientFactory,
};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Configuration for the bridge client
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Agent WebSocket URL
    pub url: String,
    /// Timeout for RPC responses (not for wallet approval)
    pub request_timeout_ms: u64,
    /// Keepalive ping interval in seconds
    pub ping_interval_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8787".to_string(),
            request_timeout_ms: 15000,
            ping_interval_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Any frame the agent sends
#[derive(Debug, Deserialize)]
struct IncomingFrame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RpcError>,
    method: Option<String>,
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovedParams {
    approval_id: String,
    session: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectedParams {
    approval_id: String,
    #[serde(default)]
    message: String,
}

struct Shared {
    sink: Mutex<WsSink>,
    next_id: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<Result<Value>>>,
    approvals: DashMap<String, oneshot::Sender<Result<Session>>>,
    closed: AtomicBool,
    request_timeout_ms: u64,
}

impl Shared {
    async fn send_text(&self, text: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::RelayTransport("bridge connection closed".to_string()));
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("Bridge request {} ({})", method, id);
        if let Err(e) = self.send_text(frame.to_string()).await {
            self.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(Duration::from_millis(self.request_timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::RelayTransport(format!(
                "bridge closed before answering {}",
                method
            ))),
            Err(_) => {
                self.pending.remove(&id);
                Err(Error::RelayTimeout(self.request_timeout_ms))
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        let frame: IncomingFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Unparseable bridge frame: {}", e);
                return;
            }
        };

        if let Some(method) = frame.method {
            self.handle_notification(&method, frame.params.unwrap_or(Value::Null));
            return;
        }

        let Some(id) = frame.id else {
            let preview: String = text.chars().take(100).collect();
            debug!("Bridge frame without id or method: {}", preview);
            return;
        };

        let outcome = match (frame.error, frame.result) {
            (Some(err), _) => Err(Error::RelayRpc {
                code: err.code,
                message: err.message,
            }),
            (None, result) => Ok(result.unwrap_or(Value::Null)),
        };

        match self.pending.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(outcome);
            }
            None => debug!("Response for unknown request {}", id),
        }
    }

    fn handle_notification(&self, method: &str, params: Value) {
        match method {
            "wc_sessionApproved" => match serde_json::from_value::<ApprovedParams>(params) {
                Ok(p) => {
                    let outcome = serde_json::from_value::<Session>(p.session)
                        .map_err(|e| Error::InvalidSession(e.to_string()))
                        .and_then(|session| session.validate().map(|_| session));
                    self.settle_approval(&p.approval_id, outcome);
                }
                Err(e) => warn!("Malformed wc_sessionApproved: {}", e),
            },
            "wc_sessionRejected" => match serde_json::from_value::<RejectedParams>(params) {
                Ok(p) => {
                    let message = if p.message.is_empty() {
                        "proposal rejected".to_string()
                    } else {
                        p.message
                    };
                    self.settle_approval(&p.approval_id, Err(Error::SessionRejected(message)));
                }
                Err(e) => warn!("Malformed wc_sessionRejected: {}", e),
            },
            other => debug!("Unhandled bridge notification: {}", other),
        }
    }

    fn settle_approval(&self, approval_id: &str, outcome: Result<Session>) {
        match self.approvals.remove(approval_id) {
            Some((_, tx)) => {
                let _ = tx.send(outcome);
            }
            None => debug!("Approval {} has no waiting connect", approval_id),
        }
    }

    fn fail_all(&self, reason: &str) {
        self.closed.store(true, Ordering::SeqCst);

        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(Error::RelayTransport(reason.to_string())));
            }
        }

        let approvals: Vec<String> = self.approvals.iter().map(|e| e.key().clone()).collect();
        for approval_id in approvals {
            if let Some((_, tx)) = self.approvals.remove(&approval_id) {
                let _ = tx.send(Err(Error::RelayTransport(reason.to_string())));
            }
        }
    }
}

/// Relay client speaking JSON-RPC to the relay agent
pub struct BridgeClient {
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
}

impl BridgeClient {
    /// Open the WebSocket to the agent
    pub async fn open(config: &BridgeConfig) -> Result<Self> {
        let url = url::Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid bridge URL: {}", e)))?;

        info!("Connecting to relay agent at {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::RelayInit(format!("WebSocket connect failed: {}", e)))?;

        let (write, mut read) = ws_stream.split();
        let shared = Arc::new(Shared {
            sink: Mutex::new(write),
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
            approvals: DashMap::new(),
            closed: AtomicBool::new(false),
            request_timeout_ms: config.request_timeout_ms,
        });

        let reader_shared = Arc::clone(&shared);
        let ping_interval = Duration::from_secs(config.ping_interval_secs.max(1));
        let reader = tokio::spawn(async move {
            let mut ping_timer = tokio::time::interval(ping_interval);
            ping_timer.tick().await;

            loop {
                tokio::select! {
                    _ = ping_timer.tick() => {
                        let mut sink = reader_shared.sink.lock().await;
                        if let Err(e) = sink.send(Message::Ping(vec![])).await {
                            error!("Failed to send ping: {}", e);
                            break;
                        }
                        debug!("Sent ping");
                    }

                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => reader_shared.handle_frame(&text),
                            Some(Ok(Message::Pong(_))) => debug!("Received pong"),
                            Some(Ok(Message::Close(_))) => {
                                info!("Relay agent closed the connection");
                                break;
                            }
                            Some(Err(e)) => {
                                error!("Bridge WebSocket error: {}", e);
                                break;
                            }
                            None => {
                                info!("Bridge stream ended");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }

            reader_shared.fail_all("bridge connection closed");
        });

        Ok(Self { shared, reader })
    }

    /// Hand the relay options to the agent
    pub async fn init(&self, options: &ClientOptions) -> Result<()> {
        let params = serde_json::to_value(options)?;
        self.shared
            .request("wc_init", params)
            .await
            .map_err(|e| match e {
                Error::RelayRpc { code, message } => {
                    Error::RelayInit(format!("agent refused init ({}): {}", code, message))
                }
                other => other,
            })?;
        Ok(())
    }

    /// Whether the socket to the agent is gone
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl RelayClient for BridgeClient {
    async fn connect(&self, params: ConnectParams) -> Result<PendingSession> {
        let approval_id = format!(
            "approval-{}",
            self.shared.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let (tx, rx) = oneshot::channel();
        self.shared.approvals.insert(approval_id.clone(), tx);

        let mut body = serde_json::to_value(&params)?;
        if let Value::Object(map) = &mut body {
            map.insert("approvalId".to_string(), Value::String(approval_id.clone()));
        }

        let result = match self.shared.request("wc_connect", body).await {
            Ok(result) => result,
            Err(e) => {
                self.shared.approvals.remove(&approval_id);
                return Err(e);
            }
        };

        let uri = result
            .get("uri")
            .and_then(Value::as_str)
            .map(str::to_string);

        let approval = async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::RelayTransport(
                    "bridge closed before wallet approval".to_string(),
                )),
            }
        }
        .boxed();

        Ok(PendingSession { uri, approval })
    }

    async fn disconnect(&self, topic: &str, reason: DisconnectReason) -> Result<()> {
        self.shared
            .request("wc_disconnect", json!({ "topic": topic, "reason": reason }))
            .await?;
        Ok(())
    }
}

/// Creates `BridgeClient`s against one agent endpoint
pub struct BridgeClientFactory {
    config: BridgeConfig,
}

impl BridgeClientFactory {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RelayClientFactory for BridgeClientFactory {
    async fn create(&self, options: &ClientOptions) -> Result<Arc<dyn RelayClient>> {
        let client = BridgeClient::open(&self.config).await?;
        client.init(options).await?;
        info!("Relay client ready (relay: {})", options.relay_url);
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainId;
    use crate::session::types::fixtures::session_json;
    use crate::session::types::AppMetadata;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[derive(Clone, Copy)]
    enum AgentMode {
        Approve,
        Reject,
        Silent,
        HangUp,
    }

    /// Minimal relay agent answering one client
    async fn spawn_agent(mode: AgentMode) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else { continue };
                let req: Value = serde_json::from_str(&text).unwrap();
                let id = req["id"].clone();
                let method = req["method"].as_str().unwrap_or_default().to_string();

                match (method.as_str(), mode) {
                    ("wc_connect", AgentMode::Silent) => continue,
                    ("wc_connect", AgentMode::HangUp) => {
                        let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"uri": "wc:t@2"}});
                        ws.send(Message::Text(reply.to_string())).await.unwrap();
                        ws.close(None).await.ok();
                        return;
                    }
                    ("wc_connect", _) => {
                        let approval_id = req["params"]["approvalId"].clone();
                        let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"uri": "wc:t@2"}});
                        ws.send(Message::Text(reply.to_string())).await.unwrap();

                        let notification = match mode {
                            AgentMode::Approve => {
                                let session: Value = serde_json::from_str(&session_json(
                                    "topic-1",
                                    "stacks:2147483648:SP3FBR2AGK5H9QBDH3EEN6DF8EK8JY7RX8QJ5SVTE",
                                ))
                                .unwrap();
                                json!({
                                    "jsonrpc": "2.0",
                                    "method": "wc_sessionApproved",
                                    "params": {"approvalId": approval_id, "session": session}
                                })
                            }
                            _ => json!({
                                "jsonrpc": "2.0",
                                "method": "wc_sessionRejected",
                                "params": {"approvalId": approval_id, "message": "User rejected"}
                            }),
                        };
                        ws.send(Message::Text(notification.to_string())).await.unwrap();
                    }
                    ("wc_disconnect", _) => {
                        let reply = json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": 6100, "message": "No matching session"}
                        });
                        ws.send(Message::Text(reply.to_string())).await.unwrap();
                    }
                    _ => {
                        let reply = json!({"jsonrpc": "2.0", "id": id, "result": {}});
                        ws.send(Message::Text(reply.to_string())).await.unwrap();
                    }
                }
            }
        });

        format!("ws://{}", addr)
    }

    fn options() -> ClientOptions {
        ClientOptions {
            relay_url: "wss://relay.walletconnect.com".to_string(),
            project_id: "test".to_string(),
            metadata: AppMetadata {
                name: "Full Range AMM".to_string(),
                description: String::new(),
                url: String::new(),
                icons: vec![],
            },
        }
    }

    async fn client(mode: AgentMode, timeout_ms: u64) -> Arc<dyn RelayClient> {
        let url = spawn_agent(mode).await;
        let factory = BridgeClientFactory::new(BridgeConfig {
            url,
            request_timeout_ms: timeout_ms,
            ping_interval_secs: 30,
        });
        factory.create(&options()).await.unwrap()
    }

    fn stacks_params() -> ConnectParams {
        let chain: ChainId = "stacks:2147483648".parse().unwrap();
        ConnectParams::for_chain(&chain)
    }

    #[tokio::test]
    async fn test_connect_approved() {
        let client = client(AgentMode::Approve, 5000).await;

        let pending = client.connect(stacks_params()).await.unwrap();
        assert_eq!(pending.uri.as_deref(), Some("wc:t@2"));

        let session = pending.approval.await.unwrap();
        assert_eq!(session.topic, "topic-1");
        assert!(session.namespaces.contains_key("stacks"));
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let client = client(AgentMode::Reject, 5000).await;

        let pending = client.connect(stacks_params()).await.unwrap();
        let result = pending.approval.await;
        assert!(matches!(result, Err(Error::SessionRejected(msg)) if msg == "User rejected"));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let client = client(AgentMode::Silent, 100).await;
        let result = client.connect(stacks_params()).await;
        assert!(matches!(result, Err(Error::RelayTimeout(100))));
    }

    #[tokio::test]
    async fn test_hang_up_fails_approval() {
        let client = client(AgentMode::HangUp, 5000).await;

        let pending = client.connect(stacks_params()).await.unwrap();
        let result = pending.approval.await;
        assert!(matches!(result, Err(Error::RelayTransport(_))));
    }

    #[tokio::test]
    async fn test_disconnect_rpc_error() {
        let client = client(AgentMode::Approve, 5000).await;
        let result = client
            .disconnect("topic-1", DisconnectReason::user_disconnected())
            .await;
        assert!(matches!(result, Err(Error::RelayRpc { code: 6100, .. })));
    }

    #[tokio::test]
    async fn test_unreachable_agent() {
        let factory = BridgeClientFactory::new(BridgeConfig {
            url: "ws://127.0.0.1:1".to_string(),
            ..BridgeConfig::default()
        });
        let result = factory.create(&options()).await;
        assert!(matches!(result, Err(Error::RelayInit(_))));
    }
}
