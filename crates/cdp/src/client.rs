//! CDP Client - The Core Communication Layer
//!
//! Design decisions:
//! 1. Single WebSocket per browser connection (no per-session WS overhead)
//! 2. Outbound frames go through a channel to a dedicated writer task
//! 3. Request/response matching via ID, events fanned out to subscribers
//! 4. Subscriptions are handles - whoever subscribes is expected to unsubscribe

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::protocol::*;

/// Messages the browser uses when an id handed out earlier is no longer valid
/// (the page navigated, the sheet was removed, the body was evicted...).
const RESOURCE_GONE_MESSAGES: &[&str] = &[
    "No script for id",
    "No style sheet with given id found",
    "No resource with given identifier found",
    "No resource with given id was found",
    "Session with given id not found",
];

#[derive(Error, Debug)]
pub enum CDPError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CDP protocol error: {code} - {message}")]
    Protocol { code: i32, message: String },

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Connection closed")]
    Closed,
}

impl CDPError {
    /// True when the browser rejected a command because the referenced
    /// script, stylesheet or resource no longer exists.
    pub fn is_resource_gone(&self) -> bool {
        match self {
            CDPError::Protocol { message, .. } => RESOURCE_GONE_MESSAGES
                .iter()
                .any(|pattern| message.contains(pattern)),
            _ => false,
        }
    }
}

impl From<CDPErrorBody> for CDPError {
    fn from(error: CDPErrorBody) -> Self {
        CDPError::Protocol {
            code: error.code,
            message: error.message,
        }
    }
}

/// Result type for CDP operations
pub type Result<T> = std::result::Result<T, CDPError>;

/// Event subscriber callback
pub type EventCallback = Arc<dyn Fn(CDPEvent) + Send + Sync>;

/// Handle returned by [`CDPClient::subscribe`], used to unsubscribe
pub type SubscriptionId = u64;

/// In-flight requests by id
type Pending = DashMap<RequestId, oneshot::Sender<CDPResponse>>;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    callback: EventCallback,
}

/// CDP Client - manages single WebSocket connection to browser
pub struct CDPClient {
    /// Monotonic request ID counter
    next_id: AtomicU64,

    /// Monotonic subscription handle counter
    next_subscription: AtomicU64,

    /// Pending requests waiting for responses
    /// Key: request_id, Value: oneshot sender for response
    pending: Arc<Pending>,

    /// Event subscribers
    /// Key: method name (e.g., "Debugger.scriptParsed"), Value: registrations in order
    subscribers: Arc<DashMap<String, Vec<Subscriber>>>,

    /// Outbound frames, drained by the writer task
    outbound: mpsc::UnboundedSender<Message>,

    /// Set once either socket task has exited; no response can arrive after that
    closed: Arc<AtomicBool>,
}

/// Mark the connection dead and fail every waiter with `Closed`
fn shut_down(closed: &AtomicBool, pending: &Pending) {
    // Flag before clearing: a request inserted after the clear sees the flag
    closed.store(true, Ordering::SeqCst);
    pending.clear();
}

impl CDPClient {
    /// Connect to Chrome DevTools Protocol endpoint
    pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
        let endpoint =
            url::Url::parse(ws_url).map_err(|e| CDPError::InvalidUrl(format!("{ws_url}: {e}")))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(CDPError::InvalidUrl(format!(
                "{ws_url}: expected ws:// or wss://"
            )));
        }

        let (ws_stream, _) = connect_async(ws_url).await?;
        let (mut sink, mut stream) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        let client = Self::detached(outbound);

        // Writer task: owns the sink, exits after a close frame or when all senders are gone
        let closed = client.closed.clone();
        let pending = client.pending.clone();
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    tracing::error!("Failed to write frame: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            shut_down(&closed, &pending);
        });

        // Reader task
        let client_clone = client.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = client_clone.handle_message(&text) {
                            tracing::error!("Failed to handle message: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Dropping the senders wakes every waiter with Closed
            shut_down(&client_clone.closed, &client_clone.pending);
        });

        Ok(client)
    }

    /// Build a client around an outbound channel without a socket behind it
    pub(crate) fn detached(outbound: mpsc::UnboundedSender<Message>) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            next_subscription: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            subscribers: Arc::new(DashMap::new()),
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// True once the socket is gone; every request fails with `Closed` from then on
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send CDP request and wait for response
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CDPRequest {
            id,
            method: method.into(),
            params,
            session_id,
        };

        let json = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if self.is_closed() || self.outbound.send(Message::Text(json)).is_err() {
            self.pending.remove(&id);
            return Err(CDPError::Closed);
        }

        let response = rx.await.map_err(|_| CDPError::Closed)?;
        Ok(response.into_result()?)
    }

    /// Subscribe to CDP events
    pub fn subscribe(&self, method: impl Into<String>, callback: EventCallback) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let method = method.into();
        tracing::debug!("Subscribed #{} to {}", id, method);
        self.subscribers
            .entry(method)
            .or_default()
            .push(Subscriber { id, callback });
        id
    }

    /// Remove a single subscription. Returns false if the handle was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for mut entry in self.subscribers.iter_mut() {
            let before = entry.len();
            entry.retain(|s| s.id != id);
            if entry.len() != before {
                removed = true;
                break;
            }
        }
        self.subscribers.retain(|_, subs| !subs.is_empty());
        if removed {
            tracing::debug!("Unsubscribed #{}", id);
        }
        removed
    }

    /// Number of live subscriptions across all methods
    pub fn subscription_count(&self) -> usize {
        self.subscribers.iter().map(|entry| entry.len()).sum()
    }

    /// Handle incoming WebSocket message
    fn handle_message(&self, text: &str) -> Result<()> {
        match CDPMessage::parse(text)? {
            CDPMessage::Response(response) => {
                if let Some((_, tx)) = self.pending.remove(&response.id) {
                    let _ = tx.send(response); // Ignore send errors (receiver dropped)
                } else {
                    tracing::warn!("Received response for unknown request: {}", response.id);
                }
            }
            CDPMessage::Event(event) => self.dispatch(event),
        }

        Ok(())
    }

    /// Deliver an event to every callback registered for its method
    pub fn dispatch(&self, event: CDPEvent) {
        // Snapshot first so callbacks may (un)subscribe without deadlocking the map
        let callbacks: Vec<EventCallback> = match self.subscribers.get(&event.method) {
            Some(subs) => subs.iter().map(|s| s.callback.clone()).collect(),
            None => return,
        };
        for callback in callbacks {
            callback(event.clone());
        }
    }

    /// Close connection gracefully
    pub async fn close(self: Arc<Self>) -> Result<()> {
        self.outbound
            .send(Message::Close(None))
            .map_err(|_| CDPError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn detached_client() -> (Arc<CDPClient>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CDPClient::detached(tx), rx)
    }

    async fn next_request(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        match rx.recv().await {
            Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("Expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_response_correlation() {
        let (client, mut rx) = detached_client();

        let pending = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .send_request("Debugger.getScriptSource", Some(json!({"scriptId": "9"})), None)
                    .await
            }
        });

        let request = next_request(&mut rx).await;
        assert_eq!(request["method"], "Debugger.getScriptSource");
        assert_eq!(request["params"]["scriptId"], "9");

        let reply = json!({ "id": request["id"], "result": { "scriptSource": "let a;" } });
        client.handle_message(&reply.to_string()).unwrap();

        let result = pending.await.unwrap().unwrap();
        assert_eq!(result["scriptSource"], "let a;");
    }

    #[tokio::test]
    async fn test_protocol_error_surfaces() {
        let (client, mut rx) = detached_client();

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.send_request("CSS.getStyleSheetText", None, None).await }
        });

        let request = next_request(&mut rx).await;
        let reply = json!({
            "id": request["id"],
            "error": { "code": -32000, "message": "No style sheet with given id found" }
        });
        client.handle_message(&reply.to_string()).unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, CDPError::Protocol { code: -32000, .. }));
        assert!(err.is_resource_gone());
    }

    #[tokio::test]
    async fn test_send_after_writer_gone() {
        let (client, rx) = detached_client();
        drop(rx);

        let err = client.send_request("Profiler.enable", None, None).await.unwrap_err();
        assert!(matches!(err, CDPError::Closed));
        assert!(!err.is_resource_gone());
    }

    #[tokio::test]
    async fn test_send_after_remote_close_fails_fast() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Browser stand-in: accept the handshake, then hang up
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let client = CDPClient::connect(&format!("ws://{addr}")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !client.is_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client never noticed the close");

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            client.send_request("Profiler.takePreciseCoverage", None, None),
        )
        .await
        .expect("send_request hung after the socket closed");
        assert!(matches!(result, Err(CDPError::Closed)));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_flag_rejects_new_requests() {
        let (client, _rx) = detached_client();
        shut_down(&client.closed, &client.pending);
        assert!(client.is_closed());

        let result = client.send_request("Profiler.enable", None, None).await;
        assert!(matches!(result, Err(CDPError::Closed)));
        assert!(client.pending.is_empty());
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let (client, _rx) = detached_client();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = client.subscribe("Runtime.executionContextsCleared", {
            let hits = hits.clone();
            Arc::new(move |_: CDPEvent| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        });
        let _second = client.subscribe("Runtime.executionContextsCleared", {
            let hits = hits.clone();
            Arc::new(move |_: CDPEvent| {
                hits.fetch_add(10, Ordering::SeqCst);
            })
        });
        assert_eq!(client.subscription_count(), 2);

        let message = json!({ "method": "Runtime.executionContextsCleared", "params": {} });
        client.handle_message(&message.to_string()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 11);

        assert!(client.unsubscribe(first));
        assert!(!client.unsubscribe(first));
        client.handle_message(&message.to_string()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 21);
        assert_eq!(client.subscription_count(), 1);
    }

    #[test]
    fn test_unknown_response_is_ignored() {
        let (client, _rx) = detached_client();
        client
            .handle_message(&json!({ "id": 999, "result": {} }).to_string())
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_url() {
        let err = CDPClient::connect("http://localhost:9222").await.err().unwrap();
        assert!(matches!(err, CDPError::InvalidUrl(_)));
    }

    #[tokio::test]
    #[ignore] // Needs running Chrome
    async fn test_connect() {
        let client = CDPClient::connect("ws://localhost:9222/devtools/browser")
            .await
            .unwrap();

        let result = client
            .send_request("Browser.getVersion", None, None)
            .await
            .unwrap();

        println!("Browser version: {:?}", result);
    }
}
