//! CDP Session - Represents a connection to a specific browser target
//!
//! Design: Lightweight wrapper around CDPClient with target-specific context.
//! All sessions share the same WebSocket - no per-session connection overhead.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::client::{CDPClient, EventCallback, Result, SubscriptionId};
use super::protocol::{
    AttachToTargetResult, CDPEvent, CreateTargetResult, GetTargetInfoResult, SessionId, TargetId,
    TargetInfo,
};

/// `sourceURL` stamped on every expression sent through [`CDPSession::evaluate`].
///
/// Instrumentation that watches `Debugger.scriptParsed` uses it to tell the
/// driver's own code apart from the page's.
pub const EVALUATION_SCRIPT_URL: &str = "__cdp_evaluation_script__";

/// What a consumer needs from a protocol connection: commands plus events.
///
/// Implemented by [`CDPSession`] for real targets; tests provide scripted ones.
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// Send a command and wait for its result
    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// Register a callback for an event method
    fn subscribe(&self, method: &str, callback: EventCallback) -> SubscriptionId;

    /// Drop a registration made with [`ProtocolSession::subscribe`]
    fn unsubscribe(&self, id: SubscriptionId);
}

/// CDP Session bound to a specific target
#[derive(Clone)]
pub struct CDPSession {
    /// Shared CDP client
    client: Arc<CDPClient>,

    /// Target this session is attached to
    pub target_id: TargetId,

    /// Session ID assigned by Chrome
    pub session_id: SessionId,

    /// Cached target info
    pub title: String,
    pub url: String,
}

impl CDPSession {
    /// Attach to a target and create session
    ///
    /// No domains are enabled here; each consumer enables what it needs and
    /// disables it again when done.
    pub async fn attach(client: Arc<CDPClient>, target_id: TargetId) -> Result<Self> {
        let result = client
            .send_request(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true,
                })),
                None,
            )
            .await?;

        let attach_result: AttachToTargetResult = serde_json::from_value(result)?;
        let session_id = attach_result.session_id;

        let info_result = client
            .send_request(
                "Target.getTargetInfo",
                Some(json!({ "targetId": &target_id })),
                None,
            )
            .await?;

        let target_info = serde_json::from_value::<GetTargetInfoResult>(info_result)?.target_info;

        tracing::debug!("Attached to {} as session {}", target_id, session_id);

        Ok(Self {
            client,
            target_id,
            session_id,
            title: target_info.title,
            url: target_info.url,
        })
    }

    /// Create a new page target and attach to it
    pub async fn create(client: Arc<CDPClient>, url: &str) -> Result<Self> {
        let result = client
            .send_request("Target.createTarget", Some(json!({ "url": url })), None)
            .await?;

        let created: CreateTargetResult = serde_json::from_value(result)?;
        Self::attach(client, created.target_id).await
    }

    /// Get current target info
    pub async fn get_target_info(&self) -> Result<TargetInfo> {
        let result = self
            .client
            .send_request(
                "Target.getTargetInfo",
                Some(json!({ "targetId": &self.target_id })),
                None,
            )
            .await?;

        Ok(serde_json::from_value::<GetTargetInfoResult>(result)?.target_info)
    }

    /// Navigate to URL
    pub async fn navigate(&self, url: impl Into<String>) -> Result<Value> {
        ProtocolSession::send(self, "Page.navigate", Some(json!({ "url": url.into() }))).await
    }

    /// Evaluate JavaScript
    pub async fn evaluate(&self, expression: impl Into<String>) -> Result<Value> {
        let expression: String = expression.into();
        ProtocolSession::send(
            self,
            "Runtime.evaluate",
            Some(json!({
                "expression": tag_expression(&expression),
                "returnByValue": true,
                "awaitPromise": true,
            })),
        )
        .await
    }
}

#[async_trait]
impl ProtocolSession for CDPSession {
    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.client
            .send_request(method, params, Some(self.session_id.clone()))
            .await
    }

    /// Only events addressed to this session reach the callback
    fn subscribe(&self, method: &str, callback: EventCallback) -> SubscriptionId {
        let session_id = self.session_id.clone();
        self.client.subscribe(
            method,
            Arc::new(move |event: CDPEvent| {
                if event.session_id.as_deref() == Some(session_id.as_str()) {
                    callback(event);
                }
            }),
        )
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.client.unsubscribe(id);
    }
}

fn tag_expression(expression: &str) -> String {
    format!("{expression}\n//# sourceURL={EVALUATION_SCRIPT_URL}")
}
