//! CDP Protocol Types
//!
//! Envelope types for CDP communication. Domain payloads live with the
//! code that consumes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request ID - monotonically increasing
pub type RequestId = u64;

/// Target ID from Chrome
pub type TargetId = String;

/// Session ID for attached targets
pub type SessionId = String;

/// CDP Request sent to browser
#[derive(Debug, Clone, Serialize)]
pub struct CDPRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// CDP Response from browser
#[derive(Debug, Clone)]
pub struct CDPResponse {
    pub id: RequestId,
    pub result: Option<Value>,
    pub error: Option<CDPErrorBody>,
}

impl CDPResponse {
    /// The command's result, or the browser's error if it reported one.
    /// A reply with neither is a command that returns nothing.
    pub fn into_result(self) -> std::result::Result<Value, CDPErrorBody> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Error object carried by a failed response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CDPErrorBody {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// CDP Event from browser (no request ID)
#[derive(Debug, Clone)]
pub struct CDPEvent {
    pub method: String,
    pub params: Option<Value>,
    pub session_id: Option<SessionId>,
}

impl CDPEvent {
    /// Build an event by hand (tests, synthetic dispatch)
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            session_id: None,
        }
    }
}

/// Anything the browser sends down the socket
#[derive(Debug, Clone)]
pub enum CDPMessage {
    Response(CDPResponse),
    Event(CDPEvent),
}

/// Every field either kind of frame may carry
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    id: Option<RequestId>,
    method: Option<String>,
    params: Option<Value>,
    session_id: Option<SessionId>,
    result: Option<Value>,
    error: Option<CDPErrorBody>,
}

impl CDPMessage {
    /// Route a frame: an `id` makes it a reply, otherwise it must name an event
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let frame: Frame = serde_json::from_str(text)?;
        match (frame.id, frame.method) {
            (Some(id), _) => Ok(CDPMessage::Response(CDPResponse {
                id,
                result: frame.result,
                error: frame.error,
            })),
            (None, Some(method)) => Ok(CDPMessage::Event(CDPEvent {
                method,
                params: frame.params,
                session_id: frame.session_id,
            })),
            (None, None) => Err(serde::de::Error::custom(
                "frame has neither an id nor a method",
            )),
        }
    }
}

/// Target Info from Target.getTargetInfo
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: TargetId,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub attached: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetInfoResult {
    pub target_info: TargetInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
    pub target_id: TargetId,
}

/// Result of Target.attachToTarget
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
    pub session_id: SessionId,
}
