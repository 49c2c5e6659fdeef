//! Scripted in-memory protocol session for tests

use async_trait::async_trait;
use cdp::{CDPError, CDPEvent, EventCallback, ProtocolSession, SubscriptionId};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Notify;

type Reply = Result<Value, String>;

struct Rule {
    method: String,
    params: Option<Value>,
    reply: Reply,
}

#[derive(Default)]
struct State {
    next_subscription: SubscriptionId,
    subscribers: Vec<(SubscriptionId, String, EventCallback)>,
    rules: Vec<Rule>,
    gates: Vec<(String, Arc<Notify>)>,
    sent: Vec<(String, Option<Value>)>,
}

#[derive(Default)]
pub struct MockSession {
    state: Mutex<State>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every `method` call with `result`
    pub fn on(&self, method: &str, result: Value) {
        self.push_rule(method, None, Ok(result));
    }

    /// Reply to `method` called with exactly `params`
    pub fn on_params(&self, method: &str, params: Value, result: Value) {
        self.push_rule(method, Some(params), Ok(result));
    }

    /// Fail every `method` call with a protocol error
    pub fn fail(&self, method: &str, message: &str) {
        self.push_rule(method, None, Err(message.to_string()));
    }

    /// Fail `method` called with exactly `params`
    pub fn fail_params(&self, method: &str, params: Value, message: &str) {
        self.push_rule(method, Some(params), Err(message.to_string()));
    }

    /// Hold every `method` call until the returned handle is notified once per call
    pub fn gate(&self, method: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.state
            .lock()
            .gates
            .push((method.to_string(), notify.clone()));
        notify
    }

    /// Deliver an event to the current subscribers of `method`
    pub fn emit(&self, method: &str, params: Value) {
        let callbacks: Vec<EventCallback> = self
            .state
            .lock()
            .subscribers
            .iter()
            .filter(|(_, m, _)| m == method)
            .map(|(_, _, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(CDPEvent::new(method, Some(params.clone())));
        }
    }

    /// Methods sent so far, in order
    pub fn sent_methods(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Params of the first call to `method`
    pub fn params_of(&self, method: &str) -> Option<Value> {
        self.state
            .lock()
            .sent
            .iter()
            .find(|(m, _)| m == method)
            .and_then(|(_, params)| params.clone())
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    fn push_rule(&self, method: &str, params: Option<Value>, reply: Reply) {
        self.state.lock().rules.push(Rule {
            method: method.to_string(),
            params,
            reply,
        });
    }

    fn reply_for(&self, method: &str, params: &Option<Value>) -> Reply {
        let state = self.state.lock();
        let exact = state
            .rules
            .iter()
            .find(|rule| rule.method == method && rule.params.is_some() && rule.params == *params);
        let fallback = || {
            state
                .rules
                .iter()
                .find(|rule| rule.method == method && rule.params.is_none())
        };
        match exact.or_else(fallback) {
            Some(rule) => rule.reply.clone(),
            None => Ok(json!({})),
        }
    }
}

#[async_trait]
impl ProtocolSession for MockSession {
    async fn send(&self, method: &str, params: Option<Value>) -> cdp::Result<Value> {
        let gate = {
            let mut state = self.state.lock();
            state.sent.push((method.to_string(), params.clone()));
            state
                .gates
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, notify)| notify.clone())
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.reply_for(method, &params)
            .map_err(|message| CDPError::Protocol {
                code: -32000,
                message,
            })
    }

    fn subscribe(&self, method: &str, callback: EventCallback) -> SubscriptionId {
        let mut state = self.state.lock();
        state.next_subscription += 1;
        let id = state.next_subscription;
        state.subscribers.push((id, method.to_string(), callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.state.lock().subscribers.retain(|(sid, _, _)| *sid != id);
    }
}

/// Let spawned fetch tasks run to completion on the test runtime
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
