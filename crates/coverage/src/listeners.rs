//! Listener bookkeeping
//!
//! A collector subscribes to a few event methods on `start` and must drop
//! every one of them on `stop`. `Listeners` remembers the handles so
//! teardown is a single call.

use cdp::{CDPEvent, ProtocolSession, SubscriptionId};
use std::sync::Arc;

use crate::events::CoverageEvent;

/// Handler invoked with an already-parsed event
pub type EventHandler = Arc<dyn Fn(CoverageEvent) + Send + Sync>;

#[derive(Debug, Default)]
pub struct Listeners {
    subscriptions: Vec<SubscriptionId>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `method`; raw events are parsed before delivery
    pub fn add(&mut self, session: &dyn ProtocolSession, method: &str, handler: EventHandler) {
        let id = session.subscribe(
            method,
            Arc::new(move |event: CDPEvent| match CoverageEvent::from_cdp(&event) {
                Ok(Some(parsed)) => handler(parsed),
                Ok(None) => {}
                Err(e) => tracing::warn!("Ignoring malformed {} event: {}", event.method, e),
            }),
        );
        self.subscriptions.push(id);
    }

    /// Unsubscribe everything added so far
    pub fn remove_all(&mut self, session: &dyn ProtocolSession) {
        for id in self.subscriptions.drain(..) {
            session.unsubscribe(id);
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EXECUTION_CONTEXTS_CLEARED, SCRIPT_PARSED};
    use crate::mock::MockSession;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_add_dispatch_remove() {
        let session = MockSession::new();
        let seen: Arc<Mutex<Vec<CoverageEvent>>> = Arc::default();
        let mut listeners = Listeners::new();

        for method in [SCRIPT_PARSED, EXECUTION_CONTEXTS_CLEARED] {
            let seen = seen.clone();
            listeners.add(
                &session,
                method,
                Arc::new(move |event: CoverageEvent| seen.lock().push(event)),
            );
        }
        assert_eq!(listeners.len(), 2);
        assert_eq!(session.subscription_count(), 2);

        session.emit(SCRIPT_PARSED, json!({ "scriptId": "1", "url": "a.js" }));
        session.emit(SCRIPT_PARSED, json!({ "bogus": true }));
        session.emit(EXECUTION_CONTEXTS_CLEARED, json!({}));
        assert_eq!(
            *seen.lock(),
            vec![
                CoverageEvent::ScriptParsed {
                    script_id: "1".to_string(),
                    url: "a.js".to_string()
                },
                CoverageEvent::ExecutionContextsCleared,
            ]
        );

        listeners.remove_all(&session);
        assert!(listeners.is_empty());
        assert_eq!(session.subscription_count(), 0);

        session.emit(EXECUTION_CONTEXTS_CLEARED, json!({}));
        assert_eq!(seen.lock().len(), 2);
    }
}
