//! Background source fetches
//!
//! A parsed/added event only carries an id. The text has to be requested
//! separately, and the page keeps running meanwhile, so each fetch runs as
//! its own task and writes into the registry when (and if) it lands.

use cdp::ProtocolSession;
use serde_json::Value;
use std::sync::Arc;

use crate::registry::{SharedRegistry, SourceId};

/// Turns a command result into source text
pub(crate) type Extract = fn(Value) -> Result<String, serde_json::Error>;

/// One source to fetch: which command to send and how to read its reply
pub(crate) struct SourceFetch {
    pub id: SourceId,
    pub url: Option<String>,
    pub method: &'static str,
    pub params: Value,
    pub extract: Extract,
}

/// Fetch in the background and record into `registry`.
///
/// Failures are logged and dropped; the source simply never appears in the
/// registry. The registry generation is captured now, so a reply arriving
/// after a navigation reset is discarded instead of leaking into the new page.
pub(crate) fn spawn_source_fetch(
    session: Arc<dyn ProtocolSession>,
    registry: SharedRegistry,
    fetch: SourceFetch,
) {
    let generation = registry.lock().generation();

    tokio::spawn(async move {
        let SourceFetch {
            id,
            url,
            method,
            params,
            extract,
        } = fetch;

        let text = match session.send(method, Some(params)).await {
            Ok(value) => match extract(value) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Unexpected {} reply for {}: {}", method, id, e);
                    return;
                }
            },
            Err(e) if e.is_resource_gone() => {
                tracing::debug!("{} for {} failed, source is gone: {}", method, id, e);
                return;
            }
            Err(e) => {
                tracing::warn!("{} for {} failed: {}", method, id, e);
                return;
            }
        };

        let recorded = registry.lock().record(generation, id.clone(), url, text);
        if !recorded {
            tracing::debug!("Discarding source of {} fetched across a reset", id);
        }
    });
}
