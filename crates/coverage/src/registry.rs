//! Source registry
//!
//! Maps the browser's script / stylesheet ids to the URL and text fetched for
//! them. Ids are only meaningful inside one page lifetime: after a reload the
//! browser hands out fresh ones, so the registry is a short-lived lookup
//! table, never a long-term identity.
//!
//! Every reset bumps a generation number. A fetch started before a reset
//! carries the old generation and its late write is refused.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Opaque protocol id (`scriptId` or `styleSheetId`)
pub type SourceId = String;

/// Registry shared between a collector and its event handlers.
///
/// Never hold the lock across an `.await`.
pub type SharedRegistry = Arc<Mutex<SourceRegistry>>;

/// What we know about one parsed script or added stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// `None` for anonymous sources
    pub url: Option<String>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    entries: AHashMap<SourceId, SourceEntry>,
    /// Ids in the order they were recorded, for deterministic reports
    order: Vec<SourceId>,
    generation: u64,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything recorded so far
    pub fn reset(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store a fetched source. Refused (returns false) when the registry has
    /// been reset since `generation` was read.
    pub fn record(
        &mut self,
        generation: u64,
        id: SourceId,
        url: Option<String>,
        text: String,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        if !self.entries.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.entries.insert(id, SourceEntry { url, text });
        true
    }

    pub fn get(&self, id: &str) -> Option<&SourceEntry> {
        self.entries.get(id)
    }

    /// Recorded ids, oldest first
    pub fn ids(&self) -> impl Iterator<Item = &SourceId> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
