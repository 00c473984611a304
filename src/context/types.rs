//! Foreground application context shared between the probe and the analyzer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// One probe result. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppContext {
    /// Foreground application name, empty when unknown
    pub active: String,
    /// Running process names, at most the configured limit
    pub running: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl AppContext {
    pub fn new(active: impl Into<String>, running: Vec<String>) -> Self {
        Self {
            active: active.into(),
            running,
            fetched_at: Utc::now(),
        }
    }

    /// Context before the first probe.
    pub fn empty() -> Self {
        Self::new(String::new(), Vec::new())
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::empty()
    }
}

/// Latest known context. Single writer (the probe), many readers.
#[derive(Debug, Default)]
pub struct ContextCache {
    current: RwLock<Arc<AppContext>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedContextCache {
        Arc::new(Self::new())
    }

    /// The latest context, however stale.
    pub fn latest(&self) -> Arc<AppContext> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new context.
    pub fn replace(&self, context: AppContext) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(context);
    }
}

pub type SharedContextCache = Arc<ContextCache>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_starts_empty() {
        let cache = ContextCache::new();
        let latest = cache.latest();
        assert!(latest.active.is_empty());
        assert!(latest.running.is_empty());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let cache = ContextCache::new();
        cache.replace(AppContext::new("Terminal", vec!["zsh".into(), "Terminal".into()]));
        let held = cache.latest();

        cache.replace(AppContext::new("Figma", Vec::new()));

        assert_eq!(cache.latest().active, "Figma");
        assert!(cache.latest().running.is_empty());
        // Readers holding the old snapshot are unaffected
        assert_eq!(held.active, "Terminal");
        assert_eq!(held.running.len(), 2);
    }
}
