//! Key/value scratch context shared between an agent and its tools.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Prefix of the transient system turn that carries the context.
pub const CONTEXT_TURN_PREFIX: &str = "Current context:\n";

/// Cheaply cloneable handle to an agent's scratch context.
///
/// Keys are kept ordered so the serialized form is stable across calls.
#[derive(Debug, Clone, Default)]
pub struct ScratchContext {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl ScratchContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or overwrite a value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Point-in-time copy of all entries.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    /// Render the context as a system turn body, or `None` when empty.
    pub fn render(&self) -> Option<String> {
        let entries = self.read();
        if entries.is_empty() {
            return None;
        }
        let json = serde_json::to_string_pretty(&*entries).ok()?;
        Some(format!("{CONTEXT_TURN_PREFIX}{json}"))
    }
}
