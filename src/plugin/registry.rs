//! Process-wide plugin registry.
//!
//! # Design Decisions
//! - Read/write lock over a name map: reads happen on every reload for
//!   every API, writes only at startup (and rarely after).
//! - Constructed once and passed by reference into every component that
//!   resolves plugins; no implicit global state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::plugin::Plugin;

#[derive(Default)]
pub struct Registry {
    plugins: RwLock<HashMap<String, Arc<dyn Plugin>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
        }
    }

    /// Register plugins under their own names. Re-registering a name
    /// replaces the previous entry.
    pub fn add(&self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) {
        let mut map = self.plugins.write().expect("plugin registry lock poisoned");

        for plugin in plugins {
            map.insert(plugin.name().to_string(), plugin);
        }
    }

    /// Look up a plugin by name. An unregistered name is `None`, never a
    /// fault.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .expect("plugin registry lock poisoned")
            .get(name)
            .cloned()
    }
}
