//! In-process session cache
//!
//! Populated on read miss, overwritten on every write. Nothing else
//! invalidates it; it lives as long as the owning `SessionStore`.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::Session;

#[derive(Debug, Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<String, Session>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.entries.read().get(id).cloned()
    }

    pub fn put(&self, session: &Session) {
        self.entries
            .write()
            .insert(session.id.clone(), session.clone());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
