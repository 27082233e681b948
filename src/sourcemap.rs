//! Cache of template URI → the source map from the last successful
//! generation.
//!
//! Entries only move forward on a successful parse+generate, so a template
//! that currently fails to parse keeps translating positions against its
//! last good map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::engine::SourceMap;

pub struct SourceMapCache<M: SourceMap> {
    maps: Mutex<HashMap<String, Arc<M>>>,
}

impl<M: SourceMap> Default for SourceMapCache<M> {
    fn default() -> Self {
        Self {
            maps: Mutex::new(HashMap::new()),
        }
    }
}

impl<M: SourceMap> SourceMapCache<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, uri: &str, map: Arc<M>) {
        self.lock().insert(uri.to_string(), map);
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Arc<M>> {
        self.lock().get(uri).cloned()
    }

    pub fn delete(&self, uri: &str) {
        self.lock().remove(uri);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<M>>> {
        self.maps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
