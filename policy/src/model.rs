//! Persisted policy record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hostname::Hostname;
use crate::resolve::resolve;

/// Global default plus per-hostname overrides.
///
/// Serialized as `{"global": bool, "overrides": {host: bool}}`. Missing
/// fields fall back to defaults so a partially written record still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "default_global")]
    pub global: bool,
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
}

fn default_global() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self { global: default_global(), overrides: BTreeMap::new() }
    }
}

impl Policy {
    #[must_use]
    pub fn override_for(&self, hostname: &Hostname) -> Option<bool> {
        self.overrides.get(hostname.as_str()).copied()
    }

    /// Effective decision for a page on `hostname` (or a host-less page).
    pub fn effective<F>(&self, hostname: Option<&Hostname>, site_looks_dark: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let site_override = hostname.and_then(|host| self.override_for(host));
        resolve(self.global, site_override, site_looks_dark)
    }

    pub fn set_global(&mut self, enabled: bool) {
        self.global = enabled;
    }

    pub fn set_override(&mut self, hostname: &Hostname, enabled: bool) {
        self.overrides.insert(hostname.as_str().to_owned(), enabled);
    }

    /// Remove an override. Returns whether one existed.
    pub fn clear_override(&mut self, hostname: &Hostname) -> bool {
        self.overrides.remove(hostname.as_str()).is_some()
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
