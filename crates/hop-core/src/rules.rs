//! Rule table — maps logical service names to backend addresses.
//!
//! The table is the only shared mutable state in the gateway. Every
//! CONNECT request consults it fresh; the control API mutates it at
//! runtime. A single reader/writer lock guards the whole map, so a
//! `clear()` is never observed half-done and an overwrite is never
//! observed half-written.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// A single rule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    /// `host:port` of the backend. Resolved only at dial time.
    target: String,
}

/// Concurrency-safe registry of CONNECT rules.
///
/// Cloning is cheap and yields another handle to the same table.
#[derive(Clone, Default)]
pub struct RuleTable {
    rules: Arc<RwLock<HashMap<String, Rule>>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the rule for `service`.
    ///
    /// Open tunnels are unaffected: they captured their address at dial time.
    pub fn add(&self, service: &str, target: &str) {
        let mut rules = self.rules.write().expect("rules lock");
        debug!(service, target, "rule added");
        rules.insert(
            service.to_string(),
            Rule {
                target: target.to_string(),
            },
        );
    }

    /// Insert many rules under one write lock.
    pub fn extend<I, S, T>(&self, entries: I)
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut rules = self.rules.write().expect("rules lock");
        for (service, target) in entries {
            rules.insert(
                service.into(),
                Rule {
                    target: target.into(),
                },
            );
        }
    }

    /// Delete the rule for `service`. Absent names are a no-op.
    pub fn remove(&self, service: &str) {
        let mut rules = self.rules.write().expect("rules lock");
        if rules.remove(service).is_some() {
            debug!(service, "rule removed");
        }
    }

    /// Drop every rule.
    pub fn clear(&self) {
        let mut rules = self.rules.write().expect("rules lock");
        debug!(count = rules.len(), "rules cleared");
        rules.clear();
    }

    /// Backend address for `service`, matched exactly (case-sensitive).
    pub fn lookup(&self, service: &str) -> Option<String> {
        let rules = self.rules.read().expect("rules lock");
        rules.get(service).map(|r| r.target.clone())
    }

    /// Independent copy of the table: service → target.
    pub fn snapshot(&self) -> HashMap<String, String> {
        let rules = self.rules.read().expect("rules lock");
        rules
            .iter()
            .map(|(service, rule)| (service.clone(), rule.target.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().expect("rules lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleTable")
            .field("rules", &self.snapshot())
            .finish()
    }
}
