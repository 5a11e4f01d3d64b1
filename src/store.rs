//! Subscription storage boundary.
//!
//! Delivery never reads the store; it only tells the caller which
//! subscriptions are gone. [`prune_expired`] applies that to any
//! [`SubscriptionStore`].

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;

use crate::batch::BatchReport;
use crate::subscription::SubscriptionInfo;

/// Owner-keyed subscription storage (memory, database, ...).
pub trait SubscriptionStore: Send + Sync {
    /// Add or replace a subscription for an owner.
    fn save(&self, owner: &str, subscription: SubscriptionInfo) -> Result<()>;

    /// All subscriptions held by an owner.
    fn get(&self, owner: &str) -> Result<Vec<SubscriptionInfo>>;

    /// Remove an owner's subscription by endpoint. Returns whether one was removed.
    fn delete(&self, owner: &str, endpoint: &str) -> Result<bool>;
}

/// In-process store.
///
/// Endpoints are unique across owners: saving an endpoint another owner
/// already holds moves it. This prevents duplicate notifications when a
/// browser reconnects under a new identity but keeps its push subscription.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Maps owner → subscriptions.
    subscriptions: RwLock<HashMap<String, Vec<SubscriptionInfo>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(owner, subscription)` pair, owners sorted.
    pub fn all(&self) -> Vec<(String, SubscriptionInfo)> {
        let mut pairs: Vec<_> = self
            .read()
            .iter()
            .flat_map(|(owner, subs)| subs.iter().map(move |s| (owner.clone(), s.clone())))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<SubscriptionInfo>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.subscriptions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<SubscriptionInfo>>> {
        self.subscriptions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SubscriptionStore for MemoryStore {
    fn save(&self, owner: &str, subscription: SubscriptionInfo) -> Result<()> {
        let mut map = self.write();

        for (other, subs) in map.iter_mut().filter(|(k, _)| k.as_str() != owner) {
            let before = subs.len();
            subs.retain(|s| s.endpoint != subscription.endpoint);
            if subs.len() != before {
                log::info!(
                    "[WebPush] Replacing stale subscription for {} (same endpoint, new owner {})",
                    short(other),
                    short(owner)
                );
            }
        }
        map.retain(|_, subs| !subs.is_empty());

        let subs = map.entry(owner.to_string()).or_default();
        match subs.iter_mut().find(|s| s.endpoint == subscription.endpoint) {
            Some(existing) => *existing = subscription,
            None => subs.push(subscription),
        }
        Ok(())
    }

    fn get(&self, owner: &str) -> Result<Vec<SubscriptionInfo>> {
        Ok(self.read().get(owner).cloned().unwrap_or_default())
    }

    fn delete(&self, owner: &str, endpoint: &str) -> Result<bool> {
        let mut map = self.write();
        let Some(subs) = map.get_mut(owner) else {
            return Ok(false);
        };
        let before = subs.len();
        subs.retain(|s| s.endpoint != endpoint);
        let removed = subs.len() != before;
        if subs.is_empty() {
            map.remove(owner);
        }
        Ok(removed)
    }
}

/// Leading characters of an owner id, for logs.
fn short(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Delete every subscription a batch found expired (404/410). Returns the count removed.
pub fn prune_expired<S: SubscriptionStore + ?Sized>(
    store: &S,
    owner: &str,
    report: &BatchReport,
) -> Result<usize> {
    let mut removed = 0;
    for entry in report.expired() {
        if store.delete(owner, &entry.endpoint)? {
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!("[WebPush] Removed {} expired subscription(s)", removed);
    }
    Ok(removed)
}
