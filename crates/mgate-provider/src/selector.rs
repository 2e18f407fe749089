use std::collections::HashMap;

use rand::Rng;
use tokio::sync::RwLock;
use tracing::debug;

use crate::key::{Key, KeyId};

pub const HEALTH_FLOOR: f64 = 0.1;
pub const HEALTH_DECAY: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub enum SelectError {
    NoViableKey,
}

#[derive(Debug, Default, Clone, Copy)]
struct KeyHealth {
    consecutive_failures: u32,
}

impl KeyHealth {
    fn factor(self) -> f64 {
        (1.0 - self.consecutive_failures as f64 * HEALTH_DECAY).max(HEALTH_FLOOR)
    }
}

/// Weighted-random key selection with health-aware deprioritization
/// (§4.2). Holds the provider's key set in registration order (the tie-
/// break order for equal-weight draws) plus a health map it exclusively
/// writes — no other component mutates `consecutive_failures`.
pub struct KeySelector {
    keys: Vec<Key>,
    health: RwLock<HashMap<KeyId, KeyHealth>>,
}

impl KeySelector {
    pub fn new(keys: Vec<Key>) -> Self {
        Self {
            keys,
            health: RwLock::new(HashMap::new()),
        }
    }

    /// Filters to keys whose allow-list permits `model`, computes effective
    /// weight = configured weight × health factor, and draws one by
    /// weighted-uniform sampling over the prefix sum.
    pub async fn select(&self, model: &str) -> Result<Key, SelectError> {
        let health = self.health.read().await;
        let candidates: Vec<(&Key, f64)> = self
            .keys
            .iter()
            .filter(|k| k.allows_model(model))
            .map(|k| {
                let factor = health.get(&k.id).copied().unwrap_or_default().factor();
                (k, k.weight * factor)
            })
            .collect();
        drop(health);

        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        if candidates.is_empty() || total <= 0.0 {
            return Err(SelectError::NoViableKey);
        }

        let mut roll = rand::rng().random_range(0.0..total);
        for (key, weight) in &candidates {
            if roll < *weight {
                return Ok((*key).clone());
            }
            roll -= weight;
        }
        // Floating-point rounding can leave a sliver of `roll` unconsumed;
        // configuration order makes the last candidate the tie-break.
        Ok(candidates.last().expect("checked non-empty above").0.clone())
    }

    /// Any error classified retryable-from-provider increments the
    /// counter; the selector is the sole writer of health fields.
    pub async fn record_failure(&self, id: KeyId) {
        let mut health = self.health.write().await;
        let entry = health.entry(id).or_default();
        entry.consecutive_failures += 1;
        debug!(
            event = "key_health_decay",
            key_id = id,
            consecutive_failures = entry.consecutive_failures,
            factor = entry.factor(),
        );
    }

    pub async fn record_success(&self, id: KeyId) {
        let mut health = self.health.write().await;
        health.entry(id).or_default().consecutive_failures = 0;
        debug!(event = "key_health_reset", key_id = id);
    }

    pub async fn health_factor(&self, id: KeyId) -> f64 {
        self.health
            .read()
            .await
            .get(&id)
            .copied()
            .unwrap_or_default()
            .factor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgate_common::SecretValue;

    fn key(id: KeyId, weight: f64) -> Key {
        Key {
            id,
            value: SecretValue::new("k"),
            weight,
            models_allowlist: Vec::new(),
        }
    }

    #[tokio::test]
    async fn weighted_selection_matches_ratio() {
        let selector = KeySelector::new(vec![key(1, 1.0), key(2, 3.0)]);
        let mut counts = HashMap::new();
        for _ in 0..100_000 {
            let k = selector.select("gpt-4o").await.unwrap();
            *counts.entry(k.id).or_insert(0u32) += 1;
        }
        let ratio_b = *counts.get(&2).unwrap() as f64 / 100_000.0;
        assert!((ratio_b - 0.75).abs() < 0.01, "ratio was {ratio_b}");
    }

    #[tokio::test]
    async fn allowlist_filters_candidates() {
        let mut restricted = key(1, 5.0);
        restricted.models_allowlist = vec!["claude-3".to_string()];
        let selector = KeySelector::new(vec![restricted, key(2, 1.0)]);
        for _ in 0..20 {
            let k = selector.select("gpt-4o").await.unwrap();
            assert_eq!(k.id, 2);
        }
    }

    #[tokio::test]
    async fn no_viable_key_when_all_excluded() {
        let mut restricted = key(1, 5.0);
        restricted.models_allowlist = vec!["claude-3".to_string()];
        let selector = KeySelector::new(vec![restricted]);
        assert!(matches!(
            selector.select("gpt-4o").await,
            Err(SelectError::NoViableKey)
        ));
    }

    #[tokio::test]
    async fn failure_deprioritizes_but_never_excludes() {
        let selector = KeySelector::new(vec![key(1, 1.0)]);
        for _ in 0..50 {
            selector.record_failure(1).await;
        }
        assert_eq!(selector.health_factor(1).await, HEALTH_FLOOR);
        assert!(selector.select("m").await.is_ok());
    }

    #[tokio::test]
    async fn success_resets_health() {
        let selector = KeySelector::new(vec![key(1, 1.0)]);
        selector.record_failure(1).await;
        selector.record_failure(1).await;
        selector.record_success(1).await;
        assert_eq!(selector.health_factor(1).await, 1.0);
    }
}
