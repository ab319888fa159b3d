//! Per-key health tracking for provider key pools.
//!
//! Each provider id owns a pool of interchangeable API keys. Failures are
//! counted per key over a sliding window; a key that reaches the threshold is
//! disabled for a fixed duration and re-armed lazily the next time its health
//! is consulted. There is no background timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use oxiroute_core::config::{ApiKeys, KeyHealthConfig};
use oxiroute_core::utils::mask_key;

// ─────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────

/// Time source for health bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock UTC time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::milliseconds(ms);
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ─────────────────────────────────────────────
// Health record
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
struct KeyHealth {
    /// Failure timestamps inside the current window, oldest first.
    failures: Vec<DateTime<Utc>>,
    /// `None` means the key is enabled.
    disabled_until: Option<DateTime<Utc>>,
}

impl KeyHealth {
    fn is_healthy(&self, now: DateTime<Utc>) -> bool {
        self.disabled_until.map_or(true, |until| now >= until)
    }

    /// Clear an expired disable window together with the failure history.
    fn rearm_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        match self.disabled_until {
            Some(until) if now >= until => {
                self.disabled_until = None;
                self.failures.clear();
                true
            }
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────
// KeyHealthManager
// ─────────────────────────────────────────────

/// Selects keys from per-provider pools and absorbs failure reports.
pub struct KeyHealthManager {
    config: KeyHealthConfig,
    clock: Arc<dyn Clock>,
    /// Ordered, de-duplicated key pool per provider id. Never empty.
    pools: HashMap<String, Vec<String>>,
    /// Health record per provider id, then per key.
    health: HashMap<String, HashMap<String, KeyHealth>>,
}

impl KeyHealthManager {
    /// Create a manager using the wall clock.
    pub fn new(config: KeyHealthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager with an injected time source.
    pub fn with_clock(config: KeyHealthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            pools: HashMap::new(),
            health: HashMap::new(),
        }
    }

    pub fn config(&self) -> &KeyHealthConfig {
        &self.config
    }

    /// Register the key pool for a provider, replacing any previous pool.
    ///
    /// An empty list is ignored and leaves an existing pool untouched.
    pub fn register_keys(&mut self, provider_id: &str, keys: impl Into<ApiKeys>) {
        let mut pool: Vec<String> = Vec::new();
        for key in keys.into().to_vec() {
            if !pool.contains(&key) {
                pool.push(key);
            }
        }

        if pool.is_empty() {
            debug!(provider = provider_id, "ignoring empty key registration");
            return;
        }

        let records = self.health.entry(provider_id.to_string()).or_default();
        for key in &pool {
            records.entry(key.clone()).or_default();
        }

        info!(provider = provider_id, keys = pool.len(), "registered key pool");
        self.pools.insert(provider_id.to_string(), pool);
    }

    /// Pick a key for `provider_id`, uniformly among the healthy ones.
    ///
    /// Falls back to any registered key when every key is disabled. Returns
    /// `None` only when the provider has no pool.
    pub fn select_key(&mut self, provider_id: &str) -> Option<String> {
        let pool = self.pools.get(provider_id)?;
        let now = self.clock.now();
        let records = self.health.entry(provider_id.to_string()).or_default();

        let mut healthy: Vec<&String> = Vec::with_capacity(pool.len());
        for key in pool {
            let record = records.entry(key.clone()).or_default();
            if record.rearm_if_expired(now) {
                info!(provider = provider_id, key = %mask_key(key), "key re-enabled");
            }
            if record.is_healthy(now) {
                healthy.push(key);
            }
        }

        let mut rng = rand::thread_rng();
        if healthy.is_empty() {
            warn!(
                provider = provider_id,
                keys = pool.len(),
                "all keys disabled, selecting from full pool"
            );
            return pool.choose(&mut rng).cloned();
        }

        healthy.choose(&mut rng).map(|key| (*key).clone())
    }

    /// Record a failure for `key`; disables it once the threshold is reached
    /// inside the failure window.
    ///
    /// Unknown provider/key pairs are ignored.
    pub fn report_failure(&mut self, provider_id: &str, key: &str) {
        let Some(record) = self
            .health
            .get_mut(provider_id)
            .and_then(|records| records.get_mut(key))
        else {
            debug!(provider = provider_id, "failure reported for untracked key");
            return;
        };

        let now = self.clock.now();
        record.rearm_if_expired(now);
        record.failures.push(now);

        let window = Duration::milliseconds(clamp_ms(self.config.failure_window_ms));
        record
            .failures
            .retain(|at| now.signed_duration_since(*at) <= window);

        let threshold = self.config.failure_threshold.max(1) as usize;
        debug!(
            provider = provider_id,
            key = %mask_key(key),
            failures = record.failures.len(),
            threshold,
            "key failure recorded"
        );

        if record.failures.len() >= threshold {
            let until = now
                .checked_add_signed(Duration::milliseconds(clamp_ms(
                    self.config.disable_duration_ms,
                )))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.disabled_until = Some(until);
            warn!(
                provider = provider_id,
                key = %mask_key(key),
                until = %until,
                "key disabled after repeated failures"
            );
        }
    }

    /// Whether the provider's pool holds more than one key.
    pub fn has_multiple_keys(&self, provider_id: &str) -> bool {
        self.pools.get(provider_id).map_or(false, |pool| pool.len() > 1)
    }

    /// Number of keys that would currently be eligible for selection.
    pub fn healthy_key_count(&self, provider_id: &str) -> usize {
        let Some(pool) = self.pools.get(provider_id) else {
            return 0;
        };
        let now = self.clock.now();
        let records = self.health.get(provider_id);
        pool.iter()
            .filter(|key| {
                records
                    .and_then(|r| r.get(*key))
                    .map_or(true, |record| record.is_healthy(now))
            })
            .count()
    }

    /// Registered key pool for a provider, in registration order.
    pub fn keys(&self, provider_id: &str) -> Option<&[String]> {
        self.pools.get(provider_id).map(Vec::as_slice)
    }

    /// Provider ids with a registered pool, sorted for determinism.
    pub fn registered_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop every pool and health record.
    pub fn reset(&mut self) {
        self.pools.clear();
        self.health.clear();
        debug!("key health state reset");
    }
}

impl Default for KeyHealthManager {
    fn default() -> Self {
        Self::new(KeyHealthConfig::default())
    }
}

impl std::fmt::Debug for KeyHealthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHealthManager")
            .field("config", &self.config)
            .field("providers", &self.registered_providers())
            .finish()
    }
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
