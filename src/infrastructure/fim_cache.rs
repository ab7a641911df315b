//! Dedup gate for fill-in-the-middle requests
//!
//! Editors fire a FIM request on nearly every keystroke. The cache keeps a
//! content fingerprint per (provider, FIM message) and lets a request through
//! only when:
//!
//! - the fingerprint has not been seen,
//! - the cached entry is older than the configured lifetime, or
//! - the request raised critical alerts the cached entry has not seen.
//!
//! Entry ages are measured on prompt timestamps, not the wall clock, and
//! expired entries are evicted on every lookup.

use crate::domain::context::PipelineContext;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedFim {
    timestamp: DateTime<Utc>,
    critical_alerts: HashSet<String>,
}

#[derive(Debug)]
pub struct FimCache {
    lifetime: Duration,
    entries: Mutex<HashMap<String, CachedFim>>,
}

impl FimCache {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Text that identifies a FIM request: its `prompt`, else its message contents
    fn fim_message(request: &str) -> String {
        let Ok(body) = serde_json::from_str::<Value>(request) else {
            return request.to_string();
        };

        if let Some(prompt) = body.get("prompt").and_then(Value::as_str) {
            return prompt.to_string();
        }

        match body.get("messages").and_then(Value::as_array) {
            Some(messages) => messages
                .iter()
                .filter_map(|message| message.get("content").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            None => request.to_string(),
        }
    }

    fn hash_key(message: &str, provider: &str) -> String {
        hex::encode(Sha256::digest(format!("{provider}-{message}").as_bytes()))
    }

    fn critical_alert_fingerprints(context: &PipelineContext) -> HashSet<String> {
        context
            .alerts_raised
            .iter()
            .filter(|alert| alert.is_critical())
            .map(|alert| {
                format!(
                    "{}:{}",
                    alert.trigger_type,
                    alert.trigger_string.as_deref().unwrap_or_default()
                )
            })
            .collect()
    }

    fn is_expired(&self, cached: &CachedFim, now: DateTime<Utc>) -> bool {
        // Out-of-order timestamps count as zero elapsed time
        (now - cached.timestamp).to_std().unwrap_or_default() > self.lifetime
    }

    /// Whether the FIM request in `context` should be persisted
    ///
    /// Storable requests refresh their cache entry as a side effect.
    pub fn could_store_fim_request(&self, context: &PipelineContext) -> bool {
        let Some(prompt) = context.input_request.as_ref() else {
            return true;
        };

        let message = Self::fim_message(&prompt.request);
        let key = Self::hash_key(&message, prompt.provider.as_deref().unwrap_or_default());
        let critical_alerts = Self::critical_alert_fingerprints(context);
        let now = prompt.timestamp;

        let mut entries = self.entries.lock();
        entries.retain(|_, cached| !self.is_expired(cached, now));

        let storable = match entries.get(&key) {
            None => true,
            Some(cached) => !critical_alerts.is_subset(&cached.critical_alerts),
        };

        if storable {
            // A refreshed entry remembers every critical alert seen so far
            let mut seen = entries
                .remove(&key)
                .map(|cached| cached.critical_alerts)
                .unwrap_or_default();
            seen.extend(critical_alerts);
            entries.insert(
                key,
                CachedFim {
                    timestamp: now,
                    critical_alerts: seen,
                },
            );
        } else {
            debug!(prompt_id = %prompt.id, "Skipping duplicate FIM request");
        }

        storable
    }
}
