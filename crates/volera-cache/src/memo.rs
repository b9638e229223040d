// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async function memoization over [`TtlCache`].

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::debug;
use volera_config::model::CacheConfig;

use crate::ttl::TtlCache;

/// Separates the parts of a similarity key. Never appears in hashes or names.
const SEP: char = '\u{1f}';

/// Memoizes async calls, storing results as JSON.
///
/// Exact lookups key on a SHA-256 of the stable JSON serialization of
/// `(function_name, args)`. Similarity lookups additionally compare the
/// string first argument against earlier calls and reuse a result when the
/// normalized Levenshtein ratio reaches `similarity_threshold`.
#[derive(Debug)]
pub struct Memoizer {
    cache: TtlCache<serde_json::Value>,
    similarity_threshold: f64,
}

impl Memoizer {
    pub fn new(max_size: usize, default_ttl: Duration, similarity_threshold: f64) -> Self {
        Self {
            cache: TtlCache::new(max_size, default_ttl),
            similarity_threshold,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.max_size,
            Duration::from_secs(config.default_ttl_secs),
            config.similarity_threshold,
        )
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// The underlying store, for direct `get/set/delete/clear`.
    pub fn cache(&self) -> &TtlCache<serde_json::Value> {
        &self.cache
    }

    /// Stable cache key for a call.
    ///
    /// Going through `serde_json::Value` sorts map keys, so argument maps with
    /// different insertion orders produce the same key.
    pub fn call_key<A: Serialize + ?Sized>(function_name: &str, args: &A) -> String {
        let canonical = serde_json::to_value((function_name, args))
            .map(|v| v.to_string())
            .unwrap_or_else(|_| function_name.to_string());
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Returns the cached result of `function_name(args)` or runs `f` and
    /// caches its success. Errors are never cached.
    pub async fn memoize<A, T, E, F, Fut>(
        &self,
        function_name: &str,
        args: &A,
        ttl: Option<Duration>,
        f: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = Self::call_key(function_name, args);
        if let Some(hit) = self.lookup::<T>(&key) {
            debug!(function_name, "memo hit");
            return Ok(hit);
        }
        let value = f().await?;
        self.store(key, &value, ttl);
        Ok(value)
    }

    /// Like [`memoize`](Self::memoize), but a call whose `text` is similar
    /// enough to a cached call of the same function (and identical `rest`
    /// arguments) reuses that call's result.
    pub async fn memoize_similar<A, T, E, F, Fut>(
        &self,
        function_name: &str,
        text: &str,
        rest: &A,
        ttl: Option<Duration>,
        f: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let prefix = format!("{function_name}{SEP}{}{SEP}", Self::call_key(function_name, rest));
        let normalized = text.trim().to_lowercase();

        if let Some(hit) = self.lookup::<T>(&format!("{prefix}{normalized}")) {
            debug!(function_name, "memo hit");
            return Ok(hit);
        }
        if let Some((matched, ratio, hit)) = self.closest(&prefix, &normalized) {
            if let Ok(value) = serde_json::from_value::<T>(hit) {
                debug!(function_name, matched = %matched, ratio, "similar memo hit");
                return Ok(value);
            }
        }

        let value = f().await?;
        self.store(format!("{prefix}{normalized}"), &value, ttl);
        Ok(value)
    }

    fn closest(&self, prefix: &str, text: &str) -> Option<(String, f64, serde_json::Value)> {
        self.cache
            .scan_prefix(prefix)
            .into_iter()
            .filter_map(|(key, value)| {
                let candidate = key.strip_prefix(prefix)?.to_string();
                let ratio = strsim::normalized_levenshtein(text, &candidate);
                (ratio >= self.similarity_threshold).then_some((candidate, ratio, value))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        serde_json::from_value(value).ok()
    }

    fn store<T: Serialize>(&self, key: String, value: &T, ttl: Option<Duration>) {
        match serde_json::to_value(value) {
            Ok(json) => self
                .cache
                .set_with_ttl(key, json, ttl.unwrap_or(self.cache.default_ttl())),
            Err(e) => debug!(error = %e, "result not serializable, skipping memo"),
        }
    }
}
