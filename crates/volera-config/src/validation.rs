// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks ranges and formats serde cannot express: positive limits, ratios in
//! (0, 1], IANA timezones, and URL schemes.

use crate::diagnostic::ConfigError;
use crate::model::VoleraConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &VoleraConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    if config.agent.default_model.trim().is_empty() {
        errors.push(ConfigError::invalid("agent.default_model", "must not be empty"));
    }

    check_url(&mut errors, "llm.base_url", Some(&config.llm.base_url));
    check_url(&mut errors, "search.base_url", Some(&config.search.base_url));
    check_url(&mut errors, "store.endpoint", config.store.endpoint.as_deref());
    check_url(&mut errors, "crawler.proxy_url", config.crawler.proxy_url.as_deref());

    check_positive(&mut errors, "llm.timeout_secs", config.llm.timeout_secs);
    check_positive(&mut errors, "search.timeout_secs", config.search.timeout_secs);
    check_positive(&mut errors, "crawler.timeout_secs", config.crawler.timeout_secs);
    check_positive(&mut errors, "sync.interval_secs", config.sync.interval_secs);
    check_positive(&mut errors, "sync.batch_size", config.sync.batch_size as u64);
    check_positive(&mut errors, "cache.max_size", config.cache.max_size as u64);
    check_positive(&mut errors, "research.max_depth", u64::from(config.research.max_depth));
    check_positive(&mut errors, "research.review_target", config.research.review_target as u64);
    check_positive(&mut errors, "research.word_threshold", config.research.word_threshold as u64);
    check_positive(
        &mut errors,
        "research.extraction_concurrency",
        config.research.extraction_concurrency as u64,
    );
    check_positive(
        &mut errors,
        "research.crawl_concurrency",
        config.research.crawl_concurrency as u64,
    );
    check_positive(
        &mut errors,
        "research.image_concurrency",
        config.research.image_concurrency as u64,
    );
    check_positive(
        &mut errors,
        "checkpoint.recursion_limit",
        u64::from(config.checkpoint.recursion_limit),
    );

    let per_query = config.research.results_per_query;
    if per_query == 0 || per_query > 10 {
        errors.push(ConfigError::invalid(
            "research.results_per_query",
            format!("must be between 1 and 10, got {per_query}"),
        ));
    }

    if config.llm.base_delay_ms > config.llm.max_delay_ms {
        errors.push(ConfigError::invalid(
            "llm.base_delay_ms",
            format!(
                "must not exceed llm.max_delay_ms ({} > {})",
                config.llm.base_delay_ms, config.llm.max_delay_ms
            ),
        ));
    }

    let threshold = config.cache.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        errors.push(ConfigError::invalid(
            "cache.similarity_threshold",
            format!("must be in (0, 1], got {threshold}"),
        ));
    }

    if config.credits.timezone.parse::<chrono_tz::Tz>().is_err() {
        errors.push(ConfigError::invalid(
            "credits.timezone",
            format!("`{}` is not an IANA timezone name", config.credits.timezone),
        ));
    }

    for (key, cost) in [
        ("credits.text_cost", config.credits.text_cost),
        ("credits.image_cost", config.credits.image_cost),
        ("credits.research_cost", config.credits.research_cost),
        ("credits.initial_balance", config.credits.initial_balance),
    ] {
        if cost < 0 {
            errors.push(ConfigError::invalid(key, format!("must be non-negative, got {cost}")));
        }
    }

    if let Some(limit) = config.credits.daily_limit
        && limit <= 0
    {
        errors.push(ConfigError::invalid(
            "credits.daily_limit",
            format!("must be positive when set, got {limit}"),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_positive(errors: &mut Vec<ConfigError>, key: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::invalid(key, "must be greater than zero"));
    }
}

fn check_url(errors: &mut Vec<ConfigError>, key: &str, value: Option<&str>) {
    if let Some(url) = value
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        errors.push(ConfigError::invalid(
            key,
            format!("`{url}` must start with http:// or https://"),
        ));
    }
}
