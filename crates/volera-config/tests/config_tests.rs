// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Volera configuration system.

use volera_config::diagnostic::ConfigError;
use volera_config::model::VoleraConfig;
use volera_config::{load_and_validate_str, load_config, load_config_from_str};

/// Valid TOML with known fields across sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_volera_config() {
    let toml = r#"
[agent]
name = "volera-test"
log_level = "debug"
default_model = "anthropic/claude-3.5-haiku"

[llm]
api_key = "sk-or-123"
timeout_secs = 5
max_retries = 1

[credits]
timezone = "Asia/Kolkata"
daily_limit = 500
research_cost = 50

[cache]
similarity_threshold = 0.9

[research]
max_depth = 2
review_target = 10

[store]
endpoint = "https://cloud.appwrite.io/v1"
project_id = "proj"

[gateway]
port = 9000
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "volera-test");
    assert_eq!(config.agent.default_model, "anthropic/claude-3.5-haiku");
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-or-123"));
    assert_eq!(config.llm.timeout_secs, 5);
    assert_eq!(config.credits.timezone, "Asia/Kolkata");
    assert_eq!(config.credits.daily_limit, Some(500));
    assert_eq!(config.credits.research_cost, 50);
    assert_eq!(config.cache.similarity_threshold, 0.9);
    assert_eq!(config.research.max_depth, 2);
    assert_eq!(config.research.review_target, 10);
    assert_eq!(config.store.project_id.as_deref(), Some("proj"));
    assert_eq!(config.gateway.port, 9000);
}

/// Missing sections fall back to the documented defaults.
#[test]
fn defaults_match_documented_values() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.llm.timeout_secs, 20);
    assert_eq!(config.cache.similarity_threshold, 0.85);
    assert_eq!(config.cache.max_size, 1_000);
    assert_eq!(config.research.max_depth, 3);
    assert_eq!(config.research.review_target, 25);
    assert_eq!(config.research.word_threshold, 1_000);
    assert_eq!(config.research.results_per_query, 2);
    assert_eq!(config.research.extraction_concurrency, 2);
    assert_eq!(config.research.crawl_concurrency, 3);
    assert_eq!(config.research.image_concurrency, 5);
    assert_eq!(config.credits.research_cost, 100);
    assert_eq!(config.gateway.port, 8000);
    assert!(config.sync.enabled);
}

/// Unknown field in a section is rejected.
#[test]
fn unknown_field_in_research_produces_error() {
    let toml = r#"
[research]
max_dept = 4
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("max_dept"),
        "error should mention the bad key, got: {err_str}"
    );
}

/// Unknown top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// A misspelled key becomes an UnknownKey diagnostic with a suggestion.
#[test]
fn diagnostic_suggests_correct_key() {
    let errors = load_and_validate_str("[cache]\nmax_sise = 10\n").expect_err("should fail");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion: Some(s), .. }
                if key == "max_sise" && s == "max_size"
        )
    });
    assert!(found, "expected suggestion for max_sise, got {errors:?}");
}

/// Wrong value type becomes an InvalidType diagnostic naming the key.
#[test]
fn diagnostic_invalid_type_message() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").expect_err("should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { key, .. } if key.contains("port")
    )));
}

/// Semantic validation runs after deserialization.
#[test]
fn validation_rejects_out_of_range_threshold() {
    let errors = load_and_validate_str("[cache]\nsimilarity_threshold = 0.0\n")
        .expect_err("zero threshold should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { key, .. } if key == "cache.similarity_threshold"
    )));
}

#[test]
fn validation_rejects_unknown_timezone() {
    let errors =
        load_and_validate_str("[credits]\ntimezone = \"Nowhere/City\"\n").expect_err("should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { key, .. } if key == "credits.timezone"
    )));
}

/// ConfigError renders through miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "naem".to_string(),
        suggestion: Some("name".to_string()),
        valid_keys: "name, log_level, default_model".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `name`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("naem"));
}

/// `VOLERA_*` variables override TOML, with underscores in field names preserved.
#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("volera.toml", "[research]\nmax_depth = 2\n")?;
        jail.set_env("VOLERA_RESEARCH_MAX_DEPTH", "5");
        jail.set_env("VOLERA_CREDITS_DAILY_LIMIT", "300");
        jail.set_env("VOLERA_MODEL", "google/gemini-flash-1.5");

        let config: VoleraConfig = load_config()?;
        assert_eq!(config.research.max_depth, 5);
        assert_eq!(config.credits.daily_limit, Some(300));
        assert_eq!(config.agent.default_model, "google/gemini-flash-1.5");
        Ok(())
    });
}

/// Provider SDK variables fill API keys, but `VOLERA_*` wins.
#[test]
fn well_known_api_key_variables() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("OPENROUTER_API_KEY", "or-key");
        jail.set_env("SERPER_API_KEY", "serper-key");
        jail.set_env("APPWRITE_API_KEY", "aw-key");
        jail.set_env("VOLERA_SEARCH_API_KEY", "override");

        let config = load_config()?;
        assert_eq!(config.llm.api_key.as_deref(), Some("or-key"));
        assert_eq!(config.search.api_key.as_deref(), Some("override"));
        assert_eq!(config.store.api_key.as_deref(), Some("aw-key"));
        Ok(())
    });
}

/// Secrets never appear in the printable form.
#[test]
fn redacted_hides_secrets() {
    let mut config = VoleraConfig::default();
    config.llm.api_key = Some("sk-secret".into());
    config.crawler.proxy_url = Some("http://user:pw@proxy:8080".into());
    let printed = serde_json::to_string(&config.redacted()).unwrap();
    assert!(!printed.contains("sk-secret"));
    assert!(!printed.contains("user:pw"));
    assert!(config.redacted().search.api_key.is_none());
}
