// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `volera config`: print the effective configuration.

use volera_config::VoleraConfig;
use volera_core::VoleraError;

/// The effective configuration as TOML, secrets replaced.
pub fn render_config(config: &VoleraConfig) -> Result<String, VoleraError> {
    toml::to_string_pretty(&config.redacted())
        .map_err(|e| VoleraError::Config(format!("failed to render configuration: {e}")))
}

pub fn print_config(config: &VoleraConfig) -> Result<(), VoleraError> {
    println!("{}", render_config(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_config_hides_secrets() {
        let mut config = VoleraConfig::default();
        config.llm.api_key = Some("sk-or-secret".into());
        config.search.api_key = Some("serper-secret".into());

        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("sk-or-secret"));
        assert!(!rendered.contains("serper-secret"));
        assert!(rendered.contains("[research]"));
        assert!(rendered.contains("max_depth = 3"));

        let reparsed: VoleraConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.research.max_depth, 3);
    }
}
