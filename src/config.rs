//! Configuration management for the Turnstile engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TurnstileError};
use crate::rules::{CatalogBuilder, DiscriminatorKind, RuleCatalog, RuleDefinition};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Eviction settings for the counter store
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Rate limit rule definitions
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Eviction settings for the counter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// How often the background sweep runs, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// How many expired windows a counter may survive before eviction
    #[serde(default = "default_grace_windows")]
    pub grace_windows: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            grace_windows: default_grace_windows(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_grace_windows() -> u64 {
    crate::store::DEFAULT_GRACE_WINDOWS
}

impl EvictionConfig {
    /// The sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Configuration for a single fixed-window rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Unique rule name
    pub name: String,
    /// Maximum requests allowed within one window
    pub max_requests: u32,
    /// Window duration in seconds
    pub window_secs: u64,
    /// How counters for this rule are partitioned
    pub discriminator: DiscriminatorConfig,
    /// Custom resolver id; required iff `discriminator` is `custom`
    #[serde(default)]
    pub custom_discriminator_id: Option<String>,
}

/// Discriminator kinds as they appear in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscriminatorConfig {
    ClientToken,
    RemoteAddress,
    Custom,
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("failed to parse engine config: {}", e)))
    }

    /// Build a sealed rule catalog from the configured rules.
    ///
    /// Fails fast on duplicate names, non-positive parameters, or an
    /// inconsistent custom discriminator declaration.
    pub fn build_catalog(&self) -> Result<RuleCatalog> {
        let mut builder = CatalogBuilder::new();
        for rule in &self.rules {
            builder.register(rule.to_definition()?)?;
        }
        info!(rules = self.rules.len(), "Built rule catalog from configuration");
        Ok(builder.seal())
    }
}

impl RuleConfig {
    /// Convert to a [`RuleDefinition`], checking the custom-id invariant.
    fn to_definition(&self) -> Result<RuleDefinition> {
        let discriminator = match (self.discriminator, &self.custom_discriminator_id) {
            (DiscriminatorConfig::ClientToken, None) => DiscriminatorKind::ClientToken,
            (DiscriminatorConfig::RemoteAddress, None) => DiscriminatorKind::RemoteAddress,
            (DiscriminatorConfig::Custom, Some(id)) => DiscriminatorKind::Custom(id.clone()),
            (DiscriminatorConfig::Custom, None) => {
                return Err(TurnstileError::Config(format!(
                    "rule '{}': custom discriminator requires custom_discriminator_id",
                    self.name
                )))
            }
            (_, Some(_)) => {
                return Err(TurnstileError::Config(format!(
                    "rule '{}': custom_discriminator_id is only valid with a custom discriminator",
                    self.name
                )))
            }
        };

        Ok(RuleDefinition::fixed_window(
            self.name.clone(),
            self.max_requests,
            Duration::from_secs(self.window_secs),
            discriminator,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
eviction:
  sweep_interval_secs: 10
  grace_windows: 2
rules:
  - name: login-attempts
    max_requests: 5
    window_secs: 60
    discriminator: client_token
  - name: per-ip
    max_requests: 100
    window_secs: 1
    discriminator: remote_address
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.eviction.sweep_interval(), Duration::from_secs(10));
        assert_eq!(config.eviction.grace_windows, 2);
        assert_eq!(config.rules.len(), 2);

        let catalog = config.build_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        let rule = catalog.lookup("login-attempts").unwrap();
        assert_eq!(rule.limiter.max_requests(), 5);
    }

    #[test]
    fn test_eviction_defaults() {
        let config = EngineConfig::from_yaml("rules: []").unwrap();
        assert_eq!(config.eviction.sweep_interval_secs, 30);
        assert_eq!(config.eviction.grace_windows, 1);
    }

    #[test]
    fn test_custom_discriminator_rule() {
        let yaml = r#"
rules:
  - name: per-tenant
    max_requests: 10
    window_secs: 60
    discriminator: custom
    custom_discriminator_id: tenant
"#;
        let catalog = EngineConfig::from_yaml(yaml).unwrap().build_catalog().unwrap();
        let rule = catalog.lookup("per-tenant").unwrap();
        assert_eq!(
            rule.discriminator,
            DiscriminatorKind::Custom("tenant".to_string())
        );
    }

    #[test]
    fn test_custom_without_id_rejected() {
        let yaml = r#"
rules:
  - name: per-tenant
    max_requests: 10
    window_secs: 60
    discriminator: custom
"#;
        let err = EngineConfig::from_yaml(yaml)
            .unwrap()
            .build_catalog()
            .unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_id_without_custom_rejected() {
        let yaml = r#"
rules:
  - name: login-attempts
    max_requests: 10
    window_secs: 60
    discriminator: client_token
    custom_discriminator_id: tenant
"#;
        let err = EngineConfig::from_yaml(yaml)
            .unwrap()
            .build_catalog()
            .unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_duplicate_rule_name_fails_build() {
        let yaml = r#"
rules:
  - name: dup
    max_requests: 10
    window_secs: 60
    discriminator: client_token
  - name: dup
    max_requests: 20
    window_secs: 60
    discriminator: client_token
"#;
        let err = EngineConfig::from_yaml(yaml)
            .unwrap()
            .build_catalog()
            .unwrap_err();
        assert!(matches!(err, TurnstileError::DuplicateRuleName(_)));
    }

    #[test]
    fn test_invalid_parameters_fail_build() {
        let yaml = r#"
rules:
  - name: broken
    max_requests: 0
    window_secs: 60
    discriminator: client_token
"#;
        let err = EngineConfig::from_yaml(yaml)
            .unwrap()
            .build_catalog()
            .unwrap_err();
        assert!(matches!(err, TurnstileError::InvalidRule { .. }));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = EngineConfig::from_yaml("rules: {not a list}").unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }
}
