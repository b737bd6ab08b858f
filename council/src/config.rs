//! Council configuration: wave order, tier depth, override policy, reviewer
//! roster and platform retry budget.
//!
//! Loaded from TOML or YAML (chosen by file extension) and validated before
//! use. Every validation failure names the file and the dotted key:
//!
//! ```text
//! invalid config council.toml: tiers.flash.max_waves: must be at least 1
//! ```
//!
//! Credentials never live here; the runner reads them from the environment.

use crate::override_auth::{OverrideParser, OverridePolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Label used for configs parsed from a string rather than a file.
const INLINE_SOURCE: &str = "<inline>";

/// Upper bound on `platform.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported config format {path}: expected .toml, .yml or .yaml")]
    UnsupportedFormat { path: String },

    #[error("invalid config {path}: {key}: {message}")]
    Invalid {
        path: String,
        key: String,
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: INLINE_SOURCE.to_string(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Re-label an error produced while parsing an in-memory string.
    fn at(self, origin: &str) -> Self {
        match self {
            Self::Parse { message, .. } => Self::Parse {
                path: origin.to_string(),
                message,
            },
            Self::Invalid { key, message, .. } => Self::Invalid {
                path: origin.to_string(),
                key,
                message,
            },
            other => other,
        }
    }

    /// Offending dotted key, for validation errors.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Invalid { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Gate blocking switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub block_on_critical: bool,
    pub block_on_major: bool,
    pub block_on_skip: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            block_on_critical: true,
            block_on_major: false,
            block_on_skip: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WavesConfig {
    pub enabled: bool,
    /// Fixed total order of wave ids.
    pub order: Vec<String>,
    pub gate: GateConfig,
}

impl Default for WavesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            order: vec!["wave1".into(), "wave2".into(), "wave3".into()],
            gate: GateConfig::default(),
        }
    }
}

/// Cost/quality class bounding review depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Number of waves this tier may run, counting the first.
    pub max_waves: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverrideConfig {
    pub policy: OverridePolicy,
    /// Slash-command tool name, as in `/council override ...`.
    pub command: String,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            policy: OverridePolicy::WriteAccess,
            command: crate::override_auth::DEFAULT_COMMAND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewerConfig {
    pub name: String,
    #[serde(default)]
    pub perspective: String,
    /// Falls back to `override.policy` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_policy: Option<OverridePolicy>,
}

/// Hosting platform connection and retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    pub api_url: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

/// Top-level council configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CouncilConfig {
    pub waves: WavesConfig,
    pub tiers: BTreeMap<String, TierConfig>,
    #[serde(rename = "override")]
    pub override_config: OverrideConfig,
    pub reviewers: Vec<ReviewerConfig>,
    pub platform: PlatformConfig,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert("flash".to_string(), TierConfig { max_waves: 1 });
        tiers.insert("standard".to_string(), TierConfig { max_waves: 3 });
        Self {
            waves: WavesConfig::default(),
            tiers,
            override_config: OverrideConfig::default(),
            reviewers: Vec::new(),
            platform: PlatformConfig::default(),
        }
    }
}

impl CouncilConfig {
    /// Load and validate a config file. The format follows the extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let parse: fn(&str) -> Result<Self, ConfigError> = match ext.as_str() {
            "toml" => Self::from_toml_str,
            "yml" | "yaml" => Self::from_yaml_str,
            _ => return Err(ConfigError::UnsupportedFormat { path: origin }),
        };

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: origin.clone(),
            source: e,
        })?;

        let config = parse(&content).map_err(|e| e.at(&origin))?;
        tracing::debug!(
            path = %origin,
            waves = config.waves.order.len(),
            tiers = config.tiers.len(),
            reviewers = config.reviewers.len(),
            "Loaded council config"
        );
        Ok(config)
    }

    /// Parse and validate TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: INLINE_SOURCE.to_string(),
            message: format!("TOML parse error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: INLINE_SOURCE.to_string(),
            message: format!("YAML parse error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.waves.enabled && self.waves.order.is_empty() {
            return Err(ConfigError::invalid(
                "waves.order",
                "must list at least one wave when waves are enabled",
            ));
        }
        let mut seen = HashSet::new();
        for (i, id) in self.waves.order.iter().enumerate() {
            let key = format!("waves.order[{}]", i);
            if id.trim().is_empty() {
                return Err(ConfigError::invalid(key, "wave id must not be empty"));
            }
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::invalid(key, format!("duplicate wave id '{}'", id)));
            }
        }

        for (id, tier) in &self.tiers {
            if tier.max_waves < 1 {
                return Err(ConfigError::invalid(
                    format!("tiers.{}.max_waves", id),
                    "must be at least 1",
                ));
            }
        }

        if self.override_config.policy == OverridePolicy::Unknown {
            return Err(ConfigError::invalid(
                "override.policy",
                "expected pr_author, write_access or maintainers_only",
            ));
        }
        let command = &self.override_config.command;
        if command.is_empty()
            || !command
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::invalid(
                "override.command",
                "must be non-empty and contain only letters, digits, '-' or '_'",
            ));
        }

        let mut names = HashSet::new();
        for (i, reviewer) in self.reviewers.iter().enumerate() {
            if reviewer.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("reviewers[{}].name", i),
                    "must not be empty",
                ));
            }
            if !names.insert(reviewer.name.to_ascii_lowercase()) {
                return Err(ConfigError::invalid(
                    format!("reviewers[{}].name", i),
                    format!("duplicate reviewer '{}'", reviewer.name),
                ));
            }
            if reviewer.override_policy == Some(OverridePolicy::Unknown) {
                return Err(ConfigError::invalid(
                    format!("reviewers[{}].override_policy", i),
                    "expected pr_author, write_access or maintainers_only",
                ));
            }
        }

        let platform = &self.platform;
        if platform.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::invalid(
                "platform.max_retries",
                format!("must be at most {}", MAX_RETRIES_LIMIT),
            ));
        }
        if platform.backoff_base_ms == 0 || platform.backoff_base_ms > platform.backoff_max_ms {
            return Err(ConfigError::invalid(
                "platform.backoff_base_ms",
                "must be at least 1 and not exceed platform.backoff_max_ms",
            ));
        }

        Ok(())
    }

    /// Per-reviewer override policies, keyed by name and by perspective.
    pub fn reviewer_policies(&self) -> HashMap<String, OverridePolicy> {
        let mut policies = HashMap::new();
        for reviewer in &self.reviewers {
            let Some(policy) = reviewer.override_policy else {
                continue;
            };
            policies.insert(reviewer.name.clone(), policy);
            if !reviewer.perspective.is_empty() {
                policies.entry(reviewer.perspective.clone()).or_insert(policy);
            }
        }
        policies
    }

    /// Parser for the configured override command.
    pub fn override_parser(&self) -> Result<OverrideParser, ConfigError> {
        OverrideParser::new(&self.override_config.command)
            .map_err(|e| ConfigError::invalid("override.command", e.to_string()))
    }

    pub fn tier(&self, id: &str) -> Option<&TierConfig> {
        self.tiers.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
[waves]
enabled = true
order = ["quick", "deep"]

[waves.gate]
block_on_major = true

[tiers.flash]
max_waves = 1

[override]
policy = "pr_author"

[[reviewers]]
name = "security"
perspective = "sec"
override_policy = "maintainers_only"
"#;

    #[test]
    fn test_toml_parses_with_defaults() {
        let config = CouncilConfig::from_toml_str(TOML_CONFIG).unwrap();
        assert_eq!(config.waves.order, vec!["quick", "deep"]);
        assert!(config.waves.gate.block_on_major);
        assert!(config.waves.gate.block_on_critical, "default preserved");
        assert!(config.waves.gate.block_on_skip);
        assert_eq!(config.override_config.policy, OverridePolicy::PrAuthor);
        assert_eq!(config.override_config.command, "council");
        assert_eq!(config.platform.max_retries, 3);
        assert_eq!(config.tier("flash").unwrap().max_waves, 1);
        assert!(config.tier("standard").is_none());
    }

    #[test]
    fn test_yaml_equivalent() {
        let yaml = r#"
waves:
  order: [quick, deep]
tiers:
  flash:
    max_waves: 2
override:
  policy: maintainers_only
"#;
        let config = CouncilConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.waves.order.len(), 2);
        assert_eq!(config.tier("flash").unwrap().max_waves, 2);
        assert_eq!(
            config.override_config.policy,
            OverridePolicy::MaintainersOnly
        );
    }

    #[test]
    fn test_zero_max_waves_reports_key() {
        let err = CouncilConfig::from_toml_str("[tiers.flash]\nmax_waves = 0\n").unwrap_err();
        assert_eq!(err.key(), Some("tiers.flash.max_waves"));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err =
            CouncilConfig::from_toml_str("[override]\npolicy = \"everyone\"\n").unwrap_err();
        assert_eq!(err.key(), Some("override.policy"));
    }

    #[test]
    fn test_duplicate_wave_rejected() {
        let err =
            CouncilConfig::from_toml_str("[waves]\norder = [\"a\", \"b\", \"a\"]\n").unwrap_err();
        assert_eq!(err.key(), Some("waves.order[2]"));
    }

    #[test]
    fn test_bad_command_rejected() {
        let err =
            CouncilConfig::from_toml_str("[override]\ncommand = \"co uncil\"\n").unwrap_err();
        assert_eq!(err.key(), Some("override.command"));
    }

    #[test]
    fn test_retry_budget_checked() {
        let err = CouncilConfig::from_toml_str("[platform]\nmax_retries = 11\n").unwrap_err();
        assert_eq!(err.key(), Some("platform.max_retries"));
        let err = CouncilConfig::from_toml_str(
            "[platform]\nbackoff_base_ms = 9000\nbackoff_max_ms = 100\n",
        )
        .unwrap_err();
        assert_eq!(err.key(), Some("platform.backoff_base_ms"));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let err = CouncilConfig::from_toml_str("[waves]\nenabeld = false\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_reviewer_policies_by_name_and_perspective() {
        let config = CouncilConfig::from_toml_str(TOML_CONFIG).unwrap();
        let policies = config.reviewer_policies();
        assert_eq!(policies.get("security"), Some(&OverridePolicy::MaintainersOnly));
        assert_eq!(policies.get("sec"), Some(&OverridePolicy::MaintainersOnly));
    }

    #[test]
    fn test_default_is_valid() {
        CouncilConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("council.yaml");
        std::fs::write(&path, "tiers:\n  flash:\n    max_waves: 0\n").unwrap();
        match CouncilConfig::load(&path).unwrap_err() {
            ConfigError::Invalid { path: p, key, .. } => {
                assert!(p.ends_with("council.yaml"));
                assert_eq!(key, "tiers.flash.max_waves");
            }
            other => panic!("unexpected error: {}", other),
        }

        let ini = dir.path().join("council.ini");
        std::fs::write(&ini, "").unwrap();
        assert!(matches!(
            CouncilConfig::load(&ini),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }
}
