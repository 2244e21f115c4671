//! Engine and daemon configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ClubError;

/// When a commitment stops accepting joins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Joins are accepted until the commitment settles, even after the deadline.
    #[default]
    UntilSettled,
    /// Joins at or after the deadline are rejected with [`ClubError::JoinClosed`].
    UntilDeadline,
}

impl JoinPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UntilSettled => "until_settled",
            Self::UntilDeadline => "until_deadline",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in megabytes.
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `human` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default)]
    pub join_policy: JoinPolicy,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_map_size_mb() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "human".into()
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size_mb: default_map_size_mb(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            join_policy: JoinPolicy::default(),
        }
    }
}

impl ClubConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ClubError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClubError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ClubError> {
        let config: Self = toml::from_str(s).map_err(|e| ClubError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ClubError> {
        toml::to_string_pretty(self).map_err(|e| ClubError::Config(e.to_string()))
    }

    /// LMDB map size in bytes.
    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn validate(&self) -> Result<(), ClubError> {
        if self.map_size_mb == 0 {
            return Err(ClubError::Config("map_size_mb must be greater than zero".into()));
        }
        if !matches!(self.log_format.as_str(), "human" | "json") {
            return Err(ClubError::Config(format!(
                "log_format must be \"human\" or \"json\", got {:?}",
                self.log_format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ClubConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClubConfig::default());
        assert_eq!(config.join_policy, JoinPolicy::UntilSettled);
    }

    #[test]
    fn parses_partial_file() {
        let config = ClubConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/commitclub"
            join_policy = "until_deadline"
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/commitclub"));
        assert_eq!(config.join_policy, JoinPolicy::UntilDeadline);
        assert_eq!(config.log_format, "json");
        assert_eq!(config.map_size_mb, 1024);
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = ClubConfig {
            map_size_mb: 64,
            join_policy: JoinPolicy::UntilDeadline,
            ..ClubConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(ClubConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_unknown_policy_and_format() {
        assert!(matches!(
            ClubConfig::from_toml_str("join_policy = \"forever\""),
            Err(ClubError::Config(_))
        ));
        assert!(matches!(
            ClubConfig::from_toml_str("log_format = \"xml\""),
            Err(ClubError::Config(_))
        ));
        assert!(matches!(
            ClubConfig::from_toml_str("map_size_mb = 0"),
            Err(ClubError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ClubConfig::from_toml_file(Path::new("/nonexistent/commitclub.toml"));
        assert!(matches!(err, Err(ClubError::Config(_))));
    }

    #[test]
    fn map_size_in_bytes() {
        let config = ClubConfig {
            map_size_mb: 2,
            ..ClubConfig::default()
        };
        assert_eq!(config.map_size_bytes(), 2 * 1024 * 1024);
    }
}
