//! YAML configuration parsing.
//!
//! Parses scheduler configuration from YAML files and validates it.

use std::collections::HashSet;
use std::path::Path;

use super::error::ConfigError;
use super::types::SchedulerConfig;
use crate::core::tags::TagPair;

/// Loader for scheduler configuration files.
pub struct YamlLoader;

impl YamlLoader {
    /// Load scheduler configuration from a file.
    pub fn load_scheduler_config(path: impl AsRef<Path>) -> Result<SchedulerConfig, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        let config: SchedulerConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse scheduler configuration from a YAML string.
    pub fn parse_scheduler_config(yaml: &str) -> Result<SchedulerConfig, ConfigError> {
        let config: SchedulerConfig = serde_yaml::from_str(yaml)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a scheduler configuration.
    pub fn validate(config: &SchedulerConfig) -> Result<(), ConfigError> {
        if config.tag_name.trim().is_empty() {
            return Err(ConfigError::MissingField("tag_name".into()));
        }

        Self::validate_tags("started_tags", &config.started_tags)?;
        Self::validate_tags("stopped_tags", &config.stopped_tags)?;

        if config.regions.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::InvalidConfig("region cannot be empty".into()));
        }

        Ok(())
    }

    fn validate_tags(field: &str, tags: &[TagPair]) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for tag in tags {
            if tag.key.is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "{} contains a tag with an empty key",
                    field
                )));
            }
            if !seen.insert(tag.key.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate tag key '{}' in {}",
                    tag.key, field
                )));
            }
        }
        Ok(())
    }
}

/// Parse a comma separated `key=value` list, as accepted on the command line.
///
/// A pair without `=` yields an empty value. Whitespace around keys and values
/// is trimmed and empty entries are ignored.
pub fn parse_tag_list(list: &str) -> Result<Vec<TagPair>, ConfigError> {
    let mut tags = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "tag '{}' has an empty key",
                entry
            )));
        }
        tags.push(TagPair::new(key, value.trim()));
    }
    Ok(tags)
}
