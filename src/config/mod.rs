//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the schedule tag and
//! the tags written when services are started or stopped.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{DEFAULT_TAG_NAME, SchedulerConfig};
pub use yaml::{YamlLoader, parse_tag_list};
