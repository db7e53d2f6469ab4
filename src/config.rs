//! Configuration for index inspection
//!
//! This module provides [`InspectorConfig`], its builder methods and
//! validation, and TOML persistence so that a set of inspection settings can
//! be kept next to a collection.

use crate::constants::{DEFAULT_DOMINANCE_THRESHOLD, DEFAULT_INDENT_WIDTH};
use crate::error::InspectError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest accepted indent width
const MAX_INDENT_WIDTH: usize = 16;

/// Settings shared by every inspection operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// A fingerprint is dominant when its collection-wide total exceeds this
    pub dominance_threshold: u64,
    /// Count Best/BestComplete datasets as if they owned their records
    pub include_derived_datasets: bool,
    /// Locate and list individual misplaced records, not just counts
    pub show_records: bool,
    /// Cap on listed records per misplaced variable
    pub max_records_per_variable: Option<usize>,
    /// Spaces per report indent level
    pub indent_width: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            dominance_threshold: DEFAULT_DOMINANCE_THRESHOLD,
            include_derived_datasets: false,
            show_records: true,
            max_records_per_variable: None,
            indent_width: DEFAULT_INDENT_WIDTH,
        }
    }
}

impl InspectorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dominance_threshold(mut self, threshold: u64) -> Self {
        self.dominance_threshold = threshold;
        self
    }

    pub fn include_derived_datasets(mut self, include: bool) -> Self {
        self.include_derived_datasets = include;
        self
    }

    pub fn show_records(mut self, show: bool) -> Self {
        self.show_records = show;
        self
    }

    /// Limit listed records per variable; `None` lists them all
    pub fn max_records_per_variable(mut self, max: Option<usize>) -> Self {
        self.max_records_per_variable = max;
        self
    }

    pub fn indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.indent_width == 0 {
            return Err(InspectError::config_error(
                "indent_width",
                "must be greater than 0",
                "Set indent_width to a small positive number of spaces (default: 2)",
            ));
        }

        if self.indent_width > MAX_INDENT_WIDTH {
            return Err(InspectError::config_error(
                "indent_width",
                format!("value {} exceeds the maximum of {}", self.indent_width, MAX_INDENT_WIDTH),
                "Deeply nested collections become unreadable with wide indents; use 2 or 4",
            ));
        }

        if self.max_records_per_variable == Some(0) {
            return Err(InspectError::config_error(
                "max_records_per_variable",
                "must be greater than 0 when set",
                "Set show_records = false to report counts only, or remove the cap to list every record",
            ));
        }

        Ok(())
    }

    /// Build the configuration after validation
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Load and validate a configuration from a TOML file
    ///
    /// Missing keys take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| InspectError::Io(e).with_file_context(path, "read config"))?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| InspectError::Config(format!("Failed to parse config file {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as TOML, replacing the file atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;

        let contents = toml::to_string_pretty(self)
            .map_err(|e| InspectError::Serialization(format!("Failed to serialize config: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, contents).map_err(|e| InspectError::Io(e).with_file_context(&temp_path, "write config"))?;

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            InspectError::Io(e).with_file_context(path, "move config into place")
        })?;

        Ok(())
    }
}
