//! Parameter structures for inspection operations
//!
//! Each operation has a dedicated parameter struct with a `validate` method.
//! Optional settings left unset fall back to the context's configuration.
//!
//! # Usage Examples
//!
//! ```rust
//! use ncx_inspect::api::parameters::RunMisplacedFieldsReportParams;
//!
//! let params = RunMisplacedFieldsReportParams::builder()
//!     .root("/data/gfs/gfs.ncx")
//!     .threshold(500)
//!     .max_records_per_variable(20)
//!     .build()?;
//! assert_eq!(params.threshold, Some(500));
//! # Ok::<(), ncx_inspect::error::InspectError>(())
//! ```

use crate::config::InspectorConfig;
use crate::error::InspectError;
use crate::Result;
use std::path::{Path, PathBuf};

fn validate_index_path(field: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(InspectError::invalid_input(
            field,
            "path cannot be empty",
            "Provide the path of a collection index file",
        ));
    }
    Ok(())
}

/// Parameters for pass 1 only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectTotalsParams {
    pub root: PathBuf,
    /// Overrides the configured dominance threshold
    pub threshold: Option<u64>,
}

impl CollectTotalsParams {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let params = Self {
            root: root.into(),
            threshold: None,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_index_path("root", &self.root)
    }

    /// Context configuration with this operation's overrides applied
    pub(crate) fn effective_config(&self, base: &InspectorConfig) -> InspectorConfig {
        let mut config = base.clone();
        if let Some(threshold) = self.threshold {
            config.dominance_threshold = threshold;
        }
        config
    }
}

/// Parameters for the full misplaced fields report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMisplacedFieldsReportParams {
    pub root: PathBuf,
    pub threshold: Option<u64>,
    pub show_records: Option<bool>,
    pub max_records_per_variable: Option<usize>,
}

impl RunMisplacedFieldsReportParams {
    /// Create parameters with every setting taken from the context
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder().root(root).build()
    }

    pub fn builder() -> RunMisplacedFieldsReportParamsBuilder {
        RunMisplacedFieldsReportParamsBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        validate_index_path("root", &self.root)?;
        if self.max_records_per_variable == Some(0) {
            return Err(InspectError::invalid_input(
                "max_records_per_variable",
                "must be greater than 0",
                "Use show_records(false) to report counts only",
            ));
        }
        Ok(())
    }

    pub(crate) fn effective_config(&self, base: &InspectorConfig) -> InspectorConfig {
        let mut config = base.clone();
        if let Some(threshold) = self.threshold {
            config.dominance_threshold = threshold;
        }
        if let Some(show) = self.show_records {
            config.show_records = show;
        }
        if let Some(max) = self.max_records_per_variable {
            config.max_records_per_variable = Some(max);
        }
        config
    }
}

/// Builder for [`RunMisplacedFieldsReportParams`]
#[derive(Debug, Default)]
pub struct RunMisplacedFieldsReportParamsBuilder {
    root: Option<PathBuf>,
    threshold: Option<u64>,
    show_records: Option<bool>,
    max_records_per_variable: Option<usize>,
}

impl RunMisplacedFieldsReportParamsBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn show_records(mut self, show: bool) -> Self {
        self.show_records = Some(show);
        self
    }

    pub fn max_records_per_variable(mut self, max: usize) -> Self {
        self.max_records_per_variable = Some(max);
        self
    }

    /// Build the parameters with validation
    pub fn build(self) -> Result<RunMisplacedFieldsReportParams> {
        let root = self
            .root
            .ok_or_else(|| InspectError::config_error("root", "is required", "Provide the root index path using root()"))?;
        let params = RunMisplacedFieldsReportParams {
            root,
            threshold: self.threshold,
            show_records: self.show_records,
            max_records_per_variable: self.max_records_per_variable,
        };
        params.validate()?;
        Ok(params)
    }
}

/// Parameters for summarizing a single index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeIndexParams {
    pub index_path: PathBuf,
    /// Variable whose record arrays are listed cell by cell after the summary
    pub records: Option<String>,
}

impl SummarizeIndexParams {
    pub fn new(index_path: impl Into<PathBuf>) -> Result<Self> {
        let params = Self {
            index_path: index_path.into(),
            records: None,
        };
        params.validate()?;
        Ok(params)
    }

    /// List the record arrays of `variable` as well
    pub fn with_records(mut self, variable: impl Into<String>) -> Result<Self> {
        self.records = Some(variable.into());
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        validate_index_path("index_path", &self.index_path)?;
        if matches!(self.records.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(InspectError::invalid_input(
                "records",
                "variable name is empty",
                "Name the variable whose records should be listed",
            ));
        }
        Ok(())
    }
}

/// Parameters for the duplicate record scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDuplicatesParams {
    pub root: PathBuf,
}

impl ScanDuplicatesParams {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let params = Self { root: root.into() };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        validate_index_path("root", &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_paths_rejected() {
        assert!(matches!(CollectTotalsParams::new(""), Err(InspectError::InvalidInput { .. })));
        assert!(SummarizeIndexParams::new("").is_err());
        assert!(SummarizeIndexParams::new("a.ncx").unwrap().with_records(" ").is_err());
        assert!(ScanDuplicatesParams::new("").is_err());
        assert!(RunMisplacedFieldsReportParams::new("").is_err());
    }

    #[test]
    fn test_builder_requires_root() {
        let err = RunMisplacedFieldsReportParams::builder().threshold(5).build().unwrap_err();
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_builder_rejects_zero_record_cap() {
        let result = RunMisplacedFieldsReportParams::builder()
            .root("/data/root.ncx")
            .max_records_per_variable(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_config_overrides() {
        let base = InspectorConfig::default();
        let params = RunMisplacedFieldsReportParams::builder()
            .root("/data/root.ncx")
            .threshold(10)
            .show_records(false)
            .build()
            .unwrap();
        let config = params.effective_config(&base);
        assert_eq!(config.dominance_threshold, 10);
        assert!(!config.show_records);
        assert_eq!(config.indent_width, base.indent_width);

        let totals = CollectTotalsParams::new("/data/root.ncx").unwrap();
        assert_eq!(totals.effective_config(&base), base);
        assert_eq!(totals.with_threshold(3).effective_config(&base).dominance_threshold, 3);
    }
}
