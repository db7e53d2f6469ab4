//! High-level inspection entry points
//!
//! [`Inspector`] ties a reader and a validated [`InspectorConfig`] to the
//! walker passes and the report formatter. Each method produces a finished
//! [`Report`].
//!
//! # Usage Examples
//!
//! ```rust
//! use ncx_inspect::collection::{CollectionKind, DatasetKind};
//! use ncx_inspect::identifiers::Fingerprint;
//! use ncx_inspect::layout::{DatasetSpec, GroupSpec, IndexWriter, VariableSpec};
//! use ncx_inspect::structures::{Record, SparseArray};
//! use ncx_inspect::run_misplaced_fields_report;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::TempDir::new()?;
//! let root = dir.path().join("leaf.ncx");
//! IndexWriter::new(CollectionKind::Leaf, "leaf")
//!     .file("leaf.grib2")
//!     .dataset(DatasetSpec::new(DatasetKind::TwoD).group(GroupSpec::new("grid").variable(
//!         VariableSpec::new("Y", Fingerprint::new(2), SparseArray::dense(vec![Record::new(0, 0)])),
//!     )))
//!     .write(&root)?;
//!
//! let report = run_misplaced_fields_report(&root, 1000)?;
//! assert_eq!(report.total("misplaced"), Some(1));
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```

use crate::config::InspectorConfig;
use crate::reader::{FileIndexReader, IndexReader};
use crate::registry::VariableRegistry;
use crate::report::{Report, ReportEvent, ReportFormatter, ReportSink};
use crate::summary::{dump_variable_records, summarize_index};
use crate::walker::{CollectionTotals, MisplacedTotals, PartitionWalker};
use crate::Result;
use std::path::Path;
use tracing::info;

/// Runs inspections over collection index trees
#[derive(Debug, Clone)]
pub struct Inspector<R: IndexReader = FileIndexReader> {
    reader: R,
    config: InspectorConfig,
}

impl Inspector<FileIndexReader> {
    /// Create an inspector reading `.ncx` files from disk
    pub fn new(config: InspectorConfig) -> Result<Self> {
        Self::with_reader(FileIndexReader::new(), config)
    }
}

impl<R: IndexReader> Inspector<R> {
    /// Create an inspector over a custom reader
    pub fn with_reader(reader: R, config: InspectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { reader, config })
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn walker(&self) -> PartitionWalker<'_, R> {
        PartitionWalker::new(&self.reader, &self.config)
    }

    fn formatter(&self) -> ReportFormatter {
        ReportFormatter::new(self.config.indent_width)
    }

    /// Pass 1 into a caller-provided registry
    pub fn collect_totals(&self, root: &Path, registry: &mut VariableRegistry) -> Result<CollectionTotals> {
        self.walker().collect_totals(root, registry)
    }

    /// Pass 1 into a fresh registry, sealed with the configured threshold
    pub fn build_registry(&self, root: &Path) -> Result<(VariableRegistry, CollectionTotals)> {
        let mut registry = VariableRegistry::new();
        let totals = self.collect_totals(root, &mut registry)?;
        registry.finalize_dominance(self.config.dominance_threshold)?;
        info!(
            root = %root.display(),
            leaves = totals.leaves_visited,
            fingerprints = registry.len(),
            dominant = registry.dominant_fingerprints().len(),
            problems = totals.problems.len(),
            "collected variable totals"
        );
        Ok((registry, totals))
    }

    /// Pass 2 against a sealed registry
    pub fn find_misplaced(
        &self,
        root: &Path,
        registry: &VariableRegistry,
        sink: &mut dyn ReportSink,
    ) -> Result<MisplacedTotals> {
        self.walker().find_misplaced(root, registry, sink, 0)
    }

    /// Both passes, rendered as one report
    pub fn run_misplaced_fields_report(&self, root: &Path) -> Result<Report> {
        let (registry, _) = self.build_registry(root)?;
        self.report_misplaced(root, &registry)
    }

    /// Render registry totals and pass 2 against an already sealed registry
    pub fn report_misplaced(&self, root: &Path, registry: &VariableRegistry) -> Result<Report> {
        let mut formatter = self.formatter();

        formatter.section("variable totals");
        for (fingerprint, aggregate) in registry.aggregates() {
            formatter.event(ReportEvent::VariableTotal {
                name: aggregate.name.clone(),
                fingerprint,
                total: aggregate.total,
                occurrences: aggregate.occurrences,
                dominant: aggregate.dominant,
                depth: 1,
            });
        }

        formatter.section("misplaced fields");
        let totals = self.find_misplaced(root, registry, &mut formatter)?;
        formatter.total("leaves", totals.leaves_visited as u64);
        formatter.total("misplaced", totals.misplaced_records);
        formatter.total("missing_partitions", totals.missing_partitions as u64);
        formatter.total("failures", totals.failures as u64);

        info!(
            root = %root.display(),
            misplaced = totals.misplaced_records,
            failures = totals.failures,
            "misplaced fields report complete"
        );
        Ok(formatter.finish())
    }

    /// Summary of a single index
    pub fn summarize(&self, path: &Path) -> Result<Report> {
        self.summarize_with_records(path, None)
    }

    /// Summary of a single index, followed by a cell listing of one variable's record arrays
    pub fn summarize_with_records(&self, path: &Path, variable: Option<&str>) -> Result<Report> {
        let mut formatter = self.formatter();
        summarize_index(&self.reader, path, self.config.include_derived_datasets, &mut formatter)?;
        if let Some(variable) = variable {
            dump_variable_records(&self.reader, path, variable, &mut formatter)?;
        }
        Ok(formatter.finish())
    }

    /// Duplicate message references in every leaf below `root`
    pub fn scan_duplicates(&self, root: &Path) -> Result<Report> {
        let mut formatter = self.formatter();
        formatter.section("duplicate records");
        let totals = self.walker().scan_duplicates(root, &mut formatter, 0)?;
        formatter.total("leaves", totals.leaves_visited as u64);
        formatter.total("records", totals.records);
        formatter.total("duplicates", totals.duplicates);
        formatter.total("missing_partitions", totals.missing_partitions as u64);
        formatter.total("failures", totals.failures as u64);

        info!(
            root = %root.display(),
            records = totals.records,
            duplicates = totals.duplicates,
            "duplicate scan complete"
        );
        Ok(formatter.finish())
    }
}

/// Run the misplaced fields report over the tree rooted at `root_index_path`
///
/// Uses the default configuration with the given dominance threshold. Only a
/// failure to open the root index is returned as an error; everything else is
/// reported inside the [`Report`].
pub fn run_misplaced_fields_report(root_index_path: impl AsRef<Path>, threshold: u64) -> Result<Report> {
    let config = InspectorConfig::default().dominance_threshold(threshold);
    Inspector::new(config)?.run_misplaced_fields_report(root_index_path.as_ref())
}
