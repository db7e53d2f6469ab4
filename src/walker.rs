//! Depth-first traversal of a collection's partition tree
//!
//! [`PartitionWalker::walk`] opens the root index, descends through child
//! partitions in listing order and hands every leaf to a [`LeafVisitor`]. Two
//! visitors live here:
//! - pass 1, [`PartitionWalker::collect_totals`], registers every leaf
//!   variable's record count
//! - pass 2, [`PartitionWalker::find_misplaced`], reports the records of
//!   non-dominant variables
//!
//! Only a failure to open the root index aborts a walk. Missing or unreadable
//! child partitions are reported and skipped, and their siblings are still
//! visited.

use crate::collection::{CollectionIndex, CollectionKind, VariableIndex};
use crate::config::InspectorConfig;
use crate::constants::MAX_PARTITION_DEPTH;
use crate::detector::{classify_variable, locate_records, Classification};
use crate::error::InspectError;
use crate::layout::resolve_partition_path;
use crate::reader::{IndexReader, ScopedIndex};
use crate::registry::VariableRegistry;
use crate::report::{ReportEvent, ReportSink};
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Per-leaf work performed during a walk
pub trait LeafVisitor {
    fn visit_leaf<R: IndexReader + ?Sized>(
        &mut self,
        reader: &R,
        leaf: &CollectionIndex,
        sink: &mut dyn ReportSink,
        depth: usize,
    ) -> Result<()>;
}

/// Structural counts gathered by every walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraversalStats {
    pub leaves_visited: usize,
    /// Child partitions whose index file does not exist
    pub missing_partitions: usize,
    /// Child partitions that exist but could not be opened
    pub failures: usize,
}

/// A partition that pass 1 could not include in the totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionProblem {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of pass 1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionTotals {
    pub leaves_visited: usize,
    /// Leaf variables registered, counting repeats across leaves
    pub variables_registered: usize,
    pub problems: Vec<PartitionProblem>,
}

/// Result of pass 2
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MisplacedTotals {
    pub leaves_visited: usize,
    pub misplaced_records: u64,
    pub missing_partitions: usize,
    /// Child opens, record loads and file lookups that failed
    pub failures: usize,
}

/// Walks a partition tree through an [`IndexReader`]
pub struct PartitionWalker<'r, R: IndexReader + ?Sized> {
    reader: &'r R,
    config: &'r InspectorConfig,
}

impl<'r, R: IndexReader + ?Sized> PartitionWalker<'r, R> {
    pub fn new(reader: &'r R, config: &'r InspectorConfig) -> Self {
        Self { reader, config }
    }

    pub fn config(&self) -> &'r InspectorConfig {
        self.config
    }

    /// Walk the tree rooted at `root`, reporting at `depth` and below
    pub fn walk<V: LeafVisitor>(
        &self,
        root: &Path,
        sink: &mut dyn ReportSink,
        depth: usize,
        visitor: &mut V,
    ) -> Result<TraversalStats> {
        let index = ScopedIndex::open(self.reader, root)?;
        sink.event(ReportEvent::IndexEntered {
            name: index.name().to_string(),
            kind: index.kind(),
            path: root.to_path_buf(),
            depth,
        });

        let mut stats = TraversalStats::default();
        self.descend(&index, sink, depth + 1, 0, visitor, &mut stats)?;
        Ok(stats)
    }

    fn descend<V: LeafVisitor>(
        &self,
        index: &CollectionIndex,
        sink: &mut dyn ReportSink,
        depth: usize,
        nesting: usize,
        visitor: &mut V,
        stats: &mut TraversalStats,
    ) -> Result<()> {
        match index.kind() {
            CollectionKind::Leaf => {
                stats.leaves_visited += 1;
                debug!(path = %index.path().display(), depth, "visiting leaf");
                visitor.visit_leaf(self.reader, index, sink, depth)
            }
            CollectionKind::PartitionOfPartitions | CollectionKind::PartitionOfLeaves => {
                for partition in index.partitions() {
                    let resolved = resolve_partition_path(index.path(), index.kind(), partition);
                    sink.event(ReportEvent::PartitionVisited {
                        name: resolved.name.clone(),
                        path: resolved.path.clone(),
                        exists: resolved.exists,
                        depth,
                    });

                    if !resolved.exists {
                        stats.missing_partitions += 1;
                        warn!(
                            parent = %index.path().display(),
                            partition = %resolved.name,
                            path = %resolved.path.display(),
                            "partition index does not exist"
                        );
                        continue;
                    }

                    if nesting >= MAX_PARTITION_DEPTH {
                        let error = InspectError::corrupt_index(
                            index.path(),
                            format!("partition nesting exceeds {} levels", MAX_PARTITION_DEPTH),
                        );
                        warn!(path = %resolved.path.display(), "{}", error);
                        sink.event(ReportEvent::diagnostic(&resolved.path, &error, depth + 1));
                        stats.failures += 1;
                        continue;
                    }

                    let child = match ScopedIndex::open(self.reader, &resolved.path) {
                        Ok(child) => child,
                        Err(error) if error.is_recoverable() => {
                            warn!(path = %resolved.path.display(), error = %error, "skipping unreadable partition");
                            sink.event(ReportEvent::diagnostic(&resolved.path, &error, depth + 1));
                            stats.failures += 1;
                            continue;
                        }
                        Err(error) => return Err(error),
                    };
                    self.descend(&child, sink, depth + 1, nesting + 1, visitor, stats)?;
                }
                Ok(())
            }
        }
    }

    /// Pass 1: add every leaf variable's record count to `registry`
    pub fn collect_totals(&self, root: &Path, registry: &mut VariableRegistry) -> Result<CollectionTotals> {
        let mut collector = TotalsCollector {
            registry,
            include_derived: self.config.include_derived_datasets,
            variables_registered: 0,
        };
        let mut problems = ProblemLog::default();
        let stats = self.walk(root, &mut problems, 0, &mut collector)?;

        Ok(CollectionTotals {
            leaves_visited: stats.leaves_visited,
            variables_registered: collector.variables_registered,
            problems: problems.problems,
        })
    }

    /// Pass 2: report misplaced records against a sealed registry
    pub fn find_misplaced(
        &self,
        root: &Path,
        registry: &VariableRegistry,
        sink: &mut dyn ReportSink,
        depth: usize,
    ) -> Result<MisplacedTotals> {
        if !registry.is_sealed() {
            return Err(InspectError::registry_phase("find_misplaced", registry.phase().to_string()));
        }

        let mut finder = MisplacedFinder {
            registry,
            config: self.config,
            misplaced_records: 0,
            failures: 0,
        };
        let stats = self.walk(root, sink, depth, &mut finder)?;

        Ok(MisplacedTotals {
            leaves_visited: stats.leaves_visited,
            misplaced_records: finder.misplaced_records,
            missing_partitions: stats.missing_partitions,
            failures: stats.failures + finder.failures,
        })
    }
}

/// Collects pass 1 problems from the walk's report events
#[derive(Debug, Default)]
struct ProblemLog {
    problems: Vec<PartitionProblem>,
}

impl ReportSink for ProblemLog {
    fn section(&mut self, _title: &str) {}

    fn event(&mut self, event: ReportEvent) {
        match event {
            ReportEvent::PartitionVisited { path, exists: false, .. } => self.problems.push(PartitionProblem {
                path,
                reason: "partition index does not exist".to_string(),
            }),
            ReportEvent::Diagnostic { path, message, .. } => {
                self.problems.push(PartitionProblem { path, reason: message })
            }
            _ => {}
        }
    }

    fn total(&mut self, _name: &str, _count: u64) {}
}

struct TotalsCollector<'a> {
    registry: &'a mut VariableRegistry,
    include_derived: bool,
    variables_registered: usize,
}

impl LeafVisitor for TotalsCollector<'_> {
    fn visit_leaf<R: IndexReader + ?Sized>(
        &mut self,
        _reader: &R,
        leaf: &CollectionIndex,
        _sink: &mut dyn ReportSink,
        _depth: usize,
    ) -> Result<()> {
        for variable in leaf.analyzed_variables(self.include_derived) {
            self.registry
                .register_occurrence(variable.fingerprint, &variable.name, variable.nrecords)?;
            self.variables_registered += 1;
        }
        Ok(())
    }
}

struct MisplacedFinder<'a> {
    registry: &'a VariableRegistry,
    config: &'a InspectorConfig,
    misplaced_records: u64,
    failures: usize,
}

impl MisplacedFinder<'_> {
    fn report_failure(&mut self, sink: &mut dyn ReportSink, path: &Path, error: InspectError, depth: usize) -> Result<()> {
        if !error.is_recoverable() {
            return Err(error);
        }
        warn!(path = %path.display(), error = %error, "misplaced record scan problem");
        sink.event(ReportEvent::diagnostic(path, &error, depth));
        self.failures += 1;
        Ok(())
    }

    fn list_records<R: IndexReader + ?Sized>(
        &mut self,
        reader: &R,
        leaf: &CollectionIndex,
        variable: &VariableIndex,
        sink: &mut dyn ReportSink,
        depth: usize,
    ) -> Result<()> {
        let mut locations = match locate_records(reader, leaf, variable) {
            Ok(locations) => locations,
            Err(error) => return self.report_failure(sink, leaf.path(), error, depth),
        };

        let cap = self.config.max_records_per_variable.unwrap_or(usize::MAX);
        let mut listed = 0usize;
        for item in locations.by_ref() {
            match item {
                Ok(record) => sink.event(ReportEvent::MisplacedRecord { record, depth }),
                Err(error) => self.report_failure(sink, leaf.path(), error, depth)?,
            }
            listed += 1;
            if listed >= cap {
                break;
            }
        }

        if locations.remaining() > 0 {
            sink.event(ReportEvent::RecordsElided {
                remaining: locations.remaining() as u64,
                depth,
            });
        }
        Ok(())
    }
}

impl LeafVisitor for MisplacedFinder<'_> {
    fn visit_leaf<R: IndexReader + ?Sized>(
        &mut self,
        reader: &R,
        leaf: &CollectionIndex,
        sink: &mut dyn ReportSink,
        depth: usize,
    ) -> Result<()> {
        let mut misplaced = Vec::new();
        let mut leaf_total = 0u64;
        for variable in leaf.analyzed_variables(self.config.include_derived_datasets) {
            match classify_variable(variable, self.registry) {
                Ok(Classification::Placed) => {}
                Ok(Classification::Misplaced(count)) => {
                    if count > 0 {
                        leaf_total = leaf_total.saturating_add(count);
                        misplaced.push((variable, count));
                    }
                }
                Err(error) => self.report_failure(sink, leaf.path(), error, depth)?,
            }
        }

        sink.event(ReportEvent::LeafSummary {
            misplaced: leaf_total,
            depth,
        });
        if leaf_total == 0 {
            return Ok(());
        }
        self.misplaced_records = self.misplaced_records.saturating_add(leaf_total);

        for (variable, count) in misplaced {
            sink.event(ReportEvent::MisplacedVariable {
                name: variable.name.clone(),
                fingerprint: variable.fingerprint,
                count,
                collection_total: self.registry.total(variable.fingerprint).unwrap_or(count),
                depth,
            });
            if self.config.show_records {
                self.list_records(reader, leaf, variable, sink, depth + 1)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::FileIndexReader;
    use crate::report::ReportFormatter;
    use crate::identifiers::Fingerprint;
    use crate::test_utils::{leaf_fixture, partition_fixture, CatalogReader, CountingReader, TestEnvironment};

    fn sealed(reader: &impl IndexReader, config: &InspectorConfig, root: &Path, threshold: u64) -> VariableRegistry {
        let mut registry = VariableRegistry::new();
        PartitionWalker::new(reader, config)
            .collect_totals(root, &mut registry)
            .unwrap();
        registry.finalize_dominance(threshold).unwrap();
        registry
    }

    #[test]
    fn test_collect_totals_over_partitions() {
        let env = TestEnvironment::new("test_collect_totals_over_partitions");
        leaf_fixture(env.path(), "A", &[("X", 1, 5000), ("Y", 2, 50)]);
        leaf_fixture(env.path(), "B", &[("Y", 2, 20)]);
        let root = partition_fixture(env.path(), "root", &["A", "B"]);

        let config = InspectorConfig::default();
        let reader = FileIndexReader::new();
        let mut registry = VariableRegistry::new();
        let totals = PartitionWalker::new(&reader, &config)
            .collect_totals(&root, &mut registry)
            .unwrap();

        assert_eq!(totals.leaves_visited, 2);
        assert_eq!(totals.variables_registered, 3);
        assert!(totals.problems.is_empty());
        assert_eq!(registry.total(Fingerprint::new(1)), Some(5000));
        assert_eq!(registry.total(Fingerprint::new(2)), Some(70));
    }

    #[test]
    fn test_leaf_short_circuit_reads_no_records() {
        let env = TestEnvironment::new("test_leaf_short_circuit_reads_no_records");
        let root = leaf_fixture(env.path(), "leaf", &[("X", 1, 2000), ("Z", 3, 1500)]);

        let config = InspectorConfig::default();
        let reader = CountingReader::new(FileIndexReader::new());
        let registry = sealed(&reader, &config, &root, 1000);

        let mut formatter = ReportFormatter::default();
        let totals = PartitionWalker::new(&reader, &config)
            .find_misplaced(&root, &registry, &mut formatter, 0)
            .unwrap();

        assert_eq!(totals.misplaced_records, 0);
        assert_eq!(reader.record_reads(), 0);
        assert_eq!(formatter.finish().lines_containing("misplaced: none").count(), 1);
    }

    #[test]
    fn test_find_misplaced_requires_sealed_registry() {
        let env = TestEnvironment::new("test_find_misplaced_requires_sealed_registry");
        let root = leaf_fixture(env.path(), "leaf", &[("X", 1, 1)]);
        let config = InspectorConfig::default();
        let reader = FileIndexReader::new();

        let result = PartitionWalker::new(&reader, &config).find_misplaced(
            &root,
            &VariableRegistry::new(),
            &mut ReportFormatter::default(),
            0,
        );
        assert!(matches!(result, Err(InspectError::RegistryPhase { .. })));
    }

    #[test]
    fn test_every_open_is_closed() {
        let env = TestEnvironment::new("test_every_open_is_closed");
        leaf_fixture(env.path(), "A", &[("Y", 2, 5)]);
        std::fs::write(env.path().join("B.ncx"), b"definitely not an index file, but long enough to map").unwrap();
        let root = partition_fixture(env.path(), "root", &["A", "B", "C"]);

        let config = InspectorConfig::default();
        let reader = CountingReader::new(FileIndexReader::new());
        let registry = sealed(&reader, &config, &root, 1000);

        let mut formatter = ReportFormatter::default();
        let totals = PartitionWalker::new(&reader, &config)
            .find_misplaced(&root, &registry, &mut formatter, 0)
            .unwrap();

        assert_eq!(totals.missing_partitions, 1);
        assert_eq!(totals.failures, 1);
        assert_eq!(totals.misplaced_records, 5);
        assert_eq!(reader.opens(), reader.closes());
    }

    #[test]
    fn test_record_cap_elides_remaining() {
        let env = TestEnvironment::new("test_record_cap_elides_remaining");
        let root = leaf_fixture(env.path(), "leaf", &[("Y", 2, 7)]);

        let config = InspectorConfig::default().max_records_per_variable(Some(3));
        let reader = FileIndexReader::new();
        let registry = sealed(&reader, &config, &root, 1000);

        let mut formatter = ReportFormatter::default();
        PartitionWalker::new(&reader, &config)
            .find_misplaced(&root, &registry, &mut formatter, 0)
            .unwrap();
        let report = formatter.finish();

        assert_eq!(report.lines_containing("leaf.grib2").count(), 3);
        assert_eq!(report.lines_containing("... 4 more").count(), 1);
    }

    #[test]
    fn test_counts_only_mode_skips_record_loads() {
        let env = TestEnvironment::new("test_counts_only_mode_skips_record_loads");
        let root = leaf_fixture(env.path(), "leaf", &[("Y", 2, 7)]);

        let config = InspectorConfig::default().show_records(false);
        let reader = CountingReader::new(FileIndexReader::new());
        let registry = sealed(&reader, &config, &root, 1000);

        let mut formatter = ReportFormatter::default();
        let totals = PartitionWalker::new(&reader, &config)
            .find_misplaced(&root, &registry, &mut formatter, 0)
            .unwrap();

        assert_eq!(totals.misplaced_records, 7);
        assert_eq!(reader.record_reads(), 0);
    }

    #[test]
    fn test_unregistered_variable_is_a_diagnostic() {
        let env = TestEnvironment::new("test_unregistered_variable_is_a_diagnostic");
        leaf_fixture(env.path(), "A", &[("Q", 9, 3), ("Y", 2, 4)]);
        leaf_fixture(env.path(), "B", &[("Y", 2, 20)]);
        let root = partition_fixture(env.path(), "root", &["A", "B"]);
        let census = partition_fixture(env.path(), "census", &["B"]);

        // Q only exists below `root`, so the registry built from `census` never saw it
        let config = InspectorConfig::default();
        let reader = FileIndexReader::new();
        let registry = sealed(&reader, &config, &census, 1000);

        let mut formatter = ReportFormatter::default();
        let totals = PartitionWalker::new(&reader, &config)
            .find_misplaced(&root, &registry, &mut formatter, 0)
            .unwrap();
        let report = formatter.finish();

        assert_eq!(report.lines_containing("ERROR [unknown-fingerprint]").count(), 1);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].path, env.path().join("A.ncx"));
        assert_eq!(totals.failures, 1);
        assert_eq!(report.lines_containing("misplaced: 4").count(), 1);
        assert_eq!(report.lines_containing("misplaced: 20").count(), 1);
        assert_eq!(totals.misplaced_records, 24);
    }

    #[test]
    fn test_misplaced_totals_saturate() {
        let half = u64::MAX / 2 + 1;
        let reader = CatalogReader::new(&[("X", 1, half), ("Y", 2, half)]);
        let root = Path::new("/catalog.ncx");
        let config = InspectorConfig::default().show_records(false);
        let registry = sealed(&reader, &config, root, u64::MAX);
        assert!(registry.dominant_fingerprints().is_empty());

        let mut formatter = ReportFormatter::default();
        let totals = PartitionWalker::new(&reader, &config)
            .find_misplaced(root, &registry, &mut formatter, 0)
            .unwrap();
        let report = formatter.finish();

        assert_eq!(totals.misplaced_records, u64::MAX);
        assert_eq!(report.lines_containing(&format!("misplaced: {}", u64::MAX)).count(), 1);
        assert_eq!(report.lines_containing(&format!("misplaced={}", half)).count(), 2);
    }
}
