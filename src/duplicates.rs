//! Duplicate message reference scan
//!
//! A leaf index should reference each physical message (file number plus
//! byte offset) once. This scan loads every record array of every leaf and
//! counts records whose message was already referenced earlier in the same
//! leaf.

use crate::collection::CollectionIndex;
use crate::reader::IndexReader;
use crate::report::{ReportEvent, ReportSink};
use crate::walker::{LeafVisitor, PartitionWalker};
use crate::Result;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Result of a duplicate scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateTotals {
    pub leaves_visited: usize,
    pub records: u64,
    pub duplicates: u64,
    pub missing_partitions: usize,
    pub failures: usize,
}

struct DuplicateCounter {
    include_derived: bool,
    records: u64,
    duplicates: u64,
    failures: usize,
}

impl LeafVisitor for DuplicateCounter {
    fn visit_leaf<R: IndexReader + ?Sized>(
        &mut self,
        reader: &R,
        leaf: &CollectionIndex,
        sink: &mut dyn ReportSink,
        depth: usize,
    ) -> Result<()> {
        let mut seen: FxHashSet<(u32, u64)> = FxHashSet::default();
        let mut records = 0u64;
        let mut duplicates = 0u64;

        for variable in leaf.analyzed_variables(self.include_derived) {
            let sparse = match reader.read_records(leaf, variable) {
                Ok(sparse) => sparse,
                Err(error) if error.is_recoverable() => {
                    warn!(path = %leaf.path().display(), variable = %variable.name, error = %error, "cannot load records");
                    sink.event(ReportEvent::diagnostic(leaf.path(), &error, depth));
                    self.failures += 1;
                    continue;
                }
                Err(error) => return Err(error),
            };
            for record in sparse.records() {
                records += 1;
                if !seen.insert(record.message_key()) {
                    duplicates += 1;
                }
            }
        }

        sink.event(ReportEvent::LeafDuplicates {
            duplicates,
            records,
            depth,
        });
        self.records = self.records.saturating_add(records);
        self.duplicates = self.duplicates.saturating_add(duplicates);
        Ok(())
    }
}

impl<R: IndexReader + ?Sized> PartitionWalker<'_, R> {
    /// Count duplicate message references in every leaf below `root`
    pub fn scan_duplicates(&self, root: &Path, sink: &mut dyn ReportSink, depth: usize) -> Result<DuplicateTotals> {
        let mut counter = DuplicateCounter {
            include_derived: self.config().include_derived_datasets,
            records: 0,
            duplicates: 0,
            failures: 0,
        };
        let stats = self.walk(root, sink, depth, &mut counter)?;

        Ok(DuplicateTotals {
            leaves_visited: stats.leaves_visited,
            records: counter.records,
            duplicates: counter.duplicates,
            missing_partitions: stats.missing_partitions,
            failures: stats.failures + counter.failures,
        })
    }
}
