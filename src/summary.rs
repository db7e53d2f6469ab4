//! Collection index summary
//!
//! Lists one index's datasets, groups and variables with their record,
//! duplicate and missing counts, followed by the member file table and the
//! child partitions. Derived datasets are listed but only counted in the
//! totals when configured to be. [`dump_variable_records`] lists the cells of
//! one variable's sparse record arrays.

use crate::error::InspectError;
use crate::layout::resolve_partition_path;
use crate::reader::{IndexReader, ScopedIndex};
use crate::report::{ReportEvent, ReportSink};
use crate::Result;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Counts gathered while summarizing one index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTotals {
    pub datasets: usize,
    pub groups: usize,
    pub variables: usize,
    pub records: u64,
    pub duplicates: u64,
    pub missing: u64,
    pub files: usize,
    pub partitions: usize,
    pub missing_partitions: usize,
}

/// Describe the index at `path` to `sink`
pub fn summarize_index<R: IndexReader + ?Sized>(
    reader: &R,
    path: &Path,
    include_derived: bool,
    sink: &mut dyn ReportSink,
) -> Result<SummaryTotals> {
    let index = ScopedIndex::open(reader, path)?;
    let mut totals = SummaryTotals::default();

    sink.section("index");
    sink.event(ReportEvent::IndexEntered {
        name: index.name().to_string(),
        kind: index.kind(),
        path: path.to_path_buf(),
        depth: 0,
    });

    for dataset in index.datasets() {
        let counted = include_derived || !dataset.kind.is_derived();
        totals.datasets += 1;
        sink.event(ReportEvent::DatasetEntered {
            kind: dataset.kind,
            depth: 1,
        });

        for group in &dataset.groups {
            totals.groups += 1;
            sink.event(ReportEvent::GroupEntered {
                description: group.description.clone(),
                depth: 2,
            });

            let (mut nrecords, mut ndups, mut nmissing) = (0u64, 0u64, 0u64);
            for variable in &group.variables {
                sink.event(ReportEvent::VariableStats {
                    name: variable.name.clone(),
                    nrecords: variable.nrecords,
                    ndups: variable.ndups,
                    nmissing: variable.nmissing,
                    depth: 3,
                });
                nrecords = nrecords.saturating_add(variable.nrecords);
                ndups = ndups.saturating_add(variable.ndups);
                nmissing = nmissing.saturating_add(variable.nmissing);
            }
            sink.event(ReportEvent::GroupTotals {
                nrecords,
                ndups,
                nmissing,
                depth: 2,
            });

            if counted {
                totals.variables += group.variables.len();
                totals.records = totals.records.saturating_add(nrecords);
                totals.duplicates = totals.duplicates.saturating_add(ndups);
                totals.missing = totals.missing.saturating_add(nmissing);
            }
        }
    }

    sink.section("files");
    for (fileno, name) in index.files().iter() {
        sink.event(ReportEvent::FileEntry {
            fileno,
            name: name.to_string(),
            depth: 1,
        });
    }
    totals.files = index.files().len();

    if index.kind().is_partition() {
        sink.section("partitions");
        for partition in index.partitions() {
            let resolved = resolve_partition_path(index.path(), index.kind(), partition);
            if !resolved.exists {
                totals.missing_partitions += 1;
            }
            sink.event(ReportEvent::PartitionVisited {
                name: resolved.name,
                path: resolved.path,
                exists: resolved.exists,
                depth: 1,
            });
        }
        totals.partitions = index.partitions().len();
    }

    sink.total("records", totals.records);
    sink.total("duplicates", totals.duplicates);
    sink.total("missing", totals.missing);
    sink.total("files", totals.files as u64);
    if index.kind().is_partition() {
        sink.total("partitions", totals.partitions as u64);
        sink.total("missing_partitions", totals.missing_partitions as u64);
    }
    Ok(totals)
}

/// Counts gathered while dumping a variable's record arrays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordDumpTotals {
    pub arrays: usize,
    pub records: u64,
    pub missing: u64,
    pub failures: usize,
}

/// List every cell of the sparse arrays of variables named `variable_name`
///
/// Each dataset and group holding a variable of that name is dumped, derived
/// datasets included. Cells are listed in row-major order with the member
/// file and offset of their record. Unreadable arrays and unknown file
/// numbers are reported as diagnostics.
pub fn dump_variable_records<R: IndexReader + ?Sized>(
    reader: &R,
    path: &Path,
    variable_name: &str,
    sink: &mut dyn ReportSink,
) -> Result<RecordDumpTotals> {
    let index = ScopedIndex::open(reader, path)?;
    let mut totals = RecordDumpTotals::default();
    let mut matched = false;

    sink.section(&format!("records of {}", variable_name));
    for dataset in index.datasets() {
        for group in &dataset.groups {
            for variable in group.variables.iter().filter(|v| v.name == variable_name) {
                matched = true;
                sink.event(ReportEvent::DatasetEntered {
                    kind: dataset.kind,
                    depth: 0,
                });
                sink.event(ReportEvent::GroupEntered {
                    description: group.description.clone(),
                    depth: 1,
                });

                let sparse = match reader.read_records(&index, variable) {
                    Ok(sparse) => sparse,
                    Err(error) if error.is_recoverable() => {
                        warn!(path = %path.display(), variable = %variable.name, error = %error, "cannot load records");
                        sink.event(ReportEvent::diagnostic(path, &error, 2));
                        totals.failures += 1;
                        continue;
                    }
                    Err(error) => return Err(error),
                };
                totals.arrays += 1;
                sink.event(ReportEvent::SparseArrayInfo {
                    name: variable.name.clone(),
                    fingerprint: variable.fingerprint,
                    shape: sparse.shape().to_vec(),
                    cells: sparse.total_size() as u64,
                    nrecords: sparse.len() as u64,
                    ndups: u64::from(sparse.ndups()),
                    nmissing: sparse.nmissing() as u64,
                    depth: 2,
                });

                for cell in 0..sparse.total_size() {
                    let record = match sparse.record_at(cell) {
                        None => {
                            totals.missing += 1;
                            None
                        }
                        Some(record) => match index.files().filename(record.fileno) {
                            Ok(filename) => {
                                totals.records += 1;
                                Some((filename.to_string(), record.pos))
                            }
                            Err(error) => {
                                sink.event(ReportEvent::diagnostic(path, &error, 3));
                                totals.failures += 1;
                                continue;
                            }
                        },
                    };
                    sink.event(ReportEvent::SparseCell {
                        coords: sparse.cell_coordinates(cell),
                        record,
                        depth: 3,
                    });
                }
            }
        }
    }

    if !matched {
        return Err(InspectError::invalid_input(
            "records",
            format!("index {} has no variable named {}", path.display(), variable_name),
            "Run the summary without a variable name to list the variables",
        ));
    }

    sink.total("listed_records", totals.records);
    sink.total("listed_missing", totals.missing);
    sink.total("listed_failures", totals.failures as u64);
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionKind, DatasetKind};
    use crate::identifiers::Fingerprint;
    use crate::layout::{DatasetSpec, GroupSpec, IndexWriter, VariableSpec};
    use crate::reader::FileIndexReader;
    use crate::report::ReportFormatter;
    use crate::structures::{Record, SparseArray};
    use crate::test_utils::{dense_records, leaf_fixture, partition_fixture, CatalogReader, TestEnvironment};

    #[test]
    fn test_summary_of_leaf() {
        let env = TestEnvironment::new("test_summary_of_leaf");
        let path = env.path().join("leaf.ncx");
        let sparse = SparseArray::new(
            vec![4],
            vec![1, 0, 2, 2],
            vec![Record::new(0, 0), Record::new(1, 100)],
            1,
        )
        .unwrap();
        IndexWriter::new(CollectionKind::Leaf, "leaf")
            .file("a.grib2")
            .file("b.grib2")
            .dataset(
                DatasetSpec::new(DatasetKind::TwoD)
                    .group(GroupSpec::new("grid").variable(VariableSpec::new("X", Fingerprint::new(1), sparse))),
            )
            .dataset(
                DatasetSpec::new(DatasetKind::Best)
                    .group(GroupSpec::new("grid").variable(VariableSpec::new("X", Fingerprint::new(1), dense_records(3)))),
            )
            .write(&path)
            .unwrap();

        let mut formatter = ReportFormatter::new(1);
        let totals = summarize_index(&FileIndexReader::new(), &path, false, &mut formatter).unwrap();
        let report = formatter.finish();

        assert_eq!(totals.datasets, 2);
        assert_eq!(totals.records, 2);
        assert_eq!(totals.duplicates, 1);
        assert_eq!(totals.missing, 1);
        assert_eq!(totals.files, 2);

        assert!(report.lines.contains(&"   X nrecords=2 ndups=1 nmissing=1".to_string()));
        assert!(report
            .lines
            .contains(&"  Group total nrecords=2, ndups=1 (0.500000), nmiss=1 (0.500000)".to_string()));
        assert!(report.lines.contains(&" Dataset Best (derived)".to_string()));
        assert!(report.lines.contains(&" 1: b.grib2".to_string()));
        assert_eq!(report.total("records"), Some(2));
    }

    #[test]
    fn test_summary_lists_partitions() {
        let env = TestEnvironment::new("test_summary_lists_partitions");
        leaf_fixture(env.path(), "A", &[("X", 1, 1)]);
        let root = partition_fixture(env.path(), "root", &["A", "gone"]);

        let mut formatter = ReportFormatter::default();
        let totals = summarize_index(&FileIndexReader::new(), &root, false, &mut formatter).unwrap();
        let report = formatter.finish();

        assert_eq!(totals.partitions, 2);
        assert_eq!(totals.missing_partitions, 1);
        assert_eq!(report.lines_containing("NOT EXIST").count(), 1);
        assert_eq!(report.lines_containing("== partitions ==").count(), 1);
        assert_eq!(report.total("missing_partitions"), Some(1));
    }

    #[test]
    fn test_group_totals_saturate() {
        let half = u64::MAX / 2 + 1;
        let reader = CatalogReader::new(&[("X", 1, half), ("Y", 2, half)]);

        let mut formatter = ReportFormatter::default();
        let totals = summarize_index(&reader, Path::new("/catalog.ncx"), false, &mut formatter).unwrap();
        let report = formatter.finish();

        assert_eq!(totals.records, u64::MAX);
        assert_eq!(totals.duplicates, u64::MAX);
        assert_eq!(totals.missing, u64::MAX);
        assert_eq!(
            report
                .lines_containing(&format!("Group total nrecords={}, ndups={}", u64::MAX, u64::MAX))
                .count(),
            1
        );
        assert_eq!(report.total("records"), Some(u64::MAX));
    }

    #[test]
    fn test_dump_variable_records() {
        let env = TestEnvironment::new("test_dump_variable_records");
        let path = env.path().join("leaf.ncx");
        let sparse = SparseArray::new(
            vec![2, 2],
            vec![1, 0, 2, 3],
            vec![Record::new(0, 0), Record::new(1, 512), Record::new(7, 1024)],
            0,
        )
        .unwrap();
        IndexWriter::new(CollectionKind::Leaf, "leaf")
            .file("a.grib2")
            .file("b.grib2")
            .dataset(
                DatasetSpec::new(DatasetKind::TwoD).group(
                    GroupSpec::new("grid")
                        .variable(VariableSpec::new("X", Fingerprint::new(1), sparse))
                        .variable(VariableSpec::new("Y", Fingerprint::new(2), dense_records(5))),
                ),
            )
            .dataset(
                DatasetSpec::new(DatasetKind::Best)
                    .group(GroupSpec::new("grid").variable(VariableSpec::new("X", Fingerprint::new(1), dense_records(1)))),
            )
            .write(&path)
            .unwrap();

        let mut formatter = ReportFormatter::default();
        let totals = dump_variable_records(&FileIndexReader::new(), &path, "X", &mut formatter).unwrap();
        let report = formatter.finish();

        assert_eq!(totals.arrays, 2);
        assert_eq!(totals.records, 3);
        assert_eq!(totals.missing, 1);
        assert_eq!(totals.failures, 1);
        assert_eq!(
            &report.lines[..7],
            &[
                "== records of X ==",
                "Dataset TwoD",
                "  Group grid",
                "    X 0x00000001 shape=[2, 2] cells=4 nrecords=3 ndups=0 nmissing=1 (0.250000)",
                "      [0, 0] a.grib2 0",
                "      [0, 1] missing",
                "      [1, 0] b.grib2 512",
            ]
        );
        assert_eq!(report.lines_containing("ERROR [unknown-file-number]").count(), 1);
        assert!(report.lines.contains(&"Dataset Best (derived)".to_string()));
        assert!(report.lines.contains(&"      [0] a.grib2 0".to_string()));
        assert_eq!(report.lines_containing("Y ").count(), 0);
        assert_eq!(report.total("listed_records"), Some(3));
    }

    #[test]
    fn test_dump_unknown_variable_is_rejected() {
        let env = TestEnvironment::new("test_dump_unknown_variable_is_rejected");
        let path = leaf_fixture(env.path(), "A", &[("X", 1, 2)]);

        let result = dump_variable_records(&FileIndexReader::new(), &path, "Nope", &mut ReportFormatter::default());
        assert!(matches!(result, Err(InspectError::InvalidInput { .. })));
    }
}
