//! Common test utilities for integration tests
//!
//! Integration tests cannot reach the crate's own test_utils module, so the
//! fixture writers they share live here.

use ncx_inspect::layout::{DatasetSpec, GroupSpec, VariableSpec};
use ncx_inspect::{open_index_file, CollectionKind, DatasetKind, Fingerprint, IndexWriter, Record, SparseArray};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Error messages for consistent test error reporting
pub mod test_error_messages {
    pub const FAILED_TO_CREATE_TEMP_DIR: &str = "Failed to create test temporary directory";
    pub const FAILED_TO_WRITE_INDEX: &str = "Failed to write fixture index";
}

/// Creates a temporary directory for test use with proper error handling
pub fn create_temp_dir_for_test() -> TempDir {
    TempDir::new().expect(test_error_messages::FAILED_TO_CREATE_TEMP_DIR)
}

/// `count` records in member file `fileno`, 1 KiB apart starting at `start`
pub fn records_in_file(fileno: u32, start: u64, count: usize) -> SparseArray {
    SparseArray::dense(
        (0..count as u64)
            .map(|i| Record::new(fileno, start + i * 1024))
            .collect(),
    )
}

/// Builder for a leaf index with a single TwoD group
pub struct LeafBuilder {
    name: String,
    files: Vec<String>,
    group: GroupSpec,
    derived: Option<GroupSpec>,
}

#[allow(dead_code)]
impl LeafBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: vec![format!("{}.grib2", name)],
            group: GroupSpec::new("grid"),
            derived: None,
        }
    }

    pub fn file(mut self, name: &str) -> Self {
        self.files.push(name.to_string());
        self
    }

    /// Add a variable with `count` dense records in file 0
    pub fn dense(self, name: &str, fingerprint: u32, count: usize) -> Self {
        self.records(name, fingerprint, records_in_file(0, 0, count))
    }

    pub fn records(mut self, name: &str, fingerprint: u32, records: SparseArray) -> Self {
        self.group = self
            .group
            .variable(VariableSpec::new(name, Fingerprint::new(fingerprint), records));
        self
    }

    /// Add a variable to a Best dataset
    pub fn derived(mut self, name: &str, fingerprint: u32, count: usize) -> Self {
        let group = self.derived.take().unwrap_or_else(|| GroupSpec::new("grid"));
        self.derived = Some(group.variable(VariableSpec::new(
            name,
            Fingerprint::new(fingerprint),
            records_in_file(0, 0, count),
        )));
        self
    }

    /// Write `<dir>/<name>.ncx`
    pub fn write(self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("{}.ncx", self.name));
        let mut writer = self
            .files
            .into_iter()
            .fold(IndexWriter::new(CollectionKind::Leaf, &self.name), |writer, file| writer.file(file))
            .dataset(DatasetSpec::new(DatasetKind::TwoD).group(self.group));
        if let Some(derived) = self.derived {
            writer = writer.dataset(DatasetSpec::new(DatasetKind::Best).group(derived));
        }
        writer.write(&path).expect(test_error_messages::FAILED_TO_WRITE_INDEX);
        path
    }
}

/// Write a leaf with dense variables given as `(name, fingerprint, count)`
pub fn write_leaf(dir: &Path, name: &str, variables: &[(&str, u32, usize)]) -> PathBuf {
    variables
        .iter()
        .fold(LeafBuilder::new(name), |leaf, &(var, fp, count)| leaf.dense(var, fp, count))
        .write(dir)
}

/// Write a partition-of-leaves index whose children are `<leaf>.ncx` next to it
pub fn write_partition_of_leaves(dir: &Path, name: &str, leaves: &[&str]) -> PathBuf {
    let path = dir.join(format!("{}.ncx", name));
    leaves
        .iter()
        .fold(IndexWriter::new(CollectionKind::PartitionOfLeaves, name), |writer, leaf| {
            writer.partition(*leaf, format!("/build/{}/{}", name, leaf), format!("{}.ncx", leaf))
        })
        .write(&path)
        .expect(test_error_messages::FAILED_TO_WRITE_INDEX);
    path
}

/// Write a partition-of-partitions index
///
/// Each child `c` is expected at `<dir>/<c>/<c>.ncx`; the stored directory is
/// a build-time path that only shares its last component with that layout.
pub fn write_partition_of_partitions(dir: &Path, name: &str, children: &[&str]) -> PathBuf {
    let path = dir.join(format!("{}.ncx", name));
    children
        .iter()
        .fold(IndexWriter::new(CollectionKind::PartitionOfPartitions, name), |writer, child| {
            writer.partition(*child, format!("/build/{}/{}", name, child), format!("{}.ncx", child))
        })
        .write(&path)
        .expect(test_error_messages::FAILED_TO_WRITE_INDEX);
    path
}

/// Reference aggregation: per-fingerprint record totals over a flat list of leaf files
pub fn flat_totals(leaves: &[PathBuf]) -> BTreeMap<Fingerprint, u64> {
    let mut totals = BTreeMap::new();
    for leaf in leaves {
        let index = open_index_file(leaf).expect("Failed to open leaf");
        for variable in index.analyzed_variables(false) {
            *totals.entry(variable.fingerprint).or_insert(0) += variable.nrecords;
        }
    }
    totals
}
