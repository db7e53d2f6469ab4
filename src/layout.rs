//! Collection index file layout
//!
//! This module owns the on-disk format of `.ncx` collection index files:
//! - [`IndexWriter`]: fluent builder producing an index file through a
//!   memory-mapped write
//! - [`open_index_file`]: maps an index, validates its header and decodes the
//!   JSON catalog
//! - [`read_sparse_array`]: lazily decodes one variable's record array
//! - [`resolve_partition_path`]: locates a child partition relative to its
//!   parent index
//!
//! # File Structure
//!
//! ```text
//! [IndexHeader 80 bytes][catalog JSON][pad to 8][record section]
//! record section := { [SparseArrayHeader][shape][track][pad][records][pad] }*
//! ```
//!
//! The header and catalog are validated when the file is opened; the record
//! section is only checked blob by blob when records are read.

use crate::collection::{CollectionIndex, CollectionKind, Dataset, DatasetKind, FileTable, Group, Partition, VariableIndex};
use crate::constants::magic;
use crate::error::InspectError;
use crate::identifiers::Fingerprint;
use crate::memory::{IndexHeader, MemoryMappedFile};
use crate::structures::{align_up, BlobLayout, Record, SparseArray, SparseArrayHeader, SparseArrayLocation};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// JSON catalog stored after the index header
#[derive(Debug, Serialize, Deserialize)]
struct Catalog {
    name: String,
    kind: CollectionKind,
    files: FileTable,
    #[serde(default)]
    partitions: Vec<Partition>,
    #[serde(default)]
    datasets: Vec<Dataset>,
}

/// Mapped record section of an opened index
#[derive(Debug)]
pub struct RecordSection {
    file: MemoryMappedFile,
    offset: u64,
    len: u64,
}

impl RecordSection {
    /// Absolute offset of the section within the file
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Section length as recorded in the header
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Open and validate a collection index file
///
/// Fails with `NotAnIndexFile` when the file is too small or its header is
/// not recognized, and with `CorruptIndex` when the catalog is out of bounds,
/// fails its checksum, or does not parse.
pub fn open_index_file(path: &Path) -> Result<CollectionIndex> {
    let file_len = std::fs::metadata(path)
        .map_err(|e| InspectError::Io(e).with_file_context(path, "read index metadata"))?
        .len();
    if file_len < IndexHeader::SIZE as u64 {
        return Err(InspectError::not_an_index(
            path,
            format!("file is {} bytes, smaller than the {} byte header", file_len, IndexHeader::SIZE),
        ));
    }

    let file = MemoryMappedFile::open_read_only(path)?;
    let header: IndexHeader = file.read_at(0)?;
    header.validate_magic(path)?;
    header.validate_version(path)?;
    header.validate_structure(path, file.len())?;

    let catalog_bytes = file.bytes_at(header.catalog_offset as usize, header.catalog_len as usize)?;
    header.validate_checksum(path, catalog_bytes)?;

    let catalog: Catalog = serde_json::from_slice(catalog_bytes)
        .map_err(|e| InspectError::corrupt_index(path, format!("catalog does not parse: {}", e)))?;

    let kind = CollectionKind::from_code(header.kind)
        .ok_or_else(|| InspectError::corrupt_index(path, format!("unknown collection kind code {}", header.kind)))?;
    if kind != catalog.kind {
        return Err(InspectError::corrupt_index(
            path,
            format!("header kind '{}' disagrees with catalog kind '{}'", kind, catalog.kind),
        ));
    }

    Ok(CollectionIndex {
        path: path.to_path_buf(),
        name: catalog.name,
        kind,
        datasets: catalog.datasets,
        files: catalog.files,
        partitions: catalog.partitions,
        records: Some(RecordSection {
            file,
            offset: header.records_offset,
            len: header.records_len,
        }),
    })
}

/// Decode one sparse record array from an index's record section
pub fn read_sparse_array(section: &RecordSection, location: &SparseArrayLocation) -> Result<SparseArray> {
    let path = section.file.path();
    if location.is_empty() {
        return Ok(SparseArray::dense(Vec::new()));
    }

    let blob_end = location.offset.checked_add(location.len);
    if blob_end.map_or(true, |end| end > section.len) {
        return Err(InspectError::corrupt_index(
            path,
            format!(
                "record array at {}+{} lies outside the {} byte record section",
                location.offset, location.len, section.len
            ),
        ));
    }

    let start = section.offset.saturating_add(location.offset);
    if start.saturating_add(location.len) > section.file.len() as u64 {
        return Err(InspectError::corrupt_index(
            path,
            format!(
                "record array at offset {} with length {} is truncated (file is {} bytes)",
                start,
                location.len,
                section.file.len()
            ),
        ));
    }
    let start = start as usize;
    let blob_len = location.len as usize;

    if blob_len < SparseArrayHeader::SIZE {
        return Err(InspectError::corrupt_index(
            path,
            format!("record array length {} is smaller than its header", blob_len),
        ));
    }

    let header: SparseArrayHeader = section.file.read_at(start)?;
    if &header.magic != magic::SPARSE_ARRAY {
        return Err(InspectError::corrupt_index(
            path,
            format!("record array at offset {} has bad magic {:?}", start, header.magic),
        ));
    }

    let layout = BlobLayout::for_counts(header.ndims as usize, header.ntrack as usize, header.nrecords as usize);
    if layout.total_len != blob_len {
        return Err(InspectError::corrupt_index(
            path,
            format!(
                "record array at offset {} declares {} bytes of content but is stored in {}",
                start, layout.total_len, blob_len
            ),
        ));
    }

    let body = section
        .file
        .bytes_at(start + SparseArrayHeader::SIZE, blob_len - SparseArrayHeader::SIZE)?;
    let actual = crc32fast::hash(body);
    if actual != header.checksum {
        return Err(InspectError::corrupt_index(
            path,
            format!(
                "record array checksum mismatch at offset {}: expected {:#010x}, found {:#010x}",
                start, header.checksum, actual
            ),
        ));
    }

    let shape = section
        .file
        .read_slice_at::<u32>(start + layout.shape_offset, header.ndims as usize)?
        .to_vec();
    let track = section
        .file
        .read_slice_at::<u32>(start + layout.track_offset, header.ntrack as usize)?
        .to_vec();
    let records = section
        .file
        .read_slice_at::<Record>(start + layout.records_offset, header.nrecords as usize)?
        .to_vec();

    SparseArray::new(shape, track, records, header.ndups).map_err(|reason| InspectError::corrupt_index(path, reason))
}

/// A child partition resolved against its parent's location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPartition {
    pub name: String,
    pub path: PathBuf,
    pub exists: bool,
}

/// Resolve where a child partition's index lives on disk
///
/// The location is derived from the parent index's own path rather than the
/// directory stored at build time, so a collection tree can be moved as a
/// whole. Children of a partition-of-partitions live in a subdirectory named
/// after the last component of their stored directory; children of a
/// partition-of-leaves sit next to the parent.
pub fn resolve_partition_path(
    parent_index_path: &Path,
    parent_kind: CollectionKind,
    partition: &Partition,
) -> ResolvedPartition {
    let parent_dir = parent_index_path.parent().unwrap_or_else(|| Path::new(""));
    let path = match parent_kind {
        CollectionKind::PartitionOfPartitions => match partition.directory.file_name() {
            Some(last) => parent_dir.join(last).join(&partition.filename),
            None => parent_dir.join(&partition.filename),
        },
        CollectionKind::PartitionOfLeaves | CollectionKind::Leaf => parent_dir.join(&partition.filename),
    };
    let exists = path.is_file();
    ResolvedPartition {
        name: partition.name.clone(),
        path,
        exists,
    }
}

/// One variable to be written by [`IndexWriter`]
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub records: SparseArray,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, fingerprint: Fingerprint, records: SparseArray) -> Self {
        Self {
            fingerprint,
            name: name.into(),
            records,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub description: String,
    pub variables: Vec<VariableSpec>,
}

impl GroupSpec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            variables: Vec::new(),
        }
    }

    pub fn variable(mut self, variable: VariableSpec) -> Self {
        self.variables.push(variable);
        self
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub kind: DatasetKind,
    pub groups: Vec<GroupSpec>,
}

impl DatasetSpec {
    pub fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            groups: Vec::new(),
        }
    }

    pub fn group(mut self, group: GroupSpec) -> Self {
        self.groups.push(group);
        self
    }
}

/// Builder producing collection index files
///
/// # Example
///
/// ```rust
/// use ncx_inspect::collection::{CollectionKind, DatasetKind};
/// use ncx_inspect::identifiers::Fingerprint;
/// use ncx_inspect::layout::{DatasetSpec, GroupSpec, IndexWriter, VariableSpec};
/// use ncx_inspect::structures::{Record, SparseArray};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::TempDir::new()?;
/// let records = SparseArray::dense(vec![Record::new(0, 0), Record::new(0, 4096)]);
/// IndexWriter::new(CollectionKind::Leaf, "gfs-2024-01")
///     .file("gfs.t00z.grib2")
///     .dataset(DatasetSpec::new(DatasetKind::TwoD).group(
///         GroupSpec::new("LatLon 361X720").variable(VariableSpec::new(
///             "Temperature_isobaric",
///             Fingerprint::new(7),
///             records,
///         )),
///     ))
///     .write(dir.path().join("gfs-2024-01.ncx"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IndexWriter {
    kind: CollectionKind,
    name: String,
    files: Vec<String>,
    partitions: Vec<Partition>,
    datasets: Vec<DatasetSpec>,
}

impl IndexWriter {
    pub fn new(kind: CollectionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            files: Vec::new(),
            partitions: Vec::new(),
            datasets: Vec::new(),
        }
    }

    /// Append a member file; its file number is its position in call order
    pub fn file(mut self, name: impl Into<String>) -> Self {
        self.files.push(name.into());
        self
    }

    /// Append a child partition
    pub fn partition(mut self, name: impl Into<String>, directory: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        self.partitions.push(Partition {
            name: name.into(),
            directory: directory.into(),
            filename: filename.into(),
        });
        self
    }

    pub fn dataset(mut self, dataset: DatasetSpec) -> Self {
        self.datasets.push(dataset);
        self
    }

    /// Write the index file, replacing any existing file at `path`
    pub fn write(self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Lay out record blobs first so the catalog can carry their locations
        let mut cursor = 0usize;
        let mut blobs: Vec<(usize, &SparseArray)> = Vec::new();
        let mut datasets = Vec::with_capacity(self.datasets.len());
        for dataset in &self.datasets {
            let mut groups = Vec::with_capacity(dataset.groups.len());
            for group in &dataset.groups {
                let mut variables = Vec::with_capacity(group.variables.len());
                for variable in &group.variables {
                    let sa = &variable.records;
                    let location = if sa.is_empty() && sa.total_size() == 0 {
                        SparseArrayLocation::default()
                    } else {
                        let len = sa.blob_layout().total_len;
                        blobs.push((cursor, sa));
                        let location = SparseArrayLocation {
                            offset: cursor as u64,
                            len: len as u64,
                        };
                        cursor += len;
                        location
                    };
                    variables.push(VariableIndex {
                        fingerprint: variable.fingerprint,
                        name: variable.name.clone(),
                        nrecords: sa.len() as u64,
                        ndups: sa.ndups() as u64,
                        nmissing: sa.nmissing() as u64,
                        records: location,
                    });
                }
                groups.push(Group {
                    description: group.description.clone(),
                    variables,
                });
            }
            datasets.push(Dataset {
                kind: dataset.kind,
                groups,
            });
        }

        let catalog = Catalog {
            name: self.name,
            kind: self.kind,
            files: FileTable::new(self.files),
            partitions: self.partitions,
            datasets,
        };
        let catalog_bytes = serde_json::to_vec(&catalog)?;

        let records_offset = align_up(IndexHeader::SIZE + catalog_bytes.len());
        let records_len = cursor;
        let total_len = records_offset + records_len;

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);

        let mut file = MemoryMappedFile::create(path, total_len)?;
        let header = IndexHeader::new(
            self.kind.code(),
            &catalog_bytes,
            records_offset as u64,
            records_len as u64,
            created_at,
        );
        file.write_at(0, &header)?;
        file.write_slice_at(IndexHeader::SIZE, catalog_bytes.as_slice())?;

        for (offset, sa) in blobs {
            write_blob(&mut file, records_offset + offset, sa)?;
        }

        file.sync()?;
        tracing::debug!(
            path = %path.display(),
            catalog_len = catalog_bytes.len(),
            records_len,
            "wrote collection index"
        );
        Ok(())
    }
}

fn write_blob(file: &mut MemoryMappedFile, start: usize, sa: &SparseArray) -> Result<()> {
    let layout = sa.blob_layout();
    file.write_slice_at(start + layout.shape_offset, sa.shape())?;
    file.write_slice_at(start + layout.track_offset, sa.track())?;
    file.write_slice_at(start + layout.records_offset, sa.records())?;

    // Padding is already zero in the freshly created file
    let body = file.bytes_at(start + SparseArrayHeader::SIZE, layout.total_len - SparseArrayHeader::SIZE)?;
    let checksum = crc32fast::hash(body);
    let header = SparseArrayHeader {
        magic: *magic::SPARSE_ARRAY,
        checksum,
        ndims: sa.shape().len() as u32,
        ntrack: sa.track().len() as u32,
        nrecords: sa.len() as u32,
        ndups: sa.ndups(),
    };
    file.write_at(start, &header)
}
