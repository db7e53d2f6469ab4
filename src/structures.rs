//! Core data structures for record indices
//!
//! This module provides the record-level structures stored in collection
//! index files:
//! - Record: where one message lives (file number + byte offset)
//! - SparseArray: the per-variable multidimensional record array
//! - SparseArrayHeader / SparseArrayLocation: on-disk framing of a sparse array
//!
//! Fixed-size structures are designed for memory mapping using bytemuck traits.

use crate::constants::SECTION_ALIGNMENT;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Location of one message inside a member data file
///
/// `fileno` indexes the owning index's file table rather than storing a
/// path, which keeps the record arrays compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct Record {
    /// Index into the owning collection's file table
    pub fileno: u32,
    /// If non-zero, offset of the bitmap section relative to `pos`
    pub bms_offset: u32,
    /// Byte offset of the message within its file
    pub pos: u64,
}

// SAFETY: Record contains only Pod types, has repr(C) layout and no implicit padding
unsafe impl Pod for Record {}
// SAFETY: Record can be safely zero-initialized
unsafe impl Zeroable for Record {}

impl Record {
    /// Create a record without a bitmap offset
    pub fn new(fileno: u32, pos: u64) -> Self {
        Self {
            fileno,
            bms_offset: 0,
            pos,
        }
    }

    /// Key identifying the physical message this record points at
    pub fn message_key(&self) -> (u32, u64) {
        (self.fileno, self.pos)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:8})", self.fileno, self.pos)
    }
}

/// Framing header written before every sparse array blob
///
/// # Layout
/// ```text
/// Offset  | Size | Field     | Description
/// --------|------|-----------|-------------------------------------------
/// 0       | 4    | magic     | "SPAR"
/// 4       | 4    | checksum  | CRC32 of the blob body following the header
/// 8       | 4    | ndims     | Number of entries in `shape`
/// 12      | 4    | ntrack    | Number of entries in `track`
/// 16      | 4    | nrecords  | Number of records
/// 20      | 4    | ndups     | Duplicates found when the index was built
/// Total   | 24   |           |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SparseArrayHeader {
    pub magic: [u8; 4],
    pub checksum: u32,
    pub ndims: u32,
    pub ntrack: u32,
    pub nrecords: u32,
    pub ndups: u32,
}

// SAFETY: SparseArrayHeader contains only Pod types and has repr(C) layout
unsafe impl Pod for SparseArrayHeader {}
// SAFETY: SparseArrayHeader can be safely zero-initialized
unsafe impl Zeroable for SparseArrayHeader {}

impl SparseArrayHeader {
    /// Size of the SparseArrayHeader structure in bytes
    pub const SIZE: usize = std::mem::size_of::<SparseArrayHeader>();
}

/// Where a variable's sparse array blob lives inside its index file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseArrayLocation {
    /// Byte offset of the blob from the start of the record section
    pub offset: u64,
    /// Length of the blob in bytes; zero means the variable has no records
    pub len: u64,
}

impl SparseArrayLocation {
    /// Whether this location points at no blob at all
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Byte offsets of each section inside a sparse array blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobLayout {
    pub shape_offset: usize,
    pub track_offset: usize,
    pub records_offset: usize,
    pub total_len: usize,
}

impl BlobLayout {
    /// Compute the blob layout for the given element counts
    ///
    /// Records start on an 8 byte boundary and the total length is padded to
    /// one, so consecutive blobs stay aligned.
    pub fn for_counts(ndims: usize, ntrack: usize, nrecords: usize) -> Self {
        let shape_offset = SparseArrayHeader::SIZE;
        let track_offset = shape_offset + ndims * std::mem::size_of::<u32>();
        let records_offset = align_up(track_offset + ntrack * std::mem::size_of::<u32>());
        let total_len = align_up(records_offset + nrecords * std::mem::size_of::<Record>());
        Self {
            shape_offset,
            track_offset,
            records_offset,
            total_len,
        }
    }
}

/// Round `value` up to the index section alignment
pub fn align_up(value: usize) -> usize {
    (value + SECTION_ALIGNMENT - 1) & !(SECTION_ALIGNMENT - 1)
}

/// Multidimensional array of records, most cells pointing at a record
///
/// `track` has one entry per cell of `shape` (row-major); each entry is a
/// 1-based index into `records`, with 0 meaning the cell is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseArray {
    shape: Vec<u32>,
    track: Vec<u32>,
    records: Vec<Record>,
    ndups: u32,
}

impl SparseArray {
    /// Create a sparse array, validating track entries against the records
    ///
    /// Returns a description of the inconsistency on failure; callers attach
    /// the index path when turning it into an error.
    pub fn new(shape: Vec<u32>, track: Vec<u32>, records: Vec<Record>, ndups: u32) -> Result<Self, String> {
        let total = shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))
            .ok_or_else(|| format!("shape {:?} overflows the cell count", shape))?;
        if total != track.len() as u64 {
            return Err(format!(
                "track has {} entries but shape {:?} describes {} cells",
                track.len(),
                shape,
                total
            ));
        }
        if let Some((cell, &bad)) = track
            .iter()
            .enumerate()
            .find(|(_, &t)| t as usize > records.len())
        {
            return Err(format!(
                "track entry {} at cell {} exceeds record count {}",
                bad,
                cell,
                records.len()
            ));
        }
        Ok(Self {
            shape,
            track,
            records,
            ndups,
        })
    }

    /// Create a one-dimensional array with every cell present
    pub fn dense(records: Vec<Record>) -> Self {
        let n = records.len() as u32;
        Self {
            shape: vec![n],
            track: (1..=n).collect(),
            records,
            ndups: 0,
        }
    }

    /// Set the build-time duplicate count
    pub fn with_ndups(mut self, ndups: u32) -> Self {
        self.ndups = ndups;
        self
    }

    pub fn shape(&self) -> &[u32] {
        &self.shape
    }

    pub fn track(&self) -> &[u32] {
        &self.track
    }

    /// The stored records, in index order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of cells described by the shape
    pub fn total_size(&self) -> usize {
        self.track.len()
    }

    /// Number of cells without a record
    pub fn nmissing(&self) -> usize {
        self.track.iter().filter(|&&t| t == 0).count()
    }

    pub fn ndups(&self) -> u32 {
        self.ndups
    }

    /// Row-major coordinates of a cell, one entry per dimension
    pub fn cell_coordinates(&self, cell: usize) -> Vec<u32> {
        let mut remaining = cell as u64;
        let mut coords = vec![0u32; self.shape.len()];
        for (slot, &dim) in coords.iter_mut().zip(&self.shape).rev() {
            let dim = u64::from(dim.max(1));
            *slot = (remaining % dim) as u32;
            remaining /= dim;
        }
        coords
    }

    /// Record stored at the given cell, if present
    pub fn record_at(&self, cell: usize) -> Option<&Record> {
        match self.track.get(cell) {
            Some(&t) if t > 0 => self.records.get(t as usize - 1),
            _ => None,
        }
    }

    /// Layout of this array when framed as an on-disk blob
    pub fn blob_layout(&self) -> BlobLayout {
        BlobLayout::for_counts(self.shape.len(), self.track.len(), self.records.len())
    }
}
