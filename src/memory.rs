//! Memory-mapped index files
//!
//! This module provides safe abstractions over memory-mapped index files using
//! memmap2, with bounds and alignment checked typed access, plus the fixed
//! header that starts every collection index file.
//!
//! # Key Components
//!
//! - [`MemoryMappedFile`]: wrapper around memmap2 with bounds-checked Pod access
//! - [`IndexHeader`]: the 80 byte header at offset 0 of every index file
//!
//! # Usage Examples
//!
//! ```rust
//! use ncx_inspect::memory::{IndexHeader, MemoryMappedFile};
//! use tempfile::TempDir;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let temp_dir = TempDir::new()?;
//! let file_path = temp_dir.path().join("test.ncx");
//!
//! let mut mmf = MemoryMappedFile::create(&file_path, 1024)?;
//! let catalog = b"{}";
//! let header = IndexHeader::new(0, catalog, IndexHeader::SIZE as u64, 0, 0);
//! mmf.write_at(0, &header)?;
//! mmf.sync()?;
//!
//! let mmf = MemoryMappedFile::open_read_only(&file_path)?;
//! let header: IndexHeader = mmf.read_at(0)?;
//! header.validate_magic(&file_path)?;
//! # Ok(())
//! # }
//! ```

use crate::constants::{magic, version};
use crate::error::InspectError;
use bytemuck::{Pod, Zeroable};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Memory-mapped file wrapper providing safe abstractions over memmap2
///
/// Out-of-bounds reads are reported as [`InspectError::CorruptIndex`] for the
/// mapped path: inside an index file they always mean a truncated or
/// inconsistent file.
#[derive(Debug)]
pub struct MemoryMappedFile {
    mmap: MmapVariant,
    path: PathBuf,
    len: usize,
}

#[derive(Debug)]
enum MmapVariant {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

/// Header at offset 0 of every collection index file
///
/// # Layout
/// ```text
/// Offset  | Size | Field            | Description
/// --------|------|------------------|-------------------------------------
/// 0       | 4    | magic            | "NCXI"
/// 4       | 4    | version          | Format version number
/// 8       | 4    | header_size      | Size of this header in bytes
/// 12      | 4    | kind             | Collection kind code
/// 16      | 8    | catalog_offset   | Offset of the JSON catalog
/// 24      | 8    | catalog_len      | Length of the JSON catalog
/// 32      | 8    | records_offset   | Offset of the sparse array section
/// 40      | 8    | records_len      | Length of the sparse array section
/// 48      | 4    | catalog_checksum | CRC32 of the catalog bytes
/// 52      | 4    | padding          | Zero
/// 56      | 8    | created_at       | Unix epoch microseconds
/// 64      | 16   | reserved         | Zero
/// Total   | 80   |                  |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct IndexHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub header_size: u32,
    pub kind: u32,
    pub catalog_offset: u64,
    pub catalog_len: u64,
    pub records_offset: u64,
    pub records_len: u64,
    pub catalog_checksum: u32,
    pub padding: u32,
    pub created_at: u64,
    pub reserved: [u8; 16],
}

// SAFETY: IndexHeader contains only Pod types, has repr(C) layout and no implicit padding
unsafe impl Pod for IndexHeader {}
// SAFETY: IndexHeader can be safely zero-initialized
unsafe impl Zeroable for IndexHeader {}

impl MemoryMappedFile {
    /// Create a new zero-filled memory-mapped file with the specified size
    ///
    /// Creates parent directories if they don't exist. The file is opened in
    /// read-write mode and truncated.
    pub fn create<P: AsRef<Path>>(path: P, size: usize) -> Result<Self, InspectError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| InspectError::Io(e).with_file_context(path, "create parent directories"))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| InspectError::Io(e).with_file_context(path, "create file"))?;

        file.set_len(size as u64)
            .map_err(|e| InspectError::Io(e).with_file_context(path, "set file size"))?;

        let mmap = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|e| InspectError::Io(e).with_file_context(path, "create read-write mapping"))?
        };

        Ok(Self {
            mmap: MmapVariant::ReadWrite(mmap),
            path: path.to_path_buf(),
            len: size,
        })
    }

    /// Open an existing file in read-only mode
    ///
    /// Maps the entire file contents into memory for reading.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, InspectError> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| InspectError::Io(e).with_file_context(path, "open file"))?;

        let len = file
            .metadata()
            .map_err(|e| InspectError::Io(e).with_file_context(path, "read file metadata"))?
            .len() as usize;

        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|e| InspectError::Io(e).with_file_context(path, "create read-only mapping"))?
        };

        Ok(Self {
            mmap: MmapVariant::ReadOnly(mmap),
            path: path.to_path_buf(),
            len,
        })
    }

    /// Path of the mapped file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the length of the mapped file
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the mapped file is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get a reference to the mapped memory as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            MmapVariant::ReadOnly(mmap) => mmap.as_ref(),
            MmapVariant::ReadWrite(mmap) => mmap.as_ref(),
        }
    }

    fn as_mut_slice(&mut self) -> Result<&mut [u8], InspectError> {
        match &mut self.mmap {
            MmapVariant::ReadOnly(_) => Err(InspectError::invalid_input(
                "mapping",
                "cannot write through a read-only mapping",
                "Open the file with MemoryMappedFile::create to write it",
            )),
            MmapVariant::ReadWrite(mmap) => Ok(mmap.as_mut()),
        }
    }

    fn check_range(&self, offset: usize, size: usize, what: &str) -> Result<(), InspectError> {
        let end = offset.checked_add(size);
        match end {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(InspectError::corrupt_index(
                &self.path,
                format!(
                    "{} at offset {} with size {} exceeds file length {}",
                    what, offset, size, self.len
                ),
            )),
        }
    }

    fn check_alignment<T>(&self, offset: usize) -> Result<(), InspectError> {
        if offset % std::mem::align_of::<T>() != 0 {
            return Err(InspectError::corrupt_index(
                &self.path,
                format!(
                    "offset {} is not properly aligned for type {} (requires {} byte alignment)",
                    offset,
                    std::any::type_name::<T>(),
                    std::mem::align_of::<T>()
                ),
            ));
        }
        Ok(())
    }

    /// Borrow `len` raw bytes starting at `offset`
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&[u8], InspectError> {
        self.check_range(offset, len, "Byte range")?;
        Ok(&self.as_slice()[offset..offset + len])
    }

    /// Read a Pod type from the specified offset
    pub fn read_at<T: Pod>(&self, offset: usize) -> Result<T, InspectError> {
        let size = std::mem::size_of::<T>();
        self.check_range(offset, size, "Read")?;
        self.check_alignment::<T>(offset)?;

        let bytes = &self.as_slice()[offset..offset + size];
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Read multiple Pod values from the specified offset
    ///
    /// Returns a slice view into the mapped memory without copying data.
    pub fn read_slice_at<T: Pod>(&self, offset: usize, count: usize) -> Result<&[T], InspectError> {
        let size = std::mem::size_of::<T>()
            .checked_mul(count)
            .ok_or_else(|| InspectError::corrupt_index(&self.path, format!("slice of {} elements overflows", count)))?;
        self.check_range(offset, size, "Read slice")?;
        self.check_alignment::<T>(offset)?;

        let bytes = &self.as_slice()[offset..offset + size];
        Ok(bytemuck::cast_slice(bytes))
    }

    /// Write a Pod type to the specified offset
    pub fn write_at<T: Pod>(&mut self, offset: usize, value: &T) -> Result<(), InspectError> {
        let size = std::mem::size_of::<T>();
        self.check_range(offset, size, "Write")?;
        self.check_alignment::<T>(offset)?;

        let bytes = bytemuck::bytes_of(value);
        self.as_mut_slice()?[offset..offset + size].copy_from_slice(bytes);
        Ok(())
    }

    /// Write multiple Pod values to the specified offset
    pub fn write_slice_at<T: Pod>(&mut self, offset: usize, values: &[T]) -> Result<(), InspectError> {
        let size = std::mem::size_of_val(values);
        self.check_range(offset, size, "Write slice")?;
        self.check_alignment::<T>(offset)?;

        let bytes: &[u8] = bytemuck::cast_slice(values);
        self.as_mut_slice()?[offset..offset + size].copy_from_slice(bytes);
        Ok(())
    }

    /// Synchronize mapped memory with the underlying file
    pub fn sync(&self) -> Result<(), InspectError> {
        match &self.mmap {
            MmapVariant::ReadOnly(_) => Ok(()),
            MmapVariant::ReadWrite(mmap) => mmap
                .flush()
                .map_err(|e| InspectError::Io(e).with_file_context(&self.path, "sync mapping")),
        }
    }

    /// Check if the mapping is read-only
    pub fn is_read_only(&self) -> bool {
        matches!(self.mmap, MmapVariant::ReadOnly(_))
    }
}

impl IndexHeader {
    /// Size of the IndexHeader structure in bytes
    pub const SIZE: usize = std::mem::size_of::<IndexHeader>();

    /// Create a header for the current format version
    ///
    /// The catalog checksum is computed from `catalog`; the catalog is assumed
    /// to start right after the header.
    pub fn new(kind: u32, catalog: &[u8], records_offset: u64, records_len: u64, created_at: u64) -> Self {
        Self {
            magic: *magic::COLLECTION_INDEX,
            version: version::CURRENT,
            header_size: Self::SIZE as u32,
            kind,
            catalog_offset: Self::SIZE as u64,
            catalog_len: catalog.len() as u64,
            records_offset,
            records_len,
            catalog_checksum: crc32fast::hash(catalog),
            padding: 0,
            created_at,
            reserved: [0; 16],
        }
    }

    /// Validate that the magic bytes identify a collection index
    pub fn validate_magic(&self, path: &Path) -> Result<(), InspectError> {
        if &self.magic != magic::COLLECTION_INDEX {
            return Err(InspectError::not_an_index(
                path,
                format!(
                    "magic bytes mismatch: expected {:?}, found {:?}",
                    magic::COLLECTION_INDEX,
                    self.magic
                ),
            ));
        }
        Ok(())
    }

    /// Validate version compatibility
    pub fn validate_version(&self, path: &Path) -> Result<(), InspectError> {
        if self.version < version::MIN_SUPPORTED || self.version > version::CURRENT {
            return Err(InspectError::not_an_index(
                path,
                format!(
                    "unsupported version {} (supported: {}..={})",
                    self.version,
                    version::MIN_SUPPORTED,
                    version::CURRENT
                ),
            ));
        }
        Ok(())
    }

    /// Validate header structure against the actual file length
    ///
    /// Only the catalog region is checked here; the sparse array section is
    /// validated lazily when records are read.
    pub fn validate_structure(&self, path: &Path, file_len: usize) -> Result<(), InspectError> {
        if self.header_size != Self::SIZE as u32 {
            return Err(InspectError::not_an_index(
                path,
                format!("invalid header size: expected {}, found {}", Self::SIZE, self.header_size),
            ));
        }

        if self.catalog_offset < Self::SIZE as u64 {
            return Err(InspectError::corrupt_index(
                path,
                format!(
                    "catalog offset {} overlaps the {} byte header",
                    self.catalog_offset,
                    Self::SIZE
                ),
            ));
        }

        let catalog_end = self.catalog_offset.checked_add(self.catalog_len);
        if catalog_end.map_or(true, |end| end > file_len as u64) {
            return Err(InspectError::corrupt_index(
                path,
                format!(
                    "catalog at offset {} with length {} exceeds file length {}",
                    self.catalog_offset, self.catalog_len, file_len
                ),
            ));
        }

        if self.reserved != [0; 16] || self.padding != 0 {
            return Err(InspectError::corrupt_index(path, "reserved header bytes are not zero"));
        }

        Ok(())
    }

    /// Validate the catalog checksum
    pub fn validate_checksum(&self, path: &Path, catalog: &[u8]) -> Result<(), InspectError> {
        let actual = crc32fast::hash(catalog);
        if actual != self.catalog_checksum {
            return Err(InspectError::corrupt_index(
                path,
                format!(
                    "catalog checksum mismatch: expected {:#010x}, found {:#010x}",
                    self.catalog_checksum, actual
                ),
            ));
        }
        Ok(())
    }
}
