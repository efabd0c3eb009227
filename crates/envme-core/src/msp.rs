//! MSP type resolution
//!
//! The controller reports an MSP type. Adding one to it gives the loader
//! ID, which indexes a five-entry table holding the BFH loader image path
//! and the firmware directory name for that controller variant.
//!
//! Loader ID 3 marks a variant that boots without a host-supplied loader,
//! so the BFH sequence skips the transfer for it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Number of entries in the loader table
pub const LOADER_TABLE_LEN: usize = 5;

/// Loader ID of the variant that needs no loader transfer
pub const NO_TRANSFER_LOADER_ID: u32 = 3;

/// Maximum length of a firmware directory name in bytes
pub const FIRMWARE_DIR_LEN: usize = 8;

/// Descriptor value the controller uses for "no descriptor"
pub const INVALID_NAND_DESCRIPTOR: u64 = 0xFF_FFFF;

/// File name used when the descriptor is invalid
pub const INVALID_FIRMWARE_FILE: &str = "Invalid-FW-File.pak";

/// Firmware directory name (at most 8 bytes)
pub type FirmwareDir = heapless::String<FIRMWARE_DIR_LEN>;

/// MSP type reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MspType(pub u32);

impl MspType {
    /// Loader ID for this MSP type (wrapping `+ 1`)
    pub fn loader_id(self) -> u32 {
        self.0.wrapping_add(1)
    }

    /// Validate the MSP type against the table bounds
    pub fn validate(self) -> Result<LoaderId> {
        LoaderId::new(self.loader_id()).ok_or(Error::UnknownMspType(self.0))
    }
}

impl fmt::Display for MspType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Bounds-checked index into the loader table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(u8);

impl LoaderId {
    /// Create a loader ID, returning `None` when out of range
    pub fn new(id: u32) -> Option<Self> {
        if (id as usize) < LOADER_TABLE_LEN {
            Some(Self(id as u8))
        } else {
            None
        }
    }

    /// Raw index
    pub fn get(self) -> u32 {
        self.0 as u32
    }

    /// Whether this variant skips the loader transfer
    pub fn skips_transfer(self) -> bool {
        self.get() == NO_TRANSFER_LOADER_ID
    }
}

/// One loader table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderEntry {
    /// Firmware directory name
    pub dir: FirmwareDir,
    /// BFH loader image path
    pub loader: PathBuf,
}

impl LoaderEntry {
    /// Create an entry, truncating `dir` to [`FIRMWARE_DIR_LEN`] bytes
    pub fn new(dir: &str, loader: impl Into<PathBuf>) -> Self {
        Self {
            dir: truncate_dir(dir),
            loader: loader.into(),
        }
    }
}

/// Copy at most 8 bytes of `dir`, never splitting a character
fn truncate_dir(dir: &str) -> FirmwareDir {
    let mut out = FirmwareDir::new();
    for c in dir.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

const BUILTIN_LOADERS: [(&str, &str); LOADER_TABLE_LEN] = [
    ("generic", "/usr/standalone/firmware/nvme/generic/bfh_loader.bin"),
    ("s3e", "/usr/standalone/firmware/nvme/s3e/bfh_loader.bin"),
    ("s4e", "/usr/standalone/firmware/nvme/s4e/bfh_loader.bin"),
    ("s5e", "/usr/standalone/firmware/nvme/s5e/bfh_loader.bin"),
    ("s6e", "/usr/standalone/firmware/nvme/s6e/bfh_loader.bin"),
];

/// Immutable loader table indexed by [`LoaderId`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderTable {
    entries: [LoaderEntry; LOADER_TABLE_LEN],
}

impl Default for LoaderTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LoaderTable {
    /// Table with the built-in loader locations
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_LOADERS.map(|(dir, loader)| LoaderEntry::new(dir, loader)),
        }
    }

    /// Table from explicit entries
    pub fn from_entries(entries: [LoaderEntry; LOADER_TABLE_LEN]) -> Self {
        Self { entries }
    }

    /// Take the entries
    pub fn into_entries(self) -> [LoaderEntry; LOADER_TABLE_LEN] {
        self.entries
    }

    /// Entry for a loader ID
    pub fn entry(&self, id: LoaderId) -> &LoaderEntry {
        &self.entries[id.0 as usize]
    }

    /// Loader image path for a loader ID
    pub fn resolve(&self, id: LoaderId) -> &Path {
        &self.entry(id).loader
    }

    /// Iterate over all entries with their IDs
    pub fn iter(&self) -> impl Iterator<Item = (LoaderId, &LoaderEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (LoaderId(i as u8), e))
    }
}

/// 64-bit NAND descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NandDescriptor(pub u64);

impl NandDescriptor {
    /// Whether this is the controller's "no descriptor" value
    pub fn is_invalid(self) -> bool {
        self.0 == INVALID_NAND_DESCRIPTOR
    }

    /// Firmware image path for this descriptor, e.g. `s4e/1122334455667788.pak`
    pub fn firmware_path(self, table: &LoaderTable, msp: MspType) -> Result<String> {
        if self.is_invalid() {
            return Ok(INVALID_FIRMWARE_FILE.to_string());
        }
        let id = msp.validate()?;
        Ok(format!("{}/{}.pak", table.entry(id).dir, self))
    }
}

impl fmt::Display for NandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}
