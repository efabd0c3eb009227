//! Identify-controller page decoding
//!
//! The identify action returns a 4 KiB page laid out like the NVMe
//! Identify Controller data structure. Only the leading identification
//! fields are decoded; the rest of the page is kept raw.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, LE, U16, U32};

use crate::error::{Error, Result};

/// Size of the identify-controller page in bytes
pub const IDENTIFY_PAGE_SIZE: usize = 0x1000;

const IDENTIFY_HEADER_SIZE: usize = 84;

/// Identify-controller page
#[repr(C)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes, Clone)]
pub struct IdentifyController {
    /// PCI vendor ID
    pub vid: U16<LE>,
    /// PCI subsystem vendor ID
    pub ssvid: U16<LE>,
    /// Serial number (ASCII, space padded)
    pub sn: [u8; 20],
    /// Model number (ASCII, space padded)
    pub mn: [u8; 40],
    /// Firmware revision (ASCII, space padded)
    pub fr: [u8; 8],
    /// Recommended arbitration burst
    pub rab: u8,
    /// IEEE OUI identifier
    pub ieee: [u8; 3],
    /// Controller multi-path I/O capabilities
    pub cmic: u8,
    /// Maximum data transfer size (power of two, in minimum page units)
    pub mdts: u8,
    /// Controller ID
    pub cntlid: U16<LE>,
    /// Version
    pub ver: U32<LE>,
    /// Remainder of the page, undecoded
    pub rest: [u8; IDENTIFY_PAGE_SIZE - IDENTIFY_HEADER_SIZE],
}

impl IdentifyController {
    /// Decode a raw identify page
    pub fn parse(page: &[u8; IDENTIFY_PAGE_SIZE]) -> Result<Self> {
        Self::read_from_bytes(&page[..]).map_err(|_| Error::MalformedIdentify)
    }

    /// Serial number with padding stripped
    pub fn serial(&self) -> String {
        ascii_field(&self.sn)
    }

    /// Model number with padding stripped
    pub fn model(&self) -> String {
        ascii_field(&self.mn)
    }

    /// Firmware revision with padding stripped
    pub fn firmware_revision(&self) -> String {
        ascii_field(&self.fr)
    }

    /// NVMe version as (major, minor, tertiary)
    pub fn version(&self) -> (u16, u8, u8) {
        let ver = self.ver.get();
        ((ver >> 16) as u16, (ver >> 8) as u8, ver as u8)
    }
}

fn ascii_field(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect::<String>()
        .trim_end()
        .to_string()
}
