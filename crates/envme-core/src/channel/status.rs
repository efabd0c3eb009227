//! Channel status codes
//!
//! The service connection reports success as a zero return code and failure
//! as an opaque nonzero platform code. [`ChannelStatus`] only ever holds the
//! nonzero case, so a `ChannelResult<T>` is either the value or the code.

use core::fmt;
use core::num::NonZeroU32;

/// Opaque nonzero status code returned by a controller operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelStatus(NonZeroU32);

/// Result of a controller operation
pub type ChannelResult<T> = core::result::Result<T, ChannelStatus>;

const fn status(code: u32) -> ChannelStatus {
    match NonZeroU32::new(code) {
        Some(code) => ChannelStatus(code),
        None => panic!("status code must be nonzero"),
    }
}

impl ChannelStatus {
    /// General failure (kIOReturnError)
    pub const ERROR: Self = status(0xE000_02BC);
    /// Invalid argument (kIOReturnBadArgument)
    pub const BAD_ARGUMENT: Self = status(0xE000_02C2);
    /// Operation not supported by this backend (kIOReturnUnsupported)
    pub const UNSUPPORTED: Self = status(0xE000_02C7);
    /// Device not ready (kIOReturnNotReady)
    pub const NOT_READY: Self = status(0xE000_02D8);
    /// Connection is closed (kIOReturnNotOpen)
    pub const NOT_OPEN: Self = status(0xE000_02CD);

    /// Wrap a raw code, returning `None` for zero (success)
    pub const fn new(code: u32) -> Option<Self> {
        match NonZeroU32::new(code) {
            Some(code) => Some(Self(code)),
            None => None,
        }
    }

    /// Raw status code
    pub const fn code(self) -> u32 {
        self.0.get()
    }

    /// Convert a raw return code into a result
    pub fn check(code: u32) -> ChannelResult<()> {
        match Self::new(code) {
            None => Ok(()),
            Some(status) => Err(status),
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_success() {
        assert_eq!(ChannelStatus::new(0), None);
        assert_eq!(ChannelStatus::check(0), Ok(()));
    }

    #[test]
    fn test_nonzero_is_failure() {
        let err = ChannelStatus::check(0xE00002C7).unwrap_err();
        assert_eq!(err, ChannelStatus::UNSUPPORTED);
        assert_eq!(err.to_string(), "0xe00002c7");
    }
}
