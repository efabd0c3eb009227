//! Error types for envme-core
//!
//! Every failure the tool can hit ends up in [`Error`]. Nothing in this crate
//! terminates the process; errors travel up with `?` and the CLI decides the
//! exit code.

use core::fmt;
use thiserror::Error;

use crate::blob::BlobError;
use crate::channel::{ChannelResult, ChannelStatus};
use crate::config::ConfigError;

/// Controller operation that produced a channel status
///
/// The display names match the vendor library entry points so diagnostics
/// can be correlated with controller-side logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOp {
    /// Query the MSP type
    GetMspType,
    /// Query whether the controller is in BFH mode
    IsBfhMode,
    /// Hand a loader image to the controller
    PerformBfh,
    /// Read the NAND descriptor
    GetNandDescriptor,
    /// Read the identify-controller page
    IdentifyController,
    /// Query the clog mismatch flag
    GetClogMismatch,
    /// Send a raw NVMe command
    SendNvmeCommand,
    /// Drive the BFH GPIO
    SetBfhMode,
    /// Change NVMe power state
    SetNvmeState,
    /// Change PCI port state
    SetPciPortState,
    /// Validate a firmware image
    FirmwareValidate,
    /// Check a firmware image version against the controller
    FirmwareVersionCheck,
    /// Download a firmware image
    FirmwareDownload,
    /// Close the service connection
    Close,
}

impl fmt::Display for ChannelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetMspType => "GetMSPType",
            Self::IsBfhMode => "IsBFHMode",
            Self::PerformBfh => "PerformBFH",
            Self::GetNandDescriptor => "GetNANDDescriptor",
            Self::IdentifyController => "IdentifyController",
            Self::GetClogMismatch => "GetClogMismatch",
            Self::SendNvmeCommand => "SendNVMeCommand",
            Self::SetBfhMode => "SetBFHMode",
            Self::SetNvmeState => "SetNVMeState",
            Self::SetPciPortState => "SetPCIPortState",
            Self::FirmwareValidate => "FirmwareValidate",
            Self::FirmwareVersionCheck => "FirmwareVersionCheck",
            Self::FirmwareDownload => "FirmwareDownload",
            Self::Close => "Close",
        };
        f.write_str(name)
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    // Hardware errors
    /// The controller reported an MSP type outside the loader table
    #[error("Unknown MSP type: 0x{0:x}")]
    UnknownMspType(u32),

    // Channel errors
    /// A controller operation returned a nonzero status
    #[error("{op} failed. status={status}")]
    Channel {
        /// Operation that failed
        op: ChannelOp,
        /// Raw status returned by the channel
        status: ChannelStatus,
    },

    // BFH sequence errors
    /// The initial BFH status query failed
    #[error("Failed getting BFH status. status={0}")]
    BfhStatusUnavailable(ChannelStatus),
    /// The controller is not in BFH mode but the sequence requires it
    #[error("Not in BFH mode")]
    NotInBfhMode,
    /// The controller is already in BFH mode but the sequence requires it not to be
    #[error("Already in BFH mode")]
    AlreadyInBfhMode,
    /// The post-handoff status check did not allow the descriptor fetch
    #[error("Failed getting BFH status after handoff ({})", describe_recheck(.0))]
    BfhExitUnconfirmed(ChannelResult<bool>),

    // Data errors
    /// The identify page could not be decoded
    #[error("Identify data is malformed")]
    MalformedIdentify,

    // I/O and configuration
    /// Loader or firmware image could not be loaded
    #[error(transparent)]
    Blob(#[from] BlobError),
    /// Configuration file is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Build a channel error for `op`
    pub fn channel(op: ChannelOp, status: ChannelStatus) -> Self {
        Self::Channel { op, status }
    }
}

fn describe_recheck(recheck: &ChannelResult<bool>) -> String {
    match recheck {
        Ok(true) => "query succeeded, controller still in BFH mode".to_string(),
        Ok(false) => "query succeeded, controller left BFH mode".to_string(),
        Err(status) => format!("query failed with status={}", status),
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Extension for mapping raw channel results into [`Error`]
pub trait ChannelResultExt<T> {
    /// Tag a channel failure with the operation that produced it
    fn op(self, op: ChannelOp) -> Result<T>;
}

impl<T> ChannelResultExt<T> for ChannelResult<T> {
    fn op(self, op: ChannelOp) -> Result<T> {
        self.map_err(|status| Error::channel(op, status))
    }
}
