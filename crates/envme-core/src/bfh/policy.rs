//! BFH sequence settings
//!
//! Two checks in the sequence have a polarity that cannot be confirmed
//! against the controller documentation, so each is a named setting instead
//! of a hard-coded branch. The defaults reproduce the behaviour of the
//! vendor recovery tool.

use core::fmt;
use core::str::FromStr;

use serde::Deserialize;

use crate::blob::DEFAULT_MAX_STREAM_SIZE;
use crate::channel::ChannelResult;
use crate::error::{Error, Result};

/// How the initial BFH status is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryPolarity {
    /// Continue only if the controller reports BFH mode
    #[default]
    RequireBfhMode,
    /// Continue only if the controller reports normal mode
    RequireNormalMode,
}

impl EntryPolarity {
    /// Check the reported BFH state
    pub fn check(self, bfh_mode: bool) -> Result<()> {
        match (self, bfh_mode) {
            (Self::RequireBfhMode, true) | (Self::RequireNormalMode, false) => Ok(()),
            (Self::RequireBfhMode, false) => Err(Error::NotInBfhMode),
            (Self::RequireNormalMode, true) => Err(Error::AlreadyInBfhMode),
        }
    }
}

/// Which post-handoff status result allows the descriptor fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecheckPolicy {
    /// Fetch when the status query itself fails
    #[default]
    ProceedOnCallFailure,
    /// Fetch when the status query succeeds, whatever it reports
    ProceedOnCallSuccess,
    /// Fetch when the query succeeds and reports that BFH mode was left
    ProceedOnModeExit,
}

impl RecheckPolicy {
    /// Whether the recheck result allows the descriptor fetch
    pub fn allows_fetch(self, recheck: &ChannelResult<bool>) -> bool {
        match self {
            Self::ProceedOnCallFailure => recheck.is_err(),
            Self::ProceedOnCallSuccess => recheck.is_ok(),
            Self::ProceedOnModeExit => matches!(recheck, Ok(false)),
        }
    }
}

impl FromStr for EntryPolarity {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            "require-bfh-mode" => Ok(Self::RequireBfhMode),
            "require-normal-mode" => Ok(Self::RequireNormalMode),
            _ => Err(format!(
                "Invalid entry polarity '{}' (expected require-bfh-mode or require-normal-mode)",
                s
            )),
        }
    }
}

impl FromStr for RecheckPolicy {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            "proceed-on-call-failure" => Ok(Self::ProceedOnCallFailure),
            "proceed-on-call-success" => Ok(Self::ProceedOnCallSuccess),
            "proceed-on-mode-exit" => Ok(Self::ProceedOnModeExit),
            _ => Err(format!(
                "Invalid recheck policy '{}' (expected proceed-on-call-failure, \
                 proceed-on-call-success or proceed-on-mode-exit)",
                s
            )),
        }
    }
}

impl fmt::Display for EntryPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RequireBfhMode => "require-bfh-mode",
            Self::RequireNormalMode => "require-normal-mode",
        })
    }
}

impl fmt::Display for RecheckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ProceedOnCallFailure => "proceed-on-call-failure",
            Self::ProceedOnCallSuccess => "proceed-on-call-success",
            Self::ProceedOnModeExit => "proceed-on-mode-exit",
        })
    }
}

/// Settings for one BFH run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfhConfig {
    /// Initial status check
    pub entry: EntryPolarity,
    /// Post-handoff status check
    pub recheck: RecheckPolicy,
    /// Upper bound for stream-supplied loader images
    pub max_stream_size: u64,
}

impl Default for BfhConfig {
    fn default() -> Self {
        Self {
            entry: EntryPolarity::default(),
            recheck: RecheckPolicy::default(),
            max_stream_size: DEFAULT_MAX_STREAM_SIZE,
        }
    }
}
