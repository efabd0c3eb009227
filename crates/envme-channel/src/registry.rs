//! Channel registry and initialization
//!
//! This module opens channel backends by name and wraps them in a
//! [`ChannelHandle`]. Backends are compiled in through cargo features.

use std::collections::HashMap;

use thiserror::Error;

use crate::handle::ChannelHandle;

/// Errors from parsing a channel string or opening a backend
#[derive(Debug, Error)]
pub enum ChannelOpenError {
    /// A parameter is not `key=value`
    #[error("Invalid parameter format: '{0}' (expected key=value)")]
    Format(String),
    /// No backend with this name is compiled in
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    /// The backend does not take this parameter
    #[error("Unknown parameter '{key}' for channel {channel}")]
    UnknownParam {
        /// Channel name
        channel: String,
        /// Offending key
        key: String,
    },
    /// The parameter value could not be parsed
    #[error("Invalid value '{value}' for parameter '{key}'")]
    InvalidValue {
        /// Parameter key
        key: String,
        /// Offending value
        value: String,
    },
}

/// Parsed channel parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelParams {
    /// Channel name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl ChannelParams {
    /// Reject any key not in `known`
    #[allow(dead_code)] // Used by feature-gated backends
    fn check_keys(&self, known: &[&str]) -> Result<(), ChannelOpenError> {
        match self.params.keys().find(|k| !known.contains(&k.as_str())) {
            Some(key) => Err(ChannelOpenError::UnknownParam {
                channel: self.name.clone(),
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Parse an optional parameter with `parse`
    #[allow(dead_code)] // Used by feature-gated backends
    fn get<T>(
        &self,
        key: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ChannelOpenError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => parse(value).map(Some).ok_or_else(|| ChannelOpenError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
            }),
        }
    }
}

/// Parse a channel string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```ignore
/// let params = parse_channel_params("dummy:msp=2")?;
/// assert_eq!(params.name, "dummy");
/// assert_eq!(params.params.get("msp"), Some(&"2".to_string()));
/// ```
pub fn parse_channel_params(s: &str) -> Result<ChannelParams, ChannelOpenError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(ChannelOpenError::Format(opt.to_string()));
            }
        }
    }

    Ok(ChannelParams {
        name: name.to_string(),
        params,
    })
}

/// Open a channel and wrap it in a [`ChannelHandle`]
///
/// # Arguments
/// * `channel` - Channel specification (e.g., "dummy" or "dummy:msp=2,bfh=off")
pub fn open_channel(channel: &str) -> Result<ChannelHandle, ChannelOpenError> {
    let params = parse_channel_params(channel)?;

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        _ => Err(ChannelOpenError::UnknownChannel(params.name)),
    }
}

#[allow(dead_code)] // Used by feature-gated backends
fn parse_u32(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[allow(dead_code)] // Used by feature-gated backends
fn parse_u64(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[allow(dead_code)] // Used by feature-gated backends
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "yes" => Some(true),
        "off" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &ChannelParams) -> Result<ChannelHandle, ChannelOpenError> {
    use envme_core::ChannelStatus;
    use envme_dummy::{DummyConfig, DummyController};

    params.check_keys(&["msp", "bfh", "recheck", "descriptor", "clog"])?;

    let mut config = DummyConfig::default();
    if let Some(msp) = params.get("msp", parse_u32)? {
        config.msp_type = msp;
    }
    if let Some(bfh) = params.get("bfh", parse_bool)? {
        config.bfh_mode = bfh;
    }
    if let Some(recheck) = params.get("recheck", |s| match s {
        "fail" => Some(Err(ChannelStatus::NOT_READY)),
        "bfh" => Some(Ok(true)),
        "normal" => Some(Ok(false)),
        _ => None,
    })? {
        config.after_handoff = recheck;
    }
    if let Some(descriptor) = params.get("descriptor", parse_u64)? {
        config.nand_descriptor = descriptor;
    }
    if let Some(clog) = params.get("clog", parse_bool)? {
        config.clog_mismatch = clog;
    }

    log::info!(
        "Opening emulated controller (MSP type 0x{:x}, BFH mode {})",
        config.msp_type,
        config.bfh_mode
    );
    Ok(ChannelHandle::new(
        params.name.clone(),
        Box::new(DummyController::new(config)),
    ))
}

// Channel information and listing
/// Information about a channel backend
pub struct ChannelInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Get information about all available channels (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_channels() -> Vec<ChannelInfo> {
    let mut channels = Vec::new();

    #[cfg(feature = "dummy")]
    channels.push(ChannelInfo {
        name: "dummy",
        description: "Emulated controller for testing \
                      (msp=<n>,bfh=<on|off>,recheck=<fail|bfh|normal>,descriptor=<hex>,clog=<on|off>)",
    });

    channels
}

/// Generate a short list of channel names for CLI help
pub fn channel_names_short() -> String {
    let channels = available_channels();
    if channels.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = channels.iter().map(|c| c.name).collect();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let params = parse_channel_params("dummy").unwrap();
        assert_eq!(params.name, "dummy");
        assert!(params.params.is_empty());
    }

    #[test]
    fn test_parse_with_params() {
        let params = parse_channel_params("dummy:msp=0x2,bfh=off").unwrap();
        assert_eq!(params.name, "dummy");
        assert_eq!(params.params.get("msp").map(String::as_str), Some("0x2"));
        assert_eq!(params.params.get("bfh").map(String::as_str), Some("off"));
    }

    #[test]
    fn test_parse_bad_format() {
        assert!(matches!(
            parse_channel_params("dummy:msp"),
            Err(ChannelOpenError::Format(opt)) if opt == "msp"
        ));
    }

    #[test]
    fn test_unknown_channel() {
        assert!(matches!(
            open_channel("nosuch"),
            Err(ChannelOpenError::UnknownChannel(name)) if name == "nosuch"
        ));
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_u32("0x10"), Some(16));
        assert_eq!(parse_u32("10"), Some(10));
        assert_eq!(parse_u64("0x1122334455667788"), Some(0x1122_3344_5566_7788));
        assert_eq!(parse_bool("On"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_with_params() {
        let mut handle = open_channel("dummy:msp=2,bfh=off,descriptor=0xabc").unwrap();
        assert_eq!(handle.name(), "dummy");
        let channel = handle.as_channel_mut();
        assert_eq!(channel.msp_type(), Ok(2));
        assert_eq!(channel.is_bfh_mode(), Ok(false));
        assert_eq!(channel.nand_descriptor(), Ok(0xabc));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_rejects_bad_params() {
        assert!(matches!(
            open_channel("dummy:speed=4"),
            Err(ChannelOpenError::UnknownParam { .. })
        ));
        assert!(matches!(
            open_channel("dummy:msp=two"),
            Err(ChannelOpenError::InvalidValue { .. })
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_listed() {
        assert!(available_channels().iter().any(|c| c.name == "dummy"));
        assert!(channel_names_short().contains("dummy"));
    }
}
