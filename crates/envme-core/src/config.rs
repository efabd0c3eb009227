//! TOML configuration file
//!
//! Overrides the built-in loader table and the BFH sequence settings:
//!
//! ```toml
//! [bfh]
//! entry = "require-bfh-mode"
//! recheck = "proceed-on-call-failure"
//! max_stream_size = "16 MiB"
//!
//! [[loader]]
//! id = 2
//! dir = "s4e"
//! path = "/opt/nvme/s4e/bfh_loader.bin"
//! ```
//!
//! Every key is optional. Loader entries replace the built-in entry with
//! the same ID; IDs not listed keep their built-in location.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bfh::{BfhConfig, EntryPolarity, RecheckPolicy};
use crate::msp::{LoaderEntry, LoaderTable, FIRMWARE_DIR_LEN, LOADER_TABLE_LEN};

/// Default config file locations, searched in order
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "envmectl.toml",
    "/etc/envmectl/envmectl.toml",
    "/usr/local/etc/envmectl.toml",
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Error reading config {}: {source}", .path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML or has unknown keys
    #[error("Error parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The file parsed but a value is out of range
    #[error("Invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    #[serde(default)]
    bfh: TomlBfh,
    #[serde(default)]
    loader: Vec<TomlLoader>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBfh {
    entry: Option<EntryPolarity>,
    recheck: Option<RecheckPolicy>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    max_stream_size: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlLoader {
    id: u32,
    dir: Option<String>,
    path: Option<PathBuf>,
}

/// Deserialize a size that can be an integer or a string like "16 MiB"
fn deserialize_opt_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrStr {
        Int(u64),
        Str(String),
    }

    match SizeOrStr::deserialize(deserializer)? {
        SizeOrStr::Int(n) => Ok(Some(n)),
        SizeOrStr::Str(s) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse a size string like "16 MiB", "512KiB", "0x1000" or "4096"
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u64>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if let Ok(n) = u64::from_str_radix(hex.trim(), 16) {
            return Ok(n);
        }
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u64 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

/// Loaded configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Loader table
    pub loaders: LoaderTable,
    /// BFH sequence settings
    pub bfh: BfhConfig,
    /// File the configuration came from, `None` for built-in defaults
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load the configuration
    ///
    /// An explicit path must exist. Without one, the first existing file
    /// in [`DEFAULT_CONFIG_PATHS`] is used, falling back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_toml_file(path);
        }
        let paths: Vec<&Path> = DEFAULT_CONFIG_PATHS.iter().map(Path::new).collect();
        Self::search(&paths)
    }

    /// Load the first existing file among `paths`
    pub fn search(paths: &[&Path]) -> Result<Self, ConfigError> {
        for path in paths {
            if path.is_file() {
                log::debug!("Using config file {}", path.display());
                return Self::from_toml_file(path);
            }
        }
        log::debug!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load a config file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse a config from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfigFile = toml::from_str(content)?;

        let mut bfh = BfhConfig::default();
        if let Some(entry) = file.bfh.entry {
            bfh.entry = entry;
        }
        if let Some(recheck) = file.bfh.recheck {
            bfh.recheck = recheck;
        }
        if let Some(max) = file.bfh.max_stream_size {
            if max == 0 {
                return Err(ConfigError::Validation(
                    "max_stream_size must be nonzero".into(),
                ));
            }
            bfh.max_stream_size = max;
        }

        let loaders = build_table(file.loader)?;

        Ok(Self {
            loaders,
            bfh,
            source: None,
        })
    }
}

fn build_table(overrides: Vec<TomlLoader>) -> Result<LoaderTable, ConfigError> {
    let mut entries = LoaderTable::builtin().into_entries();
    let mut seen = [false; LOADER_TABLE_LEN];

    for loader in overrides {
        let idx = loader.id as usize;
        if idx >= LOADER_TABLE_LEN {
            return Err(ConfigError::Validation(format!(
                "loader id {} out of range (0..{})",
                loader.id, LOADER_TABLE_LEN
            )));
        }
        if seen[idx] {
            return Err(ConfigError::Validation(format!(
                "loader id {} listed more than once",
                loader.id
            )));
        }
        seen[idx] = true;

        let current = &entries[idx];
        let dir = match loader.dir {
            Some(dir) => {
                if dir.is_empty() || dir.len() > FIRMWARE_DIR_LEN {
                    return Err(ConfigError::Validation(format!(
                        "loader {}: dir '{}' must be 1 to {} bytes",
                        loader.id, dir, FIRMWARE_DIR_LEN
                    )));
                }
                dir
            }
            None => current.dir.as_str().to_string(),
        };
        let path = match loader.path {
            Some(path) if path.as_os_str().is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "loader {}: path must not be empty",
                    loader.id
                )));
            }
            Some(path) => path,
            None => current.loader.clone(),
        };

        entries[idx] = LoaderEntry::new(&dir, path);
    }

    Ok(LoaderTable::from_entries(entries))
}
