//! CLI argument parsing

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use envme_core::bfh::{EntryPolarity, RecheckPolicy};
use envme_core::config::parse_size;
use envme_core::power::{parse_state, NvmeState, PciPortState};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u64
fn parse_hex_u64(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u64>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the channel argument
fn channel_help() -> String {
    format!(
        "Controller channel to use, e.g. dummy:msp=0 [available: {}]",
        envme_channel::channel_names_short()
    )
}

#[derive(Parser)]
#[command(name = "envmectl")]
#[command(
    author,
    version,
    about = "Embedded NVMe controller recovery and diagnostics",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short, long, global = true, help = channel_help())]
    pub channel: Option<String>,

    /// Configuration file (TOML)
    /// Defaults to ./envmectl.toml, /etc/envmectl/envmectl.toml, /usr/local/etc/envmectl.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Controller values that `query` can read
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryTarget {
    /// MSP type and loader ID
    Msp,
    /// Whether the controller is in BFH mode
    Bfh,
    /// Clog mismatch flag
    Clog,
    /// NAND descriptor and firmware image name
    Descriptor,
    /// Everything above
    #[default]
    All,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the boot-from-host recovery handoff and print the NAND descriptor
    Bfh {
        /// Read the loader from stdin with exactly this many bytes (e.g. 512, 0x200, "64 KiB")
        #[arg(short, long, value_parser = parse_size, conflicts_with = "loader")]
        size: Option<u64>,

        /// Loader image to use instead of the one for the reported MSP type
        #[arg(short, long)]
        loader: Option<PathBuf>,

        /// Override the initial BFH status check
        #[arg(long)]
        entry: Option<EntryPolarity>,

        /// Override the post-handoff status check
        #[arg(long)]
        recheck: Option<RecheckPolicy>,
    },

    /// Query controller state
    Query {
        /// What to query
        #[arg(value_enum, default_value_t = QueryTarget::All)]
        what: QueryTarget,
    },

    /// Dump the identify-controller data
    Identify,

    /// Validate a firmware image with the controller
    Validate {
        /// Firmware image
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Validate and download a firmware image
    #[command(group(ArgGroup::new("source").required(true).args(["input", "stdin"])))]
    Update {
        /// Firmware image
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read the image from stdin with exactly this many bytes
        #[arg(long, value_name = "SIZE", value_parser = parse_size)]
        stdin: Option<u64>,
    },

    /// Check a firmware image version against the controller's MSP type
    QueryUpdate {
        /// Firmware image
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Set the PCI port state
    Pci {
        /// on, off, or a comma-separated list of: link, power
        #[arg(short, long, value_parser = parse_state::<PciPortState>)]
        state: PciPortState,

        /// Auxiliary word passed to the controller (hex or decimal)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        aux: u32,
    },

    /// Set the NVMe controller state
    NvmeState {
        /// on, off, or a comma-separated list of: controller, power
        #[arg(short, long, value_parser = parse_state::<NvmeState>)]
        state: NvmeState,
    },

    /// Send a raw vendor NVMe command
    NvmeCommand {
        /// Controller action selector (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        selector: u32,

        /// Command words, forwarded as-is (hex or decimal)
        #[arg(required = true, value_parser = parse_hex_u64)]
        words: Vec<u64>,
    },

    /// Drive the BFH GPIO
    #[command(group(ArgGroup::new("level").required(true).args(["on", "off"])))]
    BfhGpio {
        /// Assert the GPIO (controller boots from host)
        #[arg(long)]
        on: bool,

        /// Release the GPIO
        #[arg(long)]
        off: bool,
    },

    /// List available controller channels
    ListChannels,
}
