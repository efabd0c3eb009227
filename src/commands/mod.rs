//! CLI command implementations
//!
//! Every command takes the open channel as `&mut dyn ControllerChannel`, so
//! the same implementation runs against real hardware and the emulator.
//!
//! ## Recovery
//!
//! The `bfh` module wraps the core BFH sequencer with a spinner and prints
//! the NAND descriptor on success.
//!
//! ## Passthrough commands
//!
//! `query`, `firmware` and `power` forward single controller actions and
//! print their results.

pub mod bfh;
pub mod firmware;
mod list;
pub mod power;
pub mod query;

pub use list::list_channels;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

/// Start a spinner with `message`
fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()));
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
