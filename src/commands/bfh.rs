//! Boot-from-host recovery command

use super::spinner;
use envme_core::bfh::{BfhConfig, BfhOutcome, BfhProgress, BfhRequest, BfhSequencer, TransferReport};
use envme_core::blob::BlobSource;
use envme_core::config::Config;
use envme_core::{ControllerChannel, Error};
use indicatif::ProgressBar;
use std::io::Write;

/// Progress reporter using an indicatif spinner
pub struct IndicatifProgress {
    current: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { current: None }
    }

    fn step(&mut self, message: String) {
        match &self.current {
            Some(pb) => pb.set_message(message),
            None => self.current = Some(spinner(message)),
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BfhProgress for IndicatifProgress {
    fn transferring(&mut self, source: &BlobSource, len: usize) {
        self.step(format!("Handing {} byte BFH loader from {}...", len, source));
    }

    fn settling(&mut self, ms: u32) {
        self.step(format!("Waiting {} ms for the controller...", ms));
    }

    fn fetching_descriptor(&mut self) {
        self.step("Reading NAND descriptor...".to_string());
    }

    fn complete(&mut self, _outcome: &BfhOutcome) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }

    fn failed(&mut self, _error: &Error) {
        if let Some(pb) = self.current.take() {
            pb.abandon();
        }
    }
}

/// Run the BFH sequence and print the descriptor
pub fn run_bfh(
    channel: &mut dyn ControllerChannel,
    config: &Config,
    bfh: BfhConfig,
    request: &BfhRequest,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    log::debug!(
        "BFH settings: entry={}, recheck={}, max stream size={}",
        bfh.entry,
        bfh.recheck,
        bfh.max_stream_size
    );

    let mut progress = IndicatifProgress::new();
    let outcome = BfhSequencer::new(channel, &config.loaders)
        .with_config(bfh)
        .run_with_progress(request, &mut progress)?;

    match &outcome.transfer {
        TransferReport::Skipped => {
            log::info!("MSP type {}: no BFH loader needed", outcome.msp_type)
        }
        TransferReport::Sent { source, len } => {
            log::info!("MSP type {}: sent {} bytes from {}", outcome.msp_type, len, source)
        }
    }
    log::info!("Firmware image: {}", outcome.firmware_path);

    writeln!(out, "{}", outcome.descriptor)?;
    Ok(())
}
