//! Firmware image commands

use super::spinner;
use envme_core::blob::{self, BlobSource};
use envme_core::error::{ChannelOp, ChannelResultExt};
use envme_core::ControllerChannel;
use std::io;
use std::path::Path;

/// Validate an image with the controller
pub fn run_validate(
    channel: &mut dyn ControllerChannel,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = blob::load_from_path(input)?;
    log::info!("Validating {} ({} bytes)", input.display(), image.len());

    channel
        .validate_firmware(image.as_bytes())
        .op(ChannelOp::FirmwareValidate)?;

    println!("Firmware image is valid");
    Ok(())
}

/// Check an image's version against the controller's MSP type
pub fn run_query_update(
    channel: &mut dyn ControllerChannel,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let msp_type = channel.msp_type().op(ChannelOp::GetMspType)?;
    let image = blob::load_from_path(input)?;
    log::debug!("Checking {} against MSP type 0x{:x}", input.display(), msp_type);

    channel
        .check_firmware_version(image.as_bytes(), msp_type)
        .op(ChannelOp::FirmwareVersionCheck)?;

    println!("Firmware image matches MSP type 0x{:x}", msp_type);
    Ok(())
}

/// Validate and download an image
pub fn run_update(
    channel: &mut dyn ControllerChannel,
    source: &BlobSource,
    max_stream_size: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = blob::load(source, &mut io::stdin().lock(), max_stream_size)?;
    log::info!("Loaded {} byte firmware image from {}", image.len(), source);

    channel
        .validate_firmware(image.as_bytes())
        .op(ChannelOp::FirmwareValidate)?;

    let pb = spinner(format!("Downloading {} bytes...", image.len()));
    let result = channel
        .download_firmware(image.as_bytes())
        .op(ChannelOp::FirmwareDownload);
    drop(image);

    match result {
        Ok(()) => {
            pb.finish_with_message("Download complete");
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Download failed");
            Err(e.into())
        }
    }
}
