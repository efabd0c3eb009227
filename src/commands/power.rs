//! Power, GPIO and raw command passthroughs

use envme_core::error::{ChannelOp, ChannelResultExt};
use envme_core::power::{NvmeState, PciPortState};
use envme_core::ControllerChannel;

/// Set the PCI port state
pub fn run_pci(
    channel: &mut dyn ControllerChannel,
    state: PciPortState,
    aux: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let (link, power) = state.as_pair();
    log::info!(
        "Setting PCI port state: link={}, power={}, aux=0x{:x}",
        link,
        power,
        aux
    );
    channel
        .set_pci_port_state(state, aux)
        .op(ChannelOp::SetPciPortState)?;
    Ok(())
}

/// Set the NVMe controller state
pub fn run_nvme_state(
    channel: &mut dyn ControllerChannel,
    state: NvmeState,
) -> Result<(), Box<dyn std::error::Error>> {
    let (controller, power) = state.as_pair();
    log::info!(
        "Setting NVMe state: controller={}, power={}",
        controller,
        power
    );
    channel.set_nvme_state(state).op(ChannelOp::SetNvmeState)?;
    Ok(())
}

/// Drive the BFH GPIO
pub fn run_bfh_gpio(
    channel: &mut dyn ControllerChannel,
    enable: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Setting BFH GPIO {}", if enable { "on" } else { "off" });
    channel.set_bfh_mode(enable).op(ChannelOp::SetBfhMode)?;
    Ok(())
}

/// Forward a raw vendor NVMe command
pub fn run_nvme_command(
    channel: &mut dyn ControllerChannel,
    selector: u32,
    words: &[u64],
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!(
        "Sending NVMe command: selector=0x{:x}, {} words",
        selector,
        words.len()
    );
    for (i, word) in words.iter().enumerate() {
        log::debug!("  word {}: 0x{:016x}", i, word);
    }
    channel
        .send_nvme_command(selector, words)
        .op(ChannelOp::SendNvmeCommand)?;
    Ok(())
}
