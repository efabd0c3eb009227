//! Controller query commands

use crate::cli::QueryTarget;
use envme_core::error::{ChannelOp, ChannelResultExt};
use envme_core::identify::{IdentifyController, IDENTIFY_PAGE_SIZE};
use envme_core::msp::{LoaderTable, MspType, NandDescriptor};
use envme_core::ControllerChannel;

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Print the requested controller values
pub fn run_query(
    channel: &mut dyn ControllerChannel,
    table: &LoaderTable,
    what: QueryTarget,
) -> Result<(), Box<dyn std::error::Error>> {
    let all = what == QueryTarget::All;

    let msp_type = if all || matches!(what, QueryTarget::Msp | QueryTarget::Descriptor) {
        Some(MspType(channel.msp_type().op(ChannelOp::GetMspType)?))
    } else {
        None
    };

    if let Some(msp) = msp_type.filter(|_| all || what == QueryTarget::Msp) {
        match msp.validate() {
            Ok(id) => {
                let entry = table.entry(id);
                println!("MSP type:        {} (loader {}, {})", msp, id.get(), entry.dir);
                println!("BFH loader:      {}", entry.loader.display());
            }
            Err(_) => println!("MSP type:        {} (unknown)", msp),
        }
    }

    if all || what == QueryTarget::Bfh {
        let bfh = channel.is_bfh_mode().op(ChannelOp::IsBfhMode)?;
        println!("BFH mode:        {}", yes_no(bfh));
    }

    if all || what == QueryTarget::Clog {
        let clog = channel.clog_mismatch().op(ChannelOp::GetClogMismatch)?;
        println!("Clog mismatch:   {}", yes_no(clog));
    }

    if let Some(msp) = msp_type.filter(|_| all || what == QueryTarget::Descriptor) {
        let descriptor = NandDescriptor(
            channel
                .nand_descriptor()
                .op(ChannelOp::GetNandDescriptor)?,
        );
        println!("NAND descriptor: {}", descriptor);
        match descriptor.firmware_path(table, msp) {
            Ok(path) => println!("Firmware image:  {}", path),
            Err(e) => log::warn!("No firmware image name: {}", e),
        }
    }

    Ok(())
}

/// Print the identify-controller data
pub fn run_identify(channel: &mut dyn ControllerChannel) -> Result<(), Box<dyn std::error::Error>> {
    let mut page = [0u8; IDENTIFY_PAGE_SIZE];
    channel
        .identify_controller(&mut page)
        .op(ChannelOp::IdentifyController)?;
    let id = IdentifyController::parse(&page)?;

    let (major, minor, tertiary) = id.version();

    println!("Controller Identify Data");
    println!("========================");
    println!();
    println!("Vendor ID:       {:04X}", id.vid.get());
    println!("Subsystem VID:   {:04X}", id.ssvid.get());
    println!("Serial number:   {}", id.serial());
    println!("Model number:    {}", id.model());
    println!("Firmware rev:    {}", id.firmware_revision());
    println!(
        "IEEE OUI:        {:02X}{:02X}{:02X}",
        id.ieee[2], id.ieee[1], id.ieee[0]
    );
    println!("Controller ID:   {}", id.cntlid.get());
    println!("NVMe version:    {}.{}.{}", major, minor, tertiary);
    if id.mdts == 0 {
        println!("Max transfer:    unlimited");
    } else {
        println!("Max transfer:    {} pages", 1u64 << id.mdts.min(63));
    }

    Ok(())
}
