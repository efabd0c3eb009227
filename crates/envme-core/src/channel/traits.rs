//! Controller channel trait definition

use super::{ChannelResult, ChannelStatus};
use crate::identify::IDENTIFY_PAGE_SIZE;
use crate::power::{NvmeState, PciPortState};

/// Connection to an embedded NVMe controller's service
///
/// A channel represents one open connection to the controller. All
/// operations are blocking round-trips with no timeout; a nonzero platform
/// code comes back as `Err(ChannelStatus)`.
///
/// The first four operations and [`delay_ms`](Self::delay_ms) are what the
/// BFH recovery sequence needs, so every backend must implement them. The
/// remaining operations are plain passthroughs and default to
/// [`ChannelStatus::UNSUPPORTED`].
///
/// ## Example: minimal backend
///
/// ```ignore
/// impl ControllerChannel for MyController {
///     fn msp_type(&mut self) -> ChannelResult<u32> {
///         self.call_scalar(Selector::MspType)
///     }
///
///     fn is_bfh_mode(&mut self) -> ChannelResult<bool> {
///         self.call_scalar(Selector::IsBfhMode).map(|v| v != 0)
///     }
///
///     fn perform_bfh(&mut self, blob: &[u8]) -> ChannelResult<()> {
///         self.call_struct(Selector::PerformBfh, blob)
///     }
///
///     fn nand_descriptor(&mut self) -> ChannelResult<u64> {
///         self.call_scalar(Selector::NandDescriptor)
///     }
///
///     fn delay_ms(&mut self, ms: u32) {
///         std::thread::sleep(std::time::Duration::from_millis(ms.into()));
///     }
/// }
/// ```
pub trait ControllerChannel {
    /// Read the controller's MSP type (raw, unvalidated)
    fn msp_type(&mut self) -> ChannelResult<u32>;

    /// Query whether the controller is currently in BFH mode
    fn is_bfh_mode(&mut self) -> ChannelResult<bool>;

    /// Hand a BFH loader image to the controller
    ///
    /// The length of `blob` is the transfer length.
    fn perform_bfh(&mut self, blob: &[u8]) -> ChannelResult<()>;

    /// Read the 64-bit NAND descriptor
    fn nand_descriptor(&mut self) -> ChannelResult<u64>;

    /// Block the calling thread for `ms` milliseconds
    ///
    /// Emulated backends may record the request instead of sleeping.
    fn delay_ms(&mut self, ms: u32);

    /// Read the 4 KiB identify-controller page
    fn identify_controller(&mut self, _page: &mut [u8; IDENTIFY_PAGE_SIZE]) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Query the clog mismatch flag
    fn clog_mismatch(&mut self) -> ChannelResult<bool> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Send a raw vendor NVMe command
    ///
    /// `selector` picks the controller action; `command` is forwarded as-is.
    fn send_nvme_command(&mut self, _selector: u32, _command: &[u64]) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Drive the BFH GPIO
    fn set_bfh_mode(&mut self, _enable: bool) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Change the NVMe power state
    fn set_nvme_state(&mut self, _state: NvmeState) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Change the PCI port state
    ///
    /// `aux` is a vendor-defined argument forwarded verbatim.
    fn set_pci_port_state(&mut self, _state: PciPortState, _aux: u32) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Ask the controller to validate a firmware image
    fn validate_firmware(&mut self, _image: &[u8]) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Check whether a firmware image applies to the given MSP type
    fn check_firmware_version(&mut self, _image: &[u8], _msp_type: u32) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Download a firmware image to the controller
    fn download_firmware(&mut self, _image: &[u8]) -> ChannelResult<()> {
        Err(ChannelStatus::UNSUPPORTED)
    }

    /// Close the service connection
    ///
    /// Called once by the owning handle. Operations after close should
    /// return [`ChannelStatus::NOT_OPEN`].
    fn close(&mut self) -> ChannelResult<()> {
        Ok(())
    }
}

impl<C: ControllerChannel + ?Sized> ControllerChannel for Box<C> {
    fn msp_type(&mut self) -> ChannelResult<u32> {
        (**self).msp_type()
    }

    fn is_bfh_mode(&mut self) -> ChannelResult<bool> {
        (**self).is_bfh_mode()
    }

    fn perform_bfh(&mut self, blob: &[u8]) -> ChannelResult<()> {
        (**self).perform_bfh(blob)
    }

    fn nand_descriptor(&mut self) -> ChannelResult<u64> {
        (**self).nand_descriptor()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }

    fn identify_controller(&mut self, page: &mut [u8; IDENTIFY_PAGE_SIZE]) -> ChannelResult<()> {
        (**self).identify_controller(page)
    }

    fn clog_mismatch(&mut self) -> ChannelResult<bool> {
        (**self).clog_mismatch()
    }

    fn send_nvme_command(&mut self, selector: u32, command: &[u64]) -> ChannelResult<()> {
        (**self).send_nvme_command(selector, command)
    }

    fn set_bfh_mode(&mut self, enable: bool) -> ChannelResult<()> {
        (**self).set_bfh_mode(enable)
    }

    fn set_nvme_state(&mut self, state: NvmeState) -> ChannelResult<()> {
        (**self).set_nvme_state(state)
    }

    fn set_pci_port_state(&mut self, state: PciPortState, aux: u32) -> ChannelResult<()> {
        (**self).set_pci_port_state(state, aux)
    }

    fn validate_firmware(&mut self, image: &[u8]) -> ChannelResult<()> {
        (**self).validate_firmware(image)
    }

    fn check_firmware_version(&mut self, image: &[u8], msp_type: u32) -> ChannelResult<()> {
        (**self).check_firmware_version(image, msp_type)
    }

    fn download_firmware(&mut self, image: &[u8]) -> ChannelResult<()> {
        (**self).download_firmware(image)
    }

    fn close(&mut self) -> ChannelResult<()> {
        (**self).close()
    }
}
