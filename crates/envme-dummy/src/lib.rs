//! envme-dummy - Emulated NVMe controller for testing
//!
//! This crate provides a [`ControllerChannel`] that emulates the controller
//! service in memory. It records every call it receives so tests and dry
//! runs can check exactly what the host did, and any operation can be made
//! to fail with a chosen status.

use std::collections::HashMap;

use envme_core::channel::{ChannelResult, ChannelStatus, ControllerChannel};
use envme_core::identify::{IdentifyController, IDENTIFY_PAGE_SIZE};
use envme_core::power::{NvmeState, PciPortState};
use envme_core::ChannelOp;
use zerocopy::{FromZeros, IntoBytes};

/// Configuration for the emulated controller
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// MSP type reported by the controller
    pub msp_type: u32,
    /// Whether the controller starts in BFH mode
    pub bfh_mode: bool,
    /// What the BFH status query returns once a loader has been handed over
    pub after_handoff: ChannelResult<bool>,
    /// NAND descriptor
    pub nand_descriptor: u64,
    /// Clog mismatch flag
    pub clog_mismatch: bool,
    /// PCI vendor ID
    pub vendor_id: u16,
    /// Serial number
    pub serial: String,
    /// Model number
    pub model: String,
    /// Firmware revision
    pub firmware_revision: String,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            msp_type: 0,
            bfh_mode: true,
            // The controller is busy booting the loader and rejects the query
            after_handoff: Err(ChannelStatus::NOT_READY),
            nand_descriptor: 0x1122_3344_5566_7788,
            clog_mismatch: false,
            vendor_id: 0x106B,
            serial: "DUMMY0000000001".to_string(),
            model: "Emulated NVMe Controller".to_string(),
            firmware_revision: "0.1".to_string(),
        }
    }
}

/// A call received by the emulated controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyCall {
    /// MSP type query
    MspType,
    /// BFH status query
    IsBfhMode,
    /// Loader handoff with its length
    PerformBfh(usize),
    /// NAND descriptor query
    NandDescriptor,
    /// Delay request in milliseconds
    Delay(u32),
    /// Identify page read
    Identify,
    /// Clog mismatch query
    ClogMismatch,
    /// Raw command with selector and word count
    NvmeCommand(u32, usize),
    /// BFH GPIO change
    SetBfhMode(bool),
    /// NVMe state change
    SetNvmeState(NvmeState),
    /// PCI port state change
    SetPciPortState(PciPortState, u32),
    /// Firmware validation with image length
    ValidateFirmware(usize),
    /// Firmware version check with image length and MSP type
    CheckFirmwareVersion(usize, u32),
    /// Firmware download with image length
    DownloadFirmware(usize),
    /// Connection close
    Close,
}

/// Emulated controller
pub struct DummyController {
    config: DummyConfig,
    bfh_mode: bool,
    handed_off: bool,
    closed: bool,
    faults: HashMap<ChannelOp, ChannelStatus>,
    calls: Vec<DummyCall>,
    firmware: Option<Vec<u8>>,
    nvme_state: NvmeState,
    pci_state: PciPortState,
}

impl DummyController {
    /// Create an emulated controller with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            bfh_mode: config.bfh_mode,
            config,
            handed_off: false,
            closed: false,
            faults: HashMap::new(),
            calls: Vec::new(),
            firmware: None,
            nvme_state: NvmeState::all(),
            pci_state: PciPortState::all(),
        }
    }

    /// Create an emulated controller with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Make `op` fail with `status` from now on
    pub fn fail_on(&mut self, op: ChannelOp, status: ChannelStatus) {
        self.faults.insert(op, status);
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> &[DummyCall] {
        &self.calls
    }

    /// Lengths of all loader handoffs
    pub fn transfers(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DummyCall::PerformBfh(len) => Some(*len),
                _ => None,
            })
            .collect()
    }

    /// Total requested delay in milliseconds
    pub fn total_delay_ms(&self) -> u64 {
        self.calls
            .iter()
            .map(|c| match c {
                DummyCall::Delay(ms) => u64::from(*ms),
                _ => 0,
            })
            .sum()
    }

    /// Last downloaded firmware image
    pub fn firmware(&self) -> Option<&[u8]> {
        self.firmware.as_deref()
    }

    /// Current NVMe state
    pub fn nvme_state(&self) -> NvmeState {
        self.nvme_state
    }

    /// Current PCI port state
    pub fn pci_port_state(&self) -> PciPortState {
        self.pci_state
    }

    /// Whether the connection has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Record a call and apply the closed state and injected faults
    fn enter(&mut self, op: ChannelOp, call: DummyCall) -> ChannelResult<()> {
        log::trace!("dummy: {:?}", call);
        self.calls.push(call);
        if self.closed {
            return Err(ChannelStatus::NOT_OPEN);
        }
        match self.faults.get(&op) {
            Some(&status) => Err(status),
            None => Ok(()),
        }
    }

    fn identify_page(&self) -> IdentifyController {
        let mut id = IdentifyController::new_zeroed();
        id.vid.set(self.config.vendor_id);
        id.ssvid.set(self.config.vendor_id);
        pad_ascii(&mut id.sn, &self.config.serial);
        pad_ascii(&mut id.mn, &self.config.model);
        pad_ascii(&mut id.fr, &self.config.firmware_revision);
        id.mdts = 5;
        id.ver.set(0x0001_0400);
        id
    }
}

fn pad_ascii(field: &mut [u8], value: &str) {
    field.fill(b' ');
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
}

impl ControllerChannel for DummyController {
    fn msp_type(&mut self) -> ChannelResult<u32> {
        self.enter(ChannelOp::GetMspType, DummyCall::MspType)?;
        Ok(self.config.msp_type)
    }

    fn is_bfh_mode(&mut self) -> ChannelResult<bool> {
        self.enter(ChannelOp::IsBfhMode, DummyCall::IsBfhMode)?;
        if self.handed_off {
            self.config.after_handoff
        } else {
            Ok(self.bfh_mode)
        }
    }

    fn perform_bfh(&mut self, blob: &[u8]) -> ChannelResult<()> {
        self.enter(ChannelOp::PerformBfh, DummyCall::PerformBfh(blob.len()))?;
        if blob.is_empty() {
            return Err(ChannelStatus::BAD_ARGUMENT);
        }
        log::debug!("dummy: received {} byte BFH loader", blob.len());
        self.handed_off = true;
        Ok(())
    }

    fn nand_descriptor(&mut self) -> ChannelResult<u64> {
        self.enter(ChannelOp::GetNandDescriptor, DummyCall::NandDescriptor)?;
        Ok(self.config.nand_descriptor)
    }

    fn delay_ms(&mut self, ms: u32) {
        // Recorded only; tests must not sleep
        self.calls.push(DummyCall::Delay(ms));
    }

    fn identify_controller(&mut self, page: &mut [u8; IDENTIFY_PAGE_SIZE]) -> ChannelResult<()> {
        self.enter(ChannelOp::IdentifyController, DummyCall::Identify)?;
        page.copy_from_slice(self.identify_page().as_bytes());
        Ok(())
    }

    fn clog_mismatch(&mut self) -> ChannelResult<bool> {
        self.enter(ChannelOp::GetClogMismatch, DummyCall::ClogMismatch)?;
        Ok(self.config.clog_mismatch)
    }

    fn send_nvme_command(&mut self, selector: u32, command: &[u64]) -> ChannelResult<()> {
        self.enter(
            ChannelOp::SendNvmeCommand,
            DummyCall::NvmeCommand(selector, command.len()),
        )
    }

    fn set_bfh_mode(&mut self, enable: bool) -> ChannelResult<()> {
        self.enter(ChannelOp::SetBfhMode, DummyCall::SetBfhMode(enable))?;
        self.bfh_mode = enable;
        self.handed_off = false;
        Ok(())
    }

    fn set_nvme_state(&mut self, state: NvmeState) -> ChannelResult<()> {
        self.enter(ChannelOp::SetNvmeState, DummyCall::SetNvmeState(state))?;
        self.nvme_state = state;
        Ok(())
    }

    fn set_pci_port_state(&mut self, state: PciPortState, aux: u32) -> ChannelResult<()> {
        self.enter(
            ChannelOp::SetPciPortState,
            DummyCall::SetPciPortState(state, aux),
        )?;
        self.pci_state = state;
        Ok(())
    }

    fn validate_firmware(&mut self, image: &[u8]) -> ChannelResult<()> {
        self.enter(
            ChannelOp::FirmwareValidate,
            DummyCall::ValidateFirmware(image.len()),
        )?;
        if image.is_empty() {
            return Err(ChannelStatus::BAD_ARGUMENT);
        }
        Ok(())
    }

    fn check_firmware_version(&mut self, image: &[u8], msp_type: u32) -> ChannelResult<()> {
        self.enter(
            ChannelOp::FirmwareVersionCheck,
            DummyCall::CheckFirmwareVersion(image.len(), msp_type),
        )?;
        if image.is_empty() || msp_type != self.config.msp_type {
            return Err(ChannelStatus::BAD_ARGUMENT);
        }
        Ok(())
    }

    fn download_firmware(&mut self, image: &[u8]) -> ChannelResult<()> {
        self.enter(
            ChannelOp::FirmwareDownload,
            DummyCall::DownloadFirmware(image.len()),
        )?;
        if image.is_empty() {
            return Err(ChannelStatus::BAD_ARGUMENT);
        }
        self.firmware = Some(image.to_vec());
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.enter(ChannelOp::Close, DummyCall::Close)?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envme_core::bfh::{BfhRequest, BfhSequencer, TransferReport, BFH_SETTLE_MS};
    use envme_core::msp::{LoaderEntry, LoaderTable};
    use envme_core::Error;
    use std::io::{Cursor, Write};

    fn loader_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0xB5; len]).unwrap();
        file.flush().unwrap();
        file
    }

    fn table_for(file: &tempfile::NamedTempFile) -> LoaderTable {
        let path = file.path().to_path_buf();
        LoaderTable::from_entries(
            ["generic", "s3e", "s4e", "s5e", "s6e"].map(|dir| LoaderEntry::new(dir, path.clone())),
        )
    }

    #[test]
    fn test_scenario_a_recovery() {
        let file = loader_file(2048);
        let table = table_for(&file);
        let mut ctrl = DummyController::new_default();

        let outcome = BfhSequencer::new(&mut ctrl, &table)
            .run(&BfhRequest::default())
            .unwrap();

        assert_eq!(outcome.descriptor.to_string(), "1122334455667788");
        assert_eq!(outcome.firmware_path, "s3e/1122334455667788.pak");
        assert_eq!(ctrl.transfers(), vec![2048]);
        assert_eq!(ctrl.total_delay_ms(), u64::from(BFH_SETTLE_MS));
        assert_eq!(
            ctrl.calls(),
            &[
                DummyCall::MspType,
                DummyCall::IsBfhMode,
                DummyCall::PerformBfh(2048),
                DummyCall::Delay(BFH_SETTLE_MS),
                DummyCall::IsBfhMode,
                DummyCall::NandDescriptor,
            ]
        );
    }

    #[test]
    fn test_scenario_b_unknown_msp() {
        let table = LoaderTable::builtin();
        let mut ctrl = DummyController::new(DummyConfig {
            msp_type: 10,
            ..DummyConfig::default()
        });

        let err = BfhSequencer::new(&mut ctrl, &table)
            .run(&BfhRequest::default())
            .unwrap_err();

        assert!(err.to_string().starts_with("Unknown MSP type"));
        assert_eq!(ctrl.calls(), &[DummyCall::MspType]);
    }

    #[test]
    fn test_scenario_c_missing_loader() {
        let table = LoaderTable::builtin();
        let mut ctrl = DummyController::new_default();

        let err = BfhSequencer::new(&mut ctrl, &table)
            .run(&BfhRequest::with_loader_path("/nonexistent"))
            .unwrap_err();

        assert!(err.to_string().starts_with("Error opening file"));
        assert!(ctrl.transfers().is_empty());
        assert_eq!(ctrl.total_delay_ms(), 0);
    }

    #[test]
    fn test_scenario_d_override_size() {
        let table = LoaderTable::builtin();
        let mut ctrl = DummyController::new(DummyConfig {
            msp_type: 1,
            ..DummyConfig::default()
        });

        let outcome = BfhSequencer::new(&mut ctrl, &table)
            .with_stream(Cursor::new(vec![0u8; 512]))
            .run(&BfhRequest::with_override_size(512))
            .unwrap();

        assert_eq!(ctrl.transfers(), vec![512]);
        assert!(matches!(outcome.transfer, TransferReport::Sent { len: 512, .. }));
    }

    #[test]
    fn test_every_unknown_msp_stops_after_query() {
        let table = LoaderTable::builtin();
        for msp_type in [4, 5, 6, 100, 0x8000_0000, u32::MAX - 1] {
            let mut ctrl = DummyController::new(DummyConfig {
                msp_type,
                ..DummyConfig::default()
            });
            let err = BfhSequencer::new(&mut ctrl, &table)
                .run(&BfhRequest::default())
                .unwrap_err();
            assert!(matches!(err, Error::UnknownMspType(_)));
            assert_eq!(ctrl.calls().len(), 1);
        }
    }

    #[test]
    fn test_skip_transfer_variant() {
        let table = LoaderTable::builtin();
        let mut ctrl = DummyController::new(DummyConfig {
            msp_type: 2,
            ..DummyConfig::default()
        });

        let outcome = BfhSequencer::new(&mut ctrl, &table)
            .run(&BfhRequest::default())
            .unwrap();

        assert_eq!(outcome.transfer, TransferReport::Skipped);
        assert!(ctrl.transfers().is_empty());
        assert_eq!(outcome.firmware_path, "s5e/1122334455667788.pak");
    }

    #[test]
    fn test_transfer_variants_reach_handoff() {
        let file = loader_file(64);
        let table = table_for(&file);
        for msp_type in [u32::MAX, 0, 1, 3] {
            let mut ctrl = DummyController::new(DummyConfig {
                msp_type,
                ..DummyConfig::default()
            });
            BfhSequencer::new(&mut ctrl, &table)
                .run(&BfhRequest::default())
                .unwrap();
            assert_eq!(ctrl.transfers(), vec![64], "msp type {:#x}", msp_type);
        }
    }

    #[test]
    fn test_controller_not_in_bfh_mode() {
        let table = LoaderTable::builtin();
        let mut ctrl = DummyController::new(DummyConfig {
            bfh_mode: false,
            ..DummyConfig::default()
        });

        let err = BfhSequencer::new(&mut ctrl, &table)
            .run(&BfhRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotInBfhMode));
    }

    #[test]
    fn test_injected_handoff_failure() {
        let file = loader_file(32);
        let table = table_for(&file);
        let mut ctrl = DummyController::new_default();
        ctrl.fail_on(ChannelOp::PerformBfh, ChannelStatus::ERROR);

        let err = BfhSequencer::new(&mut ctrl, &table)
            .run(&BfhRequest::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "PerformBFH failed. status=0xe00002bc");
        assert_eq!(ctrl.total_delay_ms(), 0);
    }

    #[test]
    fn test_identify_page() {
        let mut ctrl = DummyController::new_default();
        let mut page = [0u8; IDENTIFY_PAGE_SIZE];
        ctrl.identify_controller(&mut page).unwrap();

        let id = IdentifyController::parse(&page).unwrap();
        assert_eq!(id.serial(), "DUMMY0000000001");
        assert_eq!(id.model(), "Emulated NVMe Controller");
        assert_eq!(id.firmware_revision(), "0.1");
        assert_eq!(id.version(), (1, 4, 0));
    }

    #[test]
    fn test_firmware_update_flow() {
        let mut ctrl = DummyController::new_default();
        let image = [0x5Au8; 128];

        ctrl.validate_firmware(&image).unwrap();
        ctrl.check_firmware_version(&image, 0).unwrap();
        assert_eq!(
            ctrl.check_firmware_version(&image, 3),
            Err(ChannelStatus::BAD_ARGUMENT)
        );
        ctrl.download_firmware(&image).unwrap();
        assert_eq!(ctrl.firmware(), Some(&image[..]));
    }

    #[test]
    fn test_power_state_changes() {
        let mut ctrl = DummyController::new_default();
        ctrl.set_nvme_state(NvmeState::POWER).unwrap();
        ctrl.set_pci_port_state(PciPortState::empty(), 0).unwrap();
        assert_eq!(ctrl.nvme_state(), NvmeState::POWER);
        assert_eq!(ctrl.pci_port_state(), PciPortState::empty());

        ctrl.set_bfh_mode(false).unwrap();
        assert_eq!(ctrl.is_bfh_mode(), Ok(false));
    }

    #[test]
    fn test_closed_connection() {
        let mut ctrl = DummyController::new_default();
        ctrl.close().unwrap();
        assert!(ctrl.is_closed());
        assert_eq!(ctrl.msp_type(), Err(ChannelStatus::NOT_OPEN));
        assert_eq!(ctrl.close(), Err(ChannelStatus::NOT_OPEN));
    }
}
