//! NVMe and PCI port power-state flags
//!
//! The controller exposes two power knobs: the NVMe state action takes two
//! enable bits, the PCI port action takes two enable bits plus an auxiliary
//! word. Both are modelled as flag sets so the CLI can accept `on`, `off` or
//! a comma-separated list of flag names.

use bitflags::bitflags;

bitflags! {
    /// NVMe state enable bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NvmeState: u8 {
        /// Controller enable
        const CONTROLLER = 1 << 0;
        /// Power rail enable
        const POWER      = 1 << 1;
    }
}

bitflags! {
    /// PCI port state enable bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PciPortState: u8 {
        /// PCIe link enable
        const LINK  = 1 << 0;
        /// Port power enable
        const POWER = 1 << 1;
    }
}

impl Default for NvmeState {
    fn default() -> Self {
        NvmeState::empty()
    }
}

impl Default for PciPortState {
    fn default() -> Self {
        PciPortState::empty()
    }
}

impl NvmeState {
    /// Split into the two booleans the controller action takes
    pub fn as_pair(self) -> (bool, bool) {
        (self.contains(Self::CONTROLLER), self.contains(Self::POWER))
    }
}

impl PciPortState {
    /// Split into the two booleans the controller action takes
    pub fn as_pair(self) -> (bool, bool) {
        (self.contains(Self::LINK), self.contains(Self::POWER))
    }
}

/// Parse a state string into a flag set
///
/// Accepts `on` (all flags), `off` (no flags), or a comma-separated list of
/// flag names (case-insensitive), e.g. `link,power`.
pub fn parse_state<F>(s: &str) -> Result<F, String>
where
    F: bitflags::Flags,
{
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "on" | "1" => return Ok(F::all()),
        "off" | "0" => return Ok(F::empty()),
        _ => {}
    }

    let mut flags = F::empty();
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let flag = F::from_name(&name.to_ascii_uppercase())
            .ok_or_else(|| format!("Unknown state flag: {}", name))?;
        flags.insert(flag);
    }
    Ok(flags)
}
