//! Static port configuration, applied when a port is created.

use heapless::Vec;

use crate::PowerRole;

/// Power role behaviour of the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoleMode {
    /// Source only.
    Source,
    /// Sink only.
    Sink,
    /// Dual role, resolved at attach.
    Drp,
}

/// One advertised source capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceCapability {
    /// Supply voltage in millivolts.
    pub voltage_mv: u16,
    /// Maximum current in milliamperes.
    pub max_current_ma: u16,
}

/// PD capability flags advertised in source capabilities.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapabilityFlags {
    /// The port supports power role swap.
    pub dual_role_power: bool,
    /// The port supports data role swap.
    pub data_role_swap: bool,
    /// The port has an external power source.
    pub externally_powered: bool,
    /// USB suspend is supported while sourcing.
    pub usb_suspend_supported: bool,
    /// The port is USB communications capable.
    pub usb_communications_capable: bool,
    /// Peak current class, [Table 6.10].
    pub peak_current: u8,
}

/// Voltage and current limits of a downstream charge IC.
///
/// When present, sink capability evaluation prefers the highest-indexed
/// partner capability that stays within these limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargeLimit {
    /// Maximum input voltage in millivolts.
    pub max_voltage_mv: u16,
    /// Maximum input current in milliamperes.
    pub max_current_ma: u16,
}

/// Static configuration of one port.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Power role behaviour.
    pub role: RoleMode,
    /// Preferred role to try first when attaching as a dual-role port.
    pub try_role: Option<PowerRole>,
    /// Source capabilities advertised while sourcing. At most 7 entries.
    pub source_caps: Vec<SourceCapability, 7>,
    /// PD capability flags.
    pub flags: CapabilityFlags,
    /// The port can source VCONN.
    pub vconn_supported: bool,
    /// Optional charge IC limits for sink capability selection.
    pub charge_limit: Option<ChargeLimit>,
}

impl Default for PortConfig {
    fn default() -> Self {
        let mut source_caps = Vec::new();
        // 5 V at 1.5 A
        let _ = source_caps.push(SourceCapability {
            voltage_mv: 5000,
            max_current_ma: 1500,
        });

        Self {
            role: RoleMode::Drp,
            try_role: None,
            source_caps,
            flags: CapabilityFlags {
                dual_role_power: true,
                data_role_swap: true,
                externally_powered: true,
                ..Default::default()
            },
            vconn_supported: true,
            charge_limit: None,
        }
    }
}
