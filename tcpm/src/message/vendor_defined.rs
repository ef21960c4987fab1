//! Vendor-defined messages and the DisplayPort alternate mode objects.
//!
//! See [6.4.4], and the VESA DisplayPort Alt Mode standard for the
//! DisplayPort VDO layouts.
use proc_bitfield::bitfield;

/// The PD standard ID, used for the discovery commands.
pub const PD_SID: u16 = 0xff00;

/// The DisplayPort alternate mode standard ID.
pub const DP_SID: u16 = 0xff01;

/// Structured VDM command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmCommandType {
    /// Request from the initiator.
    Initiator,
    /// Responder acknowledges.
    Ack,
    /// Responder refuses.
    Nack,
    /// Responder is busy.
    Busy,
}

impl From<VdmCommandType> for u8 {
    fn from(value: VdmCommandType) -> Self {
        match value {
            VdmCommandType::Initiator => 0,
            VdmCommandType::Ack => 1,
            VdmCommandType::Nack => 2,
            VdmCommandType::Busy => 3,
        }
    }
}

impl From<u8> for VdmCommandType {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => VdmCommandType::Initiator,
            1 => VdmCommandType::Ack,
            2 => VdmCommandType::Nack,
            _ => VdmCommandType::Busy,
        }
    }
}

/// Structured VDM commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmCommand {
    /// Discover the partner identity.
    DiscoverIdentity,
    /// Discover supported standard or vendor IDs.
    DiscoverSvids,
    /// Discover the modes of one SVID.
    DiscoverModes,
    /// Enter a mode.
    EnterMode,
    /// Exit a mode.
    ExitMode,
    /// Unsolicited status notification.
    Attention,
    /// DisplayPort status update.
    DisplayPortStatus,
    /// DisplayPort configuration.
    DisplayPortConfig,
    /// Unknown command value.
    Unknown,
}

impl From<VdmCommand> for u8 {
    fn from(value: VdmCommand) -> Self {
        match value {
            VdmCommand::DiscoverIdentity => 0x01,
            VdmCommand::DiscoverSvids => 0x02,
            VdmCommand::DiscoverModes => 0x03,
            VdmCommand::EnterMode => 0x04,
            VdmCommand::ExitMode => 0x05,
            VdmCommand::Attention => 0x06,
            VdmCommand::DisplayPortStatus => 0x10,
            VdmCommand::DisplayPortConfig => 0x11,
            VdmCommand::Unknown => 0x1f,
        }
    }
}

impl From<u8> for VdmCommand {
    fn from(value: u8) -> Self {
        match value {
            0x01 => VdmCommand::DiscoverIdentity,
            0x02 => VdmCommand::DiscoverSvids,
            0x03 => VdmCommand::DiscoverModes,
            0x04 => VdmCommand::EnterMode,
            0x05 => VdmCommand::ExitMode,
            0x06 => VdmCommand::Attention,
            0x10 => VdmCommand::DisplayPortStatus,
            0x11 => VdmCommand::DisplayPortConfig,
            _ => VdmCommand::Unknown,
        }
    }
}

bitfield! {
    /// The header object of a structured VDM.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct VdmHeader(pub u32): Debug, FromStorage, IntoStorage {
        /// VDM standard or vendor ID
        pub standard_or_vid: u16 @ 16..=31,
        /// VDM type (false -> unstructured, true -> structured)
        pub structured: bool @ 15,
        /// Object position, for mode entry and exit
        pub object_position: u8 @ 8..=10,
        /// Command type
        pub command_type: u8 [get VdmCommandType, set VdmCommandType] @ 6..=7,
        /// Command
        pub command: u8 [get VdmCommand, set VdmCommand] @ 0..=4,
    }
}

impl VdmHeader {
    /// Create a structured VDM header for an initiator request.
    pub fn new_request(svid: u16, command: VdmCommand) -> Self {
        Self(0)
            .with_structured(true)
            .with_standard_or_vid(svid)
            .with_command_type(VdmCommandType::Initiator)
            .with_command(command)
    }
}

bitfield! {
    /// The identity header VDO of a Discover Identity response.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct IdentityHeader(pub u32): Debug, FromStorage, IntoStorage {
        /// Host data capable
        pub host_data: bool @ 31,
        /// Device data capable
        pub device_data: bool @ 30,
        /// Product type
        pub product_type: u8 @ 27..=29,
        /// Modal operation supported
        pub modal_supported: bool @ 26,
        /// VID
        pub vid: u16 @ 0..=15,
    }
}

/// DisplayPort pin assignment bits, as used in the capability and
/// configuration VDOs.
///
///  NAME | SIGNALING | OUTPUT TYPE | MULTI-FUNCTION
/// ------------------------------------------------
///  A    |  USB G2   |  ?          | no
///  B    |  USB G2   |  ?          | yes
///  C    |  DP       |  CONVERTED  | no
///  D    |  DP       |  CONVERTED  | yes
///  E    |  DP       |  DP         | no
///  F    |  DP       |  DP         | yes
pub mod pin {
    /// Pin assignment A.
    pub const A: u8 = 1 << 0;
    /// Pin assignment B.
    pub const B: u8 = 1 << 1;
    /// Pin assignment C.
    pub const C: u8 = 1 << 2;
    /// Pin assignment D.
    pub const D: u8 = 1 << 3;
    /// Pin assignment E.
    pub const E: u8 = 1 << 4;
    /// Pin assignment F.
    pub const F: u8 = 1 << 5;

    /// Assignments that carry USB alongside DisplayPort.
    pub const MULTI_FUNCTION_MASK: u8 = B | D | F;
    /// Assignments that carry DisplayPort signaling.
    pub const DP_MASK: u8 = C | D | E | F;
    /// Assignments that carry USB Gen 2 signaling.
    pub const BR2_MASK: u8 = A | B;
}

bitfield! {
    /// The DisplayPort capabilities mode VDO.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct DisplayPortCapabilities(pub u32): Debug, FromStorage, IntoStorage {
        /// UFP_D pin assignments supported
        pub ufp_d_pin_assignments: u8 @ 16..=23,
        /// DFP_D pin assignments supported
        pub dfp_d_pin_assignments: u8 @ 8..=15,
        /// USB r2.0 signaling not used
        pub usb20_signaling_not_used: bool @ 7,
        /// Receptacle indication (false -> plug, true -> receptacle)
        pub receptacle_indication: bool @ 6,
        /// Signaling for transport of DisplayPort protocol
        pub signaling_rate: u8 @ 2..=5,
        /// Port capability
        pub capability: u8 @ 0..=1,
    }
}

impl DisplayPortCapabilities {
    /// Pin assignments the partner supports in its UFP_D role, respecting
    /// the receptacle indication.
    pub fn partner_pin_assignments(&self) -> u8 {
        if self.receptacle_indication() {
            self.ufp_d_pin_assignments()
        } else {
            self.dfp_d_pin_assignments()
        }
    }

    /// Whether the partner drives USB Gen 2 signaling.
    pub fn supports_gen2(&self) -> bool {
        self.signaling_rate() & 0b10 != 0
    }
}

bitfield! {
    /// The DisplayPort status VDO.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct DisplayPortStatus(pub u32): Debug, FromStorage, IntoStorage {
        /// IRQ_HPD pulse seen since the last status message
        pub irq_hpd: bool @ 8,
        /// Level of the HPD line
        pub hpd_state: bool @ 7,
        /// Request to exit DisplayPort mode
        pub exit_dp_mode_request: bool @ 6,
        /// Request to switch to USB configuration
        pub usb_config_request: bool @ 5,
        /// Multi-function preferred
        pub multi_function_preferred: bool @ 4,
        /// DisplayPort output enabled
        pub enabled: bool @ 3,
        /// Adapter is in a low-power state
        pub power_low: bool @ 2,
        /// DFP_D/UFP_D connection state
        pub connection: u8 @ 0..=1,
    }
}

bitfield! {
    /// The DisplayPort configuration VDO.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct DisplayPortConfig(pub u32): Debug, FromStorage, IntoStorage {
        /// Configured pin assignment
        pub pin_assignment: u8 @ 8..=15,
        /// Signaling for transport of DisplayPort protocol
        pub signaling: u8 @ 2..=5,
        /// Configuration selection (0 -> USB, 1 -> DFP_D, 2 -> UFP_D)
        pub select_configuration: u8 @ 0..=1,
    }
}

/// Select the pin assignment to configure on the partner.
///
/// Masks the partner's advertised assignments against its multi-function
/// preference and the advertised signaling family. When the converted
/// assignments C/D remain legal, they take precedence over E/F for a USB-C
/// receptacle. Of the surviving assignments, the highest-numbered one is
/// configured. Returns `None` when no assignment survives.
pub fn select_pin_assignment(
    capabilities: DisplayPortCapabilities,
    status: DisplayPortStatus,
) -> Option<u8> {
    let mut pins = capabilities.partner_pin_assignments();

    if !status.multi_function_preferred() {
        pins &= !pin::MULTI_FUNCTION_MASK;
    }

    if capabilities.supports_gen2() {
        pins &= !pin::DP_MASK;
    } else {
        pins &= !pin::BR2_MASK;
    }

    if pins & (pin::C | pin::D) != 0 {
        pins &= !(pin::E | pin::F);
    }

    if pins == 0 {
        None
    } else {
        Some(1 << (7 - pins.leading_zeros() as u8))
    }
}
