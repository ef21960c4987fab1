//! Power data objects and request data objects.
//!
//! See [6.4.1].
use proc_bitfield::bitfield;

/// A power data object from a capabilities message.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDataObject {
    /// Fixed voltage supply.
    FixedSupply(FixedSupply),
    /// Battery supply.
    Battery(Battery),
    /// Variable voltage supply.
    VariableSupply(VariableSupply),
    /// Unknown kind of power data object.
    Unknown(RawPowerDataObject),
}

impl From<u32> for PowerDataObject {
    fn from(value: u32) -> Self {
        match RawPowerDataObject(value).kind() {
            0b00 => PowerDataObject::FixedSupply(FixedSupply(value)),
            0b01 => PowerDataObject::Battery(Battery(value)),
            0b10 => PowerDataObject::VariableSupply(VariableSupply(value)),
            _ => PowerDataObject::Unknown(RawPowerDataObject(value)),
        }
    }
}

impl PowerDataObject {
    /// The supply voltage in millivolts.
    ///
    /// For battery and variable supplies, this is the minimum voltage.
    pub fn voltage_mv(&self) -> Option<u32> {
        match self {
            PowerDataObject::FixedSupply(supply) => Some(supply.voltage_mv()),
            PowerDataObject::Battery(supply) => Some(u32::from(supply.raw_min_voltage()) * 50),
            PowerDataObject::VariableSupply(supply) => Some(u32::from(supply.raw_min_voltage()) * 50),
            PowerDataObject::Unknown(_) => None,
        }
    }

    /// The maximum current in milliamperes, where the supply reports one.
    pub fn max_current_ma(&self) -> Option<u32> {
        match self {
            PowerDataObject::FixedSupply(supply) => Some(supply.max_current_ma()),
            PowerDataObject::VariableSupply(supply) => Some(u32::from(supply.raw_max_current()) * 10),
            _ => None,
        }
    }
}

bitfield! {
    /// A raw power data object.
    ///
    /// Used as a fallback for unknown supply kinds.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct RawPowerDataObject(pub u32): Debug, FromStorage, IntoStorage {
        /// The kind of power data object.
        pub kind: u8 @ 30..=31,
    }
}

bitfield! {
    /// A fixed voltage supply PDO.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Fixed supply
        pub kind: u8 @ 30..=31,
        /// Dual-role power
        pub dual_role_power: bool @ 29,
        /// USB suspend supported
        pub usb_suspend_supported: bool @ 28,
        /// Unconstrained power
        pub unconstrained_power: bool @ 27,
        /// USB communications capable
        pub usb_communications_capable: bool @ 26,
        /// Dual-role data
        pub dual_role_data: bool @ 25,
        /// Peak current
        pub peak_current: u8 @ 20..=21,
        /// Voltage in 50 mV units
        pub raw_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

#[allow(clippy::derivable_impls)]
impl Default for FixedSupply {
    fn default() -> Self {
        Self(0)
    }
}

impl FixedSupply {
    /// The supply voltage in millivolts.
    pub fn voltage_mv(&self) -> u32 {
        u32::from(self.raw_voltage()) * 50
    }

    /// The maximum current in milliamperes.
    pub fn max_current_ma(&self) -> u32 {
        u32::from(self.raw_max_current()) * 10
    }
}

bitfield! {
    /// A battery supply PDO.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Battery(pub u32): Debug, FromStorage, IntoStorage {
        /// Battery supply
        pub kind: u8 @ 30..=31,
        /// Maximum voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum allowable power in 250 mW units
        pub raw_max_power: u16 @ 0..=9,
    }
}

bitfield! {
    /// A variable voltage supply PDO.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct VariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Variable supply
        pub kind: u8 @ 30..=31,
        /// Maximum voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

bitfield! {
    /// A request data object for fixed and variable supplies.
    ///
    /// See [6.4.2].
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FixedVariableRequest(pub u32): Debug, FromStorage, IntoStorage {
        /// Valid range 1..=7
        pub object_position: u8 @ 28..=31,
        /// GiveBack support
        pub giveback_flag: bool @ 27,
        /// Capability mismatch
        pub capability_mismatch: bool @ 26,
        /// USB communications capable
        pub usb_communications_capable: bool @ 25,
        /// No USB Suspend
        pub no_usb_suspend: bool @ 24,
        /// Operating current in 10 mA units
        pub raw_operating_current: u16 @ 10..=19,
        /// Maximum operating current in 10 mA units
        pub raw_max_operating_current: u16 @ 0..=9,
    }
}

#[allow(clippy::derivable_impls)]
impl Default for FixedVariableRequest {
    fn default() -> Self {
        Self(0)
    }
}
