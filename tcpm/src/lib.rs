//! USB Type-C and Power Delivery port management.
//!
//! This crate implements the parts of a Type-C port controller that are
//! independent of any particular CC transceiver chip: attach detection and
//! debounce, role resolution (including Try.SRC/Try.SNK), the PD policy
//! engine for both power roles, role swap flows, and an automatic
//! Vendor-Defined-Message sequencer that negotiates DisplayPort alternate
//! mode on downstream-facing ports.
//!
//! The hardware is driven through the [`tcpm_traits::Transceiver`] trait,
//! timeouts through [`timers::Timer`]. Observable state is published through
//! [`policy_engine::NotificationSink`]; protocol failures never surface as
//! errors, only as state transitions.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

#[macro_use]
mod fmt;

pub mod config;
pub mod counters;
pub mod message;
pub mod policy_engine;
pub mod timers;

#[cfg(test)]
pub mod dummy;

/// Power role of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRole {
    /// The port sources power.
    Source,
    /// The port sinks power.
    #[default]
    Sink,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Sink,
            true => Self::Source,
        }
    }
}

impl From<PowerRole> for bool {
    fn from(role: PowerRole) -> bool {
        match role {
            PowerRole::Sink => false,
            PowerRole::Source => true,
        }
    }
}

/// Data role of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRole {
    /// Upstream-facing port (device side).
    #[default]
    Ufp,
    /// Downstream-facing port (host side).
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Ufp,
            true => Self::Dfp,
        }
    }
}

impl From<DataRole> for bool {
    fn from(role: DataRole) -> bool {
        match role {
            DataRole::Ufp => false,
            DataRole::Dfp => true,
        }
    }
}

/// Orientation of the attached plug.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Orientation {
    /// Not attached.
    #[default]
    None,
    /// Partner communicates on CC1.
    Cc1,
    /// Partner communicates on CC2.
    Cc2,
}

impl From<tcpm_traits::Polarity> for Orientation {
    fn from(polarity: tcpm_traits::Polarity) -> Self {
        match polarity {
            tcpm_traits::Polarity::Cc1 => Self::Cc1,
            tcpm_traits::Polarity::Cc2 => Self::Cc2,
        }
    }
}
