//! USB Type-C port management library traits.
//!
//! Provides a transceiver trait that allows to add support for various CC PHYs.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

use bitflags::bitflags;

/// Voltage classification of a single CC line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcLevel {
    /// No termination detected.
    #[default]
    Open,
    /// Accessory (Ra) termination.
    Ra,
    /// Sink (Rd) pull-down.
    Rd,
    /// Source (Rp) pull-up.
    Rp,
}

/// Termination that the transceiver presents on the CC lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcPull {
    /// Present Rp, as a source.
    Up,
    /// Present Rd, as a sink.
    Down,
    /// Alternate between Rp and Rd for dual-role partner detection.
    Toggle,
}

/// Termination to present while sampling the CC lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoleHint {
    /// Measure with Rp presented, looking for a sink or accessory.
    Source,
    /// Measure with Rd presented, looking for a source.
    Sink,
}

/// The CC line on which the port partner communicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// BMC signaling on CC1.
    #[default]
    Cc1,
    /// BMC signaling on CC2.
    Cc2,
}

bitflags! {
    /// Pending transceiver events, read and cleared in one operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Alert: u8 {
        /// A CC line changed, or partner detection finished.
        const CC_CHANGE = 1 << 0;
        /// A message is waiting in the receive FIFO.
        const RX_READY = 1 << 1;
        /// The last queued transmission was acknowledged with GoodCRC.
        const TX_DONE = 1 << 2;
        /// The last queued transmission exhausted its hardware retries.
        const TX_RETRY_FAILED = 1 << 3;
        /// Hard Reset signaling was received.
        const HARD_RESET_RECEIVED = 1 << 4;
    }
}

/// Transceiver trait, through which the policy engine talks to the CC PHY.
///
/// All operations are synchronous register-level commands. Long-running
/// operations (transmission, partner detection) complete through [`Alert`]
/// bits, surfaced by [`Transceiver::read_alert`] when the port is polled.
///
/// The transceiver is expected to acknowledge received messages with GoodCRC
/// autonomously, and to retry transmissions until the spec-mandated retry
/// count is exhausted.
pub trait Transceiver {
    /// Sample the voltage class on both CC lines, measuring with the
    /// termination that `role` implies.
    fn sample_cc(&mut self, role: RoleHint) -> (CcLevel, CcLevel);

    /// Present a termination on the CC lines.
    fn set_pull(&mut self, pull: CcPull);

    /// Select the CC line used for BMC signaling.
    fn set_polarity(&mut self, polarity: Polarity);

    /// Enable or disable reception of PD messages.
    fn enable_rx(&mut self, enable: bool);

    /// Queue a PD message for transmission.
    ///
    /// Completion is signaled through [`Alert::TX_DONE`] or
    /// [`Alert::TX_RETRY_FAILED`].
    fn transmit(&mut self, data: &[u8]);

    /// Transmit Hard Reset signaling.
    fn transmit_hard_reset(&mut self);

    /// Fetch the next received message into `buffer`.
    ///
    /// Returns the message length, or `None` once the FIFO is drained.
    fn receive(&mut self, buffer: &mut [u8]) -> Option<usize>;

    /// Drive or release VBUS.
    fn set_vbus(&mut self, enable: bool);

    /// Check whether VBUS is at a valid level.
    fn vbus_present(&mut self) -> bool;

    /// Source or cut VCONN on the unused CC line.
    fn set_vconn(&mut self, enable: bool);

    /// Reset the PD logic of the PHY to its power-on state.
    fn phy_reset(&mut self);

    /// Read and clear the pending alerts.
    fn read_alert(&mut self) -> Alert;
}
