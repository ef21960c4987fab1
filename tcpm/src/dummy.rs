//! Implements a dummy transceiver, timer backend and notification sink for
//! testing.
use std::vec::Vec;

use tcpm_traits::{Alert, CcLevel, CcPull, Polarity, RoleHint, Transceiver};

use crate::policy_engine::{Notification, NotificationSink};
use crate::timers::{Timer, TimerId};

/// A dummy transceiver for testing.
///
/// Messages are injected into and probed from plain queues; alerts are
/// raised explicitly by the test.
pub struct DummyPhy {
    rx_queue: Vec<Vec<u8>>,
    tx_queue: Vec<Vec<u8>>,
    alert: Alert,

    /// CC levels reported when sampling with source terminations.
    pub cc_as_source: (CcLevel, CcLevel),
    /// CC levels reported when sampling with sink terminations.
    pub cc_as_sink: (CcLevel, CcLevel),
    /// VBUS level as seen by the port.
    pub vbus: bool,

    /// Last VBUS drive command.
    pub vbus_driven: bool,
    /// Last VCONN command.
    pub vconn: bool,
    /// Last termination command.
    pub pull: Option<CcPull>,
    /// Last polarity command.
    pub polarity: Option<Polarity>,
    /// Last receive-enable command.
    pub rx_enabled: bool,
    /// Number of hard reset ordered sets sent.
    pub hard_resets_sent: usize,
    /// Number of PHY resets.
    pub phy_resets: usize,
}

impl DummyPhy {
    /// Create a new dummy transceiver with open CC lines.
    pub fn new() -> Self {
        Self {
            rx_queue: Vec::new(),
            tx_queue: Vec::new(),
            alert: Alert::empty(),
            cc_as_source: (CcLevel::Open, CcLevel::Open),
            cc_as_sink: (CcLevel::Open, CcLevel::Open),
            vbus: false,
            vbus_driven: false,
            vconn: false,
            pull: None,
            polarity: None,
            rx_enabled: false,
            hard_resets_sent: 0,
            phy_resets: 0,
        }
    }

    /// Inject received data and raise the receive alert.
    pub fn inject_received_data(&mut self, data: &[u8]) {
        self.rx_queue.push(data.to_vec());
        self.alert.insert(Alert::RX_READY);
    }

    /// Probe data that was transmitted by the stack.
    pub fn probe_transmitted_data(&mut self) -> Vec<u8> {
        self.tx_queue.remove(0)
    }

    /// Whether transmitted data is waiting to be probed.
    pub fn has_transmitted_data(&self) -> bool {
        !self.tx_queue.is_empty()
    }

    /// Signal that the pending transmission was acknowledged.
    pub fn complete_transmit(&mut self) {
        self.alert.insert(Alert::TX_DONE);
    }

    /// Signal that the pending transmission exhausted its retries.
    pub fn fail_transmit(&mut self) {
        self.alert.insert(Alert::TX_RETRY_FAILED);
    }

    /// Signal a CC line change.
    pub fn raise_cc_change(&mut self) {
        self.alert.insert(Alert::CC_CHANGE);
    }

    /// Signal inbound hard reset signaling.
    pub fn raise_hard_reset(&mut self) {
        self.alert.insert(Alert::HARD_RESET_RECEIVED);
    }
}

impl Transceiver for DummyPhy {
    fn sample_cc(&mut self, role: RoleHint) -> (CcLevel, CcLevel) {
        match role {
            RoleHint::Source => self.cc_as_source,
            RoleHint::Sink => self.cc_as_sink,
        }
    }

    fn set_pull(&mut self, pull: CcPull) {
        self.pull = Some(pull);
    }

    fn set_polarity(&mut self, polarity: Polarity) {
        self.polarity = Some(polarity);
    }

    fn enable_rx(&mut self, enable: bool) {
        self.rx_enabled = enable;
    }

    fn transmit(&mut self, data: &[u8]) {
        self.tx_queue.push(data.to_vec());
    }

    fn transmit_hard_reset(&mut self) {
        self.hard_resets_sent += 1;
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Option<usize> {
        if self.rx_queue.is_empty() {
            return None;
        }

        let data = self.rx_queue.remove(0);
        buffer[..data.len()].copy_from_slice(&data);
        Some(data.len())
    }

    fn set_vbus(&mut self, enable: bool) {
        self.vbus_driven = enable;
    }

    fn vbus_present(&mut self) -> bool {
        self.vbus
    }

    fn set_vconn(&mut self, enable: bool) {
        self.vconn = enable;
    }

    fn phy_reset(&mut self) {
        self.phy_resets += 1;
    }

    fn read_alert(&mut self) -> Alert {
        let alert = self.alert;
        self.alert = Alert::empty();
        alert
    }
}

/// A dummy timer backend.
///
/// Timers never expire by themselves; tests force expiry explicitly.
pub struct DummyTimers {
    armed: [Option<u32>; 2],
    expired: [bool; 2],
}

impl DummyTimers {
    /// Create a new dummy timer backend.
    pub fn new() -> Self {
        Self {
            armed: [None; 2],
            expired: [false; 2],
        }
    }

    fn index(id: TimerId) -> usize {
        match id {
            TimerId::State => 0,
            TimerId::Mux => 1,
        }
    }

    /// Force a timer to expire.
    pub fn expire(&mut self, id: TimerId) {
        let index = Self::index(id);
        self.armed[index] = None;
        self.expired[index] = true;
    }

    /// The pending duration of a timer, if armed.
    pub fn armed(&self, id: TimerId) -> Option<u32> {
        self.armed[Self::index(id)]
    }
}

impl Timer for DummyTimers {
    fn arm(&mut self, id: TimerId, duration_ms: u32) {
        let index = Self::index(id);
        self.armed[index] = Some(duration_ms);
        self.expired[index] = false;
    }

    fn disarm(&mut self, id: TimerId) {
        let index = Self::index(id);
        self.armed[index] = None;
        self.expired[index] = false;
    }

    fn take_expired(&mut self, id: TimerId) -> bool {
        let index = Self::index(id);
        let expired = self.expired[index];
        self.expired[index] = false;
        expired
    }
}

/// A notification sink that records every emitted snapshot.
pub struct DummySink {
    /// All snapshots, in emission order.
    pub notifications: Vec<Notification>,
}

impl DummySink {
    /// Create a new recording sink.
    pub fn new() -> Self {
        Self {
            notifications: Vec::new(),
        }
    }

    /// The most recent snapshot.
    pub fn last(&self) -> Option<&Notification> {
        self.notifications.last()
    }
}

impl NotificationSink for DummySink {
    fn notify(&mut self, notification: &Notification) {
        self.notifications.push(*notification);
    }
}

#[cfg(test)]
mod tests {
    use tcpm_traits::Transceiver;

    use super::DummyPhy;

    #[test]
    fn receive_is_ordered() {
        let mut phy = DummyPhy::new();

        let mut injected_data = [0u8; 30];
        injected_data[0] = 123;
        phy.inject_received_data(&injected_data);

        injected_data[1] = 255;
        phy.inject_received_data(&injected_data);

        let mut buf = [0u8; 30];
        phy.receive(&mut buf).unwrap();
        assert_eq!(buf[0], 123);
        assert_eq!(buf[1], 0);

        let mut buf = [0u8; 30];
        phy.receive(&mut buf).unwrap();
        assert_eq!(buf[0], 123);
        assert_eq!(buf[1], 255);

        assert!(phy.receive(&mut buf).is_none());
    }
}
