//! The policy engine: attach detection, PD negotiation, role swaps and
//! alternate mode entry.
//!
//! One [`Port`] owns all mutable protocol state of a physical connector. The
//! machine advances only inside [`Port::poll`], which merges transceiver
//! alerts, timer expiries and internal continue flags into one event word per
//! dispatch and runs the handler of the current state. Handlers never block;
//! waiting is expressed through the two port timers.

mod sink;
mod source;
mod swap;
mod typec;
mod vdm;

#[cfg(test)]
mod tests;

use bitflags::bitflags;
use heapless::Vec;
use tcpm_traits::{Alert, CcLevel, CcPull, Polarity, RoleHint, Transceiver};

use crate::config::{PortConfig, RoleMode};
use crate::counters::{Counter, CounterType};
use crate::message::header::{ControlMessageType, DataMessageType, Header};
use crate::message::vendor_defined::{pin, DisplayPortCapabilities, DisplayPortStatus};
use crate::message::{Message, MAX_MESSAGE_SIZE, MAX_OBJECTS};
use crate::timers::{Timeout, Timer, TimerId};
use crate::{DataRole, Orientation, PowerRole};

pub(crate) use vdm::VdmState;

/// Consecutive equal CC samples required to accept a connection as stable.
const DEBOUNCE_COUNT: u8 = 10;

/// Bound on synchronous re-dispatch within one call to [`Port::poll`].
const MAX_DISPATCH_LOOPS: usize = 32;

bitflags! {
    /// Events that drive one dispatch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct Events: u32 {
        /// A CC line or partner detection change.
        const CC_CHANGE = 1 << 0;
        /// A message was received.
        const RX = 1 << 1;
        /// The pending transmission completed, in success or failure.
        const TX = 1 << 2;
        /// The state timer expired.
        const TIMER_STATE = 1 << 3;
        /// The mux timer expired.
        const TIMER_MUX = 1 << 4;
        /// Hard Reset signaling was received.
        const RESET_RECEIVED = 1 << 5;
        /// A handler requested an immediate re-dispatch.
        const CONTINUE = 1 << 6;
        /// A CC change was deferred during a swap sequence.
        const DELAYED_CC = 1 << 7;

        /// Events that can resolve a pending send-and-await sub-state.
        const RESPONSE = Self::RX.bits() | Self::TIMER_STATE.bits() | Self::TIMER_MUX.bits();
    }
}

/// Progress of the transmission that is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TxState {
    /// A message is queued but not yet handed to the transceiver.
    Idle,
    /// Waiting for the transmission result.
    Busy,
    /// The transmission failed after all hardware retries.
    Failed,
    /// The transmission was acknowledged.
    Success,
}

/// The role this port resolved to at attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum AttachRole {
    /// Attached as a source (partner presents Rd).
    Source,
    /// Attached as a sink (partner presents Rp).
    #[default]
    Sink,
    /// An audio accessory (Ra on both lines).
    Accessory,
}

/// Top-level connection state.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    // Type-C attach resolution.
    Disabled,
    ErrorRecovery,
    Unattached,
    AttachWaitSink,
    AttachWaitSource,
    AttachWaitAccessory,
    AttachedSink,
    AttachedSource,
    AttachedAccessory,
    AttachTrySource,
    AttachTrySink,

    // Source policy engine.
    SourceStartup,
    SourceDiscovery,
    SourceSendCapabilities,
    SourceNegotiateCapability,
    SourceTransitionSupply,
    SourceCapabilityResponse,
    SourceTransitionDefault,
    SourceReady,
    SourceGetSinkCaps,
    SourceSendHardReset,
    SourceSendSoftReset,
    SourceSoftReset,

    // Sink policy engine.
    SinkStartup,
    SinkDiscovery,
    SinkWaitCapabilities,
    SinkEvaluateCapabilities,
    SinkSelectCapability,
    SinkTransitionSink,
    SinkTransitionDefault,
    SinkReady,
    SinkSendHardReset,
    SinkSendSoftReset,
    SinkSoftReset,

    // Power role swap.
    PrSwapSourceEvaluate,
    PrSwapSinkEvaluate,
    PrSwapSourceAccept,
    PrSwapSinkAccept,
    PrSwapSourceReject,
    PrSwapSinkReject,
    PrSwapSourceSendSwap,
    PrSwapSinkSendSwap,
    PrSwapSourceTransitionOff,
    PrSwapSourceAssertRd,
    PrSwapSourceOff,
    PrSwapSinkTransitionOff,
    PrSwapSinkAssertRp,
    PrSwapSinkSourceOn,

    // VCONN swap.
    VconnSwapUfpEvaluate,
    VconnSwapUfpAccept,
    VconnSwapUfpReject,
    VconnSwapUfpWaitForVconn,
    VconnSwapDfpWaitForVconn,
    VconnSwapUfpTurnOnVconn,
    VconnSwapDfpTurnOnVconn,
    VconnSwapUfpTurnOffVconn,
    VconnSwapDfpTurnOffVconn,
    VconnSwapUfpSendPsRdy,
    VconnSwapDfpSendPsRdy,
    VconnSwapDfpSendSwap,

    // Data role swap.
    DrSwapUfpEvaluate,
    DrSwapDfpEvaluate,
    DrSwapUfpAccept,
    DrSwapDfpAccept,
    DrSwapUfpReject,
    DrSwapDfpReject,
    DrSwapUfpChange,
    DrSwapDfpChange,
    DrSwapUfpSendSwap,
    DrSwapDfpSendSwap,
}

/// Observable facts about one port, pushed to the [`NotificationSink`]
/// whenever any field changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Notification {
    /// Present power role.
    pub power_role: PowerRole,
    /// Present data role.
    pub data_role: DataRole,
    /// A partner is attached.
    pub cc_connected: bool,
    /// An explicit PD contract is in place.
    pub pd_connected: bool,
    /// Plug orientation.
    pub orientation: Orientation,
    /// DisplayPort alternate mode is configured.
    pub alt_mode_entered: bool,
    /// Pin assignments the partner advertised.
    pub pin_assignment_support: u8,
    /// The configured pin assignment, zero if none.
    pub pin_assignment: u8,
    /// The partner's DisplayPort mode capabilities.
    pub dp_capabilities: DisplayPortCapabilities,
    /// The partner's last DisplayPort status.
    pub dp_status: DisplayPortStatus,
    /// An Attention message arrived. One-shot: cleared after emission.
    pub attention: bool,
    /// Negotiated supply voltage in millivolts, zero without a contract.
    pub voltage_mv: u32,
    /// Negotiated supply current in milliamperes, zero without a contract.
    pub current_ma: u32,
}

impl Notification {
    /// Whether the configured pin assignment carries USB alongside
    /// DisplayPort.
    pub fn multi_function(&self) -> bool {
        self.pin_assignment & pin::MULTI_FUNCTION_MASK != 0
    }

    /// Level of the partner's HPD line.
    pub fn hpd_level(&self) -> bool {
        self.dp_status.hpd_state()
    }

    /// Whether the partner signaled an HPD interrupt.
    pub fn hpd_irq(&self) -> bool {
        self.dp_status.irq_hpd()
    }
}

/// Receives snapshots of observable port state.
pub trait NotificationSink {
    /// Called with the full snapshot whenever it changes.
    fn notify(&mut self, notification: &Notification);
}

/// The policy engine of one physical port.
pub struct Port<PHY: Transceiver, TIM: Timer, SINK: NotificationSink> {
    pub(crate) phy: PHY,
    pub(crate) timers: TIM,
    notifications: SINK,
    pub(crate) config: PortConfig,

    pub(crate) state: ConnectionState,
    pub(crate) sub_state: u8,
    pub(crate) scratch: u8,
    pub(crate) work_continue: Events,

    pub(crate) cc1: CcLevel,
    pub(crate) cc2: CcLevel,
    pub(crate) debounce_count: u8,
    pub(crate) polarity: Polarity,
    pub(crate) attach_role: AttachRole,
    pub(crate) try_role_complete: bool,
    pub(crate) vbus_at_attach: bool,
    pub(crate) pd_supported: bool,
    pub(crate) vconn_enabled: bool,

    pub(crate) notify: Notification,
    notify_last: Notification,

    pub(crate) msg_id: Counter,
    pub(crate) caps_counter: Counter,
    pub(crate) hard_reset_count: Counter,

    pub(crate) tx_state: TxState,
    pub(crate) rx_message: Message,
    pub(crate) tx_message: Message,

    pub(crate) partner_caps: Vec<u32, MAX_OBJECTS>,
    pub(crate) selected_capability: u8,

    pub(crate) vdm_state: VdmState,
    pub(crate) vdm_send_state: u8,
    pub(crate) vdm_id: u32,
    pub(crate) vdm_svids: Vec<u16, 12>,
}

impl<PHY: Transceiver, TIM: Timer, SINK: NotificationSink> Port<PHY, TIM, SINK> {
    /// Create a new port and prepare the transceiver for partner detection.
    pub fn new(phy: PHY, timers: TIM, notifications: SINK, config: PortConfig) -> Self {
        let mut port = Self {
            phy,
            timers,
            notifications,
            config,
            state: ConnectionState::Unattached,
            sub_state: 0,
            scratch: 0,
            work_continue: Events::empty(),
            cc1: CcLevel::Open,
            cc2: CcLevel::Open,
            debounce_count: 0,
            polarity: Polarity::Cc1,
            attach_role: AttachRole::default(),
            try_role_complete: false,
            vbus_at_attach: false,
            pd_supported: false,
            vconn_enabled: false,
            notify: Notification::default(),
            notify_last: Notification::default(),
            msg_id: Counter::new(CounterType::MessageId),
            caps_counter: Counter::new(CounterType::Caps),
            hard_reset_count: Counter::new(CounterType::HardReset),
            tx_state: TxState::Idle,
            rx_message: Message::default(),
            tx_message: Message::default(),
            partner_caps: Vec::new(),
            selected_capability: 0,
            vdm_state: VdmState::DiscoverIdentity,
            vdm_send_state: 0,
            vdm_id: 0,
            vdm_svids: Vec::new(),
        };

        port.phy.set_vbus(false);
        port.phy.set_vconn(false);
        port.phy.enable_rx(false);
        port.phy.set_pull(Self::pull_for(port.config.role));

        port
    }

    /// Advance the state machine.
    ///
    /// Call after the transceiver raised its interrupt line or a timer
    /// expired. The machine re-dispatches synchronously while handlers
    /// request continuation; calls for one port must not overlap, and the
    /// transceiver interrupt should stay masked for the duration.
    pub fn poll(&mut self) {
        for _ in 0..MAX_DISPATCH_LOOPS {
            let mut evt = Events::empty();
            self.collect_alerts(&mut evt);
            self.collect_soft_events(&mut evt);

            if evt.is_empty() {
                break;
            }

            self.dispatch(evt);
            self.push_notification();
        }
    }

    /// The current top-level state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// The current observable snapshot.
    pub fn notification(&self) -> &Notification {
        &self.notify
    }

    /// Initiate a power role swap. Takes effect at the next poll.
    ///
    /// Returns `false` unless the port is in a ready state.
    pub fn request_power_role_swap(&mut self) -> bool {
        match self.state {
            ConnectionState::SourceReady => self.set_state(ConnectionState::PrSwapSourceSendSwap),
            ConnectionState::SinkReady => self.set_state(ConnectionState::PrSwapSinkSendSwap),
            _ => return false,
        }
        true
    }

    /// Initiate a data role swap. Takes effect at the next poll.
    ///
    /// Returns `false` unless the port is in a ready state.
    pub fn request_data_role_swap(&mut self) -> bool {
        if !matches!(
            self.state,
            ConnectionState::SourceReady | ConnectionState::SinkReady
        ) {
            return false;
        }

        self.set_state(match self.notify.data_role {
            DataRole::Dfp => ConnectionState::DrSwapDfpSendSwap,
            DataRole::Ufp => ConnectionState::DrSwapUfpSendSwap,
        });
        true
    }

    /// Initiate a VCONN swap. Takes effect at the next poll.
    ///
    /// Only a DFP in a ready state initiates VCONN swaps.
    pub fn request_vconn_swap(&mut self) -> bool {
        if !matches!(
            self.state,
            ConnectionState::SourceReady | ConnectionState::SinkReady
        ) || self.notify.data_role != DataRole::Dfp
        {
            return false;
        }

        self.set_state(ConnectionState::VconnSwapDfpSendSwap);
        true
    }

    fn collect_alerts(&mut self, evt: &mut Events) {
        let alert = self.phy.read_alert();

        if alert.contains(Alert::CC_CHANGE) {
            evt.insert(Events::CC_CHANGE);
        }

        if alert.contains(Alert::RX_READY) {
            evt.insert(Events::RX);
        }

        if alert.contains(Alert::TX_DONE) {
            evt.insert(Events::TX);
            self.tx_state = TxState::Success;
        }

        if alert.contains(Alert::TX_RETRY_FAILED) {
            evt.insert(Events::TX);
            self.tx_state = TxState::Failed;
        }

        if alert.contains(Alert::HARD_RESET_RECEIVED) {
            self.phy.phy_reset();
            self.execute_partner_hard_reset();
            evt.insert(Events::RESET_RECEIVED);
        }
    }

    fn collect_soft_events(&mut self, evt: &mut Events) {
        if self.timers.take_expired(TimerId::Mux) {
            evt.insert(Events::TIMER_MUX);
        }

        if self.timers.take_expired(TimerId::State) {
            evt.insert(Events::TIMER_STATE);
        }

        let pending = self.work_continue;
        self.work_continue = Events::empty();
        evt.insert(pending);
    }

    /// Re-run device bring-up after the partner signaled Hard Reset.
    fn execute_partner_hard_reset(&mut self) {
        self.msg_id.reset();
        self.vdm_state = VdmState::DiscoverIdentity;

        self.set_state(match self.notify.power_role {
            PowerRole::Source => ConnectionState::SourceTransitionDefault,
            PowerRole::Sink => ConnectionState::SinkTransitionDefault,
        });
    }

    fn dispatch(&mut self, mut evt: Events) {
        if self.notify.cc_connected && evt.intersects(Events::CC_CHANGE | Events::DELAYED_CC) {
            self.try_detach();
        }

        if evt.contains(Events::RX) {
            if self.fetch_message() {
                if self.rx_message.is_control(ControlMessageType::SoftReset) {
                    self.set_state(match self.notify.power_role {
                        PowerRole::Source => ConnectionState::SourceSoftReset,
                        PowerRole::Sink => ConnectionState::SinkSoftReset,
                    });
                }
            } else {
                evt.remove(Events::RX);
            }
        }

        if evt.contains(Events::TX) && self.tx_state == TxState::Success {
            self.msg_id.advance();
        }

        self.run_state(evt);
    }

    fn run_state(&mut self, evt: Events) {
        use ConnectionState::*;

        match self.state {
            Disabled => {}
            ErrorRecovery => self.set_state_unattached(),
            Unattached => self.state_unattached(evt),
            AttachWaitSink => self.state_attach_wait_sink(evt),
            AttachWaitSource => self.state_attach_wait_source(evt),
            AttachWaitAccessory => self.state_attach_wait_accessory(evt),
            AttachedSink => self.state_attached_sink(evt),
            AttachedSource => self.state_attached_source(evt),
            AttachedAccessory => self.state_attached_accessory(evt),
            AttachTrySource => self.state_try_attach(evt, PowerRole::Source),
            AttachTrySink => self.state_try_attach(evt, PowerRole::Sink),

            SourceStartup => self.state_source_startup(evt),
            SourceDiscovery => self.state_source_discovery(evt),
            SourceSendCapabilities => self.state_source_send_capabilities(evt),
            SourceNegotiateCapability => self.state_source_negotiate_capability(evt),
            SourceTransitionSupply => self.state_source_transition_supply(evt),
            SourceCapabilityResponse => self.state_source_capability_response(evt),
            SourceTransitionDefault => self.state_source_transition_default(evt),
            SourceReady => self.state_source_ready(evt),
            SourceGetSinkCaps => self.state_source_get_sink_caps(evt),
            SourceSendHardReset => self.state_source_send_hard_reset(evt),
            SourceSendSoftReset => self.state_source_send_soft_reset(evt),
            SourceSoftReset => self.state_source_soft_reset(evt),

            SinkStartup => self.state_sink_startup(evt),
            SinkDiscovery => self.state_sink_discovery(evt),
            SinkWaitCapabilities => self.state_sink_wait_capabilities(evt),
            SinkEvaluateCapabilities => self.state_sink_evaluate_capabilities(evt),
            SinkSelectCapability => self.state_sink_select_capability(evt),
            SinkTransitionSink => self.state_sink_transition_sink(evt),
            SinkTransitionDefault => self.state_sink_transition_default(evt),
            SinkReady => self.state_sink_ready(evt),
            SinkSendHardReset => self.state_sink_send_hard_reset(evt),
            SinkSendSoftReset => self.state_sink_send_soft_reset(evt),
            SinkSoftReset => self.state_sink_soft_reset(evt),

            PrSwapSourceEvaluate | PrSwapSinkEvaluate => self.state_pr_swap_evaluate(evt),
            PrSwapSourceAccept | PrSwapSinkAccept => self.state_pr_swap_accept(evt),
            PrSwapSourceReject | PrSwapSinkReject | VconnSwapUfpReject | DrSwapUfpReject
            | DrSwapDfpReject => self.state_swap_reject(evt),
            PrSwapSourceSendSwap | PrSwapSinkSendSwap => {
                self.state_send_swap(evt, ControlMessageType::PrSwap)
            }
            PrSwapSourceTransitionOff => self.state_pr_swap_source_transition_off(evt),
            PrSwapSourceAssertRd => self.state_pr_swap_source_assert_rd(evt),
            PrSwapSourceOff => self.state_pr_swap_source_off(evt),
            PrSwapSinkTransitionOff => self.state_pr_swap_sink_transition_off(evt),
            PrSwapSinkAssertRp => self.state_pr_swap_sink_assert_rp(evt),
            PrSwapSinkSourceOn => self.state_pr_swap_sink_source_on(evt),

            VconnSwapUfpEvaluate => self.state_vconn_swap_evaluate(evt),
            VconnSwapUfpAccept => self.state_vconn_swap_accept(evt),
            VconnSwapUfpWaitForVconn | VconnSwapDfpWaitForVconn => {
                self.state_vconn_swap_wait_for_vconn(evt)
            }
            VconnSwapUfpTurnOnVconn | VconnSwapDfpTurnOnVconn => {
                self.state_vconn_swap_set_vconn(evt, true)
            }
            VconnSwapUfpTurnOffVconn | VconnSwapDfpTurnOffVconn => {
                self.state_vconn_swap_set_vconn(evt, false)
            }
            VconnSwapUfpSendPsRdy | VconnSwapDfpSendPsRdy => self.state_vconn_swap_send_ps_rdy(evt),
            VconnSwapDfpSendSwap => self.state_send_swap(evt, ControlMessageType::VconnSwap),

            DrSwapUfpEvaluate | DrSwapDfpEvaluate => self.state_dr_swap_evaluate(evt),
            DrSwapUfpAccept | DrSwapDfpAccept => self.state_dr_swap_accept(evt),
            DrSwapUfpChange | DrSwapDfpChange => self.state_dr_swap_role_change(evt),
            DrSwapUfpSendSwap | DrSwapDfpSendSwap => {
                self.state_send_swap(evt, ControlMessageType::DrSwap)
            }
        }
    }

    /// Enter a new state.
    ///
    /// Resets the sub-state and scratch value, and requests an immediate
    /// re-dispatch so entry actions run in the same scheduling turn.
    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        debug!("state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.sub_state = 0;
        self.scratch = 0;
        self.work_continue.insert(Events::CONTINUE);
    }

    /// Tear the session down to `Unattached` and restart partner detection.
    pub(crate) fn set_state_unattached(&mut self) {
        info!("connection has disconnected");

        self.phy.phy_reset();
        self.phy.set_vbus(false);
        self.phy.set_vconn(false);
        self.vconn_enabled = false;
        self.phy.enable_rx(false);
        self.timers.disarm(TimerId::State);
        self.timers.disarm(TimerId::Mux);

        self.set_state(ConnectionState::Unattached);
        self.phy.set_pull(Self::pull_for(self.config.role));

        self.notify = Notification::default();
        self.push_notification();

        self.pd_supported = false;
        self.try_role_complete = false;
    }

    /// Reset per-contract protocol state, as on startup and soft reset.
    pub(crate) fn soft_reset_parameters(&mut self) {
        self.caps_counter.reset();
        self.msg_id.reset();
        self.vdm_state = VdmState::DiscoverIdentity;
        self.vdm_send_state = 0;
        self.scratch = 0;
        self.selected_capability = 0;
    }

    /// Evaluate a possible detach while connected.
    ///
    /// During power role swaps and default transitions the check is deferred
    /// (flagged, not dropped) until the sequence leaves those states.
    fn try_detach(&mut self) {
        use ConnectionState::*;

        match self.attach_role {
            AttachRole::Accessory => {
                let (cc1, cc2) = self.phy.sample_cc(RoleHint::Source);
                if cc1 != CcLevel::Ra || cc2 != CcLevel::Ra {
                    self.set_state_unattached();
                }
            }
            AttachRole::Sink => {
                if matches!(
                    self.state,
                    SinkTransitionDefault
                        | PrSwapSourceOff
                        | PrSwapSinkSendSwap
                        | PrSwapSinkAssertRp
                        | PrSwapSinkSourceOn
                        | PrSwapSinkTransitionOff
                ) {
                    self.work_continue.insert(Events::DELAYED_CC);
                } else if !self.phy.vbus_present() {
                    self.set_state_unattached();
                }
            }
            AttachRole::Source => {
                if matches!(
                    self.state,
                    SourceTransitionDefault | PrSwapSourceOff | PrSwapSinkSourceOn
                ) {
                    self.work_continue.insert(Events::DELAYED_CC);
                } else {
                    let (cc1, cc2) = self.phy.sample_cc(RoleHint::Source);
                    let active = match self.polarity {
                        Polarity::Cc1 => cc1,
                        Polarity::Cc2 => cc2,
                    };

                    if active == CcLevel::Open {
                        self.set_state_unattached();
                    }
                }
            }
        }
    }

    /// Read inbound messages until one that is not GoodCRC surfaces.
    ///
    /// GoodCRC is consumed at this boundary and never dispatched.
    fn fetch_message(&mut self) -> bool {
        let mut buffer = [0u8; MAX_MESSAGE_SIZE];

        while let Some(length) = self.phy.receive(&mut buffer) {
            match Message::from_bytes(&buffer[..length]) {
                Ok(message) => {
                    if message.is_control(ControlMessageType::GoodCrc) {
                        continue;
                    }

                    self.rx_message = message;
                    return true;
                }
                Err(parse_error) => {
                    warn!("discarding malformed message: {:?}", parse_error);
                }
            }
        }

        false
    }

    /// Emit the snapshot if it changed since the last emission.
    pub(crate) fn push_notification(&mut self) {
        if self.notify.cc_connected {
            self.notify.orientation = self.polarity.into();
        }

        if self.notify != self.notify_last {
            self.notifications.notify(&self.notify);
            self.notify.attention = false;
            self.notify_last = self.notify;
        }
    }

    fn header_template(&self) -> Header {
        Header::new_template(self.notify.data_role, self.notify.power_role)
    }

    /// Queue a control message for transmission.
    pub(crate) fn queue_control(&mut self, message_type: ControlMessageType) {
        self.tx_message = Message::control(Header::new_control(
            self.header_template(),
            self.msg_id,
            message_type,
        ));
        self.tx_state = TxState::Idle;
    }

    /// Queue a data message for transmission.
    pub(crate) fn queue_data(&mut self, message_type: DataMessageType, objects: &[u32]) {
        let header = Header::new_data(
            self.header_template(),
            self.msg_id,
            message_type,
            objects.len() as u8,
        );
        self.tx_message = Message::data(header, objects);
        self.tx_state = TxState::Idle;
    }

    /// Hand the queued message to the transceiver and report progress.
    pub(crate) fn transmit_queued(&mut self) -> TxState {
        if self.tx_state == TxState::Idle {
            let mut buffer = [0u8; MAX_MESSAGE_SIZE];
            let size = self.tx_message.to_bytes(&mut buffer);
            self.phy.transmit(&buffer[..size]);
            self.tx_state = TxState::Busy;
        }

        self.tx_state
    }

    /// Drive Hard Reset signaling.
    ///
    /// There is no protocol-level acknowledgement; completion is assumed
    /// after a fixed BMC timeout.
    pub(crate) fn transmit_hard_reset(&mut self, evt: Events) -> TxState {
        match self.tx_state {
            TxState::Idle => {
                self.phy.transmit_hard_reset();
                self.tx_state = TxState::Busy;
                self.arm_state_timer(Timeout::BmcHardReset);
            }
            _ => {
                if evt.contains(Events::TIMER_STATE) {
                    self.tx_state = TxState::Success;
                }
            }
        }

        self.tx_state
    }

    pub(crate) fn arm_state_timer(&mut self, timeout: Timeout) {
        self.timers.arm(TimerId::State, timeout.millis());
    }

    pub(crate) fn arm_state_timer_ms(&mut self, duration_ms: u32) {
        self.timers.arm(TimerId::State, duration_ms);
    }

    pub(crate) fn arm_mux_timer(&mut self, timeout: Timeout) {
        self.timers.arm(TimerId::Mux, timeout.millis());
    }

    /// The ready state of the present power role.
    pub(crate) fn ready_state(&self) -> ConnectionState {
        match self.notify.power_role {
            PowerRole::Source => ConnectionState::SourceReady,
            PowerRole::Sink => ConnectionState::SinkReady,
        }
    }

    /// The send-soft-reset state of the present power role.
    pub(crate) fn send_soft_reset_state(&self) -> ConnectionState {
        match self.notify.power_role {
            PowerRole::Source => ConnectionState::SourceSendSoftReset,
            PowerRole::Sink => ConnectionState::SinkSendSoftReset,
        }
    }

    /// The send-hard-reset state of the present power role.
    pub(crate) fn send_hard_reset_state(&self) -> ConnectionState {
        match self.notify.power_role {
            PowerRole::Source => ConnectionState::SourceSendHardReset,
            PowerRole::Sink => ConnectionState::SinkSendHardReset,
        }
    }

    pub(crate) fn pull_for(role: RoleMode) -> CcPull {
        match role {
            RoleMode::Source => CcPull::Up,
            RoleMode::Sink => CcPull::Down,
            RoleMode::Drp => CcPull::Toggle,
        }
    }
}
