//! Sink-side policy engine: capability evaluation, power requests and reset
//! flows.
use tcpm_traits::Transceiver;

use super::{ConnectionState, Events, NotificationSink, Port, TxState};
use crate::config::ChargeLimit;
use crate::message::header::{ControlMessageType, DataMessageType, MessageType};
use crate::message::pdo::{FixedVariableRequest, PowerDataObject};
use crate::timers::{Timeout, Timer, TimerId};

/// Highest fixed supply voltage a sink selects without a charger limit, in
/// millivolts.
const DEFAULT_VOLTAGE_LIMIT_MV: u32 = 5000;

impl<PHY: Transceiver, TIM: Timer, SINK: NotificationSink> Port<PHY, TIM, SINK> {
    /// Whether a cached partner capability is a supply kind the sink
    /// evaluates.
    fn evaluated_supply(pdo: &PowerDataObject) -> bool {
        matches!(
            pdo,
            PowerDataObject::FixedSupply(_) | PowerDataObject::Battery(_)
        )
    }

    /// Record `index` (zero-based) as the selected capability.
    fn select_capability(&mut self, index: usize, pdo: &PowerDataObject) {
        self.selected_capability = (index + 1) as u8;
        self.notify.voltage_mv = pdo.voltage_mv().unwrap_or(0);
        self.notify.current_ma = pdo.max_current_ma().unwrap_or(0);
    }

    /// Re-scan the partner capabilities against the charge IC limits,
    /// highest index first. The first hit wins.
    fn select_capability_within(&mut self, limit: ChargeLimit) {
        for index in (0..self.partner_caps.len()).rev() {
            let pdo = PowerDataObject::from(self.partner_caps[index]);

            if !Self::evaluated_supply(&pdo) {
                continue;
            }

            let voltage = pdo.voltage_mv().unwrap_or(0);
            let current = pdo.max_current_ma().unwrap_or(0);

            if voltage <= u32::from(limit.max_voltage_mv) && current <= u32::from(limit.max_current_ma) {
                self.select_capability(index, &pdo);
                return;
            }
        }
    }

    /// Queue a request for the selected capability.
    fn queue_request(&mut self) {
        let object = self
            .partner_caps
            .get(self.selected_capability.saturating_sub(1) as usize)
            .copied()
            .unwrap_or(0);
        let pdo = PowerDataObject::from(object);

        let mut current = (pdo.max_current_ma().unwrap_or(0) / 10) as u16;
        if current > 0x3ff {
            error!("clamping invalid current: {} mA", 10 * u32::from(current));
            current = 0x3ff;
        }

        let request = FixedVariableRequest::default()
            .with_object_position(self.selected_capability)
            .with_no_usb_suspend(true)
            .with_usb_communications_capable(true)
            .with_raw_operating_current(current)
            .with_raw_max_operating_current(current);

        self.queue_data(DataMessageType::Request, &[request.0]);
    }

    pub(super) fn state_sink_startup(&mut self, _evt: Events) {
        self.notify.pd_connected = false;
        self.soft_reset_parameters();
        self.partner_caps.clear();

        self.phy.set_polarity(self.polarity);
        self.phy.enable_rx(true);

        self.set_state(ConnectionState::SinkDiscovery);
    }

    pub(super) fn state_sink_discovery(&mut self, _evt: Events) {
        self.set_state(ConnectionState::SinkWaitCapabilities);
        self.arm_state_timer(Timeout::SinkWaitCap);
    }

    pub(super) fn state_sink_wait_capabilities(&mut self, evt: Events) {
        if evt.contains(Events::RX) {
            if self.rx_message.is_data(DataMessageType::SourceCapabilities) {
                self.pd_supported = true;
                self.timers.disarm(TimerId::Mux);
                self.set_state(ConnectionState::SinkEvaluateCapabilities);
            }
        } else if evt.contains(Events::TIMER_STATE) {
            if !self.hard_reset_count.is_overrun() {
                if self.vbus_at_attach {
                    // The source was already up when we attached; it may
                    // simply not have seen our GoodCRC. Soft reset first.
                    self.vbus_at_attach = false;
                    self.set_state(ConnectionState::SinkSendSoftReset);
                } else {
                    self.set_state(ConnectionState::SinkSendHardReset);
                }
            } else if self.pd_supported {
                self.set_state(ConnectionState::ErrorRecovery);
            } else {
                self.set_state(ConnectionState::Disabled);
            }
        } else if evt.contains(Events::TIMER_MUX) && self.hard_reset_count.is_overrun() {
            if self.pd_supported {
                self.set_state(ConnectionState::ErrorRecovery);
            } else {
                self.set_state(ConnectionState::Disabled);
            }
        }
    }

    pub(super) fn state_sink_evaluate_capabilities(&mut self, _evt: Events) {
        self.hard_reset_count.reset();
        self.selected_capability = 0;
        self.partner_caps = self.rx_message.objects.clone();

        // Scan upward; the last (highest-indexed) capability at or below
        // 5 V wins.
        for index in 0..self.partner_caps.len() {
            let pdo = PowerDataObject::from(self.partner_caps[index]);

            if !Self::evaluated_supply(&pdo) {
                continue;
            }

            if pdo.voltage_mv().unwrap_or(u32::MAX) <= DEFAULT_VOLTAGE_LIMIT_MV {
                self.select_capability(index, &pdo);
            }
        }

        if let Some(limit) = self.config.charge_limit {
            self.select_capability_within(limit);
        }

        if self.selected_capability == 0 || self.selected_capability > 7 {
            self.selected_capability = 0;
            self.set_state(ConnectionState::SinkWaitCapabilities);
        } else {
            self.set_state(ConnectionState::SinkSelectCapability);
        }
    }

    pub(super) fn state_sink_select_capability(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.queue_request();
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.arm_state_timer(Timeout::SenderResponse);
                    self.sub_state = 2;
                }
                TxState::Failed => {
                    self.set_state(ConnectionState::SinkDiscovery);
                    return;
                }
                _ => {}
            }

            if !evt.intersects(Events::RESPONSE) {
                return;
            }
        }

        if evt.contains(Events::RX) {
            if let MessageType::Control(control) = self.rx_message.header.message_type() {
                match control {
                    ControlMessageType::Accept => {
                        self.set_state(ConnectionState::SinkTransitionSink);
                        self.arm_state_timer(Timeout::PsTransition);
                    }
                    ControlMessageType::Wait | ControlMessageType::Reject => {
                        if self.notify.pd_connected {
                            info!("PD connected as UFP, sinking 5V");
                            self.set_state(ConnectionState::SinkReady);
                        } else {
                            self.set_state(ConnectionState::SinkWaitCapabilities);
                            // Exhaust the hard reset budget so a rejected
                            // request cannot retry forever.
                            self.hard_reset_count.force_overrun();
                        }
                    }
                    _ => {}
                }
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.set_state(ConnectionState::SinkSendHardReset);
        }
    }

    pub(super) fn state_sink_transition_sink(&mut self, evt: Events) {
        if evt.contains(Events::RX) {
            if self.rx_message.is_control(ControlMessageType::PsRdy) {
                self.notify.pd_connected = true;
                info!("PD connected as UFP, sinking 5V");
                self.set_state(ConnectionState::SinkReady);
            } else if self.rx_message.is_data(DataMessageType::SourceCapabilities) {
                self.set_state(ConnectionState::SinkEvaluateCapabilities);
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.set_state(ConnectionState::SinkSendHardReset);
        }
    }

    pub(super) fn state_sink_transition_default(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.notify.pd_connected = false;
            self.arm_mux_timer(Timeout::NoResponse);
            self.arm_state_timer_ms(Timeout::PsHardReset.millis() + Timeout::Safe0V.millis());
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            if !self.phy.vbus_present() {
                // VBUS reached vSafe0V; now wait for the source to come back.
                self.sub_state = 2;
                self.arm_state_timer_ms(
                    Timeout::SourceRecoverMax.millis() + Timeout::SourceTurnOn.millis(),
                );
            } else if evt.contains(Events::TIMER_STATE) {
                self.set_state(ConnectionState::SinkStartup);
            }
            return;
        }

        if self.phy.vbus_present() {
            self.timers.disarm(TimerId::State);
            self.set_state(ConnectionState::SinkStartup);
        } else if evt.contains(Events::TIMER_STATE) {
            self.set_state(ConnectionState::SinkStartup);
        }
    }

    pub(super) fn state_sink_ready(&mut self, evt: Events) {
        if evt.contains(Events::RX) {
            if self.rx_message.is_data(DataMessageType::VendorDefined) {
                self.process_vdm_message();
                self.work_continue.insert(Events::CONTINUE);
                self.timers.disarm(TimerId::State);
            } else if !self.vdm_active() {
                self.process_swap_message();
            }
        }

        if self.vdm_active() {
            self.run_vdm_machine(evt);
        }
    }

    pub(super) fn state_sink_send_hard_reset(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.tx_state = TxState::Idle;
            self.sub_state = 1;
        }

        if self.transmit_hard_reset(evt) == TxState::Success {
            let _ = self.hard_reset_count.increment();
            self.set_state(ConnectionState::SinkTransitionDefault);
        }
    }

    pub(super) fn state_sink_send_soft_reset(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.queue_control(ControlMessageType::SoftReset);
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.arm_state_timer(Timeout::SenderResponse);
                    self.sub_state = 2;
                }
                TxState::Failed => {
                    self.set_state(ConnectionState::SinkSendHardReset);
                    return;
                }
                _ => {}
            }

            if !evt.intersects(Events::RESPONSE) {
                return;
            }
        }

        if evt.contains(Events::RX) {
            if self.rx_message.is_control(ControlMessageType::Accept) {
                self.soft_reset_parameters();
                self.arm_state_timer(Timeout::SinkWaitCap);
                self.set_state(ConnectionState::SinkWaitCapabilities);
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.set_state(ConnectionState::SinkSendHardReset);
        }
    }

    /// The partner requested a soft reset.
    pub(super) fn state_sink_soft_reset(&mut self, _evt: Events) {
        if self.sub_state == 0 {
            self.queue_control(ControlMessageType::Accept);
            self.sub_state = 1;
        }

        match self.transmit_queued() {
            TxState::Success => {
                self.soft_reset_parameters();
                self.arm_state_timer(Timeout::SinkWaitCap);
                self.set_state(ConnectionState::SinkWaitCapabilities);
            }
            TxState::Failed => self.set_state(ConnectionState::SinkSendHardReset),
            _ => {}
        }
    }
}
