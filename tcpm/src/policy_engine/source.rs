//! Source-side policy engine: capability broadcast, request negotiation,
//! supply transition and reset flows.
use heapless::Vec;
use tcpm_traits::Transceiver;

use super::{ConnectionState, Events, NotificationSink, Port, TxState};
use crate::message::header::{ControlMessageType, DataMessageType};
use crate::message::pdo::{FixedSupply, FixedVariableRequest};
use crate::message::MAX_OBJECTS;
use crate::timers::{Timeout, Timer, TimerId};

impl<PHY: Transceiver, TIM: Timer, SINK: NotificationSink> Port<PHY, TIM, SINK> {
    /// Queue the configured source capabilities for transmission.
    fn queue_source_capabilities(&mut self) {
        let flags = self.config.flags;
        let mut objects: Vec<u32, MAX_OBJECTS> = Vec::new();

        for capability in &self.config.source_caps {
            let pdo = FixedSupply::default()
                .with_dual_role_power(flags.dual_role_power)
                .with_usb_suspend_supported(flags.usb_suspend_supported)
                .with_unconstrained_power(flags.externally_powered)
                .with_usb_communications_capable(flags.usb_communications_capable)
                .with_dual_role_data(flags.data_role_swap)
                .with_peak_current(flags.peak_current)
                .with_raw_voltage(capability.voltage_mv / 50)
                .with_raw_max_current(capability.max_current_ma / 10);

            let _ = objects.push(pdo.0);
        }

        self.queue_data(DataMessageType::SourceCapabilities, &objects);
    }

    /// Mark the partner capability cache as fetched but unusable.
    fn mark_partner_caps_unavailable(&mut self) {
        self.partner_caps.clear();
        let _ = self.partner_caps.push(u32::MAX);
    }

    pub(super) fn state_source_startup(&mut self, _evt: Events) {
        self.notify.pd_connected = false;
        self.soft_reset_parameters();
        self.partner_caps.clear();

        self.phy.set_polarity(self.polarity);
        self.phy.enable_rx(true);

        self.set_state(ConnectionState::SourceSendCapabilities);
    }

    pub(super) fn state_source_discovery(&mut self, evt: Events) {
        match self.sub_state {
            0 => {
                if self.caps_counter.increment().is_ok() {
                    self.arm_state_timer(Timeout::SendSourceCap);
                    self.sub_state = 1;
                } else {
                    // No PD partner. Stay attached in Type-C only operation.
                    self.set_state(ConnectionState::Disabled);
                }
            }
            _ => {
                if evt.contains(Events::TIMER_STATE) {
                    self.set_state(ConnectionState::SourceSendCapabilities);
                } else if evt.contains(Events::TIMER_MUX) {
                    if !self.pd_supported {
                        self.set_state(ConnectionState::Disabled);
                    } else if self.hard_reset_count.is_overrun() {
                        self.set_state(ConnectionState::ErrorRecovery);
                    } else {
                        self.set_state(ConnectionState::SourceSendHardReset);
                    }
                }
            }
        }
    }

    pub(super) fn state_source_send_capabilities(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.queue_source_capabilities();
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.hard_reset_count.reset();
                    self.caps_counter.reset();
                    self.arm_state_timer(Timeout::SenderResponse);
                    self.timers.disarm(TimerId::Mux);
                    self.sub_state = 2;
                    self.pd_supported = true;
                }
                TxState::Failed => {
                    self.set_state(ConnectionState::SourceDiscovery);
                    return;
                }
                _ => {}
            }

            if !evt.intersects(Events::RESPONSE) {
                return;
            }
        }

        if evt.contains(Events::RX) {
            if self.rx_message.is_data(DataMessageType::Request) {
                self.set_state(ConnectionState::SourceNegotiateCapability);
            } else {
                self.set_state(ConnectionState::SourceSendSoftReset);
            }
        } else if evt.contains(Events::TIMER_STATE) {
            if !self.hard_reset_count.is_overrun() {
                self.set_state(ConnectionState::SourceSendHardReset);
            } else {
                self.set_state(ConnectionState::Disabled);
            }
        } else if evt.contains(Events::TIMER_MUX) {
            if !self.pd_supported {
                self.set_state(ConnectionState::Disabled);
            } else if self.hard_reset_count.is_overrun() {
                self.set_state(ConnectionState::ErrorRecovery);
            } else {
                self.set_state(ConnectionState::SourceSendHardReset);
            }
        }
    }

    pub(super) fn state_source_negotiate_capability(&mut self, _evt: Events) {
        let position = self
            .rx_message
            .objects
            .first()
            .map(|object| FixedVariableRequest(*object).object_position())
            .unwrap_or(0);

        if position == 0 || position as usize > self.config.source_caps.len() {
            self.set_state(ConnectionState::SourceCapabilityResponse);
        } else {
            self.set_state(ConnectionState::SourceTransitionSupply);
        }
    }

    pub(super) fn state_source_transition_supply(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.queue_control(ControlMessageType::Accept);
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.arm_state_timer(Timeout::SourceTransition);
                    self.sub_state = 2;
                }
                TxState::Failed => self.set_state(ConnectionState::SourceSendSoftReset),
                _ => {}
            }
            return;
        }

        if self.sub_state == 2 {
            if evt.contains(Events::TIMER_STATE) {
                self.notify.pd_connected = true;
                self.phy.set_vbus(true);
                self.queue_control(ControlMessageType::PsRdy);
                self.sub_state = 3;
                self.work_continue.insert(Events::CONTINUE);
            }
            return;
        }

        match self.transmit_queued() {
            TxState::Success => {
                info!("PD connected as DFP, supplying 5V");
                self.set_state(ConnectionState::SourceReady);
            }
            TxState::Failed => self.set_state(ConnectionState::SourceSendSoftReset),
            _ => {}
        }
    }

    pub(super) fn state_source_capability_response(&mut self, _evt: Events) {
        if self.sub_state == 0 {
            self.queue_control(ControlMessageType::Reject);
            self.sub_state = 1;
        }

        match self.transmit_queued() {
            TxState::Success => {
                if self.notify.pd_connected {
                    // The previous explicit contract stays in place.
                    self.set_state(ConnectionState::SourceReady);
                } else {
                    self.set_state(ConnectionState::SourceSendHardReset);
                }
            }
            TxState::Failed => self.set_state(ConnectionState::SourceSendSoftReset),
            _ => {}
        }
    }

    pub(super) fn state_source_transition_default(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.notify.pd_connected = false;
            self.phy.set_vbus(false);
            self.arm_state_timer(Timeout::SourceRecover);
            self.sub_state = 1;
            return;
        }

        if evt.contains(Events::TIMER_STATE) {
            self.phy.set_vbus(true);
            self.arm_mux_timer(Timeout::NoResponse);
            self.set_state(ConnectionState::SourceStartup);
            debug!("reset over -> source startup");
        }
    }

    pub(super) fn state_source_ready(&mut self, evt: Events) {
        if evt.contains(Events::RX) {
            if self.rx_message.is_data(DataMessageType::VendorDefined) {
                self.process_vdm_message();
                self.work_continue.insert(Events::CONTINUE);
                self.timers.disarm(TimerId::State);
            } else if !self.vdm_active() {
                self.process_swap_message();
            }
        }

        if self.partner_caps.is_empty() {
            self.set_state(ConnectionState::SourceGetSinkCaps);
        } else if self.vdm_active() {
            self.run_vdm_machine(evt);
        }
    }

    pub(super) fn state_source_get_sink_caps(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.queue_control(ControlMessageType::GetSinkCap);
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.arm_state_timer(Timeout::SenderResponse);
                    self.sub_state = 2;
                }
                TxState::Failed => {
                    self.set_state(ConnectionState::SourceSendSoftReset);
                    return;
                }
                _ => {}
            }

            if !evt.intersects(Events::RESPONSE) {
                return;
            }
        }

        if evt.contains(Events::RX) {
            if self.rx_message.is_data(DataMessageType::SinkCapabilities) {
                self.partner_caps = self.rx_message.objects.clone();
            } else {
                self.mark_partner_caps_unavailable();
            }
            self.set_state(ConnectionState::SourceReady);
        } else if evt.contains(Events::TIMER_STATE) {
            warn!("get sink capabilities timed out");
            self.mark_partner_caps_unavailable();
            self.set_state(ConnectionState::SourceReady);
        }
    }

    pub(super) fn state_source_send_hard_reset(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.tx_state = TxState::Idle;
            self.sub_state = 1;
        }

        if self.transmit_hard_reset(evt) == TxState::Success {
            let _ = self.hard_reset_count.increment();
            self.set_state(ConnectionState::SourceTransitionDefault);
        }
    }

    pub(super) fn state_source_send_soft_reset(&mut self, evt: Events) {
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
                    self.set_state(ConnectionState::SourceSendHardReset);
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
                self.set_state(ConnectionState::SourceSendCapabilities);
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.set_state(ConnectionState::SourceSendHardReset);
        }
    }

    /// The partner requested a soft reset.
    pub(super) fn state_source_soft_reset(&mut self, _evt: Events) {
        if self.sub_state == 0 {
            self.queue_control(ControlMessageType::Accept);
            self.sub_state = 1;
        }

        match self.transmit_queued() {
            TxState::Success => {
                self.soft_reset_parameters();
                self.set_state(ConnectionState::SourceSendCapabilities);
            }
            TxState::Failed => self.set_state(ConnectionState::SourceSendHardReset),
            _ => {}
        }
    }
}
