//! Power role, data role and VCONN swap flows, for both the initiating and
//! the responding side.
use tcpm_traits::{CcPull, Transceiver};

use super::{AttachRole, ConnectionState, Events, NotificationSink, Port, TxState};
use crate::config::RoleMode;
use crate::message::header::ControlMessageType;
use crate::timers::{Timeout, Timer, TimerId};
use crate::{DataRole, PowerRole};

impl<PHY: Transceiver, TIM: Timer, SINK: NotificationSink> Port<PHY, TIM, SINK> {
    /// Route a swap request received in a ready state.
    pub(super) fn process_swap_message(&mut self) {
        if self.rx_message.is_control(ControlMessageType::PrSwap) {
            self.set_state(match self.notify.power_role {
                PowerRole::Source => ConnectionState::PrSwapSourceEvaluate,
                PowerRole::Sink => ConnectionState::PrSwapSinkEvaluate,
            });
        } else if self.rx_message.is_control(ControlMessageType::VconnSwap) {
            // A DFP keeps sourcing VCONN; only the UFP side evaluates.
            if self.notify.data_role == DataRole::Ufp {
                self.set_state(ConnectionState::VconnSwapUfpEvaluate);
            }
        } else if self.rx_message.is_control(ControlMessageType::DrSwap) {
            self.set_state(match self.notify.data_role {
                DataRole::Dfp => ConnectionState::DrSwapDfpEvaluate,
                DataRole::Ufp => ConnectionState::DrSwapUfpEvaluate,
            });
        }
    }

    /// Send one control message, then transition by the transmit outcome.
    fn state_send_simple_message(
        &mut self,
        message_type: ControlMessageType,
        success: ConnectionState,
        failed: ConnectionState,
    ) {
        if self.sub_state == 0 {
            self.queue_control(message_type);
            self.sub_state = 1;
        }

        match self.transmit_queued() {
            TxState::Success => self.set_state(success),
            TxState::Failed => self.set_state(failed),
            _ => {}
        }
    }

    pub(super) fn state_pr_swap_evaluate(&mut self, _evt: Events) {
        self.set_state(match (self.config.role, self.notify.power_role) {
            (RoleMode::Drp, PowerRole::Source) => ConnectionState::PrSwapSourceAccept,
            (RoleMode::Drp, PowerRole::Sink) => ConnectionState::PrSwapSinkAccept,
            (_, PowerRole::Source) => ConnectionState::PrSwapSourceReject,
            (_, PowerRole::Sink) => ConnectionState::PrSwapSinkReject,
        });
    }

    pub(super) fn state_swap_reject(&mut self, _evt: Events) {
        let success = self.ready_state();
        let failed = self.send_soft_reset_state();
        self.state_send_simple_message(ControlMessageType::Reject, success, failed);
    }

    pub(super) fn state_pr_swap_accept(&mut self, _evt: Events) {
        let success = match self.notify.power_role {
            PowerRole::Source => ConnectionState::PrSwapSourceTransitionOff,
            PowerRole::Sink => ConnectionState::PrSwapSinkTransitionOff,
        };
        let failed = self.send_soft_reset_state();
        self.state_send_simple_message(ControlMessageType::Accept, success, failed);
    }

    /// Initiator side of all three swap kinds: send the request and route by
    /// the partner's answer.
    pub(super) fn state_send_swap(&mut self, evt: Events, message_type: ControlMessageType) {
        if self.sub_state == 0 {
            self.queue_control(message_type);
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.arm_state_timer(Timeout::SenderResponse);
                    self.sub_state = 2;
                }
                TxState::Failed => {
                    if message_type == ControlMessageType::DrSwap {
                        self.set_state(ConnectionState::ErrorRecovery);
                    } else {
                        self.set_state(self.send_soft_reset_state());
                    }
                }
                _ => {}
            }
            return;
        }

        if evt.contains(Events::RX) {
            if self.rx_message.is_control(ControlMessageType::Accept) {
                self.timers.disarm(TimerId::State);

                match message_type {
                    ControlMessageType::VconnSwap => {
                        self.set_state(if self.vconn_enabled {
                            ConnectionState::VconnSwapDfpWaitForVconn
                        } else {
                            ConnectionState::VconnSwapDfpTurnOnVconn
                        });
                    }
                    ControlMessageType::PrSwap => {
                        self.set_state(match self.notify.power_role {
                            PowerRole::Source => ConnectionState::PrSwapSourceTransitionOff,
                            PowerRole::Sink => ConnectionState::PrSwapSinkTransitionOff,
                        });
                        // Assume the new role for all messages sent from
                        // here on; the source-to-sink path re-flips when it
                        // stops supplying.
                        self.notify.power_role = PowerRole::Source;
                    }
                    ControlMessageType::DrSwap => {
                        self.set_state(match self.notify.data_role {
                            DataRole::Dfp => ConnectionState::DrSwapDfpChange,
                            DataRole::Ufp => ConnectionState::DrSwapUfpChange,
                        });
                    }
                    _ => {}
                }
            } else if self.rx_message.is_control(ControlMessageType::Reject)
                || self.rx_message.is_control(ControlMessageType::Wait)
            {
                self.timers.disarm(TimerId::State);
                self.set_state(self.ready_state());
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.set_state(self.ready_state());
        }
    }

    pub(super) fn state_pr_swap_source_transition_off(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.arm_state_timer(Timeout::SourceTransition);
            self.sub_state = 1;
            return;
        }

        if evt.contains(Events::TIMER_STATE) {
            self.phy.set_vbus(false);
            self.notify.power_role = PowerRole::Sink;

            self.set_state(if self.config.role == RoleMode::Drp {
                ConnectionState::PrSwapSourceAssertRd
            } else {
                ConnectionState::PrSwapSourceOff
            });
        }
    }

    pub(super) fn state_pr_swap_source_assert_rd(&mut self, _evt: Events) {
        self.phy.set_pull(CcPull::Down);
        self.set_state(ConnectionState::PrSwapSourceOff);
    }

    pub(super) fn state_pr_swap_source_off(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.queue_control(ControlMessageType::PsRdy);
            self.sub_state = 1;
        }

        if self.sub_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.arm_state_timer(Timeout::PsSourceOn);
                    self.sub_state = 2;
                }
                TxState::Failed => {
                    self.notify.power_role = PowerRole::Source;
                    self.set_state(ConnectionState::SourceSendHardReset);
                }
                _ => {}
            }
            return;
        }

        if evt.contains(Events::RX) {
            if self.rx_message.is_control(ControlMessageType::PsRdy) {
                self.timers.disarm(TimerId::State);
                // Resume as a sink on the established polarity.
                self.notify.pd_connected = false;
                self.attach_role = AttachRole::Sink;
                self.phy.set_polarity(self.polarity);
                self.phy.enable_rx(true);
                self.set_state(ConnectionState::SinkDiscovery);
            } else {
                debug!("ignoring message while source is off: {:?}", self.rx_message.header);
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.notify.power_role = PowerRole::Source;
            self.set_state(ConnectionState::SourceSendHardReset);
        }
    }

    pub(super) fn state_pr_swap_sink_transition_off(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.arm_state_timer(Timeout::PsSourceOff);
            self.sub_state = 1;
        }

        if evt.contains(Events::RX) {
            if self.rx_message.is_control(ControlMessageType::PsRdy) {
                self.set_state(if self.config.role == RoleMode::Drp {
                    ConnectionState::PrSwapSinkAssertRp
                } else {
                    ConnectionState::PrSwapSinkSourceOn
                });
            } else {
                debug!("ignoring message while source turns off: {:?}", self.rx_message.header);
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.notify.power_role = PowerRole::Sink;
            self.set_state(ConnectionState::SinkSendHardReset);
        }
    }

    pub(super) fn state_pr_swap_sink_assert_rp(&mut self, _evt: Events) {
        self.phy.set_pull(CcPull::Up);
        self.set_state(ConnectionState::PrSwapSinkSourceOn);
    }

    pub(super) fn state_pr_swap_sink_source_on(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.phy.set_vbus(true);
            self.notify.power_role = PowerRole::Source;
            self.sub_state = 1;
            self.work_continue.insert(Events::CONTINUE);
            return;
        }

        if self.sub_state == 1 {
            self.queue_control(ControlMessageType::PsRdy);
            self.sub_state = 2;
        }

        if self.sub_state == 2 {
            match self.transmit_queued() {
                TxState::Success => {
                    // See spec, [6.5.10.2]
                    self.arm_state_timer(Timeout::SwapSourceStart);
                    self.sub_state = 3;
                }
                TxState::Failed => {
                    self.notify.power_role = PowerRole::Sink;
                    self.set_state(ConnectionState::SinkSendHardReset);
                }
                _ => {}
            }
            return;
        }

        if evt.contains(Events::TIMER_STATE) {
            self.attach_role = AttachRole::Source;
            self.set_state(ConnectionState::SourceSendCapabilities);
        }
    }

    pub(super) fn state_vconn_swap_evaluate(&mut self, _evt: Events) {
        self.set_state(if self.config.vconn_supported {
            ConnectionState::VconnSwapUfpAccept
        } else {
            ConnectionState::VconnSwapUfpReject
        });
    }

    pub(super) fn state_vconn_swap_accept(&mut self, _evt: Events) {
        let success = if self.vconn_enabled {
            ConnectionState::VconnSwapUfpWaitForVconn
        } else {
            ConnectionState::VconnSwapUfpTurnOnVconn
        };
        let failed = self.send_soft_reset_state();
        self.state_send_simple_message(ControlMessageType::Accept, success, failed);
    }

    pub(super) fn state_vconn_swap_set_vconn(&mut self, _evt: Events, enable: bool) {
        self.phy.set_vconn(enable);
        self.vconn_enabled = enable;

        if enable {
            self.set_state(match self.notify.data_role {
                DataRole::Dfp => ConnectionState::VconnSwapDfpSendPsRdy,
                DataRole::Ufp => ConnectionState::VconnSwapUfpSendPsRdy,
            });
        } else {
            self.set_state(self.ready_state());
        }
    }

    pub(super) fn state_vconn_swap_send_ps_rdy(&mut self, _evt: Events) {
        let success = self.ready_state();
        let failed = self.send_soft_reset_state();
        self.state_send_simple_message(ControlMessageType::PsRdy, success, failed);
    }

    /// Wait for the partner to report its VCONN supply with PS_RDY.
    pub(super) fn state_vconn_swap_wait_for_vconn(&mut self, evt: Events) {
        if self.sub_state == 0 {
            self.arm_state_timer(Timeout::VconnSourceOn);
            self.sub_state = 1;
        }

        if evt.contains(Events::RX) {
            if self.rx_message.is_control(ControlMessageType::PsRdy) {
                self.set_state(match self.notify.data_role {
                    DataRole::Dfp => ConnectionState::VconnSwapDfpTurnOffVconn,
                    DataRole::Ufp => ConnectionState::VconnSwapUfpTurnOffVconn,
                });
            }
        } else if evt.contains(Events::TIMER_STATE) {
            self.set_state(self.send_hard_reset_state());
        }
    }

    pub(super) fn state_dr_swap_evaluate(&mut self, _evt: Events) {
        // Swapping the DFP to UFP is refused; it would have to be
        // coordinated with the USB host stack.
        self.set_state(match self.notify.data_role {
            DataRole::Dfp => ConnectionState::DrSwapDfpReject,
            DataRole::Ufp => {
                if self.config.flags.data_role_swap {
                    ConnectionState::DrSwapUfpAccept
                } else {
                    ConnectionState::DrSwapUfpReject
                }
            }
        });
    }

    pub(super) fn state_dr_swap_accept(&mut self, _evt: Events) {
        let success = match self.notify.data_role {
            DataRole::Dfp => ConnectionState::DrSwapDfpChange,
            DataRole::Ufp => ConnectionState::DrSwapUfpChange,
        };
        self.state_send_simple_message(ControlMessageType::Accept, success, ConnectionState::ErrorRecovery);
    }

    pub(super) fn state_dr_swap_role_change(&mut self, _evt: Events) {
        self.notify.data_role = match self.notify.data_role {
            DataRole::Dfp => DataRole::Ufp,
            DataRole::Ufp => DataRole::Dfp,
        };

        self.set_state(self.ready_state());
    }
}
