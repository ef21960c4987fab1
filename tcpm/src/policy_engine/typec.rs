//! Type-C attach resolution: partner probing, CC debounce, Try.SRC/Try.SNK
//! detours and accessory detection.
use tcpm_traits::{CcLevel, CcPull, Polarity, RoleHint, Transceiver};

use super::{AttachRole, ConnectionState, Events, NotificationSink, Port, DEBOUNCE_COUNT};
use crate::config::RoleMode;
use crate::timers::{Timeout, Timer, TimerId};
use crate::{DataRole, PowerRole};

impl<PHY: Transceiver, TIM: Timer, SINK: NotificationSink> Port<PHY, TIM, SINK> {
    /// Probe both CC lines for a partner, in the roles the configuration
    /// allows.
    ///
    /// A single Rd against an open line is a sink partner, Ra on both lines
    /// an audio accessory, and any Rp a source partner. The line carrying
    /// the termination decides the polarity.
    fn probe_partner(&mut self) -> Option<(AttachRole, Polarity)> {
        if self.config.role != RoleMode::Sink {
            let (cc1, cc2) = self.phy.sample_cc(RoleHint::Source);

            if cc1 == CcLevel::Ra && cc2 == CcLevel::Ra {
                return Some((AttachRole::Accessory, Polarity::Cc1));
            }

            match (cc1, cc2) {
                (CcLevel::Rd, CcLevel::Open) => return Some((AttachRole::Source, Polarity::Cc1)),
                (CcLevel::Open, CcLevel::Rd) => return Some((AttachRole::Source, Polarity::Cc2)),
                _ => {}
            }
        }

        if self.config.role != RoleMode::Source {
            let (cc1, cc2) = self.phy.sample_cc(RoleHint::Sink);

            match (cc1, cc2) {
                (CcLevel::Rp, _) => return Some((AttachRole::Sink, Polarity::Cc1)),
                (_, CcLevel::Rp) => return Some((AttachRole::Sink, Polarity::Cc2)),
                _ => {}
            }
        }

        None
    }

    /// Sample both CC lines with the termination of the resolved role.
    fn sample_cc(&mut self) -> (CcLevel, CcLevel) {
        let hint = match self.attach_role {
            AttachRole::Sink => RoleHint::Sink,
            AttachRole::Source | AttachRole::Accessory => RoleHint::Source,
        };

        self.phy.sample_cc(hint)
    }

    /// Resample the CC pair and advance the debounce counter.
    ///
    /// The counter resets whenever the pair changes. Returns `true` once the
    /// pair was stable for more than [`DEBOUNCE_COUNT`] samples.
    fn debounce_cc(&mut self) -> bool {
        let (cc1, cc2) = self.sample_cc();

        if self.cc1 == cc1 && self.cc2 == cc2 {
            self.debounce_count = self.debounce_count.saturating_add(1);
        } else {
            self.cc1 = cc1;
            self.cc2 = cc2;
            self.debounce_count = 0;
        }

        self.debounce_count > DEBOUNCE_COUNT
    }

    /// Restart detection in a forced role for one Try.SRC/Try.SNK cycle.
    fn try_attach_as(&mut self, role: PowerRole) {
        self.phy.phy_reset();
        self.phy.set_vbus(false);
        self.phy.enable_rx(false);
        self.phy.set_pull(match role {
            PowerRole::Source => CcPull::Up,
            PowerRole::Sink => CcPull::Down,
        });

        self.arm_mux_timer(Timeout::TryRoleSwap);
        self.set_state(match role {
            PowerRole::Source => ConnectionState::AttachTrySource,
            PowerRole::Sink => ConnectionState::AttachTrySink,
        });
    }

    pub(super) fn state_unattached(&mut self, evt: Events) {
        self.notify.cc_connected = false;
        self.pd_supported = false;

        if !evt.contains(Events::CC_CHANGE) {
            return;
        }

        let Some((role, polarity)) = self.probe_partner() else {
            return;
        };

        self.attach_role = role;
        self.set_state(match role {
            AttachRole::Sink => ConnectionState::AttachWaitSink,
            AttachRole::Source => ConnectionState::AttachWaitSource,
            AttachRole::Accessory => ConnectionState::AttachWaitAccessory,
        });

        self.vbus_at_attach = self.phy.vbus_present();

        self.polarity = polarity;
        self.phy.set_polarity(polarity);

        let (cc1, cc2) = self.sample_cc();
        self.cc1 = cc1;
        self.cc2 = cc2;
        self.debounce_count = 0;
        self.arm_mux_timer(Timeout::CcDebounce);
    }

    pub(super) fn state_attach_wait_sink(&mut self, evt: Events) {
        if !evt.contains(Events::TIMER_MUX) {
            return;
        }

        if self.phy.vbus_present() {
            if self.config.role == RoleMode::Drp
                && self.config.try_role == Some(PowerRole::Source)
                && !self.try_role_complete
            {
                self.try_attach_as(PowerRole::Source);
                return;
            } else if self.try_role_complete {
                self.arm_mux_timer(Timeout::PsSourceOn);
                self.set_state(ConnectionState::AttachedSink);
                return;
            }
        }

        if self.debounce_cc() {
            if (self.cc1 == CcLevel::Rp && self.cc2 == CcLevel::Open)
                || (self.cc2 == CcLevel::Rp && self.cc1 == CcLevel::Open)
            {
                self.arm_mux_timer(Timeout::PsSourceOn);
                self.set_state(ConnectionState::AttachedSink);
            } else {
                self.set_state_unattached();
            }
            return;
        }

        self.arm_mux_timer(Timeout::CcDebounce);
    }

    pub(super) fn state_attach_wait_source(&mut self, evt: Events) {
        if !evt.contains(Events::TIMER_MUX) {
            return;
        }

        if self.debounce_cc() {
            let one_open = self.cc1 == CcLevel::Open || self.cc2 == CcLevel::Open;
            let one_rd = self.cc1 == CcLevel::Rd || self.cc2 == CcLevel::Rd;

            if one_open && one_rd {
                if self.config.role == RoleMode::Drp
                    && self.config.try_role == Some(PowerRole::Sink)
                    && !self.try_role_complete
                {
                    self.try_attach_as(PowerRole::Sink);
                } else {
                    self.set_state(ConnectionState::AttachedSource);
                }
            } else {
                self.set_state_unattached();
            }
            return;
        }

        self.arm_mux_timer(Timeout::CcDebounce);
    }

    pub(super) fn state_attached_sink(&mut self, evt: Events) {
        if self.phy.vbus_present() {
            self.timers.disarm(TimerId::Mux);
            self.timers.disarm(TimerId::State);

            if !self.try_role_complete
                && self.config.try_role == Some(PowerRole::Source)
                && self.config.role == RoleMode::Drp
            {
                self.try_attach_as(PowerRole::Source);
                return;
            }

            self.try_role_complete = true;
            self.notify.cc_connected = true;
            self.notify.power_role = PowerRole::Sink;
            self.notify.data_role = DataRole::Ufp;
            self.hard_reset_count.reset();
            self.set_state(ConnectionState::SinkStartup);
            info!("CC connected as UFP on {:?}", self.polarity);
            return;
        } else if evt.contains(Events::TIMER_MUX) {
            self.set_state_unattached();
            return;
        }

        // VBUS not present yet. Re-poll shortly, bounded by the mux timer.
        self.arm_state_timer(Timeout::CcDebounce);
    }

    pub(super) fn state_attached_source(&mut self, _evt: Events) {
        self.phy.set_vbus(true);
        self.phy.set_polarity(self.polarity);
        self.phy.set_vconn(true);
        self.vconn_enabled = true;

        self.notify.cc_connected = true;
        self.notify.power_role = PowerRole::Source;
        self.notify.data_role = DataRole::Dfp;
        self.hard_reset_count.reset();
        self.set_state(ConnectionState::SourceStartup);
        info!("CC connected as DFP on {:?}", self.polarity);
    }

    /// One Try.SRC/Try.SNK probe cycle in the forced role `mode`.
    pub(super) fn state_try_attach(&mut self, evt: Events, mode: PowerRole) {
        if evt.contains(Events::CC_CHANGE) {
            if let Some((role, polarity)) = self.probe_partner() {
                self.try_role_complete = true;
                self.attach_role = role;

                self.set_state(match role {
                    AttachRole::Sink if mode == PowerRole::Sink => ConnectionState::AttachWaitSink,
                    AttachRole::Source if mode == PowerRole::Source => {
                        ConnectionState::AttachWaitSource
                    }
                    _ => ConnectionState::ErrorRecovery,
                });

                self.polarity = polarity;
                self.phy.set_polarity(polarity);

                let (cc1, cc2) = self.sample_cc();
                self.cc1 = cc1;
                self.cc2 = cc2;
                self.debounce_count = 0;
                self.arm_mux_timer(Timeout::CcDebounce);
                return;
            }
        }

        if evt.contains(Events::TIMER_MUX) {
            if !self.try_role_complete {
                // Nothing found in the preferred role. Probe the other one.
                self.try_role_complete = true;
                self.try_attach_as(match mode {
                    PowerRole::Source => PowerRole::Sink,
                    PowerRole::Sink => PowerRole::Source,
                });
            } else {
                self.set_state(ConnectionState::ErrorRecovery);
            }
        }
    }

    pub(super) fn state_attach_wait_accessory(&mut self, evt: Events) {
        if !evt.contains(Events::TIMER_MUX) {
            return;
        }

        if self.debounce_cc() {
            if self.cc1 == CcLevel::Ra && self.cc2 == CcLevel::Ra {
                self.set_state(ConnectionState::AttachedAccessory);
            } else {
                warn!("unknown accessory, cc {:?} {:?}", self.cc1, self.cc2);
                self.set_state_unattached();
                return;
            }
        }

        self.arm_mux_timer(Timeout::CcDebounce);
    }

    pub(super) fn state_attached_accessory(&mut self, _evt: Events) {
        self.phy.set_polarity(self.polarity);
        self.notify.cc_connected = true;
        self.hard_reset_count.reset();
        self.set_state(ConnectionState::Disabled);
        info!("CC connected as audio accessory");
    }
}
