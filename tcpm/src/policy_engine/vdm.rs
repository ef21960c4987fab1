//! The automatic VDM sequencer.
//!
//! Once a downstream-facing port reaches a ready state, the sequencer walks
//! Discover Identity, Discover SVIDs, Discover Modes (once per SVID), Enter
//! Mode, DisplayPort status and DisplayPort configuration. Every step sends
//! one structured VDM and waits for the answer under the sender response
//! timeout. Alternate mode negotiation is single shot: a NACK or timeout at
//! any step abandons it for the rest of the attach.
use tcpm_traits::Transceiver;

use super::{Events, NotificationSink, Port, TxState};
use crate::message::header::DataMessageType;
use crate::message::vendor_defined::{
    select_pin_assignment, DisplayPortCapabilities, DisplayPortConfig, DisplayPortStatus,
    VdmCommand, VdmCommandType, VdmHeader, DP_SID, PD_SID,
};
use crate::timers::{Timeout, Timer};
use crate::DataRole;

/// Our status VDO as presented to the partner: DFP_D connected.
const DFP_D_STATUS: u32 = 0x05;

/// Position of the sequencer, advanced strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum VdmState {
    /// Query the partner identity.
    #[default]
    DiscoverIdentity,
    /// Query the partner's SVIDs.
    DiscoverSvids,
    /// Query the modes of every discovered SVID.
    DiscoverModes,
    /// Enter the DisplayPort mode.
    EnterMode,
    /// Fetch the initial DisplayPort status.
    UpdateStatus,
    /// Configure the DisplayPort pin assignment.
    ConfigureDp,
    /// Publish the final snapshot.
    Notify,
    /// Negotiation finished.
    Ready,
    /// Negotiation failed; not retried for this attach.
    Error,
}

impl VdmState {
    fn next(self) -> Self {
        match self {
            VdmState::DiscoverIdentity => VdmState::DiscoverSvids,
            VdmState::DiscoverSvids => VdmState::DiscoverModes,
            VdmState::DiscoverModes => VdmState::EnterMode,
            VdmState::EnterMode => VdmState::UpdateStatus,
            VdmState::UpdateStatus => VdmState::ConfigureDp,
            VdmState::ConfigureDp => VdmState::Notify,
            VdmState::Notify => VdmState::Ready,
            other => other,
        }
    }
}

/// Progress of one send-and-await step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VdmStepStatus {
    InProgress,
    Done,
    Failed,
}

impl<PHY: Transceiver, TIM: Timer, SINK: NotificationSink> Port<PHY, TIM, SINK> {
    /// Whether the sequencer still has work on this port.
    pub(super) fn vdm_active(&self) -> bool {
        self.notify.data_role == DataRole::Dfp && self.vdm_state < VdmState::Ready
    }

    /// Decode an inbound vendor-defined message.
    pub(super) fn process_vdm_message(&mut self) {
        let Some(&header_word) = self.rx_message.objects.first() else {
            return;
        };

        let vdm_header = VdmHeader(header_word);
        if !vdm_header.structured() {
            warn!("ignoring unstructured VDM");
            return;
        }

        match vdm_header.command_type() {
            VdmCommandType::Initiator => match vdm_header.command() {
                VdmCommand::Attention => {
                    if let Some(&status) = self.rx_message.objects.get(1) {
                        info!("attention, dp status {:08x}", status);
                        self.notify.dp_status = DisplayPortStatus(status);
                        self.notify.attention = true;
                    }
                }
                _ => warn!("unexpected initiator VDM"),
            },
            VdmCommandType::Ack => self.process_vdm_ack(vdm_header.command()),
            VdmCommandType::Nack => {
                warn!("partner refused VDM {:?}", vdm_header.command());
                self.vdm_state = VdmState::Error;
            }
            VdmCommandType::Busy => warn!("partner busy for VDM {:?}", vdm_header.command()),
        }
    }

    fn process_vdm_ack(&mut self, command: VdmCommand) {
        match command {
            VdmCommand::DiscoverIdentity => {
                self.vdm_id = self.rx_message.objects.get(1).copied().unwrap_or(0);
            }
            VdmCommand::DiscoverSvids => {
                'store: for object in self.rx_message.objects.iter().skip(1) {
                    for svid in [(object >> 16) as u16, (object & 0xffff) as u16] {
                        if svid == 0 || self.vdm_svids.push(svid).is_err() {
                            break 'store;
                        }
                    }
                }
            }
            VdmCommand::DiscoverModes => {
                if let Some(&mode) = self.rx_message.objects.get(1) {
                    let capabilities = DisplayPortCapabilities(mode);

                    if capabilities.dfp_d_pin_assignments() == 0
                        && capabilities.ufp_d_pin_assignments() == 0
                    {
                        // Not a usable DisplayPort mode. Move to the next SVID.
                        self.scratch |= 1;
                        return;
                    }

                    debug!("DisplayPort capabilities: {:08x}", mode);
                    self.notify.dp_capabilities = capabilities;
                    self.notify.pin_assignment = 0;
                    self.notify.pin_assignment_support = capabilities.partner_pin_assignments();
                    self.scratch |= 1;
                }
            }
            VdmCommand::EnterMode => {
                self.scratch = 1;
            }
            VdmCommand::DisplayPortStatus => {
                if let Some(&status) = self.rx_message.objects.get(1) {
                    debug!("DisplayPort status: {:08x}", status);
                    self.notify.dp_status = DisplayPortStatus(status);
                }
                self.scratch = 1;
            }
            VdmCommand::DisplayPortConfig => {
                self.scratch = 1;
                info!("DP configured, pin assignment {:02x}", self.notify.pin_assignment);
                self.notify.alt_mode_entered = true;
            }
            _ => {}
        }
    }

    /// Build and queue the request message of one sequencer step.
    fn queue_vdm_request(&mut self, command: VdmCommand) {
        match command {
            VdmCommand::DiscoverIdentity | VdmCommand::DiscoverSvids => {
                let header = VdmHeader::new_request(PD_SID, command);
                self.queue_data(DataMessageType::VendorDefined, &[header.0]);
            }
            VdmCommand::DiscoverModes => {
                let svid = self
                    .vdm_svids
                    .get((self.scratch >> 1) as usize)
                    .copied()
                    .unwrap_or(0);
                let header = VdmHeader::new_request(svid, command);
                self.queue_data(DataMessageType::VendorDefined, &[header.0]);
            }
            VdmCommand::EnterMode => {
                let header = VdmHeader::new_request(DP_SID, command).with_object_position(1);
                self.queue_data(DataMessageType::VendorDefined, &[header.0]);
            }
            VdmCommand::DisplayPortStatus => {
                let header = VdmHeader::new_request(DP_SID, command).with_object_position(1);
                self.queue_data(DataMessageType::VendorDefined, &[header.0, DFP_D_STATUS]);
            }
            VdmCommand::DisplayPortConfig => {
                let header = VdmHeader::new_request(DP_SID, command).with_object_position(1);

                let assignment =
                    select_pin_assignment(self.notify.dp_capabilities, self.notify.dp_status)
                        .unwrap_or(0);
                self.notify.pin_assignment = assignment;

                let config = DisplayPortConfig::default()
                    .with_select_configuration(2)
                    .with_signaling(1)
                    .with_pin_assignment(assignment);
                debug!("DisplayPort configuration: {:08x}", config.0);

                self.queue_data(DataMessageType::VendorDefined, &[header.0, config.0]);
            }
            _ => {}
        }
    }

    fn vdm_step_entry(&mut self, command: VdmCommand) {
        match command {
            VdmCommand::DiscoverIdentity => self.vdm_id = 0,
            VdmCommand::DiscoverSvids => self.vdm_svids.clear(),
            VdmCommand::EnterMode => self.notify.alt_mode_entered = false,
            _ => {}
        }
    }

    fn vdm_step_complete(&self, command: VdmCommand) -> bool {
        match command {
            VdmCommand::DiscoverIdentity => self.vdm_id != 0,
            VdmCommand::DiscoverSvids => !self.vdm_svids.is_empty(),
            _ => self.scratch != 0,
        }
    }

    /// One send-and-await step of the sequencer.
    fn vdm_step(&mut self, evt: Events, command: VdmCommand) -> VdmStepStatus {
        if self.vdm_send_state == 0 {
            self.queue_vdm_request(command);
            self.vdm_step_entry(command);
            self.vdm_send_state = 1;
        }

        if self.vdm_send_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.vdm_send_state = 2;
                    self.arm_state_timer(Timeout::SenderResponse);
                }
                TxState::Failed => {
                    warn!("VDM {:?} transmission failed", command);
                    self.vdm_state = VdmState::Error;
                    return VdmStepStatus::Failed;
                }
                _ => {}
            }

            if self.vdm_send_state != 2 {
                return VdmStepStatus::InProgress;
            }
        }

        if self.vdm_step_complete(command) {
            self.scratch = 0;
            self.vdm_send_state = 0;
            VdmStepStatus::Done
        } else if evt.contains(Events::TIMER_STATE) {
            warn!("VDM {:?} timed out", command);
            self.vdm_state = VdmState::Error;
            self.work_continue.insert(Events::CONTINUE);
            VdmStepStatus::Failed
        } else {
            VdmStepStatus::InProgress
        }
    }

    /// Discover Modes, repeated once per discovered SVID.
    ///
    /// The scratch value carries the SVID index in its upper bits and the
    /// acknowledged flag in bit zero.
    fn vdm_step_modes(&mut self, evt: Events) -> VdmStepStatus {
        if (self.scratch >> 1) as usize == self.vdm_svids.len() {
            self.scratch = 0;
            return VdmStepStatus::Done;
        }

        if self.vdm_send_state == 0 {
            self.queue_vdm_request(VdmCommand::DiscoverModes);
            self.vdm_send_state = 1;
        }

        if self.vdm_send_state == 1 {
            match self.transmit_queued() {
                TxState::Success => {
                    self.vdm_send_state = 2;
                    self.arm_state_timer(Timeout::SenderResponse);
                }
                TxState::Failed => {
                    warn!("VDM DiscoverModes transmission failed");
                    self.vdm_state = VdmState::Error;
                    return VdmStepStatus::Failed;
                }
                _ => {}
            }

            if self.vdm_send_state != 2 {
                return VdmStepStatus::InProgress;
            }
        }

        if self.scratch & 1 != 0 {
            // This SVID answered. Query the next one.
            self.scratch = (self.scratch & 0xfe) + 2;
            self.vdm_send_state = 0;
            self.work_continue.insert(Events::CONTINUE);
        } else if evt.contains(Events::TIMER_STATE) {
            warn!("VDM DiscoverModes timed out");
            self.vdm_state = VdmState::Error;
            self.work_continue.insert(Events::CONTINUE);
            return VdmStepStatus::Failed;
        }

        VdmStepStatus::InProgress
    }

    /// Advance the sequencer. Runs only while the port is a ready DFP.
    pub(super) fn run_vdm_machine(&mut self, evt: Events) {
        let status = match self.vdm_state {
            VdmState::DiscoverIdentity => self.vdm_step(evt, VdmCommand::DiscoverIdentity),
            VdmState::DiscoverSvids => self.vdm_step(evt, VdmCommand::DiscoverSvids),
            VdmState::DiscoverModes => self.vdm_step_modes(evt),
            VdmState::EnterMode => self.vdm_step(evt, VdmCommand::EnterMode),
            VdmState::UpdateStatus => self.vdm_step(evt, VdmCommand::DisplayPortStatus),
            VdmState::ConfigureDp => self.vdm_step(evt, VdmCommand::DisplayPortConfig),
            VdmState::Notify => {
                // The snapshot is emitted when this dispatch ends.
                self.vdm_state = VdmState::Ready;
                return;
            }
            VdmState::Ready | VdmState::Error => return,
        };

        if status == VdmStepStatus::Done {
            self.vdm_state = self.vdm_state.next();
            self.work_continue.insert(Events::CONTINUE);
        }
    }
}
