//! Tests for the policy engine.
use tcpm_traits::{CcLevel, CcPull, Polarity};

use super::{AttachRole, ConnectionState, Port, VdmState, DEBOUNCE_COUNT};
use crate::config::{PortConfig, RoleMode};
use crate::counters::{Counter, CounterType};
use crate::dummy::{DummyPhy, DummySink, DummyTimers};
use crate::message::header::{ControlMessageType, DataMessageType, Header};
use crate::message::pdo::{FixedSupply, FixedVariableRequest};
use crate::message::vendor_defined::{
    pin, DisplayPortCapabilities, DisplayPortConfig, DisplayPortStatus, VdmCommand,
    VdmCommandType, VdmHeader, DP_SID, PD_SID,
};
use crate::message::Message;
use crate::timers::TimerId;
use crate::{DataRole, Orientation, PowerRole};

type TestPort = Port<DummyPhy, DummyTimers, DummySink>;

fn port_with_role(role: RoleMode) -> TestPort {
    let config = PortConfig {
        role,
        ..Default::default()
    };

    Port::new(DummyPhy::new(), DummyTimers::new(), DummySink::new(), config)
}

/// The message ID counter of the simulated partner.
fn partner_counter(message_id: u8) -> Counter {
    Counter::new_from_value(CounterType::MessageId, message_id)
}

/// Header template of the simulated partner, with roles opposite to ours.
fn partner_template(port: &TestPort) -> Header {
    match port.notify.power_role {
        PowerRole::Source => Header::new_template(DataRole::Ufp, PowerRole::Sink),
        PowerRole::Sink => Header::new_template(DataRole::Dfp, PowerRole::Source),
    }
}

fn inject(port: &mut TestPort, message: Message) {
    let mut buffer = [0u8; 30];
    let size = message.to_bytes(&mut buffer);
    port.phy.inject_received_data(&buffer[..size]);
}

fn inject_partner_control(port: &mut TestPort, message_type: ControlMessageType, message_id: u8) {
    let header = Header::new_control(partner_template(port), partner_counter(message_id), message_type);
    inject(port, Message::control(header));
}

fn inject_partner_data(
    port: &mut TestPort,
    message_type: DataMessageType,
    objects: &[u32],
    message_id: u8,
) {
    let header = Header::new_data(
        partner_template(port),
        partner_counter(message_id),
        message_type,
        objects.len() as u8,
    );
    inject(port, Message::data(header, objects));
}

fn probe_message(port: &mut TestPort) -> Message {
    Message::from_bytes(&port.phy.probe_transmitted_data()).unwrap()
}

/// Run the debounce loop until the wait state resolves.
fn run_debounce(port: &mut TestPort) {
    for _ in 0..=DEBOUNCE_COUNT {
        port.timers.expire(TimerId::Mux);
        port.poll();
    }
}

/// Attach a sink-only port to a simulated source and stop in
/// `SinkWaitCapabilities`.
fn attach_as_sink(port: &mut TestPort) {
    port.phy.vbus = true;
    port.phy.cc_as_sink = (CcLevel::Open, CcLevel::Rp);
    port.phy.raise_cc_change();
    port.poll();
    assert_eq!(port.state, ConnectionState::AttachWaitSink);

    run_debounce(port);
    assert_eq!(port.state, ConnectionState::SinkWaitCapabilities);
    assert!(port.phy.rx_enabled);
}

/// A single 5 V / 3 A fixed supply capability.
fn five_volt_capability() -> u32 {
    FixedSupply::default()
        .with_raw_voltage(100)
        .with_raw_max_current(300)
        .0
}

/// Put a source port directly into `SourceReady`, as after a finished
/// negotiation.
fn source_ready_port(role: RoleMode) -> TestPort {
    let mut port = port_with_role(role);

    port.notify.cc_connected = true;
    port.notify.pd_connected = true;
    port.notify.power_role = PowerRole::Source;
    port.notify.data_role = DataRole::Dfp;
    port.attach_role = AttachRole::Source;
    port.polarity = Polarity::Cc1;
    port.phy.cc_as_source = (CcLevel::Rd, CcLevel::Open);
    port.phy.vbus = true;
    let _ = port.partner_caps.push(u32::MAX);

    port.set_state(ConnectionState::SourceReady);
    port
}

#[test]
fn set_state_resets_sub_state_and_scratch() {
    let mut port = port_with_role(RoleMode::Sink);

    port.sub_state = 3;
    port.scratch = 7;
    port.set_state(ConnectionState::Disabled);

    assert_eq!(port.sub_state, 0);
    assert_eq!(port.scratch, 0);
    assert!(port.work_continue.contains(super::Events::CONTINUE));
}

#[test]
fn source_attach_on_cc2() {
    let mut port = port_with_role(RoleMode::Source);

    port.phy.cc_as_source = (CcLevel::Open, CcLevel::Rd);
    port.phy.raise_cc_change();
    port.poll();
    assert_eq!(port.state, ConnectionState::AttachWaitSource);

    run_debounce(&mut port);

    // Through AttachedSource into the source policy engine.
    assert_eq!(port.state, ConnectionState::SourceSendCapabilities);
    assert!(port.phy.vbus_driven);
    assert!(port.phy.vconn);
    assert_eq!(port.notify.orientation, Orientation::Cc2);
    assert_eq!(port.notify.power_role, PowerRole::Source);
    assert_eq!(port.notify.data_role, DataRole::Dfp);
    assert!(port.notify.cc_connected);

    let capabilities = probe_message(&mut port);
    assert!(capabilities.is_data(DataMessageType::SourceCapabilities));

    let last = port.notifications.last().copied().unwrap();
    assert!(last.cc_connected);
    assert_eq!(last.orientation, Orientation::Cc2);
}

#[test]
fn debounce_restarts_on_changing_cc() {
    let mut port = port_with_role(RoleMode::Source);

    port.phy.cc_as_source = (CcLevel::Open, CcLevel::Rd);
    port.phy.raise_cc_change();
    port.poll();

    for _ in 0..5 {
        port.timers.expire(TimerId::Mux);
        port.poll();
    }
    assert_eq!(port.debounce_count, 5);
    assert_eq!(port.state, ConnectionState::AttachWaitSource);

    // A flapping line restarts the count.
    port.phy.cc_as_source = (CcLevel::Rd, CcLevel::Open);
    port.timers.expire(TimerId::Mux);
    port.poll();
    assert_eq!(port.debounce_count, 0);
    assert_eq!(port.state, ConnectionState::AttachWaitSource);

    run_debounce(&mut port);
    assert_eq!(port.state, ConnectionState::SourceSendCapabilities);
    assert_eq!(port.notify.orientation, Orientation::Cc2);
}

#[test]
fn good_crc_is_filtered_at_the_receive_boundary() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    let header = Header::new_control(
        partner_template(&port),
        partner_counter(0),
        ControlMessageType::GoodCrc,
    );
    inject(&mut port, Message::control(header));
    port.poll();

    assert_eq!(port.state, ConnectionState::SinkWaitCapabilities);
}

#[test]
fn message_id_increments_only_on_confirmed_transmit() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    inject_partner_data(
        &mut port,
        DataMessageType::SourceCapabilities,
        &[five_volt_capability()],
        0,
    );
    port.poll();
    assert_eq!(port.state, ConnectionState::SinkSelectCapability);

    let request = probe_message(&mut port);
    assert_eq!(request.header.message_id(), 0);
    assert_eq!(port.msg_id.value(), 0);

    port.phy.complete_transmit();
    port.poll();
    assert_eq!(port.msg_id.value(), 1);
}

#[test]
fn message_id_does_not_increment_on_failed_transmit() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    inject_partner_data(
        &mut port,
        DataMessageType::SourceCapabilities,
        &[five_volt_capability()],
        0,
    );
    port.poll();

    let _ = port.phy.probe_transmitted_data();
    port.phy.fail_transmit();
    port.poll();

    assert_eq!(port.msg_id.value(), 0);
    // Transmission failure of the request falls back to discovery.
    assert_eq!(port.state, ConnectionState::SinkWaitCapabilities);
}

#[test]
fn sink_negotiates_five_volts() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    inject_partner_data(
        &mut port,
        DataMessageType::SourceCapabilities,
        &[five_volt_capability()],
        0,
    );
    port.poll();

    // The single 5 V capability is selected and requested.
    assert_eq!(port.selected_capability, 1);
    let request = probe_message(&mut port);
    assert!(request.is_data(DataMessageType::Request));
    assert_eq!(FixedVariableRequest(request.objects[0]).object_position(), 1);
    assert_eq!(FixedVariableRequest(request.objects[0]).raw_operating_current(), 300);

    port.phy.complete_transmit();
    port.poll();

    inject_partner_control(&mut port, ControlMessageType::Accept, 1);
    port.poll();
    assert_eq!(port.state, ConnectionState::SinkTransitionSink);

    inject_partner_control(&mut port, ControlMessageType::PsRdy, 2);
    port.poll();

    assert_eq!(port.state, ConnectionState::SinkReady);
    assert!(port.notify.pd_connected);
    assert_eq!(port.notify.voltage_mv, 5000);
    assert_eq!(port.notify.current_ma, 3000);

    let last = port.notifications.last().copied().unwrap();
    assert!(last.pd_connected);
    assert_eq!(last.voltage_mv, 5000);
}

#[test]
fn sink_selects_highest_matching_index() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    // Two capabilities at or below 5 V; the last match wins, not the first.
    let lower = FixedSupply::default().with_raw_voltage(60).with_raw_max_current(100).0;
    inject_partner_data(
        &mut port,
        DataMessageType::SourceCapabilities,
        &[five_volt_capability(), lower],
        0,
    );
    port.poll();

    assert_eq!(port.selected_capability, 2);
    assert_eq!(port.notify.voltage_mv, 3000);
}

#[test]
fn charger_limit_unlocks_higher_voltages() {
    let config = PortConfig {
        role: RoleMode::Sink,
        charge_limit: Some(crate::config::ChargeLimit {
            max_voltage_mv: 9000,
            max_current_ma: 3000,
        }),
        ..Default::default()
    };
    let mut port = Port::new(DummyPhy::new(), DummyTimers::new(), DummySink::new(), config);
    attach_as_sink(&mut port);

    let nine_volts = FixedSupply::default().with_raw_voltage(180).with_raw_max_current(300).0;
    inject_partner_data(
        &mut port,
        DataMessageType::SourceCapabilities,
        &[five_volt_capability(), nine_volts],
        0,
    );
    port.poll();

    // The charger tolerates 9 V; the limited re-scan upgrades the selection.
    assert_eq!(port.selected_capability, 2);
    assert_eq!(port.notify.voltage_mv, 9000);
    assert_eq!(port.state, ConnectionState::SinkSelectCapability);
}

#[test]
fn sink_reject_exhausts_retry_budget() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    inject_partner_data(
        &mut port,
        DataMessageType::SourceCapabilities,
        &[five_volt_capability()],
        0,
    );
    port.poll();
    let _ = port.phy.probe_transmitted_data();
    port.phy.complete_transmit();
    port.poll();

    inject_partner_control(&mut port, ControlMessageType::Reject, 1);
    port.poll();

    assert_eq!(port.state, ConnectionState::SinkWaitCapabilities);
    assert!(port.hard_reset_count.is_overrun());

    // The next capability timeout goes straight to error recovery instead
    // of another hard reset.
    port.timers.expire(TimerId::State);
    port.poll();

    assert_eq!(port.state, ConnectionState::Unattached);
    assert_eq!(port.phy.hard_resets_sent, 0);
    assert!(!port.notify.cc_connected);
}

#[test]
fn sink_without_pd_partner_falls_back_to_type_c() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);
    port.vbus_at_attach = false;

    let mut expected_count: u8 = 0;
    for _ in 0..3 {
        // Capability timeout sends hard reset signaling.
        port.timers.expire(TimerId::State);
        port.poll();
        assert_eq!(port.state, ConnectionState::SinkSendHardReset);

        // The BMC timeout completes it; no protocol-level acknowledge.
        port.phy.vbus = false;
        port.timers.expire(TimerId::State);
        port.poll();
        expected_count += 1;
        assert_eq!(port.hard_reset_count.value(), expected_count);
        assert_eq!(port.state, ConnectionState::SinkTransitionDefault);

        // Source comes back; bring-up restarts.
        port.phy.vbus = true;
        port.timers.expire(TimerId::State);
        port.poll();
        assert_eq!(port.state, ConnectionState::SinkWaitCapabilities);
    }

    assert!(port.hard_reset_count.is_overrun());
    assert_eq!(port.phy.hard_resets_sent, 3);

    // Budget exhausted without any PD traffic: Type-C only operation.
    port.timers.expire(TimerId::State);
    port.poll();
    assert_eq!(port.state, ConnectionState::Disabled);
}

#[test]
fn source_negotiates_with_requesting_sink() {
    let mut port = port_with_role(RoleMode::Source);

    port.phy.cc_as_source = (CcLevel::Rd, CcLevel::Open);
    port.phy.raise_cc_change();
    port.poll();
    run_debounce(&mut port);
    assert_eq!(port.state, ConnectionState::SourceSendCapabilities);

    let capabilities = probe_message(&mut port);
    assert!(capabilities.is_data(DataMessageType::SourceCapabilities));
    port.phy.complete_transmit();
    port.poll();

    let request = FixedVariableRequest::default()
        .with_object_position(1)
        .with_raw_operating_current(150)
        .with_raw_max_operating_current(150);
    inject_partner_data(&mut port, DataMessageType::Request, &[request.0], 0);
    port.poll();
    assert_eq!(port.state, ConnectionState::SourceTransitionSupply);

    let accept = probe_message(&mut port);
    assert!(accept.is_control(ControlMessageType::Accept));
    port.phy.complete_transmit();
    port.poll();

    // Supply settles after the transition time, then PS_RDY goes out.
    port.timers.expire(TimerId::State);
    port.poll();
    assert!(port.notify.pd_connected);

    let ps_rdy = probe_message(&mut port);
    assert!(ps_rdy.is_control(ControlMessageType::PsRdy));
    port.phy.complete_transmit();
    port.poll();

    // Ready immediately fetches the partner's sink capabilities.
    assert_eq!(port.state, ConnectionState::SourceGetSinkCaps);
    let get_sink_cap = probe_message(&mut port);
    assert!(get_sink_cap.is_control(ControlMessageType::GetSinkCap));
    port.phy.complete_transmit();
    port.poll();

    inject_partner_data(&mut port, DataMessageType::SinkCapabilities, &[five_volt_capability()], 1);
    port.poll();

    assert_eq!(port.partner_caps.len(), 1);
    assert_eq!(port.partner_caps[0], five_volt_capability());
}

#[test]
fn source_rejects_out_of_range_request() {
    let mut port = port_with_role(RoleMode::Source);

    port.phy.cc_as_source = (CcLevel::Rd, CcLevel::Open);
    port.phy.raise_cc_change();
    port.poll();
    run_debounce(&mut port);

    let _ = port.phy.probe_transmitted_data();
    port.phy.complete_transmit();
    port.poll();

    // Only one capability is advertised; position 3 is out of range.
    let request = FixedVariableRequest::default().with_object_position(3);
    inject_partner_data(&mut port, DataMessageType::Request, &[request.0], 0);
    port.poll();
    assert_eq!(port.state, ConnectionState::SourceCapabilityResponse);

    let reject = probe_message(&mut port);
    assert!(reject.is_control(ControlMessageType::Reject));
    port.phy.complete_transmit();
    port.poll();

    // No contract was in place, so the port hard resets.
    assert_eq!(port.state, ConnectionState::SourceSendHardReset);
    assert_eq!(port.phy.hard_resets_sent, 1);
}

fn inject_vdm_ack(port: &mut TestPort, svid: u16, command: VdmCommand, payload: &[u32], message_id: u8) {
    let vdm_header = VdmHeader::new_request(svid, command).with_command_type(VdmCommandType::Ack);

    let mut objects = vec![vdm_header.0];
    objects.extend_from_slice(payload);
    inject_partner_data(port, DataMessageType::VendorDefined, &objects, message_id);
}

/// Complete the pending VDM request and return it.
fn complete_vdm_request(port: &mut TestPort) -> VdmHeader {
    let message = probe_message(port);
    assert!(message.is_data(DataMessageType::VendorDefined));
    port.phy.complete_transmit();
    port.poll();

    VdmHeader(message.objects[0])
}

#[test]
fn auto_vdm_negotiates_displayport() {
    let mut port = source_ready_port(RoleMode::Source);
    port.poll();

    // Discover Identity.
    let request = complete_vdm_request(&mut port);
    assert_eq!(request.command(), VdmCommand::DiscoverIdentity);
    assert_eq!(request.standard_or_vid(), PD_SID);
    inject_vdm_ack(&mut port, PD_SID, VdmCommand::DiscoverIdentity, &[0x2c00_12ab], 0);
    port.poll();
    assert_eq!(port.vdm_state, VdmState::DiscoverSvids);

    // Discover SVIDs; the partner reports the DisplayPort SVID.
    let request = complete_vdm_request(&mut port);
    assert_eq!(request.command(), VdmCommand::DiscoverSvids);
    inject_vdm_ack(&mut port, PD_SID, VdmCommand::DiscoverSvids, &[(DP_SID as u32) << 16], 1);
    port.poll();
    assert_eq!(port.vdm_state, VdmState::DiscoverModes);

    // Discover Modes for that SVID.
    let request = complete_vdm_request(&mut port);
    assert_eq!(request.command(), VdmCommand::DiscoverModes);
    assert_eq!(request.standard_or_vid(), DP_SID);
    let mode = DisplayPortCapabilities::default()
        .with_receptacle_indication(true)
        .with_ufp_d_pin_assignments(pin::C | pin::D)
        .with_signaling_rate(0b01);
    inject_vdm_ack(&mut port, DP_SID, VdmCommand::DiscoverModes, &[mode.0], 2);
    port.poll();
    assert_eq!(port.vdm_state, VdmState::EnterMode);
    assert_eq!(port.notify.pin_assignment_support, pin::C | pin::D);

    // Enter Mode.
    let request = complete_vdm_request(&mut port);
    assert_eq!(request.command(), VdmCommand::EnterMode);
    assert_eq!(request.object_position(), 1);
    inject_vdm_ack(&mut port, DP_SID, VdmCommand::EnterMode, &[], 3);
    port.poll();
    assert_eq!(port.vdm_state, VdmState::UpdateStatus);

    // DisplayPort status: HPD high, no multi-function preference.
    let request = complete_vdm_request(&mut port);
    assert_eq!(request.command(), VdmCommand::DisplayPortStatus);
    let status = DisplayPortStatus::default().with_hpd_state(true);
    inject_vdm_ack(&mut port, DP_SID, VdmCommand::DisplayPortStatus, &[status.0], 4);
    port.poll();
    assert_eq!(port.vdm_state, VdmState::ConfigureDp);

    // DisplayPort configuration carries the selected pin assignment.
    let message = probe_message(&mut port);
    let config = DisplayPortConfig(message.objects[1]);
    assert_eq!(config.pin_assignment(), pin::C);
    assert_eq!(config.select_configuration(), 2);
    port.phy.complete_transmit();
    port.poll();

    inject_vdm_ack(&mut port, DP_SID, VdmCommand::DisplayPortConfig, &[], 5);
    port.poll();

    assert_eq!(port.vdm_state, VdmState::Ready);
    assert!(port.notify.alt_mode_entered);
    assert_eq!(port.notify.pin_assignment, pin::C);
    assert!(port.notify.hpd_level());

    let last = port.notifications.last().copied().unwrap();
    assert!(last.alt_mode_entered);
    assert_eq!(last.pin_assignment, pin::C);
}

#[test]
fn auto_vdm_aborts_permanently_on_nack() {
    let mut port = source_ready_port(RoleMode::Source);
    port.poll();

    let _ = complete_vdm_request(&mut port);
    inject_vdm_ack(&mut port, PD_SID, VdmCommand::DiscoverIdentity, &[0x2c00_12ab], 0);
    port.poll();

    let _ = complete_vdm_request(&mut port);
    inject_vdm_ack(&mut port, PD_SID, VdmCommand::DiscoverSvids, &[(DP_SID as u32) << 16], 1);
    port.poll();

    let _ = complete_vdm_request(&mut port);
    let mode = DisplayPortCapabilities::default()
        .with_receptacle_indication(true)
        .with_ufp_d_pin_assignments(pin::E)
        .with_signaling_rate(0b01);
    inject_vdm_ack(&mut port, DP_SID, VdmCommand::DiscoverModes, &[mode.0], 2);
    port.poll();
    assert_eq!(port.vdm_state, VdmState::EnterMode);

    // The partner refuses mode entry.
    let _ = complete_vdm_request(&mut port);
    let nack = VdmHeader::new_request(DP_SID, VdmCommand::EnterMode)
        .with_command_type(VdmCommandType::Nack);
    inject_partner_data(&mut port, DataMessageType::VendorDefined, &[nack.0], 3);
    port.poll();

    assert_eq!(port.vdm_state, VdmState::Error);
    assert!(!port.notify.alt_mode_entered);

    // The sequencer does not resume for this attach.
    port.timers.expire(TimerId::State);
    port.poll();
    assert_eq!(port.vdm_state, VdmState::Error);
    assert!(!port.phy.has_transmitted_data());
    assert!(!port.notify.alt_mode_entered);
}

#[test]
fn attention_is_published_once() {
    let mut port = source_ready_port(RoleMode::Source);
    port.vdm_state = VdmState::Ready;
    port.poll();

    let attention = VdmHeader::new_request(DP_SID, VdmCommand::Attention);
    let status = DisplayPortStatus::default().with_hpd_state(true).with_irq_hpd(true);
    inject_partner_data(&mut port, DataMessageType::VendorDefined, &[attention.0, status.0], 0);
    port.poll();

    let last = port.notifications.last().copied().unwrap();
    assert!(last.attention);
    assert!(last.hpd_level());
    assert!(last.hpd_irq());

    // One-shot: already cleared in the retained snapshot.
    assert!(!port.notify.attention);
}

#[test]
fn source_accepts_power_role_swap_as_drp() {
    let mut port = source_ready_port(RoleMode::Drp);
    port.vdm_state = VdmState::Ready;
    port.poll();

    inject_partner_control(&mut port, ControlMessageType::PrSwap, 0);
    port.poll();

    let accept = probe_message(&mut port);
    assert!(accept.is_control(ControlMessageType::Accept));
    port.phy.complete_transmit();
    port.poll();
    assert_eq!(port.state, ConnectionState::PrSwapSourceTransitionOff);

    // Transition time passes; supply turns off and Rd is asserted.
    port.timers.expire(TimerId::State);
    port.poll();
    assert!(!port.phy.vbus_driven);
    assert_eq!(port.phy.pull, Some(CcPull::Down));
    assert_eq!(port.state, ConnectionState::PrSwapSourceOff);

    // PS_RDY already carries the new power role in its header.
    let ps_rdy = probe_message(&mut port);
    assert!(ps_rdy.is_control(ControlMessageType::PsRdy));
    assert_eq!(ps_rdy.header.port_power_role(), PowerRole::Sink);
    port.phy.complete_transmit();
    port.poll();

    // The partner reports its supply; the port resumes as sink.
    port.phy.vbus = true;
    inject_partner_control(&mut port, ControlMessageType::PsRdy, 1);
    port.poll();

    assert_eq!(port.state, ConnectionState::SinkWaitCapabilities);
    assert_eq!(port.notify.power_role, PowerRole::Sink);
    assert_eq!(port.attach_role, AttachRole::Sink);
}

#[test]
fn non_drp_source_rejects_power_role_swap() {
    let mut port = source_ready_port(RoleMode::Source);
    port.vdm_state = VdmState::Ready;
    port.poll();

    inject_partner_control(&mut port, ControlMessageType::PrSwap, 0);
    port.poll();

    let reject = probe_message(&mut port);
    assert!(reject.is_control(ControlMessageType::Reject));
    port.phy.complete_transmit();
    port.poll();

    assert_eq!(port.state, ConnectionState::SourceReady);
    assert_eq!(port.notify.power_role, PowerRole::Source);
}

#[test]
fn partner_hard_reset_restarts_bring_up() {
    let mut port = source_ready_port(RoleMode::Source);
    port.vdm_state = VdmState::Ready;
    port.msg_id.set(5);
    port.poll();

    port.phy.raise_hard_reset();
    port.poll();

    assert_eq!(port.msg_id.value(), 0);
    assert_eq!(port.vdm_state, VdmState::DiscoverIdentity);
    assert_eq!(port.phy.phy_resets, 1);
    assert!(!port.notify.pd_connected);
    assert_eq!(port.state, ConnectionState::SourceTransitionDefault);
}

#[test]
fn sink_detaches_when_vbus_drops() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    port.phy.vbus = false;
    port.phy.cc_as_sink = (CcLevel::Open, CcLevel::Open);
    port.phy.raise_cc_change();
    port.poll();

    assert_eq!(port.state, ConnectionState::Unattached);
    assert!(!port.notify.cc_connected);
    assert_eq!(port.phy.pull, Some(CcPull::Down));
}

#[test]
fn ufp_sink_sources_vconn_after_swap() {
    let mut port = port_with_role(RoleMode::Sink);
    attach_as_sink(&mut port);

    inject_partner_data(
        &mut port,
        DataMessageType::SourceCapabilities,
        &[five_volt_capability()],
        0,
    );
    port.poll();
    let _ = port.phy.probe_transmitted_data();
    port.phy.complete_transmit();
    port.poll();
    inject_partner_control(&mut port, ControlMessageType::Accept, 1);
    port.poll();
    inject_partner_control(&mut port, ControlMessageType::PsRdy, 2);
    port.poll();
    assert_eq!(port.state, ConnectionState::SinkReady);

    inject_partner_control(&mut port, ControlMessageType::VconnSwap, 3);
    port.poll();

    let accept = probe_message(&mut port);
    assert!(accept.is_control(ControlMessageType::Accept));
    port.phy.complete_transmit();
    port.poll();

    // Not sourcing VCONN before the swap: turn it on, then report PS_RDY.
    assert!(port.phy.vconn);
    let ps_rdy = probe_message(&mut port);
    assert!(ps_rdy.is_control(ControlMessageType::PsRdy));
    port.phy.complete_transmit();
    port.poll();

    assert_eq!(port.state, ConnectionState::SinkReady);
}

#[test]
fn initiated_data_role_swap_flips_role() {
    let mut port = source_ready_port(RoleMode::Source);
    port.vdm_state = VdmState::Ready;
    port.poll();

    assert!(port.request_data_role_swap());
    port.poll();

    let swap = probe_message(&mut port);
    assert!(swap.is_control(ControlMessageType::DrSwap));
    port.phy.complete_transmit();
    port.poll();

    inject_partner_control(&mut port, ControlMessageType::Accept, 0);
    port.poll();

    assert_eq!(port.state, ConnectionState::SourceReady);
    assert_eq!(port.notify.data_role, DataRole::Ufp);
}
