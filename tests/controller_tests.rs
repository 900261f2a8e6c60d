mod common;

use common::{MockLink, MockReply};
use dmx_rdm_driver::command_class::RequestCommandClass;
use dmx_rdm_driver::dmx_controller::{DmxController, RdmRequestHeader, RdmResponseError, SUB_DEVICE_ALL};
use dmx_rdm_driver::dmx_port::{DmxPort, DmxPortConfig};
use dmx_rdm_driver::pids;
use dmx_rdm_driver::rdm_data::{RdmData, RdmRequestData};
use dmx_rdm_driver::rdm_types::{DeviceInfo, DmxStartAddress};
use dmx_rdm_driver::types::{AckType, DataPack, ResponseType};
use dmx_rdm_driver::unique_identifier::{PackageAddress, UniqueIdentifier};

fn controller(link: &MockLink) -> DmxController<common::MockBus, common::MockTimer> {
    let binding_uid = UniqueIdentifier::new(0x05E0, 0x12345678).unwrap();
    let port = DmxPort::new(
        link.bus(),
        link.timer(),
        0,
        binding_uid,
        DmxPortConfig::default(),
    );
    DmxController::new(port)
}

fn responder_uid() -> UniqueIdentifier {
    UniqueIdentifier::new(0x7FF0, 0x00000042).unwrap()
}

fn decode_request(frame: &[u8]) -> RdmRequestData {
    match RdmData::deserialize(frame).unwrap() {
        RdmData::Request(request) => request,
        RdmData::Response(_) => panic!("controller placed a response on the wire"),
    }
}

fn reply_with(response_type: ResponseType, parameter_data: &[u8]) -> impl FnMut(&[u8]) -> MockReply {
    let parameter_data = parameter_data.to_vec();
    move |frame: &[u8]| {
        let request = decode_request(frame);
        let response = request
            .build_response(
                response_type,
                DataPack::from_slice(&parameter_data).unwrap(),
                0,
            )
            .unwrap();
        MockReply::Frame(RdmData::Response(response).serialize().to_vec())
    }
}

#[test]
fn get_device_info_round_trip() {
    let link = MockLink::new();
    let device_info = DeviceInfo {
        device_model_id: 0x0007,
        product_category: 0x0100,
        software_version: 0x00010203,
        dmx_footprint: 4,
        current_personality: 1,
        personality_count: 1,
        dmx_start_address: DmxStartAddress::Address(37),
        sub_device_count: 0,
        sensor_count: 0,
    };
    link.set_auto_responder(reply_with(
        ResponseType::ResponseTypeAck,
        &device_info.serialize(),
    ));

    let mut controller = controller(&link);
    let received = controller.rdm_get_device_info(responder_uid()).unwrap();

    assert_eq!(received.device_model_id, 0x0007);
    assert_eq!(received.dmx_start_address, DmxStartAddress::Address(37));

    // the request itself has to be a well-formed GET for DEVICE_INFO
    let frames = link.written_frames();
    let request = decode_request(&frames[0]);
    assert_eq!(request.command_class, RequestCommandClass::GetCommand);
    assert_eq!(request.parameter_id, pids::DEVICE_INFO);
    assert_eq!(
        request.destination_uid,
        PackageAddress::Device(responder_uid())
    );
    assert_eq!(request.source_uid, controller.uid());
    // port id defaults to port index + 1
    assert_eq!(request.port_id, 1);
}

#[test]
fn ack_timer_converts_ten_ms_steps_to_millis() {
    let link = MockLink::new();
    link.set_auto_responder(reply_with(ResponseType::ResponseTypeAckTimer, &[0x00, 0x32]));

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::DEVICE_INFO,
    );

    let ack = controller.send_request(&header, &[]).unwrap();
    assert!(!ack.is_ack());
    assert_eq!(ack.response, AckType::AckTimer(500));
}

#[test]
fn nack_reason_is_decoded() {
    let link = MockLink::new();
    link.set_auto_responder(reply_with(
        ResponseType::ResponseTypeNackReason,
        &[0x00, 0x00],
    ));

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        0x0080,
    );

    let ack = controller.send_request(&header, &[]).unwrap();
    assert_eq!(ack.response, AckType::NackReason(0x0000));
}

#[test]
fn transaction_number_mismatch_invalidates_the_response() {
    let link = MockLink::new();
    link.set_auto_responder(|frame: &[u8]| {
        let request = decode_request(frame);
        let mut response = request
            .build_response(ResponseType::ResponseTypeAck, DataPack::new(), 0)
            .unwrap();
        response.transaction_number = request.transaction_number.wrapping_sub(1);
        MockReply::Frame(RdmData::Response(response).serialize().to_vec())
    });

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::DEVICE_INFO,
    );

    let ack = controller.send_request(&header, &[]).unwrap();
    assert!(!ack.is_ack());
    assert_eq!(ack.response, AckType::Invalid);
}

#[test]
fn response_from_wrong_device_is_invalid() {
    let link = MockLink::new();
    link.set_auto_responder(|frame: &[u8]| {
        let request = decode_request(frame);
        let mut response = request
            .build_response(ResponseType::ResponseTypeAck, DataPack::new(), 0)
            .unwrap();
        response.source_uid = UniqueIdentifier::new(0x0001, 0x00000001).unwrap();
        MockReply::Frame(RdmData::Response(response).serialize().to_vec())
    });

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::DEVICE_INFO,
    );

    let ack = controller.send_request(&header, &[]).unwrap();
    assert_eq!(ack.response, AckType::Invalid);
}

#[test]
fn timeout_reports_no_response() {
    let link = MockLink::new();
    link.set_auto_responder(|_: &[u8]| MockReply::Silence);

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::DEVICE_INFO,
    );

    let ack = controller.send_request(&header, &[]).unwrap();
    assert_eq!(ack.response, AckType::None);
    assert_eq!(ack.size, 0);
}

#[test]
fn framing_error_reports_invalid() {
    let link = MockLink::new();
    link.set_auto_responder(|_: &[u8]| MockReply::FramingError);

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::DEVICE_INFO,
    );

    let ack = controller.send_request(&header, &[]).unwrap();
    assert_eq!(ack.response, AckType::Invalid);
}

#[test]
fn broadcasts_return_without_waiting() {
    let link = MockLink::new();

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Broadcast,
        RequestCommandClass::SetCommand,
        pids::IDENTIFY_DEVICE,
    );

    let ack = controller.send_request(&header, &[1]).unwrap();
    assert_eq!(ack.response, AckType::None);
    assert_eq!(link.written_frames().len(), 1);
}

#[test]
fn transaction_number_increments_per_sent_request() {
    let link = MockLink::new();
    link.set_auto_responder(|_: &[u8]| MockReply::Silence);

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::DEVICE_INFO,
    );

    for _ in 0..3 {
        controller.send_request(&header, &[]).unwrap();
    }

    let transaction_numbers: Vec<u8> = link
        .written_frames()
        .iter()
        .map(|frame| decode_request(frame).transaction_number)
        .collect();
    assert_eq!(transaction_numbers, vec![0, 1, 2]);
}

#[test]
fn pre_validation_rejects_bad_arguments() {
    let link = MockLink::new();
    let mut controller = controller(&link);

    // oversized parameter data
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::SetCommand,
        pids::DEVICE_LABEL,
    );
    assert!(matches!(
        controller.send_request(&header, &[0u8; 232]),
        Err(RdmResponseError::InvalidArgument)
    ));

    // sub-device out of range
    let mut header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::DEVICE_INFO,
    );
    header.sub_device = 513;
    assert!(matches!(
        controller.send_request(&header, &[]),
        Err(RdmResponseError::InvalidArgument)
    ));

    // the all-sub-devices wildcard cannot be combined with GET
    header.sub_device = SUB_DEVICE_ALL;
    assert!(matches!(
        controller.send_request(&header, &[]),
        Err(RdmResponseError::InvalidArgument)
    ));
    header.command_class = RequestCommandClass::SetCommand;
    assert!(controller.send_request(&header, &[]).is_ok());

    // nothing invalid ever reached the wire
    assert_eq!(link.written_frames().len(), 1);
}

#[test]
fn ack_overflow_is_surfaced_without_continuation() {
    let link = MockLink::new();
    link.set_auto_responder(reply_with(
        ResponseType::ResponseTypeAckOverflow,
        &[0xAA, 0xBB],
    ));

    let mut controller = controller(&link);
    let header = RdmRequestHeader::new(
        PackageAddress::Device(responder_uid()),
        RequestCommandClass::GetCommand,
        pids::SUPPORTED_PARAMETERS,
    );

    let ack = controller.send_request(&header, &[]).unwrap();
    assert_eq!(ack.response, AckType::AckOverflow);
    assert_eq!(ack.parameter_data.as_slice(), &[0xAA, 0xBB]);
    // exactly one request went out; the continuation is the caller's call
    assert_eq!(link.written_frames().len(), 1);
}

#[test]
fn break_and_mab_pace_every_transmission() {
    let link = MockLink::new();
    let mut controller = controller(&link);

    controller.send_dmx_package(&[1, 2, 3]).unwrap();

    link.with_state(|state| {
        assert_eq!(state.breaks_sent, 1);
        // break length first, mark-after-break second
        assert_eq!(state.armed_durations[0], 176);
        assert_eq!(state.armed_durations[1], 12);
    });

    let frames = link.written_frames();
    assert_eq!(frames[0], vec![0x00, 1, 2, 3]);
}
