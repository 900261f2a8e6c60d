//! The requesting side of the bus: request/response transactions, ACK
//! classification and the typed helpers built on top of them.

use crate::command_class::RequestCommandClass;
use crate::consts::{DMX_NULL_START, RDM_MAX_PARAMETER_DATA_LENGTH};
use crate::dmx_port::{DmxError, DmxPort};
use crate::dmx_uart_driver::{DmxOneShotTimer, DmxUartBus};
use crate::frame_buffer::DmxFrame;
use crate::pids;
use crate::rdm_data::{deserialize_discovery_response, RdmData, RdmRequestData, RdmResponseData};
use crate::rdm_types::{DeviceInfo, DiscoveryMuteResponse, DmxStartAddress};
use crate::types::{AckType, DataPack, RdmAck, ResponseType};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};
use log::{debug, trace, warn};

/// Sub-device wildcard addressing every sub-device of a responder. Not
/// permitted with GET.
pub const SUB_DEVICE_ALL: u16 = 0xFFFF;

/// The outcome of a single discovery branch request.
#[derive(Debug)]
pub enum DiscoveryOption {
    /// No device responded to the discovery request.
    /// There aren't any devices in the specified unique id range.
    NoDevice,
    /// The response couldn't be decoded: more than one device drove the
    /// line in the specified unique id range.
    Collision,
    /// Exactly one unmuted device lives in the specified unique id range.
    Found(UniqueIdentifier),
}

/// The caller-facing half of an RDM request header. Everything else
/// (transaction number, message count) is filled by the controller.
#[derive(Debug, Clone)]
pub struct RdmRequestHeader {
    pub destination_uid: PackageAddress,
    /// Defaults to the port's uid when None.
    pub source_uid: Option<UniqueIdentifier>,
    /// Defaults to the port index + 1 when 0.
    pub port_id: u8,
    pub sub_device: u16,
    pub command_class: RequestCommandClass,
    pub parameter_id: u16,
}

impl RdmRequestHeader {
    /// A root-sub-device request with all defaulted fields.
    pub fn new(
        destination_uid: PackageAddress,
        command_class: RequestCommandClass,
        parameter_id: u16,
    ) -> Self {
        Self {
            destination_uid,
            source_uid: None,
            port_id: 0,
            sub_device: 0,
            command_class,
            parameter_id,
        }
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmResponseError<E> {
    /// The request failed pre-validation.
    InvalidArgument,
    /// Another transaction is still pending on this port.
    PortBusy,
    /// No response was received although one was expected.
    NoResponse,
    /// A response was received but did not match the request.
    NotMatching,
    /// The parameter data couldn't be deserialized.
    ParameterDataNotDeserializable,
    /// The response isn't ready yet; the value is the estimated delay in
    /// milliseconds.
    NotReady(u32),
    /// The responder declined; the value is the wire nack reason.
    NotAcknowledged(u16),
    /// The underlying dmx port raised an error.
    DmxError(DmxError<E>),
}

impl<E: core::fmt::Debug> core::fmt::Display for RdmResponseError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

impl<E> From<DmxError<E>> for RdmResponseError<E> {
    fn from(value: DmxError<E>) -> Self {
        Self::DmxError(value)
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug> std::error::Error for RdmResponseError<E> {}

/// What send_request remembers about the request on the wire while the
/// response is outstanding. Exactly one transaction may be pending per port.
#[derive(Debug)]
struct TransactionState {
    tn: u8,
    expected_cc: RequestCommandClass,
    expected_pid: u16,
    expected_src: UniqueIdentifier,
    destination: PackageAddress,
}

/// An RDM controller on top of one port.
pub struct DmxController<B: DmxUartBus, T: DmxOneShotTimer> {
    port: DmxPort<B, T>,
    transaction_number: u8,
    transaction: Option<TransactionState>,
}

impl<B: DmxUartBus, T: DmxOneShotTimer> DmxController<B, T> {
    pub fn new(port: DmxPort<B, T>) -> Self {
        Self {
            port,
            transaction_number: 0,
            transaction: None,
        }
    }

    pub fn uid(&self) -> UniqueIdentifier {
        self.port.uid()
    }

    /// Get a reference to the underlying port.
    pub fn get_port(&mut self) -> &mut DmxPort<B, T> {
        &mut self.port
    }

    /// Sends a dmx package. Package can't be bigger than 512 bytes.
    pub fn send_dmx_package(&mut self, package: &[u8]) -> Result<(), RdmResponseError<B::DriverError>> {
        let mut frame = DmxFrame::new();
        frame.push(DMX_NULL_START).unwrap();
        frame
            .extend_from_slice(package)
            .map_err(|_| RdmResponseError::InvalidArgument)?;

        self.port
            .send_frame(&frame, false)
            .map_err(RdmResponseError::DmxError)
    }

    /// Sends an RDM request and classifies the response.
    ///
    /// The returned [RdmAck] always describes the outcome; only port-level
    /// failures and argument errors surface as Err. [RdmAck::is_ack] is true
    /// exactly when the responder acknowledged the request.
    pub fn send_request(
        &mut self,
        header: &RdmRequestHeader,
        parameter_data: &[u8],
    ) -> Result<RdmAck, RdmResponseError<B::DriverError>> {
        if self.transaction.is_some() {
            return Err(RdmResponseError::PortBusy);
        }

        self.validate_request(header, parameter_data)?;

        let source_uid = header.source_uid.unwrap_or_else(|| self.port.uid());
        let port_id = if header.port_id == 0 {
            self.port.port_id() + 1
        } else {
            header.port_id
        };

        let is_disc_unique_branch = header.parameter_id == pids::DISC_UNIQUE_BRANCH
            && header.command_class == RequestCommandClass::DiscoveryCommand;
        let response_expected = !header.destination_uid.is_broadcast() || is_disc_unique_branch;

        let request = RdmRequestData {
            destination_uid: header.destination_uid,
            source_uid,
            transaction_number: self.transaction_number,
            port_id,
            message_count: 0,
            sub_device: header.sub_device,
            command_class: header.command_class,
            parameter_id: header.parameter_id,
            parameter_data: DataPack::from_slice(parameter_data)
                .map_err(|_| RdmResponseError::InvalidArgument)?,
        };

        let serialized = RdmData::Request(request).serialize();
        self.port
            .send_frame(&serialized, response_expected)
            .map_err(RdmResponseError::DmxError)?;

        // the request is on the wire now
        let tn = self.transaction_number;
        self.transaction_number = self.transaction_number.wrapping_add(1);

        if !response_expected {
            trace!("broadcast {:#06X} sent, no response expected", header.parameter_id);
            return Ok(RdmAck::none());
        }

        self.transaction = Some(TransactionState {
            tn,
            expected_cc: header.command_class,
            expected_pid: header.parameter_id,
            expected_src: source_uid,
            destination: header.destination_uid,
        });

        let ack = self.collect_response(is_disc_unique_branch);
        self.transaction = None;
        ack
    }

    fn validate_request(
        &self,
        header: &RdmRequestHeader,
        parameter_data: &[u8],
    ) -> Result<(), RdmResponseError<B::DriverError>> {
        if u64::from(header.destination_uid) == 0 {
            return Err(RdmResponseError::InvalidArgument);
        }

        let sub_device_valid = header.sub_device < 513
            || (header.sub_device == SUB_DEVICE_ALL
                && header.command_class != RequestCommandClass::GetCommand);
        if !sub_device_valid {
            return Err(RdmResponseError::InvalidArgument);
        }

        if parameter_data.len() > RDM_MAX_PARAMETER_DATA_LENGTH {
            return Err(RdmResponseError::InvalidArgument);
        }

        Ok(())
    }

    fn collect_response(
        &mut self,
        is_disc_unique_branch: bool,
    ) -> Result<RdmAck, RdmResponseError<B::DriverError>> {
        let frame = match self.port.receive_frame() {
            Ok(frame) => frame,
            Err(DmxError::TimeoutError) => return Ok(RdmAck::none()),
            Err(DmxError::BusError) => return Ok(RdmAck::invalid(0)),
            Err(error) => return Err(RdmResponseError::DmxError(error)),
        };

        if frame.is_empty() {
            return Ok(RdmAck::none());
        }

        if is_disc_unique_branch {
            // discovery responses are not regular rdm frames; report the raw
            // outcome and let the discovery engine interpret it
            return Ok(match deserialize_discovery_response(&frame) {
                Ok(uid) => RdmAck {
                    response: AckType::Ack,
                    size: frame.len(),
                    src_uid: Some(uid),
                    message_count: 0,
                    parameter_data: DataPack::new(),
                },
                Err(error) => {
                    debug!("discovery response undecodable: {}", error);
                    RdmAck::invalid(frame.len())
                },
            });
        }

        let response = match RdmData::deserialize(&frame) {
            Ok(RdmData::Response(response)) => response,
            Ok(RdmData::Request(_)) => {
                debug!("received a request while waiting for a response");
                return Ok(RdmAck::invalid(frame.len()));
            },
            Err(error) => {
                debug!("response undecodable: {}", error);
                return Ok(RdmAck::invalid(frame.len()));
            },
        };

        let transaction = self.transaction.as_ref().unwrap();
        if !transaction.matches(&response) {
            debug!(
                "response does not match transaction {} for pid {:#06X}",
                transaction.tn, transaction.expected_pid
            );
            return Ok(RdmAck::invalid(frame.len()));
        }

        Ok(Self::classify(response, frame.len()))
    }

    fn classify(response: RdmResponseData, size: usize) -> RdmAck {
        let mut ack = RdmAck {
            response: AckType::Invalid,
            size,
            src_uid: Some(response.source_uid),
            message_count: response.message_count,
            parameter_data: DataPack::new(),
        };

        match response.response_type {
            ResponseType::ResponseTypeAck => {
                ack.response = AckType::Ack;
                ack.parameter_data = response.parameter_data;
            },
            ResponseType::ResponseTypeAckTimer => {
                if response.parameter_data.len() != 2 {
                    return ack;
                }
                // responders report the delay in 10ms steps
                let steps =
                    u16::from_be_bytes(response.parameter_data[..2].try_into().unwrap());
                ack.response = AckType::AckTimer(steps as u32 * 10);
            },
            ResponseType::ResponseTypeNackReason => {
                if response.parameter_data.len() != 2 {
                    return ack;
                }
                let reason =
                    u16::from_be_bytes(response.parameter_data[..2].try_into().unwrap());
                ack.response = AckType::NackReason(reason);
            },
            ResponseType::ResponseTypeAckOverflow => {
                warn!("ack overflow received; continuation requests are up to the caller");
                ack.response = AckType::AckOverflow;
                ack.parameter_data = response.parameter_data;
            },
        }

        ack
    }

    /// Sends a discovery request for a range of uids and reports whether
    /// none, one or several devices answered.
    pub fn rdm_discover(
        &mut self,
        first_uid: u64,
        last_uid: u64,
    ) -> Result<DiscoveryOption, RdmResponseError<B::DriverError>> {
        let mut parameter_data = [0u8; 12];
        parameter_data[..6].copy_from_slice(&first_uid.to_be_bytes()[2..8]);
        parameter_data[6..].copy_from_slice(&last_uid.to_be_bytes()[2..8]);

        let header = RdmRequestHeader::new(
            PackageAddress::Broadcast,
            RequestCommandClass::DiscoveryCommand,
            pids::DISC_UNIQUE_BRANCH,
        );

        let ack = self.send_request(&header, &parameter_data)?;
        Ok(match ack.response {
            AckType::Ack => DiscoveryOption::Found(ack.src_uid.unwrap()),
            AckType::None => DiscoveryOption::NoDevice,
            _ => DiscoveryOption::Collision,
        })
    }

    fn rdm_disc_mute_request(
        &mut self,
        uid: PackageAddress,
        parameter_id: u16,
    ) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<B::DriverError>> {
        let header = RdmRequestHeader::new(
            uid,
            RequestCommandClass::DiscoveryCommand,
            parameter_id,
        );

        let ack = self.send_request(&header, &[])?;
        if uid.is_broadcast() {
            return Ok(None);
        }

        let data = expect_ack::<B::DriverError>(ack)?;
        Ok(Some(
            DiscoveryMuteResponse::deserialize(&data)
                .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)?,
        ))
    }

    /// Mute a device from discovery. It will not respond to discovery
    /// requests anymore. Returns None if the request was a broadcast.
    pub fn rdm_disc_mute(
        &mut self,
        uid: PackageAddress,
    ) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<B::DriverError>> {
        self.rdm_disc_mute_request(uid, pids::DISC_MUTE)
    }

    /// Unmute a device from discovery. It will respond to discovery requests
    /// again. Returns None if the request was a broadcast.
    pub fn rdm_disc_un_mute(
        &mut self,
        uid: PackageAddress,
    ) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<B::DriverError>> {
        self.rdm_disc_mute_request(uid, pids::DISC_UN_MUTE)
    }

    /// Sends a get request and returns the acknowledged parameter data.
    pub fn rdm_get(
        &mut self,
        uid: UniqueIdentifier,
        parameter_id: u16,
        parameter_data: &[u8],
    ) -> Result<DataPack, RdmResponseError<B::DriverError>> {
        let header = RdmRequestHeader::new(
            PackageAddress::Device(uid),
            RequestCommandClass::GetCommand,
            parameter_id,
        );

        expect_ack::<B::DriverError>(self.send_request(&header, parameter_data)?)
    }

    /// Sends a set request.
    pub fn rdm_set(
        &mut self,
        uid: PackageAddress,
        parameter_id: u16,
        parameter_data: &[u8],
    ) -> Result<(), RdmResponseError<B::DriverError>> {
        let header = RdmRequestHeader::new(
            uid,
            RequestCommandClass::SetCommand,
            parameter_id,
        );

        let ack = self.send_request(&header, parameter_data)?;
        if uid.is_broadcast() {
            return Ok(());
        }

        expect_ack::<B::DriverError>(ack)?;
        Ok(())
    }

    /// Get the device info from the rdm device.
    pub fn rdm_get_device_info(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<DeviceInfo, RdmResponseError<B::DriverError>> {
        let data = self.rdm_get(uid, pids::DEVICE_INFO, &[])?;
        DeviceInfo::deserialize(&data)
            .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)
    }

    /// Get the identify state of the rdm device (the find-me led).
    pub fn rdm_get_identify(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<bool, RdmResponseError<B::DriverError>> {
        let data = self.rdm_get(uid, pids::IDENTIFY_DEVICE, &[])?;
        if data.len() != 1 {
            return Err(RdmResponseError::ParameterDataNotDeserializable);
        }

        Ok(data[0] != 0)
    }

    /// Set the identify state of the rdm device (the find-me led).
    pub fn rdm_set_identify(
        &mut self,
        uid: PackageAddress,
        enabled: bool,
    ) -> Result<(), RdmResponseError<B::DriverError>> {
        self.rdm_set(uid, pids::IDENTIFY_DEVICE, &[enabled as u8])
    }

    /// Get the current start address of the responder.
    pub fn rdm_get_dmx_start_address(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<DmxStartAddress, RdmResponseError<B::DriverError>> {
        let data = self.rdm_get(uid, pids::DMX_START_ADDRESS, &[])?;
        DmxStartAddress::deserialize(&data)
            .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)
    }

    /// Set the start address of the responder. The address has to be between
    /// 1 and 512.
    pub fn rdm_set_dmx_start_address(
        &mut self,
        uid: PackageAddress,
        start_address: u16,
    ) -> Result<(), RdmResponseError<B::DriverError>> {
        if !(1..=512).contains(&start_address) {
            return Err(RdmResponseError::InvalidArgument);
        }

        self.rdm_set(uid, pids::DMX_START_ADDRESS, &start_address.to_be_bytes())
    }

    /// Get the software version label, up to 32 characters.
    pub fn rdm_get_software_version_label(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<heapless::String<32>, RdmResponseError<B::DriverError>> {
        let data = self.rdm_get(uid, pids::SOFTWARE_VERSION_LABEL, &[])?;
        heapless::String::from_utf8(
            heapless::Vec::<_, 32>::from_slice(&data)
                .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)?,
        )
        .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)
    }
}

impl TransactionState {
    fn matches(&self, response: &RdmResponseData) -> bool {
        response.command_class == self.expected_cc.get_response_class()
            && response.parameter_id == self.expected_pid
            && response.transaction_number == self.tn
            && response.destination_uid == PackageAddress::Device(self.expected_src)
            && self.destination.targets(&response.source_uid)
    }
}

fn expect_ack<E>(ack: RdmAck) -> Result<DataPack, RdmResponseError<E>> {
    match ack.response {
        AckType::Ack | AckType::AckOverflow => Ok(ack.parameter_data),
        AckType::None => Err(RdmResponseError::NoResponse),
        AckType::Invalid => Err(RdmResponseError::NotMatching),
        AckType::AckTimer(millis) => Err(RdmResponseError::NotReady(millis)),
        AckType::NackReason(reason) => Err(RdmResponseError::NotAcknowledged(reason)),
    }
}
