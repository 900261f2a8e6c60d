//! The responding side of the bus: inbound request dispatch through the
//! parameter table, discovery participation and reply emission.

use crate::command_class::{CommandClassMask, RequestCommandClass};
use crate::consts::{RDM_MAX_PARAMETER_DATA_LENGTH, RDM_PD_REGION_SIZE, SC_RDM};
use crate::dmx_port::{DmxError, DmxPort};
use crate::dmx_uart_driver::{DmxOneShotTimer, DmxUartBus};
use crate::frame_buffer::DmxFrame;
use crate::parameter_format;
use crate::parameter_table::{
    ParameterCallback, ParameterDataType, ParameterDescriptor, ParameterHandler, ParameterSlot,
    ParameterTable, RegistrationError,
};
use crate::persistence::ParameterStore;
use crate::pids;
use crate::rdm_data::{
    serialize_discovery_response, RdmData, RdmDeserializationError, RdmRequestData,
    RdmResponseData,
};
use crate::rdm_types::{DeviceInfo, DiscoveryMuteResponse, DmxPersonality, DmxStartAddress};
use crate::types::{DataPack, NackReason, ResponseType};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};
use log::{debug, trace, warn};

/// The result object of an RDM handler.
pub enum RdmResult {
    /// The package was acknowledged. The [DataPack] contains the response data.
    Acknowledged(DataPack),
    /// The package was acknowledged, but it does not fit into one [DataPack].
    /// The [DataPack] contains the first part of the response.
    AcknowledgedOverflow(DataPack),
    /// The message was not acknowledged. The [u16] is the nack reason.
    NotAcknowledged(u16),
    /// The message was acknowledged but a result can not be delivered
    /// immediately. The [u16] is the wait estimate in 10ms steps.
    AcknowledgedTimer(u16),
    /// The receiver does not respond with anything.
    NoResponse,
}

/// State of the responder a handler is allowed to touch.
pub struct DmxResponderContext<'a> {
    /// The uid of the answering port.
    pub uid: UniqueIdentifier,
    /// True if the device won't respond to discovery requests.
    pub discovery_muted: &'a mut bool,
    /// Raised when persisting a parameter failed; reported through the
    /// discovery-mute control field.
    pub boot_loader_required: &'a mut bool,
    /// The amount of messages in the message queue.
    pub message_count: u8,
}

/// A handler for dmx frames and for rdm parameters registered with
/// [ParameterHandler::Handler].
pub trait DmxResponderHandler {
    type Error;

    /// Handle rdm requests the responder doesn't handle itself.
    fn handle_rdm(
        &mut self,
        _request: &RdmRequestData,
        _context: &mut DmxResponderContext,
    ) -> Result<RdmResult, Self::Error> {
        Ok(RdmResult::NotAcknowledged(
            NackReason::UnsupportedCommandClass as u16,
        ))
    }

    /// Handle received frames with a start code other than `0xCC`. The first
    /// byte is the start code; `0x00` marks a plain dmx package.
    fn handle_dmx(
        &mut self,
        _dmx_frame: DmxFrame,
        _context: &mut DmxResponderContext,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Errors that can happen during polling. These errors should not cause panics.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollingError<DriverError, HandlerError> {
    /// There were fewer bytes written to the uart than there should have been.
    UartOverflow,
    /// The reply could not be placed on the wire in time.
    TimeoutError,
    /// A framing error was seen on the line.
    BusError,
    /// The package size is insufficient.
    WrongPackageSize,
    /// A response was received where a request was expected.
    NotMatching,
    /// A driver specific error occurred.
    DriverError(DriverError),
    /// A handler specific error occurred.
    HandlerError(HandlerError),
    /// Raised when an RDM package could not be deserialized.
    DeserializationError(RdmDeserializationError),
}

impl<DriverError, HandlerError> From<DmxError<DriverError>>
    for PollingError<DriverError, HandlerError>
{
    fn from(value: DmxError<DriverError>) -> Self {
        match value {
            DmxError::UartOverflow => Self::UartOverflow,
            DmxError::BusError => Self::BusError,
            DmxError::TimeoutError => Self::TimeoutError,
            DmxError::DeserializationError(deserialization_error) => {
                Self::DeserializationError(deserialization_error)
            },
            DmxError::DriverError(driver_error) => Self::DriverError(driver_error),
        }
    }
}

impl<DriverError: core::fmt::Display, HandlerError: core::fmt::Display> core::fmt::Display
    for PollingError<DriverError, HandlerError>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let error_message = match self {
            PollingError::UartOverflow => "Uart overflow.",
            PollingError::TimeoutError => "Timeout error.",
            PollingError::BusError => "Bus error.",
            PollingError::WrongPackageSize => "The package size is insufficient.",
            PollingError::NotMatching => "Received response and not request.",
            PollingError::DeserializationError(_) => "Deserialization error.",
            PollingError::DriverError(error) => {
                return core::fmt::Display::fmt(error, f);
            },
            PollingError::HandlerError(error) => {
                return core::fmt::Display::fmt(error, f);
            },
        };

        write!(f, "{}", error_message)
    }
}

#[cfg(feature = "std")]
impl<
        DriverError: core::fmt::Display + core::fmt::Debug,
        HandlerError: core::fmt::Display + core::fmt::Debug,
    > std::error::Error for PollingError<DriverError, HandlerError>
{
}

/// Static identity of the responder.
pub struct RdmResponderMetadata {
    pub device_model_id: u16,
    pub product_category: u16,
    pub software_version_id: u32,
    pub software_version_label: &'static str,
}

impl Default for RdmResponderMetadata {
    fn default() -> Self {
        Self {
            device_model_id: 0,
            product_category: 0x0100,
            software_version_id: 0,
            software_version_label: "dmx-rdm-driver device",
        }
    }
}

pub struct RdmResponderConfig {
    pub metadata: RdmResponderMetadata,
    /// The personality table; the device footprint follows the active entry.
    pub personalities: &'static [DmxPersonality],
    /// The personality active at boot, indexed from one.
    pub current_personality: u8,
}

impl Default for RdmResponderConfig {
    fn default() -> Self {
        static DEFAULT_PERSONALITIES: [DmxPersonality; 1] = [DmxPersonality {
            footprint: 1,
            description: "Default Personality",
        }];

        Self {
            metadata: RdmResponderMetadata::default(),
            personalities: &DEFAULT_PERSONALITIES,
            current_personality: 1,
        }
    }
}

/// Parameters every compliant responder serves without registration by the
/// user. They never show up in SUPPORTED_PARAMETERS.
const REQUIRED_PIDS: [u16; 5] = [
    pids::DEVICE_INFO,
    pids::SOFTWARE_VERSION_LABEL,
    pids::DMX_START_ADDRESS,
    pids::IDENTIFY_DEVICE,
    pids::SUPPORTED_PARAMETERS,
];

/// The structure to build an RDM responder on one port. `PIDS` is the
/// parameter-table capacity, [crate::consts::RDM_RESPONDER_MAX_PIDS] unless
/// overridden.
pub struct RdmResponder<B: DmxUartBus, T: DmxOneShotTimer, S: ParameterStore, const PIDS: usize = 16>
{
    port: DmxPort<B, T>,
    store: S,
    table: ParameterTable<PIDS>,
    metadata: RdmResponderMetadata,
    personalities: &'static [DmxPersonality],
    current_personality: u8,
    discovery_muted: bool,
    boot_loader_required: bool,
    message_count: u8,
}

impl<B: DmxUartBus, T: DmxOneShotTimer, S: ParameterStore, const PIDS: usize>
    RdmResponder<B, T, S, PIDS>
{
    /// Creates a responder and registers the required parameters. The start
    /// address is restored from the store and defaults to 1. A personality
    /// table longer than [crate::consts::DMX_MAX_PERSONALITIES] is truncated.
    pub fn new(port: DmxPort<B, T>, store: S, config: RdmResponderConfig) -> Self {
        let personality_count = config.personalities.len();
        if personality_count > crate::consts::DMX_MAX_PERSONALITIES {
            warn!("personality table truncated to {}", crate::consts::DMX_MAX_PERSONALITIES);
        }
        let personalities =
            &config.personalities[..personality_count.min(crate::consts::DMX_MAX_PERSONALITIES)];

        let mut responder = Self {
            port,
            store,
            table: ParameterTable::new(),
            metadata: config.metadata,
            personalities,
            current_personality: config
                .current_personality
                .clamp(1, personalities.len().max(1) as u8),
            discovery_muted: false,
            boot_loader_required: false,
            message_count: 0,
        };

        responder.register_required_parameters();
        responder
    }

    fn register_required_parameters(&mut self) {
        let device_descriptor = |pid, pdl_size, command_class| ParameterDescriptor {
            pid,
            pdl_size,
            data_type: ParameterDataType::NotDefined,
            command_class,
            unit: 0,
            prefix: 0,
            min_value: 0,
            max_value: 0,
            default_value: 0,
            description: "",
        };

        let computed = [
            (pids::DEVICE_INFO, 0x13u8, "#0100hwwdwbbwwb$"),
            (pids::SOFTWARE_VERSION_LABEL, 32, "a$"),
            (pids::SUPPORTED_PARAMETERS, 0, "w"),
            (pids::DMX_PERSONALITY, 2, "bb$"),
        ];
        for (pid, pdl_size, format) in computed {
            let command_class = if pid == pids::DMX_PERSONALITY {
                CommandClassMask::GetSet
            } else {
                CommandClassMask::Get
            };
            self.table
                .register(ParameterSlot {
                    descriptor: device_descriptor(pid, pdl_size, command_class),
                    format,
                    handler: ParameterHandler::Device,
                    storage: None,
                    persist: false,
                    callback: None,
                })
                .unwrap();
        }

        // the start address survives reboots; fall back to slot 1
        let mut stored = [0u8; 2];
        let start_address = match self.store.load(
            self.port.port_id(),
            pids::DMX_START_ADDRESS,
            ParameterDataType::UnsignedWord,
            &mut stored,
        ) {
            Ok(Some(2)) => u16::from_le_bytes(stored),
            Ok(_) => 1,
            Err(_) => {
                warn!("restoring the start address failed");
                1
            },
        };

        self.table
            .register_with_storage(
                ParameterDescriptor {
                    pid: pids::DMX_START_ADDRESS,
                    pdl_size: 2,
                    data_type: ParameterDataType::UnsignedWord,
                    command_class: CommandClassMask::GetSet,
                    unit: 0,
                    prefix: 0,
                    min_value: 1,
                    max_value: 512,
                    default_value: 1,
                    description: "DMX Start Address",
                },
                "w$",
                true,
                None,
                &start_address.to_le_bytes(),
            )
            .unwrap();

        self.table
            .register_with_storage(
                ParameterDescriptor {
                    pid: pids::IDENTIFY_DEVICE,
                    pdl_size: 1,
                    data_type: ParameterDataType::UnsignedByte,
                    command_class: CommandClassMask::GetSet,
                    unit: 0,
                    prefix: 0,
                    min_value: 0,
                    max_value: 1,
                    default_value: 0,
                    description: "Identify Device",
                },
                "b$",
                false,
                None,
                &[0],
            )
            .unwrap();
    }

    pub fn uid(&self) -> UniqueIdentifier {
        self.port.uid()
    }

    /// Get a reference to the underlying port.
    pub fn get_port(&mut self) -> &mut DmxPort<B, T> {
        &mut self.port
    }

    pub fn discovery_muted(&self) -> bool {
        self.discovery_muted
    }

    pub fn boot_loader_required(&self) -> bool {
        self.boot_loader_required
    }

    /// Reports the queued-message count placed into every response header.
    pub fn message_count(&self) -> u8 {
        self.message_count
    }

    pub fn set_message_count(&mut self, message_count: u8) {
        self.message_count = message_count;
    }

    /// Registers a parameter served from table storage. The initial value
    /// comes from the store when `persist` is set and a record exists,
    /// otherwise from `default`.
    pub fn register_parameter(
        &mut self,
        descriptor: ParameterDescriptor,
        format: &'static str,
        persist: bool,
        callback: Option<ParameterCallback>,
        default: &[u8],
    ) -> Result<(), RegistrationError> {
        let mut seed = [0u8; RDM_PD_REGION_SIZE];
        let size = (descriptor.pdl_size as usize).min(seed.len());
        seed[..default.len().min(size)].copy_from_slice(&default[..default.len().min(size)]);

        if persist {
            if let Ok(Some(loaded)) = self.store.load(
                self.port.port_id(),
                descriptor.pid,
                descriptor.data_type,
                &mut seed[..size],
            ) {
                trace!("restored {} bytes for pid {:#06X}", loaded, descriptor.pid);
            }
        }

        self.table
            .register_with_storage(descriptor, format, persist, callback, &seed[..size])
    }

    /// Registers a parameter answered by the [DmxResponderHandler] passed to
    /// poll.
    pub fn register_handler_parameter(
        &mut self,
        descriptor: ParameterDescriptor,
        format: &'static str,
    ) -> Result<(), RegistrationError> {
        self.table.register(ParameterSlot {
            descriptor,
            format,
            handler: ParameterHandler::Handler,
            storage: None,
            persist: false,
            callback: None,
        })
    }

    /// Reads a parameter's in-memory representation.
    pub fn get_parameter(&self, pid: u16, out: &mut [u8]) -> Option<usize> {
        self.table.get(pid, out)
    }

    /// Writes a parameter's in-memory representation, persisting it when
    /// requested. A failing store never rolls the value back; it raises the
    /// boot-loader-required flag instead.
    pub fn set_parameter(&mut self, pid: u16, data: &[u8], persist: bool) -> bool {
        let Some(written) = self.table.set(pid, data) else {
            return false;
        };

        if persist {
            self.persist_parameter(pid);
        }

        if let Some(slot) = self.table.find(pid) {
            if let (Some(callback), Some(region)) = (slot.callback, slot.storage) {
                callback(pid, self.table.storage(region));
            }
        }

        written > 0
    }

    fn persist_parameter(&mut self, pid: u16) {
        let Some(slot) = self.table.find(pid) else {
            return;
        };
        let (Some(region), data_type) = (slot.storage, slot.descriptor.data_type) else {
            return;
        };

        let mut record = [0u8; RDM_PD_REGION_SIZE];
        let len = region.len().min(record.len());
        record[..len].copy_from_slice(&self.table.storage(region)[..len]);

        if self
            .store
            .store(self.port.port_id(), pid, data_type, &record[..len])
            .is_err()
        {
            warn!("persisting pid {:#06X} failed; flagging boot loader", pid);
            self.boot_loader_required = true;
        }
    }

    /// The current start address, read from the parameter table.
    pub fn dmx_start_address(&self) -> DmxStartAddress {
        let mut raw = [0u8; 2];
        match self.table.get(pids::DMX_START_ADDRESS, &mut raw) {
            Some(2) => DmxStartAddress::try_from(u16::from_le_bytes(raw))
                .unwrap_or(DmxStartAddress::NoAddress),
            _ => DmxStartAddress::NoAddress,
        }
    }

    fn dmx_footprint(&self) -> u16 {
        self.personalities
            .get(self.current_personality as usize - 1)
            .map(|personality| personality.footprint)
            .unwrap_or(0)
    }

    /// Call this as often as you can or on a serial interrupt. It receives
    /// one package and handles it.
    ///
    /// Returns false if no package was received.
    pub fn poll<HandlerError>(
        &mut self,
        handler: &mut dyn DmxResponderHandler<Error = HandlerError>,
    ) -> Result<bool, PollingError<B::DriverError, HandlerError>> {
        let package = match self.port.receive_frame() {
            Err(DmxError::TimeoutError) => return Ok(false),
            result => result?,
        };

        if package.is_empty() {
            return Err(PollingError::WrongPackageSize);
        }

        let start_code = package[0];
        if start_code == SC_RDM {
            self.handle_rdm_package(package, handler)
        } else {
            let mut context = DmxResponderContext {
                uid: self.port.uid(),
                discovery_muted: &mut self.discovery_muted,
                boot_loader_required: &mut self.boot_loader_required,
                message_count: self.message_count,
            };
            handler
                .handle_dmx(package, &mut context)
                .map_err(PollingError::HandlerError)?;
            Ok(true)
        }
    }

    fn handle_rdm_package<HandlerError>(
        &mut self,
        package: DmxFrame,
        handler: &mut dyn DmxResponderHandler<Error = HandlerError>,
    ) -> Result<bool, PollingError<B::DriverError, HandlerError>> {
        let request = match RdmData::deserialize(&package)
            .map_err(PollingError::DeserializationError)?
        {
            RdmData::Request(request) => request,
            RdmData::Response(_) => return Err(PollingError::NotMatching),
        };

        if !request.destination_uid.targets(&self.port.uid()) {
            trace!("request for {:?} ignored", request.destination_uid);
            return Ok(true);
        }

        // discovery command class is reserved for the discovery pids
        if request.command_class == RequestCommandClass::DiscoveryCommand
            && ![pids::DISC_UNIQUE_BRANCH, pids::DISC_MUTE, pids::DISC_UN_MUTE]
                .contains(&request.parameter_id)
        {
            return Ok(true);
        }

        match request.parameter_id {
            pids::DISC_UNIQUE_BRANCH => {
                if let Some(uid) = self.handle_disc_unique_branch(&request) {
                    let response = serialize_discovery_response(uid);
                    self.port.send_frame_no_break(&response)?;
                }
                return Ok(true);
            },
            pids::DISC_MUTE => {
                let response = self.handle_disc_mute(&request, true);
                return self.emit(response);
            },
            pids::DISC_UN_MUTE => {
                let response = self.handle_disc_mute(&request, false);
                return self.emit(response);
            },
            _ => {},
        }

        let response = self.dispatch(&request, handler)?;
        self.emit(response)
    }

    fn emit<HandlerError>(
        &mut self,
        response: Option<RdmResponseData>,
    ) -> Result<bool, PollingError<B::DriverError, HandlerError>> {
        if let Some(response_data) = response {
            let serialized = RdmData::Response(response_data).serialize();
            self.port.send_frame(&serialized, false)?;
        }

        Ok(true)
    }

    /// The NACK ladder and table dispatch of §10 of E1.20: unknown pid,
    /// unsupported command class, sub-device range, then the handler.
    fn dispatch<HandlerError>(
        &mut self,
        request: &RdmRequestData,
        handler: &mut dyn DmxResponderHandler<Error = HandlerError>,
    ) -> Result<Option<RdmResponseData>, PollingError<B::DriverError, HandlerError>> {
        let message_count = self.message_count;

        let Some(slot) = self.table.find(request.parameter_id) else {
            debug!("pid {:#06X} is not registered", request.parameter_id);
            return Ok(build_nack(request, NackReason::UnknownPid, message_count));
        };

        if !slot.descriptor.command_class.permits(request.command_class) {
            return Ok(build_nack(
                request,
                NackReason::UnsupportedCommandClass,
                message_count,
            ));
        }

        // multi-sub-device responders are not supported
        if request.sub_device != 0 {
            return Ok(build_nack(
                request,
                NackReason::SubDeviceOutOfRange,
                message_count,
            ));
        }

        let result = match slot.handler {
            ParameterHandler::Storage => self.storage_request(request),
            ParameterHandler::Device => self.device_request(request),
            ParameterHandler::Handler => {
                let mut context = DmxResponderContext {
                    uid: self.port.uid(),
                    discovery_muted: &mut self.discovery_muted,
                    boot_loader_required: &mut self.boot_loader_required,
                    message_count,
                };
                handler
                    .handle_rdm(request, &mut context)
                    .map_err(PollingError::HandlerError)?
            },
        };

        let response = match result {
            RdmResult::Acknowledged(data) => {
                request.build_response(ResponseType::ResponseTypeAck, data, message_count)
            },
            RdmResult::AcknowledgedOverflow(data) => {
                request.build_response(ResponseType::ResponseTypeAckOverflow, data, message_count)
            },
            RdmResult::NotAcknowledged(reason) => request.build_response(
                ResponseType::ResponseTypeNackReason,
                DataPack::from_slice(&reason.to_be_bytes()).unwrap(),
                message_count,
            ),
            RdmResult::AcknowledgedTimer(timer) => request.build_response(
                ResponseType::ResponseTypeAckTimer,
                DataPack::from_slice(&timer.to_be_bytes()).unwrap(),
                message_count,
            ),
            RdmResult::NoResponse => return Ok(None),
        };

        // broadcasts are acted upon but never answered
        Ok(response.ok())
    }

    fn storage_request(&mut self, request: &RdmRequestData) -> RdmResult {
        let slot = self.table.find(request.parameter_id).unwrap();
        let format = slot.format;
        let persist = slot.persist;
        let callback = slot.callback;
        let Some(region) = slot.storage else {
            return RdmResult::NotAcknowledged(NackReason::HardwareFault as u16);
        };

        match request.command_class {
            RequestCommandClass::GetCommand => {
                let mut wire = [0u8; RDM_MAX_PARAMETER_DATA_LENGTH];
                let storage = self.table.storage(region);
                match parameter_format::emplace(&mut wire, format, storage, false) {
                    Ok(written) => RdmResult::Acknowledged(
                        DataPack::from_slice(&wire[..written]).unwrap(),
                    ),
                    Err(error) => {
                        warn!("get emplace failed: {}", error);
                        RdmResult::NotAcknowledged(NackReason::HardwareFault as u16)
                    },
                }
            },
            RequestCommandClass::SetCommand => {
                let storage = self.table.storage_mut(region);
                match parameter_format::emplace(storage, format, &request.parameter_data, true) {
                    Ok(0) => RdmResult::NotAcknowledged(NackReason::FormatError as u16),
                    Ok(_) => {
                        if persist {
                            self.persist_parameter(request.parameter_id);
                        }
                        if let Some(callback) = callback {
                            callback(request.parameter_id, self.table.storage(region));
                        }
                        RdmResult::Acknowledged(DataPack::new())
                    },
                    Err(_) => RdmResult::NotAcknowledged(NackReason::FormatError as u16),
                }
            },
            RequestCommandClass::DiscoveryCommand => {
                RdmResult::NotAcknowledged(NackReason::UnsupportedCommandClass as u16)
            },
        }
    }

    fn device_request(&mut self, request: &RdmRequestData) -> RdmResult {
        match (request.parameter_id, request.command_class) {
            (pids::DEVICE_INFO, RequestCommandClass::GetCommand) => {
                let device_info = DeviceInfo {
                    device_model_id: self.metadata.device_model_id,
                    product_category: self.metadata.product_category,
                    software_version: self.metadata.software_version_id,
                    dmx_footprint: self.dmx_footprint(),
                    current_personality: self.current_personality,
                    personality_count: self.personalities.len() as u8,
                    dmx_start_address: self.dmx_start_address(),
                    sub_device_count: 0,
                    sensor_count: 0,
                };
                RdmResult::Acknowledged(device_info.serialize())
            },
            (pids::SOFTWARE_VERSION_LABEL, RequestCommandClass::GetCommand) => {
                let label = self.metadata.software_version_label;
                RdmResult::Acknowledged(
                    DataPack::from_slice(&label.as_bytes()[..label.len().min(32)]).unwrap(),
                )
            },
            (pids::SUPPORTED_PARAMETERS, RequestCommandClass::GetCommand) => {
                let mut data = DataPack::new();
                for pid in self.table.pids() {
                    if REQUIRED_PIDS.contains(&pid) {
                        continue;
                    }
                    if data.extend_from_slice(&pid.to_be_bytes()).is_err() {
                        warn!("supported parameter list truncated");
                        break;
                    }
                }
                RdmResult::Acknowledged(data)
            },
            (pids::DMX_PERSONALITY, RequestCommandClass::GetCommand) => {
                RdmResult::Acknowledged(
                    DataPack::from_slice(&[
                        self.current_personality,
                        self.personalities.len() as u8,
                    ])
                    .unwrap(),
                )
            },
            (pids::DMX_PERSONALITY, RequestCommandClass::SetCommand) => {
                if request.parameter_data.len() != 1 {
                    return RdmResult::NotAcknowledged(NackReason::FormatError as u16);
                }

                let personality = request.parameter_data[0];
                if personality == 0 || personality as usize > self.personalities.len() {
                    return RdmResult::NotAcknowledged(NackReason::DataOutOfRange as u16);
                }

                self.current_personality = personality;
                RdmResult::Acknowledged(DataPack::new())
            },
            _ => RdmResult::NotAcknowledged(NackReason::UnsupportedCommandClass as u16),
        }
    }

    fn handle_disc_unique_branch(&self, request: &RdmRequestData) -> Option<UniqueIdentifier> {
        if request.command_class != RequestCommandClass::DiscoveryCommand
            || request.parameter_data.len() != 12
        {
            return None;
        }

        let lower_bound: u64 =
            PackageAddress::from_bytes(&request.parameter_data[..6].try_into().unwrap()).into();
        let upper_bound: u64 =
            PackageAddress::from_bytes(&request.parameter_data[6..].try_into().unwrap()).into();
        let own_uid: u64 = self.port.uid().into();

        if !self.discovery_muted && (lower_bound..=upper_bound).contains(&own_uid) {
            return Some(self.port.uid());
        }

        None
    }

    fn handle_disc_mute(
        &mut self,
        request: &RdmRequestData,
        mute: bool,
    ) -> Option<RdmResponseData> {
        if request.command_class != RequestCommandClass::DiscoveryCommand {
            return build_nack(
                request,
                NackReason::UnsupportedCommandClass,
                self.message_count,
            );
        }

        if !request.parameter_data.is_empty() {
            return None;
        }

        self.discovery_muted = mute;
        trace!("discovery {}", if mute { "muted" } else { "unmuted" });

        let mute_response = DiscoveryMuteResponse {
            managed_proxy: false,
            sub_device: false,
            boot_loader: self.boot_loader_required,
            proxy_device: false,
            binding_uid: None,
        };

        request
            .build_response(
                ResponseType::ResponseTypeAck,
                mute_response.serialize(),
                self.message_count,
            )
            .ok()
    }
}

fn build_nack(
    request: &RdmRequestData,
    nack_reason: NackReason,
    message_count: u8,
) -> Option<RdmResponseData> {
    request
        .build_response(
            ResponseType::ResponseTypeNackReason,
            nack_reason.serialize(),
            message_count,
        )
        .ok()
}
