pub const DMX_NULL_START: u8 = 0x00;
/// start code + 512 data slots
pub const DMX_MAX_PACKAGE_SIZE: usize = 513;
pub const DMX_SLOT_COUNT: usize = 512;
pub const SC_RDM: u8 = 0xCC;
pub const SC_SUB_MESSAGE: u8 = 0x01;

pub const PREAMBLE_BYTE: u8 = 0xFE;
pub const SEPARATOR_BYTE: u8 = 0xAA;
pub const PREAMBLE_MAX_LEN: usize = 7;

pub const BROADCAST_UID: u64 = 0xFFFF_FFFFFFFF;
pub const MAX_DEVICE_UID: u64 = 0x7FFF_FFFFFFFF;

pub const DMX_BAUD: u32 = 250_000;

/// Transmit break length. The E1.11 minimum is 92us.
pub const BREAK_MICROS: u32 = 176;
pub const BREAK_MIN_MICROS: u32 = 92;
/// Transmit mark-after-break length, also the E1.20 minimum.
pub const MAB_MICROS: u32 = 12;
/// Receive gap after which a frame is considered complete.
pub const INTER_SLOT_IDLE_MICROS: u32 = 2_000;
/// Worst-case RDM turnaround before a response may be declared missing.
pub const RDM_RESPONSE_TIMEOUT_MICROS: u32 = 2_800;

pub const RDM_MIN_PACKAGE_SIZE: usize = 22;
pub const RDM_MAX_PACKAGE_SIZE: usize = 257;
/// 24 header bytes + 2 checksum bytes, no parameter data.
pub const RDM_BASE_PACKAGE_SIZE: usize = 26;
/// Encoded UID + encoded checksum, excluding preamble and separator.
pub const RDM_DISCOVERY_RESPONSE_SIZE: usize = 16;
/// Including 7 bytes preamble + 1 byte separator.
pub const RDM_MAX_DISCOVERY_RESPONSE_SIZE: usize = RDM_DISCOVERY_RESPONSE_SIZE + 8;

pub const RDM_MAX_PARAMETER_DATA_LENGTH: usize = 231;
pub const RDM_DEVICE_INFO_SIZE: usize = 0x13;

/// Worst-case depth of the binary descent over the 48-bit UID space.
pub const DISCOVERY_STACK_DEPTH: usize = 49;
pub const DISCOVERY_ATTEMPTS: u8 = 3;

pub const RDM_DEFAULT_MANUFACTURER_ID: u16 = 0x05E0;
/// Sentinel device id meaning "derive the device id from the MAC address".
pub const RDM_DEVICE_ID_FROM_MAC: u32 = 0xFFFF_FFFF;

pub const DMX_MAX_PERSONALITIES: usize = 16;
pub const RDM_RESPONDER_MAX_PIDS: usize = 16;
/// Backing region all registered parameter storage is carved from.
pub const RDM_PD_REGION_SIZE: usize = 256;
pub const PERSISTENCE_NAMESPACE: &str = "nvs";
