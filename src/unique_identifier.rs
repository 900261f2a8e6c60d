use crate::consts::BROADCAST_UID;
use crate::rdm_types::DeserializationError;

/// The 48-bit unique id that identifies a device on the bus.
/// The upper 16 bits are the manufacturer id assigned by the esta,
/// the lower 32 bits are the device id.
/// [more information](https://tsp.esta.org/tsp/working_groups/CP/mfctrIDs.php)
///
/// Ordering is lexicographic: manufacturer id first, device id second.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct UniqueIdentifier {
    manufacturer_id: u16,
    device_id: u32,
}

impl core::fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04X}:{:08X}", self.manufacturer_id, self.device_id)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UniqueIdentifier {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:04X}:{:08X}", self.manufacturer_id, self.device_id);
    }
}

impl UniqueIdentifier {
    /// Creates a device uid. Rejects the null uid and all broadcast uids.
    pub fn new(manufacturer_id: u16, device_id: u32) -> Result<Self, DeserializationError> {
        if device_id == u32::MAX || manufacturer_id == u16::MAX {
            return Err(DeserializationError);
        }

        if manufacturer_id == 0 && device_id == 0 {
            return Err(DeserializationError);
        }

        Ok(UniqueIdentifier {
            manufacturer_id,
            device_id,
        })
    }

    /// Derives the binding uid of a device from its MAC address. The device
    /// id is taken from MAC bytes 2 to 5 so that devices of one production
    /// run spread evenly over the search space.
    pub fn from_mac(manufacturer_id: u16, mac: &[u8; 6]) -> Result<Self, DeserializationError> {
        let device_id = u32::from_be_bytes(mac[2..6].try_into().unwrap());
        Self::new(manufacturer_id, device_id)
    }

    /// The uid of a port of a multi-port device: the binding uid with the
    /// last octet xor'd by the port index.
    pub fn for_port(&self, port_id: u8) -> Self {
        Self {
            manufacturer_id: self.manufacturer_id,
            device_id: self.device_id ^ port_id as u32,
        }
    }

    pub fn manufacturer_id(&self) -> u16 {
        self.manufacturer_id
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let mut buffer = [0u8; 6];

        buffer[..2].copy_from_slice(&self.manufacturer_id.to_be_bytes());
        buffer[2..].copy_from_slice(&self.device_id.to_be_bytes());

        buffer
    }

    /// The uid read with its six bytes in reverse order. Some responders ship
    /// with firmware that answers mutes only under this byte order. Returns
    /// None if the reversed value is not a valid device uid.
    pub fn byte_swapped(&self) -> Option<Self> {
        let mut bytes = self.to_bytes();
        bytes.reverse();

        let manufacturer_id = u16::from_be_bytes(bytes[..2].try_into().unwrap());
        let device_id = u32::from_be_bytes(bytes[2..].try_into().unwrap());
        Self::new(manufacturer_id, device_id).ok()
    }
}

impl TryFrom<u64> for UniqueIdentifier {
    type Error = DeserializationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        let manufacturer_id = (value >> u32::BITS) as u16;
        let device_id = (value & u32::MAX as u64) as u32;

        Self::new(manufacturer_id, device_id)
    }
}

impl From<UniqueIdentifier> for u64 {
    fn from(value: UniqueIdentifier) -> Self {
        ((value.manufacturer_id as u64) << u32::BITS) | value.device_id as u64
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PackageAddress {
    /// Broadcast to all devices.
    Broadcast,
    /// Broadcast to all devices of the manufacturer identified by the u16.
    ManufacturerBroadcast(u16),
    /// Send package to a specific device.
    Device(UniqueIdentifier),
}

impl PackageAddress {
    /// Parses a destination field. The null uid is accepted here because it
    /// appears as the lower bound of discovery branch requests; it is never
    /// valid as a source and the codec rejects it there.
    pub fn from_bytes(buffer: &[u8; 6]) -> Self {
        let manufacturer_id = u16::from_be_bytes(buffer[0..2].try_into().unwrap());
        let device_id = u32::from_be_bytes(buffer[2..].try_into().unwrap());

        if device_id == u32::MAX {
            if manufacturer_id == u16::MAX {
                Self::Broadcast
            } else {
                Self::ManufacturerBroadcast(manufacturer_id)
            }
        } else {
            Self::Device(UniqueIdentifier {
                manufacturer_id,
                device_id,
            })
        }
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        match self {
            Self::Broadcast => [0xFFu8; 6],
            Self::ManufacturerBroadcast(manufacturer_id) => {
                let mut buffer = [0xFFu8; 6];
                buffer[..2].copy_from_slice(&manufacturer_id.to_be_bytes());

                buffer
            },
            Self::Device(uid) => uid.to_bytes(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        !matches!(self, PackageAddress::Device(_))
    }

    /// True if a package addressed to this address reaches `uid`: either an
    /// exact match or a matching broadcast alias.
    pub fn targets(&self, uid: &UniqueIdentifier) -> bool {
        match self {
            PackageAddress::Broadcast => true,
            PackageAddress::ManufacturerBroadcast(manufacturer_id) => {
                *manufacturer_id == uid.manufacturer_id()
            },
            PackageAddress::Device(own) => own == uid,
        }
    }
}

impl From<PackageAddress> for u64 {
    fn from(value: PackageAddress) -> Self {
        match value {
            PackageAddress::Broadcast => BROADCAST_UID,
            PackageAddress::ManufacturerBroadcast(manufacturer_id) => {
                ((manufacturer_id as u64) << u32::BITS) | u32::MAX as u64
            },
            PackageAddress::Device(uid) => uid.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_special_uids() {
        UniqueIdentifier::new(0, 0).unwrap_err();
        UniqueIdentifier::new(0xFFFF, 1).unwrap_err();
        UniqueIdentifier::new(0x05E0, u32::MAX).unwrap_err();
        UniqueIdentifier::new(0x05E0, 0).unwrap();
    }

    #[test]
    fn ordering_is_lexicographic() {
        let low_man = UniqueIdentifier::new(0x0001, u32::MAX - 1).unwrap();
        let high_man = UniqueIdentifier::new(0x0002, 0).unwrap();
        assert!(low_man < high_man);

        let a = UniqueIdentifier::new(0x0001, 1).unwrap();
        let b = UniqueIdentifier::new(0x0001, 2).unwrap();
        assert!(a < b);
    }

    #[test]
    fn port_uid_derivation() {
        let binding = UniqueIdentifier::new(0x05E0, 0x12345678).unwrap();
        assert_eq!(binding.for_port(0), binding);
        assert_eq!(binding.for_port(3).device_id(), 0x1234567B);
        assert_eq!(binding.for_port(3).manufacturer_id(), 0x05E0);
    }

    #[test]
    fn byte_swap_round_trip() {
        let uid = UniqueIdentifier::new(0x0102, 0x03040506).unwrap();
        let swapped = uid.byte_swapped().unwrap();
        assert_eq!(swapped.to_bytes(), [0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(swapped.byte_swapped().unwrap(), uid);
    }

    #[test]
    fn broadcast_targeting() {
        let uid = UniqueIdentifier::new(0x05E0, 42).unwrap();
        assert!(PackageAddress::Broadcast.targets(&uid));
        assert!(PackageAddress::ManufacturerBroadcast(0x05E0).targets(&uid));
        assert!(!PackageAddress::ManufacturerBroadcast(0x05E1).targets(&uid));
        assert!(PackageAddress::Device(uid).targets(&uid));
    }

    #[test]
    fn address_from_bytes() {
        assert_eq!(
            PackageAddress::from_bytes(&[0xFF; 6]),
            PackageAddress::Broadcast
        );
        assert_eq!(
            PackageAddress::from_bytes(&[0x05, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF]),
            PackageAddress::ManufacturerBroadcast(0x05E0)
        );
        assert_eq!(
            u64::from(PackageAddress::from_bytes(&[0x05, 0xE0, 0x12, 0x34, 0x56, 0x78])),
            0x05E0_12345678
        );
    }
}
