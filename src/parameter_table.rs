//! The per-port registry of RDM parameters: descriptors, in-memory storage
//! and dispatch hints for the responder engine.

use crate::command_class::CommandClassMask;

use crate::consts::RDM_PD_REGION_SIZE;

/// In-memory presentation of a parameter, matching the PARAMETER_DESCRIPTION
/// data-type field of E1.20.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ParameterDataType {
    NotDefined = 0x00,
    BitField = 0x01,
    Ascii = 0x02,
    UnsignedByte = 0x03,
    SignedByte = 0x04,
    UnsignedWord = 0x05,
    SignedWord = 0x06,
    UnsignedDword = 0x07,
    SignedDword = 0x08,
}

/// Describes one registered parameter.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub pid: u16,
    /// Upper bound of the in-memory representation.
    pub pdl_size: u8,
    pub data_type: ParameterDataType,
    /// The subset of GET and SET the parameter answers to.
    pub command_class: CommandClassMask,
    pub unit: u8,
    pub prefix: u8,
    pub min_value: u32,
    pub max_value: u32,
    pub default_value: u32,
    pub description: &'static str,
}

/// A window into the port's parameter backing region.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PdRegion {
    offset: usize,
    len: usize,
}

impl PdRegion {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// How the responder engine produces the response for a parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParameterHandler {
    /// GET answers with the stored bytes marshalled through the format
    /// string; SET unmarshals into storage.
    Storage,
    /// The responder engine computes the response from device state.
    Device,
    /// The request is forwarded to the [crate::rdm_responder::DmxResponderHandler]
    /// passed to poll.
    Handler,
}

/// Called after a parameter was changed through the bus, with the new
/// in-memory representation.
pub type ParameterCallback = fn(pid: u16, parameter: &[u8]);

#[derive(Debug)]
pub struct ParameterSlot {
    pub descriptor: ParameterDescriptor,
    /// Marshalling instructions for the parameter data, see
    /// [crate::parameter_format].
    pub format: &'static str,
    pub handler: ParameterHandler,
    pub storage: Option<PdRegion>,
    pub persist: bool,
    pub callback: Option<ParameterCallback>,
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationError {
    /// All parameter slots are taken.
    TableFull,
    /// The backing region cannot fit the requested storage.
    RegionFull,
}

impl core::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RegistrationError::TableFull => write!(f, "no more space for parameter slots"),
            RegistrationError::RegionFull => write!(f, "parameter backing region is full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegistrationError {}

/// A fixed-capacity parameter registry plus the bump region its storage is
/// carved from. Registrations are insert-only: a second registration for a
/// pid overwrites descriptor and handlers in place but never frees the slot.
pub struct ParameterTable<const PIDS: usize> {
    slots: heapless::Vec<ParameterSlot, PIDS>,
    region: [u8; RDM_PD_REGION_SIZE],
    region_head: usize,
}

impl<const PIDS: usize> ParameterTable<PIDS> {
    pub fn new() -> Self {
        Self {
            slots: heapless::Vec::new(),
            region: [0; RDM_PD_REGION_SIZE],
            region_head: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Carves storage out of the backing region. The region only ever grows
    /// forward; parameters live for the lifetime of the driver.
    pub fn allocate(&mut self, size: usize) -> Result<PdRegion, RegistrationError> {
        if self.region_head + size > RDM_PD_REGION_SIZE {
            return Err(RegistrationError::RegionFull);
        }

        let region = PdRegion {
            offset: self.region_head,
            len: size,
        };
        self.region_head += size;

        Ok(region)
    }

    /// Registers a slot, overwriting a previous registration of the same pid
    /// in place. The old storage region is kept in that case so pointers
    /// handed out earlier stay meaningful.
    pub fn register(&mut self, mut slot: ParameterSlot) -> Result<(), RegistrationError> {
        if let Some(existing) = self
            .slots
            .iter_mut()
            .find(|existing| existing.descriptor.pid == slot.descriptor.pid)
        {
            if slot.storage.is_none() {
                slot.storage = existing.storage;
            }
            *existing = slot;
            return Ok(());
        }

        self.slots
            .push(slot)
            .map_err(|_| RegistrationError::TableFull)
    }

    /// Registers a parameter backed by freshly allocated storage, seeded
    /// with `initial`.
    pub fn register_with_storage(
        &mut self,
        descriptor: ParameterDescriptor,
        format: &'static str,
        persist: bool,
        callback: Option<ParameterCallback>,
        initial: &[u8],
    ) -> Result<(), RegistrationError> {
        let size = descriptor.pdl_size as usize;
        let region = match self.find(descriptor.pid).and_then(|slot| slot.storage) {
            Some(region) => region,
            None => self.allocate(size)?,
        };

        let storage = &mut self.region[region.offset..region.offset + region.len];
        storage.fill(0);
        let seed = initial.len().min(storage.len());
        storage[..seed].copy_from_slice(&initial[..seed]);

        self.register(ParameterSlot {
            descriptor,
            format,
            handler: ParameterHandler::Storage,
            storage: Some(region),
            persist,
            callback,
        })
    }

    pub fn find(&self, pid: u16) -> Option<&ParameterSlot> {
        self.slots.iter().find(|slot| slot.descriptor.pid == pid)
    }

    pub fn find_mut(&mut self, pid: u16) -> Option<&mut ParameterSlot> {
        self.slots
            .iter_mut()
            .find(|slot| slot.descriptor.pid == pid)
    }

    /// Iterates the registered pids in registration order.
    pub fn pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.slots.iter().map(|slot| slot.descriptor.pid)
    }

    pub fn storage(&self, region: PdRegion) -> &[u8] {
        &self.region[region.offset..region.offset + region.len]
    }

    pub fn storage_mut(&mut self, region: PdRegion) -> &mut [u8] {
        &mut self.region[region.offset..region.offset + region.len]
    }

    /// Copies a parameter's in-memory representation into `out`. ASCII
    /// parameters copy up to their measured length, everything else up to
    /// the descriptor size. Returns the number of bytes copied.
    pub fn get(&self, pid: u16, out: &mut [u8]) -> Option<usize> {
        let slot = self.find(pid)?;
        let region = slot.storage?;
        let storage = self.storage(region);

        let len = match slot.descriptor.data_type {
            ParameterDataType::Ascii => storage
                .iter()
                .position(|byte| *byte == 0)
                .unwrap_or(storage.len()),
            _ => storage.len(),
        }
        .min(out.len());

        out[..len].copy_from_slice(&storage[..len]);
        Some(len)
    }

    /// Overwrites a parameter's in-memory representation. Fails when the pid
    /// is unknown, has no storage, or does not permit SET. Returns the
    /// number of bytes stored.
    pub fn set(&mut self, pid: u16, data: &[u8]) -> Option<usize> {
        let slot = self.find(pid)?;
        if !slot
            .descriptor
            .command_class
            .permits(crate::command_class::RequestCommandClass::SetCommand)
        {
            return None;
        }
        let region = slot.storage?;
        let is_ascii = slot.descriptor.data_type == ParameterDataType::Ascii;

        let storage = &mut self.region[region.offset..region.offset + region.len];
        let len = data.len().min(storage.len());
        if is_ascii {
            storage.fill(0);
        }
        storage[..len].copy_from_slice(&data[..len]);

        Some(len)
    }
}

impl<const PIDS: usize> Default for ParameterTable<PIDS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pids;

    fn descriptor(pid: u16, pdl_size: u8, command_class: CommandClassMask) -> ParameterDescriptor {
        ParameterDescriptor {
            pid,
            pdl_size,
            data_type: ParameterDataType::UnsignedWord,
            command_class,
            unit: 0,
            prefix: 0,
            min_value: 0,
            max_value: 0,
            default_value: 0,
            description: "",
        }
    }

    #[test]
    fn registration_and_lookup() {
        let mut table = ParameterTable::<4>::new();
        table
            .register_with_storage(
                descriptor(pids::DMX_START_ADDRESS, 2, CommandClassMask::GetSet),
                "w$",
                true,
                None,
                &1u16.to_le_bytes(),
            )
            .unwrap();

        assert_eq!(table.len(), 1);
        let slot = table.find(pids::DMX_START_ADDRESS).unwrap();
        assert_eq!(slot.descriptor.pdl_size, 2);
        assert!(table.find(pids::DEVICE_INFO).is_none());
    }

    #[test]
    fn get_and_set_round_trip() {
        let mut table = ParameterTable::<4>::new();
        table
            .register_with_storage(
                descriptor(0x8000, 4, CommandClassMask::GetSet),
                "d$",
                false,
                None,
                &[0, 0, 0, 0],
            )
            .unwrap();

        assert_eq!(table.set(0x8000, &[1, 2, 3, 4]), Some(4));
        let mut out = [0u8; 4];
        assert_eq!(table.get(0x8000, &mut out), Some(4));
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn set_respects_the_command_class_mask() {
        let mut table = ParameterTable::<4>::new();
        table
            .register_with_storage(
                descriptor(0x8001, 2, CommandClassMask::Get),
                "w$",
                false,
                None,
                &[0xAB, 0xCD],
            )
            .unwrap();

        assert_eq!(table.set(0x8001, &[0, 0]), None);
        let mut out = [0u8; 2];
        assert_eq!(table.get(0x8001, &mut out), Some(2));
        assert_eq!(out, [0xAB, 0xCD]);
    }

    #[test]
    fn reregistration_overwrites_in_place() {
        let mut table = ParameterTable::<2>::new();
        table
            .register_with_storage(
                descriptor(0x8000, 2, CommandClassMask::Get),
                "w$",
                false,
                None,
                &[1, 2],
            )
            .unwrap();
        table
            .register_with_storage(
                descriptor(0x8000, 2, CommandClassMask::GetSet),
                "w$",
                false,
                None,
                &[3, 4],
            )
            .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.find(0x8000).unwrap().descriptor.command_class,
            CommandClassMask::GetSet
        );
    }

    #[test]
    fn table_and_region_capacity() {
        let mut table = ParameterTable::<1>::new();
        table
            .register_with_storage(
                descriptor(0x8000, 2, CommandClassMask::Get),
                "w$",
                false,
                None,
                &[0, 0],
            )
            .unwrap();

        assert_eq!(
            table.register_with_storage(
                descriptor(0x8001, 2, CommandClassMask::Get),
                "w$",
                false,
                None,
                &[0, 0],
            ),
            Err(RegistrationError::TableFull)
        );

        let mut big = ParameterTable::<4>::new();
        assert_eq!(
            big.allocate(RDM_PD_REGION_SIZE + 1),
            Err(RegistrationError::RegionFull)
        );
    }

    #[test]
    fn ascii_get_measures_length() {
        let mut table = ParameterTable::<2>::new();
        let mut descriptor = descriptor(0x8002, 32, CommandClassMask::GetSet);
        descriptor.data_type = ParameterDataType::Ascii;

        table
            .register_with_storage(descriptor, "a$", false, None, b"dimmer")
            .unwrap();

        let mut out = [0u8; 32];
        assert_eq!(table.get(0x8002, &mut out), Some(6));
        assert_eq!(&out[..6], b"dimmer");
    }
}
