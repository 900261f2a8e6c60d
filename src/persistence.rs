//! Key-value persistence for parameters flagged as persistent.
//!
//! The backing store is a host concern (non-volatile storage, a file, a
//! fixture database); the driver only needs typed load and store keyed by
//! `(port, pid)` inside the [crate::consts::PERSISTENCE_NAMESPACE]
//! namespace. A failed store never aborts the set operation, it raises the
//! port's boot-loader-required flag instead, which the responder surfaces
//! through the discovery-mute control field.

use crate::parameter_table::ParameterDataType;

pub trait ParameterStore {
    type StoreError;

    /// Loads the record for `(port_id, pid)` into `out`. Returns the record
    /// size, or None if no record exists.
    fn load(
        &mut self,
        port_id: u8,
        pid: u16,
        data_type: ParameterDataType,
        out: &mut [u8],
    ) -> Result<Option<usize>, Self::StoreError>;

    /// Writes the record for `(port_id, pid)`.
    fn store(
        &mut self,
        port_id: u8,
        pid: u16,
        data_type: ParameterDataType,
        data: &[u8],
    ) -> Result<(), Self::StoreError>;
}

/// A store that keeps nothing. Parameters fall back to their defaults on
/// every boot.
#[derive(Debug, Default)]
pub struct NoPersistence;

impl ParameterStore for NoPersistence {
    type StoreError = core::convert::Infallible;

    fn load(
        &mut self,
        _port_id: u8,
        _pid: u16,
        _data_type: ParameterDataType,
        _out: &mut [u8],
    ) -> Result<Option<usize>, Self::StoreError> {
        Ok(None)
    }

    fn store(
        &mut self,
        _port_id: u8,
        _pid: u16,
        _data_type: ParameterDataType,
        _data: &[u8],
    ) -> Result<(), Self::StoreError> {
        Ok(())
    }
}
