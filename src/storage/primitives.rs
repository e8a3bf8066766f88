//! VM-facing storage primitives and the storage access log
//!
//! `storage_ptr` is the index of the next free slot of a [`StorageTrace`]. Each primitive
//! appends exactly one [`StorageAccessRecord`] and returns the advanced pointer.

use crate::error::{Error, Result};
use crate::field::FieldElement;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runtime object answering storage queries during hinted execution
///
/// The values it returns are claims; the access records are what gets checked later.
pub trait Storage {
    /// Current value at `address` (the store's default when never written)
    fn read(&mut self, address: &FieldElement) -> FieldElement;
    /// Replace the value at `address`
    fn write(&mut self, address: &FieldElement, value: FieldElement);
}

/// Hash map backed storage whose default value is zero
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    values: HashMap<FieldElement, FieldElement>,
}

impl InMemoryStorage {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots ever written
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing was written
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Storage for InMemoryStorage {
    fn read(&mut self, address: &FieldElement) -> FieldElement {
        self.values.get(address).cloned().unwrap_or_default()
    }

    fn write(&mut self, address: &FieldElement, value: FieldElement) {
        self.values.insert(address.clone(), value);
    }
}

/// One elementary storage slot access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAccessRecord {
    /// Slot address
    pub key: FieldElement,
    /// Value before the access
    pub prev_value: FieldElement,
    /// Value after the access (equal to `prev_value` for reads)
    pub new_value: FieldElement,
}

/// Append-only log of storage accesses for one contract invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageTrace {
    records: Vec<StorageAccessRecord>,
}

impl StorageTrace {
    /// Creates an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer to the next free slot
    pub fn end(&self) -> usize {
        self.records.len()
    }

    /// All records in access order
    pub fn records(&self) -> &[StorageAccessRecord] {
        &self.records
    }

    /// Records touching `address`, in access order
    pub fn records_for<'a>(
        &'a self,
        address: &'a FieldElement,
    ) -> impl Iterator<Item = &'a StorageAccessRecord> + 'a {
        self.records.iter().filter(move |r| &r.key == address)
    }

    /// Appends a record at `storage_ptr`, which must be the current end
    fn append(&mut self, storage_ptr: usize, record: StorageAccessRecord) -> Result<usize> {
        if storage_ptr != self.records.len() {
            return Err(Error::StorageTrace {
                expected: self.records.len(),
                got: storage_ptr,
            });
        }
        self.records.push(record);
        Ok(storage_ptr + 1)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no access was logged
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `storage_read(storage_ptr, address) -> (storage_ptr', value)`
pub fn storage_read(
    storage: &mut dyn Storage,
    trace: &mut StorageTrace,
    storage_ptr: usize,
    address: &FieldElement,
) -> Result<(usize, FieldElement)> {
    let value = storage.read(address);
    let next = trace.append(
        storage_ptr,
        StorageAccessRecord {
            key: address.clone(),
            prev_value: value.clone(),
            new_value: value.clone(),
        },
    )?;
    tracing::trace!(address = %address, value = %value, "storage_read");
    Ok((next, value))
}

/// `storage_write(storage_ptr, address, value) -> storage_ptr'`
///
/// Writes that do not change the value are logged like any other write.
pub fn storage_write(
    storage: &mut dyn Storage,
    trace: &mut StorageTrace,
    storage_ptr: usize,
    address: &FieldElement,
    value: FieldElement,
) -> Result<usize> {
    let prev_value = storage.read(address);
    let next = trace.append(
        storage_ptr,
        StorageAccessRecord {
            key: address.clone(),
            prev_value,
            new_value: value.clone(),
        },
    )?;
    tracing::trace!(address = %address, value = %value, "storage_write");
    storage.write(address, value);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_read_logs_noop_transition() {
        let mut storage = InMemoryStorage::new();
        let address = FieldElement::from(17u64);
        storage.write(&address, FieldElement::from(45u64));
        let mut trace = StorageTrace::new();

        let (end, value) = storage_read(&mut storage, &mut trace, 0, &address).unwrap();

        assert_eq!(end, 1);
        assert_eq!(value, FieldElement::from(45u64));
        assert_eq!(
            trace.records(),
            &[StorageAccessRecord {
                key: address.clone(),
                prev_value: FieldElement::from(45u64),
                new_value: FieldElement::from(45u64),
            }]
        );
    }

    #[test]
    fn test_storage_write_logs_transition() {
        let mut storage = InMemoryStorage::new();
        let address = FieldElement::from(17u64);
        storage.write(&address, FieldElement::from(45u64));
        let mut trace = StorageTrace::new();

        let end = storage_write(
            &mut storage,
            &mut trace,
            0,
            &address,
            FieldElement::from(42u64),
        )
        .unwrap();

        assert_eq!(end, 1);
        assert_eq!(trace.records()[0].prev_value, FieldElement::from(45u64));
        assert_eq!(trace.records()[0].new_value, FieldElement::from(42u64));
        assert_eq!(storage.read(&address), FieldElement::from(42u64));
    }

    #[test]
    fn test_first_access_sees_default_zero() {
        let mut storage = InMemoryStorage::new();
        let mut trace = StorageTrace::new();
        let address = FieldElement::from(3u64);

        storage_write(&mut storage, &mut trace, 0, &address, FieldElement::from(9u64)).unwrap();

        assert!(trace.records()[0].prev_value.is_zero());
    }

    #[test]
    fn test_noop_write_still_logged() {
        let mut storage = InMemoryStorage::new();
        let mut trace = StorageTrace::new();
        let address = FieldElement::from(3u64);

        storage_write(&mut storage, &mut trace, 0, &address, FieldElement::zero()).unwrap();

        assert_eq!(trace.len(), 1);
        assert_eq!(trace.records()[0].prev_value, trace.records()[0].new_value);
    }

    #[test]
    fn test_stale_pointer_rejected() {
        let mut storage = InMemoryStorage::new();
        let mut trace = StorageTrace::new();
        let address = FieldElement::from(3u64);
        storage_read(&mut storage, &mut trace, 0, &address).unwrap();

        let err = storage_read(&mut storage, &mut trace, 0, &address).unwrap_err();
        assert!(matches!(err, Error::StorageTrace { expected: 1, got: 0 }));
        assert_eq!(trace.len(), 1);
    }
}
