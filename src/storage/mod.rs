//! Storage variable support shared by the compiler and the runner
//!
//! - [`address`] - deterministic slot addresses for `(name, keys)`
//! - [`primitives`] - `storage_read` / `storage_write` and the access log

pub mod address;
pub mod primitives;

pub use address::{base_address, field_address, hash2, storage_address};
pub use primitives::{
    storage_read, storage_write, InMemoryStorage, Storage, StorageAccessRecord, StorageTrace,
};
