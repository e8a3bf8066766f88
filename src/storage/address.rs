//! Storage address derivation
//!
//! A storage variable slot lives at `fold(keys, base_address(name), hash2)`. The base address
//! is a compile-time constant; the key folding is emitted as `hash2` calls in the generated
//! `addr` accessor, so executed code and [`storage_address`] always agree.

use crate::field::FieldElement;
use sha2::{Digest, Sha256};

/// Hash two field elements into one: `SHA-256(be32(a) || be32(b)) mod P`
pub fn hash2(a: &FieldElement, b: &FieldElement) -> FieldElement {
    let mut hasher = Sha256::new();
    hasher.update(a.to_be_bytes());
    hasher.update(b.to_be_bytes());
    FieldElement::from_be_bytes_mod_order(&hasher.finalize())
}

/// Address of a zero-arity variable: the hash of its length-prefixed name
pub fn base_address(name: &str) -> FieldElement {
    let mut hasher = Sha256::new();
    hasher.update((name.len() as u32).to_be_bytes());
    hasher.update(name.as_bytes());
    FieldElement::from_be_bytes_mod_order(&hasher.finalize())
}

/// Address of the slot `name(keys...)`
pub fn storage_address(name: &str, keys: &[FieldElement]) -> FieldElement {
    keys.iter()
        .fold(base_address(name), |acc, key| hash2(&acc, key))
}

/// Address of the `index`-th elementary field of a multi-field value stored at `address`
pub fn field_address(address: &FieldElement, index: usize) -> FieldElement {
    address + &FieldElement::from(index)
}
