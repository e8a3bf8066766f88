//! Property-based tests for storage addressing, the access log and hint normalization
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. Slot addresses are deterministic, reduced mod P and key-order sensitive
//! 2. Every logged access chains onto the previous value of its slot
//! 3. The scanner and compiler never panic on arbitrary input

use num_bigint::BigUint;
use proptest::prelude::*;
use starkpass::field::PRIME;
use starkpass::security::normalize_hint;
use starkpass::storage::{storage_read, storage_write};
use starkpass::{
    base_address, hash2, storage_address, CompileOptions, Compiler, FieldElement,
    InMemoryStorage, SExprScanner, StorageTrace,
};
use std::collections::HashSet;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Storage variable names
fn var_name() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-z_][a-z0-9_]{0,30}").unwrap()
}

/// Field elements, including values near the modulus
fn felt() -> impl Strategy<Value = FieldElement> {
    prop_oneof![
        any::<u64>().prop_map(FieldElement::from),
        prop::collection::vec(any::<u8>(), 32)
            .prop_map(|bytes| FieldElement::from_be_bytes_mod_order(&bytes)),
        (0u64..16).prop_map(|k| {
            FieldElement::from_biguint(&*PRIME - BigUint::from(1u64 + k))
        }),
    ]
}

/// A storage operation: `(slot, Some(value))` writes, `(slot, None)` reads
fn operation() -> impl Strategy<Value = (u8, Option<u64>)> {
    (0u8..4, prop::option::of(0u64..1000))
}

// =============================================================================
// ADDRESSING
// =============================================================================

proptest! {
    #[test]
    fn prop_address_is_deterministic(name in var_name(), keys in prop::collection::vec(felt(), 0..4)) {
        prop_assert_eq!(storage_address(&name, &keys), storage_address(&name, &keys));
    }

    #[test]
    fn prop_address_is_reduced(name in var_name(), keys in prop::collection::vec(felt(), 0..4)) {
        let address = storage_address(&name, &keys);
        prop_assert!(address.as_biguint() < &*PRIME);
    }

    #[test]
    fn prop_address_folds_keys(name in var_name(), a in felt(), b in felt()) {
        let expected = hash2(&hash2(&base_address(&name), &a), &b);
        prop_assert_eq!(storage_address(&name, &[a, b]), expected);
    }

    #[test]
    fn prop_key_order_matters(name in var_name(), a in felt(), b in felt()) {
        prop_assume!(a != b);
        prop_assert_ne!(
            storage_address(&name, &[a.clone(), b.clone()]),
            storage_address(&name, &[b, a])
        );
    }

    #[test]
    fn prop_distinct_names_distinct_bases(a in var_name(), b in var_name()) {
        prop_assume!(a != b);
        prop_assert_ne!(base_address(&a), base_address(&b));
    }
}

#[test]
fn test_no_collisions_over_100k_keys() {
    let mut seen = HashSet::new();
    for key in 0u64..100_000 {
        assert!(seen.insert(storage_address("balance", &[FieldElement::from(key)])));
    }
    for key in 0u64..1_000 {
        assert!(seen.insert(storage_address("allowance", &[FieldElement::from(key)])));
    }
}

// =============================================================================
// ACCESS LOG
// =============================================================================

proptest! {
    #[test]
    fn prop_trace_chains_per_slot(ops in prop::collection::vec(operation(), 0..64)) {
        let mut storage = InMemoryStorage::new();
        let mut trace = StorageTrace::new();
        let mut ptr = 0usize;

        for (slot, value) in &ops {
            let address = FieldElement::from(*slot as u64);
            ptr = match value {
                Some(v) => storage_write(&mut storage, &mut trace, ptr, &address, FieldElement::from(*v)).unwrap(),
                None => storage_read(&mut storage, &mut trace, ptr, &address).unwrap().0,
            };
        }

        prop_assert_eq!(ptr, ops.len());
        prop_assert_eq!(trace.end(), ops.len());

        for slot in 0u8..4 {
            let address = FieldElement::from(slot as u64);
            let mut current = FieldElement::zero();
            for record in trace.records_for(&address) {
                prop_assert_eq!(&record.prev_value, &current);
                current = record.new_value.clone();
            }
        }
    }

    #[test]
    fn prop_stale_pointer_rejected(ops in 1usize..8, offset in 1usize..4) {
        let mut storage = InMemoryStorage::new();
        let mut trace = StorageTrace::new();
        let address = FieldElement::from(1u64);
        let mut ptr = 0;
        for _ in 0..ops {
            ptr = storage_read(&mut storage, &mut trace, ptr, &address).unwrap().0;
        }
        let stale = ptr.saturating_sub(offset);
        prop_assert!(storage_read(&mut storage, &mut trace, stale, &address).is_err());
        prop_assert_eq!(trace.len(), ops);
    }
}

// =============================================================================
// ROBUSTNESS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_scanner_never_panics(source in prop::string::string_regex(r"[\x00-\x7F]{0,300}").unwrap()) {
        let _ = SExprScanner::new(&source).scan_tokens();
    }

    #[test]
    fn prop_compiler_never_panics(body in prop::string::string_regex(r"[()a-z@. 0-9\n]{0,200}").unwrap()) {
        let compiler = Compiler::new(CompileOptions::default()).unwrap();
        let _ = compiler.compile(&format!("(lang starknet)\n{}", body));
    }

    #[test]
    fn prop_normalization_ignores_spacing(a in 0u32..1000, b in 0u32..1000, pad in " {0,4}") {
        let tight = format!("ids.x = {} + {}", a, b);
        let loose = format!("ids.x{p}={p}{}{p}+{p}{}", a, b, p = pad);
        prop_assert_eq!(normalize_hint(&tight), normalize_hint(&loose));
    }
}
