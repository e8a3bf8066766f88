/// End-to-end tests for storage variables
/// Demonstrates: Source → contract pipeline → Runner → storage access log
use starkpass::{
    storage_address, CompileOptions, CompiledContract, Compiler, Error, FieldElement,
    InMemoryStorage, Runner, Storage, StorageTrace,
};

const BALANCES: &str = r#"
(lang starknet)

@storage_var
(func balance ((owner felt)) (felt))

@storage_var
(func total_supply () (felt))

(struct Point (x felt) (y felt))

@storage_var
(func position ((id felt)) (Point))

@external
(func set_balance (implicit storage_ptr) ((owner felt) (amount felt)) ()
  (balance.write owner amount)
  (return))

@view
(func get_balance (implicit storage_ptr) ((owner felt)) (felt)
  (return (balance.read owner)))

@external
(func mint (implicit storage_ptr) ((owner felt) (amount felt)) ()
  (let current (balance.read owner))
  (balance.write owner (+ current amount))
  (let supply (total_supply.read))
  (total_supply.write (+ supply amount))
  (return))

@external
(func move_to (implicit storage_ptr) ((id felt) (x felt) (y felt)) ()
  (position.write id x y)
  (return))

@view
(func get_position (implicit storage_ptr) ((id felt)) (felt felt)
  (let (x y) (position.read id))
  (return x y))

@view
(func slot_of ((owner felt)) (felt)
  (return (balance.addr owner)))
"#;

fn compile() -> CompiledContract {
    Compiler::new(CompileOptions::default())
        .unwrap()
        .compile(BALANCES)
        .unwrap()
}

fn felt(value: u64) -> FieldElement {
    FieldElement::from(value)
}

#[test]
fn test_e2e_write_write_read() {
    let contract = compile();
    let runner = Runner::new(&contract);
    let mut storage = InMemoryStorage::new();
    let mut trace = StorageTrace::new();

    runner
        .run("set_balance", &[felt(7), felt(100)], &mut storage, &mut trace)
        .unwrap();
    runner
        .run("set_balance", &[felt(7), felt(150)], &mut storage, &mut trace)
        .unwrap();
    let out = runner
        .run("get_balance", &[felt(7)], &mut storage, &mut trace)
        .unwrap();
    assert_eq!(out, vec![felt(150)]);

    let address = storage_address("balance", &[felt(7)]);
    let records: Vec<_> = trace.records_for(&address).collect();
    assert_eq!(records.len(), 3);

    let writes: Vec<_> = records
        .iter()
        .filter(|r| r.prev_value != r.new_value)
        .collect();
    assert_eq!(writes.len(), 2);
    assert_eq!((writes[0].prev_value.clone(), writes[0].new_value.clone()), (felt(0), felt(100)));
    assert_eq!((writes[1].prev_value.clone(), writes[1].new_value.clone()), (felt(100), felt(150)));

    // The read is a no-op transition.
    assert_eq!(records[2].prev_value, felt(150));
    assert_eq!(records[2].new_value, felt(150));
}

#[test]
fn test_e2e_keys_address_distinct_slots() {
    let contract = compile();
    let runner = Runner::new(&contract);
    let mut storage = InMemoryStorage::new();
    let mut trace = StorageTrace::new();

    runner
        .run("mint", &[felt(1), felt(10)], &mut storage, &mut trace)
        .unwrap();
    runner
        .run("mint", &[felt(2), felt(5)], &mut storage, &mut trace)
        .unwrap();
    runner
        .run("mint", &[felt(1), felt(1)], &mut storage, &mut trace)
        .unwrap();

    assert_eq!(storage.read(&storage_address("balance", &[felt(1)])), felt(11));
    assert_eq!(storage.read(&storage_address("balance", &[felt(2)])), felt(5));
    assert_eq!(storage.read(&storage_address("total_supply", &[])), felt(16));
    // read + write on two variables per mint
    assert_eq!(trace.len(), 12);
}

#[test]
fn test_e2e_audit_chain_is_consistent() {
    let contract = compile();
    let runner = Runner::new(&contract);
    let mut storage = InMemoryStorage::new();
    let mut trace = StorageTrace::new();

    for (owner, amount) in [(3, 4), (9, 1), (3, 8), (3, 2), (9, 9)] {
        runner
            .run("mint", &[felt(owner), felt(amount)], &mut storage, &mut trace)
            .unwrap();
    }

    // Replaying the log from an empty store reproduces every prev_value.
    let mut replay = InMemoryStorage::new();
    for record in trace.records() {
        assert_eq!(replay.read(&record.key), record.prev_value);
        replay.write(&record.key, record.new_value.clone());
    }
    for owner in [3u64, 9] {
        let address = storage_address("balance", &[felt(owner)]);
        assert_eq!(replay.read(&address), storage.read(&address));
    }
}

#[test]
fn test_e2e_struct_value_uses_consecutive_slots() {
    let contract = compile();
    let runner = Runner::new(&contract);
    let mut storage = InMemoryStorage::new();
    let mut trace = StorageTrace::new();

    runner
        .run("move_to", &[felt(5), felt(11), felt(12)], &mut storage, &mut trace)
        .unwrap();
    let out = runner
        .run("get_position", &[felt(5)], &mut storage, &mut trace)
        .unwrap();
    assert_eq!(out, vec![felt(11), felt(12)]);

    let base = storage_address("position", &[felt(5)]);
    assert_eq!(storage.read(&base), felt(11));
    assert_eq!(storage.read(&(&base + &felt(1))), felt(12));
    // two writes, then two reads
    assert_eq!(trace.len(), 4);
}

#[test]
fn test_e2e_addr_matches_host_derivation() {
    let contract = compile();
    let out = Runner::new(&contract)
        .run(
            "slot_of",
            &[felt(42)],
            &mut InMemoryStorage::new(),
            &mut StorageTrace::new(),
        )
        .unwrap();
    assert_eq!(out, vec![storage_address("balance", &[felt(42)])]);
}

#[test]
fn test_e2e_invocations_share_trace() {
    let contract = compile();
    let runner = Runner::new(&contract);
    let mut storage = InMemoryStorage::new();
    let mut trace = StorageTrace::new();
    runner
        .run("set_balance", &[felt(1), felt(1)], &mut storage, &mut trace)
        .unwrap();

    // A second invocation continues the same trace.
    runner
        .run("get_balance", &[felt(1)], &mut storage, &mut trace)
        .unwrap();
    assert_eq!(trace.end(), 2);
}

#[test]
fn test_e2e_artifact_metadata() {
    let contract = compile();

    let balance = contract.storage_var("balance").unwrap();
    assert_eq!(balance.arity, 1);
    assert_eq!(balance.value_width, 1);
    assert_eq!(balance.base_address, storage_address("balance", &[]));
    assert_eq!(contract.storage_var("position").unwrap().value_width, 2);

    let names: Vec<&str> = contract.abi.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"set_balance"));
    assert!(names.contains(&"get_position"));
    // accessors are not part of the ABI
    assert!(!names.iter().any(|n| n.contains('.')));

    let restored = CompiledContract::from_json(&contract.to_json().unwrap()).unwrap();
    assert_eq!(restored.storage_vars.len(), contract.storage_vars.len());
    assert_eq!(restored.functions.len(), contract.functions.len());
}

#[test]
fn test_e2e_declaration_errors_surface_with_location() {
    let compiler = Compiler::new(CompileOptions::default()).unwrap();

    let err = compiler
        .compile_file(
            "(lang starknet)\n@storage_var\n(func x ((k felt)) (felt felt))",
            "bad.sx",
        )
        .unwrap_err();
    match err {
        Error::Declaration { location, .. } => {
            assert_eq!(location.file, "bad.sx");
            assert_eq!(location.line, 3);
        }
        other => panic!("expected declaration error, got {:?}", other),
    }

    let err = compiler
        .compile("@storage_var\n(func x () (felt))")
        .unwrap_err();
    assert!(err.to_string().contains("(lang starknet)"));
}

#[test]
fn test_e2e_wrong_accessor_arity() {
    let source = "(lang starknet)\n\
                  @storage_var\n(func balance ((owner felt)) (felt))\n\
                  @view\n\
                  (func f (implicit storage_ptr) () (felt) (return (balance.read 1 2)))";
    let err = Compiler::new(CompileOptions::default())
        .unwrap()
        .compile(source)
        .unwrap_err();
    assert!(matches!(err, Error::Declaration { .. }));
}

#[test]
fn test_e2e_key_named_like_accessor_local_is_rejected() {
    let compiler = Compiler::new(CompileOptions::default()).unwrap();
    for key in ["res", "storage_addr", "value"] {
        let source = format!(
            "(lang starknet)\n@storage_var\n(func owners (({} felt)) (felt))",
            key
        );
        match compiler.compile_file(&source, "owners.sx") {
            Err(Error::Declaration { location, .. }) => {
                assert_eq!(location.file, "owners.sx");
                assert_eq!(location.line, 3);
            }
            other => panic!("key '{}': expected declaration error, got {:?}", key, other),
        }
    }
}

#[test]
fn test_e2e_distinct_keys_never_share_a_slot() {
    let source = "(lang starknet)\n\
                  @storage_var\n(func owners ((who felt)) (felt))\n\
                  @external\n\
                  (func set (implicit storage_ptr) ((who felt) (v felt)) ()\n\
                    (owners.write who v)\n\
                    (return))\n\
                  @view\n(func slot ((who felt)) (felt) (return (owners.addr who)))";
    let contract = Compiler::new(CompileOptions::default())
        .unwrap()
        .compile(source)
        .unwrap();
    let runner = Runner::new(&contract);
    let mut storage = InMemoryStorage::new();
    let mut trace = StorageTrace::new();

    for key in [1u64, 2] {
        let out = runner
            .run("slot", &[felt(key)], &mut storage, &mut trace)
            .unwrap();
        assert_eq!(out, vec![storage_address("owners", &[felt(key)])]);
    }

    runner
        .run("set", &[felt(1), felt(10)], &mut storage, &mut trace)
        .unwrap();
    runner
        .run("set", &[felt(2), felt(20)], &mut storage, &mut trace)
        .unwrap();
    assert_eq!(storage.read(&storage_address("owners", &[felt(1)])), felt(10));
    assert_eq!(storage.read(&storage_address("owners", &[felt(2)])), felt(20));
}
