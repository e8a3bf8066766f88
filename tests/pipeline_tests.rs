/// Integration tests for pipeline composition and the hint whitelist gate
use starkpass::compiler::{MapModuleReader, SystemModules};
use starkpass::{
    contract_pass_manager, default_pass_manager, CompileOptions, Compiler, Error,
    PassManagerContext, Result, Stage,
};
use std::sync::{Arc, Mutex};

const WITH_HINT: &str = r#"
(lang starknet)

@external
(func alloc () ()
  (hint "memory[ap] = segments.add()")
  (return))
"#;

/// Records how many storage variables had accessors by the time it runs
struct AccessorProbe {
    seen: Arc<Mutex<Vec<usize>>>,
}

impl Stage for AccessorProbe {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        let lowered = context
            .storage_vars
            .decls()
            .filter(|decl| context.storage_vars.implementation(&decl.name).is_some())
            .count();
        self.seen.lock().unwrap().push(lowered);
        Ok(())
    }
}

#[test]
fn test_base_pipeline_has_no_contract_stages() {
    let manager =
        default_pass_manager(&CompileOptions::default(), Arc::new(SystemModules)).unwrap();
    assert_eq!(
        manager.stage_names(),
        vec![
            "module_collector",
            "identifier_collector",
            "struct_collector",
            "preprocessor",
            "codegen",
        ]
    );
    assert!(!manager.contains("storage_var_signature"));
}

#[test]
fn test_contract_pipeline_accepts_user_stages() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut manager =
        contract_pass_manager(&CompileOptions::default(), Arc::new(SystemModules)).unwrap();
    manager
        .add_after(
            "storage_var_implementation",
            "probe",
            AccessorProbe { seen: seen.clone() },
        )
        .unwrap();

    let compiler = Compiler::with_pass_manager(CompileOptions::default(), manager);
    compiler
        .compile("(lang starknet)\n@storage_var\n(func a () (felt))\n@storage_var\n(func b ((k felt)) (felt))")
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn test_probe_before_lowering_sees_nothing() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut manager =
        contract_pass_manager(&CompileOptions::default(), Arc::new(SystemModules)).unwrap();
    manager
        .add_before(
            "storage_var_implementation",
            "probe",
            AccessorProbe { seen: seen.clone() },
        )
        .unwrap();

    let compiler = Compiler::with_pass_manager(CompileOptions::default(), manager);
    compiler
        .compile("(lang starknet)\n@storage_var\n(func a () (felt))")
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![0]);
}

#[test]
fn test_unknown_anchor_is_configuration_error() {
    let mut manager =
        contract_pass_manager(&CompileOptions::default(), Arc::new(SystemModules)).unwrap();
    let err = manager
        .add_after(
            "no_such_stage",
            "probe",
            AccessorProbe {
                seen: Arc::new(Mutex::new(Vec::new())),
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::PipelineConfiguration(_)));
}

#[test]
fn test_whitelisted_hint_compiles() {
    let compiler = Compiler::new(CompileOptions::default()).unwrap();
    let contract = compiler.compile(WITH_HINT).unwrap();
    assert_eq!(contract.hints.len(), 1);
    assert_eq!(contract.hints[0].function, "alloc");
}

#[test]
fn test_reformatted_hint_still_matches() {
    let compiler = Compiler::new(CompileOptions::default()).unwrap();
    let source = WITH_HINT.replace("memory[ap] = segments.add()", "memory[ap]=segments.add( )");
    assert!(compiler.compile(&source).is_ok());
}

#[test]
fn test_unlisted_hint_is_rejected() {
    let compiler = Compiler::new(CompileOptions::default()).unwrap();
    let source = WITH_HINT.replace("memory[ap] = segments.add()", "memory[ap] = 1234");
    let err = compiler.compile(&source).unwrap_err();
    match &err {
        Error::SecurityValidation { snippet, location } => {
            assert_eq!(snippet, "memory[ap] = 1234");
            assert_eq!(location.line, 6);
        }
        other => panic!("expected security error, got {:?}", other),
    }
    assert!(err.to_string().contains("Hint is not whitelisted"));
}

#[test]
fn test_disabled_validation_accepts_any_hint() {
    let options = CompileOptions {
        disable_hint_validation: true,
        ..Default::default()
    };
    let compiler = Compiler::new(options).unwrap();
    let source = WITH_HINT.replace("memory[ap] = segments.add()", "import os; os.system('x')");
    assert!(compiler.compile(&source).is_ok());
}

#[test]
fn test_library_hint_is_gated_too() {
    let reader = MapModuleReader::new().with_module(
        "mylib",
        "(func helper () () (hint \"print('hi')\") (return))",
    );
    let compiler =
        Compiler::with_reader(CompileOptions::default(), Arc::new(reader)).unwrap();
    let source = "(lang starknet)\n(import mylib helper)\n\
                  @external\n(func f () () (helper) (return))";
    let err = compiler.compile(source).unwrap_err();
    assert!(matches!(err, Error::SecurityValidation { .. }));
}

#[test]
fn test_missing_import_is_module_error() {
    let compiler = Compiler::new(CompileOptions::default()).unwrap();
    let err = compiler
        .compile("(lang starknet)\n(import nowhere thing)")
        .unwrap_err();
    assert!(matches!(err, Error::ModuleNotFound { .. }));
}
