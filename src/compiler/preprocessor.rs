//! `preprocessor` stage: name resolution, call checking, the hint gate and the ABI
//!
//! Runs after every AST rewrite, so it sees the synthesized storage accessors like any
//! other function. Generated namespaces may call system externs without importing them.

use super::identifiers::{FunctionSignature, SymbolTable};
use super::pass_manager::{PassManagerContext, Stage};
use super::storage_var::STORAGE_PTR;
use crate::error::{Error, Result};
use crate::parser::{
    ExprKind, Expression, Function, Item, Location, Module, Statement, TypeExpr,
};
use crate::security::HintWhitelist;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

const EXTERNAL: &str = "external";
const VIEW: &str = "view";

/// Named ABI value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiMember {
    /// Parameter or output name
    pub name: String,
    /// Cairo type name (always `felt`)
    #[serde(rename = "type")]
    pub ty: String,
}

/// ABI entry of an entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    /// Entry kind (`function`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Function name
    pub name: String,
    /// Inputs in order
    pub inputs: Vec<AbiMember>,
    /// Outputs in order
    pub outputs: Vec<AbiMember>,
    /// `view` for `@view` functions
    #[serde(rename = "stateMutability", skip_serializing_if = "Option::is_none", default)]
    pub state_mutability: Option<String>,
}

/// Checks every function body and builds the ABI
///
/// With `hint_whitelist` set to `None` hints are accepted unchecked.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    hint_whitelist: Option<Arc<HintWhitelist>>,
}

impl Preprocessor {
    /// Preprocessor gating hints through `hint_whitelist`
    pub fn new(hint_whitelist: Option<Arc<HintWhitelist>>) -> Self {
        Preprocessor { hint_whitelist }
    }
}

impl Stage for Preprocessor {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        for module in &context.program.modules {
            check_directives(module)?;
        }

        for (name, func) in context.program.functions() {
            let signature = context.symbols.function(&name).ok_or_else(|| {
                Error::codegen(format!("Function '{}' missing from the symbol table.", name))
            })?;
            check_signature(func)?;
            if func.is_extern {
                continue;
            }
            let mut checker = FunctionChecker::new(
                &context.symbols,
                signature,
                self.hint_whitelist.as_deref(),
            );
            checker.check_body(func)?;
        }

        context.abi = build_abi(&context.program.modules, &context.symbols)?;
        Ok(())
    }
}

fn check_directives(module: &Module) -> Result<()> {
    if let Some(lang) = &module.lang {
        if lang.value != "starknet" {
            return Err(Error::preprocessor(
                format!(
                    "Unsupported lang directive '{}'. Only 'starknet' is supported.",
                    lang.value
                ),
                &lang.location,
            ));
        }
    }
    if let Some(builtins) = &module.builtins {
        if builtins.names.iter().any(|b| b == "storage") {
            return Err(Error::preprocessor(
                "'storage' may not appear in the builtins directive.",
                &builtins.location,
            ));
        }
    }
    Ok(())
}

fn check_signature(func: &Function) -> Result<()> {
    let mut seen = HashSet::new();
    for name in func.implicit_names() {
        if !seen.insert(name.as_str()) {
            return Err(Error::preprocessor(
                format!("Duplicate argument '{}'.", name),
                &func.location,
            ));
        }
    }
    for param in &func.params {
        if param.ty != TypeExpr::Felt {
            return Err(Error::preprocessor(
                format!(
                    "Parameter '{}' has type '{}'; only felt parameters are supported.",
                    param.name, param.ty
                ),
                &param.location,
            ));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(Error::preprocessor(
                format!("Duplicate argument '{}'.", param.name),
                &param.location,
            ));
        }
    }
    if func.returns.iter().any(|ty| *ty != TypeExpr::Felt) {
        return Err(Error::preprocessor(
            "Only felt return values are supported.",
            &func.returns_location,
        ));
    }
    Ok(())
}

struct FunctionChecker<'a> {
    symbols: &'a SymbolTable,
    signature: &'a FunctionSignature,
    whitelist: Option<&'a HintWhitelist>,
    locals: HashSet<String>,
}

impl<'a> FunctionChecker<'a> {
    fn new(
        symbols: &'a SymbolTable,
        signature: &'a FunctionSignature,
        whitelist: Option<&'a HintWhitelist>,
    ) -> Self {
        let locals = signature
            .implicit_args
            .iter()
            .cloned()
            .chain(signature.params.iter().map(|p| p.name.clone()))
            .collect();
        FunctionChecker {
            symbols,
            signature,
            whitelist,
            locals,
        }
    }

    fn check_body(&mut self, func: &Function) -> Result<()> {
        for statement in &func.body {
            self.check_statement(statement)?;
        }

        let returns = self.signature.returns.len();
        let ends_with_return = matches!(func.body.last(), Some(Statement::Return { .. }));
        if returns > 0 && !ends_with_return {
            return Err(Error::preprocessor(
                format!(
                    "Function '{}' must end with a return statement.",
                    self.signature.name
                ),
                &func.location,
            ));
        }
        Ok(())
    }

    fn check_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Let {
                names,
                value,
                location,
            } => {
                let produced = match &value.kind {
                    ExprKind::Call { callee, args } => {
                        self.check_call(callee, args, &value.location)?
                    }
                    _ => {
                        self.check_value(value)?;
                        1
                    }
                };
                if names.len() != produced {
                    return Err(Error::preprocessor(
                        format!(
                            "Expected {} name(s); the expression produces {} value(s).",
                            names.len(),
                            produced
                        ),
                        location,
                    ));
                }
                self.locals.extend(names.iter().cloned());
                Ok(())
            }
            Statement::Return { values, location } => {
                let expected = self.signature.returns.len();
                if values.len() != expected {
                    return Err(Error::preprocessor(
                        format!(
                            "Expected {} return value(s), got {}.",
                            expected,
                            values.len()
                        ),
                        location,
                    ));
                }
                values.iter().try_for_each(|v| self.check_value(v))
            }
            Statement::Hint { code, location } => match self.whitelist {
                Some(whitelist) => whitelist.verify_hint_secure(code, location),
                None => Ok(()),
            },
            Statement::AssertEq { lhs, rhs, .. } => {
                self.check_value(lhs)?;
                self.check_value(rhs)
            }
            Statement::Expression(expr) => match &expr.kind {
                ExprKind::Call { callee, args } => {
                    self.check_call(callee, args, &expr.location).map(|_| ())
                }
                _ => self.check_value(expr),
            },
        }
    }

    /// Checks an expression that must produce exactly one value
    fn check_value(&self, expr: &Expression) -> Result<()> {
        match &expr.kind {
            ExprKind::Const(_) => Ok(()),
            ExprKind::Identifier(name) => {
                if self.locals.contains(name) {
                    Ok(())
                } else {
                    Err(Error::preprocessor(
                        format!("Unknown identifier '{}'.", name),
                        &expr.location,
                    ))
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.check_value(lhs)?;
                self.check_value(rhs)
            }
            ExprKind::Call { callee, args } => {
                let produced = self.check_call(callee, args, &expr.location)?;
                if produced != 1 {
                    return Err(Error::preprocessor(
                        format!(
                            "'{}' returns {} value(s) and cannot be used as an expression.",
                            callee, produced
                        ),
                        &expr.location,
                    ));
                }
                Ok(())
            }
        }
    }

    /// Checks a call and returns how many values it produces
    fn check_call(&self, callee: &str, args: &[Expression], location: &Location) -> Result<usize> {
        let target = self.symbols.function(callee).ok_or_else(|| {
            Error::preprocessor(format!("Unknown function '{}'.", callee), location)
        })?;

        if !self.signature.autogen && !self.symbols.is_visible(&self.signature.module, callee) {
            return Err(Error::preprocessor(
                format!(
                    "'{}' is not defined in or imported into module '{}'.",
                    callee, self.signature.module
                ),
                location,
            ));
        }

        if args.len() != target.params.len() {
            return Err(Error::preprocessor(
                format!(
                    "Wrong number of arguments for '{}': expected {}, got {}.",
                    callee,
                    target.params.len(),
                    args.len()
                ),
                location,
            ));
        }
        for arg in args {
            self.check_value(arg)?;
        }

        for implicit in &target.implicit_args {
            if !self.signature.implicit_args.contains(implicit) {
                return Err(Error::preprocessor(
                    format!(
                        "Implicit argument '{}' of '{}' is not in scope.",
                        implicit, callee
                    ),
                    location,
                ));
            }
        }

        Ok(target.returns.len())
    }
}

fn build_abi(modules: &[Module], symbols: &SymbolTable) -> Result<Vec<AbiEntry>> {
    let Some(main) = modules.last() else {
        return Ok(Vec::new());
    };
    let builtin_ptrs: HashSet<String> = main
        .builtins
        .iter()
        .flat_map(|b| b.names.iter().map(|name| format!("{}_ptr", name)))
        .collect();

    let mut abi = Vec::new();
    for (name, func) in main_functions(main) {
        let is_external = func.decorator(EXTERNAL).is_some();
        let is_view = func.decorator(VIEW).is_some();
        if !is_external && !is_view {
            continue;
        }
        if is_external && is_view {
            return Err(Error::preprocessor(
                "@external and @view cannot be combined.",
                &func.location,
            ));
        }
        if func.is_extern {
            return Err(Error::preprocessor(
                "Extern functions cannot be entry points.",
                &func.location,
            ));
        }
        for implicit in func.implicit_names() {
            if implicit != STORAGE_PTR && !builtin_ptrs.contains(implicit) {
                return Err(Error::preprocessor(
                    format!(
                        "Unexpected implicit argument '{}' in an external function.",
                        implicit
                    ),
                    &func.location,
                ));
            }
        }
        let signature = symbols.function(&name).ok_or_else(|| {
            Error::codegen(format!("Function '{}' missing from the symbol table.", name))
        })?;

        let outputs = match signature.returns.len() {
            1 => vec![felt_member("res")],
            n => (0..n).map(|i| felt_member(&format!("res_{}", i))).collect(),
        };
        abi.push(AbiEntry {
            kind: "function".to_string(),
            name,
            inputs: signature.params.iter().map(|p| felt_member(&p.name)).collect(),
            outputs,
            state_mutability: is_view.then(|| VIEW.to_string()),
        });
    }
    Ok(abi)
}

fn main_functions(main: &Module) -> Vec<(String, &Function)> {
    main.items
        .iter()
        .filter_map(|item| match item {
            Item::Function(func) => Some((func.name.clone(), func)),
            _ => None,
        })
        .collect()
}

fn felt_member(name: &str) -> AbiMember {
    AbiMember {
        name: name.to_string(),
        ty: "felt".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::identifiers::IdentifierCollector;
    use crate::compiler::module_collector::{MapModuleReader, ModuleCollector};

    fn preprocess(source: &str, whitelist: Option<HintWhitelist>) -> Result<PassManagerContext> {
        let mut context = PassManagerContext::new(source, "contract.sx");
        ModuleCollector::new(Arc::new(MapModuleReader::new())).run(&mut context)?;
        IdentifierCollector.run(&mut context)?;
        Preprocessor::new(whitelist.map(Arc::new)).run(&mut context)?;
        Ok(context)
    }

    fn message(source: &str) -> String {
        preprocess(source, None).unwrap_err().to_string()
    }

    #[test]
    fn test_abi_for_entry_points() {
        let context = preprocess(
            "(lang starknet)\n\
             @external\n(func set ((x felt) (y felt)) () (return))\n\
             @view\n(func get () (felt) (return 1))\n\
             (func helper () () (return))",
            None,
        )
        .unwrap();
        assert_eq!(context.abi.len(), 2);
        assert_eq!(context.abi[0].name, "set");
        assert_eq!(context.abi[0].inputs.len(), 2);
        assert_eq!(context.abi[0].state_mutability, None);
        assert_eq!(context.abi[1].state_mutability.as_deref(), Some("view"));

        let json = serde_json::to_value(&context.abi[1]).unwrap();
        assert_eq!(json["stateMutability"], "view");
        assert_eq!(json["outputs"][0]["type"], "felt");
    }

    #[test]
    fn test_unknown_identifier_and_function() {
        assert!(message("(func f () (felt) (return x))").contains("Unknown identifier 'x'"));
        assert!(message("(func f () () (g) (return))").contains("Unknown function 'g'"));
    }

    #[test]
    fn test_call_arity() {
        let msg = message("(func g ((a felt)) () (return))\n(func f () () (g) (return))");
        assert!(msg.contains("expected 1, got 0"));
    }

    #[test]
    fn test_implicit_argument_scope() {
        let source = "(import starkware.starknet.core.storage.storage storage_read)\n\
                      (func f () (felt) (return (storage_read 1)))";
        assert!(message(source).contains("Implicit argument 'storage_ptr'"));

        let source = "(import starkware.starknet.core.storage.storage storage_read)\n\
                      (func f (implicit storage_ptr) () (felt) (return (storage_read 1)))";
        assert!(preprocess(source, None).is_ok());
    }

    #[test]
    fn test_not_imported() {
        let source = "(import starkware.starknet.core.storage.storage StorageAccess)\n\
                      (func f (implicit storage_ptr) () (felt) (return (storage_read 1)))";
        assert!(message(source).contains("not defined in or imported"));
    }

    #[test]
    fn test_let_arity_and_missing_return() {
        let source = "(func two () (felt felt) (return 1 2))\n\
                      (func f () (felt) (let x (two)) (return x))";
        assert!(message(source).contains("Expected 1 name(s)"));

        let source = "(func two () (felt felt) (return 1 2))\n\
                      (func f () (felt) (let (a b) (two)) (return (+ a b)))";
        assert!(preprocess(source, None).is_ok());

        assert!(message("(func f () (felt))").contains("must end with a return"));
    }

    #[test]
    fn test_directives() {
        assert!(message("(lang cairo)").contains("Unsupported lang directive"));
        assert!(message("(builtins pedersen storage)").contains("'storage' may not appear"));
    }

    #[test]
    fn test_hint_gate() {
        let source = "(func f () () (hint \"ids.x = 5\") (return))";
        let whitelist = HintWhitelist::from_hints(["memory[ap] = segments.add()"]);
        let err = preprocess(source, Some(whitelist.clone())).unwrap_err();
        assert!(matches!(err, Error::SecurityValidation { .. }));
        assert_eq!(err.location().unwrap().line, 1);

        assert!(preprocess(source, None).is_ok());

        let allowed = "(func f () () (hint \"memory[ap]   = segments.add( )\") (return))";
        assert!(preprocess(allowed, Some(whitelist)).is_ok());
    }

    #[test]
    fn test_external_implicit_arguments() {
        let source = "(builtins pedersen)\n\
                      @external\n(func f (implicit storage_ptr pedersen_ptr) () () (return))";
        assert!(preprocess(source, None).is_ok());

        let source = "@external\n(func f (implicit syscall_ptr) () () (return))";
        assert!(message(source).contains("Unexpected implicit argument 'syscall_ptr'"));
    }
}
