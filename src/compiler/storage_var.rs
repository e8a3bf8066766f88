//! # Storage variables
//!
//! A function decorated `@storage_var` declares a persistent, key-indexed slot family:
//!
//! ```text
//! @storage_var
//! (func balance ((owner felt)) (felt))
//! ```
//!
//! Two stages turn the declaration into ordinary code:
//!
//! - [`StorageVarSignatureStage`] (`storage_var_signature`, before `identifier_collector`)
//!   validates the declaration and every `balance.read` / `balance.write` / `balance.addr`
//!   reference, then swaps the declaration for a namespace of placeholder accessors so the
//!   symbol table sees their signatures.
//! - [`StorageVarImplementationStage`] (`storage_var_implementation`, after
//!   `struct_collector`) fills in the accessor bodies once struct layouts are known.
//!
//! The generated `addr` computes `storage_address(name, keys)` from
//! [`crate::storage::address`] at run time: the base address is a compile-time constant and
//! every key is folded in with `hash2`. Field `i` of a multi-field value lives at `addr + i`.

use super::pass_manager::{PassManagerContext, Stage};
use super::structs::StructLayouts;
use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::parser::{
    BinaryOp, ExprKind, Expression, Function, ImplicitArgs, Item, Location, Namespace, Param,
    Program, Statement, StructDef, TypeExpr,
};
use crate::storage::address::{base_address, storage_address};
use std::collections::{BTreeMap, HashMap};

/// Decorator declaring a storage variable
pub const STORAGE_VAR_DECORATOR: &str = "storage_var";
/// Decorator omitting the `write` accessor
pub const READONLY_DECORATOR: &str = "readonly";
/// Implicit argument threading the storage access log
pub const STORAGE_PTR: &str = "storage_ptr";

const HASH2: &str = "hash2";
const STORAGE_READ: &str = "storage_read";
const STORAGE_WRITE: &str = "storage_write";

/// Locals bound inside generated accessors
const ADDR_RESULT: &str = "res";
const SLOT_ADDRESS: &str = "storage_addr";

/// Generated accessors
const ADDR: &str = "addr";
const READ: &str = "read";
const WRITE: &str = "write";

/// A validated `@storage_var` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageVarDecl {
    /// Variable name
    pub name: String,
    /// Declaring module
    pub module: String,
    /// Key parameter names (all felts)
    pub keys: Vec<String>,
    /// Declared value type
    pub value_type: TypeExpr,
    /// Number of field elements in one value
    pub value_width: usize,
    /// `@readonly`: no `write` accessor
    pub readonly: bool,
    /// Declaration site
    pub location: Location,
}

impl StorageVarDecl {
    /// Number of keys
    pub fn arity(&self) -> usize {
        self.keys.len()
    }

    /// Address of the zero-key slot
    pub fn base_address(&self) -> FieldElement {
        base_address(&self.name)
    }

    /// Address of the slot for `keys`
    pub fn address(&self, keys: &[FieldElement]) -> FieldElement {
        storage_address(&self.name, keys)
    }

    /// Expected argument count of `accessor`, `None` when it does not exist
    pub fn accessor_arity(&self, accessor: &str) -> Option<usize> {
        match accessor {
            ADDR | READ => Some(self.arity()),
            WRITE if !self.readonly => Some(self.arity() + self.value_width),
            _ => None,
        }
    }

    fn autogen_location(&self) -> Location {
        Location::synthetic(format!("autogen/starknet/storage_var/{}", self.name))
    }

    fn value_names(&self) -> Vec<String> {
        if self.value_width == 1 {
            vec!["value".to_string()]
        } else {
            (0..self.value_width).map(|i| format!("value_{}", i)).collect()
        }
    }
}

/// Declarations of one compilation plus the accessors synthesized for them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageVarRegistry {
    decls: BTreeMap<String, StorageVarDecl>,
    implementations: HashMap<String, Item>,
}

impl StorageVarRegistry {
    /// Declaration of `name`
    pub fn get(&self, name: &str) -> Option<&StorageVarDecl> {
        self.decls.get(name)
    }

    /// All declarations, ordered by name
    pub fn decls(&self) -> impl Iterator<Item = &StorageVarDecl> {
        self.decls.values()
    }

    /// Number of declarations
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Returns true when nothing was declared
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Synthesized accessor namespace of `name`, once lowered
    pub fn implementation(&self, name: &str) -> Option<&Item> {
        self.implementations.get(name)
    }
}

/// `storage_var_signature`: validate declarations and install placeholder accessors
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageVarSignatureStage;

impl Stage for StorageVarSignatureStage {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        let decls = collect_decls(&context.program)?;
        check_references(&context.program, &decls)?;

        for module in &mut context.program.modules {
            for item in &mut module.items {
                let Item::Function(func) = &*item else {
                    continue;
                };
                if func.decorator(STORAGE_VAR_DECORATOR).is_none() {
                    continue;
                }
                if let Some(decl) = decls.get(&func.name) {
                    *item = Item::Namespace(placeholder_namespace(decl));
                }
            }
        }

        for (name, decl) in decls {
            tracing::debug!(
                storage_var = %name,
                arity = decl.arity(),
                width = decl.value_width,
                "declared storage variable"
            );
            context.storage_vars.decls.insert(name, decl);
        }
        Ok(())
    }

    fn modifies_ast(&self) -> bool {
        true
    }
}

/// `storage_var_implementation`: synthesize accessor bodies, at most once per variable
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageVarImplementationStage;

impl Stage for StorageVarImplementationStage {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        let registry = &mut context.storage_vars;
        for decl in registry.decls.values() {
            if !registry.implementations.contains_key(&decl.name) {
                let implementation = implement(decl, &context.structs)?;
                registry
                    .implementations
                    .insert(decl.name.clone(), Item::Namespace(implementation));
            }

            let implementation = registry
                .implementations
                .get(&decl.name)
                .cloned()
                .ok_or_else(|| {
                    Error::codegen(format!("Missing accessors for storage variable '{}'.", decl.name))
                })?;
            install(&mut context.program, decl, implementation)?;
        }
        Ok(())
    }

    fn modifies_ast(&self) -> bool {
        true
    }
}

fn collect_decls(program: &Program) -> Result<BTreeMap<String, StorageVarDecl>> {
    let mut definitions: HashMap<&str, usize> = HashMap::new();
    let mut structs: HashMap<&str, &StructDef> = HashMap::new();
    for (_, item) in program.items() {
        if let Some(name) = item.name() {
            *definitions.entry(name).or_default() += 1;
        }
        if let Item::Struct(def) = item {
            structs.insert(&def.name, def);
        }
    }

    let mut decls = BTreeMap::new();
    for module in &program.modules {
        for item in &module.items {
            let Item::Function(func) = item else {
                continue;
            };
            let Some(decorator) = func.decorator(STORAGE_VAR_DECORATOR) else {
                continue;
            };

            let is_starknet = module
                .lang
                .as_ref()
                .map(|lang| lang.value == "starknet")
                .unwrap_or(false);
            if !is_starknet {
                return Err(Error::declaration(
                    "@storage_var can only be used in source files that contain the \
                     \"(lang starknet)\" directive.",
                    &decorator.location,
                ));
            }

            if definitions.get(func.name.as_str()).copied().unwrap_or(0) > 1 {
                return Err(Error::declaration(
                    format!("Redefinition of storage variable '{}'.", func.name),
                    &func.location,
                ));
            }

            let decl = validate(func, &module.name, &structs)?;
            decls.insert(decl.name.clone(), decl);
        }
    }
    Ok(decls)
}

fn validate(
    func: &Function,
    module: &str,
    structs: &HashMap<&str, &StructDef>,
) -> Result<StorageVarDecl> {
    if let Some(statement) = func.body.first() {
        return Err(Error::declaration(
            "Storage variables must have an empty body.",
            statement_location(statement),
        ));
    }
    if let Some(implicit) = &func.implicit_args {
        return Err(Error::declaration(
            "Storage variables must not have implicit arguments.",
            &implicit.location,
        ));
    }
    if let Some(extra) = func
        .decorators
        .iter()
        .find(|d| d.name != STORAGE_VAR_DECORATOR && d.name != READONLY_DECORATOR)
    {
        return Err(Error::declaration(
            "Storage variables must have no decorators in addition to @storage_var.",
            &extra.location,
        ));
    }
    if func.is_extern {
        return Err(Error::declaration(
            "Storage variables cannot be extern.",
            &func.location,
        ));
    }
    for param in &func.params {
        if param.ty != TypeExpr::Felt {
            return Err(Error::declaration(
                "Only felt arguments are supported in storage variables.",
                &param.location,
            ));
        }
    }
    let value_type = match func.returns.as_slice() {
        [ty] => ty.clone(),
        _ => {
            return Err(Error::declaration(
                "Storage variables must return exactly one value.",
                &func.returns_location,
            ))
        }
    };
    let value_width = felt_width(&value_type, structs, &mut Vec::new())
        .filter(|width| *width > 0)
        .ok_or_else(|| {
            Error::declaration(
                "The return type of storage variables must consist of felts.",
                &func.returns_location,
            )
        })?;

    let decl = StorageVarDecl {
        name: func.name.clone(),
        module: module.to_string(),
        keys: func.params.iter().map(|p| p.name.clone()).collect(),
        value_type,
        value_width,
        readonly: func.decorator(READONLY_DECORATOR).is_some(),
        location: func.location.clone(),
    };

    // Keys share a scope with the accessor locals and value parameters.
    let value_names = decl.value_names();
    for param in &func.params {
        let reserved = param.name == ADDR_RESULT
            || param.name == SLOT_ADDRESS
            || param.name == STORAGE_PTR
            || value_names.contains(&param.name);
        if reserved {
            return Err(Error::declaration(
                format!(
                    "'{}' is reserved in storage variables and cannot name a key.",
                    param.name
                ),
                &param.location,
            ));
        }
    }

    Ok(decl)
}

/// Number of felts in `ty`, `None` for pointers and unknown or recursive structs
fn felt_width(
    ty: &TypeExpr,
    structs: &HashMap<&str, &StructDef>,
    visiting: &mut Vec<String>,
) -> Option<usize> {
    match ty {
        TypeExpr::Felt => Some(1),
        TypeExpr::Pointer(_) => None,
        TypeExpr::Struct(name) => {
            if visiting.contains(name) {
                return None;
            }
            let def = structs.get(name.as_str())?;
            visiting.push(name.clone());
            let width = def
                .members
                .iter()
                .map(|m| felt_width(&m.ty, structs, visiting))
                .sum();
            visiting.pop();
            width
        }
        TypeExpr::Tuple(members) => members
            .iter()
            .map(|m| felt_width(m, structs, visiting))
            .sum(),
    }
}

fn check_references(program: &Program, decls: &BTreeMap<String, StorageVarDecl>) -> Result<()> {
    for (_, func) in program.functions() {
        for statement in &func.body {
            visit_statement(statement, &mut |callee: &str, argc: usize, location: &Location| {
                let Some((var, accessor)) = callee.split_once('.') else {
                    return Ok(());
                };
                let Some(decl) = decls.get(var) else {
                    return Ok(());
                };
                if accessor == WRITE && decl.readonly {
                    return Err(Error::declaration(
                        format!(
                            "Storage variable '{}' is read-only; '{}' is not available.",
                            var, callee
                        ),
                        location,
                    ));
                }
                match decl.accessor_arity(accessor) {
                    Some(expected) if expected == argc => Ok(()),
                    Some(expected) => Err(Error::declaration(
                        format!(
                            "Wrong number of arguments for '{}': expected {}, got {}.",
                            callee, expected, argc
                        ),
                        location,
                    )),
                    None => Err(Error::declaration(
                        format!("Storage variable '{}' has no member '{}'.", var, accessor),
                        location,
                    )),
                }
            })?;
        }
    }
    Ok(())
}

fn visit_statement<F>(statement: &Statement, f: &mut F) -> Result<()>
where
    F: FnMut(&str, usize, &Location) -> Result<()>,
{
    match statement {
        Statement::Let { value, .. } => visit_expression(value, f),
        Statement::Return { values, .. } => {
            for value in values {
                visit_expression(value, f)?;
            }
            Ok(())
        }
        Statement::AssertEq { lhs, rhs, .. } => {
            visit_expression(lhs, f)?;
            visit_expression(rhs, f)
        }
        Statement::Expression(expr) => visit_expression(expr, f),
        Statement::Hint { .. } => Ok(()),
    }
}

fn visit_expression<F>(expr: &Expression, f: &mut F) -> Result<()>
where
    F: FnMut(&str, usize, &Location) -> Result<()>,
{
    match &expr.kind {
        ExprKind::Const(_) | ExprKind::Identifier(_) => Ok(()),
        ExprKind::Binary { lhs, rhs, .. } => {
            visit_expression(lhs, f)?;
            visit_expression(rhs, f)
        }
        ExprKind::Call { callee, args } => {
            f(callee, args.len(), &expr.location)?;
            for arg in args {
                visit_expression(arg, f)?;
            }
            Ok(())
        }
    }
}

fn statement_location(statement: &Statement) -> &Location {
    match statement {
        Statement::Let { location, .. }
        | Statement::Return { location, .. }
        | Statement::Hint { location, .. }
        | Statement::AssertEq { location, .. } => location,
        Statement::Expression(expr) => &expr.location,
    }
}

fn felt_params(names: &[String], location: &Location) -> Vec<Param> {
    names
        .iter()
        .map(|name| Param {
            name: name.clone(),
            ty: TypeExpr::Felt,
            location: location.clone(),
        })
        .collect()
}

fn accessor(
    name: &str,
    storage_ptr: bool,
    params: Vec<Param>,
    returns: usize,
    location: &Location,
) -> Function {
    Function {
        name: name.to_string(),
        decorators: Vec::new(),
        implicit_args: storage_ptr.then(|| ImplicitArgs {
            names: vec![STORAGE_PTR.to_string()],
            location: location.clone(),
        }),
        params,
        returns: vec![TypeExpr::Felt; returns],
        returns_location: location.clone(),
        body: Vec::new(),
        is_extern: false,
        location: location.clone(),
    }
}

/// Accessors with full signatures and empty bodies
fn placeholder_namespace(decl: &StorageVarDecl) -> Namespace {
    let location = decl.autogen_location();
    let mut functions = vec![
        accessor(ADDR, false, felt_params(&decl.keys, &location), 1, &location),
        accessor(
            READ,
            true,
            felt_params(&decl.keys, &location),
            decl.value_width,
            &location,
        ),
    ];
    if !decl.readonly {
        let mut names = decl.keys.clone();
        names.extend(decl.value_names());
        functions.push(accessor(WRITE, true, felt_params(&names, &location), 0, &location));
    }

    Namespace {
        name: decl.name.clone(),
        functions,
        autogen: true,
        location,
    }
}

fn implement(decl: &StorageVarDecl, layouts: &StructLayouts) -> Result<Namespace> {
    match layouts.size_of(&decl.value_type) {
        Some(size) if size == decl.value_width => {}
        other => {
            return Err(Error::codegen(format!(
                "Storage variable '{}' has width {} but its type '{}' lays out as {:?}.",
                decl.name, decl.value_width, decl.value_type, other
            )))
        }
    }

    let loc = decl.autogen_location();
    let mut namespace = placeholder_namespace(decl);
    let address_call = Expression::call(
        format!("{}.{}", decl.name, ADDR),
        decl.keys.iter().map(|k| Expression::ident(k, &loc)).collect(),
        &loc,
    );

    for func in &mut namespace.functions {
        func.body = match func.name.as_str() {
            ADDR => {
                let mut body = vec![Statement::Let {
                    names: vec![ADDR_RESULT.to_string()],
                    value: Expression::constant(decl.base_address(), &loc),
                    location: loc.clone(),
                }];
                for key in &decl.keys {
                    body.push(Statement::Let {
                        names: vec![ADDR_RESULT.to_string()],
                        value: Expression::call(
                            HASH2,
                            vec![Expression::ident(ADDR_RESULT, &loc), Expression::ident(key, &loc)],
                            &loc,
                        ),
                        location: loc.clone(),
                    });
                }
                body.push(Statement::Return {
                    values: vec![Expression::ident(ADDR_RESULT, &loc)],
                    location: loc.clone(),
                });
                body
            }
            READ => {
                let mut body = vec![bind_address(&address_call, &loc)];
                let mut values = Vec::with_capacity(decl.value_width);
                for (i, name) in decl.value_names().into_iter().enumerate() {
                    body.push(Statement::Let {
                        names: vec![name.clone()],
                        value: Expression::call(STORAGE_READ, vec![field_slot(i, &loc)], &loc),
                        location: loc.clone(),
                    });
                    values.push(Expression::ident(name, &loc));
                }
                body.push(Statement::Return {
                    values,
                    location: loc.clone(),
                });
                body
            }
            WRITE => {
                let mut body = vec![bind_address(&address_call, &loc)];
                for (i, name) in decl.value_names().into_iter().enumerate() {
                    body.push(Statement::Expression(Expression::call(
                        STORAGE_WRITE,
                        vec![field_slot(i, &loc), Expression::ident(name, &loc)],
                        &loc,
                    )));
                }
                body.push(Statement::Return {
                    values: Vec::new(),
                    location: loc.clone(),
                });
                body
            }
            other => {
                return Err(Error::codegen(format!(
                    "Unexpected accessor '{}.{}'.",
                    decl.name, other
                )))
            }
        };
    }

    tracing::debug!(storage_var = %decl.name, "synthesized storage accessors");
    Ok(namespace)
}

fn bind_address(address_call: &Expression, loc: &Location) -> Statement {
    Statement::Let {
        names: vec![SLOT_ADDRESS.to_string()],
        value: address_call.clone(),
        location: loc.clone(),
    }
}

/// `storage_addr + index`, or `storage_addr` itself for the first field
fn field_slot(index: usize, loc: &Location) -> Expression {
    let base = Expression::ident(SLOT_ADDRESS, loc);
    if index == 0 {
        return base;
    }
    Expression::new(
        ExprKind::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(base),
            rhs: Box::new(Expression::constant(FieldElement::from(index), loc)),
        },
        loc.clone(),
    )
}

/// Swap the placeholder namespace of `decl` for its implementation
fn install(program: &mut Program, decl: &StorageVarDecl, implementation: Item) -> Result<()> {
    let slot = program
        .modules
        .iter_mut()
        .filter(|module| module.name == decl.module)
        .flat_map(|module| module.items.iter_mut())
        .find(|item| matches!(item, Item::Namespace(ns) if ns.autogen && ns.name == decl.name));

    match slot {
        Some(item) => {
            *item = implementation;
            Ok(())
        }
        None => Err(Error::codegen(format!(
            "Placeholder for storage variable '{}' not found in module '{}'.",
            decl.name, decl.module
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::identifiers::IdentifierCollector;
    use crate::compiler::module_collector::{MapModuleReader, ModuleCollector};
    use crate::compiler::structs::StructCollector;
    use std::sync::Arc;

    fn lower(source: &str) -> Result<PassManagerContext> {
        let mut context = PassManagerContext::new(source, "contract.sx");
        ModuleCollector::new(Arc::new(MapModuleReader::new())).run(&mut context)?;
        StorageVarSignatureStage.run(&mut context)?;
        IdentifierCollector.run(&mut context)?;
        StructCollector.run(&mut context)?;
        StorageVarImplementationStage.run(&mut context)?;
        Ok(context)
    }

    fn declare(source: &str) -> Result<PassManagerContext> {
        let mut context = PassManagerContext::new(source, "contract.sx");
        ModuleCollector::new(Arc::new(MapModuleReader::new())).run(&mut context)?;
        StorageVarSignatureStage.run(&mut context)?;
        Ok(context)
    }

    fn declaration_message(source: &str) -> String {
        match declare(source) {
            Err(Error::Declaration { message, .. }) => message,
            other => panic!("expected declaration error, got {:?}", other),
        }
    }

    #[test]
    fn test_declaration_becomes_namespace() {
        let context = declare(
            "(lang starknet)\n@storage_var\n(func balance ((owner felt)) (felt))",
        )
        .unwrap();
        let decl = context.storage_vars.get("balance").unwrap();
        assert_eq!(decl.keys, vec!["owner"]);
        assert_eq!(decl.value_width, 1);

        let names: Vec<String> = context
            .program
            .functions()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["balance.addr", "balance.read", "balance.write"]);
    }

    #[test]
    fn test_requires_starknet_lang() {
        let message = declaration_message("@storage_var\n(func x () (felt))");
        assert!(message.contains("(lang starknet)"));
    }

    #[test]
    fn test_invalid_declarations() {
        let cases = [
            (
                "@storage_var\n(func x () (felt) (return 1))",
                "empty body",
            ),
            (
                "@storage_var\n(func x (implicit storage_ptr) () (felt))",
                "implicit arguments",
            ),
            (
                "@storage_var\n@external\n(func x () (felt))",
                "no decorators",
            ),
            (
                "(struct P (a felt))\n@storage_var\n(func x ((k P)) (felt))",
                "Only felt arguments",
            ),
            ("@storage_var\n(func x () (felt felt))", "exactly one value"),
            ("@storage_var\n(func x () ())", "exactly one value"),
            ("@storage_var\n(func x () (felt*))", "consist of felts"),
            ("@storage_var\n(func x () (Missing))", "consist of felts"),
            (
                "(struct L (next felt*))\n@storage_var\n(func x () (L))",
                "consist of felts",
            ),
        ];
        for (body, expected) in cases {
            let message = declaration_message(&format!("(lang starknet)\n{}", body));
            assert!(message.contains(expected), "{}: {}", body, message);
        }
    }

    #[test]
    fn test_reserved_key_names() {
        let cases = [
            "@storage_var\n(func owners ((res felt)) (felt))",
            "@storage_var\n(func owners ((storage_addr felt)) (felt))",
            "@storage_var\n(func owners ((storage_ptr felt)) (felt))",
            "@storage_var\n(func owners ((value felt)) (felt))",
            "(struct P (a felt) (b felt))\n@storage_var\n(func owners ((k felt) (value_1 felt)) (P))",
        ];
        for case in cases {
            let source = format!("(lang starknet)\n{}", case);
            match declare(&source) {
                Err(Error::Declaration { message, location }) => {
                    assert!(message.contains("reserved"), "{}: {}", case, message);
                    assert_eq!(location.file, "contract.sx");
                }
                other => panic!("{}: expected declaration error, got {:?}", case, other),
            }
        }

        // `value` only collides with single-felt values.
        let source = "(lang starknet)\n(struct P (a felt) (b felt))\n\
                      @storage_var\n(func owners ((value felt)) (P))";
        assert!(declare(source).is_ok());
    }

    #[test]
    fn test_duplicate_declaration() {
        let message = declaration_message(
            "(lang starknet)\n@storage_var\n(func x () (felt))\n(func x () ())",
        );
        assert!(message.contains("Redefinition of storage variable 'x'"));
    }

    #[test]
    fn test_reference_arity_checked() {
        let source = "(lang starknet)\n\
                      @storage_var\n(func balance ((owner felt)) (felt))\n\
                      (func f (implicit storage_ptr) () (felt) (return (balance.read)))";
        let err = declare(source).unwrap_err();
        assert_eq!(err.location().unwrap().line, 4);
        assert!(err.to_string().contains("expected 1, got 0"));

        let source = "(lang starknet)\n\
                      @storage_var\n(func balance ((owner felt)) (felt))\n\
                      (func f (implicit storage_ptr) () () (balance.write 1) (return))";
        let err = declare(source).unwrap_err();
        assert!(err.to_string().contains("expected 2, got 1"));
    }

    #[test]
    fn test_readonly_has_no_write() {
        let source = "(lang starknet)\n\
                      @storage_var\n@readonly\n(func owner () (felt))\n\
                      (func f (implicit storage_ptr) () () (owner.write 1) (return))";
        let message = declaration_message(source);
        assert!(message.contains("read-only"));
    }

    #[test]
    fn test_lowered_addr_folds_keys() {
        let context = lower(
            "(lang starknet)\n@storage_var\n(func allowance ((a felt) (b felt)) (felt))",
        )
        .unwrap();
        let program = &context.program;
        let (_, addr) = program
            .functions()
            .into_iter()
            .find(|(name, _)| name == "allowance.addr")
            .unwrap();
        let hash_calls = addr
            .body
            .iter()
            .filter(|s| matches!(s, Statement::Let { value, .. }
                if matches!(&value.kind, ExprKind::Call { callee, .. } if callee == "hash2")))
            .count();
        assert_eq!(hash_calls, 2);
        assert_eq!(
            addr.location.file,
            "autogen/starknet/storage_var/allowance"
        );
        assert!(context.storage_vars.implementation("allowance").is_some());
    }

    #[test]
    fn test_struct_value_reads_each_field() {
        let context = lower(
            "(lang starknet)\n(struct Pos (x felt) (y felt) (z felt))\n\
             @storage_var\n(func pos () (Pos))",
        )
        .unwrap();
        let (_, read) = context
            .program
            .functions()
            .into_iter()
            .find(|(name, _)| name == "pos.read")
            .unwrap();
        assert_eq!(read.returns.len(), 3);
        // address binding, three reads, return
        assert_eq!(read.body.len(), 5);
    }

    #[test]
    fn test_lowering_is_memoized() {
        let mut context =
            lower("(lang starknet)\n@storage_var\n(func x () (felt))").unwrap();
        let before = context.program.clone();
        StorageVarImplementationStage.run(&mut context).unwrap();
        assert_eq!(context.program, before);
        assert_eq!(context.storage_vars.len(), 1);
    }

    #[test]
    fn test_layout_mismatch_is_internal() {
        let mut context = declare(
            "(lang starknet)\n(struct P (a felt) (b felt))\n@storage_var\n(func x () (P))",
        )
        .unwrap();
        IdentifierCollector.run(&mut context).unwrap();
        // Layouts were never computed.
        let err = StorageVarImplementationStage.run(&mut context).unwrap_err();
        assert!(matches!(err, Error::CodeGeneration(_)));
    }
}
