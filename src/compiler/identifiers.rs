//! `identifier_collector` stage: the program-wide symbol table

use super::pass_manager::{PassManagerContext, Stage};
use crate::error::{Error, Result};
use crate::parser::{Function, Item, Location, Param, StructDef, TypeExpr};
// Top-level names share one program-wide namespace; modules only control visibility.
use std::collections::{BTreeMap, HashMap, HashSet};

/// Everything callers need to know about a function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    /// Fully qualified name (`balance.read`)
    pub name: String,
    /// Defining module
    pub module: String,
    /// Implicit arguments, in order
    pub implicit_args: Vec<String>,
    /// Explicit parameters
    pub params: Vec<Param>,
    /// Return types
    pub returns: Vec<TypeExpr>,
    /// Decorator names
    pub decorators: Vec<String>,
    /// Implemented by the VM
    pub is_extern: bool,
    /// Declared inside a compiler-generated namespace
    pub autogen: bool,
    /// Definition site
    pub location: Location,
}

impl FunctionSignature {
    fn from_function(name: String, module: &str, func: &Function, autogen: bool) -> Self {
        FunctionSignature {
            name,
            module: module.to_string(),
            implicit_args: func.implicit_names().to_vec(),
            params: func.params.clone(),
            returns: func.returns.clone(),
            decorators: func.decorators.iter().map(|d| d.name.clone()).collect(),
            is_extern: func.is_extern,
            autogen,
            location: func.location.clone(),
        }
    }

    /// Returns true if the function carries `@name`
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d == name)
    }
}

/// Functions, structs and per-module visibility
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    functions: BTreeMap<String, FunctionSignature>,
    structs: BTreeMap<String, StructDef>,
    scopes: HashMap<String, HashSet<String>>,
}

impl SymbolTable {
    /// Signature of the function called `name`
    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    /// All functions, ordered by name
    pub fn functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values()
    }

    /// Definition of struct `name`
    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    /// All structs, ordered by name
    pub fn structs(&self) -> impl Iterator<Item = &StructDef> {
        self.structs.values()
    }

    /// Returns true if `name` (or the namespace prefix of a dotted name) is defined in or
    /// imported into `module`
    pub fn is_visible(&self, module: &str, name: &str) -> bool {
        let top = name.split('.').next().unwrap_or(name);
        self.scopes
            .get(module)
            .map(|scope| scope.contains(top))
            .unwrap_or(false)
    }

    fn define(&mut self, module: &str, name: &str, location: &Location) -> Result<()> {
        if self.defined_anywhere(name) {
            return Err(Error::preprocessor(
                format!("Redefinition of '{}'.", name),
                location,
            ));
        }
        self.scopes
            .entry(module.to_string())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    fn defined_anywhere(&self, name: &str) -> bool {
        let prefix = format!("{}.", name);
        self.functions.contains_key(name)
            || self.structs.contains_key(name)
            || self.functions.keys().any(|f| f.starts_with(&prefix))
    }
}

/// Builds the [`SymbolTable`]; duplicate top-level names and bad imports are errors
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierCollector;

impl Stage for IdentifierCollector {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        let mut table = SymbolTable::default();
        let mut defined: HashMap<&str, HashSet<&str>> = HashMap::new();

        for module in &context.program.modules {
            table.scopes.entry(module.name.clone()).or_default();
            for item in &module.items {
                if let Some(name) = item.name() {
                    table.define(&module.name, name, item.location())?;
                    defined.entry(&module.name).or_default().insert(name);
                }
                match item {
                    Item::Function(func) => {
                        table.functions.insert(
                            func.name.clone(),
                            FunctionSignature::from_function(
                                func.name.clone(),
                                &module.name,
                                func,
                                false,
                            ),
                        );
                    }
                    Item::Namespace(ns) => {
                        for func in &ns.functions {
                            let name = format!("{}.{}", ns.name, func.name);
                            let signature = FunctionSignature::from_function(
                                name.clone(),
                                &module.name,
                                func,
                                ns.autogen,
                            );
                            table.functions.insert(name, signature);
                        }
                    }
                    Item::Struct(def) => {
                        table.structs.insert(def.name.clone(), def.clone());
                    }
                    Item::Import(_) => {}
                }
            }
        }

        for module in &context.program.modules {
            for item in &module.items {
                let Item::Import(import) = item else {
                    continue;
                };
                for name in &import.names {
                    let exported = defined
                        .get(import.module.as_str())
                        .map(|names| names.contains(name.as_str()))
                        .unwrap_or(false);
                    if !exported {
                        return Err(Error::preprocessor(
                            format!("Cannot import '{}' from '{}'.", name, import.module),
                            &import.location,
                        ));
                    }
                    table
                        .scopes
                        .entry(module.name.clone())
                        .or_default()
                        .insert(name.clone());
                }
            }
        }

        tracing::debug!(
            functions = table.functions.len(),
            structs = table.structs.len(),
            "collected identifiers"
        );
        context.symbols = table;
        Ok(())
    }
}
