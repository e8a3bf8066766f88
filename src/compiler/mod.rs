//! # Contract Compiler
//!
//! Compiles contract sources through an ordered, extensible pass pipeline into a
//! [`CompiledContract`] artifact.
//!
//! ## Architecture
//!
//! ```text
//! module_collector → storage_var_signature → identifier_collector → struct_collector
//!   → storage_var_implementation → preprocessor (hint gate, ABI) → codegen
//! ```
//!
//! [`default_pass_manager`] builds the base pipeline; [`contract_pass_manager`] extends it
//! through the anchor API with the storage variable stages, the auto-imported system modules
//! and the hint whitelist gate.
//!
//! ## Usage
//!
//! ```ignore
//! use starkpass::compiler::{CompileOptions, Compiler};
//!
//! let compiler = Compiler::new(CompileOptions::default())?;
//! let contract = compiler.compile("(lang starknet)\n...")?;
//! std::fs::write("contract.json", contract.to_json()?)?;
//! ```

pub mod codegen;
pub mod identifiers;
pub mod ir;
pub mod module_collector;
pub mod optimizer;
pub mod pass_manager;
pub mod preprocessor;
pub mod storage_var;
pub mod structs;

pub use codegen::Codegen;
pub use identifiers::{FunctionSignature, IdentifierCollector, SymbolTable};
pub use ir::{CompiledContract, CompiledHint, IrFunction, IrInstruction, IrReg, StorageVarInfo};
pub use module_collector::{MapModuleReader, ModuleCollector, ModuleReader, SystemModules};
pub use optimizer::Optimizer;
pub use pass_manager::{PassManager, PassManagerContext, PassStage, Stage};
pub use preprocessor::{AbiEntry, AbiMember, Preprocessor};
pub use storage_var::{
    StorageVarDecl, StorageVarImplementationStage, StorageVarRegistry, StorageVarSignatureStage,
};
pub use structs::{StructCollector, StructLayout, StructLayouts};

use crate::error::{Error, Result};
use crate::security::HintWhitelist;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Modules every contract compilation loads, whether imported or not
pub const DEFAULT_ADDITIONAL_MODULES: [&str; 3] = [
    "starkware.cairo.common.cairo_builtins",
    "starkware.cairo.common.hash",
    "starkware.starknet.core.storage.storage",
];

lazy_static::lazy_static! {
    static ref MODULE_NAME: regex::Regex =
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("module name pattern is valid");
}

/// Compilation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Optimization level (0-1)
    pub opt_level: u8,
    /// Skip the hint whitelist gate (trusted compilation only)
    pub disable_hint_validation: bool,
    /// Drop functions unreachable from `@external` / `@view` entry points
    pub opt_unused_functions: bool,
    /// Modules auto-loaded into every contract
    pub additional_modules: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: 1,
            disable_hint_validation: false,
            opt_unused_functions: true,
            additional_modules: DEFAULT_ADDITIONAL_MODULES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl CompileOptions {
    /// Reject malformed options before any pipeline is built
    pub fn validate(&self) -> Result<()> {
        if self.opt_level > 1 {
            return Err(Error::Configuration(format!(
                "opt_level must be 0 or 1, got {}",
                self.opt_level
            )));
        }
        let mut seen = HashSet::new();
        for module in &self.additional_modules {
            if !MODULE_NAME.is_match(module) {
                return Err(Error::Configuration(format!(
                    "Invalid module name '{}' in additional_modules",
                    module
                )));
            }
            if !seen.insert(module.as_str()) {
                return Err(Error::Configuration(format!(
                    "Module '{}' listed twice in additional_modules",
                    module
                )));
            }
        }
        Ok(())
    }
}

/// Base pipeline: module collection, symbols, layouts, checks, code generation
pub fn default_pass_manager(
    options: &CompileOptions,
    reader: Arc<dyn ModuleReader>,
) -> Result<PassManager> {
    let mut manager = PassManager::new();
    manager.add_stage("module_collector", ModuleCollector::new(reader))?;
    manager.add_stage("identifier_collector", IdentifierCollector)?;
    manager.add_stage("struct_collector", StructCollector)?;
    manager.add_stage("preprocessor", Preprocessor::new(None))?;
    manager.add_stage(
        "codegen",
        Codegen::new(options.opt_level, options.opt_unused_functions),
    )?;
    Ok(manager)
}

/// Contract pipeline: the base pipeline extended with storage variables, the system
/// modules and the hint whitelist gate
pub fn contract_pass_manager(
    options: &CompileOptions,
    reader: Arc<dyn ModuleReader>,
) -> Result<PassManager> {
    options.validate()?;

    let mut manager = default_pass_manager(options, reader.clone())?;
    manager.replace(
        "module_collector",
        ModuleCollector::new(reader).with_additional_modules(options.additional_modules.clone()),
    )?;
    manager.add_before(
        "identifier_collector",
        "storage_var_signature",
        StorageVarSignatureStage,
    )?;
    manager.add_after(
        "struct_collector",
        "storage_var_implementation",
        StorageVarImplementationStage,
    )?;

    let whitelist = if options.disable_hint_validation {
        tracing::warn!("hint validation disabled; only compile trusted contracts");
        None
    } else {
        Some(HintWhitelist::global()?)
    };
    manager.replace("preprocessor", Preprocessor::new(whitelist))?;

    Ok(manager)
}

/// Contract compiler
///
/// Holds an immutable pipeline and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Compiler {
    options: CompileOptions,
    pass_manager: Arc<PassManager>,
}

impl Compiler {
    /// Create a contract compiler resolving imports against the system modules
    pub fn new(options: CompileOptions) -> Result<Self> {
        Self::with_reader(options, Arc::new(SystemModules))
    }

    /// Create a contract compiler resolving imports through `reader`
    pub fn with_reader(options: CompileOptions, reader: Arc<dyn ModuleReader>) -> Result<Self> {
        let pass_manager = contract_pass_manager(&options, reader)?;
        Ok(Self::with_pass_manager(options, pass_manager))
    }

    /// Create a compiler running a custom pipeline
    pub fn with_pass_manager(options: CompileOptions, pass_manager: PassManager) -> Self {
        Self {
            options,
            pass_manager: Arc::new(pass_manager),
        }
    }

    /// Options the compiler was built with
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// The pipeline
    pub fn pass_manager(&self) -> &PassManager {
        &self.pass_manager
    }

    /// Compile a contract source
    pub fn compile(&self, source: &str) -> Result<CompiledContract> {
        self.compile_file(source, "<main>")
    }

    /// Compile a contract source, recording `filename` in locations
    pub fn compile_file(&self, source: &str, filename: &str) -> Result<CompiledContract> {
        let mut context = PassManagerContext::new(source, filename);
        self.pass_manager.run(&mut context)?;

        let contract = context.contract.ok_or_else(|| {
            Error::pipeline("The pipeline finished without producing a contract.")
        })?;
        tracing::info!(
            file = filename,
            functions = contract.functions.len(),
            hints = contract.hints.len(),
            storage_vars = contract.storage_vars.len(),
            "compiled contract"
        );
        Ok(contract)
    }
}
