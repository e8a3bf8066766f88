//! Compiled functions and the contract artifact

use super::instruction::{IrInstruction, IrReg};
use crate::compiler::preprocessor::AbiEntry;
use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::parser::Location;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One compiled function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrFunction {
    /// Fully qualified name
    pub name: String,
    /// Implicit argument names, in order
    pub implicit_args: Vec<String>,
    /// Registers holding the implicit arguments on entry
    pub implicit_regs: Vec<IrReg>,
    /// Registers holding the explicit parameters on entry
    pub params: Vec<IrReg>,
    /// Number of return values
    pub return_count: usize,
    /// Registers used (all ids are below this)
    pub register_count: u32,
    /// Instructions in execution order
    pub instructions: Vec<IrInstruction>,
    /// Decorator names
    pub decorators: Vec<String>,
}

/// Hint carried in the artifact for the host VM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledHint {
    /// Hint source
    pub code: String,
    /// Function the hint belongs to
    pub function: String,
    /// Source location
    pub location: Location,
}

/// Storage variable summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageVarInfo {
    /// Variable name
    pub name: String,
    /// Number of keys
    pub arity: usize,
    /// Field elements per value
    pub value_width: usize,
    /// Address of the zero-key slot
    pub base_address: FieldElement,
    /// No `write` accessor
    pub readonly: bool,
}

/// Output of the `codegen` stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledContract {
    /// Field prime the program computes modulo
    pub prime: String,
    /// Compiled functions by qualified name
    pub functions: BTreeMap<String, IrFunction>,
    /// Hint table
    pub hints: Vec<CompiledHint>,
    /// Entry point ABI
    pub abi: Vec<AbiEntry>,
    /// Declared storage variables
    pub storage_vars: Vec<StorageVarInfo>,
}

impl CompiledContract {
    /// Function called `name`
    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.get(name)
    }

    /// Storage variable called `name`
    pub fn storage_var(&self, name: &str) -> Option<&StorageVarInfo> {
        self.storage_vars.iter().find(|v| v.name == name)
    }

    /// Total instruction count over all functions
    pub fn instruction_count(&self) -> usize {
        self.functions.values().map(|f| f.instructions.len()).sum()
    }

    /// Pretty-printed JSON artifact
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::codegen(format!("Failed to serialize contract: {}", e)))
    }

    /// Parse an artifact produced by [`CompiledContract::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::ParseError(format!("Invalid contract artifact: {}", e)))
    }
}
