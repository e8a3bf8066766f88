//! Ordered, name-indexed pass pipeline
//!
//! Extensions position their stages relative to stable anchor names
//! (`identifier_collector`, `struct_collector`, ...) without knowing the rest of the layout.
//! Stages live in an explicit vector; a name -> position map gives O(1) lookup and is
//! rebuilt on every insertion.

use super::identifiers::SymbolTable;
use super::ir::CompiledContract;
use super::preprocessor::AbiEntry;
use super::storage_var::StorageVarRegistry;
use super::structs::StructLayouts;
use crate::error::{Error, Result};
use crate::parser::Program;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One step of the pipeline
pub trait Stage: Send + Sync {
    /// Transform the compilation state
    fn run(&self, context: &mut PassManagerContext) -> Result<()>;

    /// Whether the stage rewrites `context.program` in place
    fn modifies_ast(&self) -> bool {
        false
    }
}

/// A named stage
#[derive(Clone)]
pub struct PassStage {
    /// Unique name within the pipeline
    pub name: String,
    /// The transformation
    pub stage: Arc<dyn Stage>,
}

impl fmt::Debug for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassStage")
            .field("name", &self.name)
            .field("modifies_ast", &self.stage.modifies_ast())
            .finish()
    }
}

/// Per-compilation state threaded through every stage
#[derive(Debug, Clone, Default)]
pub struct PassManagerContext {
    /// Main module source
    pub source: String,
    /// Main module file name
    pub filename: String,
    /// Parsed modules (filled by `module_collector`)
    pub program: Program,
    /// Function and struct symbols (filled by `identifier_collector`)
    pub symbols: SymbolTable,
    /// Struct layouts (filled by `struct_collector`)
    pub structs: StructLayouts,
    /// Storage variable declarations and their synthesized accessors
    pub storage_vars: StorageVarRegistry,
    /// Contract ABI (filled by `preprocessor`)
    pub abi: Vec<AbiEntry>,
    /// Final artifact (filled by `codegen`)
    pub contract: Option<CompiledContract>,
}

impl PassManagerContext {
    /// Fresh state for compiling `source`
    pub fn new(source: impl Into<String>, filename: impl Into<String>) -> Self {
        PassManagerContext {
            source: source.into(),
            filename: filename.into(),
            ..Default::default()
        }
    }
}

/// The pipeline
#[derive(Clone, Default, Debug)]
pub struct PassManager {
    stages: Vec<PassStage>,
    positions: HashMap<String, usize>,
}

impl PassManager {
    /// Creates an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn add_stage<S: Stage + 'static>(&mut self, name: &str, stage: S) -> Result<()> {
        self.insert_at(self.stages.len(), name, Arc::new(stage))
    }

    /// Swap the stage called `name`, keeping its position
    pub fn replace<S: Stage + 'static>(&mut self, name: &str, stage: S) -> Result<()> {
        let index = self.position(name)?;
        self.stages[index].stage = Arc::new(stage);
        Ok(())
    }

    /// Insert `new_name` right before `existing`
    pub fn add_before<S: Stage + 'static>(
        &mut self,
        existing: &str,
        new_name: &str,
        stage: S,
    ) -> Result<()> {
        let index = self.position(existing)?;
        self.insert_at(index, new_name, Arc::new(stage))
    }

    /// Insert `new_name` right after `existing`
    pub fn add_after<S: Stage + 'static>(
        &mut self,
        existing: &str,
        new_name: &str,
        stage: S,
    ) -> Result<()> {
        let index = self.position(existing)?;
        self.insert_at(index + 1, new_name, Arc::new(stage))
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| Error::pipeline(format!("Stage '{}' does not exist.", name)))
    }

    fn insert_at(&mut self, index: usize, name: &str, stage: Arc<dyn Stage>) -> Result<()> {
        if self.positions.contains_key(name) {
            return Err(Error::pipeline(format!("Stage '{}' already exists.", name)));
        }
        self.stages.insert(
            index,
            PassStage {
                name: name.to_string(),
                stage,
            },
        );
        self.positions = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        Ok(())
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns true if a stage called `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Run every stage in order, stopping at the first error
    pub fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        for stage in &self.stages {
            Self::run_stage(stage, context)?;
        }
        Ok(())
    }

    /// Run stages up to and including `last_stage`
    pub fn run_until(&self, context: &mut PassManagerContext, last_stage: &str) -> Result<()> {
        let last = self.position(last_stage)?;
        for stage in &self.stages[..=last] {
            Self::run_stage(stage, context)?;
        }
        Ok(())
    }

    fn run_stage(stage: &PassStage, context: &mut PassManagerContext) -> Result<()> {
        tracing::debug!(stage = %stage.name, file = %context.filename, "running stage");

        if cfg!(debug_assertions) && !stage.stage.modifies_ast() {
            let before = context.program.clone();
            stage.stage.run(context)?;
            if context.program != before {
                return Err(Error::codegen(format!(
                    "Stage '{}' does not declare AST modification but changed the program.",
                    stage.name
                )));
            }
            return Ok(());
        }

        stage.stage.run(context)
    }
}
