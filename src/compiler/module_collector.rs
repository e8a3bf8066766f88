//! `module_collector` stage: parse the main source and every module it depends on

use super::pass_manager::{PassManagerContext, Stage};
use crate::error::{Error, Result};
use crate::parser::{parse_module, Item, Module, Program};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Name the compiled file is registered under
pub const MAIN_MODULE: &str = "__main__";

/// Source of a module returned by a [`ModuleReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Module text
    pub source: String,
    /// File name recorded in locations
    pub filename: String,
}

/// Resolves dotted module names to source text
pub trait ModuleReader: Send + Sync {
    /// Read module `name`; [`Error::ModuleNotFound`] when unknown
    fn read(&self, name: &str) -> Result<ModuleSource>;
}

const SYSTEM_MODULES: [(&str, &str, &str); 3] = [
    (
        "starkware.cairo.common.cairo_builtins",
        "starkware/cairo/common/cairo_builtins.sx",
        include_str!("system_modules/cairo_builtins.sx"),
    ),
    (
        "starkware.cairo.common.hash",
        "starkware/cairo/common/hash.sx",
        include_str!("system_modules/hash.sx"),
    ),
    (
        "starkware.starknet.core.storage.storage",
        "starkware/starknet/core/storage/storage.sx",
        include_str!("system_modules/storage.sx"),
    ),
];

/// Modules shipped with the compiler
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemModules;

impl ModuleReader for SystemModules {
    fn read(&self, name: &str) -> Result<ModuleSource> {
        SYSTEM_MODULES
            .iter()
            .find(|(module, _, _)| *module == name)
            .map(|(_, filename, source)| ModuleSource {
                source: source.to_string(),
                filename: filename.to_string(),
            })
            .ok_or_else(|| Error::ModuleNotFound {
                module: name.to_string(),
            })
    }
}

/// In-memory modules layered over [`SystemModules`]
#[derive(Debug, Clone, Default)]
pub struct MapModuleReader {
    modules: HashMap<String, String>,
}

impl MapModuleReader {
    /// Creates a reader holding only the system modules
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` as module `name`
    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.modules.insert(name.into(), source.into());
        self
    }
}

impl ModuleReader for MapModuleReader {
    fn read(&self, name: &str) -> Result<ModuleSource> {
        match self.modules.get(name) {
            Some(source) => Ok(ModuleSource {
                source: source.clone(),
                filename: format!("{}.sx", name.replace('.', "/")),
            }),
            None => SystemModules.read(name),
        }
    }
}

/// Parses the main module and, recursively, its imports plus `additional_modules`
///
/// Each module is parsed once. Dependencies precede their importers and the main module
/// comes last.
pub struct ModuleCollector {
    reader: Arc<dyn ModuleReader>,
    additional_modules: Vec<String>,
}

impl ModuleCollector {
    /// Collector resolving imports through `reader`
    pub fn new(reader: Arc<dyn ModuleReader>) -> Self {
        ModuleCollector {
            reader,
            additional_modules: Vec::new(),
        }
    }

    /// Modules loaded even when nothing imports them
    pub fn with_additional_modules(mut self, modules: Vec<String>) -> Self {
        self.additional_modules = modules;
        self
    }

    /// Names of the auto-loaded modules
    pub fn additional_modules(&self) -> &[String] {
        &self.additional_modules
    }

    fn visit(&self, name: &str, seen: &mut HashSet<String>, out: &mut Vec<Module>) -> Result<()> {
        if !seen.insert(name.to_string()) {
            return Ok(());
        }
        let ModuleSource { source, filename } = self.reader.read(name)?;
        let module = parse_module(name, &filename, &source)?;
        self.visit_imports(&module, seen, out)?;
        tracing::trace!(module = name, "collected module");
        out.push(module);
        Ok(())
    }

    fn visit_imports(
        &self,
        module: &Module,
        seen: &mut HashSet<String>,
        out: &mut Vec<Module>,
    ) -> Result<()> {
        for item in &module.items {
            if let Item::Import(import) = item {
                self.visit(&import.module, seen, out)?;
            }
        }
        Ok(())
    }
}

impl Stage for ModuleCollector {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        let main = parse_module(MAIN_MODULE, &context.filename, &context.source)?;

        let mut seen = HashSet::new();
        seen.insert(MAIN_MODULE.to_string());
        let mut modules = Vec::new();
        for name in &self.additional_modules {
            self.visit(name, &mut seen, &mut modules)?;
        }
        self.visit_imports(&main, &mut seen, &mut modules)?;
        modules.push(main);

        context.program = Program { modules };
        Ok(())
    }

    fn modifies_ast(&self) -> bool {
        true
    }
}
