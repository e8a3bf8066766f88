//! `codegen` stage: lower every function to IR and assemble the contract artifact

use super::ir::{CompiledContract, IrGenerator, StorageVarInfo};
use super::optimizer::Optimizer;
use super::pass_manager::{PassManagerContext, Stage};
use crate::error::Result;
use crate::field::PRIME;
use crate::parser::Item;
use std::collections::BTreeMap;

/// Produces [`CompiledContract`] from the checked program
#[derive(Debug, Clone, Copy, Default)]
pub struct Codegen {
    opt_level: u8,
    opt_unused_functions: bool,
}

impl Codegen {
    /// Code generator running the optimizer at `opt_level`
    pub fn new(opt_level: u8, opt_unused_functions: bool) -> Self {
        Codegen {
            opt_level,
            opt_unused_functions,
        }
    }
}

impl Stage for Codegen {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        let mut generator = IrGenerator::new(&context.symbols);
        let mut functions = BTreeMap::new();
        for (name, func) in context.program.functions() {
            if func.is_extern {
                continue;
            }
            let function = generator.generate_function(&name, func)?;
            functions.insert(name, function);
        }
        let hints = generator.into_hints();

        Optimizer::new(self.opt_level)
            .with_unused_function_removal(self.opt_unused_functions)
            .optimize(&mut functions, &entry_points(context));

        let storage_vars = context
            .storage_vars
            .decls()
            .map(|decl| StorageVarInfo {
                name: decl.name.clone(),
                arity: decl.arity(),
                value_width: decl.value_width,
                base_address: decl.base_address(),
                readonly: decl.readonly,
            })
            .collect();

        let contract = CompiledContract {
            prime: PRIME.to_string(),
            functions,
            hints,
            abi: context.abi.clone(),
            storage_vars,
        };
        tracing::debug!(
            functions = contract.functions.len(),
            instructions = contract.instruction_count(),
            hints = contract.hints.len(),
            "generated code"
        );
        context.contract = Some(contract);
        Ok(())
    }
}

/// `@external` / `@view` functions of the main module
fn entry_points(context: &PassManagerContext) -> Vec<String> {
    let Some(main) = context.program.main_module() else {
        return Vec::new();
    };
    main.items
        .iter()
        .filter_map(|item| match item {
            Item::Function(func)
                if func.decorator("external").is_some() || func.decorator("view").is_some() =>
            {
                Some(func.name.clone())
            }
            _ => None,
        })
        .collect()
}
