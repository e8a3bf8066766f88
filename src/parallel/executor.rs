//! Parallel executor for contract compilation
//!
//! Uses Rayon for work-stealing parallelism with configurable limits.

use crate::compiler::{CompiledContract, Compiler};
use crate::error::{Error, Result};
use rayon::prelude::*;

/// Configuration for parallel execution
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Maximum number of parallel tasks (default: num_cpus)
    pub max_parallelism: usize,
    /// Fail fast on first error vs collect all results
    pub fail_fast: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            fail_fast: false,
        }
    }
}

/// One contract to compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// File name recorded in locations
    pub filename: String,
    /// Contract source
    pub source: String,
}

impl SourceUnit {
    /// Creates a unit
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        SourceUnit {
            filename: filename.into(),
            source: source.into(),
        }
    }
}

/// Compile independent contracts in parallel
///
/// Results keep the order of `units`. Each compilation gets its own context; only the
/// compiler's pipeline is shared.
///
/// # Returns
/// * `Ok(results)` - One result per unit
/// * `Err(Error)` - Thread pool failure, or the first compile error (if fail_fast=true)
///
/// # Example
/// ```ignore
/// let compiler = Compiler::new(CompileOptions::default())?;
/// let results = compile_many(&compiler, &units, ParallelConfig::default())?;
/// ```
pub fn compile_many(
    compiler: &Compiler,
    units: &[SourceUnit],
    config: ParallelConfig,
) -> Result<Vec<Result<CompiledContract>>> {
    // Empty batch fast path
    if units.is_empty() {
        return Ok(Vec::new());
    }

    let compile = |unit: &SourceUnit| compiler.compile_file(&unit.source, &unit.filename);

    // Single unit - no parallelism needed
    if units.len() == 1 {
        let result = compile(&units[0]);
        if config.fail_fast {
            return result.map(|contract| vec![Ok(contract)]);
        }
        return Ok(vec![result]);
    }

    // Configure Rayon thread pool
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_parallelism.clamp(1, units.len()))
        .build()
        .map_err(|e| Error::RuntimeError(format!("Failed to create thread pool: {}", e)))?;

    tracing::debug!(
        units = units.len(),
        threads = pool.current_num_threads(),
        "compiling in parallel"
    );

    pool.install(|| {
        if config.fail_fast {
            units
                .par_iter()
                .map(compile)
                .collect::<Result<Vec<CompiledContract>>>()
                .map(|contracts| contracts.into_iter().map(Ok).collect())
        } else {
            Ok(units.par_iter().map(compile).collect())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;

    fn contract(name: &str) -> String {
        format!(
            "(lang starknet)\n@storage_var\n(func {} () (felt))\n\
             @view\n(func get (implicit storage_ptr) () (felt) (return ({}.read)))",
            name, name
        )
    }

    #[test]
    fn test_compile_many_keeps_order() {
        let compiler = Compiler::new(CompileOptions::default()).unwrap();
        let units: Vec<SourceUnit> = (0..6)
            .map(|i| SourceUnit::new(format!("c{}.sx", i), contract(&format!("v{}", i))))
            .collect();

        let results = compile_many(&compiler, &units, ParallelConfig::default()).unwrap();

        assert_eq!(results.len(), 6);
        for (i, result) in results.iter().enumerate() {
            let contract = result.as_ref().unwrap();
            assert_eq!(contract.storage_vars[0].name, format!("v{}", i));
        }
    }

    #[test]
    fn test_compile_many_empty() {
        let compiler = Compiler::new(CompileOptions::default()).unwrap();
        let results = compile_many(&compiler, &[], ParallelConfig::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_compile_many_error_handling() {
        let compiler = Compiler::new(CompileOptions::default()).unwrap();
        let units = vec![
            SourceUnit::new("ok.sx", contract("a")),
            SourceUnit::new("bad.sx", "(func f () (felt))"),
            SourceUnit::new("ok2.sx", contract("b")),
        ];

        let results = compile_many(&compiler, &units, ParallelConfig::default()).unwrap();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());

        let config = ParallelConfig {
            fail_fast: true,
            ..Default::default()
        };
        assert!(compile_many(&compiler, &units, config).is_err());
    }
}
