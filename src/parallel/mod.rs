//! Parallel compilation support
//!
//! Compiles independent contracts concurrently over a shared, immutable pipeline.

mod executor;

pub use executor::{compile_many, ParallelConfig, SourceUnit};
