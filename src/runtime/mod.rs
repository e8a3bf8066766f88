//! Runtime execution for compiled contracts

mod runner;

pub use runner::{Runner, DEFAULT_MAX_CALL_DEPTH};
