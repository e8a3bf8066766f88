//! # StarkPass - Storage Variables for Provable Contracts
//!
//! A contract compiler built around an extensible pass pipeline. Contracts declare
//! persistent, key-indexed state with `@storage_var`; the pipeline validates those
//! declarations, synthesizes `addr` / `read` / `write` accessors that log every slot access,
//! and rejects hints that are not on a versioned whitelist.
//!
//! ## Quick Start
//!
//! ```rust
//! use starkpass::{
//!     storage_address, CompileOptions, Compiler, FieldElement, InMemoryStorage, Runner,
//!     Storage, StorageTrace,
//! };
//!
//! # fn main() -> starkpass::Result<()> {
//! let source = r#"
//! (lang starknet)
//!
//! @storage_var
//! (func balance ((owner felt)) (felt))
//!
//! @external
//! (func deposit (implicit storage_ptr) ((owner felt) (amount felt)) ()
//!   (let current (balance.read owner))
//!   (balance.write owner (+ current amount))
//!   (return))
//! "#;
//!
//! let contract = Compiler::new(CompileOptions::default())?.compile(source)?;
//!
//! let mut storage = InMemoryStorage::new();
//! let mut trace = StorageTrace::new();
//! let owner = FieldElement::from(7u64);
//! Runner::new(&contract).run(
//!     "deposit",
//!     &[owner.clone(), FieldElement::from(100u64)],
//!     &mut storage,
//!     &mut trace,
//! )?;
//!
//! let slot = storage_address("balance", &[owner]);
//! assert_eq!(storage.read(&slot), FieldElement::from(100u64));
//! assert_eq!(trace.len(), 2); // one read, one write
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → Scanner → Parser → PassManager stages → CompiledContract → Runner
//! ```
//!
//! ### Main Components
//!
//! - [`compiler::PassManager`] - Ordered stage registry with `add_before` / `add_after` /
//!   `replace` anchoring
//! - [`compiler::storage_var`] - Storage variable declaration and lowering stages
//! - [`storage`] - Address scheme and the `storage_read` / `storage_write` primitives
//! - [`security`] - Hint whitelist and its formatting-insensitive matcher
//! - [`Runner`] - Reference interpreter threading `storage_ptr` through a [`StorageTrace`]
//! - [`parallel::compile_many`] - Rayon-backed batch compilation
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`]; [`Error::classify`] separates user errors
//! from compiler bugs and configuration defects.
//!
//! ```rust
//! # use starkpass::{CompileOptions, Compiler, Error};
//! let compiler = Compiler::new(CompileOptions::default()).unwrap();
//! let err = compiler
//!     .compile("(lang starknet)\n@storage_var\n(func x () (felt) (return 1))")
//!     .unwrap_err();
//! assert!(matches!(err, Error::Declaration { .. }));
//! ```

#![allow(clippy::new_without_default)]

/// Version of the StarkPass compiler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod field;
pub mod lexer;
pub mod parallel;
pub mod parser;
pub mod runtime;
pub mod security;
pub mod storage;

// Re-export main types
pub use compiler::{
    contract_pass_manager, default_pass_manager, CompileOptions, CompiledContract, Compiler,
    PassManager, PassManagerContext, Stage,
};
pub use error::{Error, ErrorSeverity, Result};
pub use field::FieldElement;
pub use lexer::{SExprScanner, Token, TokenKind};
pub use parser::{Program, SExprParser};
pub use runtime::Runner;
pub use security::HintWhitelist;
pub use storage::{
    base_address, hash2, storage_address, InMemoryStorage, Storage, StorageAccessRecord,
    StorageTrace,
};

/// Type alias for the S-expression scanner (lexer).
pub type Scanner = SExprScanner;

/// Type alias for the S-expression parser.
pub type Parser = SExprParser;
