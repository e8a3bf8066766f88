//! # Intermediate Representation (IR) for contract compilation
//!
//! Function bodies are lowered to three-address code over field-element registers.
//! Storage and hashing externs become dedicated instructions; everything else is a `Call`.
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── instruction.rs  # IrReg, IrInstruction
//! ├── program.rs      # IrFunction, CompiledContract (serde artifact)
//! └── generator.rs    # IrGenerator (AST -> IR)
//! ```

mod generator;
mod instruction;
mod program;

pub use generator::IrGenerator;
pub use instruction::{IrInstruction, IrReg};
pub use program::{CompiledContract, CompiledHint, IrFunction, StorageVarInfo};
