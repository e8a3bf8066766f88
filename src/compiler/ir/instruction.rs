//! IR instruction definitions

use crate::field::FieldElement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual register holding one field element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IrReg(pub u32);

impl IrReg {
    /// Creates a new virtual register with the given ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Register index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for IrReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// IR instruction (three-address code over field elements)
///
/// Implicit argument registers (`storage_ptr`, builtin pointers) are updated in place by the
/// instructions that consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrInstruction {
    /// Load constant: dst = value
    Const(IrReg, FieldElement),

    // Arithmetic mod P (dst = lhs op rhs)
    /// Addition: dst = lhs + rhs
    Add(IrReg, IrReg, IrReg),
    /// Subtraction: dst = lhs - rhs
    Sub(IrReg, IrReg, IrReg),
    /// Multiplication: dst = lhs * rhs
    Mul(IrReg, IrReg, IrReg),

    /// Move/copy register: dst = src
    Move(IrReg, IrReg),

    /// Fail unless lhs == rhs
    AssertEq(IrReg, IrReg),

    /// dst = hash2(lhs, rhs)
    Hash2(IrReg, IrReg, IrReg),

    /// dst = storage[address]; logs one access and advances `storage_ptr`
    StorageRead {
        /// Destination register
        dst: IrReg,
        /// Slot address
        address: IrReg,
        /// Implicit storage pointer, updated in place
        storage_ptr: IrReg,
    },

    /// storage[address] = value; logs one access and advances `storage_ptr`
    StorageWrite {
        /// Slot address
        address: IrReg,
        /// New value
        value: IrReg,
        /// Implicit storage pointer, updated in place
        storage_ptr: IrReg,
    },

    /// Call a compiled function
    Call {
        /// Fully qualified callee name
        callee: String,
        /// Caller registers bound to the callee's implicit arguments, updated on return
        implicit: Vec<IrReg>,
        /// Explicit arguments
        args: Vec<IrReg>,
        /// Registers receiving the return values
        results: Vec<IrReg>,
    },

    /// Host-side hint (index into the contract's hint table)
    Hint(usize),

    /// Return implicit arguments and values to the caller
    Return {
        /// Final implicit argument values
        implicit: Vec<IrReg>,
        /// Returned values
        values: Vec<IrReg>,
    },

    /// No operation (removed by the optimizer)
    Nop,
}

impl IrInstruction {
    /// Register written by the instruction, if exactly one
    pub fn dst(&self) -> Option<IrReg> {
        match self {
            IrInstruction::Const(dst, _)
            | IrInstruction::Add(dst, _, _)
            | IrInstruction::Sub(dst, _, _)
            | IrInstruction::Mul(dst, _, _)
            | IrInstruction::Move(dst, _)
            | IrInstruction::Hash2(dst, _, _)
            | IrInstruction::StorageRead { dst, .. } => Some(*dst),
            _ => None,
        }
    }

    /// Callee of a `Call`
    pub fn callee(&self) -> Option<&str> {
        match self {
            IrInstruction::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }
}
