//! # IR Optimizer
//!
//! Optimization passes for the IR:
//! - Constant folding (mod P)
//! - Unused function elimination

use super::ir::{IrFunction, IrInstruction, IrReg};
use crate::field::FieldElement;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Optimizer with configurable optimization level
pub struct Optimizer {
    level: u8,
    remove_unused_functions: bool,
}

impl Optimizer {
    /// Create a new optimizer with the specified optimization level (0-1)
    pub fn new(level: u8) -> Self {
        Self {
            level,
            remove_unused_functions: false,
        }
    }

    /// Drop functions unreachable from the entry points
    pub fn with_unused_function_removal(mut self, enabled: bool) -> Self {
        self.remove_unused_functions = enabled;
        self
    }

    /// Run all optimization passes
    ///
    /// `entry_points` roots the reachability analysis; when empty every function is kept.
    pub fn optimize(&self, functions: &mut BTreeMap<String, IrFunction>, entry_points: &[String]) {
        if self.level >= 1 {
            for function in functions.values_mut() {
                self.constant_folding(function);
            }
        }

        if self.remove_unused_functions && !entry_points.is_empty() {
            let reachable = reachable_functions(functions, entry_points);
            let before = functions.len();
            functions.retain(|name, _| reachable.contains(name));
            tracing::debug!(
                removed = before - functions.len(),
                kept = functions.len(),
                "removed unused functions"
            );
        }

        // Always remove Nops
        for function in functions.values_mut() {
            function
                .instructions
                .retain(|instr| !matches!(instr, IrInstruction::Nop));
        }
    }

    /// Constant folding - evaluate arithmetic on constants at compile time
    fn constant_folding(&self, function: &mut IrFunction) {
        let mut constants: HashMap<IrReg, FieldElement> = HashMap::new();

        for instr in function.instructions.iter_mut() {
            let folded = match instr {
                IrInstruction::Const(dst, value) => {
                    constants.insert(*dst, value.clone());
                    None
                }
                IrInstruction::Add(dst, lhs, rhs) => {
                    fold(&constants, *dst, *lhs, *rhs, |a, b| a + b)
                }
                IrInstruction::Sub(dst, lhs, rhs) => {
                    fold(&constants, *dst, *lhs, *rhs, |a, b| a - b)
                }
                IrInstruction::Mul(dst, lhs, rhs) => {
                    fold(&constants, *dst, *lhs, *rhs, |a, b| a * b)
                }
                IrInstruction::Move(dst, src) => {
                    constants.get(src).map(|v| (*dst, v.clone()))
                }
                _ => None,
            };

            if let Some((dst, value)) = folded {
                constants.insert(dst, value.clone());
                *instr = IrInstruction::Const(dst, value);
            }
        }
    }
}

fn fold<F>(
    constants: &HashMap<IrReg, FieldElement>,
    dst: IrReg,
    lhs: IrReg,
    rhs: IrReg,
    op: F,
) -> Option<(IrReg, FieldElement)>
where
    F: Fn(&FieldElement, &FieldElement) -> FieldElement,
{
    let a = constants.get(&lhs)?;
    let b = constants.get(&rhs)?;
    Some((dst, op(a, b)))
}

/// Functions transitively called from `entry_points`
fn reachable_functions(
    functions: &BTreeMap<String, IrFunction>,
    entry_points: &[String],
) -> HashSet<String> {
    let mut reachable: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<&str> = entry_points.iter().map(|s| s.as_str()).collect();

    while let Some(name) = queue.pop_front() {
        if !reachable.insert(name.to_string()) {
            continue;
        }
        if let Some(function) = functions.get(name) {
            queue.extend(function.instructions.iter().filter_map(|i| i.callee()));
        }
    }
    reachable
}
