//! Reference interpreter for compiled contracts
//!
//! Executes IR against an injected [`Storage`] and records every slot access in a
//! [`StorageTrace`]. The implicit `storage_ptr` is the trace index the next access must
//! land on; every other implicit argument starts at zero and is passed through untouched.

use crate::compiler::ir::{CompiledContract, IrFunction, IrInstruction, IrReg};
use crate::compiler::storage_var::STORAGE_PTR;
use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::storage::{hash2, storage_read, storage_write, Storage, StorageTrace};

/// Default nesting limit for calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Storage and trace shared by every frame of one invocation
struct Machine<'s> {
    storage: &'s mut dyn Storage,
    trace: &'s mut StorageTrace,
}

/// Executes functions of a [`CompiledContract`]
pub struct Runner<'a> {
    contract: &'a CompiledContract,
    max_call_depth: usize,
}

impl<'a> Runner<'a> {
    /// Creates a runner for `contract`
    pub fn new(contract: &'a CompiledContract) -> Self {
        Runner {
            contract,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Set the call nesting limit
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Run `function` with explicit `args` and return its values
    ///
    /// Accesses are appended to `trace`; the function must hand back a `storage_ptr` equal to
    /// the trace end.
    pub fn run(
        &self,
        function: &str,
        args: &[FieldElement],
        storage: &mut dyn Storage,
        trace: &mut StorageTrace,
    ) -> Result<Vec<FieldElement>> {
        let func = self.function(function)?;
        let implicit: Vec<FieldElement> = func
            .implicit_args
            .iter()
            .map(|name| {
                if name == STORAGE_PTR {
                    FieldElement::from(trace.end())
                } else {
                    FieldElement::zero()
                }
            })
            .collect();

        tracing::debug!(function, args = args.len(), "running function");
        let mut machine = Machine { storage, trace };
        let (implicit_out, values) = self.call(func, implicit, args.to_vec(), &mut machine, 0)?;

        if let Some(index) = func.implicit_args.iter().position(|n| n == STORAGE_PTR) {
            let returned = pointer(&implicit_out[index])?;
            if returned != machine.trace.end() {
                return Err(Error::StorageTrace {
                    expected: machine.trace.end(),
                    got: returned,
                });
            }
        }
        Ok(values)
    }

    fn function(&self, name: &str) -> Result<&'a IrFunction> {
        self.contract
            .function(name)
            .ok_or_else(|| Error::runtime(format!("Unknown function '{}'", name)))
    }

    fn call(
        &self,
        func: &IrFunction,
        implicit: Vec<FieldElement>,
        args: Vec<FieldElement>,
        machine: &mut Machine<'_>,
        depth: usize,
    ) -> Result<(Vec<FieldElement>, Vec<FieldElement>)> {
        if depth >= self.max_call_depth {
            return Err(Error::runtime(format!(
                "Call depth limit {} exceeded in '{}'",
                self.max_call_depth, func.name
            )));
        }
        if args.len() != func.params.len() || implicit.len() != func.implicit_regs.len() {
            return Err(Error::runtime(format!(
                "'{}' expects {} arguments, got {}",
                func.name,
                func.params.len(),
                args.len()
            )));
        }

        let mut regs = Registers::new(func);
        for (reg, value) in func.implicit_regs.iter().zip(implicit) {
            regs.set(*reg, value);
        }
        for (reg, value) in func.params.iter().zip(args) {
            regs.set(*reg, value);
        }

        for instr in &func.instructions {
            match instr {
                IrInstruction::Const(dst, value) => regs.set(*dst, value.clone()),
                IrInstruction::Add(dst, lhs, rhs) => {
                    let value = regs.get(*lhs)? + regs.get(*rhs)?;
                    regs.set(*dst, value);
                }
                IrInstruction::Sub(dst, lhs, rhs) => {
                    let value = regs.get(*lhs)? - regs.get(*rhs)?;
                    regs.set(*dst, value);
                }
                IrInstruction::Mul(dst, lhs, rhs) => {
                    let value = regs.get(*lhs)? * regs.get(*rhs)?;
                    regs.set(*dst, value);
                }
                IrInstruction::Move(dst, src) => {
                    let value = regs.get(*src)?.clone();
                    regs.set(*dst, value);
                }
                IrInstruction::AssertEq(lhs, rhs) => {
                    let (a, b) = (regs.get(*lhs)?, regs.get(*rhs)?);
                    if a != b {
                        return Err(Error::runtime(format!(
                            "assert_eq failed in '{}': {} != {}",
                            func.name, a, b
                        )));
                    }
                }
                IrInstruction::Hash2(dst, lhs, rhs) => {
                    let value = hash2(regs.get(*lhs)?, regs.get(*rhs)?);
                    regs.set(*dst, value);
                }
                IrInstruction::StorageRead {
                    dst,
                    address,
                    storage_ptr,
                } => {
                    let ptr = pointer(regs.get(*storage_ptr)?)?;
                    let (next, value) =
                        storage_read(machine.storage, machine.trace, ptr, regs.get(*address)?)?;
                    regs.set(*dst, value);
                    regs.set(*storage_ptr, FieldElement::from(next));
                }
                IrInstruction::StorageWrite {
                    address,
                    value,
                    storage_ptr,
                } => {
                    let ptr = pointer(regs.get(*storage_ptr)?)?;
                    let next = storage_write(
                        machine.storage,
                        machine.trace,
                        ptr,
                        regs.get(*address)?,
                        regs.get(*value)?.clone(),
                    )?;
                    regs.set(*storage_ptr, FieldElement::from(next));
                }
                IrInstruction::Call {
                    callee,
                    implicit,
                    args,
                    results,
                } => {
                    let target = self.function(callee)?;
                    let implicit_in = regs.get_all(implicit)?;
                    let args_in = regs.get_all(args)?;
                    let (implicit_out, values) =
                        self.call(target, implicit_in, args_in, machine, depth + 1)?;
                    if values.len() != results.len() {
                        return Err(Error::runtime(format!(
                            "'{}' returned {} values, expected {}",
                            callee,
                            values.len(),
                            results.len()
                        )));
                    }
                    for (reg, value) in implicit.iter().zip(implicit_out) {
                        regs.set(*reg, value);
                    }
                    for (reg, value) in results.iter().zip(values) {
                        regs.set(*reg, value);
                    }
                }
                IrInstruction::Hint(index) => {
                    // Hints only feed nondeterministic values to the host VM.
                    tracing::trace!(function = %func.name, hint = index, "skipping hint");
                }
                IrInstruction::Return { implicit, values } => {
                    return Ok((regs.get_all(implicit)?, regs.get_all(values)?));
                }
                IrInstruction::Nop => {}
            }
        }

        Err(Error::runtime(format!(
            "'{}' ended without returning",
            func.name
        )))
    }
}

/// Register file of one frame
struct Registers<'f> {
    function: &'f str,
    values: Vec<Option<FieldElement>>,
}

impl<'f> Registers<'f> {
    fn new(func: &'f IrFunction) -> Self {
        Registers {
            function: &func.name,
            values: vec![None; func.register_count as usize],
        }
    }

    fn get(&self, reg: IrReg) -> Result<&FieldElement> {
        self.values
            .get(reg.index())
            .and_then(|v| v.as_ref())
            .ok_or_else(|| {
                Error::runtime(format!("Read of unset register {} in '{}'", reg, self.function))
            })
    }

    fn get_all(&self, regs: &[IrReg]) -> Result<Vec<FieldElement>> {
        regs.iter().map(|r| self.get(*r).cloned()).collect()
    }

    fn set(&mut self, reg: IrReg, value: FieldElement) {
        let index = reg.index();
        if index >= self.values.len() {
            self.values.resize(index + 1, None);
        }
        self.values[index] = Some(value);
    }
}

fn pointer(value: &FieldElement) -> Result<usize> {
    value
        .to_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| Error::runtime(format!("Invalid storage_ptr {}", value)))
}
