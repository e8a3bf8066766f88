//! IR Generator - lowers checked function bodies to IR
//!
//! Locals may be rebound; every `let` binds fresh registers, so each register is written
//! once except implicit argument registers, which the storage instructions and calls update
//! in place.

use super::instruction::{IrInstruction, IrReg};
use super::program::{CompiledHint, IrFunction};
use crate::compiler::identifiers::{FunctionSignature, SymbolTable};
use crate::error::{Error, Result};
use crate::parser::{BinaryOp, ExprKind, Expression, Function, Statement};
use std::collections::HashMap;

/// IR Generator - transforms function ASTs to IR
pub struct IrGenerator<'a> {
    symbols: &'a SymbolTable,
    /// Next available register
    next_reg: u32,
    /// Variable to register mapping of the current function
    var_map: HashMap<String, IrReg>,
    /// Implicit argument registers of the current function
    implicit_regs: Vec<IrReg>,
    /// Generated instructions of the current function
    instructions: Vec<IrInstruction>,
    /// Hint table shared by all functions
    hints: Vec<CompiledHint>,
    /// Function being lowered
    current: String,
}

impl<'a> IrGenerator<'a> {
    /// Create a generator resolving callees through `symbols`
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            next_reg: 0,
            var_map: HashMap::new(),
            implicit_regs: Vec::new(),
            instructions: Vec::new(),
            hints: Vec::new(),
            current: String::new(),
        }
    }

    /// Lower one function
    pub fn generate_function(&mut self, name: &str, func: &Function) -> Result<IrFunction> {
        self.next_reg = 0;
        self.var_map.clear();
        self.instructions.clear();
        self.current = name.to_string();

        self.implicit_regs = Vec::with_capacity(func.implicit_names().len());
        for implicit in func.implicit_names() {
            let reg = self.alloc_reg();
            self.var_map.insert(implicit.clone(), reg);
            self.implicit_regs.push(reg);
        }
        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            let reg = self.alloc_reg();
            self.var_map.insert(param.name.clone(), reg);
            params.push(reg);
        }

        for statement in &func.body {
            self.generate_statement(statement)?;
        }
        if !matches!(self.instructions.last(), Some(IrInstruction::Return { .. })) {
            if !func.returns.is_empty() {
                return Err(Error::codegen(format!(
                    "Function '{}' falls through without returning its values.",
                    name
                )));
            }
            self.emit(IrInstruction::Return {
                implicit: self.implicit_regs.clone(),
                values: Vec::new(),
            });
        }

        Ok(IrFunction {
            name: name.to_string(),
            implicit_args: func.implicit_names().to_vec(),
            implicit_regs: self.implicit_regs.clone(),
            params,
            return_count: func.returns.len(),
            register_count: self.next_reg,
            instructions: std::mem::take(&mut self.instructions),
            decorators: func.decorators.iter().map(|d| d.name.clone()).collect(),
        })
    }

    /// Hint table collected so far
    pub fn into_hints(self) -> Vec<CompiledHint> {
        self.hints
    }

    fn generate_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Let { names, value, .. } => {
                let regs = match &value.kind {
                    ExprKind::Call { callee, args } => self.generate_call(callee, args)?,
                    _ => vec![self.generate_expr(value)?],
                };
                if regs.len() != names.len() {
                    return Err(Error::codegen(format!(
                        "'let' in '{}' binds {} names to {} values.",
                        self.current,
                        names.len(),
                        regs.len()
                    )));
                }
                for (name, reg) in names.iter().zip(regs) {
                    self.var_map.insert(name.clone(), reg);
                }
            }
            Statement::Return { values, .. } => {
                let mut regs = Vec::with_capacity(values.len());
                for value in values {
                    regs.push(self.generate_expr(value)?);
                }
                self.emit(IrInstruction::Return {
                    implicit: self.implicit_regs.clone(),
                    values: regs,
                });
            }
            Statement::Hint { code, location } => {
                let index = self.hints.len();
                self.hints.push(CompiledHint {
                    code: code.clone(),
                    function: self.current.clone(),
                    location: location.clone(),
                });
                self.emit(IrInstruction::Hint(index));
            }
            Statement::AssertEq { lhs, rhs, .. } => {
                let lhs = self.generate_expr(lhs)?;
                let rhs = self.generate_expr(rhs)?;
                self.emit(IrInstruction::AssertEq(lhs, rhs));
            }
            Statement::Expression(expr) => match &expr.kind {
                ExprKind::Call { callee, args } => {
                    self.generate_call(callee, args)?;
                }
                _ => {
                    self.generate_expr(expr)?;
                }
            },
        }
        Ok(())
    }

    /// Lower an expression producing exactly one value
    fn generate_expr(&mut self, expr: &Expression) -> Result<IrReg> {
        match &expr.kind {
            ExprKind::Const(value) => {
                let dst = self.alloc_reg();
                self.emit(IrInstruction::Const(dst, value.clone()));
                Ok(dst)
            }
            ExprKind::Identifier(name) => self.var_map.get(name).copied().ok_or_else(|| {
                Error::codegen(format!(
                    "Unresolved identifier '{}' in '{}'.",
                    name, self.current
                ))
            }),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.generate_expr(lhs)?;
                let rhs = self.generate_expr(rhs)?;
                let dst = self.alloc_reg();
                self.emit(match op {
                    BinaryOp::Add => IrInstruction::Add(dst, lhs, rhs),
                    BinaryOp::Sub => IrInstruction::Sub(dst, lhs, rhs),
                    BinaryOp::Mul => IrInstruction::Mul(dst, lhs, rhs),
                });
                Ok(dst)
            }
            ExprKind::Call { callee, args } => {
                let regs = self.generate_call(callee, args)?;
                match regs.as_slice() {
                    [reg] => Ok(*reg),
                    _ => Err(Error::codegen(format!(
                        "Call to '{}' used as a value produces {} values.",
                        callee,
                        regs.len()
                    ))),
                }
            }
        }
    }

    /// Lower a call and return the registers holding its results
    fn generate_call(&mut self, callee: &str, args: &[Expression]) -> Result<Vec<IrReg>> {
        let symbols = self.symbols;
        let signature = symbols.function(callee).ok_or_else(|| {
            Error::codegen(format!("Unresolved function '{}' in '{}'.", callee, self.current))
        })?;

        let mut arg_regs = Vec::with_capacity(args.len());
        for arg in args {
            arg_regs.push(self.generate_expr(arg)?);
        }
        let implicit = self.implicit_bindings(signature)?;

        if signature.is_extern {
            return self.generate_builtin(signature, implicit, arg_regs);
        }

        let results: Vec<IrReg> = (0..signature.returns.len())
            .map(|_| self.alloc_reg())
            .collect();
        self.emit(IrInstruction::Call {
            callee: callee.to_string(),
            implicit,
            args: arg_regs,
            results: results.clone(),
        });
        Ok(results)
    }

    fn implicit_bindings(&self, signature: &FunctionSignature) -> Result<Vec<IrReg>> {
        signature
            .implicit_args
            .iter()
            .map(|name| {
                self.var_map.get(name).copied().ok_or_else(|| {
                    Error::codegen(format!(
                        "Implicit argument '{}' unbound in '{}'.",
                        name, self.current
                    ))
                })
            })
            .collect()
    }

    /// Externs are implemented by the VM
    fn generate_builtin(
        &mut self,
        signature: &FunctionSignature,
        implicit: Vec<IrReg>,
        args: Vec<IrReg>,
    ) -> Result<Vec<IrReg>> {
        match (signature.name.as_str(), &args[..], &implicit[..]) {
            ("hash2", [x, y], []) => {
                let dst = self.alloc_reg();
                self.emit(IrInstruction::Hash2(dst, *x, *y));
                Ok(vec![dst])
            }
            ("storage_read", [address], [storage_ptr]) => {
                let dst = self.alloc_reg();
                self.emit(IrInstruction::StorageRead {
                    dst,
                    address: *address,
                    storage_ptr: *storage_ptr,
                });
                Ok(vec![dst])
            }
            ("storage_write", [address, value], [storage_ptr]) => {
                self.emit(IrInstruction::StorageWrite {
                    address: *address,
                    value: *value,
                    storage_ptr: *storage_ptr,
                });
                Ok(Vec::new())
            }
            (name, _, _) => Err(Error::codegen(format!(
                "No VM implementation for extern '{}'.",
                name
            ))),
        }
    }

    fn alloc_reg(&mut self) -> IrReg {
        let reg = IrReg::new(self.next_reg);
        self.next_reg += 1;
        reg
    }

    fn emit(&mut self, instr: IrInstruction) {
        self.instructions.push(instr);
    }
}
