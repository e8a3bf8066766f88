//! Contract source parser
//!
//! Parses LISP-style S-expressions into the module AST consumed by the pass pipeline.

mod ast;
mod sexpr_parser;

pub use ast::{
    BinaryOp, BuiltinsDirective, Decorator, Directive, ExprKind, Expression, Function,
    ImplicitArgs, Import, Item, Location, Module, Namespace, Param, Program, Statement,
    StructDef, TypeExpr,
};
pub use sexpr_parser::SExprParser;

use crate::error::Result;
use crate::lexer::SExprScanner;

/// Scan and parse `source` into a module called `name`, recording `file` in locations
pub fn parse_module(name: &str, file: &str, source: &str) -> Result<Module> {
    let mut scanner = SExprScanner::new(source);
    let tokens = scanner.scan_tokens()?;
    SExprParser::new(tokens).with_file(file).parse(name)
}
