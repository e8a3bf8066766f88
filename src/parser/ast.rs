use crate::field::FieldElement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position of an AST node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File (or autogen pseudo-file) the node comes from
    pub file: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub col: usize,
}

impl Location {
    /// Creates a location
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Location {
            file: file.into(),
            line,
            col,
        }
    }

    /// Location for compiler-generated code living in a pseudo-file
    pub fn synthetic(file: impl Into<String>) -> Self {
        Location::new(file, 1, 1)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// A whole compilation unit: the main module plus every collected dependency
///
/// Dependencies come first; the main module is always last.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// Modules in dependency order
    pub modules: Vec<Module>,
}

impl Program {
    /// The module the user asked to compile
    pub fn main_module(&self) -> Option<&Module> {
        self.modules.last()
    }

    /// All top-level items of all modules
    pub fn items(&self) -> impl Iterator<Item = (&Module, &Item)> {
        self.modules
            .iter()
            .flat_map(|module| module.items.iter().map(move |item| (module, item)))
    }

    /// Every function (including namespace members) with its fully qualified name
    pub fn functions(&self) -> Vec<(String, &Function)> {
        let mut out = Vec::new();
        for (_, item) in self.items() {
            match item {
                Item::Function(func) => out.push((func.name.clone(), func)),
                Item::Namespace(ns) => {
                    for func in &ns.functions {
                        out.push((format!("{}.{}", ns.name, func.name), func));
                    }
                }
                Item::Struct(_) | Item::Import(_) => {}
            }
        }
        out
    }
}

/// One parsed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Dotted module name (`__main__` for the compiled file)
    pub name: String,
    /// File name used in locations
    pub file: String,
    /// `(lang X)` directive
    pub lang: Option<Directive>,
    /// `(builtins a b ...)` directive
    pub builtins: Option<BuiltinsDirective>,
    /// Top-level items in source order
    pub items: Vec<Item>,
}

/// `(lang X)` directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    /// Directive argument
    pub value: String,
    /// Directive location
    pub location: Location,
}

/// `(builtins ...)` directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinsDirective {
    /// Builtin names in order
    pub names: Vec<String>,
    /// Directive location
    pub location: Location,
}

/// Top-level items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    /// Function (or extern, or `@storage_var` declaration before lowering)
    Function(Function),
    /// Struct definition
    Struct(StructDef),
    /// Namespace of functions (generated for storage variables)
    Namespace(Namespace),
    /// `(import module name ...)`
    Import(Import),
}

impl Item {
    /// Name the item binds at top level, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            Item::Function(f) => Some(&f.name),
            Item::Struct(s) => Some(&s.name),
            Item::Namespace(n) => Some(&n.name),
            Item::Import(_) => None,
        }
    }

    /// Location of the item
    pub fn location(&self) -> &Location {
        match self {
            Item::Function(f) => &f.location,
            Item::Struct(s) => &s.location,
            Item::Namespace(n) => &n.location,
            Item::Import(i) => &i.location,
        }
    }
}

/// Decorator such as `@external`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decorator {
    /// Decorator name without `@`
    pub name: String,
    /// Location of the `@`
    pub location: Location,
}

/// `(implicit a b)` argument list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicitArgs {
    /// Implicit argument names
    pub names: Vec<String>,
    /// Location of the list
    pub location: Location,
}

/// Function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name (unqualified)
    pub name: String,
    /// Decorators in source order
    pub decorators: Vec<Decorator>,
    /// Implicit arguments threaded through calls
    pub implicit_args: Option<ImplicitArgs>,
    /// Explicit parameters
    pub params: Vec<Param>,
    /// Return types
    pub returns: Vec<TypeExpr>,
    /// Location of the return list
    pub returns_location: Location,
    /// Body statements
    pub body: Vec<Statement>,
    /// Declared with `extern`: implemented by the VM
    pub is_extern: bool,
    /// Location of the function name
    pub location: Location,
}

impl Function {
    /// Returns the decorator with the given name
    pub fn decorator(&self, name: &str) -> Option<&Decorator> {
        self.decorators.iter().find(|d| d.name == name)
    }

    /// Implicit argument names (empty when none are declared)
    pub fn implicit_names(&self) -> &[String] {
        self.implicit_args
            .as_ref()
            .map(|args| args.names.as_slice())
            .unwrap_or(&[])
    }
}

/// Typed parameter `(name type)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeExpr,
    /// Location of the parameter
    pub location: Location,
}

/// Type expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// A single field element
    Felt,
    /// Pointer to another type (`felt*`)
    Pointer(Box<TypeExpr>),
    /// Named struct
    Struct(String),
    /// `(tuple T ...)`
    Tuple(Vec<TypeExpr>),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Felt => write!(f, "felt"),
            TypeExpr::Pointer(inner) => write!(f, "{}*", inner),
            TypeExpr::Struct(name) => write!(f, "{}", name),
            TypeExpr::Tuple(members) => {
                write!(f, "(tuple")?;
                for member in members {
                    write!(f, " {}", member)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Struct definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    /// Struct name
    pub name: String,
    /// Members in declaration order
    pub members: Vec<Param>,
    /// Location of the struct name
    pub location: Location,
}

/// Namespace grouping functions under a common prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace name
    pub name: String,
    /// Member functions
    pub functions: Vec<Function>,
    /// True when the namespace was generated by the compiler
    pub autogen: bool,
    /// Location
    pub location: Location,
}

/// `(import module a b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Dotted module name
    pub module: String,
    /// Imported names
    pub names: Vec<String>,
    /// Location
    pub location: Location,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `(let x expr)` or `(let (a b) call)`
    Let {
        /// Bound names
        names: Vec<String>,
        /// Bound value
        value: Expression,
        /// Location
        location: Location,
    },

    /// `(return e ...)`
    Return {
        /// Returned values
        values: Vec<Expression>,
        /// Location
        location: Location,
    },

    /// `(hint "code")`
    Hint {
        /// Hint source code
        code: String,
        /// Location
        location: Location,
    },

    /// `(assert_eq a b)`
    AssertEq {
        /// Left side
        lhs: Expression,
        /// Right side
        rhs: Expression,
        /// Location
        location: Location,
    },

    /// Expression statement (a call)
    Expression(Expression),
}

/// Expression with its location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Expression kind
    pub kind: ExprKind,
    /// Location
    pub location: Location,
}

impl Expression {
    /// Creates an expression node
    pub fn new(kind: ExprKind, location: Location) -> Self {
        Expression { kind, location }
    }

    /// Constant expression
    pub fn constant(value: FieldElement, location: &Location) -> Self {
        Expression::new(ExprKind::Const(value), location.clone())
    }

    /// Identifier reference
    pub fn ident(name: impl Into<String>, location: &Location) -> Self {
        Expression::new(ExprKind::Identifier(name.into()), location.clone())
    }

    /// Function call
    pub fn call(callee: impl Into<String>, args: Vec<Expression>, location: &Location) -> Self {
        Expression::new(
            ExprKind::Call {
                callee: callee.into(),
                args,
            },
            location.clone(),
        )
    }
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Field constant
    Const(FieldElement),
    /// Reference to a local or parameter
    Identifier(String),
    /// Binary arithmetic
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expression>,
        /// Right operand
        rhs: Box<Expression>,
    },
    /// Function call (callee may be dotted: `balance.read`)
    Call {
        /// Callee name
        callee: String,
        /// Arguments
        args: Vec<Expression>,
    },
}

/// Binary operators over field elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
}
