use super::ast::{
    BinaryOp, BuiltinsDirective, Decorator, Directive, ExprKind, Expression, Function,
    ImplicitArgs, Import, Item, Location, Module, Param, Statement, StructDef, TypeExpr,
};
use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::lexer::{Token, TokenKind};

/// S-expression parser for contract sources
pub struct SExprParser {
    tokens: Vec<Token>,
    current: usize,
    file: String,
}

impl SExprParser {
    /// Creates a new S-expression parser; locations refer to `<input>`
    pub fn new(tokens: Vec<Token>) -> Self {
        SExprParser {
            tokens,
            current: 0,
            file: "<input>".to_string(),
        }
    }

    /// Sets the file name recorded in locations
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Parses the tokens into a module named `name`
    pub fn parse(&mut self, name: &str) -> Result<Module> {
        let mut module = Module {
            name: name.to_string(),
            file: self.file.clone(),
            lang: None,
            builtins: None,
            items: Vec::new(),
        };

        while !self.is_at_end() {
            self.parse_top_level(&mut module)?;
        }

        Ok(module)
    }

    fn parse_top_level(&mut self, module: &mut Module) -> Result<()> {
        let decorators = self.parse_decorators()?;
        let location = self.location();
        self.consume(TokenKind::LeftParen, "`(` to start a top-level form")?;
        let head = self.expect_identifier("top-level form name")?;

        if !decorators.is_empty() && head != "func" && head != "extern" {
            return Err(Error::preprocessor(
                "Decorators are only allowed on functions.",
                &decorators[0].location,
            ));
        }

        match head.as_str() {
            "lang" => {
                let value = self.expect_identifier("language name")?;
                if module.lang.is_some() {
                    return Err(Error::preprocessor(
                        "Found two (lang ...) directives.",
                        &location,
                    ));
                }
                module.lang = Some(Directive { value, location });
                self.consume(TokenKind::RightParen, "`)`")?;
            }
            "builtins" => {
                let mut names = Vec::new();
                while !self.check(&TokenKind::RightParen) {
                    names.push(self.expect_identifier("builtin name")?);
                }
                self.consume(TokenKind::RightParen, "`)`")?;
                if module.builtins.is_some() {
                    return Err(Error::preprocessor(
                        "Redefinition of builtins directive.",
                        &location,
                    ));
                }
                module.builtins = Some(BuiltinsDirective { names, location });
            }
            "import" => {
                let module_name = self.expect_identifier("module name")?;
                let mut names = Vec::new();
                while !self.check(&TokenKind::RightParen) {
                    names.push(self.expect_identifier("imported name")?);
                }
                self.consume(TokenKind::RightParen, "`)`")?;
                module.items.push(Item::Import(Import {
                    module: module_name,
                    names,
                    location,
                }));
            }
            "struct" => {
                let name_location = self.location();
                let name = self.expect_identifier("struct name")?;
                let mut members = Vec::new();
                while !self.check(&TokenKind::RightParen) {
                    members.push(self.parse_param()?);
                }
                self.consume(TokenKind::RightParen, "`)`")?;
                module.items.push(Item::Struct(StructDef {
                    name,
                    members,
                    location: name_location,
                }));
            }
            "func" | "extern" => {
                let func = self.parse_function(decorators, head == "extern")?;
                module.items.push(Item::Function(func));
            }
            other => {
                return Err(Error::SyntaxError {
                    line: location.line,
                    col: location.col,
                    message: format!(
                        "Unknown top-level form `{}`.\n\n\
                         Help: Expected one of: lang, builtins, import, struct, func, extern",
                        other
                    ),
                });
            }
        }

        Ok(())
    }

    fn parse_decorators(&mut self) -> Result<Vec<Decorator>> {
        let mut decorators = Vec::new();
        while self.check(&TokenKind::At) {
            let location = self.location();
            self.advance();
            let name = self.expect_identifier("decorator name after `@`")?;
            decorators.push(Decorator { name, location });
        }
        Ok(decorators)
    }

    /// `name [(implicit ...)] (params) (returns) body...)` - the head is already consumed
    fn parse_function(&mut self, decorators: Vec<Decorator>, is_extern: bool) -> Result<Function> {
        let location = self.location();
        let name = self.expect_identifier("function name")?;

        let mut implicit_args = None;
        if self.check(&TokenKind::LeftParen) && self.peek_next_is_identifier("implicit") {
            let implicit_location = self.location();
            self.advance(); // (
            self.advance(); // implicit
            let mut names = Vec::new();
            while !self.check(&TokenKind::RightParen) {
                names.push(self.expect_identifier("implicit argument name")?);
            }
            self.consume(TokenKind::RightParen, "`)`")?;
            implicit_args = Some(ImplicitArgs {
                names,
                location: implicit_location,
            });
        }

        self.consume(TokenKind::LeftParen, "`(` to start the parameter list")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            params.push(self.parse_param()?);
        }
        self.consume(TokenKind::RightParen, "`)`")?;

        let returns_location = self.location();
        self.consume(TokenKind::LeftParen, "`(` to start the return list")?;
        let mut returns = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            returns.push(self.parse_type()?);
        }
        self.consume(TokenKind::RightParen, "`)`")?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            if self.is_at_end() {
                return Err(Error::SyntaxError {
                    line: location.line,
                    col: location.col,
                    message: format!("Unterminated function `{}`", name),
                });
            }
            body.push(self.parse_statement()?);
        }
        self.consume(TokenKind::RightParen, "`)` to close the function")?;

        if is_extern && !body.is_empty() {
            return Err(Error::preprocessor(
                "Extern functions must not have a body.",
                &location,
            ));
        }

        Ok(Function {
            name,
            decorators,
            implicit_args,
            params,
            returns,
            returns_location,
            body,
            is_extern,
            location,
        })
    }

    /// `(name type)`
    fn parse_param(&mut self) -> Result<Param> {
        let location = self.location();
        self.consume(TokenKind::LeftParen, "`(` to start `(name type)`")?;
        let name = self.expect_identifier("parameter name")?;
        let ty = self.parse_type()?;
        self.consume(TokenKind::RightParen, "`)`")?;
        Ok(Param { name, ty, location })
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            let head = self.expect_identifier("`tuple`")?;
            if head != "tuple" {
                return Err(self.syntax_error(format!(
                    "Unknown type constructor `{}`; only `tuple` is supported",
                    head
                )));
            }
            let mut members = Vec::new();
            while !self.check(&TokenKind::RightParen) {
                members.push(self.parse_type()?);
            }
            self.consume(TokenKind::RightParen, "`)`")?;
            return Ok(TypeExpr::Tuple(members));
        }

        let text = self.expect_identifier("type")?;
        let base = text.trim_end_matches('*');
        let mut ty = match base {
            "felt" => TypeExpr::Felt,
            other => TypeExpr::Struct(other.to_string()),
        };
        for _ in 0..(text.len() - base.len()) {
            ty = TypeExpr::Pointer(Box::new(ty));
        }
        Ok(ty)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let location = self.location();
        if !self.check(&TokenKind::LeftParen) {
            return Err(self.expected_error("`(` to start a statement"));
        }

        let head = match &self.peek_at(1).kind {
            TokenKind::Identifier(name) => Some(name.clone()),
            _ => None,
        };

        match head.as_deref() {
            Some("let") => {
                self.advance();
                self.advance();
                let mut names = Vec::new();
                if self.check(&TokenKind::LeftParen) {
                    self.advance();
                    while !self.check(&TokenKind::RightParen) {
                        names.push(self.expect_identifier("bound name")?);
                    }
                    self.consume(TokenKind::RightParen, "`)`")?;
                } else {
                    names.push(self.expect_identifier("bound name")?);
                }
                let value = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "`)`")?;
                Ok(Statement::Let {
                    names,
                    value,
                    location,
                })
            }
            Some("return") => {
                self.advance();
                self.advance();
                let mut values = Vec::new();
                while !self.check(&TokenKind::RightParen) {
                    values.push(self.parse_expression()?);
                }
                self.consume(TokenKind::RightParen, "`)`")?;
                Ok(Statement::Return { values, location })
            }
            Some("hint") => {
                self.advance();
                self.advance();
                let code = match &self.peek().kind {
                    TokenKind::String(code) => code.clone(),
                    _ => return Err(self.expected_error("hint code string")),
                };
                self.advance();
                self.consume(TokenKind::RightParen, "`)`")?;
                Ok(Statement::Hint { code, location })
            }
            Some("assert_eq") => {
                self.advance();
                self.advance();
                let lhs = self.parse_expression()?;
                let rhs = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "`)`")?;
                Ok(Statement::AssertEq { lhs, rhs, location })
            }
            _ => {
                let expr = self.parse_expression()?;
                if !matches!(expr.kind, ExprKind::Call { .. }) {
                    return Err(Error::SyntaxError {
                        line: location.line,
                        col: location.col,
                        message: "Only calls may be used as statements".to_string(),
                    });
                }
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        let location = self.location();
        match self.peek().kind.clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expression::constant(FieldElement::from(n), &location))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expression::ident(name, &location))
            }
            TokenKind::LeftParen => {
                self.advance();
                let op = match self.peek().kind {
                    TokenKind::Plus => Some(BinaryOp::Add),
                    TokenKind::Minus => Some(BinaryOp::Sub),
                    TokenKind::Star => Some(BinaryOp::Mul),
                    _ => None,
                };

                if let Some(op) = op {
                    self.advance();
                    let mut expr = self.parse_expression()?;
                    let mut operands = 1;
                    while !self.check(&TokenKind::RightParen) {
                        let rhs = self.parse_expression()?;
                        expr = Expression::new(
                            ExprKind::Binary {
                                op,
                                lhs: Box::new(expr),
                                rhs: Box::new(rhs),
                            },
                            location.clone(),
                        );
                        operands += 1;
                    }
                    if operands < 2 {
                        return Err(self.syntax_error("Arithmetic needs at least two operands"));
                    }
                    self.consume(TokenKind::RightParen, "`)`")?;
                    return Ok(expr);
                }

                let callee = self.expect_identifier("function name")?;
                let mut args = Vec::new();
                while !self.check(&TokenKind::RightParen) {
                    if self.is_at_end() {
                        return Err(self.expected_error("`)` to close the call"));
                    }
                    args.push(self.parse_expression()?);
                }
                self.consume(TokenKind::RightParen, "`)`")?;
                Ok(Expression::call(callee, args, &location))
            }
            _ => Err(self.expected_error("expression")),
        }
    }

    fn location(&self) -> Location {
        let token = self.peek();
        Location::new(self.file.clone(), token.line, token.column)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn peek_next_is_identifier(&self, expected: &str) -> bool {
        matches!(&self.peek_at(1).kind, TokenKind::Identifier(name) if name == expected)
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.expected_error(expected))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected_error(what)),
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> Error {
        let token = self.peek();
        Error::SyntaxError {
            line: token.line,
            col: token.column,
            message: message.into(),
        }
    }

    fn expected_error(&self, expected: &str) -> Error {
        let got = self.peek().kind.describe();
        self.syntax_error(format!("Expected {}, found {}", expected, got))
    }
}
