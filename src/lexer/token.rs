use serde::{Deserialize, Serialize};

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// All possible token types of the contract language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer literal (reduced into the field later)
    Integer(i128),
    /// String literal (hint bodies)
    String(String),

    /// Identifier, possibly dotted (`balance.read`) or a pointer type (`felt*`)
    Identifier(String),

    /// Decorator marker (@)
    At,

    // Operators
    /// Plus operator (+)
    Plus,
    /// Minus operator (-)
    Minus,
    /// Star operator (*)
    Star,

    // Delimiters
    /// Left parenthesis
    LeftParen,
    /// Right parenthesis
    RightParen,

    /// End of file
    Eof,
}

impl TokenKind {
    /// Short human readable name used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Integer(_) => "integer".to_string(),
            TokenKind::String(_) => "string".to_string(),
            TokenKind::Identifier(name) => format!("identifier `{}`", name),
            TokenKind::At => "`@`".to_string(),
            TokenKind::Plus => "`+`".to_string(),
            TokenKind::Minus => "`-`".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::LeftParen => "`(`".to_string(),
            TokenKind::RightParen => "`)`".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}
