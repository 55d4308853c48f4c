//! Trigger script language: lexer, parser and value model
//!
//! Scripts are parsed once into an immutable [`Script`] tree and can then be
//! activated any number of times, concurrently.
//!
//! # Example script
//!
//! ```text
//! IF %health% < 5 {
//!     #MESSAGE("low health: " + %health%)
//!     #COOLDOWN(10)
//! }
//! FOR i = 0 : 3 {
//!     global.counter = global.counter + i
//! }
//! ```

mod ast;
mod lexer;
mod parser;
mod types;

pub use ast::*;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use types::{HostHandle, HostObject, StoredValue, Value, Variables};

/// Parse trigger script source into its syntax tree
pub fn parse_script(source: &str) -> Result<Script, SyntaxError> {
    let lexer = Lexer::new(source);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Error raised while tokenizing or parsing a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at {}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for SyntaxError {}
