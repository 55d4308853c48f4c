//! Trigger script lexer (tokenizer)

use crate::script::SyntaxError;

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    String(String),
    True,
    False,
    Null,

    // Identifiers and keywords
    Ident(String),
    /// `#NAME`, name upper-cased
    Command(String),
    If,
    Else,
    For,
    While,
    Break,
    Continue,
    Return,
    Global,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    Assign,
    Question,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,

    // Special
    Eof,
}

/// Token with position information
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }
}

/// Lexer for trigger scripts
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get next token
    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;

        let Some((_, ch)) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, line, column));
        };

        let kind = match ch {
            // Single character tokens
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '~' => TokenKind::BitNot,
            '^' => TokenKind::BitXor,

            // Multi-character tokens
            '=' => {
                if self.match_char('=') {
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::Le
                } else if self.match_char('<') {
                    TokenKind::Shl
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::Ge
                } else if self.match_char('>') {
                    TokenKind::Shr
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::And
                } else {
                    TokenKind::BitAnd
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::Or
                } else {
                    TokenKind::BitOr
                }
            }

            '#' => self.command(line, column)?,

            // Strings
            '"' => self.string(line, column)?,

            // Numbers
            '0'..='9' => self.number(ch, line, column)?,

            // Identifiers and keywords
            _ if ch.is_alphabetic() || ch == '_' => self.identifier(ch),

            _ => {
                return Err(SyntaxError::new(
                    format!("Unexpected character: '{}'", ch),
                    line,
                    column,
                ));
            }
        };

        Ok(Token::new(kind, line, column))
    }

    /// Tokenize the whole source, including the trailing `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, ch)) = result {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('/') => {
                    let mut temp = self.chars.clone();
                    temp.next();
                    match temp.peek() {
                        Some((_, '/')) => {
                            self.advance();
                            self.advance();
                            while let Some(ch) = self.peek_char() {
                                if ch == '\n' {
                                    break;
                                }
                                self.advance();
                            }
                        }
                        Some((_, '*')) => {
                            self.advance();
                            self.advance();
                            loop {
                                match self.advance() {
                                    Some((_, '*')) => {
                                        if self.match_char('/') {
                                            break;
                                        }
                                    }
                                    None => break,
                                    _ => {}
                                }
                            }
                        }
                        _ => break,
                    }
                }
                _ => break,
            }
        }
    }

    fn command(&mut self, line: usize, column: usize) -> Result<TokenKind, SyntaxError> {
        let mut name = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if name.is_empty() {
            return Err(SyntaxError::new("Expected command name after '#'", line, column));
        }

        Ok(TokenKind::Command(name.to_uppercase()))
    }

    fn string(&mut self, start_line: usize, start_col: usize) -> Result<TokenKind, SyntaxError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, '"')) => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, ch)) => {
                        return Err(SyntaxError::new(
                            format!("Invalid escape sequence: \\{}", ch),
                            self.line,
                            self.column,
                        ));
                    }
                    None => {
                        return Err(SyntaxError::new("Unterminated string", start_line, start_col));
                    }
                },
                Some((_, ch)) => value.push(ch),
                None => {
                    return Err(SyntaxError::new("Unterminated string", start_line, start_col));
                }
            }
        }

        Ok(TokenKind::String(value))
    }

    fn number(&mut self, first: char, line: usize, column: usize) -> Result<TokenKind, SyntaxError> {
        if first == '0' && matches!(self.peek_char(), Some('x') | Some('X')) {
            self.advance();
            return self.hex_number(line, column);
        }

        let mut value = String::from(first);
        let mut is_float = false;

        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '.' && !is_float {
                // Only a fraction when a digit follows the dot
                let mut temp = self.chars.clone();
                temp.next();
                match temp.peek() {
                    Some((_, next)) if next.is_ascii_digit() => {
                        is_float = true;
                        value.push('.');
                        self.advance();
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }

        if is_float {
            let f: f64 = value
                .parse()
                .map_err(|_| SyntaxError::new(format!("Invalid float: {}", value), line, column))?;
            Ok(TokenKind::Float(f))
        } else {
            let i: i64 = value
                .parse()
                .map_err(|_| SyntaxError::new(format!("Invalid integer: {}", value), line, column))?;
            Ok(TokenKind::Int(i))
        }
    }

    fn hex_number(&mut self, line: usize, column: usize) -> Result<TokenKind, SyntaxError> {
        let mut value = String::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_hexdigit() {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if value.is_empty() {
            return Err(SyntaxError::new("Expected hex digits after 0x", line, column));
        }

        let i = i64::from_str_radix(&value, 16).map_err(|_| {
            SyntaxError::new(format!("Invalid hex number: 0x{}", value), line, column)
        })?;

        Ok(TokenKind::Int(i))
    }

    fn identifier(&mut self, first: char) -> TokenKind {
        let mut value = String::from(first);

        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Keywords are case-insensitive
        match value.to_ascii_uppercase().as_str() {
            "IF" => TokenKind::If,
            "ELSE" => TokenKind::Else,
            "FOR" => TokenKind::For,
            "WHILE" => TokenKind::While,
            "BREAK" => TokenKind::Break,
            "CONTINUE" => TokenKind::Continue,
            "RETURN" => TokenKind::Return,
            "GLOBAL" => TokenKind::Global,
            "TRUE" => TokenKind::True,
            "FALSE" => TokenKind::False,
            "NULL" => TokenKind::Null,
            _ => TokenKind::Ident(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("( ) { } , ;"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("42 3.14 0xFF 7.");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Int(42));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Float(3.14));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Int(255));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Int(7));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Dot);
    }

    #[test]
    fn test_strings() {
        let mut lexer = Lexer::new(r#""hello" "world\n""#);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::String("hello".to_string()));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::String("world\n".to_string()));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("IF else For while BREAK continue Return global"),
            vec![
                TokenKind::If,
                TokenKind::Else,
                TokenKind::For,
                TokenKind::While,
                TokenKind::Break,
                TokenKind::Continue,
                TokenKind::Return,
                TokenKind::Global,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_command_token() {
        assert_eq!(
            kinds("#message(\"hi\")"),
            vec![
                TokenKind::Command("MESSAGE".to_string()),
                TokenKind::LParen,
                TokenKind::String("hi".to_string()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != && || < > %"),
            vec![
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Percent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("42 // comment\n43 /* block */ 44"),
            vec![TokenKind::Int(42), TokenKind::Int(43), TokenKind::Int(44), TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("x = 1\n  #STOP").tokenize().unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (1, 5));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
    }

    #[test]
    fn test_errors() {
        let err = Lexer::new("x = \"open").tokenize().unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));

        let err = Lexer::new("  @").tokenize().unwrap_err();
        assert!(err.message.contains("Unexpected character"));

        assert!(Lexer::new("# ").tokenize().is_err());
    }
}
