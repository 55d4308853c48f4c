//! Trigger script parser - converts tokens into AST

use crate::script::ast::*;
use crate::script::lexer::{Lexer, Token, TokenKind};
use crate::script::SyntaxError;

/// Deepest expression or block nesting accepted
pub const MAX_NESTING: usize = 64;

/// Trigger script parser
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// Number of enclosing loops, BREAK/CONTINUE are only legal inside one
    loop_depth: usize,
    /// Current nesting of blocks, groups, unary chains and operator chains
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self, SyntaxError> {
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            loop_depth: 0,
            depth: 0,
        })
    }

    /// Parse the complete script
    pub fn parse(&mut self) -> Result<Script, SyntaxError> {
        let mut statements = Vec::new();

        loop {
            self.skip_separators()?;
            if self.is_at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Script { statements })
    }

    /// Parse a block: { statements... }
    fn parse_block(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        self.descend()?;
        self.expect(TokenKind::LBrace)?;

        let mut statements = Vec::new();

        loop {
            self.skip_separators()?;
            if self.current.kind == TokenKind::RBrace || self.is_at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
        }

        self.expect(TokenKind::RBrace)?;
        self.depth -= 1;

        Ok(statements)
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    /// Parse a statement
    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        let span = self.span();

        let kind = match &self.current.kind {
            TokenKind::LBrace => StatementKind::Block(self.parse_block()?),
            TokenKind::If => return self.parse_if(),
            TokenKind::While => {
                self.advance()?;
                let condition = self.parse_expression()?;
                let body = self.parse_loop_body()?;
                StatementKind::While { condition, body }
            }
            TokenKind::For => {
                self.advance()?;
                let variable = match &self.current.kind {
                    TokenKind::Ident(name) => name.clone(),
                    _ => return Err(self.error("Expected loop variable name")),
                };
                self.advance()?;
                self.expect(TokenKind::Assign)?;
                let start = self.parse_expression()?;
                self.expect(TokenKind::Colon)?;
                let end = self.parse_expression()?;
                let body = self.parse_loop_body()?;
                StatementKind::For {
                    variable,
                    start,
                    end,
                    body,
                }
            }
            TokenKind::Break => {
                if self.loop_depth == 0 {
                    return Err(self.error("BREAK outside of a loop"));
                }
                self.advance()?;
                StatementKind::Break
            }
            TokenKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.error("CONTINUE outside of a loop"));
                }
                self.advance()?;
                StatementKind::Continue
            }
            TokenKind::Return => {
                self.advance()?;
                StatementKind::Return
            }
            TokenKind::Command(name) => {
                let name = name.clone();
                self.advance()?;
                let args = if self.current.kind == TokenKind::LParen {
                    self.parse_arguments()?
                } else {
                    Vec::new()
                };
                StatementKind::Command { name, args }
            }
            _ => {
                // Could be assignment or expression statement
                let expr = self.parse_expression()?;

                if self.current.kind == TokenKind::Assign {
                    let target = match expr.kind {
                        ExpressionKind::Variable(name) => AssignTarget::Local(name),
                        ExpressionKind::Global(name) => AssignTarget::Global(name),
                        ExpressionKind::GlobalIndex(key) => AssignTarget::GlobalIndex(*key),
                        _ => return Err(self.error("Invalid assignment target")),
                    };
                    self.advance()?;
                    let value = self.parse_expression()?;
                    StatementKind::Assignment { target, value }
                } else {
                    StatementKind::Expression(expr)
                }
            }
        };

        Ok(Statement { kind, span })
    }

    /// Parse if / else if / else
    fn parse_if(&mut self) -> Result<Statement, SyntaxError> {
        let span = self.span();
        self.expect(TokenKind::If)?;

        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.current.kind == TokenKind::Else {
            self.advance()?;
            if self.current.kind == TokenKind::If {
                self.descend()?;
                let nested = self.parse_if()?;
                self.depth -= 1;
                Some(vec![nested])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Statement {
            kind: StatementKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        })
    }

    /// Parse `( expr, expr, ... )`
    fn parse_arguments(&mut self) -> Result<Vec<Expression>, SyntaxError> {
        self.expect(TokenKind::LParen)?;

        let mut args = Vec::new();
        while self.current.kind != TokenKind::RParen {
            args.push(self.parse_expression()?);
            if self.current.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }

        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    /// Parse an expression
    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        self.descend()?;
        let expr = self.parse_ternary()?;
        self.depth -= 1;
        Ok(expr)
    }

    /// Parse ternary: expr ? expr : expr
    fn parse_ternary(&mut self) -> Result<Expression, SyntaxError> {
        let mut expr = self.parse_or()?;

        if self.current.kind == TokenKind::Question {
            self.advance()?;
            let then_expr = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            let else_expr = self.parse_expression()?;
            let span = expr.span;
            expr = Expression {
                kind: ExpressionKind::Ternary {
                    condition: Box::new(expr),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                span,
            };
        }

        Ok(expr)
    }

    /// Parse logical OR: expr || expr
    fn parse_or(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_and()?;
        let base = self.depth;

        while self.current.kind == TokenKind::Or {
            self.advance()?;
            self.descend()?;
            let right = self.parse_and()?;
            left = binary(left, BinaryOp::Or, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse logical AND: expr && expr
    fn parse_and(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_bitwise_or()?;
        let base = self.depth;

        while self.current.kind == TokenKind::And {
            self.advance()?;
            self.descend()?;
            let right = self.parse_bitwise_or()?;
            left = binary(left, BinaryOp::And, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse bitwise OR
    fn parse_bitwise_or(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_bitwise_xor()?;
        let base = self.depth;

        while self.current.kind == TokenKind::BitOr {
            self.advance()?;
            self.descend()?;
            let right = self.parse_bitwise_xor()?;
            left = binary(left, BinaryOp::BitOr, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse bitwise XOR
    fn parse_bitwise_xor(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_bitwise_and()?;
        let base = self.depth;

        while self.current.kind == TokenKind::BitXor {
            self.advance()?;
            self.descend()?;
            let right = self.parse_bitwise_and()?;
            left = binary(left, BinaryOp::BitXor, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse bitwise AND
    fn parse_bitwise_and(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_equality()?;
        let base = self.depth;

        while self.current.kind == TokenKind::BitAnd {
            self.advance()?;
            self.descend()?;
            let right = self.parse_equality()?;
            left = binary(left, BinaryOp::BitAnd, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse equality: expr == expr, expr != expr
    fn parse_equality(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_comparison()?;
        let base = self.depth;

        loop {
            let op = match self.current.kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            self.advance()?;
            self.descend()?;
            let right = self.parse_comparison()?;
            left = binary(left, op, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse comparison: <, <=, >, >=
    fn parse_comparison(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_shift()?;
        let base = self.depth;

        loop {
            let op = match self.current.kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance()?;
            self.descend()?;
            let right = self.parse_shift()?;
            left = binary(left, op, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse shift: <<, >>
    fn parse_shift(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_additive()?;
        let base = self.depth;

        loop {
            let op = match self.current.kind {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            self.advance()?;
            self.descend()?;
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse additive: +, -
    fn parse_additive(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        let base = self.depth;

        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse multiplicative: *, /, %
    fn parse_multiplicative(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_unary()?;
        let base = self.depth;

        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance()?;
            self.descend()?;
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parse unary: !, -, ~
    fn parse_unary(&mut self) -> Result<Expression, SyntaxError> {
        let span = self.span();
        let op = match self.current.kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::BitNot => UnaryOp::BitNot,
            _ => return self.parse_primary(),
        };
        self.advance()?;
        self.descend()?;
        let expr = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expression {
            kind: ExpressionKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        })
    }

    /// Parse primary expression
    fn parse_primary(&mut self) -> Result<Expression, SyntaxError> {
        let span = self.span();

        let kind = match &self.current.kind {
            TokenKind::Int(i) => {
                let val = *i;
                self.advance()?;
                ExpressionKind::Literal(Literal::Int(val))
            }
            TokenKind::Float(f) => {
                let val = *f;
                self.advance()?;
                ExpressionKind::Literal(Literal::Float(val))
            }
            TokenKind::String(s) => {
                let val = s.clone();
                self.advance()?;
                ExpressionKind::Literal(Literal::String(val))
            }
            TokenKind::True => {
                self.advance()?;
                ExpressionKind::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance()?;
                ExpressionKind::Literal(Literal::Bool(false))
            }
            TokenKind::Null => {
                self.advance()?;
                ExpressionKind::Literal(Literal::Null)
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                ExpressionKind::Variable(name)
            }
            TokenKind::Global => {
                self.advance()?;
                match &self.current.kind {
                    TokenKind::Dot => {
                        self.advance()?;
                        let name = match &self.current.kind {
                            TokenKind::Ident(name) => name.clone(),
                            _ => return Err(self.error("Expected global variable name")),
                        };
                        self.advance()?;
                        ExpressionKind::Global(name)
                    }
                    TokenKind::LBracket => {
                        self.advance()?;
                        let key = self.parse_expression()?;
                        self.expect(TokenKind::RBracket)?;
                        ExpressionKind::GlobalIndex(Box::new(key))
                    }
                    _ => return Err(self.error("Expected '.' or '[' after GLOBAL")),
                }
            }
            TokenKind::Percent => return self.parse_placeholder(),
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            _ => {
                return Err(self.error(format!(
                    "Unexpected token in expression: {:?}",
                    self.current.kind
                )));
            }
        };

        Ok(Expression { kind, span })
    }

    /// Parse placeholder: %name% or %name:arg:arg%
    ///
    /// Arguments are unary-level operands so the closing `%` is never read
    /// as a modulo operator.
    fn parse_placeholder(&mut self) -> Result<Expression, SyntaxError> {
        let span = self.span();
        self.expect(TokenKind::Percent)?;

        let name = match &self.current.kind {
            TokenKind::Ident(name) => name.clone(),
            _ => return Err(self.error("Expected placeholder name after '%'")),
        };
        self.advance()?;

        let mut args = Vec::new();
        while self.current.kind == TokenKind::Colon {
            self.advance()?;
            args.push(self.parse_unary()?);
        }

        if self.current.kind != TokenKind::Percent {
            return Err(self.error(format!("Unterminated placeholder '%{}'", name)));
        }
        self.advance()?;

        Ok(Expression {
            kind: ExpressionKind::Placeholder { name, args },
            span,
        })
    }

    // Helper methods

    fn advance(&mut self) -> Result<(), SyntaxError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn descend(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!(
                "Script nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn skip_separators(&mut self) -> Result<(), SyntaxError> {
        while self.current.kind == TokenKind::Semicolon {
            self.advance()?;
        }
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), SyntaxError> {
        if std::mem::discriminant(&self.current.kind) == std::mem::discriminant(&kind) {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?}", kind, self.current.kind)))
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn span(&self) -> Span {
        Span::new(self.current.line, self.current.column)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current.line, self.current.column)
    }
}

fn binary(left: Expression, op: BinaryOp, right: Expression) -> Expression {
    let span = left.span;
    Expression {
        kind: ExpressionKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    }
}
