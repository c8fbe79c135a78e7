//! Recursive-descent parser producing [`Expr`] trees.
//!
//! Precedence, loosest first:
//! conditional `?:` → `||` → `&&` → equality → comparison → additive →
//! multiplicative → unary → postfix (member access, call) → primary.

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::error::CompileError;
use super::lexer::{Token, TokenKind, tokenize};
use super::value::Value;

/// Parses a complete expression; trailing tokens are a syntax error.
pub fn parse(source: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(source)?;
    if matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::Eof) | None) {
        return Err(CompileError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.conditional()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        _ => Err(parser.error("unexpected trailing input")),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.position).unwrap_or(0)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), CompileError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, message: &str) -> CompileError {
        CompileError::Syntax {
            position: self.position(),
            message: message.to_string(),
        }
    }

    fn conditional(&mut self) -> Result<Expr, CompileError> {
        let test = self.binary(2)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.conditional()?;
        self.expect(&TokenKind::Colon, "`:` in conditional expression")?;
        let alternate = self.conditional()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek() {
            TokenKind::OrOr => BinaryOp::Or,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::EqEqEq => BinaryOp::StrictEq,
            TokenKind::NotEqEq => BinaryOp::StrictNe,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing over left-associative binary operators.
    fn binary(&mut self, min_precedence: u8) -> Result<Expr, CompileError> {
        let mut left = self.unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_precedence {
                break;
            }
            self.advance();
            let right = self.binary(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    match self.advance() {
                        TokenKind::Ident(property) => {
                            expr = Expr::Member {
                                object: Box::new(expr),
                                property,
                            };
                        }
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return Err(self.error("expected property name after `.`"));
                        }
                    }
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket => {
                    return Err(CompileError::UnsupportedComputedAccess {
                        position: self.position(),
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.conditional()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen, "`)` after arguments")?;
            return Ok(args);
        }
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Str(s)))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" => Expr::Literal(Value::Null),
                    _ => Expr::Ident(name),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.conditional()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LBracket => Err(CompileError::UnsupportedComputedAccess {
                position: self.position(),
            }),
            TokenKind::Eof => Err(self.error("unexpected end of expression")),
            _ => Err(self.error("unexpected token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(source: &str) -> String {
        parse(source).unwrap().to_string()
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(canonical("1+2*3"), "1 + 2 * 3");
        assert_eq!(canonical("(1+2)*3"), "(1 + 2) * 3");
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(canonical("a - (b - c)"), "a - (b - c)");
        assert_eq!(canonical("(a - b) - c"), "a - b - c");
    }

    #[test]
    fn conditional_nests_to_the_right() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        match expr {
            Expr::Conditional { alternate, .. } => {
                assert!(matches!(*alternate, Expr::Conditional { .. }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn member_chain_and_call() {
        let expr = parse("Math.max(abi.str, 3)").unwrap();
        match &expr {
            Expr::Call { callee, args } => {
                assert_eq!(callee.dotted_path().as_deref(), Some("Math.max"));
                assert_eq!(args[0].dotted_path().as_deref(), Some("abi.str"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(expr.to_string(), "Math.max(abi.str, 3)");
    }

    #[test]
    fn bracket_access_is_rejected() {
        assert!(matches!(
            parse("self['hp']"),
            Err(CompileError::UnsupportedComputedAccess { .. })
        ));
    }

    #[test]
    fn empty_and_trailing_input_fail() {
        assert_eq!(parse("   "), Err(CompileError::Empty));
        assert!(matches!(parse("1 2"), Err(CompileError::Syntax { .. })));
        assert!(matches!(parse("(1"), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn keywords_become_literals() {
        assert_eq!(parse("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(parse("null").unwrap(), Expr::Literal(Value::Null));
    }
}
