//! Recursive-descent parser for the snippet language.
//!
//! Conditions parse to a single expression; action programs parse to a list
//! of statements. Regex patterns for the `matches()` builtin are compiled
//! here so a bad pattern is a build error, not a runtime one.

use regex::Regex;

use crate::error::BuildError;
use crate::value::Value;

use super::token::{lex, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// Arithmetic applied by a compound assignment (`+=` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Literal(Value),
    Key(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Matches {
        key: String,
        pattern: Regex,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Assign {
        key: String,
        op: AssignOp,
        value: Expr,
    },
    Push {
        key: String,
        value: Expr,
    },
}

pub(crate) fn parse_expression(src: &str) -> Result<Expr, BuildError> {
    let mut parser = Parser::new(src)?;
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses zero or more `;`-separated statements. Whitespace-only source is a
/// valid empty program.
pub(crate) fn parse_program(src: &str) -> Result<Vec<Stmt>, BuildError> {
    let mut parser = Parser::new(src)?;
    let mut stmts = Vec::new();
    loop {
        while parser.eat(&Token::Semi) {}
        if parser.at_end() {
            break;
        }
        stmts.push(parser.statement()?);
        if !parser.at_end() && !parser.eat(&Token::Semi) {
            return Err(parser.unexpected("expected ';' between statements"));
        }
    }
    Ok(stmts)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<(Token, usize)>,
    idx: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Result<Self, BuildError> {
        Ok(Self {
            src,
            tokens: lex(src)?,
            idx: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.idx).map(|(t, _)| t.clone());
        if token.is_some() {
            self.idx += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.idx >= self.tokens.len()
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.idx)
            .map_or(self.src.len(), |(_, pos)| *pos)
    }

    fn error(&self, reason: impl Into<String>) -> BuildError {
        BuildError::Compile {
            snippet: self.src.to_string(),
            position: self.position(),
            reason: reason.into(),
        }
    }

    fn unexpected(&self, reason: &str) -> BuildError {
        match self.peek() {
            Some(token) => self.error(format!("{reason}, found {token:?}")),
            None => self.error(format!("{reason}, found end of input")),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), BuildError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_end(&self) -> Result<(), BuildError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("expected end of expression"))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, BuildError> {
        match self.peek() {
            Some(Token::Ident(_)) => {
                let Some(Token::Ident(name)) = self.advance() else {
                    unreachable!("peeked an identifier");
                };
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    // expression := and_expr ("||" and_expr)*
    fn expression(&mut self) -> Result<Expr, BuildError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // and_expr := equality ("&&" equality)*
    fn and_expr(&mut self) -> Result<Expr, BuildError> {
        let mut lhs = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // equality := comparison (("==" | "!=") comparison)*
    fn equality(&mut self) -> Result<Expr, BuildError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = if self.eat(&Token::EqEq) {
                BinaryOp::Eq
            } else if self.eat(&Token::NotEq) {
                BinaryOp::Ne
            } else {
                return Ok(lhs);
            };
            let rhs = self.comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // comparison := term (("<" | "<=" | ">" | ">=") term)*
    fn comparison(&mut self) -> Result<Expr, BuildError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(&Token::Lt) {
                BinaryOp::Lt
            } else if self.eat(&Token::Le) {
                BinaryOp::Le
            } else if self.eat(&Token::Gt) {
                BinaryOp::Gt
            } else if self.eat(&Token::Ge) {
                BinaryOp::Ge
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // term := factor (("+" | "-") factor)*
    fn term(&mut self) -> Result<Expr, BuildError> {
        let mut lhs = self.factor()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinaryOp::Add
            } else if self.eat(&Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // factor := unary (("*" | "/" | "%") unary)*
    fn factor(&mut self) -> Result<Expr, BuildError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Star) {
                BinaryOp::Mul
            } else if self.eat(&Token::Slash) {
                BinaryOp::Div
            } else if self.eat(&Token::Percent) {
                BinaryOp::Rem
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // unary := ("-" | "!") unary | primary
    fn unary(&mut self) -> Result<Expr, BuildError> {
        if self.eat(&Token::Minus) {
            Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(self.unary()?),
            })
        } else if self.eat(&Token::Bang) {
            Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.unary()?),
            })
        } else {
            self.primary()
        }
    }

    // primary := literal | ident | "matches" "(" ident "," string ")" | "(" expression ")"
    fn primary(&mut self) -> Result<Expr, BuildError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("expected an operand"));
        };
        match token {
            Token::Int(v) => {
                self.idx += 1;
                Ok(Expr::Literal(Value::Int(v)))
            }
            Token::Float(v) => {
                self.idx += 1;
                Ok(Expr::Literal(Value::Float(v)))
            }
            Token::Str(v) => {
                self.idx += 1;
                Ok(Expr::Literal(Value::String(v)))
            }
            Token::True => {
                self.idx += 1;
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.idx += 1;
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.idx += 1;
                Ok(Expr::Literal(Value::Null))
            }
            Token::LParen => {
                self.idx += 1;
                let expr = self.expression()?;
                self.expect(&Token::RParen, "expected ')'")?;
                Ok(expr)
            }
            Token::Ident(name) => {
                self.idx += 1;
                if self.peek() == Some(&Token::LParen) {
                    if name == "matches" {
                        self.matches_call()
                    } else {
                        Err(self.error(format!("unknown function '{name}'")))
                    }
                } else {
                    Ok(Expr::Key(name))
                }
            }
            _ => Err(self.unexpected("expected an operand")),
        }
    }

    fn matches_call(&mut self) -> Result<Expr, BuildError> {
        self.expect(&Token::LParen, "expected '('")?;
        let key = self.expect_ident("expected a key name as the first argument of matches()")?;
        self.expect(&Token::Comma, "expected ','")?;
        let pattern_pos = self.position();
        let pattern_text = match self.advance() {
            Some(Token::Str(text)) => text,
            _ => {
                return Err(BuildError::Compile {
                    snippet: self.src.to_string(),
                    position: pattern_pos,
                    reason: "matches() takes a string literal pattern".to_string(),
                })
            }
        };
        self.expect(&Token::RParen, "expected ')'")?;
        let pattern = Regex::new(&pattern_text).map_err(|e| BuildError::Compile {
            snippet: self.src.to_string(),
            position: pattern_pos,
            reason: format!("invalid regex pattern: {e}"),
        })?;
        Ok(Expr::Matches { key, pattern })
    }

    // statement := "push" "(" ident "," expression ")"
    //            | ident ("=" | "+=" | "-=" | "*=" | "/=") expression
    fn statement(&mut self) -> Result<Stmt, BuildError> {
        let name = self.expect_ident("expected a statement")?;

        if name == "push" && self.peek() == Some(&Token::LParen) {
            self.expect(&Token::LParen, "expected '('")?;
            let key = self.expect_ident("expected a key name as the first argument of push()")?;
            self.expect(&Token::Comma, "expected ','")?;
            let value = self.expression()?;
            self.expect(&Token::RParen, "expected ')'")?;
            return Ok(Stmt::Push { key, value });
        }

        let op = if self.eat(&Token::Assign) {
            AssignOp::Set
        } else if self.eat(&Token::PlusAssign) {
            AssignOp::Add
        } else if self.eat(&Token::MinusAssign) {
            AssignOp::Sub
        } else if self.eat(&Token::StarAssign) {
            AssignOp::Mul
        } else if self.eat(&Token::SlashAssign) {
            AssignOp::Div
        } else {
            return Err(self.unexpected("expected an assignment operator"));
        };
        let value = self.expression()?;
        Ok(Stmt::Assign {
            key: name,
            op,
            value,
        })
    }
}
