use serde_json::Value;

use super::lexer::{Keyword, Spanned, Token};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BeginsWith,
    EndsWith,
    Contains,
    Like,
    Matches,
    In,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub case_insensitive: bool,
    pub diacritic_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    KeyPath(Vec<String>),
    Aggregate(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Compare {
        quantifier: Option<Quantifier>,
        left: Expr,
        operator: Operator,
        options: Options,
        right: Expr,
        /// Offset of the operator, reported when evaluation fails.
        pos: usize,
    },
}

/// Deepest nesting of parentheses, `NOT` and aggregates accepted.
pub const MAX_DEPTH: usize = 64;

pub fn parse(source: &str, tokens: Vec<Spanned>) -> Result<Predicate> {
    let mut parser = Parser {
        source,
        tokens,
        index: 0,
        depth: 0,
    };
    let predicate = parser.or_expr()?;
    if let Some(extra) = parser.peek() {
        return Err(parser.error_at(extra.pos, "unexpected trailing input"));
    }
    Ok(predicate)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    index: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.index)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Spanned> {
        let item = self.tokens.get(self.index).cloned();
        if item.is_some() {
            self.index += 1;
        }
        item
    }

    fn end_pos(&self) -> usize {
        self.source.len()
    }

    fn error_at(&self, pos: usize, problem: impl Into<String>) -> Error {
        Error::predicate_invalid(self.source, pos, problem)
    }

    /// Enter one nesting level at `pos`; paired with [`Parser::ascend`].
    fn descend(&mut self, pos: usize) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_at(
                pos,
                format!("nested more than {} levels deep", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        match self.next() {
            Some(s) if s.token == expected => Ok(()),
            Some(s) => Err(self.error_at(s.pos, format!("expected {}", what))),
            None => Err(self.error_at(self.end_pos(), format!("expected {}", what))),
        }
    }

    fn or_expr(&mut self) -> Result<Predicate> {
        let mut left = self.and_expr()?;
        while self.peek_token() == Some(&Token::Or) {
            self.next();
            let right = self.and_expr()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Predicate> {
        let mut left = self.not_expr()?;
        while self.peek_token() == Some(&Token::And) {
            self.next();
            let right = self.not_expr()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Predicate> {
        if let Some(Spanned { token: Token::Not, pos }) = self.peek() {
            let pos = *pos;
            self.next();
            self.descend(pos)?;
            let inner = self.not_expr()?;
            self.ascend();
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Predicate> {
        match self.peek() {
            Some(Spanned { token: Token::LParen, pos }) => {
                let pos = *pos;
                self.next();
                self.descend(pos)?;
                let inner = self.or_expr()?;
                self.expect(Token::RParen, "')'")?;
                self.ascend();
                Ok(inner)
            }
            Some(Spanned {
                token: Token::Keyword(Keyword::TruePredicate),
                ..
            }) => {
                self.next();
                Ok(Predicate::Const(true))
            }
            Some(Spanned {
                token: Token::Keyword(Keyword::FalsePredicate),
                ..
            }) => {
                self.next();
                Ok(Predicate::Const(false))
            }
            _ => self.comparison(),
        }
    }

    fn comparison(&mut self) -> Result<Predicate> {
        let quantifier = match self.peek_token() {
            Some(Token::Keyword(Keyword::Any)) => Some(Quantifier::Any),
            Some(Token::Keyword(Keyword::All)) => Some(Quantifier::All),
            Some(Token::Keyword(Keyword::None)) => Some(Quantifier::None),
            _ => None,
        };
        if quantifier.is_some() {
            self.next();
        }

        let left = self.expression()?;

        let (operator, pos) = match self.next() {
            Some(Spanned { token, pos }) => match operator_for(&token) {
                Some(op) => (op, pos),
                None => return Err(self.error_at(pos, "expected a comparison operator")),
            },
            None => return Err(self.error_at(self.end_pos(), "expected a comparison operator")),
        };

        let mut options = Options::default();
        if let Some(Token::Modifier { case, diacritic }) = self.peek_token() {
            options = Options {
                case_insensitive: *case,
                diacritic_insensitive: *diacritic,
            };
            self.next();
        }

        let right = self.expression()?;

        if operator == Operator::Between {
            if let Expr::Aggregate(items) = &right {
                if items.len() != 2 {
                    return Err(self.error_at(pos, "BETWEEN needs a two-element aggregate"));
                }
            }
        }

        Ok(Predicate::Compare {
            quantifier,
            left,
            operator,
            options,
            right,
            pos,
        })
    }

    fn expression(&mut self) -> Result<Expr> {
        let Some(Spanned { token, pos }) = self.next() else {
            return Err(self.error_at(self.end_pos(), "expected a value"));
        };
        match token {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Number(n) => Ok(Expr::Literal(number(n))),
            Token::Minus => match self.next() {
                Some(Spanned {
                    token: Token::Number(n),
                    ..
                }) => Ok(Expr::Literal(number(-n))),
                _ => Err(self.error_at(pos, "expected a number after '-'")),
            },
            Token::Keyword(Keyword::True) => Ok(Expr::Literal(Value::Bool(true))),
            Token::Keyword(Keyword::False) => Ok(Expr::Literal(Value::Bool(false))),
            Token::Keyword(Keyword::Nil) => Ok(Expr::Literal(Value::Null)),
            Token::Ident(path) => Ok(Expr::KeyPath(
                path.split('.').map(str::to_string).collect(),
            )),
            Token::LBrace => {
                self.descend(pos)?;
                let aggregate = self.aggregate()?;
                self.ascend();
                Ok(aggregate)
            }
            _ => Err(self.error_at(pos, "expected a value")),
        }
    }

    fn aggregate(&mut self) -> Result<Expr> {
        let mut items = Vec::new();
        if self.peek_token() == Some(&Token::RBrace) {
            self.next();
            return Ok(Expr::Aggregate(items));
        }
        loop {
            items.push(self.expression()?);
            match self.next() {
                Some(Spanned {
                    token: Token::Comma,
                    ..
                }) => continue,
                Some(Spanned {
                    token: Token::RBrace,
                    ..
                }) => return Ok(Expr::Aggregate(items)),
                Some(s) => return Err(self.error_at(s.pos, "expected ',' or '}'")),
                None => return Err(self.error_at(self.end_pos(), "unterminated aggregate")),
            }
        }
    }
}

fn operator_for(token: &Token) -> Option<Operator> {
    let op = match token {
        Token::Eq => Operator::Eq,
        Token::Ne => Operator::Ne,
        Token::Lt => Operator::Lt,
        Token::Le => Operator::Le,
        Token::Gt => Operator::Gt,
        Token::Ge => Operator::Ge,
        Token::Keyword(Keyword::BeginsWith) => Operator::BeginsWith,
        Token::Keyword(Keyword::EndsWith) => Operator::EndsWith,
        Token::Keyword(Keyword::Contains) => Operator::Contains,
        Token::Keyword(Keyword::Like) => Operator::Like,
        Token::Keyword(Keyword::Matches) => Operator::Matches,
        Token::Keyword(Keyword::In) => Operator::In,
        Token::Keyword(Keyword::Between) => Operator::Between,
        _ => return None,
    };
    Some(op)
}

/// Whole numbers stay integers so they print without a fraction.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
