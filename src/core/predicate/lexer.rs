use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Modifier { case: bool, diacritic: bool },
    Keyword(Keyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    Nil,
    TruePredicate,
    FalsePredicate,
    BeginsWith,
    EndsWith,
    Contains,
    Like,
    Matches,
    In,
    Between,
    Any,
    All,
    None,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "TRUE" | "YES" => Token::Keyword(Keyword::True),
        "FALSE" | "NO" => Token::Keyword(Keyword::False),
        "NIL" | "NULL" => Token::Keyword(Keyword::Nil),
        "TRUEPREDICATE" => Token::Keyword(Keyword::TruePredicate),
        "FALSEPREDICATE" => Token::Keyword(Keyword::FalsePredicate),
        "BEGINSWITH" => Token::Keyword(Keyword::BeginsWith),
        "ENDSWITH" => Token::Keyword(Keyword::EndsWith),
        "CONTAINS" => Token::Keyword(Keyword::Contains),
        "LIKE" => Token::Keyword(Keyword::Like),
        "MATCHES" => Token::Keyword(Keyword::Matches),
        "IN" => Token::Keyword(Keyword::In),
        "BETWEEN" => Token::Keyword(Keyword::Between),
        "ANY" | "SOME" => Token::Keyword(Keyword::Any),
        "ALL" => Token::Keyword(Keyword::All),
        "NONE" => Token::Keyword(Keyword::None),
        _ => return None,
    };
    Some(token)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '@' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '@'
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn error(&self, pos: usize, problem: impl Into<String>) -> Error {
        Error::predicate_invalid(self.source, pos, problem)
    }

    fn push(&mut self, token: Token, pos: usize) {
        self.tokens.push(Spanned { token, pos });
    }

    /// Consume the next char if it equals `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|(_, c)| *c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn run(&mut self) -> Result<()> {
        while let Some((pos, c)) = self.chars.next() {
            match c {
                c if c.is_whitespace() => {}
                '(' => self.push(Token::LParen, pos),
                ')' => self.push(Token::RParen, pos),
                '{' => self.push(Token::LBrace, pos),
                '}' => self.push(Token::RBrace, pos),
                ',' => self.push(Token::Comma, pos),
                '-' => self.push(Token::Minus, pos),
                '=' => {
                    let token = if self.eat('=') {
                        Token::Eq
                    } else if self.eat('<') {
                        Token::Le
                    } else if self.eat('>') {
                        Token::Ge
                    } else {
                        Token::Eq
                    };
                    self.push(token, pos);
                }
                '!' => {
                    let token = if self.eat('=') { Token::Ne } else { Token::Not };
                    self.push(token, pos);
                }
                '<' => {
                    let token = if self.eat('=') {
                        Token::Le
                    } else if self.eat('>') {
                        Token::Ne
                    } else {
                        Token::Lt
                    };
                    self.push(token, pos);
                }
                '>' => {
                    let token = if self.eat('=') { Token::Ge } else { Token::Gt };
                    self.push(token, pos);
                }
                '&' => {
                    if !self.eat('&') {
                        return Err(self.error(pos, "expected '&&'"));
                    }
                    self.push(Token::And, pos);
                }
                '|' => {
                    if !self.eat('|') {
                        return Err(self.error(pos, "expected '||'"));
                    }
                    self.push(Token::Or, pos);
                }
                '[' => {
                    let token = self.modifier(pos)?;
                    self.push(token, pos);
                }
                '\'' | '"' => {
                    let text = self.string(pos, c)?;
                    self.push(Token::Str(text), pos);
                }
                '#' => {
                    // `#word` uses a reserved word as a key.
                    let word = self.word(pos)?;
                    self.push(Token::Ident(word), pos);
                }
                c if c.is_ascii_digit() => {
                    let number = self.number(pos, c)?;
                    self.push(Token::Number(number), pos);
                }
                c if is_ident_start(c) => {
                    let mut word = String::from(c);
                    self.take_ident(&mut word);
                    let token = keyword(&word).unwrap_or(Token::Ident(word));
                    self.push(token, pos);
                }
                other => return Err(self.error(pos, format!("unexpected character '{}'", other))),
            }
        }
        Ok(())
    }

    fn take_ident(&mut self, word: &mut String) {
        while let Some((_, c)) = self.chars.peek().copied() {
            if !is_ident_continue(c) {
                break;
            }
            word.push(c);
            self.chars.next();
        }
    }

    fn word(&mut self, pos: usize) -> Result<String> {
        let mut word = String::new();
        match self.chars.peek().copied() {
            Some((_, c)) if is_ident_start(c) => {
                word.push(c);
                self.chars.next();
            }
            _ => return Err(self.error(pos, "expected a key after '#'")),
        }
        self.take_ident(&mut word);
        Ok(word)
    }

    fn string(&mut self, start: usize, quote: char) -> Result<String> {
        let mut text = String::new();
        while let Some((pos, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(text),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, 'r')) => text.push('\r'),
                    Some((_, escaped)) => text.push(escaped),
                    None => return Err(self.error(pos, "dangling escape")),
                },
                c => text.push(c),
            }
        }
        Err(self.error(start, "unterminated string"))
    }

    fn number(&mut self, start: usize, first: char) -> Result<f64> {
        let mut text = String::from(first);
        let mut seen_dot = false;
        while let Some((_, c)) = self.chars.peek().copied() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                text.push(c);
            } else {
                break;
            }
            self.chars.next();
        }
        text.parse::<f64>()
            .map_err(|_| self.error(start, format!("invalid number '{}'", text)))
    }

    fn modifier(&mut self, start: usize) -> Result<Token> {
        let mut case = false;
        let mut diacritic = false;
        while let Some((pos, c)) = self.chars.next() {
            match c.to_ascii_lowercase() {
                ']' => return Ok(Token::Modifier { case, diacritic }),
                'c' => case = true,
                'd' => diacritic = true,
                // normalized strings: nothing to do
                'n' => {}
                other => return Err(self.error(pos, format!("unknown option '{}'", other))),
            }
        }
        Err(self.error(start, "unterminated option block"))
    }
}
