//! A subset of the Foundation predicate format language, evaluated against
//! a JSON object (normally the pipeline environment).
//!
//! ```ignore
//! predicate::evaluate("version BEGINSWITH '120' AND sleep_time > 2", &env.to_value())?;
//! ```

mod eval;
mod lexer;
mod parser;

use serde_json::Value;

use crate::error::Result;

pub use parser::{Expr, Operator, Options, Predicate, Quantifier};

pub fn parse(source: &str) -> Result<Predicate> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(source, tokens)
}

pub fn evaluate(source: &str, root: &Value) -> Result<bool> {
    let predicate = parse(source)?;
    eval::evaluate(source, &predicate, root)
}
