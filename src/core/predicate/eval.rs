use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;

use super::parser::{Expr, Operator, Options, Predicate, Quantifier};
use crate::error::{Error, Result};

pub fn evaluate(source: &str, predicate: &Predicate, root: &Value) -> Result<bool> {
    match predicate {
        Predicate::Const(value) => Ok(*value),
        Predicate::Not(inner) => Ok(!evaluate(source, inner, root)?),
        Predicate::And(left, right) => {
            Ok(evaluate(source, left, root)? && evaluate(source, right, root)?)
        }
        Predicate::Or(left, right) => {
            Ok(evaluate(source, left, root)? || evaluate(source, right, root)?)
        }
        Predicate::Compare {
            quantifier,
            left,
            operator,
            options,
            right,
            pos,
        } => {
            let lhs = resolve(left, root);
            let rhs = resolve(right, root);
            let check = |value: &Value| -> Result<bool> {
                compare(*operator, *options, value, &rhs)
                    .map_err(|problem| Error::predicate_invalid(source, *pos, problem))
            };
            match quantifier {
                None => check(&lhs),
                Some(q) => {
                    let items = match &lhs {
                        Value::Array(items) => items.clone(),
                        Value::Null => Vec::new(),
                        other => vec![other.clone()],
                    };
                    let mut results = Vec::with_capacity(items.len());
                    for item in &items {
                        results.push(check(item)?);
                    }
                    Ok(match q {
                        Quantifier::Any => results.iter().any(|r| *r),
                        Quantifier::All => results.iter().all(|r| *r),
                        Quantifier::None => !results.iter().any(|r| *r),
                    })
                }
            }
        }
    }
}

fn resolve(expr: &Expr, root: &Value) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Aggregate(items) => Value::Array(items.iter().map(|e| resolve(e, root)).collect()),
        Expr::KeyPath(parts) => {
            let mut current = root;
            for (index, part) in parts.iter().enumerate() {
                if index == 0 && part.eq_ignore_ascii_case("SELF") {
                    continue;
                }
                let key = part.strip_prefix('$').unwrap_or(part);
                match current.get(key) {
                    Some(next) => current = next,
                    None => return Value::Null,
                }
            }
            current.clone()
        }
    }
}

/// `Err` carries a problem description; callers attach the position.
fn compare(operator: Operator, options: Options, left: &Value, right: &Value) -> std::result::Result<bool, String> {
    Ok(match operator {
        Operator::Eq => equals(left, right, options),
        Operator::Ne => !equals(left, right, options),
        Operator::Lt => order(left, right, options) == Some(Ordering::Less),
        Operator::Le => matches!(order(left, right, options), Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => order(left, right, options) == Some(Ordering::Greater),
        Operator::Ge => matches!(order(left, right, options), Some(Ordering::Greater | Ordering::Equal)),
        Operator::BeginsWith => strings(left, right, options)
            .map(|(l, r)| l.starts_with(&r))
            .unwrap_or(false),
        Operator::EndsWith => strings(left, right, options)
            .map(|(l, r)| l.ends_with(&r))
            .unwrap_or(false),
        Operator::Contains => match left {
            Value::Array(items) => items.iter().any(|item| equals(item, right, options)),
            _ => strings(left, right, options)
                .map(|(l, r)| l.contains(&r))
                .unwrap_or(false),
        },
        Operator::Like => match (left, right) {
            (Value::String(l), Value::String(pattern)) => {
                full_match(&like_to_regex(pattern), l, options)?
            }
            _ => false,
        },
        Operator::Matches => match (left, right) {
            (Value::String(l), Value::String(pattern)) => full_match(pattern, l, options)?,
            (_, Value::String(_)) => false,
            _ => return Err("MATCHES needs a string pattern".to_string()),
        },
        Operator::In => match right {
            Value::Array(items) => items.iter().any(|item| equals(left, item, options)),
            Value::Object(map) => match left {
                Value::String(key) => map.contains_key(key),
                _ => false,
            },
            Value::String(_) => strings(right, left, options)
                .map(|(haystack, needle)| haystack.contains(&needle))
                .unwrap_or(false),
            _ => false,
        },
        Operator::Between => match right {
            Value::Array(bounds) if bounds.len() == 2 => {
                matches!(order(left, &bounds[0], options), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(order(left, &bounds[1], options), Some(Ordering::Less | Ordering::Equal))
            }
            _ => return Err("BETWEEN needs a two-element aggregate".to_string()),
        },
    })
}

/// Booleans compare as 0/1 against numbers.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn equals(left: &Value, right: &Value, options: Options) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::String(l), Value::String(r)) => fold(l, options) == fold(r, options),
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| equals(a, b, options))
        }
        (Value::Object(l), Value::Object(r)) => l == r,
        _ => match (as_number(left), as_number(right)) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
    }
}

fn order(left: &Value, right: &Value, options: Options) -> Option<Ordering> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(fold(l, options).cmp(&fold(r, options))),
        _ => as_number(left)?.partial_cmp(&as_number(right)?),
    }
}

fn strings(left: &Value, right: &Value, options: Options) -> Option<(String, String)> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some((fold(l, options), fold(r, options))),
        _ => None,
    }
}

fn fold(text: &str, options: Options) -> String {
    let text = if options.diacritic_insensitive {
        strip_diacritics(text)
    } else {
        text.to_string()
    };
    if options.case_insensitive {
        text.to_lowercase()
    } else {
        text
    }
}

/// Latin letters with common accents mapped to their base letter.
fn strip_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' => 'A',
            'ç' | 'ć' | 'č' => 'c',
            'Ç' | 'Ć' | 'Č' => 'C',
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => 'e',
            'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ě' => 'E',
            'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
            'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' => 'I',
            'ñ' | 'ń' | 'ň' => 'n',
            'Ñ' | 'Ń' | 'Ň' => 'N',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' => 'O',
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => 'u',
            'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' => 'U',
            'ý' | 'ÿ' => 'y',
            'Ý' | 'Ÿ' => 'Y',
            'š' => 's',
            'Š' => 'S',
            'ž' => 'z',
            'Ž' => 'Z',
            other => other,
        })
        .collect()
}

fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex
}

fn full_match(pattern: &str, text: &str, options: Options) -> std::result::Result<bool, String> {
    let anchored = format!("^(?:{})$", pattern);
    let regex = RegexBuilder::new(&anchored)
        .case_insensitive(options.case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| format!("invalid regular expression: {}", e))?;
    let text = if options.diacritic_insensitive {
        strip_diacritics(text)
    } else {
        text.to_string()
    };
    Ok(regex.is_match(&text))
}
