//! The `{{ $json.a.b }}` expression language embedded in parameter values.
//!
//! Strings are parsed once when a node's configuration is compiled. A value
//! that is exactly one `{{ }}` block evaluates to the referenced JSON value
//! with its type intact; a value mixing text and blocks becomes a template
//! whose blocks are interpolated as text.

use crate::value::{display_string, get_segments, parse_path, JsonObject, PathSegment, Value};
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("empty expression")]
    Empty,

    #[error("unknown expression root '{0}'")]
    UnknownRoot(String),

    #[error("unexpected input after '{root}': {rest}")]
    Trailing { root: String, rest: String },
}

/// A parsed field access.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `$json` followed by an optional path into the current item.
    Json(Vec<PathSegment>),
    /// `$itemIndex`, the position of the current item in the input set.
    ItemIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expression),
}

/// Result of compiling a stored string.
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    Literal(String),
    Expression(Expression),
    Template(Vec<TemplatePart>),
}

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub json: Option<&'a JsonObject>,
    pub item_index: usize,
}

impl<'a> Scope<'a> {
    pub fn new(json: Option<&'a JsonObject>, item_index: usize) -> Self {
        Self { json, item_index }
    }

    pub fn empty() -> Self {
        Self {
            json: None,
            item_index: 0,
        }
    }
}

impl Expression {
    pub fn parse(body: &str) -> Result<Self, ExpressionError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ExpressionError::Empty);
        }
        if let Some(rest) = body.strip_prefix("$json") {
            if !(rest.is_empty() || rest.starts_with('.') || rest.starts_with('[')) {
                return Err(ExpressionError::UnknownRoot(body.to_string()));
            }
            return Ok(Expression::Json(parse_path(rest)));
        }
        if let Some(rest) = body.strip_prefix("$itemIndex") {
            if !rest.trim().is_empty() {
                return Err(ExpressionError::Trailing {
                    root: "$itemIndex".to_string(),
                    rest: rest.to_string(),
                });
            }
            return Ok(Expression::ItemIndex);
        }
        let root = body
            .split(|c: char| c == '.' || c == '[')
            .next()
            .unwrap_or(body);
        Err(ExpressionError::UnknownRoot(root.to_string()))
    }

    /// Missing fields evaluate to `null`, never an error.
    pub fn evaluate(&self, scope: &Scope<'_>) -> Value {
        match self {
            Expression::ItemIndex => Value::from(scope.item_index),
            Expression::Json(path) => {
                let Some(json) = scope.json else {
                    return Value::Null;
                };
                let Some((first, rest)) = path.split_first() else {
                    return Value::Object(json.clone());
                };
                let head = match first {
                    PathSegment::Key(key) => json.get(key),
                    PathSegment::Index(index) => json.get(&index.to_string()),
                };
                head.and_then(|head| get_segments(head, rest))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        }
    }
}

impl Compiled {
    /// Compile a stored string. Unparseable blocks are kept as literal text.
    pub fn parse(text: &str) -> Self {
        let source = match text.strip_prefix('=') {
            Some(rest) if rest.trim_start().starts_with(OPEN) => rest,
            _ => text,
        };
        if !source.contains(OPEN) {
            return Compiled::Literal(text.to_string());
        }

        let parts = split_template(source);
        match parts.as_slice() {
            [TemplatePart::Expr(expr)] if is_single_block(source) => {
                Compiled::Expression(expr.clone())
            }
            _ if parts.iter().all(|p| matches!(p, TemplatePart::Text(_))) => {
                Compiled::Literal(text.to_string())
            }
            _ => Compiled::Template(parts),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Compiled::Literal(_))
    }

    pub fn evaluate(&self, scope: &Scope<'_>) -> Value {
        match self {
            Compiled::Literal(text) => Value::from(text.as_str()),
            Compiled::Expression(expr) => expr.evaluate(scope),
            Compiled::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => out.push_str(&display_string(&expr.evaluate(scope))),
                    }
                }
                Value::String(out)
            }
        }
    }
}

fn is_single_block(source: &str) -> bool {
    let trimmed = source.trim();
    trimmed.starts_with(OPEN)
        && trimmed.ends_with(CLOSE)
        && trimmed[OPEN.len()..].find(CLOSE) == Some(trimmed.len() - OPEN.len() - CLOSE.len())
}

fn split_template(source: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        text.push_str(&rest[..start]);
        let body = &after_open[..end];
        match Expression::parse(body) {
            Ok(expr) => {
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                parts.push(TemplatePart::Expr(expr));
            }
            Err(error) => {
                tracing::debug!(body = %body, %error, "keeping unparseable expression as text");
                text.push_str(OPEN);
                text.push_str(body);
                text.push_str(CLOSE);
            }
        }
        rest = &after_open[end + CLOSE.len()..];
    }
    text.push_str(rest);
    if !text.is_empty() {
        parts.push(TemplatePart::Text(text));
    }
    parts
}
