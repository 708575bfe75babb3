//! Condition language shared by the if, filter and switch nodes.

use loomcore::value::{display_string, is_empty, JsonObject, Value};
use loomcore::{CollectionGroup, NodeContext, NodeError, Property};
use regex::RegexBuilder;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    NotRegex,
    IsEmpty,
    IsNotEmpty,
    Gt,
    Gte,
    Lt,
    Lte,
    IsTrue,
    IsFalse,
}

pub const OPERATOR_CHOICES: &[(&str, &str)] = &[
    ("Equals", "equals"),
    ("Not Equals", "notEquals"),
    ("Contains", "contains"),
    ("Not Contains", "notContains"),
    ("Starts With", "startsWith"),
    ("Ends With", "endsWith"),
    ("Matches Regex", "regex"),
    ("Does Not Match Regex", "notRegex"),
    ("Is Empty", "isEmpty"),
    ("Is Not Empty", "isNotEmpty"),
    ("Greater Than", "gt"),
    ("Greater Or Equal", "gte"),
    ("Less Than", "lt"),
    ("Less Or Equal", "lte"),
    ("Is True", "isTrue"),
    ("Is False", "isFalse"),
];

impl FromStr for Operator {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "equals" | "equal" => Operator::Equals,
            "notEquals" | "notEqual" => Operator::NotEquals,
            "contains" => Operator::Contains,
            "notContains" => Operator::NotContains,
            "startsWith" => Operator::StartsWith,
            "endsWith" => Operator::EndsWith,
            "regex" => Operator::Regex,
            "notRegex" => Operator::NotRegex,
            "isEmpty" => Operator::IsEmpty,
            "isNotEmpty" => Operator::IsNotEmpty,
            "gt" | "larger" => Operator::Gt,
            "gte" | "largerEqual" => Operator::Gte,
            "lt" | "smaller" => Operator::Lt,
            "lte" | "smallerEqual" => Operator::Lte,
            "isTrue" => Operator::IsTrue,
            "isFalse" => Operator::IsFalse,
            other => {
                return Err(NodeError::ConditionEvaluation(format!(
                    "unknown operator '{}'",
                    other
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    All,
    Any,
}

impl Combinator {
    pub fn parse(s: &str) -> Self {
        match s {
            "any" | "or" => Combinator::Any,
            _ => Combinator::All,
        }
    }
}

/// Numeric view: numbers and numeric strings. Booleans are not numbers here.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text(value: &Value, case_sensitive: bool) -> String {
    let s = display_string(value);
    if case_sensitive {
        s
    } else {
        s.to_lowercase()
    }
}

/// Equality with automatic coercion: numeric strings compare as numbers,
/// `"true"`/`"false"` as booleans, everything else as text.
pub fn loosely_equal(left: &Value, right: &Value, case_sensitive: bool) -> bool {
    if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
        return l == r;
    }
    if let (Some(l), Some(r)) = (boolean(left), boolean(right)) {
        return l == r;
    }
    match (left, right) {
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => left == right,
        _ => text(left, case_sensitive) == text(right, case_sensitive),
    }
}

fn ordered(left: &Value, right: &Value) -> Result<(f64, f64), NodeError> {
    match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(NodeError::ConditionEvaluation(format!(
            "cannot compare {} with {} numerically",
            left, right
        ))),
    }
}

/// Patterns may be written bare or as `/pattern/flags` (flags: `i`, `m`, `s`).
fn regex_matches(value: &Value, pattern: &Value, case_sensitive: bool) -> Result<bool, NodeError> {
    let pattern = display_string(pattern);
    let (body, flags) = match pattern.strip_prefix('/').and_then(|p| p.rfind('/').map(|end| (p, end))) {
        Some((p, end)) => (&p[..end], &p[end + 1..]),
        None => (pattern.as_str(), ""),
    };
    let regex = RegexBuilder::new(body)
        .case_insensitive(!case_sensitive || flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| NodeError::ConditionEvaluation(format!("invalid regex '{}': {}", body, e)))?;
    Ok(regex.is_match(&display_string(value)))
}

pub fn compare(op: Operator, left: &Value, right: &Value, case_sensitive: bool) -> Result<bool, NodeError> {
    Ok(match op {
        Operator::Equals => loosely_equal(left, right, case_sensitive),
        Operator::NotEquals => !loosely_equal(left, right, case_sensitive),
        Operator::Contains | Operator::NotContains => {
            let found = match left {
                Value::Array(items) => items.iter().any(|i| loosely_equal(i, right, case_sensitive)),
                _ => text(left, case_sensitive).contains(&text(right, case_sensitive)),
            };
            found == (op == Operator::Contains)
        }
        Operator::StartsWith => text(left, case_sensitive).starts_with(&text(right, case_sensitive)),
        Operator::EndsWith => text(left, case_sensitive).ends_with(&text(right, case_sensitive)),
        Operator::Regex => regex_matches(left, right, case_sensitive)?,
        Operator::NotRegex => !regex_matches(left, right, case_sensitive)?,
        Operator::IsEmpty => is_empty(left),
        Operator::IsNotEmpty => !is_empty(left),
        Operator::Gt => {
            let (l, r) = ordered(left, right)?;
            l > r
        }
        Operator::Gte => {
            let (l, r) = ordered(left, right)?;
            l >= r
        }
        Operator::Lt => {
            let (l, r) = ordered(left, right)?;
            l < r
        }
        Operator::Lte => {
            let (l, r) = ordered(left, right)?;
            l <= r
        }
        Operator::IsTrue => boolean(left) == Some(true),
        Operator::IsFalse => boolean(left) == Some(false),
    })
}

/// Evaluate one resolved condition group. Malformed conditions are false.
pub fn condition_holds(condition: &JsonObject, case_sensitive: bool) -> bool {
    let left = condition.get("leftValue").cloned().unwrap_or(Value::Null);
    let right = condition.get("rightValue").cloned().unwrap_or(Value::Null);
    let operator = condition
        .get("operator")
        .map(display_string)
        .unwrap_or_default();

    let result = operator
        .parse::<Operator>()
        .and_then(|op| compare(op, &left, &right, case_sensitive));
    match result {
        Ok(holds) => {
            tracing::debug!(operator = %operator, %left, %right, holds, "Evaluated condition");
            holds
        }
        Err(e) => {
            tracing::warn!("Condition treated as false: {}", e);
            false
        }
    }
}

/// Whether item `item_index` satisfies the node's `conditions` under its
/// `combinator`. An empty condition list matches.
pub fn item_matches(ctx: &NodeContext, item_index: usize) -> bool {
    let conditions = ctx.collection("conditions", "condition", item_index);
    if conditions.is_empty() {
        return true;
    }
    let case_sensitive = ctx.get_bool("caseSensitive", item_index);
    let mut results = conditions.iter().map(|c| condition_holds(c, case_sensitive));
    match Combinator::parse(&ctx.get_string("combinator", item_index)) {
        Combinator::All => results.all(|holds| holds),
        Combinator::Any => results.any(|holds| holds),
    }
}

/// The `conditions`, `combinator` and `caseSensitive` properties.
pub fn condition_properties() -> Vec<Property> {
    vec![
        Property::fixed_collection(
            "conditions",
            "Conditions",
            true,
            vec![CollectionGroup::new(
                "condition",
                "Condition",
                vec![
                    Property::string("leftValue", "Value 1", ""),
                    Property::options("operator", "Operation", "equals", OPERATOR_CHOICES),
                    Property::string("rightValue", "Value 2", "")
                        .hide_when("operator", &unary_operators()),
                ],
            )],
        ),
        Property::options(
            "combinator",
            "Combine",
            "all",
            &[("All conditions must match", "all"), ("Any condition may match", "any")],
        ),
        Property::boolean("caseSensitive", "Case Sensitive", true),
    ]
}

fn unary_operators() -> Vec<Value> {
    ["isEmpty", "isNotEmpty", "isTrue", "isFalse"]
        .into_iter()
        .map(Value::from)
        .collect()
}
