//! Helpers over `serde_json::Value`, the payload type carried by items.

use serde_json::Map;
pub use serde_json::Value;

/// A keyed JSON structure. Item payloads are always one of these.
pub type JsonObject = Map<String, Value>;

/// One step of a dot-notation path such as `user.addresses[0].city`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Split a dot-notation path into segments. `a.b[2]` and `a.b.2` address the
/// same element; bracketed quoted keys (`a["x.y"]`) keep their dots.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                let inner = inner.trim();
                let unquoted = inner.trim_matches(|c| c == '"' || c == '\'');
                if unquoted.len() != inner.len() {
                    segments.push(PathSegment::Key(unquoted.to_string()));
                } else if let Ok(index) = inner.parse::<usize>() {
                    segments.push(PathSegment::Index(index));
                } else if !inner.is_empty() {
                    segments.push(PathSegment::Key(inner.to_string()));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    segments
}

/// Walk `segments` from `root`. Missing keys and out-of-range indices yield `None`.
pub fn get_segments<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Key(key), Value::Array(arr)) => arr.get(key.parse::<usize>().ok()?)?,
            (PathSegment::Index(index), Value::Array(arr)) => arr.get(*index)?,
            (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Look up a dot-notation path inside an item payload.
pub fn get_path<'a>(object: &'a JsonObject, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path);
    let (first, rest) = segments.split_first()?;
    let head = match first {
        PathSegment::Key(key) => object.get(key)?,
        PathSegment::Index(index) => object.get(&index.to_string())?,
    };
    get_segments(head, rest)
}

/// Write `value` at a dot-notation path, creating intermediate containers and
/// replacing intermediates of the wrong shape. Index segments address array
/// elements, padding with nulls when the array is too short.
pub fn set_path(object: &mut JsonObject, path: &str, value: Value) {
    let segments = parse_path(path);
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let slot = object.entry(segment_key(first)).or_insert(Value::Null);
    set_segments(slot, rest, value);
}

fn set_segments(slot: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };

    let index = match (first, &*slot) {
        (PathSegment::Index(index), _) => Some(*index),
        (PathSegment::Key(key), Value::Array(_)) => key.parse::<usize>().ok(),
        _ => None,
    };

    match (index, first) {
        (Some(index), _) => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            let Value::Array(elements) = slot else {
                return;
            };
            if elements.len() <= index {
                elements.resize(index + 1, Value::Null);
            }
            set_segments(&mut elements[index], rest, value);
        }
        (None, segment) => {
            if !slot.is_object() {
                *slot = Value::Object(JsonObject::new());
            }
            let Value::Object(map) = slot else {
                return;
            };
            let child = map.entry(segment_key(segment)).or_insert(Value::Null);
            set_segments(child, rest, value);
        }
    }
}

/// Remove and return the value at a dot-notation path. Sibling keys keep
/// their order.
pub fn remove_path(object: &mut JsonObject, path: &str) -> Option<Value> {
    let segments = parse_path(path);
    let (last, parents) = segments.split_last()?;
    let Some((first, rest)) = parents.split_first() else {
        return object.shift_remove(&segment_key(last));
    };

    let mut current = object.get_mut(&segment_key(first))?;
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (PathSegment::Key(key), Value::Array(arr)) => arr.get_mut(key.parse::<usize>().ok()?)?,
            (PathSegment::Index(index), Value::Array(arr)) => arr.get_mut(*index)?,
            (PathSegment::Index(index), Value::Object(map)) => map.get_mut(&index.to_string())?,
            _ => return None,
        };
    }

    match (last, current) {
        (PathSegment::Key(key), Value::Object(map)) => map.shift_remove(key),
        (PathSegment::Index(index), Value::Object(map)) => map.shift_remove(&index.to_string()),
        (segment, Value::Array(arr)) => {
            let index = match segment {
                PathSegment::Index(index) => *index,
                PathSegment::Key(key) => key.parse::<usize>().ok()?,
            };
            (index < arr.len()).then(|| arr.remove(index))
        }
        _ => None,
    }
}

fn segment_key(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Key(key) => key.clone(),
        PathSegment::Index(index) => index.to_string(),
    }
}

/// Numeric view of a value. Numeric strings parse; booleans map to 0/1.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Boolean view of a value. Only unambiguous spellings convert.
pub fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

/// Coerce to a number, falling back to 0 when parsing fails.
pub fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        other => number_value(to_number(other).unwrap_or(0.0)),
    }
}

/// Coerce to a boolean, falling back to false when parsing fails.
pub fn coerce_bool(value: &Value) -> Value {
    Value::Bool(to_bool(value).unwrap_or(false))
}

/// Build a JSON number, keeping integral values as integers.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Text rendering used for interpolation and string comparisons.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Serialize with object keys sorted at every depth, so two structurally equal
/// values always produce the same text.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = JsonObject::new();
                for key in keys {
                    out.insert(key.clone(), sorted(&map[key]));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}
