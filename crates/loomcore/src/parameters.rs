//! Parameter resolution: stored configuration in, concrete per-item values out.

use crate::expression::{Compiled, Scope};
use crate::schema::{NodeDescriptor, Property, PropertyType};
use crate::value::{coerce_bool, coerce_number, is_empty, parse_path, JsonObject, PathSegment, Value};
use crate::workflow::LABEL_KEY;
use crate::NodeError;
use indexmap::IndexMap;
use std::sync::Arc;

/// Stored parameter value with its expressions already parsed.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Literal(Value),
    Dynamic(Compiled),
    Object(IndexMap<String, ParamValue>),
    Array(Vec<ParamValue>),
}

impl ParamValue {
    pub fn compile(value: &Value) -> Self {
        match value {
            Value::String(text) => match Compiled::parse(text) {
                Compiled::Literal(_) => ParamValue::Literal(value.clone()),
                dynamic => ParamValue::Dynamic(dynamic),
            },
            Value::Object(map) => ParamValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), ParamValue::compile(v)))
                    .collect(),
            ),
            Value::Array(items) => ParamValue::Array(items.iter().map(ParamValue::compile).collect()),
            other => ParamValue::Literal(other.clone()),
        }
    }

    pub fn evaluate(&self, scope: &Scope<'_>) -> Value {
        match self {
            ParamValue::Literal(value) => value.clone(),
            ParamValue::Dynamic(compiled) => compiled.evaluate(scope),
            ParamValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.evaluate(scope)))
                    .collect(),
            ),
            ParamValue::Array(items) => Value::Array(items.iter().map(|v| v.evaluate(scope)).collect()),
        }
    }

    fn child(&self, segment: &PathSegment) -> Option<&ParamValue> {
        match (self, segment) {
            (ParamValue::Object(map), PathSegment::Key(key)) => map.get(key),
            (ParamValue::Object(map), PathSegment::Index(index)) => map.get(&index.to_string()),
            (ParamValue::Array(items), PathSegment::Index(index)) => items.get(*index),
            (ParamValue::Array(items), PathSegment::Key(key)) => items.get(key.parse::<usize>().ok()?),
            _ => None,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, ParamValue::Literal(value) if is_empty(value))
    }
}

/// A node's configuration compiled once per run, paired with its type's schema.
#[derive(Debug, Clone)]
pub struct NodeParameters {
    descriptor: Arc<NodeDescriptor>,
    stored: IndexMap<String, ParamValue>,
}

impl NodeParameters {
    pub fn compile(descriptor: Arc<NodeDescriptor>, data: &JsonObject) -> Self {
        let stored = data
            .iter()
            .filter(|(key, _)| key.as_str() != LABEL_KEY)
            .map(|(key, value)| (key.clone(), ParamValue::compile(value)))
            .collect();
        Self { descriptor, stored }
    }

    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn lookup(&self, segments: &[PathSegment]) -> Option<&ParamValue> {
        let (first, rest) = segments.split_first()?;
        let PathSegment::Key(key) = first else {
            return None;
        };
        let mut current = self.stored.get(key)?;
        for segment in rest {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// True when a value is stored at `path`, literal or expression.
    pub fn has(&self, path: &str) -> bool {
        self.lookup(&parse_path(path)).is_some()
    }

    /// Resolve `path` for one item.
    ///
    /// Missing values take the declared default, or `fallback` for undeclared
    /// parameters. Expressions are evaluated against `scope`. Declared numbers
    /// and booleans are coerced; fixed collections have every group instance
    /// filled against its sub-property schema.
    pub fn resolve(&self, path: &str, scope: &Scope<'_>, fallback: Value) -> Value {
        let segments = parse_path(path);
        let property = self.descriptor.property_at(&segments);

        match (self.lookup(&segments), property) {
            (Some(stored), Some(property)) => conform(property, stored.evaluate(scope)),
            (Some(stored), None) => stored.evaluate(scope),
            (None, Some(property)) if !property.default.is_null() => {
                conform(property, property.default.clone())
            }
            (None, _) => fallback,
        }
    }

    /// Value used by visibility rules: the stored value evaluated without an item.
    pub fn current_value(&self, name: &str) -> Value {
        self.resolve(name, &Scope::empty(), Value::Null)
    }

    pub fn is_visible(&self, property: &Property) -> bool {
        property.is_visible(|name| self.current_value(name))
    }

    /// Check that every visible required property has a stored, non-blank
    /// value or a non-blank default. Hidden properties are never required.
    pub fn validate_required(&self) -> Result<(), NodeError> {
        for property in &self.descriptor.properties {
            if !property.required || !self.is_visible(property) {
                continue;
            }
            let present = match self.stored.get(&property.name) {
                Some(stored) => !stored.is_blank(),
                None => !is_empty(&property.default),
            };
            if !present {
                return Err(NodeError::MissingRequiredParameter {
                    parameter: property.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn conform(property: &Property, value: Value) -> Value {
    match property.kind {
        PropertyType::Number => match value {
            Value::String(_) | Value::Bool(_) => coerce_number(&value),
            other => other,
        },
        PropertyType::Boolean => match value {
            Value::String(_) | Value::Number(_) => coerce_bool(&value),
            other => other,
        },
        PropertyType::FixedCollection => conform_collection(property, value),
        _ => value,
    }
}

fn conform_collection(property: &Property, value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let mut out = JsonObject::new();
    for (key, entry) in map {
        let Some(group) = property.group(&key) else {
            out.insert(key, entry);
            continue;
        };
        let fill = |instance: Value| -> Value {
            let Value::Object(mut fields) = instance else {
                return instance;
            };
            for sub in &group.values {
                let resolved = match fields.remove(&sub.name) {
                    Some(v) => conform(sub, v),
                    None => conform(sub, sub.default.clone()),
                };
                fields.insert(sub.name.clone(), resolved);
            }
            Value::Object(fields)
        };
        let conformed = match (property.multiple_values, entry) {
            (true, Value::Array(instances)) => Value::Array(instances.into_iter().map(fill).collect()),
            (true, single @ Value::Object(_)) => Value::Array(vec![fill(single)]),
            (false, instance) => fill(instance),
            (true, other) => other,
        };
        out.insert(key, conformed);
    }
    Value::Object(out)
}
