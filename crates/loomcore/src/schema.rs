//! Declarative parameter schemas for node types.

use crate::value::{to_number, PathSegment, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Handle name of the single output of a non-branching node.
pub const MAIN_OUTPUT: &str = "main";

/// Value kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Options,
    MultiOptions,
    Color,
    Json,
    FixedCollection,
}

/// A selectable value for `options`/`multiOptions` properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyOption {
    pub name: String,
    pub value: Value,
}

/// One named, repeatable group inside a `fixedCollection`, e.g. the `string`
/// values of a set node or the `parameters` of an HTTP header list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGroup {
    pub name: String,
    pub display_name: String,
    pub values: Vec<Property>,
}

/// Conditions under which a property is relevant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub show: IndexMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub hide: IndexMap<String, Vec<Value>>,
}

impl DisplayOptions {
    /// `show` needs every listed property's value in its allowed set; `hide`
    /// suppresses if any listed property matches.
    pub fn is_visible(&self, current: impl Fn(&str) -> Value) -> bool {
        let shown = self
            .show
            .iter()
            .all(|(name, allowed)| contains_loosely(allowed, &current(name)));
        let hidden = self
            .hide
            .iter()
            .any(|(name, values)| contains_loosely(values, &current(name)));
        shown && !hidden
    }
}

fn contains_loosely(values: &[Value], needle: &Value) -> bool {
    values.iter().any(|v| match (v, needle) {
        (Value::Number(_), Value::Number(_)) => to_number(v) == to_number(needle),
        _ => v == needle,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PropertyOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<CollectionGroup>,
    #[serde(default)]
    pub multiple_values: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
}

impl Property {
    fn base(name: &str, display_name: &str, kind: PropertyType, default: Value) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            kind,
            default,
            required: false,
            description: None,
            options: Vec::new(),
            groups: Vec::new(),
            multiple_values: false,
            display_options: None,
        }
    }

    pub fn string(name: &str, display_name: &str, default: &str) -> Self {
        Self::base(name, display_name, PropertyType::String, Value::from(default))
    }

    pub fn number(name: &str, display_name: &str, default: f64) -> Self {
        Self::base(
            name,
            display_name,
            PropertyType::Number,
            crate::value::number_value(default),
        )
    }

    pub fn boolean(name: &str, display_name: &str, default: bool) -> Self {
        Self::base(name, display_name, PropertyType::Boolean, Value::Bool(default))
    }

    pub fn json(name: &str, display_name: &str, default: &str) -> Self {
        Self::base(name, display_name, PropertyType::Json, Value::from(default))
    }

    pub fn color(name: &str, display_name: &str, default: &str) -> Self {
        Self::base(name, display_name, PropertyType::Color, Value::from(default))
    }

    /// Single choice among `(label, value)` pairs.
    pub fn options(name: &str, display_name: &str, default: &str, choices: &[(&str, &str)]) -> Self {
        let mut property = Self::base(name, display_name, PropertyType::Options, Value::from(default));
        property.options = to_options(choices);
        property
    }

    pub fn multi_options(name: &str, display_name: &str, choices: &[(&str, &str)]) -> Self {
        let mut property =
            Self::base(name, display_name, PropertyType::MultiOptions, Value::Array(Vec::new()));
        property.options = to_options(choices);
        property
    }

    pub fn fixed_collection(
        name: &str,
        display_name: &str,
        multiple_values: bool,
        groups: Vec<CollectionGroup>,
    ) -> Self {
        let mut property = Self::base(
            name,
            display_name,
            PropertyType::FixedCollection,
            Value::Object(Default::default()),
        );
        property.multiple_values = multiple_values;
        property.groups = groups;
        property
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Only show this property while `other` holds one of `values`.
    pub fn show_when(mut self, other: &str, values: &[Value]) -> Self {
        self.display_options
            .get_or_insert_with(DisplayOptions::default)
            .show
            .insert(other.to_string(), values.to_vec());
        self
    }

    /// Hide this property while `other` holds one of `values`.
    pub fn hide_when(mut self, other: &str, values: &[Value]) -> Self {
        self.display_options
            .get_or_insert_with(DisplayOptions::default)
            .hide
            .insert(other.to_string(), values.to_vec());
        self
    }

    pub fn is_visible(&self, current: impl Fn(&str) -> Value) -> bool {
        self.display_options
            .as_ref()
            .map_or(true, |options| options.is_visible(current))
    }

    pub fn group(&self, name: &str) -> Option<&CollectionGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

impl CollectionGroup {
    pub fn new(name: &str, display_name: &str, values: Vec<Property>) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            values,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.values.iter().find(|p| p.name == name)
    }
}

fn to_options(choices: &[(&str, &str)]) -> Vec<PropertyOption> {
    choices
        .iter()
        .map(|(name, value)| PropertyOption {
            name: name.to_string(),
            value: Value::from(*value),
        })
        .collect()
}

/// Everything the engine and editor need to know about a node type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group: String,
    pub input_count: u8,
    pub output_count: usize,
    pub output_names: Vec<String>,
    pub properties: Vec<Property>,
}

impl NodeDescriptor {
    /// A one-input, one-output node type.
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
            group: "transform".to_string(),
            input_count: 1,
            output_count: 1,
            output_names: vec![MAIN_OUTPUT.to_string()],
            properties: Vec::new(),
        }
    }

    /// Mark as a trigger: no inputs, the engine treats it as a graph root.
    pub fn trigger(mut self) -> Self {
        self.input_count = 0;
        self.group = "trigger".to_string();
        self
    }

    /// Declare named outputs, one per handle, in index order.
    pub fn with_outputs(mut self, names: &[&str]) -> Self {
        self.output_count = names.len();
        self.output_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.input_count == 0
    }

    /// Output index an edge handle refers to. No handle means output 0.
    pub fn output_index(&self, handle: Option<&str>) -> Option<usize> {
        match handle {
            None => Some(0),
            Some(handle) => self.output_names.iter().position(|n| n == handle),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Find the property addressed by a parameter path, descending through
    /// fixed collections: `values.string[0].value` names the `value`
    /// sub-property of the `string` group of `values`.
    pub fn property_at(&self, path: &[PathSegment]) -> Option<&Property> {
        let mut segments = path.iter().filter_map(|s| match s {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        });
        let mut property = self.property(segments.next()?)?;
        while let Some(group_name) = segments.next() {
            let group = property.group(group_name)?;
            property = group.property(segments.next()?)?;
        }
        Some(property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_path;
    use serde_json::json;

    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("demo", "Demo")
            .with_outputs(&["true", "false"])
            .with_property(Property::options("mode", "Mode", "a", &[("A", "a"), ("B", "b")]))
            .with_property(
                Property::string("onlyB", "Only B", "")
                    .required()
                    .show_when("mode", &[json!("b")]),
            )
            .with_property(Property::fixed_collection(
                "values",
                "Values",
                true,
                vec![CollectionGroup::new(
                    "string",
                    "String",
                    vec![Property::string("name", "Name", ""), Property::string("value", "Value", "")],
                )],
            ))
    }

    #[test]
    fn output_index_follows_handles() {
        let d = descriptor();
        assert_eq!(d.output_index(None), Some(0));
        assert_eq!(d.output_index(Some("false")), Some(1));
        assert_eq!(d.output_index(Some("output3")), None);
    }

    #[test]
    fn show_and_hide_predicates() {
        let d = descriptor();
        let only_b = d.property("onlyB").unwrap();
        assert!(!only_b.is_visible(|_| json!("a")));
        assert!(only_b.is_visible(|_| json!("b")));

        let hidden = Property::string("x", "X", "").hide_when("mode", &[json!("a"), json!("c")]);
        assert!(!hidden.is_visible(|_| json!("c")));
        assert!(hidden.is_visible(|_| json!("b")));
    }

    #[test]
    fn property_at_descends_into_groups() {
        let d = descriptor();
        let p = d.property_at(&parse_path("values.string[0].value")).unwrap();
        assert_eq!(p.name, "value");
        assert!(d.property_at(&parse_path("values.number[0].value")).is_none());
    }
}
