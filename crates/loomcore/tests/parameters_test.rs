// crates/loomcore/tests/parameters_test.rs

use loomcore::expression::Scope;
use loomcore::{
    CollectionGroup, Item, NodeContext, NodeDescriptor, NodeError, NodeParameters, Property,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn descriptor() -> Arc<NodeDescriptor> {
    Arc::new(
        NodeDescriptor::new("demo", "Demo")
            .with_property(Property::string("url", "URL", "").required())
            .with_property(Property::number("limit", "Limit", 10.0))
            .with_property(Property::boolean("enabled", "Enabled", false))
            .with_property(Property::options(
                "method",
                "Method",
                "GET",
                &[("GET", "GET"), ("POST", "POST")],
            ))
            .with_property(
                Property::string("body", "Body", "")
                    .required()
                    .show_when("method", &[json!("POST")]),
            )
            .with_property(Property::fixed_collection(
                "headers",
                "Headers",
                true,
                vec![CollectionGroup::new(
                    "parameters",
                    "Header",
                    vec![
                        Property::string("name", "Name", ""),
                        Property::string("value", "Value", "default-value"),
                        Property::boolean("sensitive", "Sensitive", false),
                    ],
                )],
            )),
    )
}

fn compile(data: Value) -> NodeParameters {
    NodeParameters::compile(descriptor(), data.as_object().unwrap())
}

fn items() -> Vec<Item> {
    vec![
        Item::from_value(json!({"user": {"name": "ada", "limit": "7"}}), 0),
        Item::from_value(json!({"user": {"name": "grace"}}), 1),
    ]
}

#[test]
fn missing_value_uses_declared_default() {
    let params = compile(json!({}));
    assert_eq!(params.resolve("limit", &Scope::empty(), Value::Null), json!(10));
    assert_eq!(params.resolve("method", &Scope::empty(), Value::Null), json!("GET"));
}

#[test]
fn undeclared_missing_value_uses_fallback() {
    let params = compile(json!({}));
    assert_eq!(params.resolve("nope", &Scope::empty(), json!("fb")), json!("fb"));
}

#[test]
fn literals_are_returned_verbatim_for_every_item() {
    let params = Arc::new(compile(json!({"url": "https://example.com", "extra": {"a": [1, 2]}})));
    let ctx = NodeContext::new("n", params, items());
    assert_eq!(ctx.parameter("url", 0), json!("https://example.com"));
    assert_eq!(ctx.parameter("url", 1), json!("https://example.com"));
    assert_eq!(ctx.parameter("extra", 1), json!({"a": [1, 2]}));
}

#[test]
fn expressions_resolve_per_item() {
    init_tracing();
    let params = Arc::new(compile(json!({"url": "https://x/{{ $json.user.name }}"})));
    let ctx = NodeContext::new("n", params, items());
    assert_eq!(ctx.get_string("url", 0), "https://x/ada");
    assert_eq!(ctx.get_string("url", 1), "https://x/grace");
}

#[test]
fn missing_expression_field_is_null_not_error() {
    init_tracing();
    let params = Arc::new(compile(json!({"extra": "{{ $json.user.address.city }}"})));
    let ctx = NodeContext::new("n", params, items());
    assert_eq!(ctx.parameter("extra", 0), Value::Null);
}

#[test]
fn declared_numbers_and_booleans_are_coerced() {
    let params = Arc::new(compile(json!({
        "limit": "{{ $json.user.limit }}",
        "enabled": "true"
    })));
    let ctx = NodeContext::new("n", params, items());
    assert_eq!(ctx.parameter("limit", 0), json!(7));
    // Missing on item 1 resolves to null, which stays null.
    assert_eq!(ctx.parameter("limit", 1), Value::Null);
    assert_eq!(ctx.parameter("enabled", 0), json!(true));

    let params = Arc::new(compile(json!({"limit": "lots", "enabled": "maybe"})));
    let ctx = NodeContext::new("n", params, items());
    assert_eq!(ctx.parameter("limit", 0), json!(0));
    assert_eq!(ctx.parameter("enabled", 0), json!(false));
}

#[test]
fn fixed_collection_groups_resolve_independently() {
    let params = Arc::new(compile(json!({
        "headers": {
            "parameters": [
                {"name": "X-User", "value": "{{ $json.user.name }}"},
                {"name": "X-Static", "sensitive": "1"}
            ]
        }
    })));
    let ctx = NodeContext::new("n", params, items());

    let groups = ctx.collection("headers", "parameters", 1);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["value"], json!("grace"));
    assert_eq!(groups[0]["sensitive"], json!(false));
    assert_eq!(groups[1]["value"], json!("default-value"));
    assert_eq!(groups[1]["sensitive"], json!(true));

    assert_eq!(ctx.parameter("headers.parameters[0].name", 0), json!("X-User"));
    assert_eq!(ctx.parameter("headers.parameters[1].value", 0), json!("default-value"));
}

#[test]
fn hidden_required_property_is_not_required() {
    let params = compile(json!({"url": "https://example.com"}));
    assert!(params.validate_required().is_ok());

    let params = compile(json!({"url": "https://example.com", "method": "POST"}));
    assert_eq!(
        params.validate_required(),
        Err(NodeError::MissingRequiredParameter {
            parameter: "body".to_string()
        })
    );
}

#[test]
fn hidden_property_still_resolves_when_queried() {
    let params = compile(json!({"url": "u", "body": "stored"}));
    let body = params.descriptor().property("body").unwrap();
    assert!(!params.is_visible(body));
    assert_eq!(params.resolve("body", &Scope::empty(), Value::Null), json!("stored"));
}

#[test]
fn blank_required_value_is_missing() {
    let params = compile(json!({"url": ""}));
    assert!(matches!(
        params.validate_required(),
        Err(NodeError::MissingRequiredParameter { .. })
    ));
    let params = compile(json!({"url": "{{ $json.anything }}"}));
    assert!(params.validate_required().is_ok());
}

#[test]
fn unknown_expression_roots_stay_literal_text() {
    init_tracing();
    let params = Arc::new(compile(json!({"url": "https://x/{{ $node.Other.json.id }}"})));
    let ctx = NodeContext::new("n", params, items());
    assert_eq!(ctx.get_string("url", 0), "https://x/{{ $node.Other.json.id }}");
}
