// crates/loomnodes/tests/nodes_test.rs

use async_trait::async_trait;
use loomcore::{
    HttpBody, HttpRequest, HttpResponse, HttpTransport, Item, JsonObject, NoCredentials,
    NodeBehavior, NodeContext, NodeError, NodeParameters, Services, StaticCredentials, Value,
};
use loomnodes::{
    DateTimeNode, FilterNode, HttpRequestNode, IfNode, RemoveDuplicatesNode, SetNode,
    SplitOutNode, SwitchNode, TriggerKind, TriggerNode, WaitNode, WAIT_KEY,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn context(behavior: &dyn NodeBehavior, params: Value, items: Vec<Item>) -> NodeContext {
    let descriptor = Arc::new(behavior.describe());
    let data = params.as_object().cloned().unwrap_or_default();
    let parameters = Arc::new(NodeParameters::compile(descriptor, &data));
    NodeContext::new("node", parameters, items)
}

fn items(values: Value) -> Vec<Item> {
    values
        .as_array()
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, v)| Item::from_value(v.clone(), i))
        .collect()
}

fn payloads(items: &[Item]) -> Vec<Value> {
    items.iter().map(|i| Value::Object(i.json.clone())).collect()
}

async fn run(behavior: &dyn NodeBehavior, params: Value, input: Value) -> Result<Vec<Vec<Item>>, NodeError> {
    let ctx = context(behavior, params, items(input));
    behavior.execute(ctx).await.map(|o| o.outputs)
}

// --- set ---

#[tokio::test]
async fn set_keep_only_set_replaces_payload() {
    let out = run(
        &SetNode,
        json!({
            "keepOnlySet": true,
            "values": {"string": [{"name": "x", "value": "hello"}]}
        }),
        json!([{"a": 1, "b": 2}]),
    )
    .await
    .unwrap();

    assert_eq!(payloads(&out[0]), vec![json!({"x": "hello"})]);
    assert_eq!(out[0][0].paired(), 0);
}

#[tokio::test]
async fn set_merges_typed_values_with_dot_notation() {
    let out = run(
        &SetNode,
        json!({
            "values": {
                "number": [{"name": "total", "value": "42"}],
                "boolean": [{"name": "meta.active", "value": "true"}],
                "string": [{"name": "greeting", "value": "Hi {{ $json.name }}"}],
                "array": [{"name": "tags", "value": "[\"a\", \"b\"]"}]
            }
        }),
        json!([{"name": "Ada"}, {"name": "Lin"}]),
    )
    .await
    .unwrap();

    assert_eq!(
        payloads(&out[0]),
        vec![
            json!({"name": "Ada", "total": 42, "meta": {"active": true}, "greeting": "Hi Ada", "tags": ["a", "b"]}),
            json!({"name": "Lin", "total": 42, "meta": {"active": true}, "greeting": "Hi Lin", "tags": ["a", "b"]}),
        ]
    );
}

#[tokio::test]
async fn set_writes_bracketed_paths_into_arrays() {
    let out = run(
        &SetNode,
        json!({
            "values": {"string": [
                {"name": "tags[0]", "value": "first"},
                {"name": "meta[\"x.y\"]", "value": "dotted"}
            ]}
        }),
        json!([{"tags": ["old", "kept"]}]),
    )
    .await
    .unwrap();

    assert_eq!(
        payloads(&out[0]),
        vec![json!({"tags": ["first", "kept"], "meta": {"x.y": "dotted"}})]
    );
    assert_eq!(out[0][0].get("tags[0]"), Some(&json!("first")));
}

#[tokio::test]
async fn set_without_dot_notation_writes_literal_keys() {
    let out = run(
        &SetNode,
        json!({
            "dotNotation": false,
            "values": {"string": [{"name": "a.b", "value": "v"}]}
        }),
        json!([{}]),
    )
    .await
    .unwrap();
    assert_eq!(payloads(&out[0]), vec![json!({"a.b": "v"})]);
}

#[tokio::test]
async fn set_conversion_errors_fail_unless_ignored() {
    let params = |ignore: bool| {
        json!({
            "ignoreConversionErrors": ignore,
            "values": {
                "object": [{"name": "config", "value": "{not json"}],
                "string": [{"name": "ok", "value": "yes"}]
            }
        })
    };

    let err = run(&SetNode, params(false), json!([{}])).await.unwrap_err();
    assert!(matches!(err, NodeError::Conversion { ref field, .. } if field == "config"));

    let out = run(&SetNode, params(true), json!([{}])).await.unwrap();
    assert_eq!(payloads(&out[0]), vec![json!({"ok": "yes"})]);
}

// --- if / filter / switch ---

fn adult_condition() -> Value {
    json!({"condition": [{"leftValue": "={{ $json.age }}", "operator": "gte", "rightValue": "18"}]})
}

#[tokio::test]
async fn if_partitions_items() {
    let out = run(
        &IfNode,
        json!({"conditions": adult_condition()}),
        json!([{"age": 30}, {"age": 12}, {"age": "18"}, {"age": "unknown"}]),
    )
    .await
    .unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(payloads(&out[0]), vec![json!({"age": 30}), json!({"age": "18"})]);
    assert_eq!(payloads(&out[1]), vec![json!({"age": 12}), json!({"age": "unknown"})]);
    assert_eq!(out[0][1].paired(), 2);
}

#[tokio::test]
async fn if_without_conditions_routes_everything_true() {
    let out = run(&IfNode, json!({}), json!([{"a": 1}, {"a": 2}])).await.unwrap();
    assert_eq!(out[0].len(), 2);
    assert!(out[1].is_empty());
}

#[tokio::test]
async fn if_any_combinator() {
    let out = run(
        &IfNode,
        json!({
            "combinator": "any",
            "conditions": {"condition": [
                {"leftValue": "{{ $json.role }}", "operator": "equals", "rightValue": "admin"},
                {"leftValue": "{{ $json.role }}", "operator": "equals", "rightValue": "owner"}
            ]}
        }),
        json!([{"role": "admin"}, {"role": "guest"}, {"role": "owner"}]),
    )
    .await
    .unwrap();
    assert_eq!(out[0].len(), 2);
    assert_eq!(out[1].len(), 1);
}

#[tokio::test]
async fn filter_drops_non_matching_items() {
    let out = run(
        &FilterNode,
        json!({"conditions": adult_condition()}),
        json!([{"age": 30}, {"age": 12}, {"age": 45}]),
    )
    .await
    .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(payloads(&out[0]), vec![json!({"age": 30}), json!({"age": 45})]);
}

#[tokio::test]
async fn filter_case_insensitive() {
    let out = run(
        &FilterNode,
        json!({
            "caseSensitive": false,
            "conditions": {"condition": [{"leftValue": "{{ $json.name }}", "operator": "startsWith", "rightValue": "al"}]}
        }),
        json!([{"name": "Alice"}, {"name": "bob"}]),
    )
    .await
    .unwrap();
    assert_eq!(payloads(&out[0]), vec![json!({"name": "Alice"})]);
}

fn status_rules() -> Value {
    json!({"rule": [
        {"operator": "equals", "value": "new", "output": 0},
        {"operator": "equals", "value": "done", "output": 2}
    ]})
}

#[tokio::test]
async fn switch_routes_by_rule_and_fallback() {
    let out = run(
        &SwitchNode,
        json!({"dataField": "status", "rules": status_rules()}),
        json!([{"status": "new"}, {"status": "done"}, {"status": "other"}, {}]),
    )
    .await
    .unwrap();

    assert_eq!(out.len(), 4);
    assert_eq!(payloads(&out[0]), vec![json!({"status": "new"})]);
    assert!(out[1].is_empty());
    assert_eq!(payloads(&out[2]), vec![json!({"status": "done"})]);
    assert_eq!(out[3].len(), 2);
    let total: usize = out.iter().map(Vec::len).sum();
    assert_eq!(total, 4);
}

#[tokio::test]
async fn switch_fallback_is_clamped() {
    for (fallback, expected) in [(json!(9), 3), (json!(-1), 0), (json!("1"), 1)] {
        let out = run(
            &SwitchNode,
            json!({"dataField": "status", "rules": status_rules(), "fallbackOutput": fallback}),
            json!([{"status": "other"}]),
        )
        .await
        .unwrap();
        assert_eq!(out[expected].len(), 1, "fallback {}", fallback);
    }
}

// --- splitOut ---

#[tokio::test]
async fn split_out_scalars() {
    let out = run(
        &SplitOutNode,
        json!({"fieldToSplitOut": "items"}),
        json!([{"items": [1, 2, 3], "other": true}]),
    )
    .await
    .unwrap();

    assert_eq!(
        payloads(&out[0]),
        vec![
            json!({"items": 1, "_splitIndex": 0, "_splitTotal": 3}),
            json!({"items": 2, "_splitIndex": 1, "_splitTotal": 3}),
            json!({"items": 3, "_splitIndex": 2, "_splitTotal": 3}),
        ]
    );
    let paired: Vec<usize> = out[0].iter().map(Item::paired).collect();
    assert_eq!(paired, vec![0, 1, 2]);
}

#[tokio::test]
async fn split_out_objects_and_other_fields() {
    let out = run(
        &SplitOutNode,
        json!({"fieldToSplitOut": "lines", "include": "allOtherFields"}),
        json!([{"order": 7, "lines": [{"sku": "a"}, {"sku": "b"}]}]),
    )
    .await
    .unwrap();

    assert_eq!(
        payloads(&out[0]),
        vec![
            json!({"order": 7, "sku": "a", "_splitIndex": 0, "_splitTotal": 2}),
            json!({"order": 7, "sku": "b", "_splitIndex": 1, "_splitTotal": 2}),
        ]
    );
}

#[tokio::test]
async fn split_out_nested_field_leaves_the_rest_of_its_parent() {
    let out = run(
        &SplitOutNode,
        json!({"fieldToSplitOut": "order.lines", "include": "allOtherFields"}),
        json!([{"id": 1, "order": {"ref": "r", "lines": [1, 2]}}]),
    )
    .await
    .unwrap();

    assert_eq!(
        payloads(&out[0]),
        vec![
            json!({"id": 1, "order": {"ref": "r"}, "lines": 1, "_splitIndex": 0, "_splitTotal": 2}),
            json!({"id": 1, "order": {"ref": "r"}, "lines": 2, "_splitIndex": 1, "_splitTotal": 2}),
        ]
    );
    assert!(out[0].iter().all(|i| i.get("order.lines").is_none()));
}

#[tokio::test]
async fn split_out_destination_and_passthrough() {
    let out = run(
        &SplitOutNode,
        json!({"fieldToSplitOut": "tags", "destinationFieldName": "tag"}),
        json!([{"tags": ["x", "y"]}, {"tags": "not a list"}]),
    )
    .await
    .unwrap();

    assert_eq!(
        payloads(&out[0]),
        vec![
            json!({"tag": "x", "_splitIndex": 0, "_splitTotal": 2}),
            json!({"tag": "y", "_splitIndex": 1, "_splitTotal": 2}),
            json!({"tags": "not a list"}),
        ]
    );
    assert_eq!(out[0][2].paired(), 2);
}

// --- removeDuplicates ---

#[tokio::test]
async fn remove_duplicates_ignores_key_order() {
    let out = run(
        &RemoveDuplicatesNode,
        json!({}),
        json!([{"a": 1, "b": 2}, {"b": 2, "a": 1}, {"a": 2}]),
    )
    .await
    .unwrap();
    assert_eq!(payloads(&out[0]), vec![json!({"a": 1, "b": 2}), json!({"a": 2})]);
}

#[tokio::test]
async fn remove_duplicates_selected_fields_keep_last() {
    let out = run(
        &RemoveDuplicatesNode,
        json!({"compare": "selectedFields", "fieldsToCompare": "id", "keep": "last"}),
        json!([{"id": 1, "v": "A"}, {"id": 2, "v": "B"}, {"id": 1, "v": "A2"}]),
    )
    .await
    .unwrap();

    assert_eq!(
        payloads(&out[0]),
        vec![json!({"id": 2, "v": "B"}), json!({"id": 1, "v": "A2"})]
    );
    let paired: Vec<usize> = out[0].iter().map(Item::paired).collect();
    assert_eq!(paired, vec![0, 1]);
}

#[tokio::test]
async fn remove_duplicates_case_insensitive() {
    let out = run(
        &RemoveDuplicatesNode,
        json!({"compare": "selectedFields", "fieldsToCompare": "email", "caseSensitive": false}),
        json!([{"email": "A@x.io"}, {"email": "a@X.io"}]),
    )
    .await
    .unwrap();
    assert_eq!(payloads(&out[0]), vec![json!({"email": "A@x.io"})]);
}

#[tokio::test]
async fn remove_duplicates_case_insensitive_keeps_field_names_distinct() {
    let out = run(
        &RemoveDuplicatesNode,
        json!({"caseSensitive": false}),
        json!([{"Name": "x"}, {"name": "x"}, {"name": "X"}]),
    )
    .await
    .unwrap();
    assert_eq!(payloads(&out[0]), vec![json!({"Name": "x"}), json!({"name": "x"})]);
}

// --- dateTime ---

#[tokio::test]
async fn date_time_format_and_arithmetic() {
    let input = json!([{"created": "2024-01-31T12:00:00Z"}]);

    let out = run(
        &DateTimeNode,
        json!({"operation": "formatDate", "field": "created", "format": "%d.%m.%Y"}),
        input.clone(),
    )
    .await
    .unwrap();
    assert_eq!(out[0][0].get("formattedDate"), Some(&json!("31.01.2024")));
    assert_eq!(out[0][0].get("created"), Some(&json!("2024-01-31T12:00:00Z")));

    let out = run(
        &DateTimeNode,
        json!({"operation": "addToDate", "field": "created", "duration": 1, "unit": "months", "outputFieldName": "due"}),
        input.clone(),
    )
    .await
    .unwrap();
    assert_eq!(out[0][0].get("due"), Some(&json!("2024-02-29T12:00:00+00:00")));

    let out = run(
        &DateTimeNode,
        json!({"operation": "subtractFromDate", "field": "created", "duration": 2, "unit": "hours", "includeInputFields": false}),
        input,
    )
    .await
    .unwrap();
    assert_eq!(payloads(&out[0]), vec![json!({"newDate": "2024-01-31T10:00:00+00:00"})]);
}

#[tokio::test]
async fn date_time_invalid_date_fails() {
    let err = run(
        &DateTimeNode,
        json!({"operation": "formatDate", "field": "created"}),
        json!([{"created": "sometime"}]),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err,
        NodeError::InvalidDate {
            field: "created".into(),
            value: "sometime".into()
        }
    );
}

#[tokio::test]
async fn date_time_current_date() {
    let out = run(&DateTimeNode, json!({}), json!([{"a": 1}])).await.unwrap();
    let current = out[0][0].get("currentDate").and_then(Value::as_str).unwrap();
    assert!(loomnodes::parse_date(&json!(current)).is_some());
}

// --- wait ---

#[tokio::test(start_paused = true)]
async fn wait_sleeps_then_passes_items_through() {
    let start = tokio::time::Instant::now();
    let out = run(
        &WaitNode,
        json!({"amount": 2, "unit": "minutes"}),
        json!([{"a": 1}, {"a": 2}]),
    )
    .await
    .unwrap();

    assert!(start.elapsed() >= std::time::Duration::from_secs(120));
    assert_eq!(payloads(&out[0]), vec![json!({"a": 1}), json!({"a": 2})]);
}

#[tokio::test(start_paused = true)]
async fn wait_is_cancellable() {
    let ctx = context(&WaitNode, json!({"amount": 1, "unit": "hours"}), items(json!([{}])));
    let token = ctx.cancellation.clone();
    let handle = tokio::spawn(async move { WaitNode.execute(ctx).await });
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    token.cancel();
    let result = handle.await.unwrap();
    assert_eq!(result.unwrap_err(), NodeError::Cancelled);
}

#[tokio::test]
async fn wait_webhook_marks_items_pending() {
    let out = run(
        &WaitNode,
        json!({"resume": "webhook", "webhookSuffix": "approve"}),
        json!([{"a": 1}, {"a": 2}]),
    )
    .await
    .unwrap();

    let first = out[0][0].get(WAIT_KEY).unwrap();
    let second = out[0][1].get(WAIT_KEY).unwrap();
    assert_eq!(first["status"], json!("pending"));
    assert_eq!(first["webhookSuffix"], json!("approve"));
    assert!(!first["resumeToken"].as_str().unwrap().is_empty());
    assert_eq!(first["resumeToken"], second["resumeToken"]);
    assert_eq!(out[0][1].get("a"), Some(&json!(2)));
}

// --- triggers ---

#[tokio::test]
async fn manual_trigger_emits_payload_with_metadata() {
    let node = TriggerNode::new(TriggerKind::Manual);
    let ctx = context(&node, json!({"payload": "{\"user\": \"ada\"}"}), vec![Item::seed()]);
    let out = node.execute(ctx).await.unwrap();

    assert_eq!(out.outputs.len(), 1);
    let item = &out.outputs[0][0];
    assert_eq!(item.get("user"), Some(&json!("ada")));
    assert_eq!(item.get("trigger"), Some(&json!("manualTrigger")));
    assert!(item.get("timestamp").is_some());
}

#[tokio::test]
async fn webhook_trigger_defaults_and_invalid_payload() {
    let node = TriggerNode::new(TriggerKind::Webhook);
    let ctx = context(&node, json!({}), vec![Item::seed()]);
    let out = node.execute(ctx).await.unwrap();
    let item = &out.outputs[0][0];
    assert_eq!(item.get("body"), Some(&json!({})));
    assert_eq!(item.get("webhook.path"), Some(&json!("webhook")));

    let ctx = context(&node, json!({"payload": "{broken"}), vec![Item::seed()]);
    let out = node.execute(ctx).await.unwrap();
    assert_eq!(out.outputs[0][0].get("query"), Some(&json!({})));
}

#[test]
fn every_trigger_kind_is_a_trigger() {
    for kind in TriggerKind::ALL {
        let descriptor = TriggerNode::new(kind).describe();
        assert!(descriptor.is_trigger(), "{}", descriptor.name);
        assert_eq!(descriptor.name, kind.type_name());
    }
}

// --- httpRequest ---

struct RecordingTransport {
    status: u16,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        let mut headers = JsonObject::new();
        headers.insert("content-type".into(), json!("application/json"));
        Ok(HttpResponse {
            status: self.status,
            headers,
            body: json!({"url": url}),
        })
    }
}

fn http_context(params: Value, input: Value, transport: Arc<RecordingTransport>) -> NodeContext {
    let credentials = StaticCredentials::new().with(
        "httpBasicAuth",
        json!({"user": "user", "password": "pass"}).as_object().cloned().unwrap(),
    );
    context(&HttpRequestNode, params, items(input))
        .with_services(Services::new(transport, Arc::new(credentials)))
}

#[tokio::test]
async fn http_request_per_item_with_query_headers_and_auth() {
    let transport = RecordingTransport::new(200);
    let ctx = http_context(
        json!({
            "method": "POST",
            "url": "https://api.test/users/{{ $json.id }}",
            "authentication": "basicAuth",
            "sendQuery": true,
            "queryParameters": {"parameters": [{"name": "verbose", "value": "1"}]},
            "sendHeaders": true,
            "headerParameters": {"parameters": [{"name": "X-Trace", "value": "{{ $json.id }}"}]},
            "sendBody": true,
            "bodyParameters": {"parameters": [{"name": "name", "value": "{{ $json.name }}"}]}
        }),
        json!([{"id": 1, "name": "Ada"}, {"id": 2, "name": "Lin"}]),
        transport.clone(),
    );

    let out = HttpRequestNode.execute(ctx).await.unwrap();
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);

    let first = &requests[0];
    assert_eq!(first.method, "POST");
    assert_eq!(first.url, "https://api.test/users/1");
    assert_eq!(first.query, vec![("verbose".to_string(), "1".to_string())]);
    assert!(first.headers.contains(&("X-Trace".to_string(), "1".to_string())));
    assert!(first
        .headers
        .contains(&("Authorization".to_string(), "Basic dXNlcjpwYXNz".to_string())));
    assert_eq!(first.body, HttpBody::Json(json!({"name": "Ada"})));
    assert_eq!(first.timeout_ms, 10000);

    assert_eq!(
        payloads(&out.outputs[0])[1],
        json!({
            "statusCode": 200,
            "headers": {"content-type": "application/json"},
            "body": {"url": "https://api.test/users/2"}
        })
    );
    assert_eq!(out.outputs[0][1].paired(), 1);
}

#[tokio::test]
async fn http_request_json_and_raw_bodies() {
    let transport = RecordingTransport::new(200);
    let ctx = http_context(
        json!({
            "method": "PUT",
            "url": "https://api.test",
            "sendBody": true,
            "specifyBody": "json",
            "jsonBody": "{\"ids\": [1, 2]}"
        }),
        json!([{}]),
        transport.clone(),
    );
    HttpRequestNode.execute(ctx).await.unwrap();
    assert_eq!(transport.requests()[0].body, HttpBody::Json(json!({"ids": [1, 2]})));

    let transport = RecordingTransport::new(200);
    let ctx = http_context(
        json!({
            "url": "https://api.test",
            "sendBody": true,
            "contentType": "raw",
            "rawContentType": "text/csv",
            "body": "a,b"
        }),
        json!([{}]),
        transport.clone(),
    );
    HttpRequestNode.execute(ctx).await.unwrap();
    assert_eq!(
        transport.requests()[0].body,
        HttpBody::Raw {
            content_type: "text/csv".into(),
            text: "a,b".into()
        }
    );
}

#[tokio::test]
async fn http_request_error_status() {
    let params = |never_error: bool| json!({"url": "https://api.test", "neverError": never_error});

    let ctx = http_context(params(false), json!([{}]), RecordingTransport::new(503));
    let err = HttpRequestNode.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::ExecutionFailed(_)));

    let ctx = http_context(params(true), json!([{}]), RecordingTransport::new(503));
    let out = HttpRequestNode.execute(ctx).await.unwrap();
    assert_eq!(out.outputs[0][0].get("statusCode"), Some(&json!(503)));
}

#[tokio::test]
async fn http_request_simulated_transport_echoes_request() {
    let ctx = context(
        &HttpRequestNode,
        json!({"url": "https://example.test/ping"}),
        items(json!([{}])),
    )
    .with_services(Services::default());
    let out = HttpRequestNode.execute(ctx).await.unwrap();
    let item = &out.outputs[0][0];
    assert_eq!(item.get("statusCode"), Some(&json!(200)));
    assert_eq!(item.get("body.url"), Some(&json!("https://example.test/ping")));
    assert_eq!(item.get("body.method"), Some(&json!("GET")));
}

#[tokio::test]
async fn http_request_unknown_credentials_are_empty() {
    let transport = RecordingTransport::new(200);
    let ctx = context(
        &HttpRequestNode,
        json!({"url": "https://api.test", "authentication": "bearerAuth"}),
        items(json!([{}])),
    )
    .with_services(Services::new(transport.clone(), Arc::new(NoCredentials)));
    HttpRequestNode.execute(ctx).await.unwrap();
    assert!(transport.requests()[0]
        .headers
        .contains(&("Authorization".to_string(), "Bearer ".to_string())));
}
