use async_trait::async_trait;
use base64::Engine;
use loomcore::value::{display_string, JsonObject, Value};
use loomcore::{
    CollectionGroup, HttpBody, HttpRequest, HttpResponse, HttpTransport, Item, NodeBehavior,
    NodeContext, NodeDescriptor, NodeError, NodeOutput, Property,
};
use serde_json::json;
use std::time::Duration;

/// HTTP request node. One request per input item; each response becomes an
/// item `{statusCode, headers, body}`.
pub struct HttpRequestNode;

impl HttpRequestNode {
    fn build_request(&self, ctx: &NodeContext, i: usize) -> Result<HttpRequest, NodeError> {
        let url = ctx.require_string("url", i)?;
        let method = ctx.get_string("method", i).to_uppercase();

        let mut headers = Vec::new();
        if ctx.get_bool("sendHeaders", i) {
            headers.extend(pairs(ctx, "headerParameters", i));
        }
        self.authenticate(ctx, i, &mut headers)?;

        let query = if ctx.get_bool("sendQuery", i) {
            pairs(ctx, "queryParameters", i)
        } else {
            Vec::new()
        };

        let body = if ctx.get_bool("sendBody", i) {
            self.body(ctx, i)?
        } else {
            HttpBody::None
        };

        let timeout = ctx.get_number("timeout", i);
        Ok(HttpRequest {
            method,
            url,
            query,
            headers,
            body,
            timeout_ms: if timeout > 0.0 { timeout as u64 } else { 0 },
        })
    }

    fn authenticate(
        &self,
        ctx: &NodeContext,
        i: usize,
        headers: &mut Vec<(String, String)>,
    ) -> Result<(), NodeError> {
        let credentials = ctx.services.credentials.as_ref();
        let field = |fields: &JsonObject, name: &str| {
            fields.get(name).map(display_string).unwrap_or_default()
        };

        match ctx.get_string("authentication", i).as_str() {
            "none" | "" => {}
            "basicAuth" => {
                let fields = credentials.lookup("httpBasicAuth");
                let raw = format!("{}:{}", field(&fields, "user"), field(&fields, "password"));
                let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
                headers.push(("Authorization".to_string(), format!("Basic {}", encoded)));
            }
            "headerAuth" => {
                let fields = credentials.lookup("httpHeaderAuth");
                let name = field(&fields, "name");
                if !name.is_empty() {
                    headers.push((name, field(&fields, "value")));
                }
            }
            "bearerAuth" => {
                let fields = credentials.lookup("httpBearerAuth");
                headers.push((
                    "Authorization".to_string(),
                    format!("Bearer {}", field(&fields, "token")),
                ));
            }
            other => {
                return Err(NodeError::InvalidParameter {
                    parameter: "authentication".to_string(),
                    reason: format!("unsupported authentication '{}'", other),
                })
            }
        }
        Ok(())
    }

    fn body(&self, ctx: &NodeContext, i: usize) -> Result<HttpBody, NodeError> {
        match ctx.get_string("contentType", i).as_str() {
            "json" => {
                if ctx.get_string("specifyBody", i) == "json" {
                    let body = match ctx.parameter("jsonBody", i) {
                        Value::String(text) => serde_json::from_str(&text).map_err(|e| {
                            NodeError::InvalidParameter {
                                parameter: "jsonBody".to_string(),
                                reason: e.to_string(),
                            }
                        })?,
                        other => other,
                    };
                    Ok(HttpBody::Json(body))
                } else {
                    let mut object = JsonObject::new();
                    for entry in ctx.collection("bodyParameters", "parameters", i) {
                        let name = entry.get("name").map(display_string).unwrap_or_default();
                        if name.is_empty() {
                            continue;
                        }
                        object.insert(name, entry.get("value").cloned().unwrap_or(Value::Null));
                    }
                    Ok(HttpBody::Json(Value::Object(object)))
                }
            }
            "form-urlencoded" => Ok(HttpBody::Form(pairs(ctx, "bodyParameters", i))),
            "raw" => Ok(HttpBody::Raw {
                content_type: ctx.get_string("rawContentType", i),
                text: ctx.get_string("body", i),
            }),
            other => Err(NodeError::InvalidParameter {
                parameter: "contentType".to_string(),
                reason: format!("unsupported content type '{}'", other),
            }),
        }
    }
}

/// Name/value pairs of a `{parameters: [{name, value}]}` collection. Entries
/// without a name are skipped.
fn pairs(ctx: &NodeContext, collection: &str, i: usize) -> Vec<(String, String)> {
    ctx.collection(collection, "parameters", i)
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name").map(display_string).unwrap_or_default();
            if name.is_empty() {
                return None;
            }
            let value = entry.get("value").map(display_string).unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

fn name_value_collection(name: &str, display_name: &str) -> Property {
    Property::fixed_collection(
        name,
        display_name,
        true,
        vec![CollectionGroup::new(
            "parameters",
            "Parameter",
            vec![
                Property::string("name", "Name", ""),
                Property::string("value", "Value", ""),
            ],
        )],
    )
}

#[async_trait]
impl NodeBehavior for HttpRequestNode {
    fn describe(&self) -> NodeDescriptor {
        let on = [Value::Bool(true)];
        NodeDescriptor::new("httpRequest", "HTTP Request")
            .with_description("Makes an HTTP request and returns the response")
            .with_group("network")
            .with_property(Property::options(
                "method",
                "Method",
                "GET",
                &[
                    ("DELETE", "DELETE"),
                    ("GET", "GET"),
                    ("HEAD", "HEAD"),
                    ("PATCH", "PATCH"),
                    ("POST", "POST"),
                    ("PUT", "PUT"),
                ],
            ))
            .with_property(Property::string("url", "URL", "").required())
            .with_property(Property::options(
                "authentication",
                "Authentication",
                "none",
                &[
                    ("None", "none"),
                    ("Basic Auth", "basicAuth"),
                    ("Header Auth", "headerAuth"),
                    ("Bearer Token", "bearerAuth"),
                ],
            ))
            .with_property(Property::boolean("sendQuery", "Send Query Parameters", false))
            .with_property(
                name_value_collection("queryParameters", "Query Parameters")
                    .show_when("sendQuery", &on),
            )
            .with_property(Property::boolean("sendHeaders", "Send Headers", false))
            .with_property(
                name_value_collection("headerParameters", "Header Parameters")
                    .show_when("sendHeaders", &on),
            )
            .with_property(Property::boolean("sendBody", "Send Body", false))
            .with_property(
                Property::options(
                    "contentType",
                    "Body Content Type",
                    "json",
                    &[
                        ("JSON", "json"),
                        ("Form Urlencoded", "form-urlencoded"),
                        ("Raw", "raw"),
                    ],
                )
                .show_when("sendBody", &on),
            )
            .with_property(
                Property::options(
                    "specifyBody",
                    "Specify Body",
                    "keypair",
                    &[("Using Fields Below", "keypair"), ("Using JSON", "json")],
                )
                .show_when("contentType", &[Value::from("json")]),
            )
            .with_property(
                name_value_collection("bodyParameters", "Body Parameters")
                    .show_when("sendBody", &on),
            )
            .with_property(
                Property::json("jsonBody", "JSON", "{}").show_when("specifyBody", &[Value::from("json")]),
            )
            .with_property(
                Property::string("rawContentType", "Content Type", "text/plain")
                    .show_when("contentType", &[Value::from("raw")]),
            )
            .with_property(
                Property::string("body", "Body", "").show_when("contentType", &[Value::from("raw")]),
            )
            .with_property(
                Property::number("timeout", "Timeout", 10000.0)
                    .describe("Milliseconds to wait for a response"),
            )
            .with_property(
                Property::boolean("neverError", "Never Error", false)
                    .describe("Succeed even when the response status is 4xx or 5xx"),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut results = Vec::with_capacity(ctx.items.len());

        for i in 0..ctx.items.len() {
            if ctx.cancellation.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            let request = self.build_request(&ctx, i)?;
            ctx.events.info(format!("{} {}", request.method, request.url));

            let response = ctx.services.http.send(request).await?;
            ctx.events.info(format!("Response status: {}", response.status));

            if response.status >= 400 && !ctx.get_bool("neverError", i) {
                return Err(NodeError::ExecutionFailed(format!(
                    "request failed with status {}",
                    response.status
                )));
            }

            let json = json!({
                "statusCode": response.status,
                "headers": response.headers,
                "body": response.body,
            });
            results.push(Item::from_value(json, i));
        }

        Ok(NodeOutput::single(results))
    }
}

/// Live transport backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            NodeError::InvalidParameter {
                parameter: "method".to_string(),
                reason: format!("unsupported method '{}'", request.method),
            }
        })?;

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(request.timeout_ms));
        }
        builder = match request.body {
            HttpBody::None => builder,
            HttpBody::Json(body) => builder.json(&body),
            HttpBody::Form(fields) => builder.form(&fields),
            HttpBody::Raw { content_type, text } => builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(text),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| NodeError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers: JsonObject = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(v.to_str().unwrap_or(""))))
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| NodeError::Transport(format!("Failed to read response: {}", e)))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
