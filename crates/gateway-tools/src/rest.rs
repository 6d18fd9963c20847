//! REST Provider
//!
//! Wraps an HTTP API as a tool provider from a declarative endpoint list.
//! Each tool maps to one request: parameters are placed into the path,
//! the query string or the JSON body, and an optional dotted path picks
//! a sub-tree out of the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value, json};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, ToolProvider, ToolSpec};

use crate::error::{Result, ToolKitError};

/// Per-request budget for upstream calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a parameter goes in the outgoing request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    #[default]
    Query,
    Body,
}

/// One tool backed by one HTTP request
#[derive(Clone, Debug)]
pub struct RestEndpoint {
    pub name: String,
    pub description: String,
    pub method: Method,
    pub path: String,
    pub params: Vec<(ParameterSchema, ParamLocation)>,
    pub extract: Option<String>,
}

impl RestEndpoint {
    pub fn new(method: Method, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            method,
            path: path.into(),
            params: Vec::new(),
            extract: None,
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::GET, name, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::POST, name, path)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, param: ParameterSchema, location: ParamLocation) -> Self {
        self.params.push((param, location));
        self
    }

    /// Dotted key path applied to the decoded response
    pub fn extract(mut self, path: impl Into<String>) -> Self {
        self.extract = Some(path.into());
        self
    }

    fn spec(&self) -> ToolSpec {
        self.params
            .iter()
            .fold(ToolSpec::new(&self.name, &self.description), |spec, (param, _)| {
                spec.param(param.clone())
            })
    }
}

/// Tool provider over a REST API
pub struct RestProvider {
    name: String,
    description: String,
    base_url: String,
    headers: Vec<(String, String)>,
    endpoints: Vec<RestEndpoint>,
    client: reqwest::Client,
}

impl RestProvider {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Vec::new(),
            endpoints: Vec::new(),
            client,
        }
    }

    /// Static header sent with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn endpoint(mut self, endpoint: RestEndpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    async fn call(&self, endpoint: &RestEndpoint, arguments: &Arguments) -> Result<Value> {
        let mut path = endpoint.path.clone();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut body = Map::new();

        for (param, location) in &endpoint.params {
            let Some(value) = arguments.get(&param.name).filter(|v| !v.is_null()) else {
                continue;
            };
            match location {
                ParamLocation::Path => {
                    path = path.replace(&format!("{{{}}}", param.name), &plain(value));
                }
                ParamLocation::Query => query.push((param.name.clone(), plain(value))),
                ParamLocation::Body => {
                    body.insert(param.name.clone(), value.clone());
                }
            }
        }

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(provider = %self.name, tool = %endpoint.name, %url, "Calling REST endpoint");

        let mut request = self
            .client
            .request(endpoint.method.clone(), &url)
            .timeout(REQUEST_TIMEOUT)
            .query(&query);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if endpoint.method != Method::GET {
            let payload = if body.is_empty() { arguments.clone() } else { body };
            request = request.json(&payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!(provider = %self.name, status = status.as_u16(), "REST endpoint failed");
            return Err(ToolKitError::status(status.as_u16(), &text));
        }

        let decoded: Value = serde_json::from_str(&text)?;
        let result = match &endpoint.extract {
            Some(path) => extract(decoded, path),
            None => decoded,
        };
        Ok(json!({ "result": result }))
    }
}

/// Walk a dotted key path; a missing key leaves the value where it is
fn extract(mut value: Value, path: &str) -> Value {
    for key in path.split('.') {
        if let Value::Object(map) = &mut value {
            if let Some(inner) = map.remove(key) {
                value = inner;
            }
        }
    }
    value
}

/// Argument rendered for a URL: strings unquoted, everything else as JSON
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ToolProvider for RestProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn tools(&self) -> Vec<ToolSpec> {
        self.endpoints.iter().map(RestEndpoint::spec).collect()
    }

    async fn execute(&self, tool: &str, arguments: &Arguments) -> CoreResult<Value> {
        let endpoint = self
            .endpoints
            .iter()
            .find(|e| e.name == tool)
            .ok_or_else(|| ToolKitError::UnknownTool(tool.to_string()))?;

        Ok(self.call(endpoint, arguments).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => Arguments::new(),
        }
    }

    fn provider(base_url: &str) -> RestProvider {
        RestProvider::new("books", "Book catalog", base_url, reqwest::Client::new())
            .header("User-Agent", "gateway-test")
            .endpoint(
                RestEndpoint::get("lookup", "/books/{isbn}")
                    .description("Look up a book")
                    .param(ParameterSchema::required("isbn", "string", "ISBN"), ParamLocation::Path)
                    .param(ParameterSchema::optional("lang", "string", "Language"), ParamLocation::Query)
                    .extract("data.book"),
            )
            .endpoint(
                RestEndpoint::post("review", "/reviews")
                    .param(ParameterSchema::required("text", "string", "Review"), ParamLocation::Body),
            )
            .endpoint(RestEndpoint::post("echo", "/echo"))
    }

    #[test]
    fn test_extract_walks_dotted_path() {
        let value = json!({"a": {"b": {"c": 1}}});
        assert_eq!(extract(value.clone(), "a.b"), json!({"c": 1}));
        assert_eq!(extract(value.clone(), "a.missing"), json!({"b": {"c": 1}}));
        assert_eq!(extract(json!([1, 2]), "a"), json!([1, 2]));
    }

    #[test]
    fn test_tool_specs_from_endpoints() {
        let tools = provider("http://localhost").tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["lookup", "review", "echo"]);

        let schema = tools[0].input_schema();
        assert_eq!(schema["required"], json!(["isbn"]));
        assert_eq!(schema["properties"]["lang"]["type"], "string");
    }

    #[tokio::test]
    async fn test_get_with_path_query_and_extract() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/books/978-0"))
            .and(query_param("lang", "en"))
            .and(header("User-Agent", "gateway-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"book": {"title": "Dune"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .execute("lookup", &args(json!({"isbn": "978-0", "lang": "en"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"result": {"title": "Dune"}}));
    }

    #[tokio::test]
    async fn test_post_sends_body_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reviews"))
            .and(body_json(json!({"text": "great"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .execute("review", &args(json!({"text": "great"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"result": {"id": 7}}));
    }

    #[tokio::test]
    async fn test_post_without_body_params_sends_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(body_json(json!({"free": "form"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .execute("echo", &args(json!({"free": "form"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"result": "ok"}));
    }

    #[tokio::test]
    async fn test_error_status_fails_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such book"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .execute("lookup", &args(json!({"isbn": "x"})))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tool execution error: Upstream returned 404: no such book"
        );
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let err = provider("http://localhost")
            .execute("delete", &Arguments::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown tool: delete"));
    }
}
