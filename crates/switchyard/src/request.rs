//! Read-only request abstraction consumed by the router.
//!
//! The router never sees a framework request type. Hosts implement
//! [`RequestView`] once per HTTP stack; [`HttpRequestView`] covers
//! `hyper::Request` and [`InboundRequest`] is an owned view for tests, the CLI
//! and hosts that already decoded the request.

use hyper::Request;
use serde_json::Value;
use std::collections::HashMap;

/// Everything routing needs to know about an inbound request.
pub trait RequestView {
    fn method(&self) -> &str;

    /// Request path without the query string.
    fn path(&self) -> &str;

    /// Header lookup, case-insensitive on the name.
    fn header(&self, name: &str) -> Option<&str>;

    fn query(&self, name: &str) -> Option<&str>;

    /// Field of the parsed request body (plain key or dotted path).
    fn body_field(&self, field: &str) -> Option<&Value>;

    /// Field of the already-authenticated user projection, if any.
    fn user_field(&self, field: &str) -> Option<&Value>;
}

/// Parse a raw query string into decoded key/value pairs (last key wins).
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                params.insert(decode_component(key), decode_component(value));
            } else if !pair.is_empty() {
                params.insert(decode_component(pair), String::new());
            }
        }
    }
    params
}

/// Form-decode one query component: `+` is a space, and text that does not
/// decode to UTF-8 is kept with only `+` replaced.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Look up `field` in a JSON object: exact key first, then as a dotted path
/// (`customer.address.country`, `items.0.sku`).
pub fn lookup_json_field<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(found) = value.get(field) {
        return Some(found);
    }
    if !field.contains('.') {
        return None;
    }

    field.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Owned request view.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    method: String,
    path: String,
    /// Keys are lowercased
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Option<Value>,
    user: Option<Value>,
}

impl InboundRequest {
    /// Create a request from a method and a path that may carry a query string.
    pub fn new(method: impl Into<String>, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        Self {
            method: method.into(),
            path: path.to_string(),
            query: parse_query_string(query),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }
}

impl RequestView for InboundRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, name: &str) -> Option<&str> {
        match self.headers.get(name) {
            Some(value) => Some(value.as_str()),
            None => self
                .headers
                .get(&name.to_ascii_lowercase())
                .map(String::as_str),
        }
    }

    fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    fn body_field(&self, field: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|b| lookup_json_field(b, field))
    }

    fn user_field(&self, field: &str) -> Option<&Value> {
        self.user.as_ref().and_then(|u| lookup_json_field(u, field))
    }
}

/// Adapter over a `hyper::Request`.
///
/// The body is not read here; hosts that buffer and parse it attach the
/// result with [`HttpRequestView::with_body`]. The same goes for the user
/// projection produced by the authentication layer.
pub struct HttpRequestView<'a, B> {
    request: &'a Request<B>,
    query: HashMap<String, String>,
    body: Option<Value>,
    user: Option<Value>,
}

impl<'a, B> HttpRequestView<'a, B> {
    pub fn new(request: &'a Request<B>) -> Self {
        Self {
            request,
            query: parse_query_string(request.uri().query()),
            body: None,
            user: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }
}

impl<B> RequestView for HttpRequestView<'_, B> {
    fn method(&self) -> &str {
        self.request.method().as_str()
    }

    fn path(&self) -> &str {
        self.request.uri().path()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    fn body_field(&self, field: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|b| lookup_json_field(b, field))
    }

    fn user_field(&self, field: &str) -> Option<&Value> {
        self.user.as_ref().and_then(|u| lookup_json_field(u, field))
    }
}
