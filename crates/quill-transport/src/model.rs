use std::fmt;

/// HTTP-style verb of a plain request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar query parameter value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl QueryValue {
    /// Renders the value the way it appears in a URL query string.
    pub fn render(&self) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Str(v) => v.clone(),
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::from(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::Str(v) => serde_json::Value::from(v.as_str()),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// One non-streaming round trip.
///
/// `path` is relative to the backend's API root and never carries a query
/// string; parameters go through `query`, where `None` values are omitted on
/// the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, Option<QueryValue>)>,
    pub body: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Appends a query parameter. Absent values are kept so callers can pass
    /// optional filters straight through.
    pub fn query<V: Into<QueryValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.query.push((key.into(), value.map(Into::into)));
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<B: serde::Serialize>(self, body: &B) -> Result<Self, crate::TransportError> {
        let value = serde_json::to_value(body)
            .map_err(|e| crate::TransportError::Invalid(format!("unserializable body: {e}")))?;
        Ok(self.body(value))
    }

    /// Query parameters that carry a value, in insertion order.
    pub fn present_query(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.query
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.as_str(), v)))
    }
}

/// Parameters of one streaming chat exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreamSpec {
    pub prompt: String,
    pub chat_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub regen_message_id: Option<i64>,
    /// `Some(false)` requests a single non-incremental chunk.
    pub stream: Option<bool>,
    /// `Some(true)` requests verbose backend log events.
    pub debug: Option<bool>,
}

impl StreamSpec {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Regenerates an assistant message; the prompt is left empty.
    pub fn regenerate(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id: Some(chat_id),
            regen_message_id: Some(message_id),
            ..Self::default()
        }
    }

    pub fn chat_id(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    pub fn provider_id(mut self, provider_id: i64) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    pub fn regen_message_id(mut self, message_id: i64) -> Self {
        self.regen_message_id = Some(message_id);
        self
    }

    pub fn incremental(mut self, incremental: bool) -> Self {
        self.stream = Some(incremental);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Whether incremental delivery was requested (the default).
    pub fn is_incremental(&self) -> bool {
        self.stream.unwrap_or(true)
    }

    pub fn is_debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

/// Correlation id of one IPC stream.
///
/// Events on the shared IPC channels are attributed to a stream only through
/// this id, so it is kept as its own type instead of a bare string.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct StreamId(uuid::Uuid);

impl StreamId {
    /// Generates a fresh id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns true if a wire id names this stream.
    pub fn matches(&self, wire: &str) -> bool {
        uuid::Uuid::parse_str(wire).is_ok_and(|id| id == self.0)
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which adapter implements a `Transport`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendKind {
    Http,
    Ipc,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Ipc => "ipc",
        })
    }
}
