use reqwest::Method;
use serde_json::Value;

use crate::error::PlatformError;

/// Body of an outbound request
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
    Bytes {
        content_type: String,
        data: bytes::Bytes,
    },
}

#[derive(Debug, Clone)]
enum Credentials {
    Bearer(String),
    Basic { user: String, password: String },
}

/// A platform API call, described independently of the HTTP client
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    credentials: Option<Credentials>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            credentials: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.credentials = Some(Credentials::Bearer(token.to_string()));
        self
    }

    pub fn basic_auth(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::Basic {
            user: user.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.body = Some(RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    pub fn bytes(mut self, content_type: &str, data: bytes::Bytes) -> Self {
        self.body = Some(RequestBody::Bytes {
            content_type: content_type.to_string(),
            data,
        });
        self
    }

    /// URL safe to log: query strings often carry access tokens
    pub fn url_without_query(&self) -> String {
        self.url
            .split_once('?')
            .map(|(base, _)| base)
            .unwrap_or(&self.url)
            .to_string()
    }

    pub(crate) fn build(
        &self,
        client: &reqwest::Client,
    ) -> Result<reqwest::RequestBuilder, PlatformError> {
        let url = if self.query.is_empty() {
            url::Url::parse(&self.url)
        } else {
            url::Url::parse_with_params(&self.url, &self.query)
        }
        .map_err(|e| PlatformError::BadRequest(format!("Invalid request URL {}: {}", self.url, e)))?;

        let mut builder = client
            .request(self.method.clone(), url)
            .header(reqwest::header::ACCEPT, "application/json");

        for (key, value) in &self.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        builder = match &self.credentials {
            Some(Credentials::Bearer(token)) => builder.bearer_auth(token),
            Some(Credentials::Basic { user, password }) => builder.basic_auth(user, Some(password)),
            None => builder,
        };

        builder = match &self.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                builder
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body(encoded)
            }
            Some(RequestBody::Bytes { content_type, data }) => builder
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
            None => builder,
        };

        Ok(builder)
    }
}

/// Decoded provider response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// String at a JSON pointer such as `/data/id`; numeric ids are stringified
    pub fn string_at(&self, pointer: &str) -> Option<String> {
        match self.body.pointer(pointer)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn require_string(&self, pointer: &str) -> Result<String, PlatformError> {
        self.string_at(pointer).ok_or_else(|| {
            PlatformError::InvalidResponse(format!("missing field {} in provider response", pointer))
        })
    }

    pub fn i64_at(&self, pointer: &str) -> Option<i64> {
        self.body.pointer(pointer).and_then(Value::as_i64)
    }
}

/// Empty bodies decode to `null`; non-JSON bodies are kept as a string
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
