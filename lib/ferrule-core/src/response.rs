//! HTTP response handling.
//!
//! [`Response`] is a buffered value: cloning it gives every consumer its own
//! copy, so interceptors and cache readers never interfere with each other.
//!
//! # Example
//!
//! ```ignore
//! let user: User = response.json()?;
//! ```

use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;

use crate::{Error, RequestConfig, ResponseType, Result};

/// HTTP response with status, headers, body and the config that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    status_text: String,
    headers: HeaderMap,
    body: Bytes,
    data: Option<serde_json::Value>,
    config: Option<Arc<RequestConfig>>,
    from_cache: bool,
}

impl Response {
    /// Creates a new response.
    ///
    /// The status text defaults to the canonical reason phrase.
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let status_text = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();

        Self {
            status,
            status_text,
            headers,
            body: body.into(),
            data: None,
            config: None,
            from_cache: false,
        }
    }

    /// Creates a response carrying a decoded value and no raw body.
    ///
    /// Useful for error handlers that recover a call with a synthetic value.
    #[must_use]
    pub fn from_data(status: u16, data: serde_json::Value) -> Self {
        Self::new(status, HeaderMap::new(), Bytes::new()).with_data(data)
    }

    /// Replace the status text.
    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Attach the decoded value.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the configuration that produced this response.
    #[must_use]
    pub fn with_config(mut self, config: Arc<RequestConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Tag the response as served from (or destined to) the cache.
    #[must_use]
    pub fn with_from_cache(mut self, from_cache: bool) -> Self {
        self.from_cache = from_cache;
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// HTTP status text.
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decoded body, per the declared response type.
    #[must_use]
    pub const fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    /// Configuration that produced this response.
    #[must_use]
    pub fn config(&self) -> Option<&RequestConfig> {
        self.config.as_deref()
    }

    /// Returns `true` if the response was served from the cache.
    #[must_use]
    pub const fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Consume into the raw body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Decode the body per `response_type` into [`Response::data`].
    ///
    /// With `lenient` set, an undecodable body is kept raw and `data` stays
    /// empty instead of failing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseParse`] when the body does not match the
    /// declared type and `lenient` is not set.
    pub fn decode(mut self, response_type: ResponseType, lenient: bool) -> Result<Self> {
        let decoded = match response_type {
            ResponseType::Bytes => return Ok(self),
            _ if self.body.is_empty() => return Ok(self),
            ResponseType::Json => serde_json::from_slice::<serde_json::Value>(&self.body)
                .map_err(|e| Error::response_parse(".", e.to_string())),
            ResponseType::Text => std::str::from_utf8(&self.body)
                .map(|text| serde_json::Value::String(text.to_string()))
                .map_err(|e| Error::response_parse(".", e.to_string())),
        };

        match decoded {
            Ok(value) => {
                self.data = Some(value);
                Ok(self)
            }
            Err(err) if lenient => {
                tracing::debug!(error = %err, "keeping undecodable body as raw bytes");
                Ok(self)
            }
            Err(err) => Err(err),
        }
    }

    /// Deserialize the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseParse`] with the failing path.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            Some(value) if self.body.is_empty() => serde_json::from_value(value.clone())
                .map_err(|e| Error::response_parse(".", e.to_string())),
            _ => crate::from_json(&self.body),
        }
    }

    /// Get the response body as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseParse`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| Error::response_parse(".", e.to_string()))
    }
}
