//! Request body payloads and (de)serialization helpers.

use bytes::Bytes;

use crate::Result;

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// Plain text content type (`text/plain`).
    PlainText,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request payload: opaque bytes or a structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Raw bytes, sent as is.
    Bytes(Bytes),
    /// UTF-8 text.
    Text(String),
    /// Structured value, serialized to JSON at dispatch.
    Json(serde_json::Value),
    /// Already-encoded form fields.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Build a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Content type implied by the payload.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        match self {
            Self::Bytes(_) => ContentType::OctetStream,
            Self::Text(_) => ContentType::PlainText,
            Self::Json(_) => ContentType::Json,
            Self::Form(_) => ContentType::FormUrlEncoded,
        }
    }

    /// Encode the payload into wire bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON or form encoding fails.
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Text(text) => Ok(Bytes::from(text.clone())),
            Self::Json(value) => to_json(value),
            Self::Form(fields) => to_form(fields),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use ferrule_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to form URL-encoded bytes.
///
/// # Errors
///
/// Returns an error if form serialization fails.
///
/// # Example
///
/// ```
/// use ferrule_core::to_form;
///
/// let fields = [("username", "alice"), ("password", "secret")];
/// let bytes = to_form(&fields).expect("serialize");
/// assert_eq!(bytes.as_ref(), b"username=alice&password=secret");
/// ```
pub fn to_form<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_urlencoded::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// # Errors
///
/// Returns [`crate::Error::ResponseParse`] carrying the path to the field
/// that failed (e.g. "user.address.city").
///
/// # Example
///
/// ```
/// use ferrule_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let user: User = from_json(br#"{"name":"Alice"}"#).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| crate::Error::response_parse(e.path().to_string(), e.inner().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_as_str() {
        assert_eq!(ContentType::Json.as_str(), "application/json");
        assert_eq!(
            ContentType::FormUrlEncoded.as_str(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(ContentType::PlainText.to_string(), "text/plain");
    }

    #[test]
    fn body_content_type() {
        assert_eq!(Body::from("hi").content_type(), ContentType::PlainText);
        assert_eq!(
            Body::Bytes(Bytes::new()).content_type(),
            ContentType::OctetStream
        );
        assert_eq!(
            Body::Form(Vec::new()).content_type(),
            ContentType::FormUrlEncoded
        );
    }

    #[test]
    fn json_body_to_bytes() {
        #[derive(serde::Serialize)]
        struct User {
            name: String,
            age: u32,
        }

        let body = Body::json(&User {
            name: "Alice".to_string(),
            age: 30,
        })
        .expect("json body");

        assert_eq!(body.content_type(), ContentType::Json);
        let bytes = body.to_bytes().expect("encode");
        let decoded: serde_json::Value = from_json(&bytes).expect("decode");
        assert_eq!(decoded, serde_json::json!({"name": "Alice", "age": 30}));
    }

    #[test]
    fn form_body_to_bytes() {
        let body = Body::Form(vec![
            ("q".to_string(), "rust lang".to_string()),
            ("page".to_string(), "2".to_string()),
        ]);
        let bytes = body.to_bytes().expect("encode");
        assert_eq!(bytes.as_ref(), b"q=rust+lang&page=2");
    }

    #[test]
    fn from_json_reports_path() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Outer {
            user: Inner,
        }

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Inner {
            id: u64,
        }

        let err = from_json::<Outer>(br#"{"user":{"id":"nope"}}"#).expect_err("type mismatch");
        match err {
            crate::Error::ResponseParse { path, .. } => assert_eq!(path, "user.id"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
