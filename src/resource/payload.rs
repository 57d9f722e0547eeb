//! Request payload decoding.

use serde_json::{Map, Value};

use super::errors::{ResourceError, ResourceResult};

/// Raw request body, decoded only once path resolution has passed.
#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl RequestBody {
    pub fn new(content_type: Option<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            bytes: bytes.into(),
        }
    }

    /// A body as sent by a well-behaved JSON client.
    pub fn json(value: &Value) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            bytes: value.to_string().into_bytes(),
        }
    }

    /// Decodes the body as a JSON object.
    ///
    /// A declared non-JSON content type, an undecodable body, or any JSON
    /// value other than an object is a malformed request.
    pub fn decode(&self) -> ResourceResult<Map<String, Value>> {
        if let Some(content_type) = &self.content_type {
            if !is_json_content_type(content_type) {
                return Err(ResourceError::MalformedRequest);
            }
        }
        match serde_json::from_slice::<Value>(&self.bytes) {
            Ok(Value::Object(object)) => Ok(object),
            _ => Err(ResourceError::MalformedRequest),
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}
