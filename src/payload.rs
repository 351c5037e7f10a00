use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::store::Document;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("payload is a JSON {0}, expected an object")]
    NotADocument(&'static str),
}

/// One fully rendered document, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    body: Arc<str>,
}

impl Payload {
    pub fn new(body: impl Into<Arc<str>>) -> Self {
        Self { body: body.into() }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Parse the payload into the store's record format.
    pub fn decode(&self) -> Result<Document, DecodeError> {
        match serde_json::from_str::<Value>(&self.body)? {
            Value::Object(map) => Ok(map),
            other => Err(DecodeError::NotADocument(json_kind(&other))),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

impl From<String> for Payload {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
