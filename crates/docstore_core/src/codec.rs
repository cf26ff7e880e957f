//! Document codec between stored text and structured documents.

use crate::model::record::Document;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Serialization failure in either direction.
#[derive(Debug)]
pub struct CodecError(serde_json::Error);

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "document codec failed: {}", self.0)
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self(value)
    }
}

/// Converts documents to and from the text stored in the `data` column.
pub trait DocumentCodec: Send + Sync {
    fn encode(&self, document: &Document) -> Result<String, CodecError>;
    fn decode(&self, text: &str) -> Result<Document, CodecError>;
}

/// Compact JSON text codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentCodec;

impl DocumentCodec for JsonDocumentCodec {
    fn encode(&self, document: &Document) -> Result<String, CodecError> {
        Ok(serde_json::to_string(document)?)
    }

    fn decode(&self, text: &str) -> Result<Document, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}
