//! Payload codecs between [`ObjectTree`](super::tree::ObjectTree) and the wire
//!
//! `xml` serves both XML dialects, `json` serves the v3 dialect. Both are
//! pure functions without shared builder state.

pub mod json;
pub mod xml;

/// Failure to produce or parse a wire payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// A tag looked up by name was absent. Callers with optional fields recover
/// from this with a default; it never reaches the client's callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tag <{tag}> not found in namespace {namespace}")]
pub struct TagNotFound {
    pub tag: String,
    pub namespace: String,
}
