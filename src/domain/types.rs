//! Newtypes validated at the data-access boundary

use crate::{Error, Result};
use nutype::nutype;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a stored text blob, generated at creation time
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRef,
    Display
))]
pub struct TextId(Uuid);

impl TextId {
    /// Create a fresh time-ordered identifier
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// Parse a caller-supplied identifier
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::validation("id", "cannot be empty"));
        }
        Uuid::parse_str(id)
            .map(Self::new)
            .map_err(|e| Error::validation("id", format!("'{id}' is not a valid UUID: {e}")))
    }
}

/// Content of a text blob; must not be empty
#[nutype(
    validate(not_empty),
    derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct TextContent(String);

impl TextContent {
    pub fn parse(content: impl Into<String>) -> Result<Self> {
        Self::try_new(content.into()).map_err(|_| Error::validation("content", "cannot be empty"))
    }
}

/// Page size for audit log listings
#[nutype(
    validate(predicate = |limit: &u32| *limit > 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct PageLimit(u32);

impl PageLimit {
    pub fn parse(limit: u32) -> Result<Self> {
        Self::try_new(limit).map_err(|_| Error::validation("limit", "must be greater than zero"))
    }
}
