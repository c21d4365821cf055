//! Attribute identifiers and fully-qualified attribute keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::AttributeCategory;

/// An attribute identifier URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(String);

impl AttributeId {
    pub const SUBJECT_ID: &'static str = "urn:oasis:names:tc:xacml:1.0:subject:subject-id";
    pub const RESOURCE_ID: &'static str = "urn:oasis:names:tc:xacml:1.0:resource:resource-id";
    pub const ACTION_ID: &'static str = "urn:oasis:names:tc:xacml:1.0:action:action-id";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn subject_id() -> Self {
        Self::new(Self::SUBJECT_ID)
    }

    pub fn resource_id() -> Self {
        Self::new(Self::RESOURCE_ID)
    }

    pub fn action_id() -> Self {
        Self::new(Self::ACTION_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AttributeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Fully-qualified attribute key: category, identifier and optional issuer.
///
/// This is the lookup key of the request attribute map. A designator that
/// names no issuer matches attributes under any issuer; that widening lives
/// in [`super::request::DecisionRequest::attribute_bag`], not here — the key
/// itself is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeFqn {
    pub category: AttributeCategory,
    pub id: AttributeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl AttributeFqn {
    pub fn new(
        category: impl Into<AttributeCategory>,
        id: impl Into<AttributeId>,
        issuer: Option<String>,
    ) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            issuer,
        }
    }
}

impl fmt::Display for AttributeFqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issuer {
            Some(issuer) => write!(f, "{}|{}|{}", self.category, self.id, issuer),
            None => write!(f, "{}|{}", self.category, self.id),
        }
    }
}
