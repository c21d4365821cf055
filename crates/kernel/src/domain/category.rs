//! Attribute categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An XACML attribute category URI.
///
/// Value object wrapping the category string. Constructors exist for the
/// four standard categories; any other URI is accepted verbatim, since
/// custom categories are legal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeCategory(String);

impl AttributeCategory {
    pub const ACCESS_SUBJECT: &'static str =
        "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
    pub const RESOURCE: &'static str =
        "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
    pub const ACTION: &'static str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
    pub const ENVIRONMENT: &'static str =
        "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";

    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn access_subject() -> Self {
        Self::new(Self::ACCESS_SUBJECT)
    }

    pub fn resource() -> Self {
        Self::new(Self::RESOURCE)
    }

    pub fn action() -> Self {
        Self::new(Self::ACTION)
    }

    pub fn environment() -> Self {
        Self::new(Self::ENVIRONMENT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributeCategory {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for AttributeCategory {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl AsRef<str> for AttributeCategory {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
