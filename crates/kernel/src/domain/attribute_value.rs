//! Typed attribute values
//!
//! This module defines the primitive values attributes can take, independent
//! of any request or policy syntax. Each value knows its XACML datatype; the
//! mapping is total, so downstream code can always recover the datatype of a
//! value it is handed.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// XACML datatype of an attribute value.
///
/// Covers the primitive datatypes the engine evaluates natively. `Display`
/// yields the standard datatype URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeDatatype {
    String,
    Boolean,
    Integer,
    Double,
    AnyUri,
    DateTime,
    Date,
    Time,
    X500Name,
    Rfc822Name,
}

impl AttributeDatatype {
    /// Standard URI identifying this datatype.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::String => "http://www.w3.org/2001/XMLSchema#string",
            Self::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            Self::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            Self::Double => "http://www.w3.org/2001/XMLSchema#double",
            Self::AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
            Self::DateTime => "http://www.w3.org/2001/XMLSchema#dateTime",
            Self::Date => "http://www.w3.org/2001/XMLSchema#date",
            Self::Time => "http://www.w3.org/2001/XMLSchema#time",
            Self::X500Name => "urn:oasis:names:tc:xacml:1.0:data-type:x500Name",
            Self::Rfc822Name => "urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name",
        }
    }

    /// Short lowercase name used in function identifiers
    /// (`string-equal`, `anyURI-one-and-only`, ...).
    pub fn function_prefix(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::AnyUri => "anyURI",
            Self::DateTime => "dateTime",
            Self::Date => "date",
            Self::Time => "time",
            Self::X500Name => "x500Name",
            Self::Rfc822Name => "rfc822Name",
        }
    }

    /// All datatypes the engine handles natively.
    pub fn all() -> &'static [AttributeDatatype] {
        &[
            Self::String,
            Self::Boolean,
            Self::Integer,
            Self::Double,
            Self::AnyUri,
            Self::DateTime,
            Self::Date,
            Self::Time,
            Self::X500Name,
            Self::Rfc822Name,
        ]
    }
}

impl fmt::Display for AttributeDatatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// A single typed attribute value.
///
/// The engine compares, matches and assigns these; it never inspects raw
/// lexical forms after construction. Serialization is tagged so a value
/// round-trips with its datatype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum AttributeValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
    AnyUri(String),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    X500Name(String),
    Rfc822Name(String),
}

impl AttributeValue {
    /// Crea un AttributeValue::String
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Crea un AttributeValue::Boolean
    pub fn boolean(value: bool) -> Self {
        Self::Boolean(value)
    }

    /// Crea un AttributeValue::Integer
    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    /// Crea un AttributeValue::Double
    pub fn double(value: f64) -> Self {
        Self::Double(value)
    }

    /// Crea un AttributeValue::AnyUri
    pub fn any_uri(value: impl Into<String>) -> Self {
        Self::AnyUri(value.into())
    }

    /// The datatype of this value. Total by construction.
    pub fn datatype(&self) -> AttributeDatatype {
        match self {
            Self::String(_) => AttributeDatatype::String,
            Self::Boolean(_) => AttributeDatatype::Boolean,
            Self::Integer(_) => AttributeDatatype::Integer,
            Self::Double(_) => AttributeDatatype::Double,
            Self::AnyUri(_) => AttributeDatatype::AnyUri,
            Self::DateTime(_) => AttributeDatatype::DateTime,
            Self::Date(_) => AttributeDatatype::Date,
            Self::Time(_) => AttributeDatatype::Time,
            Self::X500Name(_) => AttributeDatatype::X500Name,
            Self::Rfc822Name(_) => AttributeDatatype::Rfc822Name,
        }
    }

    /// Boolean accessor, `None` when the value is not a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String accessor covering every string-shaped datatype.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::AnyUri(s) | Self::X500Name(s) | Self::Rfc822Name(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) | Self::AnyUri(v) | Self::X500Name(v) | Self::Rfc822Name(v) => {
                f.write_str(v)
            }
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Date(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
        }
    }
}
