//! Fulfilled PEP actions (obligations and advice).

use kernel::{AttributeCategory, AttributeId, AttributeValue};
use serde::{Deserialize, Serialize};

/// One attribute assignment inside a fulfilled PEP action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepActionAssignment {
    pub attribute_id: AttributeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<AttributeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub value: AttributeValue,
}

/// A fulfilled obligation or advice returned with a decision.
///
/// `is_mandatory` distinguishes obligations (the PEP must honor them) from
/// advice (informational). Assignment order follows the declaration order
/// of the source expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepAction {
    pub id: String,
    pub is_mandatory: bool,
    pub assignments: Vec<PepActionAssignment>,
}

impl PepAction {
    pub fn obligation(id: impl Into<String>, assignments: Vec<PepActionAssignment>) -> Self {
        Self {
            id: id.into(),
            is_mandatory: true,
            assignments,
        }
    }

    pub fn advice(id: impl Into<String>, assignments: Vec<PepActionAssignment>) -> Self {
        Self {
            id: id.into(),
            is_mandatory: false,
            assignments,
        }
    }
}
