//! # Decision Model
//!
//! The authorization decision model: the four-valued decision, the
//! extended-indeterminate annotation, machine-readable statuses, and the
//! full per-policy result the evaluator tree bubbles upward.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::metadata::PrimaryPolicyMetadata;
use super::pep_action::PepAction;

/// The effect of a rule, and of a determinate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}

impl Effect {
    pub fn decision(self) -> Decision {
        match self {
            Self::Permit => Decision::Permit,
            Self::Deny => Decision::Deny,
        }
    }

    /// The extended-indeterminate annotation an error under this effect
    /// produces: a failing Permit rule could only have been a Permit.
    pub fn bias(self) -> DecisionBias {
        match self {
            Self::Permit => DecisionBias::Permit,
            Self::Deny => DecisionBias::Deny,
        }
    }

    pub fn opposite(self) -> Effect {
        match self {
            Self::Permit => Effect::Deny,
            Self::Deny => Effect::Permit,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => f.write_str("Permit"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// The four-valued authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate,
}

/// Extended-indeterminate annotation: which determinate decisions an
/// Indeterminate outcome could have been, had inputs been determinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionBias {
    /// Indeterminate{P} — could only have been Permit.
    Permit,
    /// Indeterminate{D} — could only have been Deny.
    Deny,
    /// Indeterminate{DP} — could have been either.
    DenyPermit,
}

/// Machine-readable status code of a decision, per the XACML status
/// vocabulary. `Display` yields the standard URN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    Ok,
    MissingAttribute,
    SyntaxError,
    ProcessingError,
}

impl StatusCode {
    pub fn urn(&self) -> &'static str {
        match self {
            Self::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            Self::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            Self::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            Self::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.urn())
    }
}

/// Status of a decision: a code plus an optional human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: Option<String>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }

    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn processing_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ProcessingError, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

/// A decision together with its extended-indeterminate annotation and
/// status, but without PEP actions. This is what combining algorithms
/// consume from and hand back to their callers; the action and
/// applicable-policy collectors travel separately.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtendedDecision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate { bias: DecisionBias, status: Status },
}

impl ExtendedDecision {
    pub fn determinate(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Self::Permit,
            Effect::Deny => Self::Deny,
        }
    }

    pub fn indeterminate(bias: DecisionBias, status: Status) -> Self {
        Self::Indeterminate { bias, status }
    }

    pub fn decision(&self) -> Decision {
        match self {
            Self::Permit => Decision::Permit,
            Self::Deny => Decision::Deny,
            Self::NotApplicable => Decision::NotApplicable,
            Self::Indeterminate { .. } => Decision::Indeterminate,
        }
    }

    /// Status of this decision; successes report `ok`.
    pub fn status(&self) -> Status {
        match self {
            Self::Indeterminate { status, .. } => status.clone(),
            _ => Status::ok(),
        }
    }
}

/// The full result of evaluating a rule, policy or policy set: decision,
/// status, fulfilled PEP actions, and the policies that contributed a
/// decision other than NotApplicable (populated only when the request
/// asks for them).
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResult {
    pub decision: Decision,
    /// Set iff `decision` is `Indeterminate`.
    pub bias: Option<DecisionBias>,
    pub status: Status,
    /// Fulfilled obligations and advice, in accumulation order.
    pub pep_actions: Vec<PepAction>,
    /// Applicable policies, children before parents.
    pub applicable_policies: Vec<PrimaryPolicyMetadata>,
}

impl DecisionResult {
    pub fn not_applicable(status: Status) -> Self {
        Self {
            decision: Decision::NotApplicable,
            bias: None,
            status,
            pep_actions: Vec::new(),
            applicable_policies: Vec::new(),
        }
    }

    pub fn indeterminate(bias: DecisionBias, status: Status) -> Self {
        Self {
            decision: Decision::Indeterminate,
            bias: Some(bias),
            status,
            pep_actions: Vec::new(),
            applicable_policies: Vec::new(),
        }
    }

    pub fn determinate(effect: Effect, pep_actions: Vec<PepAction>) -> Self {
        Self {
            decision: effect.decision(),
            bias: None,
            status: Status::ok(),
            pep_actions,
            applicable_policies: Vec::new(),
        }
    }

    /// Projects this result back into an [`ExtendedDecision`].
    ///
    /// An Indeterminate recorded without a bias (only possible for results
    /// built by extension code outside this crate) degrades to `DenyPermit`
    /// with a generic processing-error status rather than panicking.
    pub fn extended(&self) -> ExtendedDecision {
        match self.decision {
            Decision::Permit => ExtendedDecision::Permit,
            Decision::Deny => ExtendedDecision::Deny,
            Decision::NotApplicable => ExtendedDecision::NotApplicable,
            Decision::Indeterminate => ExtendedDecision::Indeterminate {
                bias: self.bias.unwrap_or(DecisionBias::DenyPermit),
                status: if self.status.is_ok() {
                    Status::processing_error("indeterminate decision without a cause")
                } else {
                    self.status.clone()
                },
            },
        }
    }
}
