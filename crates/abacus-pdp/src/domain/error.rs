//! Error taxonomy of the engine.
//!
//! Two families: [`PolicyBuildError`] aborts document compilation, while
//! [`EvaluationError`] never escapes `evaluate` — every runtime failure is
//! converted into an Indeterminate decision carrying the error's status.

use kernel::{AttributeCategory, AttributeDatatype, AttributeId, BagError};
use thiserror::Error;

use super::decision::{Status, StatusCode};
use super::metadata::{PolicyKind, PrimaryPolicyMetadata};
use super::version::VersionError;

/// Fatal compile-time errors: the offending document is rejected.
#[derive(Debug, Error)]
pub enum PolicyBuildError {
    #[error("duplicate rule id '{rule_id}' in policy '{policy_id}'")]
    DuplicateRuleId { policy_id: String, rule_id: String },

    #[error("policy identity {meta} encloses itself more than once")]
    DuplicateEnclosedPolicy { meta: PrimaryPolicyMetadata },

    #[error("variable id '{variable_id}' conflicts with a variable already in scope")]
    ConflictingVariable { variable_id: String },

    #[error("variable '{variable_id}' reference chain of length {depth} exceeds the maximum of {max}")]
    VariableChainTooDeep {
        variable_id: String,
        depth: usize,
        max: usize,
    },

    #[error("reference to undefined variable '{variable_id}'")]
    UndefinedVariable { variable_id: String },

    #[error("AllOf must contain at least one Match")]
    EmptyAllOf,

    #[error("AnyOf must contain at least one AllOf")]
    EmptyAnyOf,

    #[error("unknown combining algorithm '{alg_id}'")]
    UnknownCombiningAlgorithm { alg_id: String },

    #[error("combining algorithm '{alg_id}' does not accept combiner parameters")]
    UnsupportedCombinerParameters { alg_id: String },

    #[error("unknown function '{function_id}'")]
    UnknownFunction { function_id: String },

    #[error("invalid version literal")]
    InvalidVersion(#[from] VersionError),

    #[error("AttributeSelector requires XPath support, which is not enabled")]
    XPathDisabled,

    #[error("invalid XPath expression {source_expr:?}: {reason}")]
    InvalidXPath { source_expr: String, reason: String },

    #[error("no policy provider configured, cannot resolve {kind} reference '{id}'")]
    NoPolicyProvider { kind: PolicyKind, id: String },

    #[error("cannot resolve {kind} reference '{id}': {reason}")]
    UnresolvedReference {
        kind: PolicyKind,
        id: String,
        reason: String,
    },

    #[error("policy reference cycle: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    #[error("policy reference chain of length {depth} exceeds the maximum of {max}")]
    ReferenceDepthExceeded { depth: usize, max: usize },
}

/// Recoverable runtime errors, surfaced as Indeterminate decisions.
///
/// Cloneable so dynamic-reference resolution failures can be cached sticky
/// for the remainder of the request.
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("missing attribute {id} of category {category}")]
    MissingAttribute {
        category: AttributeCategory,
        id: AttributeId,
        issuer: Option<String>,
    },

    #[error("expected a value of type {expected}, got {found}")]
    TypeMismatch {
        expected: AttributeDatatype,
        found: String,
    },

    #[error("expected a bag with exactly one value, got {len}")]
    BagArity { len: usize },

    #[error("function '{function_id}' failed: {message}")]
    Function {
        function_id: String,
        message: String,
    },

    #[error("variable '{variable_id}' could not be evaluated: {source}")]
    Variable {
        variable_id: String,
        #[source]
        source: Box<EvaluationError>,
    },

    #[error("error evaluating Match #{index}: {source}")]
    Match {
        index: usize,
        #[source]
        source: Box<EvaluationError>,
    },

    #[error("obligation/advice '{pep_id}' could not be fulfilled: {source}")]
    PepAssignment {
        pep_id: String,
        #[source]
        source: Box<EvaluationError>,
    },

    #[error("XPath evaluation failed for {path:?}: {message}")]
    XPath { path: String, message: String },

    #[error("no {kind} matching reference '{id}' {constraints}")]
    UnresolvedReference {
        kind: PolicyKind,
        id: String,
        constraints: String,
    },

    #[error("policy reference cycle: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    #[error("policy reference chain of length {depth} exceeds the maximum of {max}")]
    ReferenceDepthExceeded { depth: usize, max: usize },

    #[error("internal evaluation error: {message}")]
    Internal { message: String },
}

impl EvaluationError {
    /// The XACML status code this error surfaces as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAttribute { .. } => StatusCode::MissingAttribute,
            Self::Variable { source, .. }
            | Self::Match { source, .. }
            | Self::PepAssignment { source, .. } => source.status_code(),
            _ => StatusCode::ProcessingError,
        }
    }

    pub fn status(&self) -> Status {
        Status::new(self.status_code(), self.to_string())
    }
}

impl From<BagError> for EvaluationError {
    fn from(err: BagError) -> Self {
        match err {
            BagError::MixedDatatypes { expected, found } => Self::TypeMismatch {
                expected,
                found: found.to_string(),
            },
            BagError::NotSingleton { len } => Self::BagArity { len },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attribute_status_code() {
        let err = EvaluationError::MissingAttribute {
            category: AttributeCategory::access_subject(),
            id: AttributeId::subject_id(),
            issuer: None,
        };
        assert_eq!(err.status_code(), StatusCode::MissingAttribute);
    }

    #[test]
    fn wrappers_preserve_inner_status_code() {
        let inner = EvaluationError::MissingAttribute {
            category: AttributeCategory::resource(),
            id: AttributeId::resource_id(),
            issuer: None,
        };
        let wrapped = EvaluationError::Match {
            index: 2,
            source: Box::new(inner),
        };
        assert_eq!(wrapped.status_code(), StatusCode::MissingAttribute);
        assert!(wrapped.to_string().contains("Match #2"));
    }
}
