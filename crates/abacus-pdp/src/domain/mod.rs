//! Domain model of the decision engine: decisions, PEP actions, policy
//! versions and identities, parsed policy documents, and the error
//! taxonomy.

pub mod decision;
pub mod document;
pub mod error;
pub mod metadata;
pub mod pep_action;
pub mod version;

pub use decision::{
    Decision, DecisionBias, DecisionResult, Effect, ExtendedDecision, Status, StatusCode,
};
pub use error::{EvaluationError, PolicyBuildError};
pub use metadata::{PolicyKind, PolicyRefsMetadata, PrimaryPolicyMetadata};
pub use pep_action::{PepAction, PepActionAssignment};
pub use version::{PolicyVersion, PolicyVersionPatterns, VersionError, VersionPattern};
