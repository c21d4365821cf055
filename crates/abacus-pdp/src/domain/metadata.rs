//! Policy identity and reference metadata.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::version::PolicyVersion;

/// Kind of a top-level policy element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    Policy,
    PolicySet,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy => f.write_str("Policy"),
            Self::PolicySet => f.write_str("PolicySet"),
        }
    }
}

/// Identity of a policy or policy set: kind, id and version.
///
/// Equality and hashing cover the whole triple. The `Display` form is
/// stable and doubles as the per-request cache discriminator of the
/// evaluator built from this policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryPolicyMetadata {
    pub kind: PolicyKind,
    pub id: String,
    pub version: PolicyVersion,
}

impl PrimaryPolicyMetadata {
    pub fn new(kind: PolicyKind, id: impl Into<String>, version: PolicyVersion) -> Self {
        Self {
            kind,
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for PrimaryPolicyMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}#v{}]", self.kind, self.id, self.version)
    }
}

/// Metadata about the policy references reachable from a policy set:
/// the transitive closure of referenced policy identities (insertion
/// order preserved) and the longest reference chain, used for depth
/// enforcement when chains join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRefsMetadata {
    pub ref_policies: IndexSet<PrimaryPolicyMetadata>,
    pub longest_ref_chain: Vec<String>,
}

impl PolicyRefsMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a child's reference metadata into this one, keeping the
    /// longer of the two chains.
    pub fn merge(&mut self, child: &PolicyRefsMetadata) {
        self.ref_policies
            .extend(child.ref_policies.iter().cloned());
        if child.longest_ref_chain.len() > self.longest_ref_chain.len() {
            self.longest_ref_chain = child.longest_ref_chain.clone();
        }
    }
}
