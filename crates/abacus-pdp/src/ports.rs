//! Ports the evaluation core consumes.

use std::sync::Arc;

use crate::domain::{EvaluationError, PolicyKind, PolicyVersionPatterns};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::policy::TopLevelPolicyElementEvaluator;

/// External resolver of policy references.
///
/// Given a policy identity and version constraints, a provider yields the
/// best-matching compiled evaluator: the latest registered version
/// satisfying every constraint. Static providers are pure (same inputs
/// resolve to the same policy for the process lifetime), which is what
/// allows compile-time reference expansion.
pub trait PolicyProvider: Send + Sync {
    /// Maximum length a policy-set reference chain may reach, or `None`
    /// for unbounded.
    fn max_policy_ref_depth(&self) -> Option<usize>;

    /// Resolves a reference.
    ///
    /// For `PolicySet` references, `ref_chain_with_target` carries the
    /// chain of policy-set ids from the evaluation root down to and
    /// including the requested id; implementations must verify that
    /// joining it with the resolved policy's own longest reference chain
    /// violates neither the cycle nor the depth rule. `ctx` is present for
    /// per-request resolution and absent at compile time.
    fn get(
        &self,
        kind: PolicyKind,
        id: &str,
        constraints: &PolicyVersionPatterns,
        ref_chain_with_target: Option<&[String]>,
        ctx: Option<&EvaluationContext<'_>>,
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, EvaluationError>;

    /// Joins two reference chains, failing on a repeated policy id (cycle)
    /// or when the joined length exceeds [`Self::max_policy_ref_depth`].
    fn join_policy_ref_chains(
        &self,
        head: &[String],
        tail: &[String],
    ) -> Result<Vec<String>, EvaluationError> {
        let mut joined: Vec<String> = head.to_vec();
        for id in tail {
            if joined.iter().any(|existing| existing == id) {
                let mut chain = joined;
                chain.push(id.clone());
                return Err(EvaluationError::ReferenceCycle { chain });
            }
            joined.push(id.clone());
        }
        if let Some(max) = self.max_policy_ref_depth()
            && joined.len() > max
        {
            return Err(EvaluationError::ReferenceDepthExceeded {
                depth: joined.len(),
                max,
            });
        }
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DepthOnlyProvider {
        max: Option<usize>,
    }

    impl PolicyProvider for DepthOnlyProvider {
        fn max_policy_ref_depth(&self) -> Option<usize> {
            self.max
        }

        fn get(
            &self,
            _kind: PolicyKind,
            _id: &str,
            _constraints: &PolicyVersionPatterns,
            _ref_chain_with_target: Option<&[String]>,
            _ctx: Option<&EvaluationContext<'_>>,
        ) -> Result<Arc<TopLevelPolicyElementEvaluator>, EvaluationError> {
            unimplemented!("chain-joining tests never resolve")
        }
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn join_appends_in_order() {
        let provider = DepthOnlyProvider { max: None };
        let joined = provider
            .join_policy_ref_chains(&ids(&["a", "b"]), &ids(&["c"]))
            .unwrap();
        assert_eq!(joined, ids(&["a", "b", "c"]));
    }

    #[test]
    fn join_detects_cycles() {
        let provider = DepthOnlyProvider { max: None };
        let err = provider
            .join_policy_ref_chains(&ids(&["a", "b"]), &ids(&["c", "a"]))
            .unwrap_err();
        match err {
            EvaluationError::ReferenceCycle { chain } => {
                assert_eq!(chain, ids(&["a", "b", "c", "a"]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn join_enforces_depth() {
        let provider = DepthOnlyProvider { max: Some(2) };
        assert!(
            provider
                .join_policy_ref_chains(&ids(&["a"]), &ids(&["b"]))
                .is_ok()
        );
        let err = provider
            .join_policy_ref_chains(&ids(&["a", "b"]), &ids(&["c"]))
            .unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::ReferenceDepthExceeded { depth: 3, max: 2 }
        ));
    }
}
