//! # Combining Algorithms
//!
//! Strategies reducing an ordered list of child decisions into one. Each
//! algorithm instance is pre-bound to its children at build time; at
//! evaluation it consumes child results, accumulates fulfilled PEP
//! actions and applicable-policy metadata into the caller's collectors,
//! and returns an [`ExtendedDecision`].
//!
//! Children are always evaluated in declaration order, so the `ordered-*`
//! algorithm identifiers alias the plain implementations.

mod dp_overrides;
mod first_applicable;
mod only_one_applicable;
mod unless;

use std::sync::Arc;

use crate::domain::{
    DecisionResult, Effect, ExtendedDecision, PepAction, PolicyBuildError, PrimaryPolicyMetadata,
};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::reference::PolicySetChild;
use crate::evaluator::rule::RuleEvaluator;

use dp_overrides::DpOverridesAlg;
use first_applicable::FirstApplicableAlg;
use only_one_applicable::OnlyOneApplicableAlg;
use unless::UnlessAlg;

/// Anything a combining algorithm can ask for a decision: a rule, or a
/// policy-set child (policy, nested set, or reference).
pub trait Decidable: Send + Sync {
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult;
}

impl<T: Decidable> Decidable for Arc<T> {
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        (**self).evaluate(ctx)
    }
}

impl Decidable for RuleEvaluator {
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        RuleEvaluator::evaluate(self, ctx)
    }
}

/// A combining algorithm pre-bound to its ordered children.
pub trait CombiningAlg: Send + Sync {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_>,
        out_pep: &mut Vec<PepAction>,
        out_applicable: &mut Vec<PrimaryPolicyMetadata>,
    ) -> ExtendedDecision;
}

impl std::fmt::Debug for dyn CombiningAlg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<dyn CombiningAlg>")
    }
}

/// Resolves combining-algorithm identifiers to pre-bound evaluators, per
/// child kind. A port, so deployments can plug extension algorithms in.
pub trait CombiningAlgRegistry: Send + Sync {
    fn rule_combiner(
        &self,
        alg_id: &str,
        rules: Vec<Arc<RuleEvaluator>>,
    ) -> Result<Box<dyn CombiningAlg>, PolicyBuildError>;

    fn policy_combiner(
        &self,
        alg_id: &str,
        children: Vec<PolicySetChild>,
    ) -> Result<Box<dyn CombiningAlg>, PolicyBuildError>;
}

const RULE_ALG_30: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:";
const RULE_ALG_10: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:";
const POLICY_ALG_30: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:";
const POLICY_ALG_10: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:";

/// The standard XACML 3.0 algorithm set.
pub struct StandardCombiningAlgRegistry;

impl StandardCombiningAlgRegistry {
    pub fn new() -> Self {
        Self
    }

    fn shared<C: Decidable + 'static>(
        suffix: &str,
        children: Vec<C>,
    ) -> Option<Box<dyn CombiningAlg>> {
        match suffix {
            "deny-overrides" | "ordered-deny-overrides" => {
                Some(Box::new(DpOverridesAlg::new(Effect::Deny, children)))
            }
            "permit-overrides" | "ordered-permit-overrides" => {
                Some(Box::new(DpOverridesAlg::new(Effect::Permit, children)))
            }
            "deny-unless-permit" => Some(Box::new(UnlessAlg::new(Effect::Deny, children))),
            "permit-unless-deny" => Some(Box::new(UnlessAlg::new(Effect::Permit, children))),
            _ => None,
        }
    }
}

impl Default for StandardCombiningAlgRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CombiningAlgRegistry for StandardCombiningAlgRegistry {
    fn rule_combiner(
        &self,
        alg_id: &str,
        rules: Vec<Arc<RuleEvaluator>>,
    ) -> Result<Box<dyn CombiningAlg>, PolicyBuildError> {
        let unknown = || PolicyBuildError::UnknownCombiningAlgorithm {
            alg_id: alg_id.to_string(),
        };
        // The 1.0-namespaced overrides identifiers stayed valid in 3.0 and
        // resolve to the same algorithms; the unless family is 3.0-only.
        if let Some(suffix) = alg_id.strip_prefix(RULE_ALG_10) {
            return match suffix {
                "first-applicable" => Ok(Box::new(FirstApplicableAlg::new(rules))),
                "deny-unless-permit" | "permit-unless-deny" => Err(unknown()),
                _ => Self::shared(suffix, rules).ok_or_else(unknown),
            };
        }
        let suffix = alg_id.strip_prefix(RULE_ALG_30).ok_or_else(unknown)?;
        Self::shared(suffix, rules).ok_or_else(unknown)
    }

    fn policy_combiner(
        &self,
        alg_id: &str,
        children: Vec<PolicySetChild>,
    ) -> Result<Box<dyn CombiningAlg>, PolicyBuildError> {
        let unknown = || PolicyBuildError::UnknownCombiningAlgorithm {
            alg_id: alg_id.to_string(),
        };
        if let Some(suffix) = alg_id.strip_prefix(POLICY_ALG_10) {
            return match suffix {
                "first-applicable" => Ok(Box::new(FirstApplicableAlg::new(children))),
                "only-one-applicable" => Ok(Box::new(OnlyOneApplicableAlg::new(children))),
                "deny-unless-permit" | "permit-unless-deny" => Err(unknown()),
                _ => Self::shared(suffix, children).ok_or_else(unknown),
            };
        }
        let suffix = alg_id.strip_prefix(POLICY_ALG_30).ok_or_else(unknown)?;
        Self::shared(suffix, children).ok_or_else(unknown)
    }
}
