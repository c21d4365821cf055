//! The Policy / PolicySet evaluator.
//!
//! One immutable evaluator serves both element kinds: the pre-bound
//! combining algorithm abstracts whether the children are rules or child
//! policies. Construction happens in the builder; evaluation follows the
//! protocol: memo lookup, target test, eager local variables, combining
//! algorithm, extended-indeterminate combination with a target error, own
//! PEP actions, applicable-policy emission, memo store.

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use crate::domain::{
    Decision, DecisionBias, DecisionResult, Effect, EvaluationError, ExtendedDecision,
    PolicyRefsMetadata, PrimaryPolicyMetadata, Status,
};
use crate::evaluator::combining::CombiningAlg;
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::pep_action::PepActionExpressions;
use crate::evaluator::target::TargetEvaluator;
use crate::expression::Expression;

/// A local variable of a policy, evaluated eagerly before the combining
/// algorithm runs and visible to the policy's descendants only.
pub struct LocalVariable {
    pub(crate) id: Arc<str>,
    pub(crate) expression: Arc<Expression>,
}

/// Compiled evaluator for a `Policy` or `PolicySet`.
pub struct TopLevelPolicyElementEvaluator {
    meta: PrimaryPolicyMetadata,
    target: TargetEvaluator,
    local_variables: Vec<LocalVariable>,
    combiner: Box<dyn CombiningAlg>,
    pep_expressions: PepActionExpressions,
    refs_metadata: PolicyRefsMetadata,
    /// Transitively-enclosed policy identities, used by enclosing builders
    /// to reject duplicate identities within one tree.
    enclosed: IndexSet<PrimaryPolicyMetadata>,
    /// Per-request memo discriminator, derived from the stable identity.
    cache_key: String,
}

impl std::fmt::Debug for TopLevelPolicyElementEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopLevelPolicyElementEvaluator")
            .field("meta", &self.meta)
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

impl TopLevelPolicyElementEvaluator {
    pub(crate) fn new(
        meta: PrimaryPolicyMetadata,
        target: TargetEvaluator,
        local_variables: Vec<LocalVariable>,
        combiner: Box<dyn CombiningAlg>,
        pep_expressions: PepActionExpressions,
        refs_metadata: PolicyRefsMetadata,
        enclosed: IndexSet<PrimaryPolicyMetadata>,
    ) -> Self {
        let cache_key = meta.to_string();
        Self {
            meta,
            target,
            local_variables,
            combiner,
            pep_expressions,
            refs_metadata,
            enclosed,
            cache_key,
        }
    }

    pub fn metadata(&self) -> &PrimaryPolicyMetadata {
        &self.meta
    }

    pub fn refs_metadata(&self) -> &PolicyRefsMetadata {
        &self.refs_metadata
    }

    pub(crate) fn enclosed_identities(&self) -> &IndexSet<PrimaryPolicyMetadata> {
        &self.enclosed
    }

    /// The target applicability test alone, for only-one-applicable.
    pub fn is_applicable_by_target(
        &self,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<bool, EvaluationError> {
        self.target.evaluate(ctx)
    }

    /// Evaluates this policy in the request context.
    ///
    /// `skip_target` is set by only-one-applicable, which has already
    /// established target applicability separately; the memo keeps one
    /// slot per flag value.
    #[tracing::instrument(level = "debug", skip(self, ctx), fields(policy = %self.meta))]
    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>, skip_target: bool) -> DecisionResult {
        if let Some(cached) = ctx.cached_decision(&self.cache_key, skip_target) {
            debug!("returning memoized decision");
            return cached.clone();
        }

        let result = self.evaluate_uncached(ctx, skip_target);

        // Local variables must not leak out of this policy, whichever path
        // produced the result.
        for variable in &self.local_variables {
            ctx.remove_variable(&variable.id);
        }

        ctx.cache_decision(&self.cache_key, skip_target, result.clone());
        result
    }

    fn evaluate_uncached(
        &self,
        ctx: &mut EvaluationContext<'_>,
        skip_target: bool,
    ) -> DecisionResult {
        // Target first; an Indeterminate target does not end evaluation —
        // its combination with the children's outcome is decided below.
        let target_error: Option<EvaluationError> = if skip_target {
            None
        } else {
            match self.target.evaluate(ctx) {
                Ok(true) => None,
                Ok(false) => return DecisionResult::not_applicable(Status::ok()),
                Err(e) => Some(e),
            }
        };

        // Local variables, eagerly and in declaration order.
        for variable in &self.local_variables {
            match variable.expression.evaluate(ctx) {
                Ok(value) => ctx.set_variable(variable.id.clone(), value),
                Err(e) => {
                    let error = EvaluationError::Variable {
                        variable_id: variable.id.to_string(),
                        source: Box::new(e),
                    };
                    return DecisionResult::indeterminate(DecisionBias::DenyPermit, error.status());
                }
            }
        }

        let mut pep_actions = Vec::new();
        let mut applicable = Vec::new();
        let alg_decision = self.combiner.evaluate(ctx, &mut pep_actions, &mut applicable);

        // Extended-indeterminate combination of the target error with the
        // combining result (XACML 3.0 §7.14).
        let mut decision = match (target_error, alg_decision) {
            (None, alg_decision) => alg_decision,
            (Some(_), ExtendedDecision::NotApplicable) => {
                return DecisionResult::not_applicable(Status::ok());
            }
            (Some(e), ExtendedDecision::Permit) => {
                ExtendedDecision::indeterminate(DecisionBias::Permit, e.status())
            }
            (Some(e), ExtendedDecision::Deny) => {
                ExtendedDecision::indeterminate(DecisionBias::Deny, e.status())
            }
            (Some(_), indeterminate @ ExtendedDecision::Indeterminate { .. }) => indeterminate,
        };

        // Own obligations/advice fire only on a determinate outcome, after
        // the children's actions.
        if let Some(effect) = match decision {
            ExtendedDecision::Permit => Some(Effect::Permit),
            ExtendedDecision::Deny => Some(Effect::Deny),
            _ => None,
        } {
            for expression in self.pep_expressions.for_effect(effect) {
                match expression.evaluate(ctx) {
                    Ok(action) => pep_actions.push(action),
                    Err(e) => {
                        decision = ExtendedDecision::indeterminate(effect.bias(), e.status());
                        break;
                    }
                }
            }
        }

        let mut result = match decision {
            ExtendedDecision::Permit => DecisionResult::determinate(Effect::Permit, pep_actions),
            ExtendedDecision::Deny => DecisionResult::determinate(Effect::Deny, pep_actions),
            ExtendedDecision::NotApplicable => DecisionResult::not_applicable(Status::ok()),
            ExtendedDecision::Indeterminate { bias, status } => {
                DecisionResult::indeterminate(bias, status)
            }
        };

        // Applicable ≡ contributed a decision other than NotApplicable;
        // children registered themselves already, the parent goes last.
        if result.decision != Decision::NotApplicable && ctx.returns_applicable_policies() {
            applicable.push(self.meta.clone());
            result.applicable_policies = applicable;
        }
        result
    }
}
