//! Policy reference evaluators and the policy-set child variants.
//!
//! Static references were resolved when the tree was built and simply
//! delegate. Dynamic references resolve through the provider once per
//! request, cache the outcome sticky in the context — errors included —
//! and re-run the chain check on every use, because the same policy can
//! be reached through a different chain that would form a cycle.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    DecisionBias, DecisionResult, EvaluationError, PolicyKind, PolicyRefsMetadata,
    PolicyVersion, PolicyVersionPatterns,
};
use crate::evaluator::combining::Decidable;
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::policy::TopLevelPolicyElementEvaluator;
use crate::ports::PolicyProvider;

/// A compile-time-resolved reference.
pub struct StaticPolicyRefEvaluator {
    kind: PolicyKind,
    id: String,
    constraints: PolicyVersionPatterns,
    resolved: Arc<TopLevelPolicyElementEvaluator>,
    refs_metadata: PolicyRefsMetadata,
}

impl StaticPolicyRefEvaluator {
    pub(crate) fn new(
        kind: PolicyKind,
        id: String,
        constraints: PolicyVersionPatterns,
        resolved: Arc<TopLevelPolicyElementEvaluator>,
    ) -> Self {
        let mut refs_metadata = PolicyRefsMetadata::new();
        refs_metadata.ref_policies.insert(resolved.metadata().clone());
        refs_metadata
            .ref_policies
            .extend(resolved.refs_metadata().ref_policies.iter().cloned());
        if kind == PolicyKind::PolicySet {
            refs_metadata.longest_ref_chain = std::iter::once(id.clone())
                .chain(resolved.refs_metadata().longest_ref_chain.iter().cloned())
                .collect();
        }
        Self {
            kind,
            id,
            constraints,
            resolved,
            refs_metadata,
        }
    }

    pub fn refs_metadata(&self) -> &PolicyRefsMetadata {
        &self.refs_metadata
    }

    /// The resolved version — fixed for the process lifetime.
    pub fn policy_version(&self) -> &PolicyVersion {
        &self.resolved.metadata().version
    }

    fn evaluate_with(&self, ctx: &mut EvaluationContext<'_>, skip_target: bool) -> DecisionResult {
        if self.kind == PolicyKind::PolicySet {
            ctx.push_ref(self.id.clone());
        }
        let result = self.resolved.evaluate(ctx, skip_target);
        if self.kind == PolicyKind::PolicySet {
            ctx.pop_ref();
        }
        result
    }
}

impl PartialEq for StaticPolicyRefEvaluator {
    fn eq(&self, other: &Self) -> bool {
        (self.kind, &self.id, &self.constraints)
            == (other.kind, &other.id, &other.constraints)
    }
}

impl std::fmt::Debug for StaticPolicyRefEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPolicyRefEvaluator")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

/// A reference resolved per request through a [`PolicyProvider`].
pub struct DynamicPolicyRefEvaluator {
    kind: PolicyKind,
    id: String,
    constraints: PolicyVersionPatterns,
    provider: Arc<dyn PolicyProvider>,
    refs_metadata: PolicyRefsMetadata,
    cache_key: String,
}

impl DynamicPolicyRefEvaluator {
    pub(crate) fn new(
        kind: PolicyKind,
        id: String,
        constraints: PolicyVersionPatterns,
        provider: Arc<dyn PolicyProvider>,
    ) -> Self {
        let mut refs_metadata = PolicyRefsMetadata::new();
        if kind == PolicyKind::PolicySet {
            // The referenced subtree is unknown until resolution; the chain
            // contribution known statically is the edge itself.
            refs_metadata.longest_ref_chain = vec![id.clone()];
        }
        let cache_key = format!("{kind}:{id}:{}", constraints);
        Self {
            kind,
            id,
            constraints,
            provider,
            refs_metadata,
            cache_key,
        }
    }

    pub fn refs_metadata(&self) -> &PolicyRefsMetadata {
        &self.refs_metadata
    }

    /// Dynamic references have no fixed version until resolved in a
    /// request context.
    pub fn policy_version(&self) -> Option<&PolicyVersion> {
        None
    }

    /// Resolves the reference in this request, caching the outcome sticky.
    /// Chain checks run on every call, cached or not.
    fn resolve(
        &self,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, EvaluationError> {
        // Chain with the target id appended; catches direct cycles against
        // the chain already being traversed, and depth violations.
        let chain_with_target: Option<Vec<String>> = match self.kind {
            PolicyKind::PolicySet => Some(
                self.provider
                    .join_policy_ref_chains(ctx.ref_chain(), std::slice::from_ref(&self.id))?,
            ),
            PolicyKind::Policy => None,
        };

        let resolved = match ctx.cached_reference(&self.cache_key).cloned() {
            Some(resolution) => {
                debug!(reference = %self.cache_key, "reusing per-request resolution");
                resolution?
            }
            None => {
                let resolution = self.provider.get(
                    self.kind,
                    &self.id,
                    &self.constraints,
                    chain_with_target.as_deref(),
                    Some(&*ctx),
                );
                ctx.cache_reference(self.cache_key.clone(), resolution.clone());
                resolution?
            }
        };

        // Transitive check: the resolved policy's own longest chain joins
        // under this chain. Not cacheable — it depends on where in the
        // tree the reference was reached.
        if let Some(chain) = &chain_with_target {
            self.provider
                .join_policy_ref_chains(chain, &resolved.refs_metadata().longest_ref_chain)?;
        }
        Ok(resolved)
    }

    fn is_applicable_by_target(
        &self,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<bool, EvaluationError> {
        let resolved = self.resolve(ctx)?;
        resolved.is_applicable_by_target(ctx)
    }

    fn evaluate_with(&self, ctx: &mut EvaluationContext<'_>, skip_target: bool) -> DecisionResult {
        let resolved = match self.resolve(ctx) {
            Ok(resolved) => resolved,
            Err(e) => {
                return DecisionResult::indeterminate(DecisionBias::DenyPermit, e.status());
            }
        };
        if self.kind == PolicyKind::PolicySet {
            ctx.push_ref(self.id.clone());
        }
        let result = resolved.evaluate(ctx, skip_target);
        if self.kind == PolicyKind::PolicySet {
            ctx.pop_ref();
        }
        result
    }
}

impl PartialEq for DynamicPolicyRefEvaluator {
    fn eq(&self, other: &Self) -> bool {
        (self.kind, &self.id, &self.constraints)
            == (other.kind, &other.id, &other.constraints)
    }
}

/// A child of a policy set: a nested policy or set, or a reference.
pub enum PolicySetChild {
    Policy(Arc<TopLevelPolicyElementEvaluator>),
    PolicySet(Arc<TopLevelPolicyElementEvaluator>),
    StaticRef(StaticPolicyRefEvaluator),
    DynamicRef(DynamicPolicyRefEvaluator),
}

impl PolicySetChild {
    pub(crate) fn is_applicable_by_target(
        &self,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<bool, EvaluationError> {
        match self {
            Self::Policy(e) | Self::PolicySet(e) => e.is_applicable_by_target(ctx),
            Self::StaticRef(r) => r.resolved.is_applicable_by_target(ctx),
            Self::DynamicRef(r) => r.is_applicable_by_target(ctx),
        }
    }

    pub(crate) fn evaluate_with(
        &self,
        ctx: &mut EvaluationContext<'_>,
        skip_target: bool,
    ) -> DecisionResult {
        match self {
            Self::Policy(e) | Self::PolicySet(e) => e.evaluate(ctx, skip_target),
            Self::StaticRef(r) => r.evaluate_with(ctx, skip_target),
            Self::DynamicRef(r) => r.evaluate_with(ctx, skip_target),
        }
    }

    pub(crate) fn refs_metadata(&self) -> &PolicyRefsMetadata {
        match self {
            Self::Policy(e) | Self::PolicySet(e) => e.refs_metadata(),
            Self::StaticRef(r) => r.refs_metadata(),
            Self::DynamicRef(r) => r.refs_metadata(),
        }
    }

    /// Every policy identity this child pins into the enclosing tree.
    /// Dynamic references contribute nothing until resolution.
    pub(crate) fn enclosed_identities(&self) -> Vec<crate::domain::PrimaryPolicyMetadata> {
        match self {
            Self::Policy(e) | Self::PolicySet(e) => std::iter::once(e.metadata().clone())
                .chain(e.enclosed_identities().iter().cloned())
                .collect(),
            Self::StaticRef(r) => r.refs_metadata.ref_policies.iter().cloned().collect(),
            Self::DynamicRef(_) => Vec::new(),
        }
    }
}

impl Decidable for PolicySetChild {
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        self.evaluate_with(ctx, false)
    }
}
