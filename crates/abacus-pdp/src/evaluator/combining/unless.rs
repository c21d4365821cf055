//! Deny-unless-permit and permit-unless-deny: Indeterminate and
//! NotApplicable collapse into the default effect.

use crate::domain::{Effect, ExtendedDecision, PepAction, PrimaryPolicyMetadata};
use crate::evaluator::context::EvaluationContext;

use super::{CombiningAlg, Decidable};

pub(super) struct UnlessAlg<C> {
    default_effect: Effect,
    children: Vec<C>,
}

impl<C> UnlessAlg<C> {
    pub(super) fn new(default_effect: Effect, children: Vec<C>) -> Self {
        Self {
            default_effect,
            children,
        }
    }
}

impl<C: Decidable> CombiningAlg for UnlessAlg<C> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_>,
        out_pep: &mut Vec<PepAction>,
        out_applicable: &mut Vec<PrimaryPolicyMetadata>,
    ) -> ExtendedDecision {
        let winning = self.default_effect.opposite();
        let mut default_pep: Vec<PepAction> = Vec::new();

        for child in &self.children {
            let result = child.evaluate(ctx);
            out_applicable.extend(result.applicable_policies.iter().cloned());
            if result.decision == winning.decision() {
                out_pep.extend(result.pep_actions);
                return ExtendedDecision::determinate(winning);
            }
            if result.decision == self.default_effect.decision() {
                default_pep.extend(result.pep_actions);
            }
        }

        out_pep.extend(default_pep);
        ExtendedDecision::determinate(self.default_effect)
    }
}
