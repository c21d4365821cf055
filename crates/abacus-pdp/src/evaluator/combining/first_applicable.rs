//! First-applicable: the first child whose decision is not NotApplicable
//! wins, Indeterminate included.

use crate::domain::{Decision, ExtendedDecision, PepAction, PrimaryPolicyMetadata};
use crate::evaluator::context::EvaluationContext;

use super::{CombiningAlg, Decidable};

pub(super) struct FirstApplicableAlg<C> {
    children: Vec<C>,
}

impl<C> FirstApplicableAlg<C> {
    pub(super) fn new(children: Vec<C>) -> Self {
        Self { children }
    }
}

impl<C: Decidable> CombiningAlg for FirstApplicableAlg<C> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_>,
        out_pep: &mut Vec<PepAction>,
        out_applicable: &mut Vec<PrimaryPolicyMetadata>,
    ) -> ExtendedDecision {
        for child in &self.children {
            let result = child.evaluate(ctx);
            out_applicable.extend(result.applicable_policies.iter().cloned());
            if result.decision != Decision::NotApplicable {
                let decision = result.extended();
                out_pep.extend(result.pep_actions);
                return decision;
            }
        }
        ExtendedDecision::NotApplicable
    }
}
