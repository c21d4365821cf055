//! Only-one-applicable: exactly one child policy may match the request by
//! target; that child is then evaluated with its target test skipped.
//!
//! Defined over policy children only — the registry never binds it to
//! rules.

use crate::domain::{DecisionBias, ExtendedDecision, PepAction, PrimaryPolicyMetadata, Status};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::reference::PolicySetChild;

use super::CombiningAlg;

pub(super) struct OnlyOneApplicableAlg {
    children: Vec<PolicySetChild>,
}

impl OnlyOneApplicableAlg {
    pub(super) fn new(children: Vec<PolicySetChild>) -> Self {
        Self { children }
    }
}

impl CombiningAlg for OnlyOneApplicableAlg {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_>,
        out_pep: &mut Vec<PepAction>,
        out_applicable: &mut Vec<PrimaryPolicyMetadata>,
    ) -> ExtendedDecision {
        let mut selected: Option<&PolicySetChild> = None;
        for child in &self.children {
            match child.is_applicable_by_target(ctx) {
                Err(e) => {
                    return ExtendedDecision::indeterminate(DecisionBias::DenyPermit, e.status());
                }
                Ok(true) => {
                    if selected.is_some() {
                        return ExtendedDecision::indeterminate(
                            DecisionBias::DenyPermit,
                            Status::processing_error(
                                "more than one policy is applicable to the request",
                            ),
                        );
                    }
                    selected = Some(child);
                }
                Ok(false) => {}
            }
        }

        match selected {
            None => ExtendedDecision::NotApplicable,
            Some(child) => {
                let result = child.evaluate_with(ctx, true);
                out_applicable.extend(result.applicable_policies.iter().cloned());
                let decision = result.extended();
                out_pep.extend(result.pep_actions);
                decision
            }
        }
    }
}
