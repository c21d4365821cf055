//! Deny-overrides and permit-overrides, as one implementation
//! parameterized by the overriding effect (XACML 3.0 §C.2/§C.3).

use crate::domain::{
    Decision, DecisionBias, Effect, ExtendedDecision, PepAction, PrimaryPolicyMetadata, Status,
};
use crate::evaluator::context::EvaluationContext;

use super::{CombiningAlg, Decidable};

pub(super) struct DpOverridesAlg<C> {
    overriding: Effect,
    children: Vec<C>,
}

impl<C> DpOverridesAlg<C> {
    pub(super) fn new(overriding: Effect, children: Vec<C>) -> Self {
        Self {
            overriding,
            children,
        }
    }
}

impl<C: Decidable> CombiningAlg for DpOverridesAlg<C> {
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_>,
        out_pep: &mut Vec<PepAction>,
        out_applicable: &mut Vec<PrimaryPolicyMetadata>,
    ) -> ExtendedDecision {
        let overriding = self.overriding;
        let overridden = overriding.opposite();

        let mut first_ind_dp: Option<Status> = None;
        let mut first_ind_overriding: Option<Status> = None;
        let mut first_ind_overridden: Option<Status> = None;
        let mut overridden_pep: Vec<PepAction> = Vec::new();
        let mut saw_overridden = false;

        for child in &self.children {
            let result = child.evaluate(ctx);
            out_applicable.extend(result.applicable_policies.iter().cloned());
            match result.decision {
                Decision::Permit | Decision::Deny => {
                    if result.decision == overriding.decision() {
                        out_pep.extend(result.pep_actions);
                        return ExtendedDecision::determinate(overriding);
                    }
                    saw_overridden = true;
                    // Buffered: emitted only if the overridden effect wins.
                    overridden_pep.extend(result.pep_actions);
                }
                Decision::NotApplicable => {}
                Decision::Indeterminate => {
                    let status = result.status;
                    let slot = match result.bias.unwrap_or(DecisionBias::DenyPermit) {
                        DecisionBias::DenyPermit => &mut first_ind_dp,
                        bias if bias == overriding.bias() => &mut first_ind_overriding,
                        _ => &mut first_ind_overridden,
                    };
                    if slot.is_none() {
                        *slot = Some(status);
                    }
                }
            }
        }

        if let Some(status) = first_ind_dp {
            return ExtendedDecision::indeterminate(DecisionBias::DenyPermit, status);
        }
        if let Some(status) = first_ind_overriding {
            // An overriding-side error next to any overridden-side outcome
            // could have gone either way.
            let bias = if saw_overridden || first_ind_overridden.is_some() {
                DecisionBias::DenyPermit
            } else {
                overriding.bias()
            };
            return ExtendedDecision::indeterminate(bias, status);
        }
        if saw_overridden {
            out_pep.extend(overridden_pep);
            return ExtendedDecision::determinate(overridden);
        }
        if let Some(status) = first_ind_overridden {
            return ExtendedDecision::indeterminate(overridden.bias(), status);
        }
        ExtendedDecision::NotApplicable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DecisionResult;
    use kernel::DecisionRequest;

    /// A fixed-result child standing in for a rule or policy.
    struct Fixed(DecisionResult);

    impl Decidable for Fixed {
        fn evaluate(&self, _ctx: &mut EvaluationContext<'_>) -> DecisionResult {
            self.0.clone()
        }
    }

    fn run(alg: &dyn CombiningAlg) -> (ExtendedDecision, Vec<PepAction>) {
        let request = DecisionRequest::builder().build().unwrap();
        let mut ctx = EvaluationContext::new(&request);
        let mut pep = Vec::new();
        let mut applicable = Vec::new();
        let decision = alg.evaluate(&mut ctx, &mut pep, &mut applicable);
        (decision, pep)
    }

    fn permit() -> Fixed {
        Fixed(DecisionResult::determinate(Effect::Permit, vec![]))
    }

    fn deny() -> Fixed {
        Fixed(DecisionResult::determinate(Effect::Deny, vec![]))
    }

    fn not_applicable() -> Fixed {
        Fixed(DecisionResult::not_applicable(Status::ok()))
    }

    fn indeterminate(bias: DecisionBias) -> Fixed {
        Fixed(DecisionResult::indeterminate(
            bias,
            Status::processing_error("synthetic failure"),
        ))
    }

    #[test]
    fn deny_wins_immediately() {
        let alg = DpOverridesAlg::new(Effect::Deny, vec![permit(), deny(), permit()]);
        let (decision, _) = run(&alg);
        assert_eq!(decision, ExtendedDecision::Deny);
    }

    #[test]
    fn permit_wins_without_deny() {
        let alg = DpOverridesAlg::new(Effect::Deny, vec![not_applicable(), permit()]);
        let (decision, _) = run(&alg);
        assert_eq!(decision, ExtendedDecision::Permit);
    }

    #[test]
    fn indeterminate_d_then_permit_is_indeterminate_dp() {
        let alg = DpOverridesAlg::new(
            Effect::Deny,
            vec![indeterminate(DecisionBias::Deny), permit()],
        );
        let (decision, _) = run(&alg);
        assert!(matches!(
            decision,
            ExtendedDecision::Indeterminate {
                bias: DecisionBias::DenyPermit,
                ..
            }
        ));
    }

    #[test]
    fn lone_indeterminate_d_keeps_its_bias() {
        let alg = DpOverridesAlg::new(
            Effect::Deny,
            vec![indeterminate(DecisionBias::Deny), not_applicable()],
        );
        let (decision, _) = run(&alg);
        assert!(matches!(
            decision,
            ExtendedDecision::Indeterminate {
                bias: DecisionBias::Deny,
                ..
            }
        ));
    }

    #[test]
    fn indeterminate_p_alone_keeps_p_bias() {
        let alg = DpOverridesAlg::new(Effect::Deny, vec![indeterminate(DecisionBias::Permit)]);
        let (decision, _) = run(&alg);
        assert!(matches!(
            decision,
            ExtendedDecision::Indeterminate {
                bias: DecisionBias::Permit,
                ..
            }
        ));
    }

    #[test]
    fn permit_overrides_is_symmetric() {
        let alg = DpOverridesAlg::new(Effect::Permit, vec![deny(), permit()]);
        let (decision, _) = run(&alg);
        assert_eq!(decision, ExtendedDecision::Permit);

        let alg = DpOverridesAlg::new(
            Effect::Permit,
            vec![indeterminate(DecisionBias::Permit), deny()],
        );
        let (decision, _) = run(&alg);
        assert!(matches!(
            decision,
            ExtendedDecision::Indeterminate {
                bias: DecisionBias::DenyPermit,
                ..
            }
        ));
    }

    #[test]
    fn zero_children_is_not_applicable() {
        let alg = DpOverridesAlg::<Fixed>::new(Effect::Deny, vec![]);
        let (decision, _) = run(&alg);
        assert_eq!(decision, ExtendedDecision::NotApplicable);
    }

    #[test]
    fn overridden_actions_are_buffered_until_the_effect_wins() {
        use crate::domain::PepAction;

        let permit_with_action = Fixed(DecisionResult::determinate(
            Effect::Permit,
            vec![PepAction::obligation("urn:example:log", vec![])],
        ));
        let alg = DpOverridesAlg::new(Effect::Deny, vec![permit_with_action, deny()]);
        let (decision, pep) = run(&alg);
        // Deny wins: the buffered permit obligation must not leak.
        assert_eq!(decision, ExtendedDecision::Deny);
        assert!(pep.is_empty());
    }
}
