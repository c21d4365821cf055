//! Rule evaluation: the leaf decision maker.

use crate::domain::{DecisionResult, Effect, EvaluationError, Status};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::pep_action::PepActionExpression;
use crate::evaluator::target::TargetEvaluator;
use crate::expression::Expression;

/// A rule condition: a boolean single-valued expression.
pub struct ConditionEvaluator {
    expression: Expression,
}

impl ConditionEvaluator {
    pub(crate) fn new(expression: Expression) -> Self {
        Self { expression }
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        self.expression.evaluate(ctx)?.as_boolean()
    }

    pub(crate) fn constant_value(&self) -> Option<bool> {
        self.expression.constant_bool()
    }
}

/// A rule: effect, own target, optional condition, and the PEP action
/// expressions that fire with its effect.
pub struct RuleEvaluator {
    id: String,
    effect: Effect,
    target: TargetEvaluator,
    condition: Option<ConditionEvaluator>,
    pep_expressions: Vec<PepActionExpression>,
    /// Set when the condition is constantly false: the rule can only ever
    /// be NotApplicable, so evaluation short-circuits. The rule is kept in
    /// the tree for diagnostics.
    always_not_applicable: bool,
}

impl RuleEvaluator {
    pub(crate) fn new(
        id: String,
        effect: Effect,
        target: TargetEvaluator,
        condition: Option<ConditionEvaluator>,
        pep_expressions: Vec<PepActionExpression>,
    ) -> Self {
        let always_not_applicable = condition
            .as_ref()
            .and_then(ConditionEvaluator::constant_value)
            == Some(false);
        // A constant-true condition is equivalent to no condition at all.
        let condition = match condition {
            Some(c) if c.constant_value() == Some(true) => None,
            other => other,
        };
        Self {
            id,
            effect,
            target,
            condition,
            pep_expressions,
            always_not_applicable,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub(crate) fn is_always_not_applicable(&self) -> bool {
        self.always_not_applicable
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        if self.always_not_applicable {
            return DecisionResult::not_applicable(Status::ok());
        }

        match self.target.evaluate(ctx) {
            Ok(false) => return DecisionResult::not_applicable(Status::ok()),
            Err(e) => {
                return DecisionResult::indeterminate(self.effect.bias(), e.status());
            }
            Ok(true) => {}
        }

        if let Some(condition) = &self.condition {
            match condition.evaluate(ctx) {
                Ok(true) => {}
                Ok(false) => return DecisionResult::not_applicable(Status::ok()),
                Err(e) => {
                    return DecisionResult::indeterminate(self.effect.bias(), e.status());
                }
            }
        }

        let mut pep_actions = Vec::with_capacity(self.pep_expressions.len());
        for expression in &self.pep_expressions {
            match expression.evaluate(ctx) {
                Ok(action) => pep_actions.push(action),
                Err(e) => {
                    // XACML 7.18: a failing assignment makes the whole rule
                    // indeterminate, biased toward its effect.
                    return DecisionResult::indeterminate(self.effect.bias(), e.status());
                }
            }
        }
        DecisionResult::determinate(self.effect, pep_actions)
    }
}
