//! Compiled obligation and advice expressions.

use kernel::{AttributeCategory, AttributeId};

use crate::domain::{Effect, EvaluationError, PepAction, PepActionAssignment};
use crate::evaluator::context::EvaluationContext;
use crate::expression::{Expression, Value};

/// One compiled `AttributeAssignmentExpression`.
pub struct AssignmentExpression {
    pub(crate) attribute_id: AttributeId,
    pub(crate) category: Option<AttributeCategory>,
    pub(crate) issuer: Option<String>,
    pub(crate) expression: Expression,
}

/// A compiled `ObligationExpression` or `AdviceExpression`.
///
/// Evaluates to a concrete [`PepAction`] in a request context. A primitive
/// assignment value yields one assignment; a bag yields one assignment per
/// element in bag order. Any evaluation failure aborts the whole action —
/// the caller turns that into an Indeterminate decision.
pub struct PepActionExpression {
    pub(crate) id: String,
    pub(crate) is_mandatory: bool,
    pub(crate) applies_to: Effect,
    pub(crate) assignments: Vec<AssignmentExpression>,
}

impl PepActionExpression {
    pub fn applies_to(&self) -> Effect {
        self.applies_to
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<PepAction, EvaluationError> {
        let mut assignments = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            let value = assignment.expression.evaluate(ctx).map_err(|e| {
                EvaluationError::PepAssignment {
                    pep_id: self.id.clone(),
                    source: Box::new(e),
                }
            })?;
            match value {
                Value::Primitive(v) => assignments.push(PepActionAssignment {
                    attribute_id: assignment.attribute_id.clone(),
                    category: assignment.category.clone(),
                    issuer: assignment.issuer.clone(),
                    value: v,
                }),
                Value::Bag(bag) => {
                    for v in bag.iter() {
                        assignments.push(PepActionAssignment {
                            attribute_id: assignment.attribute_id.clone(),
                            category: assignment.category.clone(),
                            issuer: assignment.issuer.clone(),
                            value: v.clone(),
                        });
                    }
                }
            }
        }
        Ok(PepAction {
            id: self.id.clone(),
            is_mandatory: self.is_mandatory,
            assignments,
        })
    }
}

/// The deny- and permit-bound PEP action expressions of a policy, in
/// document order (obligations before advice, as in the schema).
#[derive(Default)]
pub struct PepActionExpressions {
    permit: Vec<PepActionExpression>,
    deny: Vec<PepActionExpression>,
}

impl PepActionExpressions {
    pub fn new(expressions: Vec<PepActionExpression>) -> Self {
        let mut permit = Vec::new();
        let mut deny = Vec::new();
        for e in expressions {
            match e.applies_to {
                Effect::Permit => permit.push(e),
                Effect::Deny => deny.push(e),
            }
        }
        Self { permit, deny }
    }

    pub fn for_effect(&self, effect: Effect) -> &[PepActionExpression] {
        match effect {
            Effect::Permit => &self.permit,
            Effect::Deny => &self.deny,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.permit.is_empty() && self.deny.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::{AttributeValue, Bag, DecisionRequest};

    fn literal_assignment(id: &str, value: AttributeValue) -> AssignmentExpression {
        AssignmentExpression {
            attribute_id: AttributeId::new(id),
            category: None,
            issuer: None,
            expression: Expression::Literal(value),
        }
    }

    #[test]
    fn assignments_keep_declaration_order() {
        let action = PepActionExpression {
            id: "urn:example:obligation:log".into(),
            is_mandatory: true,
            applies_to: Effect::Permit,
            assignments: vec![
                literal_assignment("urn:example:first", AttributeValue::string("a")),
                literal_assignment("urn:example:second", AttributeValue::string("b")),
            ],
        };
        let request = DecisionRequest::builder().build().unwrap();
        let mut ctx = EvaluationContext::new(&request);

        let fulfilled = action.evaluate(&mut ctx).unwrap();
        assert!(fulfilled.is_mandatory);
        assert_eq!(fulfilled.assignments.len(), 2);
        assert_eq!(fulfilled.assignments[0].attribute_id.as_str(), "urn:example:first");
        assert_eq!(fulfilled.assignments[1].attribute_id.as_str(), "urn:example:second");
    }

    #[test]
    fn bag_values_expand_to_one_assignment_per_element() {
        let mut bag = Bag::of(AttributeValue::string("x"));
        bag.merge(Bag::of(AttributeValue::string("y"))).unwrap();

        let request = DecisionRequest::builder()
            .attribute(
                kernel::AttributeFqn::new(
                    kernel::AttributeCategory::access_subject(),
                    AttributeId::new("urn:example:groups"),
                    None,
                ),
                bag,
            )
            .build()
            .unwrap();
        let mut ctx = EvaluationContext::new(&request);

        let action = PepActionExpression {
            id: "urn:example:advice:groups".into(),
            is_mandatory: false,
            applies_to: Effect::Permit,
            assignments: vec![AssignmentExpression {
                attribute_id: AttributeId::new("urn:example:group"),
                category: None,
                issuer: None,
                expression: Expression::Designator(crate::expression::AttributeDesignator {
                    category: kernel::AttributeCategory::access_subject(),
                    id: AttributeId::new("urn:example:groups"),
                    issuer: None,
                    datatype: kernel::AttributeDatatype::String,
                    must_be_present: true,
                }),
            }],
        };
        let fulfilled = action.evaluate(&mut ctx).unwrap();
        assert_eq!(fulfilled.assignments.len(), 2);
    }

    #[test]
    fn failed_assignment_aborts_the_action() {
        let request = DecisionRequest::builder().build().unwrap();
        let mut ctx = EvaluationContext::new(&request);

        let action = PepActionExpression {
            id: "urn:example:obligation:audit".into(),
            is_mandatory: true,
            applies_to: Effect::Deny,
            assignments: vec![AssignmentExpression {
                attribute_id: AttributeId::new("urn:example:who"),
                category: None,
                issuer: None,
                expression: Expression::Designator(crate::expression::AttributeDesignator {
                    category: kernel::AttributeCategory::access_subject(),
                    id: AttributeId::subject_id(),
                    issuer: None,
                    datatype: kernel::AttributeDatatype::String,
                    must_be_present: true,
                }),
            }],
        };
        let err = action.evaluate(&mut ctx).unwrap_err();
        assert!(matches!(err, EvaluationError::PepAssignment { .. }));
    }

    #[test]
    fn expressions_split_by_effect() {
        let exprs = PepActionExpressions::new(vec![
            PepActionExpression {
                id: "p1".into(),
                is_mandatory: true,
                applies_to: Effect::Permit,
                assignments: vec![],
            },
            PepActionExpression {
                id: "d1".into(),
                is_mandatory: true,
                applies_to: Effect::Deny,
                assignments: vec![],
            },
            PepActionExpression {
                id: "p2".into(),
                is_mandatory: false,
                applies_to: Effect::Permit,
                assignments: vec![],
            },
        ]);
        let permit_ids: Vec<&str> = exprs
            .for_effect(Effect::Permit)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(permit_ids, vec!["p1", "p2"]);
        assert_eq!(exprs.for_effect(Effect::Deny).len(), 1);
    }
}
