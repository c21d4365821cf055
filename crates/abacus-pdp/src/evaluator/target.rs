//! Target applicability evaluation: Match, AllOf, AnyOf, Target.
//!
//! All four evaluate to three-valued booleans: `Ok(true)`, `Ok(false)`,
//! or `Err(_)` standing for Indeterminate.

use std::sync::Arc;

use kernel::AttributeValue;

use crate::domain::{EvaluationError, PolicyBuildError};
use crate::evaluator::context::EvaluationContext;
use crate::expression::function::Function;
use crate::expression::{Expression, Value};

/// A single Match: a binary match function applied between a literal and
/// every element of the bag the source expression produces — the `any-of`
/// pattern, true as soon as one element matches.
pub struct MatchEvaluator {
    function: Arc<dyn Function>,
    literal: AttributeValue,
    source: Expression,
}

impl MatchEvaluator {
    pub(crate) fn new(
        function: Arc<dyn Function>,
        literal: AttributeValue,
        source: Expression,
    ) -> Self {
        Self {
            function,
            literal,
            source,
        }
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        let bag = match self.source.evaluate(ctx)? {
            Value::Bag(bag) => bag,
            Value::Primitive(v) => kernel::Bag::of(v),
        };
        for element in bag.iter() {
            let matched = self
                .function
                .invoke(&[
                    Value::Primitive(self.literal.clone()),
                    Value::Primitive(element.clone()),
                ])?
                .as_boolean()?;
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Conjunction of Matches. A false child short-circuits even past an
/// earlier indeterminate one; the index of the first indeterminate child
/// is kept for diagnostics.
pub struct AllOfEvaluator {
    matches: Vec<MatchEvaluator>,
}

impl AllOfEvaluator {
    pub(crate) fn new(matches: Vec<MatchEvaluator>) -> Result<Self, PolicyBuildError> {
        if matches.is_empty() {
            return Err(PolicyBuildError::EmptyAllOf);
        }
        Ok(Self { matches })
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        let mut first_error: Option<(usize, EvaluationError)> = None;
        for (index, m) in self.matches.iter().enumerate() {
            match m.evaluate(ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some((index, e));
                    }
                }
            }
        }
        match first_error {
            Some((index, source)) => Err(EvaluationError::Match {
                index,
                source: Box::new(source),
            }),
            None => Ok(true),
        }
    }
}

/// Disjunction of AllOfs, dual to [`AllOfEvaluator`]: a true child
/// short-circuits even past an earlier indeterminate one.
pub struct AnyOfEvaluator {
    all_ofs: Vec<AllOfEvaluator>,
}

impl AnyOfEvaluator {
    pub(crate) fn new(all_ofs: Vec<AllOfEvaluator>) -> Result<Self, PolicyBuildError> {
        if all_ofs.is_empty() {
            return Err(PolicyBuildError::EmptyAnyOf);
        }
        Ok(Self { all_ofs })
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        let mut first_error: Option<EvaluationError> = None;
        for all_of in &self.all_ofs {
            match all_of.evaluate(ctx) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }
}

/// A Target: conjunction of AnyOfs. An empty target always matches.
pub struct TargetEvaluator {
    any_ofs: Vec<AnyOfEvaluator>,
}

impl TargetEvaluator {
    pub(crate) fn new(any_ofs: Vec<AnyOfEvaluator>) -> Self {
        Self { any_ofs }
    }

    /// A target that matches every request.
    pub fn always() -> Self {
        Self { any_ofs: Vec::new() }
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        let mut first_error: Option<EvaluationError> = None;
        for any_of in &self.any_ofs {
            match any_of.evaluate(ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{AttributeDesignator, StandardFunctionRegistry, FunctionRegistry};
    use kernel::{AttributeCategory, AttributeDatatype, AttributeId, DecisionRequest};

    fn string_equal() -> Arc<dyn Function> {
        StandardFunctionRegistry::new()
            .get("urn:oasis:names:tc:xacml:1.0:function:string-equal")
            .unwrap()
    }

    fn subject_id_designator(must_be_present: bool) -> Expression {
        Expression::Designator(AttributeDesignator {
            category: AttributeCategory::access_subject(),
            id: AttributeId::subject_id(),
            issuer: None,
            datatype: AttributeDatatype::String,
            must_be_present,
        })
    }

    fn subject_match(literal: &str, must_be_present: bool) -> MatchEvaluator {
        MatchEvaluator::new(
            string_equal(),
            AttributeValue::string(literal),
            subject_id_designator(must_be_present),
        )
    }

    fn alice_request() -> DecisionRequest {
        DecisionRequest::builder()
            .single(
                AttributeCategory::ACCESS_SUBJECT,
                AttributeId::SUBJECT_ID,
                AttributeValue::string("alice"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn match_is_any_of_over_the_bag() {
        let request = DecisionRequest::builder()
            .single(
                AttributeCategory::ACCESS_SUBJECT,
                AttributeId::SUBJECT_ID,
                AttributeValue::string("bob"),
            )
            .single(
                AttributeCategory::ACCESS_SUBJECT,
                AttributeId::SUBJECT_ID,
                AttributeValue::string("alice"),
            )
            .build()
            .unwrap();
        let mut ctx = EvaluationContext::new(&request);
        assert!(subject_match("alice", false).evaluate(&mut ctx).unwrap());
        assert!(!subject_match("carol", false).evaluate(&mut ctx).unwrap());
    }

    #[test]
    fn empty_all_of_is_rejected() {
        assert!(matches!(
            AllOfEvaluator::new(vec![]),
            Err(PolicyBuildError::EmptyAllOf)
        ));
        assert!(matches!(
            AnyOfEvaluator::new(vec![]),
            Err(PolicyBuildError::EmptyAnyOf)
        ));
    }

    #[test]
    fn all_of_false_short_circuits_past_indeterminate() {
        // First match errors (missing attribute with MustBePresent), second
        // is false: the false wins.
        let request = alice_request();
        let mut ctx = EvaluationContext::new(&request);

        let failing = MatchEvaluator::new(
            string_equal(),
            AttributeValue::string("x"),
            Expression::Designator(AttributeDesignator {
                category: AttributeCategory::resource(),
                id: AttributeId::resource_id(),
                issuer: None,
                datatype: AttributeDatatype::String,
                must_be_present: true,
            }),
        );
        let all_of =
            AllOfEvaluator::new(vec![failing, subject_match("not-alice", false)]).unwrap();
        assert!(!all_of.evaluate(&mut ctx).unwrap());
    }

    #[test]
    fn all_of_indeterminate_carries_first_index() {
        let request = alice_request();
        let mut ctx = EvaluationContext::new(&request);

        let failing = MatchEvaluator::new(
            string_equal(),
            AttributeValue::string("x"),
            Expression::Designator(AttributeDesignator {
                category: AttributeCategory::resource(),
                id: AttributeId::resource_id(),
                issuer: None,
                datatype: AttributeDatatype::String,
                must_be_present: true,
            }),
        );
        let all_of = AllOfEvaluator::new(vec![subject_match("alice", false), failing]).unwrap();
        let err = all_of.evaluate(&mut ctx).unwrap_err();
        assert!(matches!(err, EvaluationError::Match { index: 1, .. }));
    }

    #[test]
    fn any_of_true_short_circuits_past_indeterminate() {
        let request = alice_request();
        let mut ctx = EvaluationContext::new(&request);

        let failing_all_of = AllOfEvaluator::new(vec![MatchEvaluator::new(
            string_equal(),
            AttributeValue::string("x"),
            Expression::Designator(AttributeDesignator {
                category: AttributeCategory::environment(),
                id: AttributeId::new("urn:example:missing"),
                issuer: None,
                datatype: AttributeDatatype::String,
                must_be_present: true,
            }),
        )])
        .unwrap();
        let matching_all_of =
            AllOfEvaluator::new(vec![subject_match("alice", false)]).unwrap();

        let any_of = AnyOfEvaluator::new(vec![failing_all_of, matching_all_of]).unwrap();
        assert!(any_of.evaluate(&mut ctx).unwrap());
    }

    #[test]
    fn empty_target_always_matches() {
        let request = alice_request();
        let mut ctx = EvaluationContext::new(&request);
        assert!(TargetEvaluator::always().evaluate(&mut ctx).unwrap());
    }
}
