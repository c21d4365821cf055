//! # Expression Layer
//!
//! Evaluable expressions: attribute-value literals, designators, selectors,
//! variable references and function applications. An expression evaluates
//! to a [`Value`] — a primitive or a bag — or fails with an
//! [`EvaluationError`] that the enclosing evaluator turns into an
//! Indeterminate decision.

pub mod factory;
pub mod function;
pub mod xpath;

use std::fmt;
use std::sync::Arc;

use kernel::{AttributeCategory, AttributeDatatype, AttributeId, AttributeValue, Bag};

use crate::domain::EvaluationError;
use crate::evaluator::context::EvaluationContext;
use function::Function;
use xpath::{XPathEvaluator, XPathExpression};

pub use factory::ExpressionFactory;
pub use function::{FunctionRegistry, StandardFunctionRegistry};
pub use xpath::XPathCompiler;

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Primitive(AttributeValue),
    Bag(Bag),
}

impl Value {
    /// Human-readable type description for error messages.
    pub fn type_description(&self) -> String {
        match self {
            Self::Primitive(v) => v.datatype().to_string(),
            Self::Bag(b) => format!("bag of {}", b.datatype()),
        }
    }

    /// The single boolean this value must be (condition semantics).
    pub fn as_boolean(&self) -> Result<bool, EvaluationError> {
        match self {
            Self::Primitive(AttributeValue::Boolean(b)) => Ok(*b),
            other => Err(EvaluationError::TypeMismatch {
                expected: AttributeDatatype::Boolean,
                found: other.type_description(),
            }),
        }
    }
}

/// An attribute designator: looks up a bag in the request.
#[derive(Debug, Clone)]
pub struct AttributeDesignator {
    pub(crate) category: AttributeCategory,
    pub(crate) id: AttributeId,
    pub(crate) issuer: Option<String>,
    pub(crate) datatype: AttributeDatatype,
    pub(crate) must_be_present: bool,
}

impl AttributeDesignator {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        // A cross-issuer datatype conflict in the request surfaces here as
        // a type error, not as a silently truncated bag.
        let bag = ctx
            .request()
            .attribute_bag(&self.category, &self.id, self.issuer.as_deref())
            .map_err(EvaluationError::from)?;
        match bag {
            Some(bag) if bag.datatype() == self.datatype => Ok(Value::Bag(bag)),
            Some(bag) => Err(EvaluationError::TypeMismatch {
                expected: self.datatype,
                found: bag.datatype().to_string(),
            }),
            None if self.must_be_present => Err(EvaluationError::MissingAttribute {
                category: self.category.clone(),
                id: self.id.clone(),
                issuer: self.issuer.clone(),
            }),
            None => Ok(Value::Bag(Bag::empty(self.datatype))),
        }
    }
}

/// An attribute selector: XPath over request content, via the
/// [`XPathEvaluator`] port.
pub struct AttributeSelector {
    pub(crate) category: AttributeCategory,
    pub(crate) xpath: XPathExpression,
    pub(crate) datatype: AttributeDatatype,
    pub(crate) must_be_present: bool,
    pub(crate) evaluator: Arc<dyn XPathEvaluator>,
}

impl fmt::Debug for AttributeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSelector")
            .field("category", &self.category)
            .field("path", &self.xpath.source())
            .field("datatype", &self.datatype)
            .field("must_be_present", &self.must_be_present)
            .finish()
    }
}

impl AttributeSelector {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        let resolve = |id: &str| {
            if self.xpath.compiler().declares_variable(id) {
                ctx.variable(id).cloned()
            } else {
                None
            }
        };
        let bag = self
            .evaluator
            .evaluate(&self.xpath, ctx.request(), &resolve)?;
        if bag.datatype() != self.datatype {
            return Err(EvaluationError::TypeMismatch {
                expected: self.datatype,
                found: bag.datatype().to_string(),
            });
        }
        if bag.is_empty() && self.must_be_present {
            return Err(EvaluationError::XPath {
                path: self.xpath.source().to_string(),
                message: "selector matched no content but MustBePresent is set".to_string(),
            });
        }
        Ok(Value::Bag(bag))
    }
}

/// A reference to a policy variable. The definition is shared with the
/// enclosing policy's evaluator; the computed value is memoized per
/// request in the evaluation context.
#[derive(Debug)]
pub struct VariableReference {
    pub(crate) id: Arc<str>,
    pub(crate) definition: Arc<Expression>,
}

impl VariableReference {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition(&self) -> &Arc<Expression> {
        &self.definition
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        if let Some(v) = ctx.variable(&self.id) {
            return Ok(v.clone());
        }
        let value = self
            .definition
            .evaluate(ctx)
            .map_err(|e| EvaluationError::Variable {
                variable_id: self.id.to_string(),
                source: Box::new(e),
            })?;
        ctx.set_variable(self.id.clone(), value.clone());
        Ok(value)
    }
}

/// A function application over pre-compiled argument expressions.
pub struct Apply {
    pub(crate) function: Arc<dyn Function>,
    pub(crate) args: Vec<Expression>,
}

impl fmt::Debug for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Apply")
            .field("function", &self.function.id())
            .field("args", &self.args)
            .finish()
    }
}

impl Apply {
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            args.push(arg.evaluate(ctx)?);
        }
        self.function.invoke(&args)
    }
}

/// A compiled, evaluable expression.
#[derive(Debug)]
pub enum Expression {
    Literal(AttributeValue),
    Designator(AttributeDesignator),
    Selector(AttributeSelector),
    VariableRef(VariableReference),
    Apply(Apply),
}

impl Expression {
    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        match self {
            Self::Literal(v) => Ok(Value::Primitive(v.clone())),
            Self::Designator(d) => d.evaluate(ctx),
            Self::Selector(s) => s.evaluate(ctx),
            Self::VariableRef(r) => r.evaluate(ctx),
            Self::Apply(a) => a.evaluate(ctx),
        }
    }

    /// The constant boolean this expression always evaluates to, if it is
    /// a boolean literal. Drives compile-time rule pruning.
    pub fn constant_bool(&self) -> Option<bool> {
        match self {
            Self::Literal(AttributeValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }
}
