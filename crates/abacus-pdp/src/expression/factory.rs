//! Expression factory: compiles expression documents and owns the
//! construction-time variable scope.
//!
//! The variable scope is only mutated while policy documents are being
//! compiled; at evaluation time the factory is never touched, so compiled
//! evaluators can be shared across threads freely.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::document::{
    AttributeDesignatorDocument, AttributeSelectorDocument, ExpressionDocument,
    VariableDefinitionDocument,
};
use crate::domain::PolicyBuildError;

use super::function::{Function, FunctionRegistry};
use super::xpath::{XPathCompiler, XPathEvaluator, XPathExpression};
use super::{Apply, AttributeDesignator, AttributeSelector, Expression, VariableReference};

struct VariableBinding {
    reference: Arc<VariableReference>,
    /// Length of the longest variable-reference chain rooted at this
    /// variable, counting the variable itself.
    chain_len: usize,
}

/// Compiles [`ExpressionDocument`]s into evaluable [`Expression`]s.
pub struct ExpressionFactory {
    functions: Arc<dyn FunctionRegistry>,
    xpath_evaluator: Option<Arc<dyn XPathEvaluator>>,
    max_variable_ref_depth: Option<usize>,
    variables: HashMap<Arc<str>, VariableBinding>,
}

impl ExpressionFactory {
    pub fn new(functions: Arc<dyn FunctionRegistry>) -> Self {
        Self {
            functions,
            xpath_evaluator: None,
            max_variable_ref_depth: None,
            variables: HashMap::new(),
        }
    }

    /// Enables AttributeSelector support by supplying a content evaluator.
    pub fn with_xpath_evaluator(mut self, evaluator: Arc<dyn XPathEvaluator>) -> Self {
        self.xpath_evaluator = Some(evaluator);
        self
    }

    /// Caps the length of variable-reference chains.
    pub fn with_max_variable_ref_depth(mut self, max: usize) -> Self {
        self.max_variable_ref_depth = Some(max);
        self
    }

    pub fn is_xpath_enabled(&self) -> bool {
        self.xpath_evaluator.is_some()
    }

    /// Resolves a function id against the registry.
    pub fn function(&self, id: &str) -> Result<Arc<dyn Function>, PolicyBuildError> {
        self.functions
            .get(id)
            .ok_or_else(|| PolicyBuildError::UnknownFunction {
                function_id: id.to_string(),
            })
    }

    /// Registers a policy variable, making it visible to expressions
    /// compiled afterwards. Fails on a conflict with any variable already
    /// in scope, and when the variable's reference chain exceeds the
    /// configured cap.
    pub fn add_variable(
        &mut self,
        doc: &VariableDefinitionDocument,
        xpath_compiler: &Arc<XPathCompiler>,
    ) -> Result<Arc<VariableReference>, PolicyBuildError> {
        if self.variables.contains_key(doc.variable_id.as_str()) {
            return Err(PolicyBuildError::ConflictingVariable {
                variable_id: doc.variable_id.clone(),
            });
        }

        let expression = self.get_instance(&doc.expression, xpath_compiler)?;
        let chain_len = 1 + self.longest_ref_chain(&expression);
        if let Some(max) = self.max_variable_ref_depth
            && chain_len > max
        {
            return Err(PolicyBuildError::VariableChainTooDeep {
                variable_id: doc.variable_id.clone(),
                depth: chain_len,
                max,
            });
        }

        let id: Arc<str> = Arc::from(doc.variable_id.as_str());
        let reference = Arc::new(VariableReference {
            id: id.clone(),
            definition: Arc::new(expression),
        });
        debug!(variable_id = %id, chain_len, "registered policy variable");
        self.variables.insert(
            id,
            VariableBinding {
                reference: reference.clone(),
                chain_len,
            },
        );
        Ok(reference)
    }

    /// Removes a variable on exit from its policy's construction scope.
    pub fn remove_variable(&mut self, variable_id: &str) -> Option<Arc<VariableReference>> {
        self.variables
            .remove(variable_id)
            .map(|binding| binding.reference)
    }

    /// Compiles an expression document against the current variable scope.
    pub fn get_instance(
        &self,
        doc: &ExpressionDocument,
        xpath_compiler: &Arc<XPathCompiler>,
    ) -> Result<Expression, PolicyBuildError> {
        match doc {
            ExpressionDocument::Value(v) => Ok(Expression::Literal(v.clone())),
            ExpressionDocument::Apply { function_id, args } => {
                let function = self.function(function_id)?;
                let args = args
                    .iter()
                    .map(|a| self.get_instance(a, xpath_compiler))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::Apply(Apply { function, args }))
            }
            ExpressionDocument::VariableReference { variable_id } => {
                let binding = self.variables.get(variable_id.as_str()).ok_or_else(|| {
                    PolicyBuildError::UndefinedVariable {
                        variable_id: variable_id.clone(),
                    }
                })?;
                Ok(Expression::VariableRef(VariableReference {
                    id: binding.reference.id.clone(),
                    definition: binding.reference.definition.clone(),
                }))
            }
            ExpressionDocument::AttributeDesignator(d) => {
                Ok(Expression::Designator(self.designator(d)))
            }
            ExpressionDocument::AttributeSelector(s) => {
                Ok(Expression::Selector(self.selector(s, xpath_compiler)?))
            }
        }
    }

    pub(crate) fn designator(&self, doc: &AttributeDesignatorDocument) -> AttributeDesignator {
        AttributeDesignator {
            category: doc.category.as_str().into(),
            id: doc.attribute_id.as_str().into(),
            issuer: doc.issuer.clone(),
            datatype: doc.datatype,
            must_be_present: doc.must_be_present,
        }
    }

    pub(crate) fn selector(
        &self,
        doc: &AttributeSelectorDocument,
        xpath_compiler: &Arc<XPathCompiler>,
    ) -> Result<AttributeSelector, PolicyBuildError> {
        let Some(evaluator) = self.xpath_evaluator.clone() else {
            return Err(PolicyBuildError::XPathDisabled);
        };
        let xpath = XPathExpression::compile(&doc.path, xpath_compiler.clone())?;
        Ok(AttributeSelector {
            category: doc.category.as_str().into(),
            xpath,
            datatype: doc.datatype,
            must_be_present: doc.must_be_present,
            evaluator,
        })
    }

    fn longest_ref_chain(&self, expression: &Expression) -> usize {
        match expression {
            Expression::VariableRef(r) => self
                .variables
                .get(r.id())
                .map_or(0, |binding| binding.chain_len),
            Expression::Apply(apply) => apply
                .args
                .iter()
                .map(|a| self.longest_ref_chain(a))
                .max()
                .unwrap_or(0),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::StandardFunctionRegistry;
    use kernel::AttributeValue;

    fn factory() -> ExpressionFactory {
        ExpressionFactory::new(Arc::new(StandardFunctionRegistry::new()))
    }

    fn var_doc(id: &str, expression: ExpressionDocument) -> VariableDefinitionDocument {
        VariableDefinitionDocument {
            variable_id: id.to_string(),
            expression,
        }
    }

    #[test]
    fn unknown_function_is_a_build_error() {
        let factory = factory();
        let err = factory
            .get_instance(
                &ExpressionDocument::Apply {
                    function_id: "urn:example:nope".into(),
                    args: vec![],
                },
                &Arc::new(XPathCompiler::default()),
            )
            .unwrap_err();
        assert!(matches!(err, PolicyBuildError::UnknownFunction { .. }));
    }

    #[test]
    fn conflicting_variable_rejected() {
        let mut factory = factory();
        let compiler = Arc::new(XPathCompiler::default());
        let doc = var_doc("v", ExpressionDocument::Value(AttributeValue::boolean(true)));
        factory.add_variable(&doc, &compiler).unwrap();
        let err = factory.add_variable(&doc, &compiler).unwrap_err();
        assert!(matches!(err, PolicyBuildError::ConflictingVariable { .. }));
    }

    #[test]
    fn undefined_variable_rejected() {
        let factory = factory();
        let err = factory
            .get_instance(
                &ExpressionDocument::VariableReference {
                    variable_id: "ghost".into(),
                },
                &Arc::new(XPathCompiler::default()),
            )
            .unwrap_err();
        assert!(matches!(err, PolicyBuildError::UndefinedVariable { .. }));
    }

    #[test]
    fn variable_scope_exit_restores_namespace() {
        let mut factory = factory();
        let compiler = Arc::new(XPathCompiler::default());
        let doc = var_doc("v", ExpressionDocument::Value(AttributeValue::boolean(true)));
        factory.add_variable(&doc, &compiler).unwrap();
        assert!(factory.remove_variable("v").is_some());
        // Re-adding after removal is legal: the scope was exited.
        factory.add_variable(&doc, &compiler).unwrap();
    }

    #[test]
    fn variable_chain_depth_is_capped() {
        let mut factory = factory().with_max_variable_ref_depth(2);
        let compiler = Arc::new(XPathCompiler::default());

        factory
            .add_variable(
                &var_doc("a", ExpressionDocument::Value(AttributeValue::boolean(true))),
                &compiler,
            )
            .unwrap();
        factory
            .add_variable(
                &var_doc(
                    "b",
                    ExpressionDocument::VariableReference {
                        variable_id: "a".into(),
                    },
                ),
                &compiler,
            )
            .unwrap();
        let err = factory
            .add_variable(
                &var_doc(
                    "c",
                    ExpressionDocument::VariableReference {
                        variable_id: "b".into(),
                    },
                ),
                &compiler,
            )
            .unwrap_err();
        assert!(matches!(err, PolicyBuildError::VariableChainTooDeep { depth: 3, max: 2, .. }));
    }

    #[test]
    fn selector_requires_xpath_support() {
        let factory = factory();
        let err = factory
            .get_instance(
                &ExpressionDocument::AttributeSelector(AttributeSelectorDocument {
                    category: kernel::AttributeCategory::RESOURCE.into(),
                    path: "md:record".into(),
                    datatype: kernel::AttributeDatatype::String,
                    must_be_present: false,
                }),
                &Arc::new(XPathCompiler::default()),
            )
            .unwrap_err();
        assert!(matches!(err, PolicyBuildError::XPathDisabled));
    }
}
