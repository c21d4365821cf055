//! XPath compilation model and the content-evaluation port.
//!
//! The engine does not evaluate XPath itself; it compiles selector
//! expressions against an [`XPathCompiler`] so that variable visibility is
//! enforced, and delegates content evaluation to an [`XPathEvaluator`]
//! port. Compilers are immutable: growing the visible variable set
//! produces a new compiler instance.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use kernel::{Bag, DecisionRequest};

use super::Value;
use crate::domain::{EvaluationError, PolicyBuildError};

/// An immutable XPath compilation environment: namespace bindings plus the
/// set of policy variables visible as XPath variables.
#[derive(Debug, Clone, Default)]
pub struct XPathCompiler {
    namespaces: IndexMap<String, String>,
    variables: IndexSet<Arc<str>>,
}

impl XPathCompiler {
    pub fn new(namespaces: IndexMap<String, String>) -> Self {
        Self {
            namespaces,
            variables: IndexSet::new(),
        }
    }

    /// A new compiler whose declared variable set additionally contains
    /// `variable_id`. The receiver is left untouched: children compiled
    /// before the variable was defined keep the old environment.
    pub fn with_variable(&self, variable_id: &Arc<str>) -> Self {
        let mut variables = self.variables.clone();
        variables.insert(variable_id.clone());
        Self {
            namespaces: self.namespaces.clone(),
            variables,
        }
    }

    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    pub fn declares_variable(&self, variable_id: &str) -> bool {
        self.variables.contains(variable_id)
    }
}

/// A compiled XPath expression: the source path plus the environment it
/// was compiled under.
#[derive(Debug, Clone)]
pub struct XPathExpression {
    source: Arc<str>,
    compiler: Arc<XPathCompiler>,
}

impl XPathExpression {
    /// Structural validation only; semantic correctness is the evaluator
    /// port's concern.
    pub(crate) fn compile(
        source: &str,
        compiler: Arc<XPathCompiler>,
    ) -> Result<Self, PolicyBuildError> {
        if source.trim().is_empty() {
            return Err(PolicyBuildError::InvalidXPath {
                source_expr: source.to_string(),
                reason: "empty path".to_string(),
            });
        }
        let mut depth = 0i32;
        for c in source.chars() {
            match c {
                '[' | '(' => depth += 1,
                ']' | ')' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                break;
            }
        }
        if depth != 0 {
            return Err(PolicyBuildError::InvalidXPath {
                source_expr: source.to_string(),
                reason: "unbalanced brackets".to_string(),
            });
        }
        Ok(Self {
            source: Arc::from(source),
            compiler,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn compiler(&self) -> &XPathCompiler {
        &self.compiler
    }
}

/// Content-evaluation port for attribute selectors.
///
/// `resolve_variable` exposes the policy variables already published in
/// the evaluation context; implementations must only look up variables the
/// expression's compiler declares.
pub trait XPathEvaluator: Send + Sync {
    fn evaluate(
        &self,
        expression: &XPathExpression,
        request: &DecisionRequest,
        resolve_variable: &dyn Fn(&str) -> Option<Value>,
    ) -> Result<Bag, EvaluationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_variable_builds_a_fresh_compiler() {
        let base = Arc::new(XPathCompiler::default());
        let var: Arc<str> = Arc::from("role");
        let extended = base.with_variable(&var);

        assert!(!base.declares_variable("role"));
        assert!(extended.declares_variable("role"));
    }

    #[test]
    fn compile_validates_structure() {
        let compiler = Arc::new(XPathCompiler::default());
        assert!(XPathExpression::compile("md:record/md:patient", compiler.clone()).is_ok());
        assert!(XPathExpression::compile("   ", compiler.clone()).is_err());
        assert!(XPathExpression::compile("a[b", compiler).is_err());
    }
}
