//! Policy compilation: turns parsed documents into immutable evaluator
//! trees.
//!
//! Children are walked in declaration order. Each `VariableDefinition`
//! registers its variable with the expression factory and hands every
//! *subsequent* child a fresh XPath compiler that declares it; the
//! variables are deregistered when the policy's construction scope exits,
//! on success and on failure alike.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use crate::domain::document::{
    BagSourceDocument, PepActionExpressionDocument, PolicyChildDocument, PolicyDocument,
    PolicyReferenceDocument, PolicySetChildDocument, PolicySetDocument, RuleDocument,
    TargetDocument,
};
use crate::domain::{
    PolicyBuildError, PolicyKind, PolicyRefsMetadata, PolicyVersionPatterns,
    PrimaryPolicyMetadata,
};
use crate::evaluator::combining::CombiningAlgRegistry;
use crate::evaluator::pep_action::{AssignmentExpression, PepActionExpression, PepActionExpressions};
use crate::evaluator::policy::{LocalVariable, TopLevelPolicyElementEvaluator};
use crate::evaluator::reference::{
    DynamicPolicyRefEvaluator, PolicySetChild, StaticPolicyRefEvaluator,
};
use crate::evaluator::rule::{ConditionEvaluator, RuleEvaluator};
use crate::evaluator::target::{AllOfEvaluator, AnyOfEvaluator, MatchEvaluator, TargetEvaluator};
use crate::expression::{Expression, ExpressionFactory, XPathCompiler};
use crate::ports::PolicyProvider;

/// Compile-time resolver for static policy references.
///
/// `factory` is handed back so the resolver can compile referenced
/// documents with the same factory that is compiling the referencing one.
pub trait StaticRefResolver {
    fn resolve(
        &mut self,
        factory: &mut PolicyFactory,
        kind: PolicyKind,
        id: &str,
        constraints: &PolicyVersionPatterns,
        ref_chain: &[String],
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, PolicyBuildError>;
}

/// How `Policy(Set)IdReference`s are handled during compilation.
pub enum ReferenceMode<'a> {
    /// References are rejected: no provider is configured.
    Forbidden,
    /// References resolve at compile time through a pure resolver.
    Static(&'a mut dyn StaticRefResolver),
    /// References resolve per request through the provider.
    Dynamic(Arc<dyn PolicyProvider>),
}

/// Compiles policy documents into evaluators.
pub struct PolicyFactory {
    expr_factory: ExpressionFactory,
    registry: Arc<dyn CombiningAlgRegistry>,
    base_xpath_compiler: XPathCompiler,
}

impl PolicyFactory {
    pub fn new(expr_factory: ExpressionFactory, registry: Arc<dyn CombiningAlgRegistry>) -> Self {
        Self {
            expr_factory,
            registry,
            base_xpath_compiler: XPathCompiler::default(),
        }
    }

    /// Replaces the namespace environment selectors are compiled under.
    pub fn with_base_xpath_compiler(mut self, compiler: XPathCompiler) -> Self {
        self.base_xpath_compiler = compiler;
        self
    }

    /// Compiles a `Policy`.
    #[tracing::instrument(level = "debug", skip(self, doc), fields(policy_id = %doc.id))]
    pub fn policy(
        &mut self,
        doc: &PolicyDocument,
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, PolicyBuildError> {
        if !doc.combiner_parameters.is_empty() {
            return Err(PolicyBuildError::UnsupportedCombinerParameters {
                alg_id: doc.rule_combining_alg_id.clone(),
            });
        }
        let meta =
            PrimaryPolicyMetadata::new(PolicyKind::Policy, doc.id.clone(), doc.version.parse()?);

        let mut added: Vec<Arc<str>> = Vec::new();
        let parts = self.policy_parts(doc, &mut added);
        // Variable scope exit, on both the success and the error path.
        for id in &added {
            self.expr_factory.remove_variable(id);
        }
        let (target, local_variables, combiner, pep_expressions) = parts?;

        Ok(Arc::new(TopLevelPolicyElementEvaluator::new(
            meta,
            target,
            local_variables,
            combiner,
            pep_expressions,
            PolicyRefsMetadata::new(),
            IndexSet::new(),
        )))
    }

    #[allow(clippy::type_complexity)]
    fn policy_parts(
        &mut self,
        doc: &PolicyDocument,
        added: &mut Vec<Arc<str>>,
    ) -> Result<
        (
            TargetEvaluator,
            Vec<LocalVariable>,
            Box<dyn crate::evaluator::combining::CombiningAlg>,
            PepActionExpressions,
        ),
        PolicyBuildError,
    > {
        let mut compiler = Arc::new(self.base_xpath_compiler.clone());
        let target = self.target(&doc.target, &compiler)?;

        let mut rules = Vec::new();
        let mut rule_ids: HashSet<&str> = HashSet::new();
        let mut local_variables = Vec::new();
        for child in &doc.children {
            match child {
                PolicyChildDocument::VariableDefinition(vd) => {
                    let reference = self.expr_factory.add_variable(vd, &compiler)?;
                    let id: Arc<str> = Arc::from(vd.variable_id.as_str());
                    added.push(id.clone());
                    // Children compiled from here on see the new variable;
                    // the compiler is rebuilt, never mutated in place.
                    compiler = Arc::new(compiler.with_variable(&id));
                    local_variables.push(LocalVariable {
                        id,
                        expression: reference.definition().clone(),
                    });
                }
                PolicyChildDocument::Rule(rd) => {
                    if !rule_ids.insert(rd.id.as_str()) {
                        return Err(PolicyBuildError::DuplicateRuleId {
                            policy_id: doc.id.clone(),
                            rule_id: rd.id.clone(),
                        });
                    }
                    rules.push(Arc::new(self.rule(rd, &compiler)?));
                }
            }
        }

        let combiner = self
            .registry
            .rule_combiner(&doc.rule_combining_alg_id, rules)?;
        let pep_expressions = PepActionExpressions::new(self.pep_actions(
            &doc.obligation_expressions,
            &doc.advice_expressions,
            &compiler,
        )?);
        Ok((target, local_variables, combiner, pep_expressions))
    }

    /// Compiles a `PolicySet`.
    ///
    /// `ref_chain` is the chain of policy-set ids traversed through
    /// references to reach this document — empty for a root.
    #[tracing::instrument(level = "debug", skip(self, doc, refs, ref_chain), fields(policy_set_id = %doc.id))]
    pub fn policy_set(
        &mut self,
        doc: &PolicySetDocument,
        refs: &mut ReferenceMode<'_>,
        ref_chain: &[String],
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, PolicyBuildError> {
        if !doc.combiner_parameters.is_empty() {
            return Err(PolicyBuildError::UnsupportedCombinerParameters {
                alg_id: doc.policy_combining_alg_id.clone(),
            });
        }
        let meta = PrimaryPolicyMetadata::new(
            PolicyKind::PolicySet,
            doc.id.clone(),
            doc.version.parse()?,
        );
        let compiler = Arc::new(self.base_xpath_compiler.clone());
        let target = self.target(&doc.target, &compiler)?;

        let mut children = Vec::new();
        for child_doc in &doc.children {
            let child = match child_doc {
                PolicySetChildDocument::Policy(p) => PolicySetChild::Policy(self.policy(p)?),
                PolicySetChildDocument::PolicySet(ps) => {
                    PolicySetChild::PolicySet(self.policy_set(ps, refs, ref_chain)?)
                }
                PolicySetChildDocument::PolicyIdReference(r) => {
                    self.reference(PolicyKind::Policy, r, refs, ref_chain)?
                }
                PolicySetChildDocument::PolicySetIdReference(r) => {
                    self.reference(PolicyKind::PolicySet, r, refs, ref_chain)?
                }
            };
            children.push(child);
        }

        // No policy identity may appear twice within the enclosing tree.
        let mut enclosed: IndexSet<PrimaryPolicyMetadata> = IndexSet::new();
        for child in &children {
            for child_meta in child.enclosed_identities() {
                if !enclosed.insert(child_meta.clone()) {
                    return Err(PolicyBuildError::DuplicateEnclosedPolicy { meta: child_meta });
                }
            }
        }

        let mut refs_metadata = PolicyRefsMetadata::new();
        for child in &children {
            refs_metadata.merge(child.refs_metadata());
        }

        let combiner = self
            .registry
            .policy_combiner(&doc.policy_combining_alg_id, children)?;
        let pep_expressions = PepActionExpressions::new(self.pep_actions(
            &doc.obligation_expressions,
            &doc.advice_expressions,
            &compiler,
        )?);

        Ok(Arc::new(TopLevelPolicyElementEvaluator::new(
            meta,
            target,
            Vec::new(),
            combiner,
            pep_expressions,
            refs_metadata,
            enclosed,
        )))
    }

    fn reference(
        &mut self,
        kind: PolicyKind,
        doc: &PolicyReferenceDocument,
        refs: &mut ReferenceMode<'_>,
        ref_chain: &[String],
    ) -> Result<PolicySetChild, PolicyBuildError> {
        let constraints = PolicyVersionPatterns {
            version: doc.version.as_deref().map(str::parse).transpose()?,
            earliest_version: doc.earliest_version.as_deref().map(str::parse).transpose()?,
            latest_version: doc.latest_version.as_deref().map(str::parse).transpose()?,
        };
        match refs {
            ReferenceMode::Forbidden => Err(PolicyBuildError::NoPolicyProvider {
                kind,
                id: doc.id.clone(),
            }),
            ReferenceMode::Dynamic(provider) => {
                Ok(PolicySetChild::DynamicRef(DynamicPolicyRefEvaluator::new(
                    kind,
                    doc.id.clone(),
                    constraints,
                    provider.clone(),
                )))
            }
            ReferenceMode::Static(resolver) => {
                let resolved = resolver.resolve(self, kind, &doc.id, &constraints, ref_chain)?;
                Ok(PolicySetChild::StaticRef(StaticPolicyRefEvaluator::new(
                    kind,
                    doc.id.clone(),
                    constraints,
                    resolved,
                )))
            }
        }
    }

    fn target(
        &self,
        doc: &TargetDocument,
        compiler: &Arc<XPathCompiler>,
    ) -> Result<TargetEvaluator, PolicyBuildError> {
        let mut any_ofs = Vec::new();
        for any_of_doc in &doc.any_of {
            let mut all_ofs = Vec::new();
            for all_of_doc in &any_of_doc.all_of {
                let mut matches = Vec::new();
                for match_doc in &all_of_doc.matches {
                    let function = self.expr_factory.function(&match_doc.match_id)?;
                    let source = match &match_doc.source {
                        BagSourceDocument::AttributeDesignator(d) => {
                            Expression::Designator(self.expr_factory.designator(d))
                        }
                        BagSourceDocument::AttributeSelector(s) => {
                            Expression::Selector(self.expr_factory.selector(s, compiler)?)
                        }
                    };
                    matches.push(MatchEvaluator::new(
                        function,
                        match_doc.value.clone(),
                        source,
                    ));
                }
                all_ofs.push(AllOfEvaluator::new(matches)?);
            }
            any_ofs.push(AnyOfEvaluator::new(all_ofs)?);
        }
        Ok(TargetEvaluator::new(any_ofs))
    }

    fn rule(
        &self,
        doc: &RuleDocument,
        compiler: &Arc<XPathCompiler>,
    ) -> Result<RuleEvaluator, PolicyBuildError> {
        let target = self.target(&doc.target, compiler)?;
        let condition = doc
            .condition
            .as_ref()
            .map(|c| {
                self.expr_factory
                    .get_instance(c, compiler)
                    .map(ConditionEvaluator::new)
            })
            .transpose()?;

        let mut pep_expressions = Vec::new();
        for expression in
            self.pep_actions(&doc.obligation_expressions, &doc.advice_expressions, compiler)?
        {
            if expression.applies_to() == doc.effect {
                pep_expressions.push(expression);
            } else {
                // A rule only ever returns its own effect, so this
                // expression could never fire.
                debug!(
                    rule_id = %doc.id,
                    pep_id = %expression.id,
                    "dropping obligation/advice whose effect never fires for this rule"
                );
            }
        }

        let rule = RuleEvaluator::new(
            doc.id.clone(),
            doc.effect,
            target,
            condition,
            pep_expressions,
        );
        if rule.is_always_not_applicable() {
            debug!(rule_id = %doc.id, "rule condition is constantly false; it only ever yields NotApplicable");
        }
        Ok(rule)
    }

    fn pep_actions(
        &self,
        obligations: &[PepActionExpressionDocument],
        advices: &[PepActionExpressionDocument],
        compiler: &Arc<XPathCompiler>,
    ) -> Result<Vec<PepActionExpression>, PolicyBuildError> {
        let mut out = Vec::new();
        for (docs, is_mandatory) in [(obligations, true), (advices, false)] {
            for doc in docs {
                let mut assignments = Vec::new();
                for assignment in &doc.assignments {
                    assignments.push(AssignmentExpression {
                        attribute_id: assignment.attribute_id.as_str().into(),
                        category: assignment.category.clone().map(Into::into),
                        issuer: assignment.issuer.clone(),
                        expression: self
                            .expr_factory
                            .get_instance(&assignment.expression, compiler)?,
                    });
                }
                out.push(PepActionExpression {
                    id: doc.id.clone(),
                    is_mandatory,
                    applies_to: doc.applies_to,
                    assignments,
                });
            }
        }
        Ok(out)
    }
}
