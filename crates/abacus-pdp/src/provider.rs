//! In-tree static policy provider.
//!
//! Built from a set of policy documents, it compiles every registered
//! document up front, resolving inter-document references through itself.
//! Reference cycles and depth violations therefore fail at build time,
//! and resolution at request time is a pure table lookup — same inputs,
//! same policy, for the process lifetime.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::domain::document::{PolicyDocument, PolicyElementDocument, PolicySetDocument};
use crate::domain::{
    EvaluationError, PolicyBuildError, PolicyKind, PolicyVersion, PolicyVersionPatterns,
    PrimaryPolicyMetadata,
};
use crate::evaluator::builder::{PolicyFactory, ReferenceMode, StaticRefResolver};
use crate::evaluator::context::EvaluationContext;
use crate::evaluator::policy::TopLevelPolicyElementEvaluator;
use crate::ports::PolicyProvider;

type Key = (PolicyKind, String);

#[derive(Clone)]
enum ProviderDoc {
    Policy(Arc<PolicyDocument>),
    PolicySet(Arc<PolicySetDocument>),
}

fn join_static_chain(
    max: Option<usize>,
    head: &[String],
    tail: &[String],
) -> Result<Vec<String>, PolicyBuildError> {
    let mut joined = head.to_vec();
    for id in tail {
        if joined.iter().any(|existing| existing == id) {
            joined.push(id.clone());
            return Err(PolicyBuildError::ReferenceCycle { chain: joined });
        }
        joined.push(id.clone());
    }
    if let Some(max) = max
        && joined.len() > max
    {
        return Err(PolicyBuildError::ReferenceDepthExceeded {
            depth: joined.len(),
            max,
        });
    }
    Ok(joined)
}

struct ProviderTables {
    max_ref_depth: Option<usize>,
    docs: HashMap<Key, BTreeMap<PolicyVersion, ProviderDoc>>,
    compiled: HashMap<Key, BTreeMap<PolicyVersion, Arc<TopLevelPolicyElementEvaluator>>>,
}

impl StaticRefResolver for ProviderTables {
    fn resolve(
        &mut self,
        factory: &mut PolicyFactory,
        kind: PolicyKind,
        id: &str,
        constraints: &PolicyVersionPatterns,
        ref_chain: &[String],
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, PolicyBuildError> {
        let key: Key = (kind, id.to_string());
        let (version, doc) = {
            let Some(versions) = self.docs.get(&key) else {
                return Err(PolicyBuildError::UnresolvedReference {
                    kind,
                    id: id.to_string(),
                    reason: "no such policy registered".to_string(),
                });
            };
            let Some((version, doc)) = versions
                .iter()
                .rev()
                .find(|(v, _)| constraints.matches(v))
                .map(|(v, d)| (v.clone(), d.clone()))
            else {
                return Err(PolicyBuildError::UnresolvedReference {
                    kind,
                    id: id.to_string(),
                    reason: format!("no registered version matches {constraints}"),
                });
            };
            (version, doc)
        };

        let target_id = [id.to_string()];
        let chain_with_target = match kind {
            PolicyKind::PolicySet => Some(join_static_chain(
                self.max_ref_depth,
                ref_chain,
                &target_id,
            )?),
            PolicyKind::Policy => None,
        };

        if let Some(existing) = self
            .compiled
            .get(&key)
            .and_then(|versions| versions.get(&version))
            .cloned()
        {
            // Cached compilation, fresh chain: the same policy set reached
            // through another path can still cycle or exceed the depth.
            if let Some(chain) = &chain_with_target {
                join_static_chain(
                    self.max_ref_depth,
                    chain,
                    &existing.refs_metadata().longest_ref_chain,
                )?;
            }
            return Ok(existing);
        }

        let compiled = match &doc {
            ProviderDoc::Policy(p) => factory.policy(p)?,
            ProviderDoc::PolicySet(ps) => {
                let chain = chain_with_target.clone().unwrap_or_default();
                factory.policy_set(ps, &mut ReferenceMode::Static(self), &chain)?
            }
        };
        if let Some(chain) = &chain_with_target {
            join_static_chain(
                self.max_ref_depth,
                chain,
                &compiled.refs_metadata().longest_ref_chain,
            )?;
        }
        self.compiled
            .entry(key)
            .or_default()
            .insert(version, compiled.clone());
        Ok(compiled)
    }
}

/// A pure, table-backed policy provider compiled once at startup.
pub struct StaticPolicyProvider {
    max_ref_depth: Option<usize>,
    policies: HashMap<Key, BTreeMap<PolicyVersion, Arc<TopLevelPolicyElementEvaluator>>>,
}

impl std::fmt::Debug for StaticPolicyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPolicyProvider")
            .field("max_ref_depth", &self.max_ref_depth)
            .finish_non_exhaustive()
    }
}

impl StaticPolicyProvider {
    #[tracing::instrument(level = "debug", skip_all, fields(documents = documents.len()))]
    pub fn new(
        documents: Vec<PolicyElementDocument>,
        factory: &mut PolicyFactory,
        max_ref_depth: Option<usize>,
    ) -> Result<Self, PolicyBuildError> {
        let mut tables = ProviderTables {
            max_ref_depth,
            docs: HashMap::new(),
            compiled: HashMap::new(),
        };
        for document in documents {
            let (key, version, doc) = match document {
                PolicyElementDocument::Policy(p) => (
                    (PolicyKind::Policy, p.id.clone()),
                    p.version.parse::<PolicyVersion>()?,
                    ProviderDoc::Policy(Arc::new(p)),
                ),
                PolicyElementDocument::PolicySet(ps) => (
                    (PolicyKind::PolicySet, ps.id.clone()),
                    ps.version.parse::<PolicyVersion>()?,
                    ProviderDoc::PolicySet(Arc::new(ps)),
                ),
            };
            let versions = tables.docs.entry(key.clone()).or_default();
            if versions.insert(version.clone(), doc).is_some() {
                return Err(PolicyBuildError::DuplicateEnclosedPolicy {
                    meta: PrimaryPolicyMetadata::new(key.0, key.1, version),
                });
            }
        }

        // Compile every registered document now; a bad reference anywhere
        // rejects the whole corpus.
        let pending: Vec<(Key, PolicyVersion)> = tables
            .docs
            .iter()
            .flat_map(|(key, versions)| {
                versions
                    .keys()
                    .map(|v| (key.clone(), v.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for ((kind, id), version) in pending {
            let constraints = PolicyVersionPatterns {
                version: Some(version.to_string().parse()?),
                earliest_version: None,
                latest_version: None,
            };
            tables.resolve(factory, kind, &id, &constraints, &[])?;
            debug!(%kind, %id, %version, "compiled provider policy");
        }

        Ok(Self {
            max_ref_depth,
            policies: tables.compiled,
        })
    }

    fn best_match(
        &self,
        kind: PolicyKind,
        id: &str,
        constraints: &PolicyVersionPatterns,
    ) -> Option<Arc<TopLevelPolicyElementEvaluator>> {
        self.policies
            .get(&(kind, id.to_string()))
            .and_then(|versions| {
                versions
                    .iter()
                    .rev()
                    .find(|(version, _)| constraints.matches(version))
                    .map(|(_, evaluator)| evaluator.clone())
            })
    }
}

impl PolicyProvider for StaticPolicyProvider {
    fn max_policy_ref_depth(&self) -> Option<usize> {
        self.max_ref_depth
    }

    fn get(
        &self,
        kind: PolicyKind,
        id: &str,
        constraints: &PolicyVersionPatterns,
        ref_chain_with_target: Option<&[String]>,
        _ctx: Option<&EvaluationContext<'_>>,
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, EvaluationError> {
        let resolved = self.best_match(kind, id, constraints).ok_or_else(|| {
            EvaluationError::UnresolvedReference {
                kind,
                id: id.to_string(),
                constraints: constraints.to_string(),
            }
        })?;
        if let Some(chain) = ref_chain_with_target {
            self.join_policy_ref_chains(chain, &resolved.refs_metadata().longest_ref_chain)?;
        }
        Ok(resolved)
    }
}

/// Lets roots compiled after provider construction resolve their static
/// references against the already-compiled tables.
impl StaticRefResolver for StaticPolicyProvider {
    fn resolve(
        &mut self,
        _factory: &mut PolicyFactory,
        kind: PolicyKind,
        id: &str,
        constraints: &PolicyVersionPatterns,
        ref_chain: &[String],
    ) -> Result<Arc<TopLevelPolicyElementEvaluator>, PolicyBuildError> {
        let resolved = self.best_match(kind, id, constraints).ok_or_else(|| {
            PolicyBuildError::UnresolvedReference {
                kind,
                id: id.to_string(),
                reason: format!("no compiled version matches {constraints}"),
            }
        })?;
        if kind == PolicyKind::PolicySet {
            let target_id = [id.to_string()];
            let chain = join_static_chain(self.max_ref_depth, ref_chain, &target_id)?;
            join_static_chain(
                self.max_ref_depth,
                &chain,
                &resolved.refs_metadata().longest_ref_chain,
            )?;
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{
        PolicyChildDocument, PolicySetChildDocument, PolicyReferenceDocument, RuleDocument,
        TargetDocument,
    };
    use crate::domain::{Decision, Effect};
    use crate::evaluator::combining::StandardCombiningAlgRegistry;
    use crate::expression::{ExpressionFactory, StandardFunctionRegistry};
    use kernel::DecisionRequest;

    const DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides";
    const FIRST_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:first-applicable";

    fn factory() -> PolicyFactory {
        PolicyFactory::new(
            ExpressionFactory::new(Arc::new(StandardFunctionRegistry::new())),
            Arc::new(StandardCombiningAlgRegistry::new()),
        )
    }

    fn policy(id: &str, version: &str, effect: Effect) -> PolicyElementDocument {
        PolicyElementDocument::Policy(PolicyDocument {
            id: id.into(),
            version: version.into(),
            description: None,
            target: TargetDocument::default(),
            rule_combining_alg_id: DENY_OVERRIDES.into(),
            children: vec![PolicyChildDocument::Rule(RuleDocument {
                id: "r1".into(),
                effect,
                description: None,
                target: TargetDocument::default(),
                condition: None,
                obligation_expressions: vec![],
                advice_expressions: vec![],
            })],
            obligation_expressions: vec![],
            advice_expressions: vec![],
            combiner_parameters: vec![],
        })
    }

    fn referencing_set(id: &str, target_id: &str) -> PolicyElementDocument {
        PolicyElementDocument::PolicySet(PolicySetDocument {
            id: id.into(),
            version: "1.0".into(),
            description: None,
            target: TargetDocument::default(),
            policy_combining_alg_id: FIRST_APPLICABLE.into(),
            children: vec![PolicySetChildDocument::PolicySetIdReference(
                PolicyReferenceDocument {
                    id: target_id.into(),
                    version: None,
                    earliest_version: None,
                    latest_version: None,
                },
            )],
            obligation_expressions: vec![],
            advice_expressions: vec![],
            combiner_parameters: vec![],
        })
    }

    fn leaf_set(id: &str) -> PolicyElementDocument {
        PolicyElementDocument::PolicySet(PolicySetDocument {
            id: id.into(),
            version: "1.0".into(),
            description: None,
            target: TargetDocument::default(),
            policy_combining_alg_id: FIRST_APPLICABLE.into(),
            children: vec![PolicySetChildDocument::Policy(PolicyDocument {
                id: format!("{id}:inner"),
                version: "1.0".into(),
                description: None,
                target: TargetDocument::default(),
                rule_combining_alg_id: DENY_OVERRIDES.into(),
                children: vec![PolicyChildDocument::Rule(RuleDocument {
                    id: "r1".into(),
                    effect: Effect::Permit,
                    description: None,
                    target: TargetDocument::default(),
                    condition: None,
                    obligation_expressions: vec![],
                    advice_expressions: vec![],
                })],
                obligation_expressions: vec![],
                advice_expressions: vec![],
                combiner_parameters: vec![],
            })],
            obligation_expressions: vec![],
            advice_expressions: vec![],
            combiner_parameters: vec![],
        })
    }

    #[test]
    fn latest_version_satisfying_constraints_wins() {
        let mut factory = factory();
        let provider = StaticPolicyProvider::new(
            vec![
                policy("urn:example:p", "1.0", Effect::Deny),
                policy("urn:example:p", "1.5", Effect::Permit),
                policy("urn:example:p", "2.0", Effect::Deny),
            ],
            &mut factory,
            None,
        )
        .unwrap();

        let any = provider
            .get(
                PolicyKind::Policy,
                "urn:example:p",
                &PolicyVersionPatterns::any(),
                None,
                None,
            )
            .unwrap();
        assert_eq!(any.metadata().version.to_string(), "2.0");

        let constrained = provider
            .get(
                PolicyKind::Policy,
                "urn:example:p",
                &PolicyVersionPatterns {
                    version: Some("1.*".parse().unwrap()),
                    earliest_version: None,
                    latest_version: None,
                },
                None,
                None,
            )
            .unwrap();
        assert_eq!(constrained.metadata().version.to_string(), "1.5");
    }

    #[test]
    fn unknown_policy_is_an_unresolved_reference() {
        let mut factory = factory();
        let provider = StaticPolicyProvider::new(vec![], &mut factory, None).unwrap();
        let err = provider
            .get(
                PolicyKind::Policy,
                "urn:example:ghost",
                &PolicyVersionPatterns::any(),
                None,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EvaluationError::UnresolvedReference { .. }));
    }

    #[test]
    fn static_reference_cycle_fails_at_build_time() {
        let mut factory = factory();
        let err = StaticPolicyProvider::new(
            vec![
                referencing_set("urn:example:s1", "urn:example:s2"),
                referencing_set("urn:example:s2", "urn:example:s1"),
            ],
            &mut factory,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyBuildError::ReferenceCycle { .. }));
    }

    #[test]
    fn static_depth_violation_fails_at_build_time() {
        let mut factory = factory();
        let err = StaticPolicyProvider::new(
            vec![
                referencing_set("urn:example:s1", "urn:example:s2"),
                leaf_set("urn:example:s2"),
            ],
            &mut factory,
            Some(1),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PolicyBuildError::ReferenceDepthExceeded { .. }
        ));
    }

    #[test]
    fn root_reference_is_transparent() {
        let mut factory = factory();
        let mut provider = StaticPolicyProvider::new(
            vec![leaf_set("urn:example:s2")],
            &mut factory,
            Some(10),
        )
        .unwrap();

        // A root set referencing s2, compiled against the provider.
        let root_doc = PolicySetDocument {
            id: "urn:example:root".into(),
            version: "1.0".into(),
            description: None,
            target: TargetDocument::default(),
            policy_combining_alg_id: FIRST_APPLICABLE.into(),
            children: vec![PolicySetChildDocument::PolicySetIdReference(
                PolicyReferenceDocument {
                    id: "urn:example:s2".into(),
                    version: None,
                    earliest_version: None,
                    latest_version: None,
                },
            )],
            obligation_expressions: vec![],
            advice_expressions: vec![],
            combiner_parameters: vec![],
        };
        let root = factory
            .policy_set(&root_doc, &mut ReferenceMode::Static(&mut provider), &[])
            .unwrap();

        let referenced = provider
            .get(
                PolicyKind::PolicySet,
                "urn:example:s2",
                &PolicyVersionPatterns::any(),
                None,
                None,
            )
            .unwrap();

        let request = DecisionRequest::builder().build().unwrap();
        let mut ctx = EvaluationContext::new(&request);
        let via_root = root.evaluate(&mut ctx, false);

        let mut direct_ctx = EvaluationContext::new(&request);
        let direct = referenced.evaluate(&mut direct_ctx, false);

        assert_eq!(via_root.decision, Decision::Permit);
        assert_eq!(via_root.decision, direct.decision);
        assert_eq!(via_root.pep_actions, direct.pep_actions);
    }
}
