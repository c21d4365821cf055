//! Per-request evaluation context.
//!
//! One context exists per decision request, owned and mutated by the
//! evaluating thread only, and discarded with the response. It carries
//! every piece of mutable evaluation state: published variable values,
//! the per-policy decision memo, the dynamic-reference resolution memo,
//! and the policy-set reference chain currently being traversed.

use std::collections::HashMap;
use std::sync::Arc;

use kernel::DecisionRequest;
use tracing::warn;

use crate::domain::{DecisionResult, EvaluationError};
use crate::evaluator::policy::TopLevelPolicyElementEvaluator;
use crate::expression::Value;

/// Outcome of a dynamic policy-reference resolution, cached sticky for the
/// rest of the request — errors included, so one request observes one
/// consistent resolution.
pub(crate) type CachedResolution = Result<Arc<TopLevelPolicyElementEvaluator>, EvaluationError>;

pub struct EvaluationContext<'r> {
    request: &'r DecisionRequest,
    variables: HashMap<Arc<str>, Value>,
    decision_memo: HashMap<(String, bool), DecisionResult>,
    ref_memo: HashMap<String, CachedResolution>,
    ref_chain: Vec<String>,
}

impl<'r> EvaluationContext<'r> {
    pub fn new(request: &'r DecisionRequest) -> Self {
        Self {
            request,
            variables: HashMap::new(),
            decision_memo: HashMap::new(),
            ref_memo: HashMap::new(),
            ref_chain: Vec::new(),
        }
    }

    pub fn request(&self) -> &'r DecisionRequest {
        self.request
    }

    pub fn returns_applicable_policies(&self) -> bool {
        self.request.return_applicable_policies()
    }

    pub(crate) fn variable(&self, id: &str) -> Option<&Value> {
        self.variables.get(id)
    }

    pub(crate) fn set_variable(&mut self, id: Arc<str>, value: Value) {
        self.variables.insert(id, value);
    }

    pub(crate) fn remove_variable(&mut self, id: &str) {
        self.variables.remove(id);
    }

    pub(crate) fn cached_decision(&self, key: &str, skip_target: bool) -> Option<&DecisionResult> {
        self.decision_memo.get(&(key.to_string(), skip_target))
    }

    /// Stores a policy's result in its memo slot. Writing a slot twice
    /// indicates a recursion the engine does not permit; release builds
    /// keep the last write instead of panicking.
    pub(crate) fn cache_decision(&mut self, key: &str, skip_target: bool, result: DecisionResult) {
        let previous = self
            .decision_memo
            .insert((key.to_string(), skip_target), result);
        if previous.is_some() {
            warn!(policy = key, skip_target, "decision memo slot written twice");
            debug_assert!(false, "decision memo slot written twice for {key}");
        }
    }

    pub(crate) fn cached_reference(&self, key: &str) -> Option<&CachedResolution> {
        self.ref_memo.get(key)
    }

    pub(crate) fn cache_reference(&mut self, key: String, resolution: CachedResolution) {
        self.ref_memo.insert(key, resolution);
    }

    /// The chain of policy-set ids traversed through reference resolution
    /// to reach the current evaluation point.
    pub(crate) fn ref_chain(&self) -> &[String] {
        &self.ref_chain
    }

    pub(crate) fn push_ref(&mut self, id: String) {
        self.ref_chain.push(id);
    }

    pub(crate) fn pop_ref(&mut self) {
        self.ref_chain.pop();
    }
}
