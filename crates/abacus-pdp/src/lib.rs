//! # Abacus PDP Crate
//!
//! The policy evaluation core of the Abacus attribute-based access
//! control decision point, implementing the XACML 3.0 evaluation
//! semantics: policy sets, policies, rules, targets, obligations/advice,
//! variable definitions, combining algorithms, and static/dynamic policy
//! references with loop and depth control.
//!
//! ## Architecture
//!
//! - **domain**: decisions, statuses, PEP actions, policy versions and
//!   identities, parsed policy documents, error taxonomy.
//! - **expression**: the evaluable expression layer and its factory,
//!   function registry and XPath compilation model.
//! - **evaluator**: the compiled evaluator tree (target, rule, policy,
//!   references, combining algorithms) and the per-request context.
//! - **ports / provider**: the policy-provider port plus the in-tree
//!   static implementation.
//!
//! Compiled evaluators are immutable and safe to share across threads;
//! each request owns a mutable [`evaluator::EvaluationContext`] that is
//! dropped with the response.

pub mod domain;
pub mod evaluator;
pub mod expression;
pub mod ports;
pub mod provider;

// API pública
pub mod api;
pub use api::*;
