//! The evaluator tree: compiled, immutable nodes producing decisions from
//! a per-request context.

pub mod builder;
pub mod combining;
pub mod context;
pub mod pep_action;
pub mod policy;
pub mod reference;
pub mod rule;
pub mod target;

pub use builder::{PolicyFactory, ReferenceMode, StaticRefResolver};
pub use combining::{CombiningAlg, CombiningAlgRegistry, Decidable, StandardCombiningAlgRegistry};
pub use context::EvaluationContext;
pub use policy::TopLevelPolicyElementEvaluator;
pub use reference::{DynamicPolicyRefEvaluator, PolicySetChild, StaticPolicyRefEvaluator};
pub use rule::{ConditionEvaluator, RuleEvaluator};
pub use target::{AllOfEvaluator, AnyOfEvaluator, MatchEvaluator, TargetEvaluator};
