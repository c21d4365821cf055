//! Centralized public interface of the crate.

pub use crate::domain::document::{
    AllOfDocument, AnyOfDocument, AttributeAssignmentDocument, AttributeDesignatorDocument,
    AttributeSelectorDocument, BagSourceDocument, CombinerParameterDocument, ExpressionDocument,
    MatchDocument, PepActionExpressionDocument, PolicyChildDocument, PolicyDocument,
    PolicyElementDocument, PolicyReferenceDocument, PolicySetChildDocument, PolicySetDocument,
    RuleDocument, TargetDocument, VariableDefinitionDocument,
};
pub use crate::domain::{
    Decision, DecisionBias, DecisionResult, Effect, EvaluationError, ExtendedDecision, PepAction,
    PepActionAssignment, PolicyBuildError, PolicyKind, PolicyRefsMetadata, PolicyVersion,
    PolicyVersionPatterns, PrimaryPolicyMetadata, Status, StatusCode, VersionPattern,
};
pub use crate::evaluator::{
    CombiningAlgRegistry, EvaluationContext, PolicyFactory, ReferenceMode,
    StandardCombiningAlgRegistry, StaticRefResolver, TopLevelPolicyElementEvaluator,
};
pub use crate::expression::{
    ExpressionFactory, FunctionRegistry, StandardFunctionRegistry, Value, XPathCompiler,
};
pub use crate::ports::PolicyProvider;
pub use crate::provider::StaticPolicyProvider;
