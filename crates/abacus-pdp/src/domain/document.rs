//! Parsed policy documents.
//!
//! The engine is constructed from these already-parsed structures; the
//! concrete serialization (XML, JSON, ...) is an IO-layer concern. The
//! serde derives give a JSON form for free, which the test suites use.

use kernel::{AttributeDatatype, AttributeValue};
use serde::{Deserialize, Serialize};

use super::decision::Effect;

/// A top-level policy element document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyElementDocument {
    Policy(PolicyDocument),
    PolicySet(PolicySetDocument),
}

impl PolicyElementDocument {
    pub fn id(&self) -> &str {
        match self {
            Self::Policy(p) => &p.id,
            Self::PolicySet(ps) => &ps.id,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Policy(p) => &p.version,
            Self::PolicySet(ps) => &ps.version,
        }
    }
}

/// A `Policy`: target, rule-combining algorithm, interleaved variable
/// definitions and rules, and PEP action expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyDocument {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub target: TargetDocument,
    pub rule_combining_alg_id: String,
    /// Declaration-ordered children; variable visibility follows this order.
    #[serde(default)]
    pub children: Vec<PolicyChildDocument>,
    #[serde(default)]
    pub obligation_expressions: Vec<PepActionExpressionDocument>,
    #[serde(default)]
    pub advice_expressions: Vec<PepActionExpressionDocument>,
    #[serde(default)]
    pub combiner_parameters: Vec<CombinerParameterDocument>,
}

/// A declaration-ordered child of a `Policy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyChildDocument {
    VariableDefinition(VariableDefinitionDocument),
    Rule(RuleDocument),
}

/// A `PolicySet`: target, policy-combining algorithm, and child policies,
/// policy sets or references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicySetDocument {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub target: TargetDocument,
    pub policy_combining_alg_id: String,
    #[serde(default)]
    pub children: Vec<PolicySetChildDocument>,
    #[serde(default)]
    pub obligation_expressions: Vec<PepActionExpressionDocument>,
    #[serde(default)]
    pub advice_expressions: Vec<PepActionExpressionDocument>,
    #[serde(default)]
    pub combiner_parameters: Vec<CombinerParameterDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicySetChildDocument {
    Policy(PolicyDocument),
    PolicySet(Box<PolicySetDocument>),
    PolicyIdReference(PolicyReferenceDocument),
    PolicySetIdReference(PolicyReferenceDocument),
}

/// A `Rule`: effect, own target, optional condition and PEP actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleDocument {
    pub id: String,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub target: TargetDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ExpressionDocument>,
    #[serde(default)]
    pub obligation_expressions: Vec<PepActionExpressionDocument>,
    #[serde(default)]
    pub advice_expressions: Vec<PepActionExpressionDocument>,
}

/// A `Target`: conjunction of AnyOf, each a disjunction of AllOf, each a
/// conjunction of Match. Empty means "always applicable".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetDocument {
    #[serde(default)]
    pub any_of: Vec<AnyOfDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnyOfDocument {
    pub all_of: Vec<AllOfDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AllOfDocument {
    pub matches: Vec<MatchDocument>,
}

/// A `Match`: a binary match function applied between a literal and every
/// element of a bag produced by a designator or selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatchDocument {
    pub match_id: String,
    pub value: AttributeValue,
    pub source: BagSourceDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BagSourceDocument {
    AttributeDesignator(AttributeDesignatorDocument),
    AttributeSelector(AttributeSelectorDocument),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AttributeDesignatorDocument {
    pub category: String,
    pub attribute_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub datatype: AttributeDatatype,
    #[serde(default)]
    pub must_be_present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AttributeSelectorDocument {
    pub category: String,
    pub path: String,
    pub datatype: AttributeDatatype,
    #[serde(default)]
    pub must_be_present: bool,
}

/// An evaluable expression document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpressionDocument {
    Value(AttributeValue),
    Apply {
        function_id: String,
        #[serde(default)]
        args: Vec<ExpressionDocument>,
    },
    VariableReference {
        variable_id: String,
    },
    AttributeDesignator(AttributeDesignatorDocument),
    AttributeSelector(AttributeSelectorDocument),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VariableDefinitionDocument {
    pub variable_id: String,
    pub expression: ExpressionDocument,
}

/// An `ObligationExpression` or `AdviceExpression`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PepActionExpressionDocument {
    pub id: String,
    /// `FulfillOn` for obligations, `AppliesTo` for advice.
    pub applies_to: Effect,
    #[serde(default)]
    pub assignments: Vec<AttributeAssignmentDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AttributeAssignmentDocument {
    pub attribute_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub expression: ExpressionDocument,
}

/// A rule/policy combiner parameter. Representable for schema completeness;
/// every standard combining algorithm rejects them at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CombinerParameterDocument {
    pub parameter_name: String,
    pub value: AttributeValue,
    /// RuleIdRef / PolicyIdRef when the parameter targets one child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<String>,
}

/// A `PolicyIdReference` / `PolicySetIdReference` with optional version
/// constraint patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyReferenceDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_document_json_round_trip() {
        let doc = PolicyDocument {
            id: "urn:example:policy:1".into(),
            version: "1.0".into(),
            description: Some("example".into()),
            target: TargetDocument::default(),
            rule_combining_alg_id:
                "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides".into(),
            children: vec![PolicyChildDocument::Rule(RuleDocument {
                id: "r1".into(),
                effect: Effect::Permit,
                description: None,
                target: TargetDocument::default(),
                condition: Some(ExpressionDocument::Value(AttributeValue::boolean(true))),
                obligation_expressions: vec![],
                advice_expressions: vec![],
            })],
            obligation_expressions: vec![],
            advice_expressions: vec![],
            combiner_parameters: vec![],
        };

        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: PolicyDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, doc.id);
        assert_eq!(back.children.len(), 1);
    }
}
