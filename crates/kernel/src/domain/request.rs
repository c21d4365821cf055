//! The read-only decision request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::attribute::{AttributeFqn, AttributeId};
use super::bag::{Bag, BagError};
use super::category::AttributeCategory;

/// Errors raised while assembling a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("attribute {fqn} appears with conflicting datatypes")]
    ConflictingDatatypes {
        fqn: AttributeFqn,
        #[source]
        source: BagError,
    },
}

/// An authorization request: a bundle of attribute bags organized by
/// category, plus the flag asking the engine to report which policies
/// were applicable.
///
/// The evaluator treats a request as strictly read-only; all mutable
/// per-request state lives in the evaluation context, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    attributes: HashMap<AttributeFqn, Bag>,
    return_applicable_policies: bool,
}

impl DecisionRequest {
    pub fn builder() -> DecisionRequestBuilder {
        DecisionRequestBuilder::default()
    }

    pub fn return_applicable_policies(&self) -> bool {
        self.return_applicable_policies
    }

    /// Looks up the bag for `(category, id, issuer)`.
    ///
    /// With `issuer = Some(..)` the lookup is exact. With `issuer = None`
    /// the designator matches attributes regardless of issuer (XACML
    /// designator semantics), so bags from every issuer of the attribute
    /// are merged. Returns `Ok(None)` when the request carries no matching
    /// attribute at all, and an error when the same attribute appears
    /// under different issuers with different datatypes — the builder only
    /// validates exact keys, so the conflict can surface here.
    pub fn attribute_bag(
        &self,
        category: &AttributeCategory,
        id: &AttributeId,
        issuer: Option<&str>,
    ) -> Result<Option<Bag>, BagError> {
        if let Some(issuer) = issuer {
            let key = AttributeFqn::new(category.clone(), id.clone(), Some(issuer.to_string()));
            return Ok(self.attributes.get(&key).cloned());
        }

        let mut merged: Option<Bag> = None;
        for (fqn, bag) in &self.attributes {
            if &fqn.category == category && &fqn.id == id {
                match merged.as_mut() {
                    None => merged = Some(bag.clone()),
                    Some(m) => m.merge(bag.clone())?,
                }
            }
        }
        Ok(merged)
    }
}

/// Builder for [`DecisionRequest`]. Repeated keys merge into one bag.
#[derive(Debug, Default)]
pub struct DecisionRequestBuilder {
    attributes: Vec<(AttributeFqn, Bag)>,
    return_applicable_policies: bool,
}

impl DecisionRequestBuilder {
    pub fn attribute(mut self, fqn: AttributeFqn, bag: Bag) -> Self {
        self.attributes.push((fqn, bag));
        self
    }

    /// Convenience for the common single-value case.
    pub fn single(
        self,
        category: impl Into<AttributeCategory>,
        id: impl Into<AttributeId>,
        value: super::attribute_value::AttributeValue,
    ) -> Self {
        self.attribute(AttributeFqn::new(category, id, None), Bag::of(value))
    }

    pub fn return_applicable_policies(mut self, flag: bool) -> Self {
        self.return_applicable_policies = flag;
        self
    }

    pub fn build(self) -> Result<DecisionRequest, RequestError> {
        let mut attributes: HashMap<AttributeFqn, Bag> = HashMap::new();
        for (fqn, bag) in self.attributes {
            match attributes.get_mut(&fqn) {
                None => {
                    attributes.insert(fqn, bag);
                }
                Some(existing) => {
                    existing
                        .merge(bag)
                        .map_err(|source| RequestError::ConflictingDatatypes {
                            fqn: fqn.clone(),
                            source,
                        })?;
                }
            }
        }
        Ok(DecisionRequest {
            attributes,
            return_applicable_policies: self.return_applicable_policies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attribute_value::AttributeValue;

    #[test]
    fn builder_merges_repeated_keys() {
        let fqn = AttributeFqn::new(
            AttributeCategory::access_subject(),
            AttributeId::new("urn:example:group"),
            None,
        );
        let request = DecisionRequest::builder()
            .attribute(fqn.clone(), Bag::of(AttributeValue::string("dev")))
            .attribute(fqn.clone(), Bag::of(AttributeValue::string("ops")))
            .build()
            .unwrap();

        let bag = request
            .attribute_bag(&fqn.category, &fqn.id, None)
            .unwrap()
            .unwrap();
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn builder_rejects_conflicting_datatypes() {
        let fqn = AttributeFqn::new(
            AttributeCategory::resource(),
            AttributeId::resource_id(),
            None,
        );
        let err = DecisionRequest::builder()
            .attribute(fqn.clone(), Bag::of(AttributeValue::string("doc")))
            .attribute(fqn, Bag::of(AttributeValue::integer(9)))
            .build()
            .unwrap_err();
        assert!(matches!(err, RequestError::ConflictingDatatypes { .. }));
    }

    #[test]
    fn no_issuer_lookup_merges_all_issuers() {
        let category = AttributeCategory::access_subject();
        let id = AttributeId::new("urn:example:clearance");
        let request = DecisionRequest::builder()
            .attribute(
                AttributeFqn::new(category.clone(), id.clone(), Some("issuer-a".into())),
                Bag::of(AttributeValue::string("secret")),
            )
            .attribute(
                AttributeFqn::new(category.clone(), id.clone(), Some("issuer-b".into())),
                Bag::of(AttributeValue::string("top-secret")),
            )
            .build()
            .unwrap();

        let merged = request.attribute_bag(&category, &id, None).unwrap().unwrap();
        assert_eq!(merged.len(), 2);

        let exact = request
            .attribute_bag(&category, &id, Some("issuer-a"))
            .unwrap()
            .unwrap();
        assert_eq!(exact.len(), 1);
    }

    #[test]
    fn no_issuer_lookup_surfaces_cross_issuer_datatype_conflicts() {
        let category = AttributeCategory::resource();
        let id = AttributeId::new("urn:example:size");
        // Distinct keys, so the builder accepts them; only the merged
        // no-issuer lookup can observe the conflict.
        let request = DecisionRequest::builder()
            .attribute(
                AttributeFqn::new(category.clone(), id.clone(), Some("issuer-a".into())),
                Bag::of(AttributeValue::integer(4)),
            )
            .attribute(
                AttributeFqn::new(category.clone(), id.clone(), Some("issuer-b".into())),
                Bag::of(AttributeValue::string("four")),
            )
            .build()
            .unwrap();

        let err = request.attribute_bag(&category, &id, None).unwrap_err();
        assert!(matches!(err, BagError::MixedDatatypes { .. }));

        // Exact-issuer lookups remain unaffected.
        assert!(
            request
                .attribute_bag(&category, &id, Some("issuer-a"))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn missing_attribute_is_none() {
        let request = DecisionRequest::builder().build().unwrap();
        assert!(
            request
                .attribute_bag(
                    &AttributeCategory::action(),
                    &AttributeId::action_id(),
                    None
                )
                .unwrap()
                .is_none()
        );
    }
}
