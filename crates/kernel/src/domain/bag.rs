//! Bags (multisets) of attribute values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::attribute_value::{AttributeDatatype, AttributeValue};

/// Errors raised by bag construction and accessors.
#[derive(Debug, Clone, Error)]
pub enum BagError {
    #[error("bag of {expected} cannot hold a {found} value")]
    MixedDatatypes {
        expected: AttributeDatatype,
        found: AttributeDatatype,
    },

    #[error("expected a bag with exactly one value, got {len}")]
    NotSingleton { len: usize },
}

/// A multiset of attribute values sharing one datatype.
///
/// Requests map attribute keys to bags, and designators/selectors evaluate
/// to bags. An empty bag still carries its element datatype, so datatype
/// checks hold even when a request has no values for an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bag {
    datatype: AttributeDatatype,
    values: Vec<AttributeValue>,
}

impl Bag {
    /// Builds a bag, checking every element against the declared datatype.
    pub fn new(
        datatype: AttributeDatatype,
        values: Vec<AttributeValue>,
    ) -> Result<Self, BagError> {
        for v in &values {
            if v.datatype() != datatype {
                return Err(BagError::MixedDatatypes {
                    expected: datatype,
                    found: v.datatype(),
                });
            }
        }
        Ok(Self { datatype, values })
    }

    /// Empty bag of the given datatype.
    pub fn empty(datatype: AttributeDatatype) -> Self {
        Self {
            datatype,
            values: Vec::new(),
        }
    }

    /// Bag holding a single value; the datatype is taken from the value.
    pub fn of(value: AttributeValue) -> Self {
        Self {
            datatype: value.datatype(),
            values: vec![value],
        }
    }

    pub fn datatype(&self) -> AttributeDatatype {
        self.datatype
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.values.iter()
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.contains(value)
    }

    /// The single element of a singleton bag (one-and-only semantics).
    pub fn single(&self) -> Result<&AttributeValue, BagError> {
        match self.values.as_slice() {
            [v] => Ok(v),
            other => Err(BagError::NotSingleton { len: other.len() }),
        }
    }

    /// Appends every value of `other`, which must share this bag's datatype.
    pub fn merge(&mut self, other: Bag) -> Result<(), BagError> {
        if other.datatype != self.datatype {
            return Err(BagError::MixedDatatypes {
                expected: self.datatype,
                found: other.datatype,
            });
        }
        self.values.extend(other.values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mixed_datatypes() {
        let err = Bag::new(
            AttributeDatatype::String,
            vec![
                AttributeValue::string("a"),
                AttributeValue::integer(1),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, BagError::MixedDatatypes { .. }));
    }

    #[test]
    fn empty_bag_keeps_datatype() {
        let bag = Bag::empty(AttributeDatatype::Integer);
        assert!(bag.is_empty());
        assert_eq!(bag.datatype(), AttributeDatatype::Integer);
    }

    #[test]
    fn single_requires_exactly_one() {
        let bag = Bag::of(AttributeValue::string("only"));
        assert_eq!(bag.single().unwrap(), &AttributeValue::string("only"));

        let empty = Bag::empty(AttributeDatatype::String);
        assert!(matches!(
            empty.single(),
            Err(BagError::NotSingleton { len: 0 })
        ));
    }

    #[test]
    fn merge_checks_datatype() {
        let mut bag = Bag::of(AttributeValue::string("a"));
        bag.merge(Bag::of(AttributeValue::string("b"))).unwrap();
        assert_eq!(bag.len(), 2);
        assert!(bag.merge(Bag::of(AttributeValue::integer(3))).is_err());
    }
}
