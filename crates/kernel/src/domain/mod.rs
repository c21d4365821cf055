//! Shared domain for the Abacus engine.
//!
//! Structure:
//! - `attribute_value`: typed attribute values and their datatypes.
//! - `bag`: multisets of values with a declared element datatype.
//! - `category`: XACML attribute categories.
//! - `attribute`: attribute identifiers and fully-qualified attribute keys.
//! - `request`: the read-only decision request handed to the evaluator.

pub mod attribute;
pub mod attribute_value;
pub mod bag;
pub mod category;
pub mod request;

pub use attribute::{AttributeFqn, AttributeId};
pub use attribute_value::{AttributeDatatype, AttributeValue};
pub use bag::{Bag, BagError};
pub use category::AttributeCategory;
pub use request::{DecisionRequest, DecisionRequestBuilder, RequestError};
