//! # Abacus Kernel Crate
//!
//! Shared kernel for the Abacus decision engine: the attribute/value data
//! model every other crate speaks. This crate knows nothing about policies,
//! rules or combining algorithms; it only defines the typed values a
//! decision request carries and the read-only request itself.
//!
//! Principles:
//! - No business logic, only stable value objects and the request model.
//! - No dependency on the evaluator crate (this module stays at the base).
//! - Serializable end to end (serde on every public type).

pub mod domain;

// Re-export de tipos fundamentales para uso directo por consumidores.
pub use domain::{
    AttributeCategory, AttributeDatatype, AttributeFqn, AttributeId, AttributeValue, Bag, BagError,
    DecisionRequest, DecisionRequestBuilder, RequestError,
};
