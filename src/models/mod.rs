//! Request payload models.
//!
//! A [`ModelRegistry`] is built once from the document's schemas and checks
//! caller-supplied JSON before it is submitted. Polymorphic models (a
//! connection and its `type` variants) are resolved through their
//! discriminator.

pub mod registry;
pub mod spec;
mod validate;

pub use registry::ModelRegistry;
pub use spec::{Discriminator, FieldSpec, FieldType, ModelSpec, TypeSpec};
