//! OpenAPI operation bindings.
//!
//! The document's operations are parsed into [`OperationSpec`]s held by an
//! [`OperationRegistry`]; binding the registry to a session yields the [`Api`]
//! namespace, one [`BoundOperation`] per `operationId`. Callers dispatch by
//! name through [`Api::call`] or look an operation up with [`Api::operation`].

pub mod operation;
pub mod registry;

pub use operation::{
    BodySpec, OperationSpec, ParameterLocation, ParameterSpec, PathTemplate, ResponseSpec,
};
pub use registry::{Api, BoundOperation, CallArgs, OperationRegistry};

use crate::error::Result;
use crate::spec_loader::SpecDocument;
use crate::transport::Transport;
use std::sync::Arc;

/// Parse `doc` and bind every operation to `session`.
pub fn generate(doc: &SpecDocument, session: Arc<dyn Transport>) -> Result<Api> {
    let registry = OperationRegistry::from_document(doc)?;
    tracing::info!(
        operations = registry.len(),
        version = doc.version().unwrap_or("unknown"),
        "generated api bindings"
    );
    Ok(registry.bind(session))
}
