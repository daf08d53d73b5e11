//! Client core for the Pureport cloud networking REST API.
//!
//! The crate resolves configuration from defaults and `PUREPORT_*`
//! environment variables, loads the service's OpenAPI document (cache file,
//! bundled copy, then the live `/openapi.json`), and turns it into two
//! registries: an [`Api`] of callable operations keyed by `operationId`, and a
//! [`ModelRegistry`] that validates request payloads before they are sent.
//! [`Client`] ties these together for the `pureport-api` binary and for
//! library callers.

pub mod bindings;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod helpers;
pub mod logging;
pub mod models;
pub mod query;
pub mod spec_loader;
pub mod transport;

pub use bindings::{Api, BoundOperation, CallArgs, OperationRegistry, OperationSpec, generate};
pub use client::Client;
pub use config::{CONFIG_ITEMS, ConfigItem, ConfigValue, Settings, config_item};
pub use credentials::Credentials;
pub use error::{Error, Result, ValidationError};
pub use models::ModelRegistry;
pub use query::{Identified, LookupKey, find_object};
pub use spec_loader::{SpecDocument, SpecLoader, SpecSource};
pub use transport::{HttpSession, Method, Request, Response, SessionId, Transport};
