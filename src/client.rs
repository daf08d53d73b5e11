//! Client facade wiring settings, session, spec loader, bindings and models.

use crate::bindings::{Api, CallArgs, OperationRegistry};
use crate::config::Settings;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::models::ModelRegistry;
use crate::spec_loader::{SpecDocument, SpecLoader};
use crate::transport::{HttpSession, Transport};
use serde_json::Value;
use std::sync::{Arc, Mutex};

struct Generated {
    api: Arc<Api>,
    models: Arc<ModelRegistry>,
}

pub struct Client {
    settings: Settings,
    session: Arc<dyn Transport>,
    loader: SpecLoader,
    generated: Mutex<Option<Generated>>,
}

impl Client {
    /// Resolve credentials and open an HTTP session.
    ///
    /// With `automake_bindings` set the OpenAPI document is loaded and bindings generated
    /// immediately; otherwise that happens on first use.
    pub fn new(settings: Settings) -> Result<Self> {
        let credentials = Credentials::resolve(&settings)?;
        let session = Arc::new(HttpSession::new(&settings, credentials));
        let loader = SpecLoader::new(&settings);
        Self::with_parts(settings, session, loader)
    }

    /// Use an injected session instead of logging in over HTTP.
    pub fn with_transport(settings: Settings, session: Arc<dyn Transport>) -> Result<Self> {
        let loader = SpecLoader::new(&settings);
        Self::with_parts(settings, session, loader)
    }

    /// Build a client around an existing transport and loader.
    pub fn with_parts(
        settings: Settings,
        session: Arc<dyn Transport>,
        loader: SpecLoader,
    ) -> Result<Self> {
        let client = Self {
            settings,
            session,
            loader,
            generated: Mutex::new(None),
        };
        if client.settings.automake_bindings {
            client.api()?;
        }
        Ok(client)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &Arc<dyn Transport> {
        &self.session
    }

    pub fn spec(&self) -> Result<Arc<SpecDocument>> {
        self.loader.load(self.session.as_ref())
    }

    pub fn api(&self) -> Result<Arc<Api>> {
        self.with_generated(|g| Arc::clone(&g.api))
    }

    pub fn models(&self) -> Result<Arc<ModelRegistry>> {
        self.with_generated(|g| Arc::clone(&g.models))
    }

    /// Shortcut for `api()?.call(..)`.
    pub fn call(&self, operation_id: &str, args: CallArgs) -> Result<Value> {
        self.api()?.call(operation_id, args)
    }

    /// Shortcut for `models()?.validate(..)`.
    pub fn validate(&self, model: &str, variant: Option<&str>, data: &Value) -> Result<Value> {
        self.models()?.validate(model, variant, data)
    }

    fn with_generated<T>(&self, pick: impl FnOnce(&Generated) -> T) -> Result<T> {
        let mut slot = self.generated.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(generated) = slot.as_ref() {
            return Ok(pick(generated));
        }
        let doc = self.spec()?;
        let api = OperationRegistry::from_document(&doc)?.bind(Arc::clone(&self.session));
        let models = ModelRegistry::from_document(&doc)?;
        tracing::info!(
            operations = api.len(),
            models = models.len(),
            version = doc.version().unwrap_or("unknown"),
            "generated api bindings"
        );
        let generated = Generated {
            api: Arc::new(api),
            models: Arc::new(models),
        };
        let picked = pick(&generated);
        *slot = Some(generated);
        Ok(picked)
    }
}
