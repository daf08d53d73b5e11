//! OpenAPI document loader with cache/bundled/remote fallbacks.
//!
//! Resolution order is fixed: the configured cache file, then the copy of
//! `schema/openapi.json` compiled into the crate, then `GET /openapi.json`
//! through the session. Every candidate must pass the envelope check in
//! `schema/openapi_envelope.schema.json` before it is accepted. Results are
//! memoized per session id; the memo mutex is held while a document is being
//! resolved so one session never fetches or writes the cache twice.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::transport::{SessionId, Transport};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tempfile::NamedTempFile;

const ENVELOPE_SCHEMA: &str = include_str!("../schema/openapi_envelope.schema.json");
const BUNDLED_SPEC: &str = include_str!("../schema/openapi.json");
const REMOTE_SPEC_PATH: &str = "/openapi.json";

/// Where a loaded document came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecSource {
    CacheFile(PathBuf),
    /// The compiled-in copy (`None`) or an override file.
    Bundled(Option<PathBuf>),
    Remote,
}

/// A parsed OpenAPI document that passed the envelope check.
#[derive(Clone, Debug)]
pub struct SpecDocument {
    source: SpecSource,
    raw: Value,
}

impl SpecDocument {
    /// Wrap an already-parsed document, enforcing the envelope check.
    pub fn from_value(raw: Value, source: SpecSource) -> Result<Self> {
        check_envelope(&raw).map_err(Error::SpecParse)?;
        Ok(Self { source, raw })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = read_json(path).map_err(Error::SpecUnavailable)?;
        Self::from_value(raw, SpecSource::CacheFile(path.to_path_buf()))
    }

    pub fn source(&self) -> &SpecSource {
        &self.source
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The document compiled into the crate.
    pub fn bundled() -> Result<Self> {
        parse_bundled().map_err(Error::SpecParse)
    }

    /// `info.version` when the document declares one.
    pub fn version(&self) -> Option<&str> {
        self.raw.pointer("/info/version").and_then(Value::as_str)
    }
}

enum Bundled {
    Embedded,
    File(PathBuf),
}

/// Resolves and memoizes the OpenAPI document per session.
///
/// Entries live until [`SpecLoader::forget`] is called for their session or
/// the loader is dropped; long-lived loaders that cycle through many
/// sessions should forget the ones they close.
pub struct SpecLoader {
    cache_file: PathBuf,
    bundled: Option<Bundled>,
    cache_enabled: bool,
    memo: Mutex<HashMap<SessionId, Arc<SpecDocument>>>,
}

impl SpecLoader {
    pub fn new(settings: &Settings) -> Self {
        Self {
            cache_file: settings.openapi_file.clone(),
            bundled: Some(Bundled::Embedded),
            cache_enabled: settings.cache_api_spec,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the compiled-in fallback with a file, or disable it with `None`.
    pub fn with_bundled_file(mut self, path: Option<PathBuf>) -> Self {
        self.bundled = path.map(Bundled::File);
        self
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Resolve the spec document for `session`, reusing a memoized copy.
    pub fn load(&self, session: &dyn Transport) -> Result<Arc<SpecDocument>> {
        let mut memo = self.memo.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(doc) = memo.get(&session.session_id()) {
            return Ok(Arc::clone(doc));
        }
        let doc = Arc::new(self.resolve(session)?);
        memo.insert(session.session_id(), Arc::clone(&doc));
        Ok(doc)
    }

    /// Drop the memoized document for `session`, forcing re-resolution.
    pub fn forget(&self, session: SessionId) {
        let mut memo = self.memo.lock().unwrap_or_else(|err| err.into_inner());
        memo.remove(&session);
    }

    /// Number of sessions with a memoized document.
    pub fn memoized_sessions(&self) -> usize {
        self.memo.lock().unwrap_or_else(|err| err.into_inner()).len()
    }

    fn resolve(&self, session: &dyn Transport) -> Result<SpecDocument> {
        let mut failures = Vec::new();

        if self.cache_file.is_file() {
            tracing::debug!(path = %self.cache_file.display(), "loading openapi spec from cache file");
            match load_local(&self.cache_file, SpecSource::CacheFile(self.cache_file.clone())) {
                Ok(doc) => return Ok(doc),
                Err(reason) => {
                    tracing::warn!(path = %self.cache_file.display(), %reason, "ignoring cached openapi spec");
                    failures.push(reason);
                }
            }
        }

        if let Some(loaded) = self.load_bundled() {
            match loaded {
                Ok(doc) => return Ok(doc),
                Err(reason) => {
                    tracing::warn!(%reason, "ignoring bundled openapi spec");
                    failures.push(reason);
                }
            }
        }

        tracing::debug!("retrieving openapi spec from remote server");
        match self.fetch_remote(session) {
            Ok(doc) => Ok(doc),
            Err(reason) => {
                tracing::error!(%reason, "unable to retrieve openapi spec");
                failures.push(reason);
                Err(Error::SpecUnavailable(failures.join("; ")))
            }
        }
    }

    fn load_bundled(&self) -> Option<std::result::Result<SpecDocument, String>> {
        match self.bundled.as_ref()? {
            Bundled::Embedded => {
                tracing::debug!("loading compiled-in openapi spec");
                Some(parse_bundled())
            }
            Bundled::File(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading bundled openapi spec");
                Some(load_local(path, SpecSource::Bundled(Some(path.clone()))))
            }
            Bundled::File(_) => None,
        }
    }

    fn fetch_remote(&self, session: &dyn Transport) -> std::result::Result<SpecDocument, String> {
        let raw = session
            .get(REMOTE_SPEC_PATH)
            .map_err(|err| format!("remote fetch failed: {err}"))?;
        check_envelope(&raw).map_err(|reason| format!("remote document: {reason}"))?;
        if self.cache_enabled {
            if let Err(err) = write_cache(&self.cache_file, &raw) {
                tracing::warn!(path = %self.cache_file.display(), error = %err, "failed to cache openapi spec");
            } else {
                tracing::info!(path = %self.cache_file.display(), "cached openapi spec");
            }
        }
        Ok(SpecDocument {
            source: SpecSource::Remote,
            raw,
        })
    }
}

fn load_local(path: &Path, source: SpecSource) -> std::result::Result<SpecDocument, String> {
    let raw = read_json(path)?;
    check_envelope(&raw).map_err(|reason| format!("{}: {reason}", path.display()))?;
    Ok(SpecDocument { source, raw })
}

fn parse_bundled() -> std::result::Result<SpecDocument, String> {
    let raw: Value = serde_json::from_str(BUNDLED_SPEC)
        .map_err(|err| format!("compiled-in openapi spec is not JSON: {err}"))?;
    check_envelope(&raw).map_err(|reason| format!("compiled-in openapi spec: {reason}"))?;
    Ok(SpecDocument {
        source: SpecSource::Bundled(None),
        raw,
    })
}

fn read_json(path: &Path) -> std::result::Result<Value, String> {
    let file = File::open(path).map_err(|err| format!("opening {}: {err}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("parsing {}: {err}", path.display()))
}

fn envelope() -> std::result::Result<&'static JSONSchema, String> {
    static ENVELOPE: OnceLock<std::result::Result<JSONSchema, String>> = OnceLock::new();
    ENVELOPE
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(ENVELOPE_SCHEMA)
                .map_err(|err| format!("envelope schema is not JSON: {err}"))?;
            JSONSchema::compile(&schema).map_err(|err| format!("compiling envelope schema: {err}"))
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn check_envelope(raw: &Value) -> std::result::Result<(), String> {
    let compiled = envelope()?;
    if let Err(errors) = compiled.validate(raw) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(format!("not an OpenAPI document: {details}"));
    }
    Ok(())
}

fn write_cache(path: &Path, raw: &Value) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, raw)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
