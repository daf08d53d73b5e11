//! API key/secret lookup.
//!
//! Environment settings win when both the key and secret are set. Otherwise
//! the credentials file under `credentials_filepath` is read. The file is
//! JSON, either a flat object or a profile document:
//!
//! ```json
//! {"current_profile": "prod", "profiles": {"prod": {"api_key": "..", "api_secret": ".."}}}
//! ```

use crate::config::Settings;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("account_id", &self.account_id)
            .finish()
    }
}

#[derive(Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    current_profile: Option<String>,
    profiles: BTreeMap<String, Credentials>,
}

impl Credentials {
    /// Resolve credentials from settings first, then the credentials file.
    pub fn resolve(settings: &Settings) -> Result<Self> {
        if let (Some(api_key), Some(api_secret)) = (&settings.api_key, &settings.api_secret) {
            tracing::debug!("using api credentials from environment");
            return Ok(Credentials {
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
                api_url: None,
                account_id: settings.account_id.clone(),
            });
        }

        let path = settings.credentials_file();
        if !path.is_file() {
            return Err(Error::config(
                "api_key",
                format!(
                    "no api key/secret in environment and no credentials file at {}",
                    path.display()
                ),
            ));
        }
        let mut creds = Self::from_file(&path)?;
        if creds.account_id.is_none() {
            creds.account_id = settings.account_id.clone();
        }
        tracing::debug!(path = %path.display(), "loaded api credentials from file");
        Ok(creds)
    }

    /// Read credentials from a flat or profile-style JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|err| Error::Credentials(format!("reading {}: {err}", path.display())))?;
        let value: Value = serde_json::from_str(&data)
            .map_err(|err| Error::Credentials(format!("parsing {}: {err}", path.display())))?;

        if value.get("profiles").is_some() {
            let doc: ProfileDocument = serde_json::from_value(value).map_err(|err| {
                Error::Credentials(format!("invalid profiles in {}: {err}", path.display()))
            })?;
            let profile = doc.current_profile.as_deref().unwrap_or("default");
            return doc.profiles.get(profile).cloned().ok_or_else(|| {
                Error::Credentials(format!(
                    "profile '{profile}' not found in {}",
                    path.display()
                ))
            });
        }

        serde_json::from_value(value)
            .map_err(|err| Error::Credentials(format!("invalid credentials in {}: {err}", path.display())))
    }

    /// Base url to talk to: the file's `api_url` when set, else the settings default.
    pub fn base_url<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.api_url.as_deref().unwrap_or(&settings.api_base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings_in(dir: &Path) -> Settings {
        let mut settings = Settings::resolve_with(|_| None).unwrap();
        settings.credentials_filepath = dir.to_path_buf();
        settings
    }

    #[test]
    fn environment_credentials_win() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(dir.path());
        settings.api_key = Some("env-key".into());
        settings.api_secret = Some("env-secret".into());
        let creds = Credentials::resolve(&settings).unwrap();
        assert_eq!(creds.api_key, "env-key");
        assert_eq!(creds.base_url(&settings), "https://api.pureport.com");
    }

    #[test]
    fn profile_document_selects_current_profile() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("credentials"),
            serde_json::to_string(&json!({
                "current_profile": "staging",
                "profiles": {
                    "default": {"api_key": "k1", "api_secret": "s1"},
                    "staging": {"api_key": "k2", "api_secret": "s2", "api_url": "https://staging.example"}
                }
            }))
            .unwrap(),
        )
        .unwrap();
        let settings = settings_in(dir.path());
        let creds = Credentials::resolve(&settings).unwrap();
        assert_eq!(creds.api_key, "k2");
        assert_eq!(creds.base_url(&settings), "https://staging.example");
    }

    #[test]
    fn flat_file_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        fs::write(&path, r#"{"api_key": "k", "api_secret": "s", "account_id": "ac-1"}"#).unwrap();
        let creds = Credentials::from_file(&path).unwrap();
        assert_eq!(creds.account_id.as_deref(), Some("ac-1"));
    }

    #[test]
    fn missing_sources_fail_with_config_error() {
        let dir = TempDir::new().unwrap();
        let err = Credentials::resolve(&settings_in(dir.path())).expect_err("no creds");
        assert!(matches!(err, Error::Config { ref name, .. } if name == "api_key"));
    }

    #[test]
    fn debug_redacts_secret() {
        let creds = Credentials {
            api_key: "k".into(),
            api_secret: "super-secret".into(),
            api_url: None,
            account_id: None,
        };
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
