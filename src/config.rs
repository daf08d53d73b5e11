//! Client configuration: a static table of items resolved once into `Settings`.
//!
//! Each [`ConfigItem`] names a default, an optional environment override and a
//! coercion. [`Settings::from_env`] walks the table once at startup; the
//! resulting struct is immutable and handed to the session, the spec loader
//! and the credentials lookup by reference. Tests resolve against an explicit
//! lookup function instead of the process environment.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Coercion applied to a raw default or environment value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
    Str,
    Bool,
    Int,
    Float,
    /// String with a leading `~` expanded to the home directory.
    Path,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Path(PathBuf),
}

#[derive(Clone, Copy, Debug)]
pub struct ConfigItem {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
    pub env: Option<&'static str>,
    pub transform: Transform,
}

pub const CONFIG_ITEMS: &[ConfigItem] = &[
    ConfigItem {
        name: "transport_read_timeout",
        description: "HTTP socket read timeout value",
        default: Some("10.0"),
        env: Some("PUREPORT_TRANSPORT_READ_TIMEOUT"),
        transform: Transform::Float,
    },
    ConfigItem {
        name: "transport_connect_timeout",
        description: "HTTP connection timeout value",
        default: Some("3.0"),
        env: Some("PUREPORT_TRANSPORT_CONNECT_TIMEOUT"),
        transform: Transform::Float,
    },
    ConfigItem {
        name: "credentials_filepath",
        description: "Path that contains the credentials information",
        default: Some("~/.pureport"),
        env: Some("PUREPORT_CREDENTIALS_FILEPATH"),
        transform: Transform::Path,
    },
    ConfigItem {
        name: "credentials_filename",
        description: "Name of the file to use for looking up credentials",
        default: Some("credentials"),
        env: None,
        transform: Transform::Str,
    },
    ConfigItem {
        name: "generic_transport_error_message",
        description: "Generic error message string for the transport",
        default: Some(
            "unknown transport error occurred, please review the caught exception for details",
        ),
        env: None,
        transform: Transform::Str,
    },
    ConfigItem {
        name: "api_base_url",
        description: "Base url to use for the Pureport API",
        default: Some("https://api.pureport.com"),
        env: Some("PUREPORT_API_BASE_URL"),
        transform: Transform::Str,
    },
    ConfigItem {
        name: "api_key",
        description: "Default Pureport API key",
        default: None,
        env: Some("PUREPORT_API_KEY"),
        transform: Transform::Str,
    },
    ConfigItem {
        name: "api_secret",
        description: "Default Pureport API secret",
        default: None,
        env: Some("PUREPORT_API_SECRET"),
        transform: Transform::Str,
    },
    ConfigItem {
        name: "account_id",
        description: "Default Pureport account ID",
        default: None,
        env: Some("PUREPORT_ACCOUNT_ID"),
        transform: Transform::Str,
    },
    ConfigItem {
        name: "cache_api_spec",
        description: "Enable or disable caching the OpenAPI spec",
        default: Some("false"),
        env: Some("PUREPORT_CACHE_API_SPEC"),
        transform: Transform::Bool,
    },
    ConfigItem {
        name: "working_dir",
        description: "Local Pureport working directory",
        default: Some("~/.pureport"),
        env: None,
        transform: Transform::Path,
    },
    ConfigItem {
        name: "openapi_file",
        description: "Default path to the OpenAPI definition",
        default: Some("~/.pureport/openapi.json"),
        env: Some("PUREPORT_OPENAPI_FILE"),
        transform: Transform::Path,
    },
    ConfigItem {
        name: "logging_level",
        description: "Set the logging level",
        default: Some("0"),
        env: Some("PUREPORT_LOGGING_LEVEL"),
        transform: Transform::Int,
    },
    ConfigItem {
        name: "automake_bindings",
        description: "Automatically generate API bindings when the client is created",
        default: Some("true"),
        env: Some("PUREPORT_AUTOMAKE_BINDINGS"),
        transform: Transform::Bool,
    },
];

/// Look up a config item definition by its setting name.
pub fn config_item(name: &str) -> Option<&'static ConfigItem> {
    CONFIG_ITEMS.iter().find(|item| item.name == name)
}

impl ConfigItem {
    /// Resolve this item against `lookup` (an environment-like source).
    ///
    /// An unset or empty override falls back to the default; items with no
    /// default resolve to `None`.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Option<ConfigValue>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = self
            .env
            .and_then(|var| lookup(var))
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.default.map(str::to_string));
        raw.map(|value| self.transform.apply(self.name, &value))
            .transpose()
    }

    /// Resolve this item against the process environment.
    pub fn resolve(&self) -> Result<Option<ConfigValue>> {
        self.resolve_with(|var| env::var(var).ok())
    }
}

impl Transform {
    pub fn apply(self, name: &str, raw: &str) -> Result<ConfigValue> {
        let trimmed = raw.trim();
        match self {
            Transform::Str => Ok(ConfigValue::Str(raw.to_string())),
            Transform::Bool => parse_bool(trimmed)
                .map(ConfigValue::Bool)
                .ok_or_else(|| Error::config(name, format!("'{raw}' is not a boolean"))),
            Transform::Int => trimmed
                .parse::<i64>()
                .map(ConfigValue::Int)
                .map_err(|err| Error::config(name, format!("'{raw}' is not an integer: {err}"))),
            Transform::Float => {
                let value = trimmed
                    .parse::<f64>()
                    .map_err(|err| Error::config(name, format!("'{raw}' is not a number: {err}")))?;
                if !value.is_finite() {
                    return Err(Error::config(name, format!("'{raw}' is not a finite number")));
                }
                Ok(ConfigValue::Float(value))
            }
            Transform::Path => Ok(ConfigValue::Path(expand_home(trimmed))),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "y" | "t" => Some(true),
        "false" | "no" | "off" | "0" | "n" | "f" => Some(false),
        _ => None,
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Resolved configuration for one client instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub transport_read_timeout: f64,
    pub transport_connect_timeout: f64,
    pub credentials_filepath: PathBuf,
    pub credentials_filename: String,
    pub generic_transport_error_message: String,
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub account_id: Option<String>,
    pub cache_api_spec: bool,
    pub working_dir: PathBuf,
    pub openapi_file: PathBuf,
    pub logging_level: i64,
    pub automake_bindings: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::resolve_with(|var| env::var(var).ok())
    }

    /// Resolve every item in [`CONFIG_ITEMS`] through `lookup`.
    pub fn resolve_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values: BTreeMap<&'static str, ConfigValue> = BTreeMap::new();
        for item in CONFIG_ITEMS {
            if let Some(value) = item.resolve_with(&lookup)? {
                values.insert(item.name, value);
            }
        }
        let mut resolved = Resolved(values);

        Ok(Settings {
            transport_read_timeout: resolved.timeout("transport_read_timeout")?,
            transport_connect_timeout: resolved.timeout("transport_connect_timeout")?,
            credentials_filepath: resolved.path("credentials_filepath")?,
            credentials_filename: resolved.string("credentials_filename")?,
            generic_transport_error_message: resolved.string("generic_transport_error_message")?,
            api_base_url: resolved.string("api_base_url")?,
            api_key: resolved.optional_string("api_key"),
            api_secret: resolved.optional_string("api_secret"),
            account_id: resolved.optional_string("account_id"),
            cache_api_spec: resolved.boolean("cache_api_spec")?,
            working_dir: resolved.path("working_dir")?,
            openapi_file: resolved.path("openapi_file")?,
            logging_level: resolved.int("logging_level")?,
            automake_bindings: resolved.boolean("automake_bindings")?,
        })
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.credentials_filepath.join(&self.credentials_filename)
    }

    pub fn connect_timeout(&self) -> Duration {
        timeout_duration(self.transport_connect_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        timeout_duration(self.transport_read_timeout)
    }
}

/// Upper bound for transport timeouts, in seconds.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;
const MIN_TIMEOUT_SECS: f64 = 0.001;

// Fields are public, so clamp here as well as at resolution time.
fn timeout_duration(secs: f64) -> Duration {
    let secs = if secs.is_nan() {
        MAX_TIMEOUT_SECS
    } else {
        secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
    };
    Duration::from_secs_f64(secs)
}

struct Resolved(BTreeMap<&'static str, ConfigValue>);

impl Resolved {
    fn take(&mut self, name: &str) -> Result<ConfigValue> {
        self.0
            .remove(name)
            .ok_or_else(|| Error::config(name, "no value and no default"))
    }

    fn mismatch(name: &str, value: &ConfigValue) -> Error {
        Error::config(name, format!("unexpected resolved value {value:?}"))
    }

    fn string(&mut self, name: &str) -> Result<String> {
        match self.take(name)? {
            ConfigValue::Str(value) => Ok(value),
            other => Err(Self::mismatch(name, &other)),
        }
    }

    fn optional_string(&mut self, name: &str) -> Option<String> {
        match self.0.remove(name) {
            Some(ConfigValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    fn path(&mut self, name: &str) -> Result<PathBuf> {
        match self.take(name)? {
            ConfigValue::Path(value) => Ok(value),
            other => Err(Self::mismatch(name, &other)),
        }
    }

    fn boolean(&mut self, name: &str) -> Result<bool> {
        match self.take(name)? {
            ConfigValue::Bool(value) => Ok(value),
            other => Err(Self::mismatch(name, &other)),
        }
    }

    fn int(&mut self, name: &str) -> Result<i64> {
        match self.take(name)? {
            ConfigValue::Int(value) => Ok(value),
            other => Err(Self::mismatch(name, &other)),
        }
    }

    fn float(&mut self, name: &str) -> Result<f64> {
        match self.take(name)? {
            ConfigValue::Float(value) => Ok(value),
            other => Err(Self::mismatch(name, &other)),
        }
    }

    fn timeout(&mut self, name: &str) -> Result<f64> {
        let secs = self.float(name)?;
        if secs <= 0.0 || secs > MAX_TIMEOUT_SECS {
            return Err(Error::config(
                name,
                format!("{secs} is outside (0, {MAX_TIMEOUT_SECS}] seconds"),
            ));
        }
        Ok(secs)
    }
}
