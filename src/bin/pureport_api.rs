//! Command-line front end for the Pureport API client.
//!
//! Lists the operations exposed by the OpenAPI document, invokes one of them,
//! or validates a JSON payload against a request model. Configuration and
//! credentials come from the usual `PUREPORT_*` variables and credentials file;
//! `--spec` points at a local document instead of the cache/bundled/remote
//! resolution chain, which lets `--list` and `--validate` run offline.

use anyhow::{Context, Result, bail};
use pureport::{
    CallArgs, Client, Credentials, HttpSession, ModelRegistry, OperationRegistry, Settings,
    SpecDocument, Transport, helpers, logging,
};
use serde_json::Value;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse()?;
    let settings = Settings::from_env().context("resolving configuration")?;
    logging::init(settings.logging_level);

    match args.mode {
        Mode::List => {
            let operations = match &args.spec {
                Some(path) => OperationRegistry::from_document(&load_local(path)?)?
                    .operation_ids()
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
                None => Client::new(settings)?
                    .api()?
                    .operation_ids()
                    .map(str::to_string)
                    .collect(),
            };
            for id in operations {
                println!("{id}");
            }
        }
        Mode::Call { operation, call } => {
            let result = match &args.spec {
                Some(path) => {
                    let doc = load_local(path)?;
                    let credentials = Credentials::resolve(&settings)?;
                    let session: Arc<dyn Transport> =
                        Arc::new(HttpSession::new(&settings, credentials));
                    OperationRegistry::from_document(&doc)?
                        .bind(session)
                        .call(&operation, call)?
                }
                None => Client::new(settings)?.call(&operation, call)?,
            };
            helpers::print_json(&result)?;
        }
        Mode::Validate {
            model,
            variant,
            data,
        } => {
            let models = match &args.spec {
                Some(path) => Arc::new(ModelRegistry::from_document(&load_local(path)?)?),
                None => Client::new(settings)?.models()?,
            };
            let checked = models
                .validate(&model, variant.as_deref(), &data)
                .with_context(|| format!("validating payload against {model}"))?;
            helpers::print_json(&checked)?;
        }
    }
    Ok(())
}

fn load_local(path: &Path) -> Result<SpecDocument> {
    SpecDocument::from_path(path).with_context(|| format!("loading {}", path.display()))
}

enum Mode {
    List,
    Call {
        operation: String,
        call: CallArgs,
    },
    Validate {
        model: String,
        variant: Option<String>,
        data: Value,
    },
}

struct CliArgs {
    mode: Mode,
    spec: Option<PathBuf>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        Self::parse_from(env::args_os().skip(1))
    }

    fn parse_from(raw: impl IntoIterator<Item = OsString>) -> Result<Self> {
        let mut args = raw.into_iter();
        let mut list = false;
        let mut call: Option<String> = None;
        let mut validate: Option<String> = None;
        let mut params: Vec<(String, Value)> = Vec::new();
        let mut body: Option<Value> = None;
        let mut variant: Option<String> = None;
        let mut data: Option<Value> = None;
        let mut spec: Option<PathBuf> = None;

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--list" => list = true,
                "--call" => call = Some(next_value(&mut args, "--call")?),
                "--validate" => validate = Some(next_value(&mut args, "--validate")?),
                "--param" => {
                    let raw = next_value(&mut args, "--param")?;
                    params.push(parse_param(&raw)?);
                }
                "--body" => {
                    let raw = next_value(&mut args, "--body")?;
                    body = Some(
                        serde_json::from_str(&raw)
                            .with_context(|| format!("invalid JSON for --body: {raw}"))?,
                    );
                }
                "--variant" => variant = Some(next_value(&mut args, "--variant")?),
                "--data" => {
                    let raw = next_value(&mut args, "--data")?;
                    data = Some(
                        serde_json::from_str(&raw)
                            .with_context(|| format!("invalid JSON for --data: {raw}"))?,
                    );
                }
                "--spec" => spec = Some(PathBuf::from(next_value(&mut args, "--spec")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}\n{}", usage()),
            }
        }

        let selected = [list, call.is_some(), validate.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if selected != 1 {
            bail!("exactly one of --list, --call or --validate is required\n{}", usage());
        }

        let mode = if let Some(operation) = call {
            if variant.is_some() || data.is_some() {
                bail!("--variant/--data only apply to --validate");
            }
            let mut args = CallArgs::new();
            for (name, value) in params {
                args = args.param(name, value);
            }
            if let Some(body) = body {
                args = args.body(body);
            }
            Mode::Call {
                operation,
                call: args,
            }
        } else if let Some(model) = validate {
            if !params.is_empty() || body.is_some() {
                bail!("--param/--body only apply to --call");
            }
            let data = data.ok_or_else(|| anyhow::anyhow!("--validate requires --data"))?;
            Mode::Validate {
                model,
                variant,
                data,
            }
        } else {
            Mode::List
        };

        Ok(CliArgs { mode, spec })
    }
}

/// `name=value`; the value is read as JSON when it parses, else as a string.
fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("--param expects name=value, got '{raw}'"))?;
    if name.is_empty() {
        bail!("--param name must not be empty");
    }
    let value = serde_json::from_str::<Value>(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn next_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String> {
    args.next()
        .map(|os| {
            os.into_string()
                .map_err(|_| anyhow::anyhow!("value for {flag} is not valid UTF-8"))
        })
        .transpose()?
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn usage() -> &'static str {
    "Usage: pureport-api [--spec PATH] (--list | --call ID [--param name=value]... [--body JSON] | --validate MODEL [--variant V] --data JSON)\n\
Lists API operations, invokes one by operationId, or validates a payload against a request model.\n"
}

fn print_usage() {
    print!("{}", usage());
}
