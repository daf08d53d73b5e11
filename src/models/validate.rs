//! Payload validation against [`ModelSpec`]s.
//!
//! Absent, `null` and empty-string values all count as missing for required
//! fields. Fields the model does not declare pass through untouched. On
//! success the input is returned as-is, so a validated value can be handed
//! straight to an operation as its body.

use crate::error::{Error, Result, ValidationError};
use crate::models::registry::ModelRegistry;
use crate::models::spec::{FieldType, ModelSpec, TypeSpec};
use serde_json::{Map, Value};

impl ModelRegistry {
    /// Validate `data` as `model`, optionally pinned to a discriminator `variant`.
    pub fn validate(&self, model: &str, variant: Option<&str>, data: &Value) -> Result<Value> {
        let spec = self.select(model, variant, data)?;
        let object = data.as_object().ok_or_else(|| invalid(model, "$", describe(data, "object")))?;
        let ctx = Context {
            registry: self,
            model,
        };
        let pinned = spec_discriminator_property(self, model, variant);
        ctx.check_object(spec, object, "", pinned)?;
        Ok(data.clone())
    }

    fn select(&self, model: &str, variant: Option<&str>, data: &Value) -> Result<&ModelSpec> {
        let unknown = || Error::UnknownModel {
            model: model.to_string(),
            variant: variant.map(str::to_string),
        };
        let base = self.get(model).ok_or_else(unknown)?;

        let Some(disc) = &base.discriminator else {
            return match variant {
                Some(v) if v != model => Err(unknown()),
                _ => Ok(base),
            };
        };

        let in_data = discriminator_value(model, &disc.property, data)?;
        let chosen = match (variant, in_data) {
            (Some(pinned), Some(found)) if pinned != found => {
                return Err(invalid(
                    model,
                    &disc.property,
                    format!("'{found}' does not match requested variant '{pinned}'"),
                ));
            }
            (Some(pinned), _) => pinned,
            (None, Some(found)) => found,
            (None, None) => {
                return Err(ValidationError::Missing {
                    model: model.to_string(),
                    field: disc.property.clone(),
                }
                .into());
            }
        };

        let target = disc.variants.get(chosen).ok_or_else(|| Error::UnknownModel {
            model: model.to_string(),
            variant: Some(chosen.to_string()),
        })?;
        self.get(target).ok_or_else(|| Error::UnknownModel {
            model: target.clone(),
            variant: Some(chosen.to_string()),
        })
    }
}

/// Read the discriminator property: absent, `null` and `""` are `None`; any
/// other non-string is an invalid value.
fn discriminator_value<'d>(
    model: &str,
    property: &str,
    data: &'d Value,
) -> Result<Option<&'d str>> {
    match data.get(property) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(invalid(model, property, describe(other, "string"))),
    }
}

// With an explicit variant the discriminator property itself may be omitted.
fn spec_discriminator_property<'a>(
    registry: &'a ModelRegistry,
    model: &str,
    variant: Option<&str>,
) -> Option<&'a str> {
    variant?;
    registry
        .get(model)?
        .discriminator
        .as_ref()
        .map(|d| d.property.as_str())
}

struct Context<'a> {
    registry: &'a ModelRegistry,
    model: &'a str,
}

impl<'a> Context<'a> {
    fn check_object(
        &self,
        spec: &ModelSpec,
        object: &Map<String, Value>,
        prefix: &str,
        pinned_property: Option<&str>,
    ) -> Result<()> {
        for field in &spec.fields {
            let path = join(prefix, &field.name);
            // Empty strings count as absent only for required fields.
            let present = match object.get(&field.name) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.is_empty() && field.required => None,
                Some(value) => Some(value),
            };
            match present {
                None => {
                    if field.required && pinned_property != Some(field.name.as_str()) {
                        return Err(self.missing(&path));
                    }
                }
                Some(value) => self.check_value(&field.ty, value, &path)?,
            }
        }
        Ok(())
    }

    fn check_value(&self, ty: &TypeSpec, value: &Value, path: &str) -> Result<()> {
        let type_ok = match &ty.kind {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Map => value.is_object(),
            FieldType::Any => true,
            FieldType::Object(name) => {
                let Some(object) = value.as_object() else {
                    return Err(invalid(self.model, path, describe(value, "object")));
                };
                let nested = self.nested_spec(name, value, path)?;
                self.check_object(nested, object, path, None)?;
                true
            }
            FieldType::List(item) => {
                let Some(items) = value.as_array() else {
                    return Err(invalid(self.model, path, describe(value, "list")));
                };
                for (idx, element) in items.iter().enumerate() {
                    self.check_value(item, element, &format!("{path}[{idx}]"))?;
                }
                true
            }
        };
        if !type_ok {
            return Err(invalid(
                self.model,
                path,
                describe(value, &ty.kind.to_string()),
            ));
        }

        if let Some(allowed) = &ty.allowed {
            if !allowed.contains(value) {
                let choices = allowed
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(invalid(
                    self.model,
                    path,
                    format!("{value} is not one of [{choices}]"),
                ));
            }
        }
        Ok(())
    }

    fn nested_spec(&self, name: &str, value: &Value, path: &str) -> Result<&'a ModelSpec> {
        let registry = self.registry;
        let spec = registry.get(name).ok_or_else(|| Error::UnknownModel {
            model: name.to_string(),
            variant: None,
        })?;
        let Some(disc) = &spec.discriminator else {
            return Ok(spec);
        };
        let property_path = join(path, &disc.property);
        let found = match value.get(&disc.property) {
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(self.missing(&property_path));
            }
            Some(other) => {
                return Err(invalid(self.model, &property_path, describe(other, "string")));
            }
        };
        disc.variants
            .get(found)
            .and_then(|target| registry.get(target))
            .ok_or_else(|| {
                invalid(
                    self.model,
                    &property_path,
                    format!("unknown {name} variant '{found}'"),
                )
            })
    }

    fn missing(&self, path: &str) -> Error {
        ValidationError::Missing {
            model: self.model.to_string(),
            field: path.to_string(),
        }
        .into()
    }
}

fn invalid(model: &str, field: &str, reason: impl Into<String>) -> Error {
    ValidationError::Invalid {
        model: model.to_string(),
        field: field.to_string(),
        reason: reason.into(),
    }
    .into()
}

fn describe(value: &Value, expected: &str) -> String {
    let actual = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    };
    format!("expected {expected}, got {actual} {value}")
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}
