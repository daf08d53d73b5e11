//! Builds [`ModelSpec`]s from `components.schemas`.
//!
//! `allOf` parts are flattened into one field list (later parts override
//! earlier ones, `required` sets are unioned). A `discriminator` records its
//! variants from the explicit mapping plus every schema that extends the base
//! through `allOf`. Inline object properties become synthetic models named
//! `Parent.property`.

use crate::bindings::operation::schema_ref_name;
use crate::error::{Error, Result};
use crate::models::spec::{Discriminator, FieldSpec, FieldType, ModelSpec, TypeSpec};
use crate::spec_loader::SpecDocument;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// Guard against reference cycles through allOf and primitive refs.
const MAX_ALLOF_DEPTH: usize = 16;
const MAX_REF_DEPTH: usize = 16;

#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn from_document(doc: &SpecDocument) -> Result<Self> {
        Self::from_value(doc.raw())
    }

    pub fn from_value(raw: &Value) -> Result<Self> {
        let schemas = raw
            .pointer("/components/schemas")
            .or_else(|| raw.get("definitions"))
            .and_then(Value::as_object);
        let Some(schemas) = schemas else {
            return Ok(Self::default());
        };

        let mut builder = Builder {
            schemas,
            models: BTreeMap::new(),
        };
        for (name, schema) in schemas {
            let model = builder.build_model(name, schema)?;
            builder.models.insert(name.clone(), model);
        }
        builder.link_implicit_variants();
        tracing::debug!(count = builder.models.len(), "parsed api models");
        Ok(Self {
            models: builder.models,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Discriminator values accepted by `model`, if it is polymorphic.
    pub fn variants(&self, model: &str) -> Vec<&str> {
        self.get(model)
            .and_then(|m| m.discriminator.as_ref())
            .map(|d| d.variants.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, model: ModelSpec) {
        self.models.insert(model.name.clone(), model);
    }
}

struct Builder<'a> {
    schemas: &'a Map<String, Value>,
    models: BTreeMap<String, ModelSpec>,
}

#[derive(Default)]
struct Flattened {
    properties: Vec<(String, Value)>,
    required: BTreeSet<String>,
    parents: Vec<String>,
}

impl<'a> Builder<'a> {
    fn build_model(&mut self, name: &str, schema: &Value) -> Result<ModelSpec> {
        let mut flat = Flattened::default();
        self.flatten(name, schema, &mut flat, 0)?;

        let mut fields = Vec::with_capacity(flat.properties.len());
        for (prop, prop_schema) in &flat.properties {
            let ty = self.type_spec(name, prop, prop_schema, 0)?;
            fields.push(FieldSpec {
                name: prop.clone(),
                ty,
                required: flat.required.contains(prop),
            });
        }

        let discriminator = match schema.get("discriminator") {
            Some(disc) => Some(parse_discriminator(name, disc)?),
            None => None,
        };

        Ok(ModelSpec {
            name: name.to_string(),
            fields,
            discriminator,
        })
    }

    fn flatten(&self, name: &str, schema: &Value, flat: &mut Flattened, depth: usize) -> Result<()> {
        if depth > MAX_ALLOF_DEPTH {
            return Err(Error::SpecParse(format!("schema {name}: allOf nesting too deep")));
        }
        if let Some(target) = schema_ref_name(schema) {
            let resolved = self.schema(&target)?;
            flat.parents.push(target.clone());
            return self.flatten(&target, resolved, flat, depth + 1);
        }
        if let Some(parts) = schema.get("allOf") {
            let parts = parts
                .as_array()
                .ok_or_else(|| Error::SpecParse(format!("schema {name}: allOf is not an array")))?;
            for part in parts {
                self.flatten(name, part, flat, depth + 1)?;
            }
        }
        if let Some(props) = schema.get("properties") {
            let props = props.as_object().ok_or_else(|| {
                Error::SpecParse(format!("schema {name}: properties is not an object"))
            })?;
            for (prop, prop_schema) in props {
                flat.properties.retain(|(existing, _)| existing != prop);
                flat.properties.push((prop.clone(), prop_schema.clone()));
            }
        }
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            flat.required
                .extend(required.iter().filter_map(Value::as_str).map(str::to_string));
        }
        Ok(())
    }

    fn schema(&self, name: &str) -> Result<&'a Value> {
        self.schemas
            .get(name)
            .ok_or_else(|| Error::SpecParse(format!("dangling schema reference '{name}'")))
    }

    fn type_spec(
        &mut self,
        model: &str,
        prop: &str,
        schema: &Value,
        depth: usize,
    ) -> Result<TypeSpec> {
        if depth > MAX_REF_DEPTH {
            return Err(Error::SpecParse(format!(
                "schema {model}.{prop}: reference chain too deep"
            )));
        }
        if let Some(target) = schema_ref_name(schema) {
            let resolved = self.schema(&target)?;
            if is_object_schema(resolved) {
                return Ok(TypeSpec::new(FieldType::Object(target)));
            }
            // Refs to enums/primitives are inlined.
            return self.type_spec(model, prop, resolved, depth + 1);
        }
        if schema.get("allOf").is_some() {
            let synthetic = format!("{model}.{prop}");
            let spec = self.build_model(&synthetic, schema)?;
            self.models.insert(synthetic.clone(), spec);
            return Ok(TypeSpec::new(FieldType::Object(synthetic)));
        }

        let kind = match schema.get("type").and_then(Value::as_str) {
            Some("string") => FieldType::String,
            Some("integer") => FieldType::Integer,
            Some("number") => FieldType::Number,
            Some("boolean") => FieldType::Boolean,
            Some("array") => {
                let items = schema.get("items").unwrap_or(&Value::Null);
                let item = if items.is_null() {
                    TypeSpec::new(FieldType::Any)
                } else {
                    self.type_spec(model, &format!("{prop}[]"), items, depth + 1)?
                };
                FieldType::List(Box::new(item))
            }
            Some("object") | None if schema.get("properties").is_some() => {
                let synthetic = format!("{model}.{prop}");
                let spec = self.build_model(&synthetic, schema)?;
                self.models.insert(synthetic.clone(), spec);
                FieldType::Object(synthetic)
            }
            Some("object") => FieldType::Map,
            None => FieldType::Any,
            Some(other) => {
                return Err(Error::SpecParse(format!(
                    "schema {model}.{prop}: unsupported type '{other}'"
                )));
            }
        };
        let allowed = schema.get("enum").and_then(Value::as_array).cloned();
        Ok(TypeSpec { kind, allowed })
    }

    /// Add variants for schemas that extend a discriminated base without an
    /// explicit mapping entry; the schema name is the discriminator value.
    fn link_implicit_variants(&mut self) {
        let mut extensions: Vec<(String, String)> = Vec::new();
        for (name, schema) in self.schemas {
            let mut flat = Flattened::default();
            if self.flatten(name, schema, &mut flat, 0).is_err() {
                continue;
            }
            for parent in flat.parents {
                extensions.push((parent, name.clone()));
            }
        }
        for (parent, child) in extensions {
            let Some(disc) = self
                .models
                .get_mut(&parent)
                .and_then(|m| m.discriminator.as_mut())
            else {
                continue;
            };
            if !disc.variants.values().any(|v| v == &child) {
                disc.variants.insert(child.clone(), child);
            }
        }
    }
}

fn is_object_schema(schema: &Value) -> bool {
    schema.get("properties").is_some()
        || schema.get("allOf").is_some()
        || schema.get("discriminator").is_some()
        || (schema.get("type").and_then(Value::as_str) == Some("object")
            && schema.get("additionalProperties").is_none())
}

fn parse_discriminator(model: &str, disc: &Value) -> Result<Discriminator> {
    // Swagger 2 uses a bare property name.
    if let Some(property) = disc.as_str() {
        return Ok(Discriminator {
            property: property.to_string(),
            variants: BTreeMap::new(),
        });
    }
    let property = disc
        .get("propertyName")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::SpecParse(format!("schema {model}: discriminator without propertyName")))?;
    let mut variants = BTreeMap::new();
    if let Some(mapping) = disc.get("mapping").and_then(Value::as_object) {
        for (value, target) in mapping {
            let target = target.as_str().ok_or_else(|| {
                Error::SpecParse(format!("schema {model}: discriminator mapping for '{value}' is not a string"))
            })?;
            let name = target
                .strip_prefix("#/components/schemas/")
                .or_else(|| target.strip_prefix("#/definitions/"))
                .unwrap_or(target);
            variants.insert(value.clone(), name.to_string());
        }
    }
    Ok(Discriminator {
        property: property.to_string(),
        variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "openapi": "3.0.1",
            "paths": {},
            "components": {"schemas": {
                "Link": {"type": "object", "properties": {"id": {"type": "string"}}},
                "Speed": {"type": "integer", "enum": [50, 100]},
                "Pet": {
                    "type": "object",
                    "required": ["kind", "name"],
                    "discriminator": {"propertyName": "kind", "mapping": {"DOG": "#/components/schemas/Dog"}},
                    "properties": {
                        "kind": {"type": "string"},
                        "name": {"type": "string"},
                        "speed": {"$ref": "#/components/schemas/Speed"},
                        "owner": {"$ref": "#/components/schemas/Link"},
                        "geo": {"type": "object", "properties": {"lat": {"type": "number"}}}
                    }
                },
                "Dog": {"allOf": [{"$ref": "#/components/schemas/Pet"},
                                  {"required": ["bark"], "properties": {"bark": {"type": "boolean"}}}]},
                "Cat": {"allOf": [{"$ref": "#/components/schemas/Pet"},
                                  {"properties": {"lives": {"type": "integer"}}}]}
            }}
        })
    }

    #[test]
    fn all_of_flattens_parent_fields() {
        let registry = ModelRegistry::from_value(&doc()).unwrap();
        let dog = registry.get("Dog").unwrap();
        assert!(dog.field("name").unwrap().required);
        assert!(dog.field("bark").unwrap().required);
        assert_eq!(
            dog.field("owner").unwrap().ty.kind,
            FieldType::Object("Link".into())
        );
        assert!(dog.discriminator.is_none());
    }

    #[test]
    fn primitive_refs_are_inlined_with_enum() {
        let registry = ModelRegistry::from_value(&doc()).unwrap();
        let speed = &registry.get("Pet").unwrap().field("speed").unwrap().ty;
        assert_eq!(speed.kind, FieldType::Integer);
        assert_eq!(speed.allowed, Some(vec![json!(50), json!(100)]));
    }

    #[test]
    fn inline_objects_become_synthetic_models() {
        let registry = ModelRegistry::from_value(&doc()).unwrap();
        assert_eq!(
            registry.get("Pet").unwrap().field("geo").unwrap().ty.kind,
            FieldType::Object("Pet.geo".into())
        );
        assert!(registry.get("Pet.geo").unwrap().field("lat").is_some());
    }

    #[test]
    fn discriminator_collects_mapped_and_implicit_variants() {
        let registry = ModelRegistry::from_value(&doc()).unwrap();
        assert_eq!(registry.variants("Pet"), vec!["Cat", "DOG"]);
        assert!(registry.variants("Link").is_empty());
    }

    #[test]
    fn fields_keep_declaration_order() {
        let registry = ModelRegistry::from_value(&doc()).unwrap();
        let names: Vec<&str> = registry
            .get("Dog")
            .unwrap()
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["kind", "name", "speed", "owner", "geo", "bark"]);
    }

    #[test]
    fn primitive_ref_cycle_is_a_parse_error() {
        let raw = json!({"openapi": "3.0.1", "paths": {}, "components": {"schemas": {
            "Holder": {"properties": {"x": {"$ref": "#/components/schemas/A"}}},
            "A": {"$ref": "#/components/schemas/B"},
            "B": {"$ref": "#/components/schemas/A"}
        }}});
        match ModelRegistry::from_value(&raw) {
            Err(Error::SpecParse(msg)) => assert!(msg.contains("Holder.x"), "{msg}"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn dangling_schema_ref_is_a_parse_error() {
        let raw = json!({"openapi": "3.0.1", "paths": {}, "components": {"schemas": {
            "A": {"properties": {"b": {"$ref": "#/components/schemas/Missing"}}}
        }}});
        assert!(matches!(
            ModelRegistry::from_value(&raw),
            Err(Error::SpecParse(_))
        ));
    }
}
