//! Declarative model descriptions derived from the document's schemas.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Semantic type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Nested object validated against the named model.
    Object(String),
    /// Free-form object (`additionalProperties` maps, untyped objects).
    Map,
    List(Box<TypeSpec>),
    Any,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Number => f.write_str("number"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Object(name) => write!(f, "{name} object"),
            FieldType::Map => f.write_str("object"),
            FieldType::List(item) => write!(f, "list of {}", item.kind),
            FieldType::Any => f.write_str("any"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeSpec {
    pub kind: FieldType,
    /// Permitted values (`enum`); `None` means unrestricted.
    pub allowed: Option<Vec<Value>>,
}

impl TypeSpec {
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            allowed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeSpec,
    pub required: bool,
}

/// Variant selection for a polymorphic model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Discriminator {
    pub property: String,
    /// Discriminator value to model name.
    pub variants: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub discriminator: Option<Discriminator>,
}

impl ModelSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}
