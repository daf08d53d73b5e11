//! Operation definitions extracted from an OpenAPI document.
//!
//! Parsing is strict: an operation without an `operationId`, a path that is
//! not a well-formed template, or an unknown key under a path item means the
//! document is from an incompatible API version, so it fails the whole
//! generation with `SpecParse`.

use crate::error::{Error, Result};
use crate::transport::Method;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

// Path item keys that are not HTTP methods.
const PATH_ITEM_KEYS: &[&str] = &["parameters", "summary", "description", "servers", "$ref"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
}

impl ParameterLocation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodySpec {
    pub required: bool,
    /// Component schema name when the body is a `$ref`.
    pub model: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseSpec {
    pub model: Option<String>,
    pub is_list: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// URL path with `{name}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        if !raw.starts_with('/') {
            return Err(format!("path '{raw}' must start with '/'"));
        }
        let mut segments = Vec::new();
        let mut rest = raw;
        while let Some(open) = rest.find(['{', '}']) {
            if rest.as_bytes()[open] == b'}' {
                return Err(format!("unbalanced '}}' in path '{raw}'"));
            }
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| format!("unterminated placeholder in path '{raw}'"))?;
            let name = &after[..close];
            if name.is_empty() || name.contains('{') {
                return Err(format!("malformed placeholder in path '{raw}'"));
            }
            segments.push(Segment::Param(name.to_string()));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute placeholders; returns the first unresolved name on failure.
    pub fn render<F>(&self, mut lookup: F) -> std::result::Result<String, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.raw.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param(name) => {
                    let value = lookup(name).ok_or_else(|| name.clone())?;
                    out.push_str(&encode_path_segment(&value));
                }
            }
        }
        Ok(out)
    }
}

fn encode_path_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// One REST operation from the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationSpec {
    pub operation_id: String,
    pub method: Method,
    pub path: PathTemplate,
    pub parameters: Vec<ParameterSpec>,
    pub body: Option<BodySpec>,
    pub response: Option<ResponseSpec>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
}

impl OperationSpec {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Parse every operation under `paths`, in document order.
pub(crate) fn parse_operations(doc: &Value) -> Result<Vec<OperationSpec>> {
    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::SpecParse("document has no 'paths' object".into()))?;

    let mut operations = Vec::new();
    for (raw_path, item) in paths {
        let item = item
            .as_object()
            .ok_or_else(|| Error::SpecParse(format!("path item {raw_path} is not an object")))?;
        let template = PathTemplate::parse(raw_path).map_err(Error::SpecParse)?;
        let shared = parse_parameters(doc, item.get("parameters"), raw_path)?;

        for (key, op) in item {
            if PATH_ITEM_KEYS.contains(&key.as_str()) || key.starts_with("x-") {
                continue;
            }
            let method = Method::from_openapi_key(key).ok_or_else(|| {
                Error::SpecParse(format!("unsupported key '{key}' under path {raw_path}"))
            })?;
            let op = op.as_object().ok_or_else(|| {
                Error::SpecParse(format!("{key} {raw_path} is not an object"))
            })?;
            operations.push(parse_operation(doc, method, &template, &shared, op)?);
        }
    }
    Ok(operations)
}

fn parse_operation(
    doc: &Value,
    method: Method,
    template: &PathTemplate,
    shared: &[RawParameter],
    op: &Map<String, Value>,
) -> Result<OperationSpec> {
    let where_ = format!("{} {}", method, template.as_str());
    let operation_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::SpecParse(format!("{where_} has no operationId")))?
        .to_string();

    let own = parse_parameters(doc, op.get("parameters"), &where_)?;
    let mut body = None;
    let mut parameters: Vec<ParameterSpec> = Vec::new();
    for raw in shared.iter().chain(own.iter()) {
        match raw {
            RawParameter::Param(param) => {
                // Operation-level parameters override path-level ones.
                parameters.retain(|p| !(p.name == param.name && p.location == param.location));
                parameters.push(param.clone());
            }
            RawParameter::Body(spec) => body = Some(spec.clone()),
        }
    }

    let placeholders: BTreeSet<&str> = template.placeholders().collect();
    for param in parameters.iter().filter(|p| p.location == ParameterLocation::Path) {
        if !placeholders.contains(param.name.as_str()) {
            return Err(Error::SpecParse(format!(
                "{operation_id}: path parameter '{}' not present in {}",
                param.name,
                template.as_str()
            )));
        }
    }
    for name in placeholders {
        match parameters
            .iter_mut()
            .find(|p| p.name == name && p.location == ParameterLocation::Path)
        {
            Some(param) => param.required = true,
            None => parameters.push(ParameterSpec {
                name: name.to_string(),
                location: ParameterLocation::Path,
                required: true,
            }),
        }
    }

    if let Some(request_body) = op.get("requestBody") {
        let request_body = resolve_ref(doc, request_body, "requestBodies")?;
        body = Some(BodySpec {
            required: request_body
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            model: request_body
                .pointer("/content/application~1json/schema")
                .and_then(schema_ref_name),
        });
    }

    Ok(OperationSpec {
        operation_id,
        method,
        path: template.clone(),
        parameters,
        body,
        response: parse_response(op),
        summary: op.get("summary").and_then(Value::as_str).map(str::to_string),
        tags: op
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

enum RawParameter {
    Param(ParameterSpec),
    Body(BodySpec),
}

fn parse_parameters(doc: &Value, list: Option<&Value>, where_: &str) -> Result<Vec<RawParameter>> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    let list = list
        .as_array()
        .ok_or_else(|| Error::SpecParse(format!("{where_}: 'parameters' is not an array")))?;

    let mut out = Vec::with_capacity(list.len());
    for entry in list {
        let param = resolve_ref(doc, entry, "parameters")?;
        let name = param
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SpecParse(format!("{where_}: parameter without a name")))?;
        let location = param
            .get("in")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SpecParse(format!("{where_}: parameter '{name}' has no 'in'")))?;
        let required = param.get("required").and_then(Value::as_bool).unwrap_or(false);

        // Swagger 2 documents carry the body as a parameter.
        if location == "body" {
            out.push(RawParameter::Body(BodySpec {
                required,
                model: param.get("schema").and_then(schema_ref_name),
            }));
            continue;
        }
        let location = ParameterLocation::parse(location).ok_or_else(|| {
            Error::SpecParse(format!(
                "{where_}: parameter '{name}' has unsupported location '{location}'"
            ))
        })?;
        out.push(RawParameter::Param(ParameterSpec {
            name: name.to_string(),
            location,
            required,
        }));
    }
    Ok(out)
}

/// Follow a local `#/components/<section>/<name>` reference, if any.
fn resolve_ref<'a>(doc: &'a Value, value: &'a Value, section: &str) -> Result<&'a Value> {
    let Some(reference) = value.get("$ref").and_then(Value::as_str) else {
        return Ok(value);
    };
    let prefix = format!("#/components/{section}/");
    let name = reference.strip_prefix(&prefix).ok_or_else(|| {
        Error::SpecParse(format!("unsupported reference '{reference}' (expected {prefix}...)"))
    })?;
    doc.get("components")
        .and_then(|c| c.get(section))
        .and_then(|s| s.get(name))
        .ok_or_else(|| Error::SpecParse(format!("dangling reference '{reference}'")))
}

/// Schema name from `{"$ref": "#/components/schemas/Name"}` or `#/definitions/Name`.
pub(crate) fn schema_ref_name(schema: &Value) -> Option<String> {
    let reference = schema.get("$ref").and_then(Value::as_str)?;
    reference
        .strip_prefix("#/components/schemas/")
        .or_else(|| reference.strip_prefix("#/definitions/"))
        .map(str::to_string)
}

fn parse_response(op: &Map<String, Value>) -> Option<ResponseSpec> {
    let responses = op.get("responses")?.as_object()?;
    let (_, success) = responses
        .iter()
        .find(|(code, _)| code.starts_with('2'))?;
    let schema = success
        .pointer("/content/application~1json/schema")
        .or_else(|| success.get("schema"))?;
    if schema.get("type").and_then(Value::as_str) == Some("array") {
        return Some(ResponseSpec {
            model: schema.get("items").and_then(schema_ref_name),
            is_list: true,
        });
    }
    Some(ResponseSpec {
        model: schema_ref_name(schema),
        is_list: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn template_parses_placeholders() {
        let template = PathTemplate::parse("/accounts/{accountId}/apikeys/{key}").unwrap();
        assert_eq!(
            template.placeholders().collect::<Vec<_>>(),
            vec!["accountId", "key"]
        );
        let rendered = template
            .render(|name| Some(format!("{name} 1")))
            .unwrap();
        assert_eq!(rendered, "/accounts/accountId%201/apikeys/key%201");
    }

    #[test]
    fn template_rejects_malformed_paths() {
        assert!(PathTemplate::parse("accounts").is_err());
        assert!(PathTemplate::parse("/accounts/{accountId").is_err());
        assert!(PathTemplate::parse("/accounts/{}").is_err());
        assert!(PathTemplate::parse("/accounts/id}").is_err());
    }

    #[test]
    fn render_reports_missing_placeholder() {
        let template = PathTemplate::parse("/networks/{networkId}").unwrap();
        assert_eq!(template.render(|_| None), Err("networkId".to_string()));
    }

    #[test]
    fn path_level_parameters_merge_and_placeholders_are_required() {
        let doc = json!({
            "openapi": "3.0.1",
            "paths": {
                "/networks/{networkId}/connections": {
                    "parameters": [{"name": "networkId", "in": "path", "required": false}],
                    "get": {
                        "operationId": "getConnections",
                        "parameters": [{"name": "state", "in": "query"}],
                        "responses": {"200": {"content": {"application/json": {"schema": {
                            "type": "array", "items": {"$ref": "#/components/schemas/Connection"}
                        }}}}}
                    }
                }
            }
        });
        let ops = parse_operations(&doc).unwrap();
        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.method, Method::Get);
        assert!(op.parameter("networkId").unwrap().required);
        assert!(!op.parameter("state").unwrap().required);
        assert_eq!(
            op.response,
            Some(ResponseSpec {
                model: Some("Connection".into()),
                is_list: true
            })
        );
    }

    #[test]
    fn missing_operation_id_is_fatal() {
        let doc = json!({"openapi": "3.0.1", "paths": {"/a": {"get": {"responses": {}}}}});
        let err = parse_operations(&doc).expect_err("missing operationId");
        assert!(matches!(err, Error::SpecParse(ref msg) if msg.contains("GET /a")));
    }

    #[test]
    fn unknown_path_item_key_is_fatal() {
        let doc = json!({"openapi": "3.0.1", "paths": {"/a": {"fetch": {"operationId": "x"}}}});
        assert!(matches!(parse_operations(&doc), Err(Error::SpecParse(_))));

        let doc = json!({"openapi": "3.0.1", "paths": {"/a": {
            "x-internal": true,
            "summary": "ok",
            "get": {"operationId": "x"}
        }}});
        assert_eq!(parse_operations(&doc).unwrap().len(), 1);
    }

    #[test]
    fn swagger_body_parameter_becomes_body() {
        let doc = json!({"swagger": "2.0", "paths": {"/networks": {"post": {
            "operationId": "addNetwork",
            "parameters": [{"name": "network", "in": "body", "required": true,
                            "schema": {"$ref": "#/definitions/Network"}}]
        }}}});
        let ops = parse_operations(&doc).unwrap();
        assert_eq!(
            ops[0].body,
            Some(BodySpec {
                required: true,
                model: Some("Network".into())
            })
        );
        assert!(ops[0].parameters.is_empty());
    }

    #[test]
    fn dangling_parameter_ref_is_fatal() {
        let doc = json!({"openapi": "3.0.1", "paths": {"/a/{id}": {"get": {
            "operationId": "getA",
            "parameters": [{"$ref": "#/components/parameters/missing"}]
        }}}});
        assert!(matches!(parse_operations(&doc), Err(Error::SpecParse(_))));
    }

    #[test]
    fn operations_follow_document_order() {
        let doc = json!({"openapi": "3.0.1", "paths": {
            "/zones": {"post": {"operationId": "addZone"}, "get": {"operationId": "getZones"}},
            "/accounts": {"get": {"operationId": "getAccounts",
                "parameters": [{"name": "zeta", "in": "query"}, {"name": "alpha", "in": "query"}]}}
        }});
        let ops = parse_operations(&doc).unwrap();
        let ids: Vec<&str> = ops.iter().map(|op| op.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["addZone", "getZones", "getAccounts"]);
        let params: Vec<&str> = ops[2].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["zeta", "alpha"]);
    }
}
