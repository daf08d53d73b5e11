//! Operation registry and the session-bound API surface.
//!
//! [`OperationRegistry`] is the pure part: a map from `operationId` to
//! [`OperationSpec`], built once from a document and rejecting duplicate ids.
//! [`OperationRegistry::bind`] closes every operation over a shared transport
//! to produce the [`Api`] that callers dispatch through.

use crate::bindings::operation::{OperationSpec, ParameterLocation, parse_operations};
use crate::error::{Error, Result};
use crate::spec_loader::SpecDocument;
use crate::transport::{Request, Transport};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Arc<OperationSpec>>,
}

impl OperationRegistry {
    pub fn from_document(doc: &SpecDocument) -> Result<Self> {
        Self::from_value(doc.raw())
    }

    /// Build the registry from a raw OpenAPI value.
    ///
    /// Duplicate operation ids are a hard error; there is no first-wins rule.
    pub fn from_value(raw: &Value) -> Result<Self> {
        let mut operations: BTreeMap<String, Arc<OperationSpec>> = BTreeMap::new();
        for op in parse_operations(raw)? {
            if let Some(existing) = operations.get(&op.operation_id) {
                return Err(Error::SpecParse(format!(
                    "duplicate operationId '{}' ({} {} and {} {})",
                    op.operation_id,
                    existing.method,
                    existing.path.as_str(),
                    op.method,
                    op.path.as_str()
                )));
            }
            operations.insert(op.operation_id.clone(), Arc::new(op));
        }
        tracing::debug!(count = operations.len(), "parsed api operations");
        Ok(Self { operations })
    }

    pub fn get(&self, operation_id: &str) -> Option<&OperationSpec> {
        self.operations.get(operation_id).map(Arc::as_ref)
    }

    /// Iterates operation ids in stable order.
    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn bind(&self, session: Arc<dyn Transport>) -> Api {
        let operations = self
            .operations
            .iter()
            .map(|(id, spec)| {
                (
                    id.clone(),
                    BoundOperation {
                        spec: Arc::clone(spec),
                        session: Arc::clone(&session),
                    },
                )
            })
            .collect();
        Api { operations }
    }
}

/// Arguments for one operation call: named path/query/header values plus an
/// optional JSON body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallArgs {
    params: BTreeMap<String, Value>,
    body: Option<Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }
}

/// An operation closed over the session that will execute it.
#[derive(Clone)]
pub struct BoundOperation {
    spec: Arc<OperationSpec>,
    session: Arc<dyn Transport>,
}

impl BoundOperation {
    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    pub fn operation_id(&self) -> &str {
        &self.spec.operation_id
    }

    /// Validate `args` against the parameter schema and build the request.
    pub fn prepare(&self, args: &CallArgs) -> Result<Request> {
        let spec = &*self.spec;
        let op_id = spec.operation_id.as_str();

        for name in args.params.keys() {
            if spec.parameter(name).is_none() {
                return Err(Error::UnknownParameter {
                    operation: op_id.to_string(),
                    parameter: name.clone(),
                });
            }
        }

        let path = spec
            .path
            .render(|name| args.get(name).map(scalar_string))
            .map_err(|parameter| Error::MissingParameter {
                operation: op_id.to_string(),
                parameter,
            })?;
        let mut request = Request::new(spec.method, path);

        for param in &spec.parameters {
            let value = args.get(&param.name);
            match (param.location, value) {
                (ParameterLocation::Path, _) => {}
                (_, None) if param.required => {
                    return Err(Error::MissingParameter {
                        operation: op_id.to_string(),
                        parameter: param.name.clone(),
                    });
                }
                (_, None) => {}
                (ParameterLocation::Query, Some(Value::Array(items))) => {
                    for item in items.iter().filter(|v| !v.is_null()) {
                        request.query.push((param.name.clone(), scalar_string(item)));
                    }
                }
                (ParameterLocation::Query, Some(value)) => {
                    request.query.push((param.name.clone(), scalar_string(value)));
                }
                (ParameterLocation::Header, Some(value)) => {
                    request.headers.push((param.name.clone(), scalar_string(value)));
                }
            }
        }

        match (&spec.body, &args.body) {
            (Some(_), Some(body)) => request.body = Some(body.clone()),
            (Some(body_spec), None) if body_spec.required => {
                return Err(Error::MissingParameter {
                    operation: op_id.to_string(),
                    parameter: "body".into(),
                });
            }
            (None, Some(_)) => {
                return Err(Error::UnknownParameter {
                    operation: op_id.to_string(),
                    parameter: "body".into(),
                });
            }
            _ => {}
        }
        Ok(request)
    }

    /// Execute the operation and return the parsed response body.
    pub fn call(&self, args: CallArgs) -> Result<Value> {
        let request = self.prepare(&args)?;
        let op_id = self.operation_id();
        tracing::debug!(operation = op_id, method = %request.method, path = %request.path, "invoking operation");
        let response = self.session.send(&request).map_err(|err| match err {
            Error::Transport {
                status, message, ..
            } => Error::transport(op_id, status, message),
            other => other,
        })?;
        if !response.is_success() {
            tracing::debug!(operation = op_id, status = response.status, "operation failed");
            return Err(Error::transport(
                op_id,
                Some(response.status),
                response.message(),
            ));
        }
        Ok(response.json.unwrap_or(Value::Null))
    }
}

impl fmt::Debug for BoundOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundOperation")
            .field("spec", &self.spec)
            .field("session", &self.session.session_id())
            .finish()
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flat namespace of bound operations keyed by operation id.
#[derive(Clone, Debug, Default)]
pub struct Api {
    operations: BTreeMap<String, BoundOperation>,
}

impl Api {
    pub fn operation(&self, operation_id: &str) -> Option<&BoundOperation> {
        self.operations.get(operation_id)
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.operations.contains_key(operation_id)
    }

    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn operations(&self) -> impl Iterator<Item = &BoundOperation> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Dispatch to the operation named `operation_id`.
    pub fn call(&self, operation_id: &str, args: CallArgs) -> Result<Value> {
        self.operation(operation_id)
            .ok_or_else(|| Error::UnknownOperation(operation_id.to_string()))?
            .call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, Response, SessionId};
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        id: SessionId,
        sent: Mutex<Vec<Request>>,
        reply: Response,
    }

    impl Recorder {
        fn replying(reply: Response) -> Arc<Self> {
            Arc::new(Self {
                id: SessionId::next(),
                sent: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    impl Transport for Recorder {
        fn session_id(&self) -> SessionId {
            self.id
        }

        fn send(&self, request: &Request) -> Result<Response> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    fn sample_doc() -> Value {
        json!({
            "openapi": "3.0.1",
            "paths": {
                "/accounts/{accountId}/networks": {
                    "parameters": [{"name": "accountId", "in": "path", "required": true}],
                    "get": {"operationId": "getNetworks",
                            "parameters": [{"name": "tag", "in": "query"},
                                           {"name": "X-Trace", "in": "header"}]},
                    "post": {"operationId": "addNetwork",
                             "requestBody": {"required": true, "content": {"application/json": {
                                 "schema": {"$ref": "#/components/schemas/Network"}}}}}
                },
                "/metrics": {
                    "get": {"operationId": "getMetrics",
                            "parameters": [{"name": "from", "in": "query", "required": true}]}
                }
            }
        })
    }

    #[test]
    fn duplicate_operation_ids_fail_loudly() {
        let doc = json!({"openapi": "3.0.1", "paths": {
            "/a": {"get": {"operationId": "dup"}},
            "/b": {"get": {"operationId": "dup"}}
        }});
        let err = OperationRegistry::from_value(&doc).expect_err("duplicate id");
        assert!(matches!(err, Error::SpecParse(ref msg) if msg.contains("dup")));
    }

    #[test]
    fn prepare_substitutes_path_and_collects_query() {
        let session = Recorder::replying(Response { status: 200, json: None });
        let api = OperationRegistry::from_value(&sample_doc()).unwrap().bind(session);
        let request = api
            .operation("getNetworks")
            .unwrap()
            .prepare(
                &CallArgs::new()
                    .param("accountId", "ac-1")
                    .param("tag", json!(["a", "b"]))
                    .param("X-Trace", 7),
            )
            .unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/accounts/ac-1/networks");
        assert_eq!(
            request.query,
            vec![("tag".to_string(), "a".to_string()), ("tag".to_string(), "b".to_string())]
        );
        assert_eq!(request.headers, vec![("X-Trace".to_string(), "7".to_string())]);
    }

    #[test]
    fn missing_and_unknown_parameters_are_rejected() {
        let session = Recorder::replying(Response { status: 200, json: None });
        let api = OperationRegistry::from_value(&sample_doc()).unwrap().bind(session);

        let err = api.call("getNetworks", CallArgs::new()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter { ref parameter, .. } if parameter == "accountId"));

        let err = api.call("getMetrics", CallArgs::new()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter { ref parameter, .. } if parameter == "from"));

        let err = api
            .call("getMetrics", CallArgs::new().param("from", "now").param("bogus", 1))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { ref parameter, .. } if parameter == "bogus"));

        let err = api
            .call("addNetwork", CallArgs::new().param("accountId", "ac-1"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { ref parameter, .. } if parameter == "body"));

        let err = api
            .call("getMetrics", CallArgs::new().param("from", "now").body(json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { ref parameter, .. } if parameter == "body"));

        let err = api.call("nope", CallArgs::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownOperation(_)));
    }

    #[test]
    fn non_success_status_maps_to_transport_error() {
        let session = Recorder::replying(Response {
            status: 403,
            json: Some(json!({"message": "forbidden"})),
        });
        let api = OperationRegistry::from_value(&sample_doc()).unwrap().bind(session);
        let err = api
            .call("getMetrics", CallArgs::new().param("from", "now"))
            .unwrap_err();
        match err {
            Error::Transport {
                operation,
                status,
                message,
            } => {
                assert_eq!(operation, "getMetrics");
                assert_eq!(status, Some(403));
                assert_eq!(message, "forbidden");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn call_sends_body_and_returns_json() {
        let session = Recorder::replying(Response {
            status: 201,
            json: Some(json!({"id": "network-1"})),
        });
        let api = OperationRegistry::from_value(&sample_doc())
            .unwrap()
            .bind(session.clone());
        let result = api
            .call(
                "addNetwork",
                CallArgs::new()
                    .param("accountId", "ac-1")
                    .body(json!({"name": "net"})),
            )
            .unwrap();
        assert_eq!(result, json!({"id": "network-1"}));
        let sent = session.sent.lock().unwrap();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].body, Some(json!({"name": "net"})));
    }
}
