//! Wire envelope types.
//!
//! A request is an object with `method`, an opaque scalar `id`, and
//! positional `params`; a response carries the `id` back with exactly one
//! of `result` or `error`. Anything else at the top level (the `fixups`
//! array, flat-mode `_n` slots, a `serverURL` redirect) travels in the
//! envelope's extra fields and is interpreted by the parsers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque request id: number, string, or null.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Str(String),
    #[default]
    Null,
}

impl Id {
    /// Read an id from an envelope field. Absent and malformed ids are
    /// both null, so error responses can always echo something.
    pub fn from_field(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_i64().map(Id::Num).unwrap_or(Id::Null),
            Some(Value::String(s)) => Id::Str(s.clone()),
            _ => Id::Null,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Id::Num(n) => Value::Number((*n).into()),
            Id::Str(s) => Value::String(s.clone()),
            Id::Null => Value::Null,
        }
    }
}

/// A decoded request envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub id: Id,
    #[serde(default)]
    pub params: Option<Value>,
    /// Fixups, flat slots, and any future top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The error member of a failed response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A decoded response envelope, as seen by the client side.
#[derive(Clone, Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Id,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
    /// Endpoint switch instruction, when the server sends one.
    #[serde(default, rename = "serverURL")]
    pub server_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_decodes_with_extra_fields() {
        let request: Request = serde_json::from_value(json!({
            "method": "test.echo",
            "id": 1,
            "params": ["hello"],
            "fixups": [],
        }))
        .unwrap();
        assert_eq!(request.method, "test.echo");
        assert_eq!(request.id, Id::Num(1));
        assert!(request.extra.contains_key("fixups"));
    }

    #[test]
    fn absent_id_is_null() {
        let request: Request =
            serde_json::from_value(json!({"method": "test.echo"})).unwrap();
        assert_eq!(request.id, Id::Null);
        assert!(request.params.is_none());
    }

    #[test]
    fn response_splits_result_and_error() {
        let ok: Response =
            serde_json::from_value(json!({"id": 1, "result": "hello"})).unwrap();
        assert_eq!(ok.result, Some(json!("hello")));
        assert!(ok.error.is_none());

        let failed: Response = serde_json::from_value(
            json!({"id": 2, "error": {"code": 591, "message": "nope", "data": null}}),
        )
        .unwrap();
        assert_eq!(failed.error.as_ref().map(|e| e.code), Some(591));
    }

    #[test]
    fn server_url_round_trips() {
        let response: Response = serde_json::from_value(
            json!({"id": 3, "result": null, "serverURL": "https://other/json-rpc"}),
        )
        .unwrap();
        assert_eq!(response.server_url.as_deref(), Some("https://other/json-rpc"));
    }
}
