//! Client side of the bridge.
//!
//! The transport is an external collaborator behind the [`Transport`]
//! trait; this module only contributes the protocol work. Marshalling the
//! arguments and unmarshalling the result happen on the caller's thread,
//! never on an internal scheduler, so an async send is exactly the
//! transport's future plus synchronous codec work on either side of it.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::parser::{ParseError, ParserKind, extract};
use crate::request::Response;
use crate::serialize::{MarshalError, Serializer, UnmarshalError};
use crate::state::OutputMode;
use crate::types::{TypeSpec, wire};
use crate::value::HostValue;

/// A transport failure, opaque to the protocol layer.
#[derive(Debug, Error, Diagnostic)]
#[error("transport failed: {message}")]
#[diagnostic(code(wirebridge::client::transport))]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Delivers a request envelope and returns the response envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Value) -> Result<Value, TransportError>;
}

/// Errors raised by a client call.
#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with an error member.
    #[error("remote error {code}: {message}")]
    #[diagnostic(code(wirebridge::client::remote))]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Unmarshal(#[from] UnmarshalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    /// The response envelope is not a JSON-RPC response.
    #[error("malformed response: {detail}")]
    #[diagnostic(code(wirebridge::client::malformed_response))]
    MalformedResponse { detail: String },
}

/// A successful call's value plus any endpoint redirect the server sent.
#[derive(Debug)]
pub struct ClientResponse {
    pub value: HostValue,
    /// When present, the server asks the client to switch endpoint for
    /// subsequent calls. Surfaced, not acted on.
    pub server_url: Option<String>,
}

/// A JSON-RPC client over an arbitrary transport.
pub struct BridgeClient<T> {
    transport: T,
    serializer: Serializer,
    next_id: AtomicI64,
}

impl<T: Transport> BridgeClient<T> {
    pub fn new(transport: T, serializer: Serializer) -> Self {
        Self {
            transport,
            serializer,
            next_id: AtomicI64::new(1),
        }
    }

    /// The serializer, for registering classes the client marshals.
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Invoke a remote method.
    ///
    /// Arguments are marshalled before the send, the result is
    /// unmarshalled as `expect` after it, both on the calling task.
    pub async fn call(
        &self,
        method: &str,
        params: &[HostValue],
        expect: &TypeSpec,
    ) -> Result<ClientResponse, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let outcome = self.serializer.marshal_params(params)?;

        let mut envelope = Map::new();
        envelope.insert("method".to_string(), Value::String(method.to_string()));
        envelope.insert("id".to_string(), Value::Number(id.into()));
        envelope.insert("params".to_string(), outcome.value);
        if !outcome.fixups.is_empty() {
            let entries = outcome.fixups.iter().map(|f| f.to_json()).collect();
            envelope.insert(wire::FIXUPS_FIELD.to_string(), Value::Array(entries));
        }
        for slot in outcome.flat_slots {
            envelope.insert(slot.token, slot.value);
        }

        debug!(method, id, "sending request");
        let raw = self.transport.send(Value::Object(envelope)).await?;

        let decoded: Response =
            serde_json::from_value(raw.clone()).map_err(|err| ClientError::MalformedResponse {
                detail: err.to_string(),
            })?;
        if let Some(error) = decoded.error {
            return Err(ClientError::Remote {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        let Some(envelope) = raw.as_object() else {
            return Err(ClientError::MalformedResponse {
                detail: "response is not an object".to_string(),
            });
        };
        let kind = match self.serializer.config().output_mode {
            OutputMode::Flat => ParserKind::Flat,
            OutputMode::Nested(_) => ParserKind::Nested,
        };
        let (result, fixups) = extract(kind, envelope, "result")?;
        let value = self.serializer.unmarshal_result(expect, &result, &fixups)?;
        Ok(ClientResponse {
            value,
            server_url: decoded.server_url,
        })
    }
}
