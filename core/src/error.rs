//! Error types for the CRUD client.
//!
//! # Design
//! One closed enum covers every failure an operation can surface: local
//! precondition failures (`IncorrectUri`, `ObjectDoesNotExist`,
//! `ObjectAlreadyExists`), decode failures (`IncorrectJsonStructure`,
//! `EmptyData`), errors reported by the server in its JSON payload (`Server`)
//! and transport failures that never reached the application protocol
//! (`Custom`). Every variant has a stable numeric code and a message.

use serde_json::Value;
use thiserror::Error;

use crate::config::Configuration;

/// Errors returned by `CrudClient` and `Crud` operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrudError {
    /// The base URL is missing or cannot be joined with the model path.
    #[error("URI for model is incorrect")]
    IncorrectUri,

    /// The operation needs a persisted object but `id` is `None`.
    #[error("Object does not exist")]
    ObjectDoesNotExist,

    /// `create` was called on an object that already has an `id`.
    #[error("Object already exists")]
    ObjectAlreadyExists,

    /// The payload does not have the expected shape.
    #[error("Incorrect JSON structure")]
    IncorrectJsonStructure,

    /// The server answered with an empty body where data was expected.
    #[error("Empty response body from server")]
    EmptyData,

    /// Error object returned by the server: `{"code": .., "message": ..}`.
    #[error("{message}")]
    Server { code: i64, message: String },

    /// Transport failure wrapped with its native diagnostics.
    #[error("{message}")]
    Custom {
        code: i64,
        domain: String,
        message: String,
    },
}

impl CrudError {
    /// Decode a server error object. Returns `None` unless `code` is an
    /// integer and `message` a string.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let code = object.get("code")?.as_i64()?;
        let message = object.get("message")?.as_str()?;
        Some(CrudError::Server {
            code,
            message: message.to_string(),
        })
    }

    /// Decode a list of server error objects. Every element must decode.
    pub fn list_from_json(value: &Value) -> Option<Vec<Self>> {
        value.as_array()?.iter().map(Self::from_json).collect()
    }

    pub fn code(&self) -> i64 {
        match self {
            CrudError::Server { code, .. } | CrudError::Custom { code, .. } => *code,
            CrudError::IncorrectJsonStructure => 1001,
            CrudError::EmptyData => 1002,
            CrudError::IncorrectUri => 10000,
            CrudError::ObjectDoesNotExist => 10001,
            CrudError::ObjectAlreadyExists => 10002,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Error domain: the configured server domain for `Server`, the wrapped
    /// domain for `Custom`, and the application domain otherwise.
    pub fn domain(&self, config: &Configuration) -> String {
        match self {
            CrudError::Server { .. } => config.server_domain.clone(),
            CrudError::Custom { domain, .. } => domain.clone(),
            _ => config.app_domain().to_string(),
        }
    }

    /// True for errors detected before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CrudError::IncorrectUri | CrudError::ObjectDoesNotExist | CrudError::ObjectAlreadyExists
        )
    }
}
