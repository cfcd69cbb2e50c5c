//! Generic CRUD client for REST-style JSON APIs.
//!
//! # Overview
//! Implement [`Model`] for a record type to bind it to a collection path,
//! then use [`Crud`] to `find`, list (`all`, `take`, `first`, `last`,
//! `where_in`, `order`), `create`, `update`, `save`, `destroy` and `head`.
//!
//! # Design
//! - `CrudClient` is stateless: `build_*` methods produce plain-data
//!   `HttpRequest`s and `parse_*` methods consume `HttpResponse`s, so request
//!   building and response routing are testable without a network.
//! - `Crud` runs the round-trip through a [`Transport`]; `ReqwestTransport`
//!   is the default, tests substitute their own.
//! - `Configuration` is injected. A process-wide default is available through
//!   [`config::shared`] for applications that configure once at startup.
//! - Every failure is a [`CrudError`] with a stable numeric code.
//!
//! ```no_run
//! use crud_core::{Configuration, Crud, Model, Parameters};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     #[serde(skip_serializing_if = "Option::is_none")]
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! impl Model for User {
//!     const PATH: &'static str = "users";
//!     fn id(&self) -> Option<i64> {
//!         self.id
//!     }
//! }
//!
//! # async fn run() -> Result<(), crud_core::CrudError> {
//! let crud = Crud::from_config(Configuration::new("https://api.example.com"))?;
//! let ann: User = crud.find(42).await?;
//! let active: Vec<User> = crud.all(Parameters::new().limit(2).filter("active", true)).await?;
//! # let _ = (ann, active);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod crud;
pub mod diff;
pub mod error;
pub mod http;
pub mod model;
pub mod params;
pub mod transport;

pub use client::CrudClient;
pub use config::Configuration;
pub use crud::Crud;
pub use error::CrudError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, ParameterEncoding};
pub use model::Model;
pub use params::{Conditions, Parameters, DEFAULT_SORT};
pub use transport::{ReqwestTransport, Transport};
