//! Stateless HTTP request builder and response parser for REST resources.
//!
//! # Design
//! `CrudClient` holds only a `Configuration` snapshot. Each operation is split
//! into a `build_*` method that produces an `HttpRequest` and a `parse_*`
//! method that consumes an `HttpResponse`. `Crud` runs the round-trip in
//! between through a `Transport`; tests can drive the two halves directly.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::{self, Configuration};
use crate::diff;
use crate::error::CrudError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ParameterEncoding};
use crate::model::Model;
use crate::params::{encode_query, Parameters};

#[derive(Debug, Clone, Default)]
pub struct CrudClient {
    config: Configuration,
}

impl CrudClient {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    /// Client bound to a snapshot of the process-wide configuration.
    pub fn from_shared() -> Self {
        Self::new(config::shared_snapshot())
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Build a request for `path` below the base URL.
    ///
    /// Custom headers are applied first; later values replace earlier ones for
    /// the same name. `parameters` go to the query string or to a JSON body
    /// depending on `encoding` and `method`.
    pub fn build_request(
        &self,
        path: &str,
        method: HttpMethod,
        parameters: Option<&Value>,
        encoding: ParameterEncoding,
    ) -> Result<HttpRequest, CrudError> {
        let mut url = self.resource_url(path)?;

        let mut request = HttpRequest {
            method,
            url: String::new(),
            headers: Vec::new(),
            body: None,
        };
        if let Some(provider) = &self.config.custom_headers {
            for (name, value) in provider() {
                request.set_header(&name, &value);
            }
        }

        let in_url = encoding == ParameterEncoding::MethodDependent && method.encodes_in_url();
        match parameters {
            Some(params) if in_url => {
                let query = encode_query(params);
                if !query.is_empty() {
                    let merged = match url.query() {
                        Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                        _ => query,
                    };
                    url.set_query(Some(&merged));
                }
            }
            Some(params) => {
                let body = serde_json::to_string(params)
                    .map_err(|_| CrudError::IncorrectJsonStructure)?;
                if request.header("content-type").is_none() {
                    request.set_header("content-type", "application/json");
                }
                request.body = Some(body);
            }
            None => {}
        }

        request.url = url.into();
        Ok(request)
    }

    fn resource_url(&self, path: &str) -> Result<Url, CrudError> {
        let mut url = Url::parse(self.config.base_url.trim()).map_err(|_| CrudError::IncorrectUri)?;
        if url.cannot_be_a_base() {
            return Err(CrudError::IncorrectUri);
        }
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        Ok(url)
    }

    pub fn build_find<T: Model>(&self, id: i64) -> Result<HttpRequest, CrudError> {
        self.build_request(
            &T::resource_path(id),
            HttpMethod::Get,
            None,
            ParameterEncoding::MethodDependent,
        )
    }

    pub fn build_all<T: Model>(&self, params: &Parameters) -> Result<HttpRequest, CrudError> {
        self.build_request(
            T::PATH,
            HttpMethod::Get,
            Some(&params.to_json()),
            ParameterEncoding::MethodDependent,
        )
    }

    pub fn build_head<T: Model>(&self, params: &Parameters) -> Result<HttpRequest, CrudError> {
        self.build_request(
            T::PATH,
            HttpMethod::Head,
            Some(&params.to_json()),
            ParameterEncoding::MethodDependent,
        )
    }

    pub fn build_create<T: Model>(&self, object: &T) -> Result<HttpRequest, CrudError> {
        if object.id().is_some() {
            return Err(CrudError::ObjectAlreadyExists);
        }
        let body = serde_json::to_value(object).map_err(|_| CrudError::IncorrectJsonStructure)?;
        self.build_request(T::PATH, HttpMethod::Post, Some(&body), ParameterEncoding::Json)
    }

    /// PUT the full object, or PATCH only the fields that differ from `old`.
    pub fn build_update<T: Model>(&self, object: &T, old: Option<&T>) -> Result<HttpRequest, CrudError> {
        let id = object.id().ok_or(CrudError::ObjectDoesNotExist)?;
        let (method, body) = match old {
            Some(old) => (HttpMethod::Patch, diff::patch_body(object, old)),
            None => (HttpMethod::Put, serde_json::to_value(object)),
        };
        let body = body.map_err(|_| CrudError::IncorrectJsonStructure)?;
        self.build_request(&T::resource_path(id), method, Some(&body), ParameterEncoding::Json)
    }

    pub fn build_destroy<T: Model>(&self, object: &T) -> Result<HttpRequest, CrudError> {
        let id = object.id().ok_or(CrudError::ObjectDoesNotExist)?;
        self.build_request(
            &T::resource_path(id),
            HttpMethod::Delete,
            None,
            ParameterEncoding::MethodDependent,
        )
    }

    pub fn parse_object<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, CrudError> {
        let payload = route(&response)?.ok_or(CrudError::EmptyData)?;
        if !payload.is_object() {
            return Err(CrudError::IncorrectJsonStructure);
        }
        serde_json::from_value(payload).map_err(|_| CrudError::IncorrectJsonStructure)
    }

    pub fn parse_objects<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<Vec<T>, CrudError> {
        let payload = route(&response)?.ok_or(CrudError::EmptyData)?;
        if !payload.is_array() {
            return Err(CrudError::IncorrectJsonStructure);
        }
        serde_json::from_value(payload).map_err(|_| CrudError::IncorrectJsonStructure)
    }

    pub fn parse_destroy(&self, response: HttpResponse) -> Result<(), CrudError> {
        route(&response).map(|_| ())
    }

    pub fn parse_headers(&self, response: HttpResponse) -> Result<HashMap<String, String>, CrudError> {
        route(&response)?;
        Ok(response.headers.into_iter().collect())
    }
}

/// Shared response routing: surface server errors, hand back the payload.
///
/// A non-empty array of error objects always rejects with its first element.
/// On a non-2xx status a single error object rejects too; any other body,
/// empty or not, becomes a `Server` error carrying the status.
fn route(response: &HttpResponse) -> Result<Option<Value>, CrudError> {
    if response.body.trim().is_empty() {
        if response.is_success() {
            return Ok(None);
        }
        return Err(status_error(response.status));
    }

    let payload: Value = match serde_json::from_str(&response.body) {
        Ok(payload) => payload,
        Err(_) if !response.is_success() => return Err(status_error(response.status)),
        Err(_) => return Err(CrudError::IncorrectJsonStructure),
    };

    if let Some(first) = CrudError::list_from_json(&payload).and_then(|errors| errors.into_iter().next()) {
        tracing::warn!(status = response.status, code = first.code(), "server reported error");
        return Err(first);
    }
    if !response.is_success() {
        let err = CrudError::from_json(&payload).unwrap_or_else(|| status_error(response.status));
        tracing::warn!(status = response.status, code = err.code(), "server reported error");
        return Err(err);
    }
    Ok(Some(payload))
}

fn status_error(status: u16) -> CrudError {
    CrudError::Server {
        code: i64::from(status),
        message: format!("HTTP {status}"),
    }
}
