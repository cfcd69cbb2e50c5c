//! Pluggable HTTP round-trip.
//!
//! `Crud` hands every built `HttpRequest` to a `Transport` and parses the
//! returned `HttpResponse`. HTTP status codes are data, not errors: only
//! failures that produce no response at all come back as `Err`.

use std::error::Error as _;
use std::io;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::config::Configuration;
use crate::error::CrudError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Domain of `CrudError::Custom` values produced by `ReqwestTransport`.
pub const TRANSPORT_DOMAIN: &str = "reqwest";

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, CrudError>;
}

#[async_trait]
impl<X: Transport + ?Sized> Transport for std::sync::Arc<X> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, CrudError> {
        (**self).execute(request).await
    }
}

/// `Transport` backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Client honoring `config.timeout`.
    pub fn from_config(config: &Configuration) -> Result<Self, CrudError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(wrap_error)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, CrudError> {
        let mut builder = self.http.request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(method = %request.method, url = %request.url, error = %e, "transport failure");
            wrap_error(e)
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.text().await.map_err(wrap_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Header pairs with textual values; non-UTF-8 values are skipped.
fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| match value.to_str() {
            Ok(v) => Some((name.as_str().to_string(), v.to_string())),
            Err(_) => {
                tracing::debug!(header = %name, "dropping non-UTF-8 header value");
                None
            }
        })
        .collect()
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Wrap a reqwest failure as `CrudError::Custom`. The code is the HTTP
/// status when there is one, else the OS error number found in the source
/// chain, else 0.
fn wrap_error(error: reqwest::Error) -> CrudError {
    let code = error
        .status()
        .map(|status| i64::from(status.as_u16()))
        .or_else(|| os_error_code(&error))
        .unwrap_or(0);
    CrudError::Custom {
        code,
        domain: TRANSPORT_DOMAIN.to_string(),
        message: error.to_string(),
    }
}

fn os_error_code(error: &reqwest::Error) -> Option<i64> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return io_err.raw_os_error().map(i64::from);
        }
        source = err.source();
    }
    None
}
