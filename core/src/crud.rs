//! Asynchronous CRUD operations over a `Transport`.
//!
//! # Design
//! Every operation builds its request with `CrudClient`, executes it through
//! the transport and parses the response with `CrudClient`. Precondition
//! failures (missing or unexpected `id`, unusable base URL) return before the
//! transport is called. The list helpers (`take`, `first`, `last`,
//! `where_in`, `order`, `find_many`) are thin wrappers over `all`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::client::CrudClient;
use crate::config::Configuration;
use crate::error::CrudError;
use crate::http::{HttpRequest, HttpResponse};
use crate::model::Model;
use crate::params::{suffixed, Conditions, Parameters};
use crate::transport::{ReqwestTransport, Transport};

#[derive(Debug, Clone)]
pub struct Crud<X = ReqwestTransport> {
    client: CrudClient,
    transport: X,
}

impl Crud<ReqwestTransport> {
    /// `Crud` over a reqwest client configured from `config`.
    pub fn from_config(config: Configuration) -> Result<Self, CrudError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::new(CrudClient::new(config), transport))
    }

    /// `Crud` over a snapshot of the process-wide configuration.
    pub fn from_shared() -> Result<Self, CrudError> {
        Self::from_config(crate::config::shared_snapshot())
    }
}

impl<X: Transport> Crud<X> {
    pub fn new(client: CrudClient, transport: X) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &CrudClient {
        &self.client
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CrudError> {
        debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.execute(request).await?;
        debug!(status = response.status, "response received");
        Ok(response)
    }

    /// Fetch the record with primary key `id`.
    pub async fn find<T: Model>(&self, id: i64) -> Result<T, CrudError> {
        let request = self.client.build_find::<T>(id)?;
        let response = self.send(request).await?;
        self.client.parse_object(response)
    }

    /// Fetch the records whose primary key is in `ids`.
    pub async fn find_many<T: Model>(&self, ids: &[i64]) -> Result<Vec<T>, CrudError> {
        let mut conditions = Conditions::new();
        conditions.insert("id".to_string(), Value::from(ids.to_vec()));
        self.all(Parameters::new().conditions(conditions)).await
    }

    /// One record without implicit ordering.
    pub async fn take_one<T: Model>(&self) -> Result<Option<T>, CrudError> {
        Ok(self.take(1).await?.into_iter().next())
    }

    /// Up to `count` records without implicit ordering.
    pub async fn take<T: Model>(&self, count: u64) -> Result<Vec<T>, CrudError> {
        self.all(Parameters::new().limit(count)).await
    }

    /// First record in ascending order of `sorted_by` (use `DEFAULT_SORT`
    /// for the primary key). Keys must not carry `.asc`/`.desc`; use `order`
    /// for explicit directions.
    pub async fn first_one<T: Model>(
        &self,
        conditions: Option<Conditions>,
        sorted_by: &[&str],
    ) -> Result<Option<T>, CrudError> {
        Ok(self.first(1, conditions, sorted_by).await?.into_iter().next())
    }

    pub async fn first<T: Model>(
        &self,
        count: u64,
        conditions: Option<Conditions>,
        sorted_by: &[&str],
    ) -> Result<Vec<T>, CrudError> {
        self.all(directed(count, conditions, sorted_by, ".asc")).await
    }

    /// Last record, i.e. the first in descending order of `sorted_by`.
    pub async fn last_one<T: Model>(
        &self,
        conditions: Option<Conditions>,
        sorted_by: &[&str],
    ) -> Result<Option<T>, CrudError> {
        Ok(self.last(1, conditions, sorted_by).await?.into_iter().next())
    }

    pub async fn last<T: Model>(
        &self,
        count: u64,
        conditions: Option<Conditions>,
        sorted_by: &[&str],
    ) -> Result<Vec<T>, CrudError> {
        self.all(directed(count, conditions, sorted_by, ".desc")).await
    }

    /// First record matching `conditions`.
    pub async fn find_by<T: Model>(&self, conditions: Conditions) -> Result<Option<T>, CrudError> {
        Ok(self
            .where_in(conditions, None, None, None)
            .await?
            .into_iter()
            .next())
    }

    /// Records matching `conditions`.
    pub async fn where_in<T: Model>(
        &self,
        conditions: Conditions,
        count: Option<u64>,
        offset: Option<u64>,
        sorted_by: Option<Vec<String>>,
    ) -> Result<Vec<T>, CrudError> {
        let params = Parameters {
            limit: count,
            offset,
            sorted_by,
            conditions: Some(conditions),
        };
        self.all(params).await
    }

    /// Records sorted by `by`, passed through verbatim (`"name.desc"`).
    pub async fn order<T: Model>(
        &self,
        by: Vec<String>,
        count: Option<u64>,
        offset: Option<u64>,
        conditions: Option<Conditions>,
    ) -> Result<Vec<T>, CrudError> {
        let params = Parameters {
            limit: count,
            offset,
            sorted_by: Some(by),
            conditions,
        };
        self.all(params).await
    }

    /// Records matching `params`.
    pub async fn all<T: Model>(&self, params: Parameters) -> Result<Vec<T>, CrudError> {
        let request = self.client.build_all::<T>(&params)?;
        let response = self.send(request).await?;
        self.client.parse_objects(response)
    }

    /// Create or update depending on whether `object` has an id.
    pub async fn save<T: Model>(&self, object: &T) -> Result<T, CrudError> {
        if object.is_new() {
            self.create(object).await
        } else {
            self.update(object, None).await
        }
    }

    /// PUT `object`, or PATCH the fields changed since `old` when given.
    pub async fn update<T: Model>(&self, object: &T, old: Option<&T>) -> Result<T, CrudError> {
        let request = self.client.build_update(object, old)?;
        let response = self.send(request).await?;
        self.client.parse_object(response)
    }

    pub async fn create<T: Model>(&self, object: &T) -> Result<T, CrudError> {
        let request = self.client.build_create(object)?;
        let response = self.send(request).await?;
        self.client.parse_object(response)
    }

    pub async fn destroy<T: Model>(&self, object: &T) -> Result<(), CrudError> {
        let request = self.client.build_destroy(object)?;
        let response = self.send(request).await?;
        self.client.parse_destroy(response)
    }

    /// Response headers of a HEAD on the collection, e.g. a total count.
    pub async fn head<T: Model>(&self, params: Parameters) -> Result<HashMap<String, String>, CrudError> {
        let request = self.client.build_head::<T>(&params)?;
        let response = self.send(request).await?;
        self.client.parse_headers(response)
    }
}

fn directed(count: u64, conditions: Option<Conditions>, sorted_by: &[&str], suffix: &str) -> Parameters {
    Parameters {
        limit: Some(count),
        offset: None,
        sorted_by: Some(suffixed(sorted_by, suffix)),
        conditions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use crate::http::HttpMethod;
    use crate::params::DEFAULT_SORT;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        name: String,
    }

    impl Model for User {
        const PATH: &'static str = "users";
        fn id(&self) -> Option<i64> {
            self.id
        }
    }

    /// Records requests and answers each with the same canned response.
    struct Recorder {
        requests: Mutex<Vec<HttpRequest>>,
        reply: HttpResponse,
    }

    impl Recorder {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                reply: HttpResponse {
                    status,
                    headers: vec![("x-total-count".to_string(), "3".to_string())],
                    body: body.to_string(),
                },
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, CrudError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    fn recording(status: u16, body: &str) -> Crud<Recorder> {
        Crud::new(
            CrudClient::new(Configuration::new("https://api.example.com")),
            Recorder::replying(status, body),
        )
    }

    fn ann() -> User {
        User {
            id: Some(42),
            name: "Ann".to_string(),
        }
    }

    #[tokio::test]
    async fn find_issues_get_and_decodes() {
        let crud = recording(200, r#"{"id":42,"name":"Ann"}"#);
        let user: User = crud.find(42).await.unwrap();
        assert_eq!(user, ann());
        let requests = crud.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[0].url, "https://api.example.com/users/42");
    }

    #[tokio::test]
    async fn save_routes_on_id() {
        let crud = recording(200, r#"{"id":42,"name":"Ann"}"#);
        crud.save(&ann()).await.unwrap();
        crud.save(&User { id: None, name: "Ann".to_string() }).await.unwrap();
        let methods: Vec<_> = crud.transport().requests().iter().map(|r| r.method).collect();
        assert_eq!(methods, vec![HttpMethod::Put, HttpMethod::Post]);
    }

    #[tokio::test]
    async fn preconditions_skip_transport() {
        let crud = recording(200, "{}");
        let fresh = User { id: None, name: "Ann".to_string() };
        assert_eq!(crud.create(&ann()).await.unwrap_err(), CrudError::ObjectAlreadyExists);
        assert_eq!(crud.update(&fresh, None).await.unwrap_err(), CrudError::ObjectDoesNotExist);
        assert_eq!(crud.destroy(&fresh).await.unwrap_err(), CrudError::ObjectDoesNotExist);
        assert!(crud.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn incorrect_uri_skips_transport() {
        let crud = Crud::new(CrudClient::new(Configuration::default()), Recorder::replying(200, "[]"));
        assert_eq!(crud.take::<User>(2).await.unwrap_err(), CrudError::IncorrectUri);
        assert!(crud.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn first_and_last_append_direction() {
        let crud = recording(200, "[]");
        let _: Vec<User> = crud.first(3, None, &["name"]).await.unwrap();
        let _: Vec<User> = crud.all(Parameters::new().limit(3).sorted_by(["name.asc"])).await.unwrap();
        let _: Vec<User> = crud.last(3, None, &["name"]).await.unwrap();
        let _: Option<User> = crud.last_one(None, DEFAULT_SORT).await.unwrap();

        let urls: Vec<_> = crud.transport().requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls[0], urls[1]);
        assert_eq!(urls[0], "https://api.example.com/users?limit=3&order%5B%5D=name.asc");
        assert_eq!(urls[2], "https://api.example.com/users?limit=3&order%5B%5D=name.desc");
        assert_eq!(urls[3], "https://api.example.com/users?limit=1&order%5B%5D=id.desc");
    }

    #[tokio::test]
    async fn order_passes_keys_verbatim() {
        let crud = recording(200, "[]");
        let _: Vec<User> = crud
            .order(vec!["name.desc".to_string()], Some(5), Some(10), None)
            .await
            .unwrap();
        let url = &crud.transport().requests()[0].url;
        assert_eq!(url, "https://api.example.com/users?limit=5&offset=10&order%5B%5D=name.desc");
    }

    #[tokio::test]
    async fn find_many_filters_by_id() {
        let crud = recording(200, r#"[{"id":1,"name":"A"},{"id":2,"name":"B"}]"#);
        let users: Vec<User> = crud.find_many(&[1, 2]).await.unwrap();
        assert_eq!(users.len(), 2);
        let url = &crud.transport().requests()[0].url;
        assert_eq!(url, "https://api.example.com/users?filter%5Bid%5D%5B%5D=1&filter%5Bid%5D%5B%5D=2");
    }

    #[tokio::test]
    async fn find_by_and_take_one_return_first_or_none() {
        let crud = recording(200, r#"[{"id":1,"name":"A"},{"id":2,"name":"B"}]"#);
        let mut conditions = Conditions::new();
        conditions.insert("name".to_string(), json!("A"));
        let found: Option<User> = crud.find_by(conditions).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(Some(1)));

        let empty = recording(200, "[]");
        let none: Option<User> = empty.take_one().await.unwrap();
        assert!(none.is_none());
        assert!(empty.transport().requests()[0].url.ends_with("users?limit=1"));
    }

    #[tokio::test]
    async fn server_error_list_rejects_any_operation() {
        let crud = recording(200, r#"[{"code":404,"message":"not found"}]"#);
        let expected = CrudError::Server {
            code: 404,
            message: "not found".to_string(),
        };
        assert_eq!(crud.find::<User>(1).await.unwrap_err(), expected);
        assert_eq!(crud.take::<User>(1).await.unwrap_err(), expected);
        assert_eq!(crud.destroy(&ann()).await.unwrap_err(), expected);
        assert_eq!(crud.head::<User>(Parameters::new()).await.unwrap_err(), expected);
    }

    #[tokio::test]
    async fn update_with_old_object_patches() {
        let crud = recording(200, r#"{"id":42,"name":"Anne"}"#);
        let new = User { id: Some(42), name: "Anne".to_string() };
        let updated = crud.update(&new, Some(&ann())).await.unwrap();
        assert_eq!(updated.name, "Anne");
        let request = &crud.transport().requests()[0];
        assert_eq!(request.method, HttpMethod::Patch);
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "Anne"}));
    }

    #[tokio::test]
    async fn head_returns_headers() {
        let crud = recording(200, "");
        let headers = crud.head::<User>(Parameters::new().filter("active", true)).await.unwrap();
        assert_eq!(headers.get("x-total-count").map(String::as_str), Some("3"));
        let request = &crud.transport().requests()[0];
        assert_eq!(request.method, HttpMethod::Head);
        assert_eq!(request.url, "https://api.example.com/users?filter%5Bactive%5D=1");
    }

    #[tokio::test]
    async fn destroy_resolves_unit() {
        let crud = recording(204, "");
        crud.destroy(&ann()).await.unwrap();
        let request = &crud.transport().requests()[0];
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.url, "https://api.example.com/users/42");
    }
}
