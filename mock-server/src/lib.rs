//! In-memory REST server for exercising the CRUD client.
//!
//! Any collection name is accepted; records are JSON objects keyed by an
//! integer `id` assigned on creation. Failures are answered with a list of
//! error objects, `[{"code": 404, "message": "not found"}]`.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub type Record = Map<String, Value>;

#[derive(Debug, Default)]
pub struct Store {
    collections: HashMap<String, BTreeMap<i64, Record>>,
    next_id: i64,
}

pub type Db = Arc<RwLock<Store>>;

type ApiError = (StatusCode, Json<Value>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route(
            "/{collection}",
            get(list_records).head(count_records).post(create_record),
        )
        .route(
            "/{collection}/{id}",
            get(get_record)
                .put(replace_record)
                .patch(patch_record)
                .delete(delete_record),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(json!([{ "code": status.as_u16(), "message": message }])),
    )
}

fn not_found() -> ApiError {
    error(StatusCode::NOT_FOUND, "not found")
}

/// Parsed `limit`, `offset`, `order[]` and `filter[..]` query parameters.
#[derive(Debug, Default, PartialEq)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order: Vec<String>,
    pub filter: BTreeMap<String, Vec<String>>,
}

impl ListQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, String> {
        let mut query = ListQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "limit" => query.limit = Some(value.parse().map_err(|_| format!("bad limit: {value}"))?),
                "offset" => query.offset = Some(value.parse().map_err(|_| format!("bad offset: {value}"))?),
                "order[]" | "order" => query.order.push(value.clone()),
                other => {
                    let field = other
                        .strip_prefix("filter[")
                        .map(|rest| rest.trim_end_matches("[]"))
                        .and_then(|rest| rest.strip_suffix(']'))
                        .ok_or_else(|| format!("unknown parameter: {other}"))?;
                    query
                        .filter
                        .entry(field.to_string())
                        .or_default()
                        .push(value.clone());
                }
            }
        }
        Ok(query)
    }

    fn matches(&self, record: &Record) -> bool {
        self.filter.iter().all(|(field, accepted)| {
            let actual = record.get(field).map(query_form).unwrap_or_default();
            accepted.contains(&actual)
        })
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.order {
            let (field, descending) = match key.rsplit_once('.') {
                Some((field, "desc")) => (field, true),
                Some((field, "asc")) => (field, false),
                _ => (key.as_str(), false),
            };
            let ordering = compare_values(a.get(field), b.get(field));
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Matching records in sort order, before `offset`/`limit`.
    fn select(&self, records: &BTreeMap<i64, Record>) -> Vec<Record> {
        let mut selected: Vec<Record> = records
            .values()
            .filter(|record| self.matches(record))
            .cloned()
            .collect();
        selected.sort_by(|a, b| self.compare(a, b));
        selected
    }
}

/// Scalar value as it appears in a query string; booleans are `1`/`0`.
pub fn query_form(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

async fn list_records(
    State(db): State<Db>,
    Path(collection): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let query = ListQuery::from_pairs(&pairs).map_err(|e| error(StatusCode::BAD_REQUEST, &e))?;
    let store = db.read().await;
    let selected = store
        .collections
        .get(&collection)
        .map(|records| query.select(records))
        .unwrap_or_default();
    let page = selected
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Ok(Json(page))
}

async fn count_records(
    State(db): State<Db>,
    Path(collection): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<(StatusCode, HeaderMap), ApiError> {
    let query = ListQuery::from_pairs(&pairs).map_err(|e| error(StatusCode::BAD_REQUEST, &e))?;
    let store = db.read().await;
    let total = store
        .collections
        .get(&collection)
        .map(|records| query.select(records).len())
        .unwrap_or(0);
    let mut headers = HeaderMap::new();
    headers.insert("x-total-count", HeaderValue::from(total));
    Ok((StatusCode::OK, headers))
}

fn into_record(body: Value) -> Result<Record, ApiError> {
    match body {
        Value::Object(record) => Ok(record),
        _ => Err(error(StatusCode::UNPROCESSABLE_ENTITY, "expected a JSON object")),
    }
}

async fn create_record(
    State(db): State<Db>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let mut record = into_record(body)?;
    if record.get("id").is_some_and(|id| !id.is_null()) {
        return Err(error(StatusCode::UNPROCESSABLE_ENTITY, "id must not be set"));
    }
    let mut store = db.write().await;
    store.next_id += 1;
    let id = store.next_id;
    record.insert("id".to_string(), id.into());
    store
        .collections
        .entry(collection)
        .or_default()
        .insert(id, record.clone());
    tracing::debug!(id, "record created");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, i64)>,
) -> Result<Json<Record>, ApiError> {
    let store = db.read().await;
    store
        .collections
        .get(&collection)
        .and_then(|records| records.get(&id))
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn replace_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<Record>, ApiError> {
    let mut record = into_record(body)?;
    let mut store = db.write().await;
    let existing = store
        .collections
        .get_mut(&collection)
        .and_then(|records| records.get_mut(&id))
        .ok_or_else(not_found)?;
    record.insert("id".to_string(), id.into());
    *existing = record.clone();
    Ok(Json(record))
}

/// Merge the body into the record; `null` removes a field.
async fn patch_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<Record>, ApiError> {
    let changes = into_record(body)?;
    let mut store = db.write().await;
    let existing = store
        .collections
        .get_mut(&collection)
        .and_then(|records| records.get_mut(&id))
        .ok_or_else(not_found)?;
    for (key, value) in changes {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            existing.remove(&key);
        } else {
            existing.insert(key, value);
        }
    }
    Ok(Json(existing.clone()))
}

async fn delete_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    store
        .collections
        .get_mut(&collection)
        .and_then(|records| records.remove(&id))
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}
