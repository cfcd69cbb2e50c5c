//! The `Model` trait binding a record type to its REST resource.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record stored behind a REST collection endpoint.
///
/// A model with `id() == None` has not been persisted yet: `save` creates it.
/// A model with an id is updated by `save` and can be destroyed.
///
/// ```
/// use crud_core::Model;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     #[serde(skip_serializing_if = "Option::is_none")]
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Model for User {
///     const PATH: &'static str = "users";
///     fn id(&self) -> Option<i64> {
///         self.id
///     }
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    /// Collection path relative to the base URL, e.g. `"users"`.
    const PATH: &'static str;

    fn id(&self) -> Option<i64>;

    fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Path of a single resource.
    fn resource_path(id: i64) -> String {
        format!("{}/{id}", Self::PATH)
    }
}
