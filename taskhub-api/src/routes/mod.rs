/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, token refresh, logout and profile
/// - `projects`: Project CRUD and statistics
/// - `members`: Project membership management
/// - `tasks`: Task CRUD, filtering and sorting
/// - `comments`: Task comments
/// - `tags`: Project tags and task tagging
/// - `admin`: System administration (revocation management)

pub mod admin;
pub mod auth;
pub mod comments;
pub mod health;
pub mod members;
pub mod projects;
pub mod tags;
pub mod tasks;

use serde::{Deserialize, Deserializer, Serialize};
use taskhub_shared::models::Pagination;

/// Paginated listing envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: i64,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page.max(1),
            per_page: pagination.limit(),
            pages: pagination.pages(total),
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
