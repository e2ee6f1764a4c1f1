/// Database models for TaskHub
///
/// Each model owns its CRUD operations as associated functions taking a
/// `&PgPool`.
///
/// # Models
///
/// - `user`: User accounts and system roles
/// - `login_attempt`: Login audit trail and account lockout
/// - `project`: Projects, per-user listings and statistics
/// - `project_member`: Project membership and the owner/admin/member roles
/// - `task`: Project tasks with filtering and sorting
/// - `comment`: Task comments and replies
/// - `tag`: Per-project tags and their assignment to tasks

pub mod comment;
pub mod login_attempt;
pub mod project;
pub mod project_member;
pub mod tag;
pub mod task;
pub mod user;

use serde::{Deserialize, Serialize};

/// Largest page size any listing will return
pub const MAX_PER_PAGE: u32 = 100;

/// 1-based page selection, clamped to `1..=MAX_PER_PAGE` items per page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }

    /// Number of pages needed for `total` items
    pub fn pages(&self, total: i64) -> i64 {
        (total + self.limit() - 1) / self.limit()
    }
}
