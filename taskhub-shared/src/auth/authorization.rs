/// Authorization guards
///
/// Thin wrappers that turn [`AccessResolver`] answers into `Result`s so route
/// handlers can use `?`. Every denial is the same [`AuthzError::PermissionDenied`],
/// whether the resource is missing or simply not visible to the caller.
///
/// # Permission Model
///
/// 1. **System role**: `admin` users may perform administrative operations
/// 2. **Project role**: owner > admin > member, resolved per project
/// 3. **Task**: readable with project access; modifiable by creator, assignee,
///    or project admin
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::auth::access::AccessResolver;
/// use taskhub_shared::auth::authorization::{require_project_admin, AuthzError};
///
/// async fn rename(access: &AccessResolver, project_id: i64, user_id: i64) -> Result<(), AuthzError> {
///     let granted = require_project_admin(access, project_id, user_id).await?;
///     println!("{} may rename {}", granted.role, granted.project.name);
///     Ok(())
/// }
/// ```

use super::access::{AccessResolver, ProjectAccess, TaskAccess};
use crate::models::project_member::ProjectRole;
use crate::models::task::Task;
use crate::models::user::User;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Missing resource or insufficient project role
    #[error("Permission denied")]
    PermissionDenied,

    /// Operation needs the system-wide admin role
    #[error("Administrator privileges required")]
    AdminRequired,
}

/// Requires any role in the project
pub async fn require_project_access(
    access: &AccessResolver,
    project_id: i64,
    user_id: i64,
) -> Result<ProjectAccess, AuthzError> {
    access
        .resolve_project_access(project_id, user_id)
        .await
        .ok_or(AuthzError::PermissionDenied)
}

/// Requires owner or admin in the project
pub async fn require_project_admin(
    access: &AccessResolver,
    project_id: i64,
    user_id: i64,
) -> Result<ProjectAccess, AuthzError> {
    require_project_role(access, project_id, user_id, |role| {
        role.has_permission(&ProjectRole::Admin)
    })
    .await
}

/// Requires a role that may add, re-role and remove members
pub async fn require_member_manager(
    access: &AccessResolver,
    project_id: i64,
    user_id: i64,
) -> Result<ProjectAccess, AuthzError> {
    require_project_role(access, project_id, user_id, ProjectRole::can_manage_members).await
}

/// Requires the project's owner, the only role that may delete it
pub async fn require_project_owner(
    access: &AccessResolver,
    project_id: i64,
    user_id: i64,
) -> Result<ProjectAccess, AuthzError> {
    require_project_role(access, project_id, user_id, ProjectRole::can_delete_project).await
}

async fn require_project_role(
    access: &AccessResolver,
    project_id: i64,
    user_id: i64,
    allowed: impl Fn(&ProjectRole) -> bool,
) -> Result<ProjectAccess, AuthzError> {
    let granted = require_project_access(access, project_id, user_id).await?;

    if !allowed(&granted.role) {
        return Err(AuthzError::PermissionDenied);
    }

    Ok(granted)
}

/// Requires access to the task's project
pub async fn require_task_access(
    access: &AccessResolver,
    task_id: i64,
    user_id: i64,
) -> Result<TaskAccess, AuthzError> {
    access
        .resolve_task_access(task_id, user_id)
        .await
        .ok_or(AuthzError::PermissionDenied)
}

/// Requires the right to edit or delete the task
pub async fn require_task_modify(
    access: &AccessResolver,
    task_id: i64,
    user_id: i64,
) -> Result<Task, AuthzError> {
    access
        .can_modify_task(task_id, user_id)
        .await
        .ok_or(AuthzError::PermissionDenied)
}

/// Requires the system-wide admin role
pub fn require_system_admin(user: &User) -> Result<(), AuthzError> {
    if !user.is_admin() {
        return Err(AuthzError::AdminRequired);
    }

    Ok(())
}
