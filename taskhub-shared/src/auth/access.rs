/// Project and task access resolution
///
/// Answers "may this user see / administer / modify this resource" from the
/// ownership and membership data. Every answer is fail-closed: a datastore
/// error is logged and reported as "no access", and a missing project or task
/// is indistinguishable from one the user cannot see.
///
/// # Resolution order
///
/// 1. Project absent → no access
/// 2. `projects.owner_id == user_id` → `owner` (before any membership row)
/// 3. Membership row → its role
/// 4. Otherwise → no access
///
/// Tasks have no permissions of their own; access to a task is access to its
/// project. A task may additionally be modified by its creator or assignee.
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::auth::access::AccessResolver;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) {
/// let access = AccessResolver::postgres(pool);
///
/// if let Some(granted) = access.resolve_project_access(7, 2).await {
///     println!("user 2 is {} of {}", granted.role, granted.project.name);
/// }
///
/// let is_admin = access.resolve_project_admin(7, 2).await;
/// # }
/// ```

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::project::Project;
use crate::models::project_member::{MemberRole, ProjectMember, ProjectRole};
use crate::models::task::Task;

/// Read-only view of the data access decisions are made from
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn find_project(&self, project_id: i64) -> Result<Option<Project>, sqlx::Error>;

    async fn find_member_role(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRole>, sqlx::Error>;

    async fn find_task(&self, task_id: i64) -> Result<Option<Task>, sqlx::Error>;
}

/// [`AccessStore`] backed by the Postgres models
#[derive(Debug, Clone)]
pub struct PgAccessStore {
    pool: PgPool,
}

impl PgAccessStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessStore for PgAccessStore {
    async fn find_project(&self, project_id: i64) -> Result<Option<Project>, sqlx::Error> {
        Project::find_by_id(&self.pool, project_id).await
    }

    async fn find_member_role(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRole>, sqlx::Error> {
        ProjectMember::find_role(&self.pool, project_id, user_id).await
    }

    async fn find_task(&self, task_id: i64) -> Result<Option<Task>, sqlx::Error> {
        Task::find_by_id(&self.pool, task_id).await
    }
}

/// Granted access to a project
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectAccess {
    pub project: Project,
    pub role: ProjectRole,
}

/// Granted access to a task, carrying the role held in its project
#[derive(Debug, Clone, PartialEq)]
pub struct TaskAccess {
    pub task: Task,
    pub role: ProjectRole,
}

/// Resolves project and task permissions
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn AccessStore>,
}

impl std::fmt::Debug for AccessResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessResolver").finish_non_exhaustive()
    }
}

impl AccessResolver {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Resolver over the Postgres models
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgAccessStore::new(pool)))
    }

    /// Resolves the user's role in a project
    ///
    /// `None` covers a missing project, a non-member and a datastore failure.
    pub async fn resolve_project_access(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Option<ProjectAccess> {
        match self.try_project_access(project_id, user_id).await {
            Ok(access) => access,
            Err(e) => {
                tracing::error!(
                    operation = "resolve_project_access",
                    project_id,
                    user_id,
                    error = %e,
                    "Access check failed, denying"
                );
                None
            }
        }
    }

    /// Whether the user is the project's owner or one of its admins
    pub async fn resolve_project_admin(&self, project_id: i64, user_id: i64) -> bool {
        match self.try_project_access(project_id, user_id).await {
            Ok(access) => access.is_some_and(|a| a.role.is_admin()),
            Err(e) => {
                tracing::error!(
                    operation = "resolve_project_admin",
                    project_id,
                    user_id,
                    error = %e,
                    "Admin check failed, denying"
                );
                false
            }
        }
    }

    /// Resolves access to a task through its project
    pub async fn resolve_task_access(&self, task_id: i64, user_id: i64) -> Option<TaskAccess> {
        match self.try_task_access(task_id, user_id).await {
            Ok(access) => access,
            Err(e) => {
                tracing::error!(
                    operation = "resolve_task_access",
                    task_id,
                    user_id,
                    error = %e,
                    "Access check failed, denying"
                );
                None
            }
        }
    }

    /// Returns the task if the user created it, is assigned to it, or
    /// administers its project
    pub async fn can_modify_task(&self, task_id: i64, user_id: i64) -> Option<Task> {
        match self.try_modify_task(task_id, user_id).await {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(
                    operation = "can_modify_task",
                    task_id,
                    user_id,
                    error = %e,
                    "Modify check failed, denying"
                );
                None
            }
        }
    }

    async fn try_project_access(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<ProjectAccess>, sqlx::Error> {
        let Some(project) = self.store.find_project(project_id).await? else {
            return Ok(None);
        };

        if project.owner_id == user_id {
            return Ok(Some(ProjectAccess {
                project,
                role: ProjectRole::Owner,
            }));
        }

        let role = self.store.find_member_role(project_id, user_id).await?;

        Ok(role.map(|role| ProjectAccess {
            project,
            role: role.into(),
        }))
    }

    async fn try_task_access(
        &self,
        task_id: i64,
        user_id: i64,
    ) -> Result<Option<TaskAccess>, sqlx::Error> {
        let Some(task) = self.store.find_task(task_id).await? else {
            return Ok(None);
        };

        let access = self.try_project_access(task.project_id, user_id).await?;

        Ok(access.map(|a| TaskAccess { task, role: a.role }))
    }

    async fn try_modify_task(&self, task_id: i64, user_id: i64) -> Result<Option<Task>, sqlx::Error> {
        let Some(task) = self.store.find_task(task_id).await? else {
            return Ok(None);
        };

        if task.created_by == user_id || task.assigned_to == Some(user_id) {
            return Ok(Some(task));
        }

        let is_admin = self
            .try_project_access(task.project_id, user_id)
            .await?
            .is_some_and(|a| a.role.is_admin());

        Ok(is_admin.then_some(task))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory access data with a switch that makes every lookup fail
    #[derive(Default)]
    pub(crate) struct InMemoryAccessStore {
        projects: Mutex<HashMap<i64, Project>>,
        members: Mutex<HashMap<(i64, i64), MemberRole>>,
        tasks: Mutex<HashMap<i64, Task>>,
        failing: AtomicBool,
    }

    impl InMemoryAccessStore {
        pub(crate) fn add_project(&self, id: i64, owner_id: i64) {
            let now = Utc::now();
            self.projects.lock().unwrap().insert(
                id,
                Project {
                    id,
                    name: format!("project-{id}"),
                    description: None,
                    status: "active".to_string(),
                    owner_id,
                    created_at: now,
                    updated_at: now,
                },
            );
        }

        pub(crate) fn add_member(&self, project_id: i64, user_id: i64, role: MemberRole) {
            self.members
                .lock()
                .unwrap()
                .insert((project_id, user_id), role);
        }

        pub(crate) fn add_task(
            &self,
            id: i64,
            project_id: i64,
            created_by: i64,
            assigned_to: Option<i64>,
        ) {
            let now = Utc::now();
            self.tasks.lock().unwrap().insert(
                id,
                Task {
                    id,
                    title: format!("task-{id}"),
                    description: None,
                    status: TaskStatus::Todo,
                    priority: TaskPriority::Medium,
                    estimated_hours: None,
                    actual_hours: None,
                    progress: 0,
                    notes: None,
                    project_id,
                    assigned_to,
                    created_by,
                    due_date: None,
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                },
            );
        }

        pub(crate) fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), sqlx::Error> {
            if self.failing.load(Ordering::SeqCst) {
                Err(sqlx::Error::PoolTimedOut)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl AccessStore for InMemoryAccessStore {
        async fn find_project(&self, project_id: i64) -> Result<Option<Project>, sqlx::Error> {
            self.check()?;
            Ok(self.projects.lock().unwrap().get(&project_id).cloned())
        }

        async fn find_member_role(
            &self,
            project_id: i64,
            user_id: i64,
        ) -> Result<Option<MemberRole>, sqlx::Error> {
            self.check()?;
            Ok(self
                .members
                .lock()
                .unwrap()
                .get(&(project_id, user_id))
                .copied())
        }

        async fn find_task(&self, task_id: i64) -> Result<Option<Task>, sqlx::Error> {
            self.check()?;
            Ok(self.tasks.lock().unwrap().get(&task_id).cloned())
        }
    }

    /// Project 7 owned by user 1; user 2 member, user 3 admin, user 4 member.
    /// Task 42 in project 7 created by user 4; task 43 created by 1, assigned to 2.
    fn fixture() -> (Arc<InMemoryAccessStore>, AccessResolver) {
        let store = Arc::new(InMemoryAccessStore::default());
        store.add_project(7, 1);
        store.add_member(7, 2, MemberRole::Member);
        store.add_member(7, 3, MemberRole::Admin);
        store.add_member(7, 4, MemberRole::Member);
        store.add_task(42, 7, 4, None);
        store.add_task(43, 7, 1, Some(2));

        let resolver = AccessResolver::new(store.clone());
        (store, resolver)
    }

    #[tokio::test]
    async fn test_owner_gets_owner_role() {
        let (_, access) = fixture();

        let granted = access.resolve_project_access(7, 1).await.unwrap();
        assert_eq!(granted.role, ProjectRole::Owner);
        assert_eq!(granted.project.id, 7);
        assert!(access.resolve_project_admin(7, 1).await);
    }

    #[tokio::test]
    async fn test_member_gets_member_role() {
        let (_, access) = fixture();

        let granted = access.resolve_project_access(7, 2).await.unwrap();
        assert_eq!(granted.role, ProjectRole::Member);
        assert!(!access.resolve_project_admin(7, 2).await);
    }

    #[tokio::test]
    async fn test_admin_member_is_project_admin() {
        let (_, access) = fixture();

        let granted = access.resolve_project_access(7, 3).await.unwrap();
        assert_eq!(granted.role, ProjectRole::Admin);
        assert!(access.resolve_project_admin(7, 3).await);
    }

    #[tokio::test]
    async fn test_outsider_denied() {
        let (_, access) = fixture();

        assert!(access.resolve_project_access(7, 99).await.is_none());
        assert!(!access.resolve_project_admin(7, 99).await);
    }

    #[tokio::test]
    async fn test_missing_project_same_as_denied() {
        let (_, access) = fixture();

        assert_eq!(
            access.resolve_project_access(404, 1).await,
            access.resolve_project_access(7, 99).await
        );
        assert!(!access.resolve_project_admin(404, 1).await);
    }

    #[tokio::test]
    async fn test_owner_wins_over_membership_row() {
        let (store, access) = fixture();
        store.add_member(7, 1, MemberRole::Member);

        let granted = access.resolve_project_access(7, 1).await.unwrap();
        assert_eq!(granted.role, ProjectRole::Owner);
        assert!(access.resolve_project_admin(7, 1).await);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let (store, access) = fixture();
        store.fail(true);

        assert!(access.resolve_project_access(7, 1).await.is_none());
        assert!(!access.resolve_project_admin(7, 1).await);
        assert!(access.resolve_task_access(42, 1).await.is_none());
        assert!(access.can_modify_task(42, 4).await.is_none());

        store.fail(false);
        assert!(access.resolve_project_access(7, 1).await.is_some());
    }

    #[tokio::test]
    async fn test_task_access_follows_project() {
        let (_, access) = fixture();

        let granted = access.resolve_task_access(42, 2).await.unwrap();
        assert_eq!(granted.task.id, 42);
        assert_eq!(granted.role, ProjectRole::Member);

        assert_eq!(
            access.resolve_task_access(42, 1).await.unwrap().role,
            ProjectRole::Owner
        );
        assert!(access.resolve_task_access(42, 99).await.is_none());
        assert!(access.resolve_task_access(404, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_creator_can_modify() {
        let (_, access) = fixture();
        assert_eq!(access.can_modify_task(42, 4).await.map(|t| t.id), Some(42));
    }

    #[tokio::test]
    async fn test_assignee_can_modify() {
        let (_, access) = fixture();
        assert_eq!(access.can_modify_task(43, 2).await.map(|t| t.id), Some(43));
    }

    #[tokio::test]
    async fn test_admin_and_owner_can_modify_any_task() {
        let (_, access) = fixture();
        assert!(access.can_modify_task(42, 1).await.is_some());
        assert!(access.can_modify_task(42, 3).await.is_some());
    }

    #[tokio::test]
    async fn test_plain_member_cannot_modify_others_task() {
        let (_, access) = fixture();
        assert!(access.can_modify_task(42, 2).await.is_none());
        assert!(access.can_modify_task(42, 99).await.is_none());
        assert!(access.can_modify_task(404, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_removed_member_loses_access() {
        let (store, access) = fixture();
        store.members.lock().unwrap().remove(&(7, 2));

        assert!(access.resolve_project_access(7, 2).await.is_none());
        // assignment alone still permits modification
        assert!(access.can_modify_task(43, 2).await.is_some());
    }
}
