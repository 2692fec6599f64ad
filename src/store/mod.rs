//! Persistence for users and tasks.
//!
//! Both traits are object safe and used as `Arc<dyn UserStore>` /
//! `Arc<dyn TaskStore>`. Every task mutation is a single conditional write
//! keyed by id, owner and lifecycle state, so "not found", "not yours" and
//! "wrong state" all come back as `None` and are indistinguishable to the
//! caller.
//!
//! - [`PgStore`](postgres::PgStore): Postgres via `sqlx`.
//! - [`MemoryStore`](memory::MemoryStore): in-process, selected with
//!   `DATABASE_URL=memory://` and used by the test suite.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewTask, NewUser, PageRequest, Task, TaskChanges, TaskFilter, TaskScope, TaskSort, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One page of a task listing plus the number of tasks matching the filter.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: u64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `DuplicateUser` when the email or name is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: NewTask) -> Result<Task, AppError>;

    /// The task with `id` owned by `owner` on the `scope` side of the trash.
    async fn find_task(&self, owner: Uuid, id: Uuid, scope: TaskScope) -> Result<Option<Task>, AppError>;

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        sort: &TaskSort,
        page: &PageRequest,
    ) -> Result<TaskPage, AppError>;

    /// Applies `changes` to an active task owned by `owner`.
    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, AppError>;

    /// Moves a task into (`deleted = true`) or out of the trash. Only matches
    /// tasks currently on the opposite side.
    async fn set_task_deleted(
        &self,
        owner: Uuid,
        id: Uuid,
        deleted: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, AppError>;

    /// Permanently removes a trashed task. Returns whether a row was removed.
    async fn purge_task(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError>;
}

/// Shares one backend as both stores.
pub fn split<S>(store: S) -> (Arc<dyn UserStore>, Arc<dyn TaskStore>)
where
    S: UserStore + TaskStore + 'static,
{
    let store = Arc::new(store);
    (store.clone(), store)
}
