use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{TaskPage, TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{NewTask, NewUser, PageRequest, Task, TaskChanges, TaskFilter, TaskScope, TaskSort, User};

/// In-process store with the same semantics as the Postgres one.
///
/// Tasks live in a `DashMap`, so each conditional mutation runs under the
/// entry's shard lock. Users sit behind a single lock so the email and name
/// uniqueness checks and the insert happen atomically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    tasks: DashMap<Uuid, Task>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Sets a user's active flag; stands in for the out-of-band admin process.
    pub fn set_user_active(&self, user_id: Uuid, active: bool) -> bool {
        match self.users.write().get_mut(&user_id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|existing| existing.email == user.email || existing.name == user.name)
        {
            return Err(AppError::DuplicateUser);
        }
        let user = user.into_user(Utc::now());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.email == email)
            .cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: NewTask) -> Result<Task, AppError> {
        let task = task.into_task();
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid, scope: TaskScope) -> Result<Option<Task>, AppError> {
        Ok(self
            .tasks
            .get(&id)
            .filter(|task| task.user_id == owner && task.is_deleted == scope.is_deleted())
            .map(|task| task.value().clone()))
    }

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        sort: &TaskSort,
        page: &PageRequest,
    ) -> Result<TaskPage, AppError> {
        let mut matching: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        let total = matching.len() as u64;
        let tasks = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok(TaskPage { tasks, total })
    }

    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        Ok(self.tasks.get_mut(&id).and_then(|mut task| {
            if task.user_id != owner || task.is_deleted {
                return None;
            }
            task.apply(changes);
            Some(task.value().clone())
        }))
    }

    async fn set_task_deleted(
        &self,
        owner: Uuid,
        id: Uuid,
        deleted: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, AppError> {
        Ok(self.tasks.get_mut(&id).and_then(|mut task| {
            if task.user_id != owner || task.is_deleted == deleted {
                return None;
            }
            task.set_deleted(deleted, now);
            Some(task.value().clone())
        }))
    }

    async fn purge_task(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .tasks
            .remove_if(&id, |_, task| task.user_id == owner && task.is_deleted)
            .is_some())
    }
}
