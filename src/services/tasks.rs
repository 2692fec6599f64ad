use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use super::with_deadline;
use crate::error::AppError;
use crate::models::{
    CreateTaskRequest, ListTasksQuery, NewTask, PageRequest, Task, TaskChanges, TaskFilter,
    TaskScope, TaskSort, UpdateTaskRequest,
};
use crate::response::Pagination;
use crate::store::TaskStore;

const NOT_FOUND: &str = "Task not found";
const NOT_IN_TRASH: &str = "Task not found in trash";

/// A page of tasks and its metadata.
#[derive(Debug)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}

/// Parses a task id from the path. Malformed ids never reach the store.
pub fn parse_task_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidId(raw.to_string()))
}

/// Task operations, always scoped to the calling user.
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    timeout: Duration,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn create(&self, owner: Uuid, request: CreateTaskRequest) -> Result<Task, AppError> {
        let new_task = NewTask::from_request(owner, request, Utc::now())?;
        let task = with_deadline(self.timeout, self.store.insert_task(new_task)).await?;
        info!("user {} created task {}", owner, task.id);
        Ok(task)
    }

    /// Active tasks matching the filters in `query`.
    pub async fn list(&self, owner: Uuid, query: &ListTasksQuery) -> Result<TaskList, AppError> {
        let filter = TaskFilter::from_query(owner, query)?;
        let sort = TaskSort::from_query(TaskScope::Active, query);
        self.page(filter, sort, PageRequest::from_query(query)).await
    }

    /// Trashed tasks. Only sorting and paging apply here.
    pub async fn list_trash(&self, owner: Uuid, query: &ListTasksQuery) -> Result<TaskList, AppError> {
        let filter = TaskFilter::new(owner, TaskScope::Trash);
        let sort = TaskSort::from_query(TaskScope::Trash, query);
        self.page(filter, sort, PageRequest::from_query(query)).await
    }

    async fn page(
        &self,
        filter: TaskFilter,
        sort: TaskSort,
        page: PageRequest,
    ) -> Result<TaskList, AppError> {
        debug!("listing tasks: {:?} {:?} {:?}", filter, sort, page);
        let result = with_deadline(self.timeout, self.store.list_tasks(&filter, &sort, &page)).await?;
        Ok(TaskList {
            pagination: page.pagination(result.total),
            tasks: result.tasks,
        })
    }

    pub async fn get(&self, owner: Uuid, task_id: &str) -> Result<Task, AppError> {
        let id = parse_task_id(task_id)?;
        with_deadline(self.timeout, self.store.find_task(owner, id, TaskScope::Active))
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
    }

    pub async fn update(
        &self,
        owner: Uuid,
        task_id: &str,
        request: UpdateTaskRequest,
    ) -> Result<Task, AppError> {
        let id = parse_task_id(task_id)?;
        let changes = TaskChanges::from_request(request, Utc::now())?;
        let task = with_deadline(self.timeout, self.store.update_task(owner, id, &changes))
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
        debug!("user {} updated task {}", owner, id);
        Ok(task)
    }

    /// Moves an active task to the trash.
    pub async fn soft_delete(&self, owner: Uuid, task_id: &str) -> Result<Task, AppError> {
        let id = parse_task_id(task_id)?;
        let task = with_deadline(
            self.timeout,
            self.store.set_task_deleted(owner, id, true, Utc::now()),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
        info!("user {} moved task {} to the trash", owner, id);
        Ok(task)
    }

    pub async fn restore(&self, owner: Uuid, task_id: &str) -> Result<Task, AppError> {
        let id = parse_task_id(task_id)?;
        let task = with_deadline(
            self.timeout,
            self.store.set_task_deleted(owner, id, false, Utc::now()),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_IN_TRASH.into()))?;
        info!("user {} restored task {}", owner, id);
        Ok(task)
    }

    /// Irreversibly removes a task that is already in the trash.
    pub async fn purge(&self, owner: Uuid, task_id: &str) -> Result<(), AppError> {
        let id = parse_task_id(task_id)?;
        if !with_deadline(self.timeout, self.store.purge_task(owner, id)).await? {
            return Err(AppError::NotFound(NOT_IN_TRASH.into()));
        }
        info!("user {} permanently deleted task {}", owner, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn service() -> TaskService {
        TaskService::new(Arc::new(MemoryStore::new()), Duration::from_secs(5))
    }

    fn create_request(title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: Some(title.to_string()),
            description: Some("Something to do".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_task_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_task_id("not-an-id"), Err(AppError::InvalidId(_))));
        assert!(matches!(parse_task_id(""), Err(AppError::InvalidId(_))));
    }

    #[actix_rt::test]
    async fn test_update_completion_sync() {
        let service = service();
        let owner = Uuid::new_v4();
        let task = service.create(owner, create_request("Ship it")).await.unwrap();
        let id = task.id.to_string();

        let done = service
            .update(
                owner,
                &id,
                UpdateTaskRequest {
                    status: Some("completed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed);
        assert!(done.completed_at.is_some());

        let reopened = service
            .update(
                owner,
                &id,
                UpdateTaskRequest {
                    status: Some("pending".into()),
                    priority: Some("critical".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
        assert_eq!(reopened.priority, task.priority);
    }

    #[actix_rt::test]
    async fn test_trash_lifecycle() {
        let service = service();
        let owner = Uuid::new_v4();
        let task = service.create(owner, create_request("Old idea")).await.unwrap();
        let id = task.id.to_string();

        // Only trashed tasks can be restored or purged.
        assert!(matches!(service.restore(owner, &id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.purge(owner, &id).await, Err(AppError::NotFound(_))));

        let trashed = service.soft_delete(owner, &id).await.unwrap();
        assert!(trashed.is_deleted);
        assert!(matches!(service.get(owner, &id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.soft_delete(owner, &id).await, Err(AppError::NotFound(_))));

        let trash = service.list_trash(owner, &ListTasksQuery::default()).await.unwrap();
        assert_eq!(trash.pagination.total, 1);
        let active = service.list(owner, &ListTasksQuery::default()).await.unwrap();
        assert_eq!(active.pagination.total, 0);

        let restored = service.restore(owner, &id).await.unwrap();
        assert!(!restored.is_deleted);
        assert!(restored.deleted_at.is_none());
        assert_eq!(service.get(owner, &id).await.unwrap().id, task.id);

        service.soft_delete(owner, &id).await.unwrap();
        service.purge(owner, &id).await.unwrap();
        assert!(matches!(service.get(owner, &id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.restore(owner, &id).await, Err(AppError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn test_other_users_cannot_reach_a_task() {
        let service = service();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let task = service.create(owner, create_request("Private")).await.unwrap();
        let id = task.id.to_string();

        assert!(matches!(service.get(intruder, &id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            service.update(intruder, &id, UpdateTaskRequest::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(service.soft_delete(intruder, &id).await, Err(AppError::NotFound(_))));
        assert_eq!(service.get(owner, &id).await.unwrap().title, "Private");
    }
}
