use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{TaskPage, TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{NewTask, NewUser, PageRequest, Task, TaskChanges, TaskFilter, TaskScope, TaskSort, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, is_active, created_at, updated_at";

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, completed, \
     completed_at, last_status_change, is_deleted, deleted_at, user_id, created_at, updated_at";

/// Postgres-backed store for users and tasks.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool. `acquire_timeout` bounds how long a request waits for a connection.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Appends the `WHERE` clause for `filter`, binding every value.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    builder
        .push(" WHERE user_id = ")
        .push_bind(filter.owner)
        .push(" AND is_deleted = ")
        .push_bind(filter.scope.is_deleted());

    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND priority = ").push_bind(priority);
    }
    if let Some(completed) = filter.completed {
        builder.push(" AND completed = ").push_bind(completed);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escapes `LIKE` metacharacters so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: NewTask) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks (id, title, description, status, priority, due_date, completed, \
             completed_at, last_status_change, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $9, $9) \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(task.title)
            .bind(task.description)
            .bind(task.status)
            .bind(task.priority)
            .bind(task.due_date)
            .bind(task.completed)
            .bind(task.completed_at)
            .bind(task.created_at)
            .bind(task.user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid, scope: TaskScope) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2 AND is_deleted = $3",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .bind(scope.is_deleted())
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        sort: &TaskSort,
        page: &PageRequest,
    ) -> Result<TaskPage, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks", TASK_COLUMNS));
        push_filter(&mut select, filter);
        // Column and direction come from closed enums, never from user text.
        select
            .push(format!(
                " ORDER BY {} {}, id ASC",
                sort.field.order_expr(),
                sort.order.keyword()
            ))
            .push(" LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let tasks = select.build_query_as::<Task>().fetch_all(&self.pool).await?;

        Ok(TaskPage {
            tasks,
            total: total.max(0) as u64,
        })
    }

    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        // One statement: SET expressions see the row as it was before the
        // update, so `status <> $7` compares against the previous status.
        let sql = format!(
            "UPDATE tasks SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                priority = COALESCE($5, priority), \
                due_date = COALESCE($6, due_date), \
                last_status_change = CASE \
                    WHEN $7::task_status IS NOT NULL AND $7::task_status <> status THEN $8 \
                    ELSE last_status_change END, \
                status = COALESCE($7, status), \
                completed = CASE \
                    WHEN $7::task_status IS NULL THEN completed \
                    ELSE $7::task_status = 'completed' END, \
                completed_at = CASE \
                    WHEN $7::task_status IS NULL THEN completed_at \
                    WHEN $7::task_status = 'completed' THEN $8 \
                    ELSE NULL END, \
                updated_at = $8 \
             WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .bind(changes.title.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.priority)
            .bind(changes.due_date)
            .bind(changes.status)
            .bind(changes.now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn set_task_deleted(
        &self,
        owner: Uuid,
        id: Uuid,
        deleted: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET is_deleted = $3, deleted_at = $4, updated_at = $5 \
             WHERE id = $1 AND user_id = $2 AND is_deleted = $6 \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .bind(deleted)
            .bind(deleted.then_some(now))
            .bind(now)
            .bind(!deleted)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn purge_task(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2 AND is_deleted = TRUE")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
