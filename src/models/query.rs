//! Translation of list request parameters into a store-agnostic query.
//!
//! [`ListTasksQuery`] is the raw query string. [`TaskFilter`], [`TaskSort`]
//! and [`PageRequest`] are what the stores consume: the in-memory store
//! evaluates them directly, the Postgres store renders them into SQL.

use std::cmp::Ordering;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::task::{Task, TaskPriority, TaskStatus};
use crate::response::Pagination;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Raw query parameters of `GET /tasks` and `GET /tasks/trash`.
///
/// Everything is a string so that a malformed `page` or `limit` falls back
/// to its default instead of failing the whole request.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub completed: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Which side of the soft-delete line a query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    Active,
    Trash,
}

impl TaskScope {
    pub fn is_deleted(&self) -> bool {
        matches!(self, TaskScope::Trash)
    }
}

/// Conditions a task must meet to be listed. Always scoped to one owner.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    pub owner: Uuid,
    pub scope: TaskScope,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub completed: Option<bool>,
    /// Case-insensitive substring matched against title or description.
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn new(owner: Uuid, scope: TaskScope) -> Self {
        Self {
            owner,
            scope,
            status: None,
            priority: None,
            completed: None,
            search: None,
        }
    }

    /// Builds the active-scope filter from query parameters.
    /// Unknown status or priority values are rejected.
    pub fn from_query(owner: Uuid, query: &ListTasksQuery) -> Result<Self, AppError> {
        let status = non_empty(&query.status)
            .map(|raw| {
                raw.parse::<TaskStatus>()
                    .map_err(|msg| AppError::validation("status", msg))
            })
            .transpose()?;
        let priority = non_empty(&query.priority)
            .map(|raw| {
                raw.parse::<TaskPriority>()
                    .map_err(|msg| AppError::validation("priority", msg))
            })
            .transpose()?;
        let completed = non_empty(&query.completed)
            .map(|raw| match raw.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(AppError::validation("completed", "completed must be true or false")),
            })
            .transpose()?;

        Ok(Self {
            status,
            priority,
            completed,
            search: non_empty(&query.search).map(str::to_string),
            ..Self::new(owner, TaskScope::Active)
        })
    }

    pub fn matches(&self, task: &Task) -> bool {
        if task.user_id != self.owner || task.is_deleted != self.scope.is_deleted() {
            return false;
        }
        if self.status.map_or(false, |s| s != task.status)
            || self.priority.map_or(false, |p| p != task.priority)
            || self.completed.map_or(false, |c| c != task.completed)
        {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                task.title.to_lowercase().contains(&term)
                    || task
                        .description
                        .as_deref()
                        .map_or(false, |d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// Columns a list may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Status,
    Priority,
    DueDate,
    DeletedAt,
    LastStatusChange,
}

impl SortField {
    /// Accepts the JSON field name (`createdAt`) or the column name (`created_at`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "createdAt" | "created_at" => Some(SortField::CreatedAt),
            "updatedAt" | "updated_at" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            "status" => Some(SortField::Status),
            "priority" => Some(SortField::Priority),
            "dueDate" | "due_date" => Some(SortField::DueDate),
            "deletedAt" | "deleted_at" => Some(SortField::DeletedAt),
            "lastStatusChange" | "last_status_change" => Some(SortField::LastStatusChange),
            _ => None,
        }
    }

    /// SQL sort key. Titles compare case-insensitively by code point, the
    /// same as [`TaskSort::compare`], whatever the database collation is.
    pub fn order_expr(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "lower(title) COLLATE \"C\"",
            SortField::Status => "status",
            SortField::Priority => "priority",
            SortField::DueDate => "due_date",
            SortField::DeletedAt => "deleted_at",
            SortField::LastStatusChange => "last_status_change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl TaskSort {
    /// `createdAt desc` for active tasks, `deletedAt desc` for the trash.
    pub fn default_for(scope: TaskScope) -> Self {
        let field = match scope {
            TaskScope::Active => SortField::CreatedAt,
            TaskScope::Trash => SortField::DeletedAt,
        };
        Self {
            field,
            order: SortOrder::Desc,
        }
    }

    /// An explicit, known `sortBy` sorts ascending unless `order=desc`.
    /// Anything else falls back to the scope default.
    pub fn from_query(scope: TaskScope, query: &ListTasksQuery) -> Self {
        match non_empty(&query.sort_by).and_then(SortField::parse) {
            Some(field) => {
                let order = match non_empty(&query.order).map(str::to_lowercase).as_deref() {
                    Some("desc") | Some("-1") => SortOrder::Desc,
                    _ => SortOrder::Asc,
                };
                Self { field, order }
            }
            None => Self::default_for(scope),
        }
    }

    /// In-process comparator matching the SQL ordering. Ties are broken by id
    /// so pages are stable.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Status => a.status.rank().cmp(&b.status.rank()),
            SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortField::DueDate => nulls_last(&a.due_date, &b.due_date),
            SortField::DeletedAt => nulls_last(&a.deleted_at, &b.deleted_at),
            SortField::LastStatusChange => a.last_status_change.cmp(&b.last_status_change),
        };
        let ordering = match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

/// 1-indexed page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Absent, non-numeric or non-positive values take their defaults.
    pub fn from_query(query: &ListTasksQuery) -> Self {
        let page = parse_positive(&query.page).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(&query.limit).unwrap_or(DEFAULT_LIMIT);
        Self::new(page, limit)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// `ceil(total / limit)`.
    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination {
            total,
            page: self.page,
            limit: self.limit,
            pages: self.pages(total),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_positive(value: &Option<String>) -> Option<u32> {
    non_empty(value)
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v >= 1)
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
