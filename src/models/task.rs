use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Task is yet to be started.
    Pending,
    /// Task is currently being worked on.
    InProgress,
    /// Task is done.
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Declaration order, which is also how Postgres orders the enum.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 2,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the stored spelling after trimming and lower-casing.
impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("{} is not a valid status", other)),
        }
    }
}

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    /// Ordering weight used when sorting by priority (low < medium < high).
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::Low => 0,
            TaskPriority::Medium => 1,
            TaskPriority::High => 2,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("{} is not a valid priority", other)),
        }
    }
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// Always equal to `status == completed`.
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_status_change: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Owner of the task. Never changes after creation.
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Applies a whitelisted update in place.
    ///
    /// A status in `changes` always re-syncs `completed`/`completed_at`
    /// (re-completing refreshes `completed_at`), while `last_status_change`
    /// moves only when the status value actually differs.
    pub fn apply(&mut self, changes: &TaskChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(description) = &changes.description {
            self.description = Some(description.clone());
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(status) = changes.status {
            if status != self.status {
                self.last_status_change = changes.now;
            }
            self.status = status;
            self.completed = status.is_completed();
            self.completed_at = self.completed.then_some(changes.now);
        }
        self.updated_at = changes.now;
    }

    /// Moves the task to or from the trash.
    pub fn set_deleted(&mut self, deleted: bool, now: DateTime<Utc>) {
        self.is_deleted = deleted;
        self.deleted_at = deleted.then_some(now);
        self.updated_at = now;
    }
}

/// Request body for `POST /tasks`.
///
/// Every field is optional at the serde level so that a missing title is
/// reported as a validation error instead of a malformed body.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(
        required(message = "Please provide a task title"),
        length(max = 100, message = "Title cannot exceed 100 characters")
    )]
    pub title: Option<String>,

    #[validate(
        required(message = "Please provide a task description"),
        length(max = 500, message = "Description cannot exceed 500 characters")
    )]
    pub description: Option<String>,

    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Request body for `PUT /tasks/{id}`. Only these fields can ever be written.
///
/// `status` and `priority` are kept as raw JSON so that a value of the wrong
/// type is dropped like an unknown one instead of failing the whole body.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Description must be between 1 and 500 characters"))]
    pub description: Option<String>,

    pub status: Option<Value>,
    pub priority: Option<Value>,
    pub due_date: Option<DateTime<Utc>>,
}

/// A validated task ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewTask {
    /// Validates a creation request for `owner`.
    ///
    /// Unlike updates, unknown status or priority values are rejected here.
    pub fn from_request(
        owner: Uuid,
        request: CreateTaskRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let request = CreateTaskRequest {
            title: trimmed(request.title),
            description: trimmed(request.description),
            ..request
        };
        request.validate()?;

        let status = match request.status.as_deref() {
            Some(raw) => raw
                .parse::<TaskStatus>()
                .map_err(|msg| AppError::validation("status", msg))?,
            None => TaskStatus::default(),
        };
        let priority = match request.priority.as_deref() {
            Some(raw) => raw
                .parse::<TaskPriority>()
                .map_err(|msg| AppError::validation("priority", msg))?,
            None => TaskPriority::default(),
        };

        let (title, description) = match (request.title, request.description) {
            (Some(title), Some(description)) => (title, description),
            _ => return Err(AppError::validation("title", "Task title and description are mandatory")),
        };

        let completed = status.is_completed();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: owner,
            title,
            description: Some(description),
            status,
            priority,
            due_date: request.due_date,
            completed,
            completed_at: completed.then_some(now),
            created_at: now,
        })
    }

    /// Materializes the row the store would hold right after insertion.
    pub fn into_task(self) -> Task {
        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
            completed: self.completed,
            completed_at: self.completed_at,
            last_status_change: self.created_at,
            is_deleted: false,
            deleted_at: None,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// The whitelisted, parsed content of an update request.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl TaskChanges {
    /// Parses an update request. Unrecognized status or priority values are
    /// dropped rather than rejected; length limits still apply.
    pub fn from_request(request: UpdateTaskRequest, now: DateTime<Utc>) -> Result<Self, AppError> {
        let request = UpdateTaskRequest {
            title: request.title.map(|t| t.trim().to_string()),
            description: request.description.map(|d| d.trim().to_string()),
            ..request
        };
        request.validate()?;

        Ok(Self {
            title: request.title,
            description: request.description,
            priority: lenient_enum("priority", request.priority),
            status: lenient_enum("status", request.status),
            due_date: request.due_date,
            now,
        })
    }
}

/// Parses an optional enum value, logging and dropping anything unusable.
fn lenient_enum<T>(field: &str, value: Option<Value>) -> Option<T>
where
    T: FromStr<Err = String>,
{
    match value? {
        Value::String(raw) => raw
            .parse::<T>()
            .map_err(|msg| debug!("ignoring {} in update: {}", field, msg))
            .ok(),
        other => {
            debug!("ignoring {} in update: {} is not a string", field, other);
            None
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_request(status: Option<&str>) -> CreateTaskRequest {
        CreateTaskRequest {
            title: Some("  Write report ".to_string()),
            description: Some("Quarterly numbers".to_string()),
            status: status.map(str::to_string),
            priority: None,
            due_date: None,
        }
    }

    fn pending_task() -> Task {
        let created = Utc::now() - Duration::hours(1);
        NewTask::from_request(Uuid::new_v4(), create_request(None), created)
            .unwrap()
            .into_task()
    }

    #[test]
    fn test_task_creation_defaults() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let task = NewTask::from_request(owner, create_request(None), now)
            .unwrap()
            .into_task();

        assert_eq!(task.title, "Write report");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert!(!task.is_deleted);
        assert_eq!(task.user_id, owner);
        assert_eq!(task.last_status_change, now);
    }

    #[test]
    fn test_created_completed_sets_completed_at() {
        let now = Utc::now();
        let task = NewTask::from_request(Uuid::new_v4(), create_request(Some("Completed")), now)
            .unwrap();
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(now));
    }

    #[test]
    fn test_creation_validation() {
        let missing_title = CreateTaskRequest {
            title: Some("   ".to_string()),
            ..create_request(None)
        };
        assert!(matches!(
            NewTask::from_request(Uuid::new_v4(), missing_title, Utc::now()),
            Err(AppError::Validation(_))
        ));

        let missing_description = CreateTaskRequest {
            description: None,
            ..create_request(None)
        };
        assert!(NewTask::from_request(Uuid::new_v4(), missing_description, Utc::now()).is_err());

        let long_title = CreateTaskRequest {
            title: Some("a".repeat(101)),
            ..create_request(None)
        };
        assert!(NewTask::from_request(Uuid::new_v4(), long_title, Utc::now()).is_err());

        let bad_status = create_request(Some("done"));
        match NewTask::from_request(Uuid::new_v4(), bad_status, Utc::now()) {
            Err(AppError::Validation(details)) => assert!(details.contains_key("status")),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_drops_unknown_enum_values() {
        let request = UpdateTaskRequest {
            title: Some("Renamed".to_string()),
            status: Some(Value::from("archived")),
            priority: Some(Value::from(" HIGH ")),
            ..Default::default()
        };
        let changes = TaskChanges::from_request(request, Utc::now()).unwrap();

        assert_eq!(changes.title.as_deref(), Some("Renamed"));
        assert_eq!(changes.status, None);
        assert_eq!(changes.priority, Some(TaskPriority::High));

        let wrong_types: UpdateTaskRequest = serde_json::from_str(
            r#"{"title":"renamed","status":1,"priority":true}"#,
        )
        .unwrap();
        let changes = TaskChanges::from_request(wrong_types, Utc::now()).unwrap();
        assert_eq!(changes.title.as_deref(), Some("renamed"));
        assert_eq!(changes.status, None);
        assert_eq!(changes.priority, None);
    }

    #[test]
    fn test_update_rejects_blank_text() {
        let request = UpdateTaskRequest {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(TaskChanges::from_request(request, Utc::now()).is_err());

        let request = UpdateTaskRequest {
            description: Some("   ".to_string()),
            ..Default::default()
        };
        match TaskChanges::from_request(request, Utc::now()) {
            Err(AppError::Validation(details)) => assert!(details.contains_key("description")),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_completion_sync() {
        let mut task = pending_task();
        let created_change = task.last_status_change;

        let done_at = Utc::now();
        task.apply(&TaskChanges {
            title: None,
            description: None,
            priority: None,
            status: Some(TaskStatus::Completed),
            due_date: None,
            now: done_at,
        });
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(done_at));
        assert_eq!(task.last_status_change, done_at);
        assert_ne!(task.last_status_change, created_change);

        // Completing again refreshes completed_at but the status did not change.
        let again = done_at + Duration::seconds(5);
        task.apply(&TaskChanges {
            title: None,
            description: None,
            priority: None,
            status: Some(TaskStatus::Completed),
            due_date: None,
            now: again,
        });
        assert_eq!(task.completed_at, Some(again));
        assert_eq!(task.last_status_change, done_at);

        let reopened = again + Duration::seconds(5);
        task.apply(&TaskChanges {
            title: None,
            description: None,
            priority: None,
            status: Some(TaskStatus::InProgress),
            due_date: None,
            now: reopened,
        });
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert_eq!(task.last_status_change, reopened);
        assert_eq!(task.updated_at, reopened);
    }

    #[test]
    fn test_set_deleted_round_trip() {
        let mut task = pending_task();
        let now = Utc::now();

        task.set_deleted(true, now);
        assert!(task.is_deleted);
        assert_eq!(task.deleted_at, Some(now));

        task.set_deleted(false, now);
        assert!(!task.is_deleted);
        assert!(task.deleted_at.is_none());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(pending_task()).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("isDeleted").is_some());
        assert!(json.get("lastStatusChange").is_some());
        assert!(json.get("user").is_some());
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            "in-progress"
        );
    }
}
