pub mod query;
pub mod task;
pub mod user;

pub use query::{ListTasksQuery, PageRequest, SortField, SortOrder, TaskFilter, TaskScope, TaskSort};
pub use task::{
    CreateTaskRequest, NewTask, Task, TaskChanges, TaskPriority, TaskStatus, UpdateTaskRequest,
};
pub use user::{NewUser, PublicUser, User};
