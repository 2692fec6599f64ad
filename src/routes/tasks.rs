use actix_web::{delete, get, patch, post, put, web, HttpResponse};

use crate::{
    auth::{AuthMiddleware, AuthenticatedUser},
    error::AppError,
    models::{CreateTaskRequest, ListTasksQuery, UpdateTaskRequest},
    response::ApiResponse,
    services::TaskService,
};

/// Retrieves a page of the authenticated user's active tasks.
///
/// ## Query Parameters:
/// - `status`, `priority` (optional): exact match; unknown values are rejected.
/// - `completed` (optional): `true` or `false`.
/// - `search` (optional): case-insensitive substring of the title or description.
/// - `sortBy`, `order` (optional): sort field and `asc`/`desc`. Defaults to `createdAt desc`.
/// - `page`, `limit` (optional): 1-indexed page and page size (10 by default, at most 100).
#[get("", wrap = "AuthMiddleware")]
pub async fn list_tasks(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    query: web::Query<ListTasksQuery>,
) -> Result<HttpResponse, AppError> {
    let list = service.list(user.0.user_id, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::paginated(list.tasks, list.pagination)))
}

/// Creates a task owned by the authenticated user.
#[post("", wrap = "AuthMiddleware")]
pub async fn create_task(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    body: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, AppError> {
    let task = service.create(user.0.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::with_message("Task created successfully", task)))
}

/// Lists the trash, most recently deleted first. Accepts `sortBy`, `order`,
/// `page` and `limit`.
#[get("/trash", wrap = "AuthMiddleware")]
pub async fn list_trash(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    query: web::Query<ListTasksQuery>,
) -> Result<HttpResponse, AppError> {
    let list = service.list_trash(user.0.user_id, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::paginated(list.tasks, list.pagination)))
}

/// Retrieves one active task.
///
/// ## Responses:
/// - `200 OK`: the task.
/// - `400 Bad Request`: `id` is not a valid id.
/// - `404 Not Found`: no such task, owned by someone else, or in the trash.
#[get("/{id}", wrap = "AuthMiddleware")]
pub async fn get_task(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let task = service.get(user.0.user_id, &task_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(task)))
}

/// Updates the whitelisted fields of an active task.
#[put("/{id}", wrap = "AuthMiddleware")]
pub async fn update_task(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<String>,
    body: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, AppError> {
    let task = service
        .update(user.0.user_id, &task_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Task updated successfully", task)))
}

/// Moves a task to the trash.
#[delete("/{id}", wrap = "AuthMiddleware")]
pub async fn delete_task(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let task = service.soft_delete(user.0.user_id, &task_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Task moved to trash", task)))
}

#[patch("/{id}/restore", wrap = "AuthMiddleware")]
pub async fn restore_task(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let task = service.restore(user.0.user_id, &task_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Task restored successfully", task)))
}

/// Permanently deletes a task from the trash. Irreversible.
#[delete("/{id}/permanent", wrap = "AuthMiddleware")]
pub async fn purge_task(
    service: web::Data<TaskService>,
    user: AuthenticatedUser,
    task_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    service.purge(user.0.user_id, &task_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Task permanently deleted")))
}
