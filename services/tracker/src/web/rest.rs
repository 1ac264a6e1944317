//! services/tracker/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Reads are served from the shared feeds in `AppState`, so they reflect the
//! remote store while it is reachable and the local cache after a fallback.
//! Writes go through the family services and report where they landed.

use crate::web::auth;
use crate::web::state::{AppState, FeedSources};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use employee_tracker_core::analytics::{AdminOverview, DepartmentCount, EmployeeOverview, Performer};
use employee_tracker_core::analytics::{AttendanceSummary, TaskCounts};
use employee_tracker_core::domain::{
    Attendance, AttendanceStatus, EntityId, Message, MessageType, Priority, Review, ReviewScores, Role, Task,
    TaskStatus, User,
};
use employee_tracker_core::ports::PortError;
use employee_tracker_core::sync::{FeedSource, WriteOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::login_handler,
        list_employees_handler,
        create_employee_handler,
        get_employee_handler,
        update_employee_handler,
        delete_employee_handler,
        list_tasks_handler,
        create_task_handler,
        update_task_handler,
        update_task_status_handler,
        delete_task_handler,
        list_reviews_handler,
        submit_review_handler,
        delete_review_handler,
        list_messages_handler,
        conversation_handler,
        partners_handler,
        send_message_handler,
        mark_read_handler,
        read_conversation_handler,
        list_attendance_handler,
        mark_attendance_handler,
        update_attendance_handler,
        admin_dashboard_handler,
        employee_dashboard_handler,
    ),
    components(
        schemas(
            HealthResponse, FeedSources, FeedSource,
            User, Role, Task, Priority, TaskStatus, Review, ReviewScores, Message, MessageType,
            Attendance, AttendanceStatus,
            StatusUpdate, SubmitReviewRequest, SendMessageRequest, ReadConversationRequest,
            auth::LoginRequest,
            AdminOverview, EmployeeOverview, Performer, DepartmentCount, TaskCounts, AttendanceSummary
        )
    ),
    tags(
        (name = "Employee Tracker API", description = "Employees, tasks, reviews, messages and attendance.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    feeds: FeedSources,
}

/// New status for a task.
#[derive(Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: TaskStatus,
}

/// A performance review as entered by an admin. The overall rating is derived.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    pub employee_id: EntityId,
    pub date: String,
    pub scores: ReviewScores,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub reviewed_by: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: EntityId,
    pub receiver_id: EntityId,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub related_review_id: Option<EntityId>,
}

/// Marks everything `senderId` sent to `userId` as read.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadConversationRequest {
    pub user_id: EntityId,
    pub sender_id: EntityId,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EmployeeFilter {
    /// Only records belonging to this employee.
    pub employee_id: Option<EntityId>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub user_id: EntityId,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ConversationQuery {
    pub user_id: EntityId,
    pub other_id: EntityId,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    pub employee_id: Option<EntityId>,
    /// `YYYY-MM-DD`. Takes precedence over `employeeId`.
    pub date: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AdminQuery {
    /// Whose unread messages to count.
    pub admin_id: EntityId,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

pub(crate) fn port_failure(action: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
        PortError::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason),
        other => {
            error!("Failed to {}: {:?}", action, other);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to {action}"))
        }
    }
}

/// `202 Accepted` when the write only reached the local cache.
fn write_status<T>(outcome: &WriteOutcome<T>, success: StatusCode) -> StatusCode {
    if let WriteOutcome::LocalOnly { cause, .. } = outcome {
        warn!(cause = %cause, "write kept in the local cache only");
        StatusCode::ACCEPTED
    } else {
        success
    }
}

fn written<T: Serialize>(outcome: WriteOutcome<T>, success: StatusCode) -> (StatusCode, Json<WriteOutcome<T>>) {
    (write_status(&outcome, success), Json(outcome))
}

//=========================================================================================
// Health
//=========================================================================================

/// Reports where each shared feed is currently reading from.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        feeds: app_state.feeds.sources(),
    })
}

//=========================================================================================
// Employees
//=========================================================================================

#[utoipa::path(
    get,
    path = "/employees",
    responses((status = 200, description = "Every user with the employee role", body = [User]))
)]
pub async fn list_employees_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<User>> {
    let users = app_state.feeds.users.records();
    Json(users.iter().filter(|u| u.is_employee()).cloned().collect())
}

#[utoipa::path(
    post,
    path = "/employees",
    request_body = User,
    responses(
        (status = 201, description = "Employee stored remotely", body = WriteOutcome<User>),
        (status = 202, description = "Remote store unreachable; stored locally", body = WriteOutcome<User>),
        (status = 400, description = "Missing email")
    )
)]
pub async fn create_employee_handler(
    State(app_state): State<Arc<AppState>>,
    Json(user): Json<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .employees
        .add_employee(user)
        .await
        .map_err(|e| port_failure("add employee", e))?;
    Ok(written(outcome, StatusCode::CREATED))
}

#[utoipa::path(
    get,
    path = "/employees/{id}",
    params(("id" = i64, Path, description = "Employee id")),
    responses(
        (status = 200, description = "The employee", body = User),
        (status = 404, description = "No such employee")
    )
)]
pub async fn get_employee_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let from_feed = app_state.feeds.users.records().iter().find(|u| u.id == id).cloned();
    let user = match from_feed {
        Some(user) => Some(user),
        None => app_state
            .services
            .employees
            .employee(id)
            .await
            .map_err(|e| port_failure("load employee", e))?,
    };
    user.map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("employee {id} not found")))
}

#[utoipa::path(
    put,
    path = "/employees/{id}",
    params(("id" = i64, Path, description = "Employee id")),
    request_body = User,
    responses(
        (status = 200, description = "Employee replaced remotely", body = WriteOutcome<User>),
        (status = 202, description = "Remote store unreachable; replaced locally", body = WriteOutcome<User>)
    )
)]
pub async fn update_employee_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
    Json(user): Json<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .employees
        .update_employee(User { id, ..user })
        .await
        .map_err(|e| port_failure("update employee", e))?;
    Ok(written(outcome, StatusCode::OK))
}

#[utoipa::path(
    delete,
    path = "/employees/{id}",
    params(("id" = i64, Path, description = "Employee id")),
    responses((status = 200, description = "Employee and everything they own removed", body = WriteOutcome<i64>))
)]
pub async fn delete_employee_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .employees
        .delete_employee(id)
        .await
        .map_err(|e| port_failure("delete employee", e))?;
    Ok(written(outcome, StatusCode::OK))
}

//=========================================================================================
// Tasks
//=========================================================================================

#[utoipa::path(
    get,
    path = "/tasks",
    params(EmployeeFilter),
    responses((status = 200, description = "Tasks, optionally for one employee", body = [Task]))
)]
pub async fn list_tasks_handler(
    State(app_state): State<Arc<AppState>>,
    Query(filter): Query<EmployeeFilter>,
) -> Json<Vec<Task>> {
    let tasks = app_state.feeds.tasks.records();
    Json(
        tasks
            .iter()
            .filter(|t| filter.employee_id.map_or(true, |id| t.employee_id == id))
            .cloned()
            .collect(),
    )
}

#[utoipa::path(
    post,
    path = "/tasks",
    request_body = Task,
    responses(
        (status = 201, description = "Task stored remotely", body = WriteOutcome<Task>),
        (status = 202, description = "Remote store unreachable; stored locally", body = WriteOutcome<Task>),
        (status = 400, description = "Missing title")
    )
)]
pub async fn create_task_handler(
    State(app_state): State<Arc<AppState>>,
    Json(task): Json<Task>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .tasks
        .add_task(task)
        .await
        .map_err(|e| port_failure("add task", e))?;
    Ok(written(outcome, StatusCode::CREATED))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    request_body = Task,
    responses((status = 200, description = "Task replaced", body = WriteOutcome<Task>))
)]
pub async fn update_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
    Json(task): Json<Task>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .tasks
        .update_task(Task { id, ..task })
        .await
        .map_err(|e| port_failure("update task", e))?;
    Ok(written(outcome, StatusCode::OK))
}

#[utoipa::path(
    patch,
    path = "/tasks/{id}/status",
    params(("id" = i64, Path, description = "Task id")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Status changed", body = WriteOutcome<Task>),
        (status = 404, description = "No such task")
    )
)]
pub async fn update_task_status_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
    Json(update): Json<StatusUpdate>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .tasks
        .update_status(id, update.status)
        .await
        .map_err(|e| port_failure("update task status", e))?;
    Ok(written(outcome, StatusCode::OK))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses((status = 200, description = "Task removed", body = WriteOutcome<i64>))
)]
pub async fn delete_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .tasks
        .delete_task(id)
        .await
        .map_err(|e| port_failure("delete task", e))?;
    Ok(written(outcome, StatusCode::OK))
}

//=========================================================================================
// Reviews
//=========================================================================================

#[utoipa::path(
    get,
    path = "/reviews",
    params(EmployeeFilter),
    responses((status = 200, description = "Reviews, newest first", body = [Review]))
)]
pub async fn list_reviews_handler(
    State(app_state): State<Arc<AppState>>,
    Query(filter): Query<EmployeeFilter>,
) -> Json<Vec<Review>> {
    let reviews = app_state.feeds.reviews.records();
    Json(
        reviews
            .iter()
            .filter(|r| filter.employee_id.map_or(true, |id| r.employee_id == id))
            .cloned()
            .collect(),
    )
}

#[utoipa::path(
    post,
    path = "/reviews",
    request_body = SubmitReviewRequest,
    responses(
        (status = 201, description = "Review stored remotely", body = WriteOutcome<Review>),
        (status = 202, description = "Remote store unreachable; stored locally", body = WriteOutcome<Review>),
        (status = 400, description = "A score is outside 0..=5")
    )
)]
pub async fn submit_review_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .reviews
        .submit_review(
            request.employee_id,
            request.date,
            request.scores,
            request.remarks,
            request.reviewed_by,
        )
        .await
        .map_err(|e| port_failure("submit review", e))?;
    Ok(written(outcome, StatusCode::CREATED))
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    params(("id" = i64, Path, description = "Review id")),
    responses((status = 200, description = "Review removed", body = WriteOutcome<i64>))
)]
pub async fn delete_review_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .reviews
        .delete_review(id)
        .await
        .map_err(|e| port_failure("delete review", e))?;
    Ok(written(outcome, StatusCode::OK))
}

//=========================================================================================
// Messages
//=========================================================================================

#[utoipa::path(
    get,
    path = "/messages",
    params(UserQuery),
    responses((status = 200, description = "Everything the user sent or received, newest first", body = [Message]))
)]
pub async fn list_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<Vec<Message>> {
    let messages = app_state.feeds.messages.records();
    Json(messages.iter().filter(|m| m.involves(query.user_id)).cloned().collect())
}

#[utoipa::path(
    get,
    path = "/messages/conversation",
    params(ConversationQuery),
    responses((status = 200, description = "The exchange between two users, oldest first", body = [Message]))
)]
pub async fn conversation_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ConversationQuery>,
) -> Json<Vec<Message>> {
    let messages = app_state.feeds.messages.records();
    let mut thread: Vec<Message> = messages
        .iter()
        .filter(|m| m.is_between(query.user_id, query.other_id))
        .cloned()
        .collect();
    thread.sort_by_key(|m| (m.timestamp, m.id));
    Json(thread)
}

#[utoipa::path(
    get,
    path = "/messages/partners",
    params(UserQuery),
    responses((status = 200, description = "Ids of everyone the user has exchanged messages with", body = [i64]))
)]
pub async fn partners_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let partners = app_state
        .services
        .messages
        .partners(query.user_id)
        .await
        .map_err(|e| port_failure("list conversation partners", e))?;
    Ok(Json(partners))
}

#[utoipa::path(
    post,
    path = "/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored remotely", body = WriteOutcome<Message>),
        (status = 202, description = "Remote store unreachable; stored locally", body = WriteOutcome<Message>),
        (status = 400, description = "Empty message")
    )
)]
pub async fn send_message_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .messages
        .send(
            request.sender_id,
            request.receiver_id,
            request.message,
            request.message_type,
            request.related_review_id,
        )
        .await
        .map_err(|e| port_failure("send message", e))?;
    Ok(written(outcome, StatusCode::CREATED))
}

#[utoipa::path(
    post,
    path = "/messages/{id}/read",
    params(("id" = i64, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message marked read", body = WriteOutcome<Message>),
        (status = 404, description = "No such message")
    )
)]
pub async fn mark_read_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .messages
        .mark_read(id)
        .await
        .map_err(|e| port_failure("mark message read", e))?;
    Ok(written(outcome, StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/messages/read-conversation",
    request_body = ReadConversationRequest,
    responses((status = 200, description = "One outcome per message that was unread", body = [WriteOutcome<Message>]))
)]
pub async fn read_conversation_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ReadConversationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcomes = app_state
        .services
        .messages
        .mark_conversation_read(request.user_id, request.sender_id)
        .await
        .map_err(|e| port_failure("mark conversation read", e))?;
    Ok(Json(outcomes))
}

//=========================================================================================
// Attendance
//=========================================================================================

#[utoipa::path(
    get,
    path = "/attendance",
    params(AttendanceFilter),
    responses((status = 200, description = "Attendance marks, newest first", body = [Attendance]))
)]
pub async fn list_attendance_handler(
    State(app_state): State<Arc<AppState>>,
    Query(filter): Query<AttendanceFilter>,
) -> Json<Vec<Attendance>> {
    let marks = app_state.feeds.attendance.records();
    let selected = match (filter.date.as_deref(), filter.employee_id) {
        (Some(date), _) => marks.iter().filter(|a| a.date == date).cloned().collect(),
        (None, Some(id)) => marks.iter().filter(|a| a.employee_id == id).cloned().collect(),
        (None, None) => marks.to_vec(),
    };
    Json(selected)
}

#[utoipa::path(
    post,
    path = "/attendance",
    request_body = Attendance,
    responses(
        (status = 201, description = "Attendance stored remotely", body = WriteOutcome<Attendance>),
        (status = 202, description = "Remote store unreachable; stored locally", body = WriteOutcome<Attendance>),
        (status = 400, description = "Missing date")
    )
)]
pub async fn mark_attendance_handler(
    State(app_state): State<Arc<AppState>>,
    Json(attendance): Json<Attendance>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .attendance
        .mark_attendance(attendance)
        .await
        .map_err(|e| port_failure("mark attendance", e))?;
    Ok(written(outcome, StatusCode::CREATED))
}

#[utoipa::path(
    put,
    path = "/attendance/{id}",
    params(("id" = i64, Path, description = "Attendance id")),
    request_body = Attendance,
    responses((status = 200, description = "Attendance replaced", body = WriteOutcome<Attendance>))
)]
pub async fn update_attendance_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
    Json(attendance): Json<Attendance>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .services
        .attendance
        .update_attendance(Attendance { id, ..attendance })
        .await
        .map_err(|e| port_failure("update attendance", e))?;
    Ok(written(outcome, StatusCode::OK))
}

//=========================================================================================
// Dashboards
//=========================================================================================

#[utoipa::path(
    get,
    path = "/dashboard/admin",
    params(AdminQuery),
    responses((status = 200, description = "Organisation-wide figures", body = AdminOverview))
)]
pub async fn admin_dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<AdminQuery>,
) -> Json<AdminOverview> {
    let feeds = &app_state.feeds;
    Json(AdminOverview::compute(
        query.admin_id,
        &feeds.users.records(),
        &feeds.tasks.records(),
        &feeds.reviews.records(),
        &feeds.messages.records(),
    ))
}

#[utoipa::path(
    get,
    path = "/dashboard/employees/{id}",
    params(("id" = i64, Path, description = "Employee id")),
    responses((status = 200, description = "One employee's figures", body = EmployeeOverview))
)]
pub async fn employee_dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<EntityId>,
) -> Json<EmployeeOverview> {
    let feeds = &app_state.feeds;
    Json(EmployeeOverview::compute(
        id,
        &feeds.tasks.records(),
        &feeds.reviews.records(),
        &feeds.attendance.records(),
        &feeds.messages.records(),
    ))
}
