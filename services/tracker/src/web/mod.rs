pub mod auth;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use crate::web::rest::*;
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, patch, post, put},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that builds the web server.
pub use ws_handler::ws_handler;

/// Builds the complete application: REST routes, the feed WebSocket and the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(app_state.config.cors_origin.as_deref());

    let api_router = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/employees", get(list_employees_handler).post(create_employee_handler))
        .route(
            "/employees/{id}",
            get(get_employee_handler)
                .put(update_employee_handler)
                .delete(delete_employee_handler),
        )
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/tasks/{id}", put(update_task_handler).delete(delete_task_handler))
        .route("/tasks/{id}/status", patch(update_task_status_handler))
        .route("/reviews", get(list_reviews_handler).post(submit_review_handler))
        .route("/reviews/{id}", axum::routing::delete(delete_review_handler))
        .route("/messages", get(list_messages_handler).post(send_message_handler))
        .route("/messages/conversation", get(conversation_handler))
        .route("/messages/partners", get(partners_handler))
        .route("/messages/read-conversation", post(read_conversation_handler))
        .route("/messages/{id}/read", post(mark_read_handler))
        .route("/attendance", get(list_attendance_handler).post(mark_attendance_handler))
        .route("/attendance/{id}", put(update_attendance_handler))
        .route("/dashboard/admin", get(admin_dashboard_handler))
        .route("/dashboard/employees/{id}", get(employee_dashboard_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    match origin.map(|o| (o, o.parse::<HeaderValue>())) {
        Some((_, Ok(value))) => cors.allow_origin(value),
        Some((raw, Err(_))) => {
            warn!(origin = raw, "CORS_ORIGIN is not a valid header value; allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}
