use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::NotificationId;
use super::service::{NotificationError, Notifier};
use crate::store::DocumentStore;
use crate::workflows::users::domain::UserId;

/// Router exposing the notification feed and the read receipt endpoint.
pub fn notification_router<S>(notifier: Arc<Notifier<S>>) -> Router
where
    S: DocumentStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/users/:user_id/notifications",
            get(list_handler::<S>),
        )
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_read_handler::<S>),
        )
        .with_state(notifier)
}

async fn list_handler<S>(
    State(notifier): State<Arc<Notifier<S>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
{
    match notifier.user_notifications(&UserId(user_id)).await {
        Ok(notifications) => (StatusCode::OK, axum::Json(notifications)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn mark_read_handler<S>(
    State(notifier): State<Arc<Notifier<S>>>,
    Path(notification_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
{
    match notifier.mark_as_read(&NotificationId(notification_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: NotificationError) -> Response {
    let status = match err {
        NotificationError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
