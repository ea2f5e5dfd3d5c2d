use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};

use crate::auth::CurrentUser;
use crate::errors::{AppError, MsgResponse};
use crate::models::{AccessRequest, Message, MessageEntry, MessageList, MessageType};
use crate::routes::access::{project_exists, require_write_access};
use crate::routes::{AppState, JsonBody};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/project/{project_id}/request", post(request_access))
        .route("/messages", get(inbox))
        .route("/messages/{message_id}/fulfill", put(fulfill))
}

#[utoipa::path(
    post, path = "/project/{project_id}/request",
    tag = "Messages",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body = AccessRequest,
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 404, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn request_access(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
    JsonBody(input): JsonBody<AccessRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    if !project_exists(&state.db, project_id).await? {
        return Err(AppError::not_found(format!("Project {project_id} not found")));
    }
    let message_type = MessageType::parse(&input.message_type)
        .ok_or_else(|| AppError::bad_request("Not able to interpret message_type."))?;

    let mut tx = state.db.begin().await?;

    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (sender_id, project_id, message_type) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(current.id)
    .bind(project_id)
    .bind(message_type.as_str())
    .fetch_one(&mut *tx)
    .await?;

    let receivers = sqlx::query(
        r#"INSERT INTO message_receivers (message_id, receiver_id)
           SELECT $1, user_id FROM project_permissions
           WHERE project_id = $2 AND access_type = 'rw'"#,
    )
    .bind(message.id)
    .bind(project_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    tracing::info!(
        "{} requested {} on project {project_id} ({receivers} receivers)",
        current.username,
        message_type.as_str()
    );
    Ok(MsgResponse::new("Message sent successfully"))
}

#[utoipa::path(
    get, path = "/messages",
    tag = "Messages",
    responses(
        (status = 200, body = MessageList),
    ),
    security(("bearer" = []))
)]
pub async fn inbox(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<MessageList>, AppError> {
    let messages = sqlx::query_as::<_, MessageEntry>(
        r#"SELECT m.id, u.username AS sender, m.project_id, m.message_type, m.fulfilled, m.created_at
           FROM messages m
           JOIN message_receivers r ON r.message_id = m.id
           JOIN users u ON u.id = m.sender_id
           WHERE r.receiver_id = $1
           ORDER BY m.created_at DESC, m.id DESC"#,
    )
    .bind(current.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(MessageList { messages }))
}

#[utoipa::path(
    put, path = "/messages/{message_id}/fulfill",
    tag = "Messages",
    params(("message_id" = i32, Path, description = "Message ID")),
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn fulfill(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(message_id): Path<i32>,
) -> Result<Json<MsgResponse>, AppError> {
    let message = sqlx::query_as::<_, Message>(
        r#"SELECT m.* FROM messages m
           JOIN message_receivers r ON r.message_id = m.id
           WHERE m.id = $1 AND r.receiver_id = $2"#,
    )
    .bind(message_id)
    .bind(current.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::unauthorized("User is not a receiver of this message"))?;

    require_write_access(&state.db, &current, message.project_id).await?;

    let requested = MessageType::parse(&message.message_type)
        .map(|t| t.requested_access())
        .ok_or_else(|| AppError::Internal(format!("Unknown message type {}", message.message_type)))?;

    let mut tx = state.db.begin().await?;
    // Claiming the message first serialises concurrent fulfilments.
    let claimed = sqlx::query("UPDATE messages SET fulfilled = true WHERE id = $1 AND NOT fulfilled")
        .bind(message.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if claimed == 0 {
        return Err(AppError::bad_request("Message already fulfilled"));
    }

    // Only ever upgrades: an existing rw row is left alone.
    sqlx::query(
        r#"INSERT INTO project_permissions (user_id, project_id, access_type)
           VALUES ($1, $2, $3)
           ON CONFLICT (user_id, project_id) DO UPDATE
           SET access_type = EXCLUDED.access_type
           WHERE project_permissions.access_type = 'r'"#,
    )
    .bind(message.sender_id)
    .bind(message.project_id)
    .bind(requested.as_str())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        "{} fulfilled message {} granting {} on project {}",
        current.username,
        message.id,
        requested.as_str(),
        message.project_id
    );
    Ok(MsgResponse::new("Request fulfilled successfully"))
}
