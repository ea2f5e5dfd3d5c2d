use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};

use crate::auth::CurrentUser;
use crate::errors::{AppError, MsgResponse};
use crate::models::{CreateLabel, Label, LabelCreated, LabelEntry, LabelList};
use crate::routes::access::{require_read_access, require_write_access};
use crate::routes::{AppState, JsonBody};
use crate::validation::validate_label_color;

const MAX_LABEL_TEXT_LEN: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new().route("/project/{project_id}/labels", get(list).post(create))
}

#[utoipa::path(
    post, path = "/project/{project_id}/labels",
    tag = "Labels",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body = CreateLabel,
    responses(
        (status = 200, body = LabelCreated),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
    JsonBody(input): JsonBody<CreateLabel>,
) -> Result<Json<LabelCreated>, AppError> {
    require_write_access(&state.db, &current, project_id).await?;

    let text = input.label_text.trim();
    if text.is_empty() || text.chars().count() > MAX_LABEL_TEXT_LEN {
        return Err(AppError::bad_request(format!(
            "Label text must be 1 to {MAX_LABEL_TEXT_LEN} characters"
        )));
    }
    validate_label_color(&input.label_color)?;

    let label = sqlx::query_as::<_, Label>(
        "INSERT INTO labels (project_id, label_text, label_color) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(project_id)
    .bind(text)
    .bind(&input.label_color)
    .fetch_one(&state.db)
    .await?;

    tracing::info!("Added label {} to project {project_id}", label.id);
    Ok(Json(LabelCreated { label_id: label.id }))
}

#[utoipa::path(
    get, path = "/project/{project_id}/labels",
    tag = "Labels",
    params(("project_id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, body = LabelList),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
) -> Result<Json<LabelList>, AppError> {
    require_read_access(&state.db, &current, project_id).await?;

    let rows = sqlx::query_as::<_, Label>("SELECT * FROM labels WHERE project_id = $1 ORDER BY id")
        .bind(project_id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(LabelList {
        labels: rows.into_iter().map(LabelEntry::from).collect(),
    }))
}
