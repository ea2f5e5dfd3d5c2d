use std::collections::BTreeSet;
use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;

use crate::auth::CurrentUser;
use crate::errors::{AppError, MsgResponse};
use crate::imaging::{dimensions_from_bytes, dimensions_from_path};
use crate::models::{Annotation, AnnotationResponse, SaveAnnotationRequest};
use crate::routes::access::{find_image, require_read_access};
use crate::routes::{AppState, JsonBody};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/annotation/", post(save))
        .route("/annotation/{image_id}/", get(list_for_image))
}

struct DecodedMask {
    label_id: i32,
    data: Vec<u8>,
    vector: serde_json::Value,
}

#[utoipa::path(
    post, path = "/annotation/",
    tag = "Annotations",
    request_body = SaveAnnotationRequest,
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn save(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(input): JsonBody<SaveAnnotationRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    let project_id = input.project_id;
    require_read_access(&state.db, &current, project_id).await?;

    if input.labels.is_empty() {
        return Err(AppError::bad_request("No labels provided"));
    }

    let image = find_image(&state.db, input.image_id)
        .await?
        .filter(|img| img.project_id == project_id)
        .ok_or_else(|| AppError::bad_request("Invalid label or image"))?;

    let wanted: BTreeSet<i32> = input.labels.iter().map(|l| l.label_id).collect();
    if wanted.len() != input.labels.len() {
        return Err(AppError::bad_request("Duplicate label in request"));
    }
    let ids: Vec<i32> = wanted.iter().copied().collect();
    let found: Vec<(i32,)> =
        sqlx::query_as("SELECT id FROM labels WHERE project_id = $1 AND id = ANY($2)")
            .bind(project_id)
            .bind(&ids)
            .fetch_all(&state.db)
            .await?;
    if found.len() != ids.len() {
        return Err(AppError::bad_request("Invalid label or image"));
    }

    let mut masks = Vec::with_capacity(input.labels.len());
    for label in input.labels {
        let data = STANDARD
            .decode(label.bitmap.as_bytes())
            .map_err(|_| AppError::bad_request("Bitmap is not valid base64"))?;
        let vector = if label.vector.is_null() {
            json!({})
        } else {
            label.vector
        };
        masks.push(DecodedMask {
            label_id: label.label_id,
            data,
            vector,
        });
    }

    // Decoding is CPU-bound; check every mask against the stored image off the runtime.
    let storage_path = PathBuf::from(&image.image_storage_path);
    let masks = tokio::task::spawn_blocking(move || -> Result<Vec<DecodedMask>, AppError> {
        let expected = dimensions_from_path(&storage_path).ok();
        for mask in &masks {
            let dims = dimensions_from_bytes(&mask.data)?;
            if expected.is_some_and(|e| e != dims) {
                return Err(AppError::bad_request("Annotation shape does not match image"));
            }
        }
        Ok(masks)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Mask validation failed: {e}")))??;

    let mut tx = state.db.begin().await?;
    for mask in &masks {
        sqlx::query(
            r#"INSERT INTO annotations (project_id, image_id, label_id, creator_id, data, vector)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (image_id, label_id) DO UPDATE
               SET data = EXCLUDED.data,
                   vector = EXCLUDED.vector,
                   creator_id = EXCLUDED.creator_id,
                   updated_at = now()"#,
        )
        .bind(project_id)
        .bind(image.id)
        .bind(mask.label_id)
        .bind(current.id)
        .bind(&mask.data)
        .bind(&mask.vector)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        "{} saved {} annotation(s) on image {}",
        current.username,
        masks.len(),
        image.id
    );
    Ok(MsgResponse::new("Annotation saved successfully"))
}

#[utoipa::path(
    get, path = "/annotation/{image_id}/",
    tag = "Annotations",
    params(("image_id" = i32, Path, description = "Image ID")),
    responses(
        (status = 200, body = Vec<AnnotationResponse>),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_for_image(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(image_id): Path<i32>,
) -> Result<Json<Vec<AnnotationResponse>>, AppError> {
    let image = find_image(&state.db, image_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid image id"))?;
    require_read_access(&state.db, &current, image.project_id).await?;

    let rows = sqlx::query_as::<_, Annotation>(
        "SELECT * FROM annotations WHERE image_id = $1 ORDER BY label_id",
    )
    .bind(image_id)
    .fetch_all(&state.db)
    .await?;

    let annotations = rows
        .into_iter()
        .map(|a| AnnotationResponse {
            annotation_id: a.id,
            label_id: a.label_id,
            bitmap: STANDARD.encode(&a.data),
            vector: a.vector,
            creator_id: a.creator_id,
            updated_at: a.updated_at,
        })
        .collect();

    Ok(Json(annotations))
}
