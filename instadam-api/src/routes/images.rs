use std::path::PathBuf;

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::auth::CurrentUser;
use crate::errors::{AppError, MsgResponse};
use crate::imaging::{thumbnail_png, validate_thumbnail_size};
use crate::models::{
    ImageResponse, ProjectImageEntry, ProjectImagesResponse, ThumbnailQuery, ThumbnailResponse,
    UnannotatedImageEntry, UnannotatedImagesResponse,
};
use crate::routes::access::{find_image, project_exists, require_read_access, require_write_access};
use crate::routes::AppState;
use crate::storage::{add_image, image_extension};
use crate::zip_import;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/image/upload/{project_id}", post(upload))
        .route("/image/upload/zip/{project_id}", post(upload_zip))
        .route("/image/{image_id}", get(get_one))
        .route("/image/{image_id}/thumbnail", get(thumbnail))
        .route("/projects/{project_id}/images", get(list_project_images))
        .route("/projects/{project_id}/unannotated", get(list_unannotated))
}

/// Pull the named file field out of a multipart body as `(file_name, bytes)`.
async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
) -> Result<Option<(String, Vec<u8>)>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request(format!("'{field_name}' must be a file")))?;
        let data = field.bytes().await?;
        return Ok(Some((file_name, data.to_vec())));
    }
    Ok(None)
}

#[utoipa::path(
    post, path = "/image/upload/{project_id}",
    tag = "Images",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body(content_type = "multipart/form-data", description = "File field `image` (png, jpg or jpeg)"),
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn upload(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<MsgResponse>, AppError> {
    require_write_access(&state.db, &current, project_id).await?;

    let (file_name, data) = read_file_field(&mut multipart, "image")
        .await?
        .ok_or_else(|| AppError::bad_request("Missing 'image' in request"))?;
    image_extension(&file_name)?;

    let stored = add_image(&state.db, &state.store, project_id, &file_name, &data).await?;

    tracing::info!("{} uploaded {} to project {project_id}", current.username, stored.name);
    Ok(MsgResponse::new("Image added successfully"))
}

#[utoipa::path(
    post, path = "/image/upload/zip/{project_id}",
    tag = "Images",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body(content_type = "multipart/form-data", description = "File field `zip` holding images"),
    responses(
        (status = 200, description = "Archive accepted, images are extracted in the background", body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn upload_zip(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<MsgResponse>, AppError> {
    require_write_access(&state.db, &current, project_id).await?;

    let (file_name, data) = read_file_field(&mut multipart, "zip")
        .await?
        .ok_or_else(|| AppError::bad_request("Missing 'zip' in request"))?;
    if !file_name.to_lowercase().ends_with(".zip") {
        return Err(AppError::bad_request(format!(
            "Invalid file extension for {file_name}"
        )));
    }

    let archive: PathBuf = state.store.save_archive(project_id, &data).await?;
    tracing::info!(
        "{} uploaded archive {file_name} to project {project_id}",
        current.username
    );
    zip_import::spawn(
        state.db.clone(),
        state.store.clone(),
        project_id,
        archive,
        state.max_upload_bytes,
    );

    Ok(MsgResponse::new(
        "Zip uploaded successfully, images will be added shortly",
    ))
}

#[utoipa::path(
    get, path = "/image/{image_id}",
    tag = "Images",
    params(("image_id" = i32, Path, description = "Image ID")),
    responses(
        (status = 200, body = ImageResponse),
        (status = 401, body = MsgResponse),
        (status = 404, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_one(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(image_id): Path<i32>,
) -> Result<Json<ImageResponse>, AppError> {
    let image = find_image(&state.db, image_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("No image found with id={image_id}")))?;
    require_read_access(&state.db, &current, image.project_id).await?;

    Ok(Json(image.into()))
}

#[utoipa::path(
    get, path = "/image/{image_id}/thumbnail",
    tag = "Images",
    params(
        ("image_id" = i32, Path, description = "Image ID"),
        ThumbnailQuery,
    ),
    responses(
        (status = 200, body = ThumbnailResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
        (status = 404, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn thumbnail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(image_id): Path<i32>,
    Query(q): Query<ThumbnailQuery>,
) -> Result<Json<ThumbnailResponse>, AppError> {
    validate_thumbnail_size(q.size_w, q.size_h)?;

    let image = find_image(&state.db, image_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("No image found with id={image_id}")))?;
    require_read_access(&state.db, &current, image.project_id).await?;

    let path = PathBuf::from(&image.image_storage_path);
    let png = tokio::task::spawn_blocking(move || thumbnail_png(&path, q.size_w, q.size_h))
        .await
        .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {e}")))??;

    Ok(Json(ThumbnailResponse {
        image_id,
        format: "png".into(),
        base64_image: STANDARD.encode(png),
    }))
}

#[utoipa::path(
    get, path = "/projects/{project_id}/images",
    tag = "Images",
    params(("project_id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, body = ProjectImagesResponse),
        (status = 401, body = MsgResponse),
        (status = 404, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_project_images(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
) -> Result<Json<ProjectImagesResponse>, AppError> {
    if !project_exists(&state.db, project_id).await? {
        return Err(AppError::not_found(format!("Project {project_id} not found")));
    }
    require_read_access(&state.db, &current, project_id).await?;

    let rows = sqlx::query_as::<_, ProjectImageEntry>(
        r#"SELECT i.id, i.image_name AS name, i.image_url AS path,
                  EXISTS (SELECT 1 FROM annotations a WHERE a.image_id = i.id) AS is_annotated
           FROM images i
           WHERE i.project_id = $1
           ORDER BY i.id"#,
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ProjectImagesResponse { project_images: rows }))
}

#[utoipa::path(
    get, path = "/projects/{project_id}/unannotated",
    tag = "Images",
    params(("project_id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, body = UnannotatedImagesResponse),
        (status = 401, body = MsgResponse),
        (status = 404, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_unannotated(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
) -> Result<Json<UnannotatedImagesResponse>, AppError> {
    if !project_exists(&state.db, project_id).await? {
        return Err(AppError::not_found(format!("Project {project_id} not found")));
    }
    require_read_access(&state.db, &current, project_id).await?;

    let rows = sqlx::query_as::<_, UnannotatedImageEntry>(
        r#"SELECT i.id, i.image_name AS name, i.image_url AS path
           FROM images i
           WHERE i.project_id = $1
             AND NOT EXISTS (SELECT 1 FROM annotations a WHERE a.image_id = i.id)
           ORDER BY i.id"#,
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(UnannotatedImagesResponse {
        unannotated_images: rows,
    }))
}
