//! Project permission lookups shared by the project-scoped handlers.

use crate::auth::CurrentUser;
use crate::db::Db;
use crate::errors::AppError;
use crate::models::{AccessType, Image, ProjectPermission};

pub async fn find_permission(
    db: &Db,
    user_id: i32,
    project_id: i32,
) -> Result<Option<ProjectPermission>, AppError> {
    let row = sqlx::query_as::<_, ProjectPermission>(
        "SELECT * FROM project_permissions WHERE user_id = $1 AND project_id = $2",
    )
    .bind(user_id)
    .bind(project_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Any permission on the project (`r` or `rw`). Returns the caller's level.
pub async fn require_read_access(
    db: &Db,
    user: &CurrentUser,
    project_id: i32,
) -> Result<AccessType, AppError> {
    find_permission(db, user.id, project_id)
        .await?
        .and_then(|p| p.access())
        .ok_or_else(|| AppError::unauthorized("User does not have read access to this project"))
}

/// An `rw` permission on the project.
pub async fn require_write_access(
    db: &Db,
    user: &CurrentUser,
    project_id: i32,
) -> Result<(), AppError> {
    match require_read_access(db, user, project_id).await {
        Ok(AccessType::ReadWrite) => Ok(()),
        _ => Err(AppError::unauthorized(
            "User does not have read write access to this project",
        )),
    }
}

pub async fn project_exists(db: &Db, project_id: i32) -> Result<bool, AppError> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT id FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

pub async fn find_image(db: &Db, image_id: i32) -> Result<Option<Image>, AppError> {
    let row = sqlx::query_as::<_, Image>("SELECT * FROM images WHERE id = $1")
        .bind(image_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}
