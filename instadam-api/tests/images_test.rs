mod common;

use std::io::{Cursor, Write};
use std::time::Duration;

use axum::{body::Body, http::Request};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tower::ServiceExt;
use zip::write::FileOptions;

#[tokio::test]
async fn test_upload_image() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "uploads").await;

    let (status, json) = common::upload_file(
        &app.router,
        &format!("/image/upload/{project_id}"),
        &admin,
        "image",
        "Photo.JPG",
        &common::png_bytes(4, 4),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["msg"], "Image added successfully");

    let (image_id, storage_path): (i32, String) =
        sqlx::query_as("SELECT id, image_storage_path FROM images WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert!(std::path::Path::new(&storage_path).exists());
    assert!(storage_path.ends_with(".jpg"));

    let (status, json) = common::request_with_token(
        &app.router,
        "GET",
        &format!("/image/{image_id}"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["id"].as_i64().unwrap() as i32, image_id);
    assert_eq!(json["name"], "Photo.JPG");
    assert_eq!(json["project_id"].as_i64().unwrap() as i32, project_id);
    let path = json["path"].as_str().unwrap().to_string();
    assert!(path.starts_with(&format!("{}/{project_id}/", common::STORAGE_URL)));

    // The stored file is served back under the storage URL prefix.
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(format!("/{path}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_upload_image_errors() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "uploads").await;
    let uri = format!("/image/upload/{project_id}");

    let (status, json) =
        common::upload_file(&app.router, &uri, &admin, "file", "a.png", b"data").await;
    assert_eq!(status, 400);
    assert_eq!(json["msg"], "Missing 'image' in request");

    let (status, json) =
        common::upload_file(&app.router, &uri, &admin, "image", "notes.txt", b"data").await;
    assert_eq!(status, 400);
    assert_eq!(json["msg"], "Invalid file extension for notes.txt");

    let (status, _) = common::upload_file(
        &app.router,
        &format!("/image/upload/{}", project_id + 100),
        &admin,
        "image",
        "a.png",
        b"data",
    )
    .await;
    assert_eq!(status, 401);

    let (reader, token) = common::user_with_token(&app, "reader", "annotator").await;
    common::grant(&app.pool, reader, project_id, "r").await;
    let (status, _) =
        common::upload_file(&app.router, &uri, &token, "image", "a.png", b"data").await;
    assert_eq!(status, 401);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_get_unknown_image() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;

    let (status, json) =
        common::request_with_token(&app.router, "GET", "/image/4242", &admin, None).await;
    assert_eq!(status, 404);
    assert!(json["msg"].is_string());

    let (status, _) =
        common::request_with_token(&app.router, "GET", "/image/4242/thumbnail", &admin, None)
            .await;
    assert_eq!(status, 404);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_image_requires_read_access() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "private").await;
    let image_id = common::upload_png(&app, &admin, project_id, 4, 4).await;
    let (_, token) = common::user_with_token(&app, "outsider", "annotator").await;

    let (status, _) = common::request_with_token(
        &app.router,
        "GET",
        &format!("/image/{image_id}"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, 401);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_thumbnail() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "thumbs").await;
    let image_id = common::upload_png(&app, &admin, project_id, 64, 32).await;

    let (status, json) = common::request_with_token(
        &app.router,
        "GET",
        &format!("/image/{image_id}/thumbnail?size_w=16&size_h=16"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["image_id"].as_i64().unwrap() as i32, image_id);
    assert_eq!(json["format"], "png");

    let bytes = STANDARD.decode(json["base64_image"].as_str().unwrap()).unwrap();
    let thumb = image::load_from_memory(&bytes).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (16, 8));

    let (status, _) = common::request_with_token(
        &app.router,
        "GET",
        &format!("/image/{image_id}/thumbnail?size_w=0&size_h=16"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, 400);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_list_project_images() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "listing").await;
    let first = common::upload_png(&app, &admin, project_id, 4, 4).await;
    let second = common::upload_png(&app, &admin, project_id, 4, 4).await;
    let label_id = common::create_label(&app.router, &admin, project_id, "thing").await;

    let (status, _) = common::request_with_token(
        &app.router,
        "POST",
        "/annotation/",
        &admin,
        Some(serde_json::json!({
            "project_id": project_id,
            "image_id": first,
            "labels": [{ "label_id": label_id, "bitmap": STANDARD.encode(common::png_bytes(4, 4)) }]
        })),
    )
    .await;
    assert_eq!(status, 200);

    let (status, json) = common::request_with_token(
        &app.router,
        "GET",
        &format!("/projects/{project_id}/images"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, 200);
    let images = json["project_images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["id"].as_i64().unwrap() as i32, first);
    assert_eq!(images[0]["is_annotated"], true);
    assert_eq!(images[1]["is_annotated"], false);

    let (status, json) = common::request_with_token(
        &app.router,
        "GET",
        &format!("/projects/{project_id}/unannotated"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, 200);
    let images = json["unannotated_images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["id"].as_i64().unwrap() as i32, second);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_list_images_unknown_project() {
    let app = common::setup().await;
    let (_, token) = common::user_with_token(&app, "nobody", "annotator").await;

    // Existence is checked before permissions.
    let (status, _) =
        common::request_with_token(&app.router, "GET", "/projects/999/images", &token, None).await;
    assert_eq!(status, 404);
    let (status, _) =
        common::request_with_token(&app.router, "GET", "/projects/999/unannotated", &token, None)
            .await;
    assert_eq!(status, 404);

    common::cleanup(&app.pool).await;
}

async fn image_count(app: &common::TestApp, project_id: i32) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    row.0
}

/// Uploaded archives still sitting in the project directory.
fn archives_left(app: &common::TestApp, project_id: i32) -> usize {
    let dir = app.storage.path().join(project_id.to_string());
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with("upload-") && name.ends_with(".zip")
        })
        .count()
}

fn zip_with_images() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    writer.start_file("set/one.png", options).unwrap();
    writer.write_all(&common::png_bytes(2, 2)).unwrap();
    writer.start_file("set/two.jpeg", options).unwrap();
    writer.write_all(&common::png_bytes(2, 2)).unwrap();
    writer.start_file("__MACOSX/set/._one.png", options).unwrap();
    writer.write_all(b"junk").unwrap();
    writer.start_file("readme.md", options).unwrap();
    writer.write_all(b"ignored").unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_upload_zip_imports_in_background() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "zipped").await;

    let (status, json) = common::upload_file(
        &app.router,
        &format!("/image/upload/zip/{project_id}"),
        &admin,
        "zip",
        "set.zip",
        &zip_with_images(),
    )
    .await;
    assert_eq!(status, 200);
    assert!(json["msg"].is_string());

    let mut count = 0i64;
    for _ in 0..50 {
        count = image_count(&app, project_id).await;
        if count == 2 && archives_left(&app, project_id) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(count, 2);
    assert_eq!(archives_left(&app, project_id), 0);

    let mut names: Vec<(String,)> =
        sqlx::query_as("SELECT image_name FROM images WHERE project_id = $1")
            .bind(project_id)
            .fetch_all(&app.pool)
            .await
            .unwrap();
    names.sort();
    assert_eq!(names, vec![("one.png".to_string(),), ("two.jpeg".to_string(),)]);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_upload_zip_rejects_other_files() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "zipped").await;
    let uri = format!("/image/upload/zip/{project_id}");

    let (status, _) =
        common::upload_file(&app.router, &uri, &admin, "zip", "set.tar", b"data").await;
    assert_eq!(status, 400);

    let (status, json) =
        common::upload_file(&app.router, &uri, &admin, "image", "set.zip", b"data").await;
    assert_eq!(status, 400);
    assert_eq!(json["msg"], "Missing 'zip' in request");

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_upload_zip_removes_unreadable_archive() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "zipped").await;

    let (status, _) = common::upload_file(
        &app.router,
        &format!("/image/upload/zip/{project_id}"),
        &admin,
        "zip",
        "set.zip",
        b"not a zip",
    )
    .await;
    assert_eq!(status, 200);

    for _ in 0..50 {
        if archives_left(&app, project_id) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(archives_left(&app, project_id), 0);
    assert_eq!(image_count(&app, project_id).await, 0);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_upload_zip_skips_bad_entries() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "zipped").await;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    writer.start_file(format!("{}.png", "a".repeat(300)), options).unwrap();
    writer.write_all(&common::png_bytes(2, 2)).unwrap();
    writer.start_file("fine.png", options).unwrap();
    writer.write_all(&common::png_bytes(2, 2)).unwrap();
    let archive = writer.finish().unwrap().into_inner();

    let (status, _) = common::upload_file(
        &app.router,
        &format!("/image/upload/zip/{project_id}"),
        &admin,
        "zip",
        "set.zip",
        &archive,
    )
    .await;
    assert_eq!(status, 200);

    for _ in 0..50 {
        if archives_left(&app, project_id) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(archives_left(&app, project_id), 0);

    let names: Vec<(String,)> = sqlx::query_as("SELECT image_name FROM images WHERE project_id = $1")
        .bind(project_id)
        .fetch_all(&app.pool)
        .await
        .unwrap();
    assert_eq!(names, vec![("fine.png".to_string(),)]);

    // Only the accepted image was written to disk.
    let files = std::fs::read_dir(app.storage.path().join(project_id.to_string()))
        .unwrap()
        .count();
    assert_eq!(files, 1);

    common::cleanup(&app.pool).await;
}

#[tokio::test]
async fn test_upload_rejects_long_file_name() {
    let app = common::setup().await;
    let admin = common::login_admin(&app.router).await;
    let project_id = common::create_project(&app.router, &admin, "uploads").await;

    let name = format!("{}.png", "a".repeat(300));
    let (status, json) = common::upload_file(
        &app.router,
        &format!("/image/upload/{project_id}"),
        &admin,
        "image",
        &name,
        &common::png_bytes(2, 2),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(json["msg"], "File name must be at most 256 characters");

    assert_eq!(image_count(&app, project_id).await, 0);
    assert!(!app.storage.path().join(project_id.to_string()).exists());

    common::cleanup(&app.pool).await;
}
