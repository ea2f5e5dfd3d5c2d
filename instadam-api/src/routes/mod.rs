pub mod access;
pub mod annotations;
pub mod auth_routes;
pub mod images;
pub mod labels;
pub mod messages;
pub mod projects;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{verify_token, CurrentUser};
use crate::db::Db;
use crate::errors::AppError;
use crate::models::User;
use crate::openapi::ApiDoc;
use crate::storage::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub store: ImageStore,
    pub max_upload_bytes: usize,
}

/// `axum::Json` whose rejections are rendered as `400 {"msg": ...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Auth middleware: require `Authorization: Bearer <jwt>`, reject revoked
/// tokens, and insert the caller's [`CurrentUser`] into request extensions.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Missing Authorization Header"))?;
    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::unauthorized("Expected 'Authorization: Bearer <token>' header")
        })?;

    let claims = verify_token(token, &state.jwt_secret)?;

    let revoked: Option<(i32,)> = sqlx::query_as("SELECT id FROM revoked_tokens WHERE jti = $1")
        .bind(&claims.jti)
        .fetch_optional(&state.db)
        .await?;
    if revoked.is_some() {
        return Err(AppError::unauthorized("Token has been revoked"));
    }

    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| AppError::unauthorized("Invalid token subject"))?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    req.extensions_mut()
        .insert(CurrentUser::from_user(&user, claims.jti));
    Ok(next.run(req).await)
}

/// Full application router: public auth routes, protected API routes, static
/// image files and the OpenAPI UI.
pub fn app(state: AppState) -> Router {
    let public_routes = auth_routes::router();

    let api_routes = Router::new()
        .merge(auth_routes::protected_router())
        .merge(users::router())
        .merge(projects::router())
        .merge(labels::router())
        .merge(images::router())
        .merge(annotations::router())
        .merge(messages::router())
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth));

    let static_path = format!("/{}", state.store.url_prefix());
    let static_files = ServeDir::new(state.store.root());

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(public_routes)
        .merge(api_routes)
        .nest_service(&static_path, static_files)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
