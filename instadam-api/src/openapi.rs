use utoipa::OpenApi;

use crate::errors::MsgResponse;
use crate::models::{
    AccessRequest, AccessType, AnnotationLabel, AnnotationResponse, ChangePrivilegeRequest,
    CreateLabel, CreateProject, CreateProjectResponse, ImageResponse, LabelCreated, LabelEntry,
    LabelList, LoginRequest, MessageEntry, MessageList, MessageType, Privilege, ProjectImageEntry,
    ProjectImagesResponse, ProjectListEntry, ProjectMember, RegisterRequest,
    RevokePermissionRequest, SaveAnnotationRequest, ThumbnailResponse, TokenResponse,
    UnannotatedImageEntry, UnannotatedImagesResponse, UpdatePermissionRequest,
    UpdateProfileRequest, UserResponse, UserSearchResponse, UserSummary,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "InstaDam API",
        version = "0.1.0",
        description = "Image annotation backend: projects, images, labels and masks"
    ),
    paths(
        // Auth
        crate::routes::auth_routes::login,
        crate::routes::auth_routes::register,
        crate::routes::auth_routes::logout,
        // Users
        crate::routes::users::search,
        crate::routes::users::change_privilege,
        crate::routes::users::me,
        crate::routes::users::update_profile,
        // Projects
        crate::routes::projects::create,
        crate::routes::projects::list,
        crate::routes::projects::delete_project,
        crate::routes::projects::list_users,
        crate::routes::projects::update_permission,
        crate::routes::projects::revoke_permission,
        // Labels
        crate::routes::labels::create,
        crate::routes::labels::list,
        // Images
        crate::routes::images::upload,
        crate::routes::images::upload_zip,
        crate::routes::images::get_one,
        crate::routes::images::thumbnail,
        crate::routes::images::list_project_images,
        crate::routes::images::list_unannotated,
        // Annotations
        crate::routes::annotations::save,
        crate::routes::annotations::list_for_image,
        // Messages
        crate::routes::messages::request_access,
        crate::routes::messages::inbox,
        crate::routes::messages::fulfill,
    ),
    components(schemas(
        MsgResponse,
        Privilege, AccessType, MessageType,
        RegisterRequest, LoginRequest, TokenResponse,
        UserResponse, UserSummary, UserSearchResponse, ChangePrivilegeRequest, UpdateProfileRequest,
        CreateProject, CreateProjectResponse, ProjectListEntry, ProjectMember,
        UpdatePermissionRequest, RevokePermissionRequest,
        CreateLabel, LabelCreated, LabelEntry, LabelList,
        ImageResponse, ProjectImageEntry, ProjectImagesResponse,
        UnannotatedImageEntry, UnannotatedImagesResponse, ThumbnailResponse,
        AnnotationLabel, SaveAnnotationRequest, AnnotationResponse,
        AccessRequest, MessageEntry, MessageList,
    )),
    tags(
        (name = "Auth", description = "Registration, login and logout"),
        (name = "Users", description = "User search, privileges and profile"),
        (name = "Projects", description = "Projects and per-project permissions"),
        (name = "Labels", description = "Project labels"),
        (name = "Images", description = "Image upload, listing and thumbnails"),
        (name = "Annotations", description = "Per-image, per-label annotation masks"),
        (name = "Messages", description = "Project access requests"),
    )
)]
pub struct ApiDoc;
