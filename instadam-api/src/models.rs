use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ─── Enumerations ───────────────────────────────────────

/// Global user privilege. Admins may create projects and manage users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Admin,
    Annotator,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::Admin => "admin",
            Privilege::Annotator => "annotator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Privilege::Admin),
            "annotator" => Some(Privilege::Annotator),
            _ => None,
        }
    }
}

/// Per-project access level stored in `project_permissions.access_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum AccessType {
    #[serde(rename = "r")]
    ReadOnly,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::ReadOnly => "r",
            AccessType::ReadWrite => "rw",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "r" => Some(AccessType::ReadOnly),
            "rw" => Some(AccessType::ReadWrite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MessageType {
    #[serde(rename = "r_request")]
    ReadOnlyRequest,
    #[serde(rename = "rw_request")]
    ReadWriteRequest,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::ReadOnlyRequest => "r_request",
            MessageType::ReadWriteRequest => "rw_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "r_request" => Some(MessageType::ReadOnlyRequest),
            "rw_request" => Some(MessageType::ReadWriteRequest),
            _ => None,
        }
    }

    /// Access level granted when the request is fulfilled.
    pub fn requested_access(&self) -> AccessType {
        match self {
            MessageType::ReadOnlyRequest => AccessType::ReadOnly,
            MessageType::ReadWriteRequest => AccessType::ReadWrite,
        }
    }
}

// ─── Users & Auth ────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub privileges: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Unknown values in the column are treated as the least privileged role.
    pub fn privilege(&self) -> Privilege {
        Privilege::parse(&self.privileges).unwrap_or(Privilege::Annotator)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub privileges: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            privileges: u.privileges,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Public view of a user as returned by search and project member listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub privileges: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            username: u.username,
            email: u.email,
            created_at: u.created_at,
            privileges: u.privileges,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserSearchQuery {
    /// Substring matched against username and email
    pub q: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSearchResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePrivilegeRequest {
    pub username: String,
    pub privilege: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub current_password: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// ─── Projects ────────────────────────────────────────────

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Project {
    pub id: i32,
    pub project_name: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectPermission {
    pub id: i32,
    pub user_id: i32,
    pub project_id: i32,
    pub access_type: String,
}

impl ProjectPermission {
    pub fn access(&self) -> Option<AccessType> {
        AccessType::parse(&self.access_type)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProject {
    pub project_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateProjectResponse {
    pub project_id: i32,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ProjectListEntry {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectMember {
    pub access_type: String,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePermissionRequest {
    pub username: String,
    pub access_type: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokePermissionRequest {
    pub username: String,
}

// ─── Labels ──────────────────────────────────────────────

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Label {
    pub id: i32,
    pub project_id: i32,
    pub label_text: String,
    pub label_color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLabel {
    pub label_text: String,
    pub label_color: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LabelCreated {
    pub label_id: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LabelEntry {
    pub label_id: i32,
    pub text: String,
    pub color: String,
}

impl From<Label> for LabelEntry {
    fn from(l: Label) -> Self {
        Self {
            label_id: l.id,
            text: l.label_text,
            color: l.label_color,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LabelList {
    pub labels: Vec<LabelEntry>,
}

// ─── Images ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Image {
    pub id: i32,
    pub project_id: i32,
    pub image_name: String,
    pub image_url: String,
    pub image_storage_path: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageResponse {
    pub id: i32,
    pub name: String,
    pub path: String,
    pub project_id: i32,
}

impl From<Image> for ImageResponse {
    fn from(i: Image) -> Self {
        Self {
            id: i.id,
            name: i.image_name,
            path: i.image_url,
            project_id: i.project_id,
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ProjectImageEntry {
    pub id: i32,
    pub name: String,
    pub path: String,
    pub is_annotated: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectImagesResponse {
    pub project_images: Vec<ProjectImageEntry>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct UnannotatedImageEntry {
    pub id: i32,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnannotatedImagesResponse {
    pub unannotated_images: Vec<UnannotatedImageEntry>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ThumbnailQuery {
    #[serde(default = "default_thumbnail_size")]
    pub size_w: u32,
    #[serde(default = "default_thumbnail_size")]
    pub size_h: u32,
}

fn default_thumbnail_size() -> u32 {
    128
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThumbnailResponse {
    pub image_id: i32,
    pub format: String,
    pub base64_image: String,
}

// ─── Annotations ─────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub struct Annotation {
    pub id: i32,
    pub project_id: i32,
    pub image_id: i32,
    pub label_id: i32,
    pub creator_id: Option<i32>,
    pub data: Vec<u8>,
    pub vector: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnnotationLabel {
    pub label_id: i32,
    /// Base64-encoded mask image
    pub bitmap: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub vector: serde_json::Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveAnnotationRequest {
    pub project_id: i32,
    pub image_id: i32,
    pub labels: Vec<AnnotationLabel>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnotationResponse {
    pub annotation_id: i32,
    pub label_id: i32,
    pub bitmap: String,
    #[schema(value_type = Object)]
    pub vector: serde_json::Value,
    pub creator_id: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

// ─── Messages ────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessRequest {
    pub message_type: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Message {
    pub id: i32,
    pub sender_id: i32,
    pub project_id: i32,
    pub message_type: String,
    pub fulfilled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct MessageEntry {
    pub id: i32,
    pub sender: String,
    pub project_id: i32,
    pub message_type: String,
    pub fulfilled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageList {
    pub messages: Vec<MessageEntry>,
}
