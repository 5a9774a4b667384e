use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Role, User};
use crate::courses::dto::CourseSummary;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            is_active: u.is_active,
            date_joined: u.date_joined,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct UserMessageResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct EditUserRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub user_id: String,
    pub otp: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetFormInfo {
    pub expires_in_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct ResetConfirmForm {
    pub user_id: String,
    pub expires_in_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct ResetRequested {
    pub message: &'static str,
    pub next: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LandingResponse {
    pub featured: Vec<CourseSummary>,
    pub favorite_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Serialize)]
pub struct DashboardStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students_count: Option<i64>,
    pub courses_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorites_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_favorites_count: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: PublicUser,
    pub stats: DashboardStats,
    pub recent_courses: Vec<CourseSummary>,
    pub favorite_ids: Vec<Uuid>,
}
