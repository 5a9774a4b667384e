use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    AuthResponse, DashboardResponse, DashboardStats, EditUserRequest, LandingResponse, LoginRequest,
    MessageResponse, ProfileResponse, ProfileUpdateRequest, PublicUser, RefreshRequest,
    RegisterRequest, ResetConfirmForm, ResetConfirmQuery, ResetConfirmRequest, ResetFormInfo,
    ResetRequest, ResetRequested, UserMessageResponse,
};
use super::extractors::{AdminUser, CurrentUser};
use super::jwt::{expired_access_cookie, JwtKeys};
use super::repo_types::{Role, UserChanges};
use super::services::{
    authenticate, confirm_password_reset, normalize_email, register_student,
    request_password_reset, validate_name, ResetConfirmation, RESET_REQUESTED_MESSAGE,
};
use crate::{
    courses::{dto::CourseSummary, repo_types::LinkKind},
    error::AppError,
    state::AppState,
    storage::{image_url, read_image_field, store_image, UPLOAD_LIMIT_BYTES},
};

const RECENT_COURSES: i64 = 6;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/reset_password", get(reset_form).post(reset_request))
        .route("/reset_password/done", get(reset_done))
        .route(
            "/reset_password/confirm",
            get(reset_confirm_form).post(reset_confirm),
        )
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/dashboard", get(dashboard))
        .route("/profile", get(get_profile).post(update_profile))
        .route(
            "/profile/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/manage_users", get(manage_users))
        .route("/edit_user/:id", get(get_user).post(edit_user))
        .route("/delete_user/:id", post(delete_user))
}

// --- registration & sessions ---

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserMessageResponse>), AppError> {
    let user = register_student(
        state.users.as_ref(),
        &payload.name,
        &payload.email,
        &payload.password1,
        &payload.password2,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserMessageResponse {
            message: "Registration successful. Please log in.".into(),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(state.users.as_ref(), &payload.email, &payload.password).await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    let cookie = keys.access_cookie(&access_token);

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Logged in successfully.".into(),
            access_token,
            refresh_token,
            user: user.into(),
        }),
    ))
}

#[instrument]
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, expired_access_cookie())],
        Json(MessageResponse::new("Logged out.")),
    )
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    let cookie = keys.access_cookie(&access_token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Token refreshed.".into(),
            access_token,
            refresh_token,
            user: user.into(),
        }),
    ))
}

// --- password reset ---

pub async fn reset_form(State(state): State<AppState>) -> Json<ResetFormInfo> {
    Json(ResetFormInfo {
        expires_in_minutes: state.config.otp.expiry_seconds / 60,
    })
}

#[instrument(skip(state, payload))]
pub async fn reset_request(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ResetRequested>, AppError> {
    request_password_reset(
        state.users.as_ref(),
        state.mailer.as_ref(),
        &state.config.otp,
        &payload.email,
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok(Json(ResetRequested {
        message: RESET_REQUESTED_MESSAGE,
        next: "/reset_password/done",
    }))
}

pub async fn reset_done() -> Json<MessageResponse> {
    Json(MessageResponse::new(RESET_REQUESTED_MESSAGE))
}

pub async fn reset_confirm_form(
    State(state): State<AppState>,
    Query(q): Query<ResetConfirmQuery>,
) -> Response {
    match q.user_id.filter(|id| !id.trim().is_empty()) {
        Some(user_id) => Json(ResetConfirmForm {
            user_id,
            expires_in_minutes: state.config.otp.expiry_seconds / 60,
        })
        .into_response(),
        None => {
            warn!("reset confirm opened without user_id");
            Redirect::to("/reset_password").into_response()
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn reset_confirm(
    State(state): State<AppState>,
    Json(payload): Json<ResetConfirmRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    confirm_password_reset(
        state.users.as_ref(),
        &state.config.otp,
        ResetConfirmation {
            user_id: &payload.user_id,
            otp: &payload.otp,
            new_password1: &payload.new_password1,
            new_password2: &payload.new_password2,
        },
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok(Json(MessageResponse::new("Password reset successful. Please log in.")))
}

// --- landing, dashboard, profile ---

#[instrument(skip(state, viewer))]
pub async fn landing(
    State(state): State<AppState>,
    viewer: Option<CurrentUser>,
) -> Result<Json<LandingResponse>, AppError> {
    let featured = state.courses.list(Some(RECENT_COURSES), 0).await?;
    let favorite_ids = match viewer {
        Some(CurrentUser(user)) => {
            state
                .courses
                .linked_course_ids(LinkKind::Favorite, user.id)
                .await?
        }
        None => Vec::new(),
    };

    Ok(Json(LandingResponse {
        featured: featured.iter().map(CourseSummary::from).collect(),
        favorite_ids,
    }))
}

#[instrument(skip(state, user))]
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let recent = state.courses.list(Some(RECENT_COURSES), 0).await?;
    let courses_count = state.courses.count().await?;

    let (stats, favorite_ids) = if user.role.is_admin() {
        let stats = DashboardStats {
            students_count: Some(state.users.count_by_role(Role::Student).await?),
            courses_count,
            favorites_count: Some(state.courses.count_links(LinkKind::Favorite).await?),
            ..Default::default()
        };
        (stats, Vec::new())
    } else {
        let favorite_ids = state
            .courses
            .linked_course_ids(LinkKind::Favorite, user.id)
            .await?;
        let stats = DashboardStats {
            courses_count,
            my_favorites_count: Some(favorite_ids.len() as i64),
            ..Default::default()
        };
        (stats, favorite_ids)
    };

    Ok(Json(DashboardResponse {
        user: user.into(),
        stats,
        recent_courses: recent.iter().map(CourseSummary::from).collect(),
        favorite_ids,
    }))
}

#[instrument(skip(state, user))]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state.users.find_profile(user.id).await?;
    let avatar_url = image_url(
        state.storage.as_ref(),
        profile.as_ref().and_then(|p| p.avatar_key.as_deref()),
    )
    .await;

    Ok(Json(ProfileResponse {
        user: user.into(),
        avatar_url,
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<UserMessageResponse>, AppError> {
    let changes = UserChanges {
        name: validate_name(&payload.name)?,
        email: normalize_email(&payload.email)?,
        role: user.role,
        is_active: user.is_active,
    };
    let updated = state
        .users
        .update(user.id, changes)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(Json(UserMessageResponse {
        message: "Profile updated successfully.".into(),
        user: updated.into(),
    }))
}

#[instrument(skip(state, user, multipart))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<ProfileResponse>, AppError> {
    let image = read_image_field(multipart, "avatar").await?;
    let previous = state
        .users
        .find_profile(user.id)
        .await?
        .and_then(|p| p.avatar_key);

    let key = store_image(state.storage.as_ref(), &format!("avatars/{}", user.id), image).await?;
    state.users.set_avatar(user.id, &key).await?;

    if let Some(old) = previous {
        if let Err(e) = state.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete previous avatar");
        }
    }

    info!(user_id = %user.id, key = %key, "avatar uploaded");
    let avatar_url = image_url(state.storage.as_ref(), Some(&key)).await;
    Ok(Json(ProfileResponse {
        user: user.into(),
        avatar_url,
    }))
}

// --- admin user management ---

#[instrument(skip(state, _admin))]
pub async fn manage_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, admin, payload))]
pub async fn edit_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<EditUserRequest>,
) -> Result<Json<UserMessageResponse>, AppError> {
    let changes = UserChanges {
        name: validate_name(&payload.name)?,
        email: normalize_email(&payload.email)?,
        role: payload.role,
        is_active: payload.is_active,
    };
    let user = state
        .users
        .update(id, changes)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    info!(admin_id = %admin.id, user_id = %user.id, "user updated");
    Ok(Json(UserMessageResponse {
        message: "User updated.".into(),
        user: user.into(),
    }))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(admin_id = %admin.id, user_id = %id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted.")))
}
