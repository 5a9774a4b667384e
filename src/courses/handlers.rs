use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CourseDetailResponse, CourseListResponse, CourseMessageResponse, CourseRequest,
    CourseResponse, EnrolledCourseItem, EnrollmentItem, GradeRequest, LinkResponse, Pagination,
};
use super::repo_types::{Course, LinkKind};
use super::services::{
    add_link, remove_link, require_course, toggle_link, validate_course, validate_grade,
};
use crate::{
    accounts::{
        dto::MessageResponse,
        extractors::{CourseAdmin, CurrentUser, EnrollmentViewer, Enrolling, Favoriting},
        repo_types::User,
    },
    error::AppError,
    state::AppState,
    storage::{image_url, read_image_field, store_image, UPLOAD_LIMIT_BYTES},
};

// --- routers ---

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/:id", get(course_detail))
        .route("/my_courses", get(my_courses))
        .route("/favorites", get(my_favorites))
}

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/courses/:id/enroll", post(enroll))
        .route("/courses/:id/unenroll", post(unenroll))
        .route("/courses/:id/favorite", post(favorite))
        .route("/courses/:id/unfavorite", post(unfavorite))
        .route("/courses/:id/toggle_favorite", post(toggle_favorite))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/manage_courses", get(manage_courses))
        .route("/add_course", post(add_course))
        .route("/edit_course/:id", get(get_course).post(edit_course))
        .route("/delete_course/:id", get(confirm_delete).post(delete_course))
        .route(
            "/courses/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/enrollments", get(all_enrollments))
        .route("/enrollments/:id/grade", post(set_grade))
}

async fn course_response(state: &AppState, course: Course) -> CourseResponse {
    let url = image_url(state.storage.as_ref(), course.image_key.as_deref()).await;
    CourseResponse::new(course, url)
}

// --- catalog ---

#[instrument(skip(state, user))]
pub async fn list_courses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<CourseListResponse>, AppError> {
    let (limit, offset) = p.clamped();
    let rows = state.courses.list(Some(limit), offset).await?;

    let mut courses = Vec::with_capacity(rows.len());
    for c in rows {
        courses.push(course_response(&state, c).await);
    }
    let favorite_ids = state
        .courses
        .linked_course_ids(LinkKind::Favorite, user.id)
        .await?;

    Ok(Json(CourseListResponse {
        courses,
        favorite_ids,
    }))
}

#[instrument(skip(state, user))]
pub async fn course_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseDetailResponse>, AppError> {
    let course = require_course(state.courses.as_ref(), id).await?;
    let is_favorite = state
        .courses
        .has_link(LinkKind::Favorite, user.id, id)
        .await?;
    let is_enrolled = state
        .courses
        .has_link(LinkKind::Enrollment, user.id, id)
        .await?;

    Ok(Json(CourseDetailResponse {
        course: course_response(&state, course).await,
        is_favorite,
        is_enrolled,
    }))
}

#[instrument(skip(state, user))]
pub async fn my_courses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<EnrolledCourseItem>>, AppError> {
    let rows = state.courses.student_enrollments(user.id).await?;
    Ok(Json(rows.into_iter().map(EnrolledCourseItem::from).collect()))
}

#[instrument(skip(state, user))]
pub async fn my_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CourseResponse>>, AppError> {
    let ids = state
        .courses
        .linked_course_ids(LinkKind::Favorite, user.id)
        .await?;

    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        // a course deleted between the two reads is skipped
        if let Some(c) = state.courses.find(id).await? {
            out.push(course_response(&state, c).await);
        }
    }
    Ok(Json(out))
}

// --- enrollment & favorites ---

#[derive(Clone, Copy)]
enum LinkOp {
    Add,
    Remove,
    Toggle,
}

async fn link_handler(
    state: &AppState,
    student: User,
    course_id: Uuid,
    kind: LinkKind,
    op: LinkOp,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    let course = require_course(state.courses.as_ref(), course_id).await?;

    let repo = state.courses.as_ref();
    let outcome = match op {
        LinkOp::Add => add_link(repo, kind, student.id, course.id).await?,
        LinkOp::Remove => remove_link(repo, kind, student.id, course.id).await?,
        LinkOp::Toggle => toggle_link(repo, kind, student.id, course.id).await?,
    };

    let status = if outcome.created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(LinkResponse {
            message: outcome.message(kind, &course.title),
            relation: kind,
            action: outcome,
            course_id: course.id,
        }),
    ))
}

#[instrument(skip(state, student))]
pub async fn enroll(
    State(state): State<AppState>,
    Enrolling(student): Enrolling,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    link_handler(&state, student, id, LinkKind::Enrollment, LinkOp::Add).await
}

#[instrument(skip(state, student))]
pub async fn unenroll(
    State(state): State<AppState>,
    Enrolling(student): Enrolling,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    link_handler(&state, student, id, LinkKind::Enrollment, LinkOp::Remove).await
}

#[instrument(skip(state, student))]
pub async fn favorite(
    State(state): State<AppState>,
    Favoriting(student): Favoriting,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    link_handler(&state, student, id, LinkKind::Favorite, LinkOp::Add).await
}

#[instrument(skip(state, student))]
pub async fn unfavorite(
    State(state): State<AppState>,
    Favoriting(student): Favoriting,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    link_handler(&state, student, id, LinkKind::Favorite, LinkOp::Remove).await
}

#[instrument(skip(state, student))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Favoriting(student): Favoriting,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    link_handler(&state, student, id, LinkKind::Favorite, LinkOp::Toggle).await
}

// --- admin course management ---

#[instrument(skip(state, _admin))]
pub async fn manage_courses(
    State(state): State<AppState>,
    _admin: CourseAdmin,
) -> Result<Json<Vec<CourseResponse>>, AppError> {
    let rows = state.courses.list(None, 0).await?;

    let mut out = Vec::with_capacity(rows.len());
    for c in rows {
        out.push(course_response(&state, c).await);
    }
    Ok(Json(out))
}

#[instrument(skip(state, admin, payload))]
pub async fn add_course(
    State(state): State<AppState>,
    CourseAdmin(admin): CourseAdmin,
    Json(payload): Json<CourseRequest>,
) -> Result<(StatusCode, Json<CourseMessageResponse>), AppError> {
    let input = validate_course(&payload.title, &payload.description)?;
    let course = state.courses.create(input).await?;

    info!(admin_id = %admin.id, course_id = %course.id, "course added");
    Ok((
        StatusCode::CREATED,
        Json(CourseMessageResponse {
            message: "Course added successfully.".into(),
            course: course_response(&state, course).await,
        }),
    ))
}

#[instrument(skip(state, _admin))]
pub async fn get_course(
    State(state): State<AppState>,
    _admin: CourseAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseResponse>, AppError> {
    let course = require_course(state.courses.as_ref(), id).await?;
    Ok(Json(course_response(&state, course).await))
}

#[instrument(skip(state, admin, payload))]
pub async fn edit_course(
    State(state): State<AppState>,
    CourseAdmin(admin): CourseAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourseRequest>,
) -> Result<Json<CourseMessageResponse>, AppError> {
    let input = validate_course(&payload.title, &payload.description)?;
    let course = state
        .courses
        .update(id, input)
        .await?
        .ok_or(AppError::NotFound("Course"))?;

    info!(admin_id = %admin.id, course_id = %course.id, "course updated");
    Ok(Json(CourseMessageResponse {
        message: "Course updated successfully.".into(),
        course: course_response(&state, course).await,
    }))
}

/// The confirmation view: the course about to be deleted.
#[instrument(skip(state, _admin))]
pub async fn confirm_delete(
    State(state): State<AppState>,
    _admin: CourseAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseMessageResponse>, AppError> {
    let course = require_course(state.courses.as_ref(), id).await?;
    Ok(Json(CourseMessageResponse {
        message: format!("Are you sure you want to delete {}?", course.title),
        course: course_response(&state, course).await,
    }))
}

#[instrument(skip(state, admin))]
pub async fn delete_course(
    State(state): State<AppState>,
    CourseAdmin(admin): CourseAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let course = require_course(state.courses.as_ref(), id).await?;
    if !state.courses.delete(course.id).await? {
        return Err(AppError::NotFound("Course"));
    }

    if let Some(key) = course.image_key {
        if let Err(e) = state.storage.delete_object(&key).await {
            warn!(error = %e, key = %key, "failed to delete course image");
        }
    }

    info!(admin_id = %admin.id, course_id = %id, "course deleted");
    Ok(Json(MessageResponse::new("Course deleted successfully.")))
}

#[instrument(skip(state, admin, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    CourseAdmin(admin): CourseAdmin,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<CourseMessageResponse>, AppError> {
    let course = require_course(state.courses.as_ref(), id).await?;
    let image = read_image_field(multipart, "image").await?;

    let key = store_image(state.storage.as_ref(), &format!("courses/{}", course.id), image).await?;
    if !state.courses.set_image(course.id, &key).await? {
        return Err(AppError::NotFound("Course"));
    }
    if let Some(old) = course.image_key {
        if let Err(e) = state.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete previous course image");
        }
    }

    info!(admin_id = %admin.id, course_id = %id, key = %key, "course image uploaded");
    let course = require_course(state.courses.as_ref(), id).await?;
    Ok(Json(CourseMessageResponse {
        message: "Course image updated.".into(),
        course: course_response(&state, course).await,
    }))
}

// --- enrollments overview ---

#[instrument(skip(state, _viewer))]
pub async fn all_enrollments(
    State(state): State<AppState>,
    _viewer: EnrollmentViewer,
) -> Result<Json<Vec<EnrollmentItem>>, AppError> {
    let rows = state.courses.all_enrollments().await?;
    Ok(Json(rows.into_iter().map(EnrollmentItem::from).collect()))
}

#[instrument(skip(state, admin, payload))]
pub async fn set_grade(
    State(state): State<AppState>,
    CourseAdmin(admin): CourseAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let grade = validate_grade(payload.grade.as_deref())?;
    if !state.courses.set_grade(id, grade.as_deref()).await? {
        return Err(AppError::NotFound("Enrollment"));
    }

    info!(admin_id = %admin.id, enrollment_id = %id, ?grade, "grade set");
    let message = match grade {
        Some(g) => format!("Grade set to {g}."),
        None => "Grade cleared.".to_string(),
    };
    Ok(Json(MessageResponse::new(message)))
}
