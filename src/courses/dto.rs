use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Course, EnrolledCourse, EnrollmentRow, LinkKind};
use super::services::LinkOutcome;

/// Title and description only, as shown on the landing page and dashboard.
#[derive(Debug, Serialize)]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Course> for CourseSummary {
    fn from(c: &Course) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            description: c.description.clone(),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CourseResponse {
    pub fn new(c: Course, image_url: Option<String>) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            image_url,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<CourseResponse>,
    pub favorite_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetailResponse {
    pub course: CourseResponse,
    pub is_favorite: bool,
    pub is_enrolled: bool,
}

#[derive(Debug, Serialize)]
pub struct CourseMessageResponse {
    pub message: String,
    pub course: CourseResponse,
}

#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    pub title: String,
    pub description: String,
}

/// Result of an enroll/favorite operation.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub message: String,
    pub relation: LinkKind,
    pub action: LinkOutcome,
    pub course_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EnrolledCourseItem {
    pub enrollment_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub grade: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub enrolled_at: OffsetDateTime,
}

impl From<EnrolledCourse> for EnrolledCourseItem {
    fn from(e: EnrolledCourse) -> Self {
        Self {
            enrollment_id: e.enrollment_id,
            course_id: e.course_id,
            title: e.title,
            grade: e.grade,
            enrolled_at: e.enrolled_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentItem {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_email: String,
    pub student_name: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub grade: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub enrolled_at: OffsetDateTime,
}

impl From<EnrollmentRow> for EnrollmentItem {
    fn from(r: EnrollmentRow) -> Self {
        Self {
            id: r.id,
            student_id: r.student_id,
            student_email: r.student_email,
            student_name: r.student_name,
            course_id: r.course_id,
            course_title: r.course_title,
            grade: r.grade,
            enrolled_at: r.enrolled_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub grade: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    /// Clamps client input to 1..=100 rows from a non-negative offset.
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}
