use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_key: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CourseInput {
    pub title: String,
    pub description: String,
}

/// The two student/course join relations. Both are unique per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Favorite,
    Enrollment,
}

impl LinkKind {
    pub(crate) fn table(self) -> &'static str {
        match self {
            LinkKind::Favorite => "favorites",
            LinkKind::Enrollment => "enrollments",
        }
    }
}

/// An enrollment joined with its course, as a student sees it.
#[derive(Debug, Clone, FromRow)]
pub struct EnrolledCourse {
    pub enrollment_id: Uuid,
    pub enrolled_at: OffsetDateTime,
    pub grade: Option<String>,
    pub course_id: Uuid,
    pub title: String,
}

/// An enrollment joined with student and course, for the admin listing.
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentRow {
    pub id: Uuid,
    pub enrolled_at: OffsetDateTime,
    pub grade: Option<String>,
    pub student_id: Uuid,
    pub student_email: String,
    pub student_name: String,
    pub course_id: Uuid,
    pub course_title: String,
}
