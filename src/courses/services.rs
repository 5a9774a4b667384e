use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::repo::CourseRepo;
use super::repo_types::{Course, CourseInput, LinkKind};
use crate::error::AppError;

/// What a link operation actually did. Every variant is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
    Created,
    AlreadyExisted,
    Removed,
    NotPresent,
}

impl LinkOutcome {
    pub fn created(self) -> bool {
        self == LinkOutcome::Created
    }

    pub fn message(self, kind: LinkKind, title: &str) -> String {
        match (kind, self) {
            (LinkKind::Enrollment, LinkOutcome::Created) => format!("Enrolled in {title}."),
            (LinkKind::Enrollment, LinkOutcome::AlreadyExisted) => {
                format!("You are already enrolled in {title}.")
            }
            (LinkKind::Enrollment, LinkOutcome::Removed) => format!("Unenrolled from {title}."),
            (LinkKind::Enrollment, LinkOutcome::NotPresent) => {
                format!("You were not enrolled in {title}.")
            }
            (LinkKind::Favorite, LinkOutcome::Created) => format!("Added {title} to favorites."),
            (LinkKind::Favorite, LinkOutcome::AlreadyExisted) => {
                format!("{title} is already in your favorites.")
            }
            (LinkKind::Favorite, LinkOutcome::Removed) => format!("Removed {title} from favorites."),
            (LinkKind::Favorite, LinkOutcome::NotPresent) => {
                format!("{title} was not in your favorites.")
            }
        }
    }
}

pub async fn require_course(courses: &dyn CourseRepo, id: Uuid) -> Result<Course, AppError> {
    courses.find(id).await?.ok_or(AppError::NotFound("Course"))
}

pub async fn add_link(
    courses: &dyn CourseRepo,
    kind: LinkKind,
    student_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<LinkOutcome> {
    let outcome = if courses.insert_link(kind, student_id, course_id).await? {
        LinkOutcome::Created
    } else {
        LinkOutcome::AlreadyExisted
    };
    info!(?kind, ?outcome, %student_id, %course_id, "link add");
    Ok(outcome)
}

pub async fn remove_link(
    courses: &dyn CourseRepo,
    kind: LinkKind,
    student_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<LinkOutcome> {
    let outcome = if courses.delete_link(kind, student_id, course_id).await? {
        LinkOutcome::Removed
    } else {
        LinkOutcome::NotPresent
    };
    info!(?kind, ?outcome, %student_id, %course_id, "link remove");
    Ok(outcome)
}

/// Removes the link if present, otherwise adds it.
pub async fn toggle_link(
    courses: &dyn CourseRepo,
    kind: LinkKind,
    student_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<LinkOutcome> {
    if courses.has_link(kind, student_id, course_id).await? {
        remove_link(courses, kind, student_id, course_id).await
    } else {
        add_link(courses, kind, student_id, course_id).await
    }
}

pub(crate) fn validate_course(title: &str, description: &str) -> Result<CourseInput, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title", "This field is required."));
    }
    if title.chars().count() > 200 {
        return Err(AppError::validation("title", "Ensure this value has at most 200 characters."));
    }
    let description = description.trim();
    if description.is_empty() {
        return Err(AppError::validation("description", "This field is required."));
    }
    Ok(CourseInput {
        title: title.to_string(),
        description: description.to_string(),
    })
}

pub(crate) fn validate_grade(grade: Option<&str>) -> Result<Option<String>, AppError> {
    match grade.map(str::trim) {
        None | Some("") => Ok(None),
        Some(g) if g.chars().count() <= 8 => Ok(Some(g.to_string())),
        Some(_) => Err(AppError::validation("grade", "Ensure this value has at most 8 characters.")),
    }
}
