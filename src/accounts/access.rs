use crate::accounts::repo_types::{Role, User};
use crate::error::AppError;

/// Things a role may or may not do. Checked with [`Role::allows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageUsers,
    ManageCourses,
    ViewAllEnrollments,
    Enroll,
    Favorite,
}

impl Role {
    pub fn allows(self, cap: Capability) -> bool {
        match cap {
            Capability::ManageUsers
            | Capability::ManageCourses
            | Capability::ViewAllEnrollments => self == Role::Admin,
            Capability::Enroll | Capability::Favorite => self == Role::Student,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

/// Authentication first, then capability. An anonymous caller always gets
/// `Unauthenticated`, never `Forbidden`.
pub fn authorize<'u>(
    user: Option<&'u User>,
    cap: Capability,
    path: &str,
) -> Result<&'u User, AppError> {
    let user = user.ok_or_else(|| AppError::Unauthenticated { next: path.to_string() })?;
    if !user.role.allows(cap) {
        return Err(AppError::forbidden(denied_message(cap)));
    }
    Ok(user)
}

fn denied_message(cap: Capability) -> &'static str {
    match cap {
        Capability::ManageUsers => "Only admin can manage users.",
        Capability::ManageCourses => "Only admin can manage courses.",
        Capability::ViewAllEnrollments => "Only admin can view all enrollments.",
        Capability::Enroll => "Only students can enroll in courses.",
        Capability::Favorite => "Only students can favorite courses.",
    }
}
