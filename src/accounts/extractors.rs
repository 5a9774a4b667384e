use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;

use super::access::{authorize, Capability};
use super::jwt::{JwtKeys, TokenKind, ACCESS_COOKIE};
use super::repo_types::User;
use crate::{error::AppError, state::AppState};

/// The authenticated, active user behind the request.
///
/// Anonymous requests are redirected to the login page. Wrap in `Option` for
/// routes that also serve anonymous visitors.
pub struct CurrentUser(pub User);

/// A user holding `ManageUsers`. Authentication is checked before the role,
/// so anonymous callers still get the login redirect.
pub struct AdminUser(pub User);

/// A user holding `ManageCourses`.
pub struct CourseAdmin(pub User);

/// A user holding `ViewAllEnrollments`.
pub struct EnrollmentViewer(pub User);

/// A student allowed to enroll.
pub struct Enrolling(pub User);

/// A student allowed to favorite.
pub struct Favoriting(pub User);

impl CurrentUser {
    pub fn require(self, cap: Capability, path: &str) -> Result<User, AppError> {
        authorize(Some(&self.0), cap, path)?;
        Ok(self.0)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthenticated = || AppError::Unauthenticated {
            next: request_target(parts),
        };

        let Some(token) = token_from_headers(&parts.headers) else {
            return Err(unauthenticated());
        };

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify(&token) {
            Ok(c) if c.kind == TokenKind::Access => c,
            Ok(_) => {
                warn!("refresh token presented as access token");
                return Err(unauthenticated());
            }
            Err(_) => {
                warn!("invalid or expired token");
                return Err(unauthenticated());
            }
        };

        match state.users.find_by_id(claims.sub).await? {
            Some(user) if user.is_active => Ok(CurrentUser(user)),
            _ => {
                warn!(user_id = %claims.sub, "token for missing or inactive user");
                Err(unauthenticated())
            }
        }
    }
}

/// Runs [`CurrentUser`] and then the capability check. Gated handlers take
/// one of the wrappers below as their first extractor, so the role is
/// decided before any path or body is parsed.
async fn require_capability(
    parts: &mut Parts,
    state: &AppState,
    cap: Capability,
) -> Result<User, AppError> {
    let user = CurrentUser::from_request_parts(parts, state).await?;
    let target = request_target(parts);
    user.require(cap, &target)
}

macro_rules! capability_extractor {
    ($name:ident, $cap:expr) => {
        #[async_trait]
        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                require_capability(parts, state, $cap).await.map($name)
            }
        }
    };
}

capability_extractor!(AdminUser, Capability::ManageUsers);
capability_extractor!(CourseAdmin, Capability::ManageCourses);
capability_extractor!(EnrollmentViewer, Capability::ViewAllEnrollments);
capability_extractor!(Enrolling, Capability::Enroll);
capability_extractor!(Favoriting, Capability::Favorite);

/// Path plus query, used as the `next` target of the login redirect.
fn request_target(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string())
}

/// Reads the access token from `Authorization: Bearer` or, failing that, the
/// access cookie.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ").or_else(|| auth.strip_prefix("bearer ")) {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == ACCESS_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
