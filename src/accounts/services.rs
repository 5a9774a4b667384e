use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::otp;
use super::password::{check_new_password, hash_password, verify_password};
use super::repo::UserRepo;
use super::repo_types::{NewUser, Role, User};
use crate::config::{BootstrapAdmin, OtpConfig};
use crate::error::AppError;
use crate::mail::{Email, Mailer};

/// Returned for every reset request, whether or not the email is known.
pub const RESET_REQUESTED_MESSAGE: &str = "If this email exists, an OTP has been sent.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::validation("email", "Enter a valid email address."));
    }
    Ok(email)
}

pub(crate) fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name", "This field is required."));
    }
    if name.chars().count() > 255 {
        return Err(AppError::validation("name", "Ensure this value has at most 255 characters."));
    }
    Ok(name.to_string())
}

/// Creates a student and then its profile.
pub async fn register_student(
    users: &dyn UserRepo,
    name: &str,
    email: &str,
    password1: &str,
    password2: &str,
) -> Result<User, AppError> {
    let name = validate_name(name)?;
    let email = normalize_email(email)?;
    check_new_password(password1, password2)?;

    if users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(password1)?;
    let user = users
        .create(NewUser {
            email,
            name,
            password_hash,
            role: Role::Student,
        })
        .await?;
    users.create_profile(user.id).await?;

    info!(user_id = %user.id, email = %user.email, "student registered");
    Ok(user)
}

/// Unknown email, wrong password and inactive account all look the same.
pub async fn authenticate(users: &dyn UserRepo, email: &str, password: &str) -> Result<User, AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".into());
    let email = email.trim().to_lowercase();

    let Some(user) = users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login inactive account");
        return Err(invalid());
    }
    Ok(user)
}

/// Issues a fresh OTP to the owner of `email`, if there is one. The caller
/// answers with [`RESET_REQUESTED_MESSAGE`] either way.
pub async fn request_password_reset(
    users: &dyn UserRepo,
    mailer: &dyn Mailer,
    cfg: &OtpConfig,
    email: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let email = normalize_email(email)?;
    let Some(user) = users.find_by_email(&email).await? else {
        info!("password reset requested for unknown email");
        return Ok(());
    };

    let code = otp::generate_code();
    users.store_otp(user.id, &code, now).await?;

    let message = Email {
        subject: "Password reset OTP".into(),
        body: format!(
            "Your OTP for password reset is: {}\nIt expires in {} minutes.\n\
             Enter it at /reset_password/confirm?user_id={}",
            code,
            cfg.expiry_seconds / 60,
            user.id
        ),
        from: cfg.from_email.clone(),
        to: vec![user.email.clone()],
    };
    if let Err(e) = mailer.send(message).await {
        warn!(error = %e, user_id = %user.id, "failed to send password reset email");
    }

    info!(user_id = %user.id, "password reset otp issued");
    Ok(())
}

/// Form fields of the reset confirmation.
pub struct ResetConfirmation<'a> {
    pub user_id: &'a str,
    pub otp: &'a str,
    pub new_password1: &'a str,
    pub new_password2: &'a str,
}

pub async fn confirm_password_reset(
    users: &dyn UserRepo,
    cfg: &OtpConfig,
    form: ResetConfirmation<'_>,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let code = form.otp.trim();
    if !otp::is_well_formed(code) {
        return Err(AppError::validation("otp", "Enter the 6 digit code."));
    }
    check_new_password(form.new_password1, form.new_password2)?;

    let user_id = Uuid::parse_str(form.user_id.trim()).map_err(|_| AppError::InvalidUser)?;
    let user = users.find_by_id(user_id).await?.ok_or(AppError::InvalidUser)?;

    if let Err(e) = otp::check(
        user.otp.as_deref(),
        user.otp_created_at,
        code,
        now,
        Duration::seconds(cfg.expiry_seconds),
    ) {
        warn!(user_id = %user.id, reason = %e, "password reset otp rejected");
        return Err(e.into());
    }

    let password_hash = hash_password(form.new_password1)?;
    users.reset_password(user.id, &password_hash).await?;
    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

/// Creates the configured admin account unless a user with that email exists.
pub async fn ensure_bootstrap_admin(users: &dyn UserRepo, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    let email = admin.email.trim().to_lowercase();
    if users.find_by_email(&email).await?.is_some() {
        return Ok(());
    }
    let user = users
        .create(NewUser {
            email,
            name: admin.name.clone(),
            password_hash: hash_password(&admin.password)?,
            role: Role::Admin,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::otp::OtpError;
    use crate::testing::{MemoryStore, RecordingMailer};

    fn otp_cfg() -> OtpConfig {
        OtpConfig {
            expiry_seconds: 900,
            from_email: "no-reply@example.com".into(),
        }
    }

    async fn student(store: &MemoryStore) -> User {
        register_student(store, "Ada", "Ada@Example.com", "password123", "password123")
            .await
            .expect("register")
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a @b.co"));
    }

    #[tokio::test]
    async fn register_creates_student_with_profile() {
        let store = MemoryStore::default();
        let user = student(&store).await;
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::Student);
        assert!(store.find_profile(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_case_insensitively() {
        let store = MemoryStore::default();
        student(&store).await;
        let err = register_student(&store, "Other", "ADA@example.com", "password123", "password123")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_validates_passwords() {
        let store = MemoryStore::default();
        let err = register_student(&store, "A", "a@b.co", "password123", "password124")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some("password2"), .. }));
        let err = register_student(&store, "A", "a@b.co", "short", "short").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some("password1"), .. }));
    }

    #[tokio::test]
    async fn authenticate_checks_password_and_activity() {
        let store = MemoryStore::default();
        let user = student(&store).await;
        assert_eq!(authenticate(&store, "ada@example.com", "password123").await.unwrap().id, user.id);
        assert!(matches!(
            authenticate(&store, "ada@example.com", "nope-nope").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&store, "ghost@example.com", "password123").await,
            Err(AppError::Unauthorized(_))
        ));
        store.deactivate(user.id);
        assert!(matches!(
            authenticate(&store, "ada@example.com", "password123").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn reset_request_for_unknown_email_changes_nothing() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        let user = student(&store).await;
        request_password_reset(&store, &mailer, &otp_cfg(), "nobody@example.com", OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(mailer.sent().is_empty());
        assert!(store.find_by_id(user.id).await.unwrap().unwrap().otp.is_none());
    }

    #[tokio::test]
    async fn reset_request_stores_and_mails_code() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        let user = student(&store).await;
        let now = OffsetDateTime::now_utc();
        request_password_reset(&store, &mailer, &otp_cfg(), "ADA@example.com", now)
            .await
            .unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        let code = stored.otp.expect("otp stored");
        assert!(otp::is_well_formed(&code));
        assert_eq!(stored.otp_created_at, Some(now));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["ada@example.com".to_string()]);
        assert_eq!(sent[0].from, "no-reply@example.com");
        assert!(sent[0].body.contains(&code));
        assert!(sent[0].body.contains("15 minutes"));
    }

    #[tokio::test]
    async fn confirm_resets_password_and_clears_code() {
        let store = MemoryStore::default();
        let user = student(&store).await;
        let now = OffsetDateTime::now_utc();
        store.store_otp(user.id, "123456", now).await.unwrap();
        let id = user.id.to_string();
        let form = || ResetConfirmation {
            user_id: &id,
            otp: "123456",
            new_password1: "new-password-1",
            new_password2: "new-password-1",
        };

        confirm_password_reset(&store, &otp_cfg(), form(), now).await.unwrap();

        let after = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(after.otp.is_none());
        assert!(after.otp_created_at.is_none());
        assert!(authenticate(&store, "ada@example.com", "new-password-1").await.is_ok());

        let again = confirm_password_reset(&store, &otp_cfg(), form(), now).await.unwrap_err();
        assert!(matches!(again, AppError::Otp(OtpError::Invalid)));
    }

    #[tokio::test]
    async fn confirm_rejects_stale_code() {
        let store = MemoryStore::default();
        let user = student(&store).await;
        let issued = OffsetDateTime::now_utc() - Duration::seconds(901);
        store.store_otp(user.id, "123456", issued).await.unwrap();
        let id = user.id.to_string();
        let err = confirm_password_reset(
            &store,
            &otp_cfg(),
            ResetConfirmation {
                user_id: &id,
                otp: "123456",
                new_password1: "new-password-1",
                new_password2: "new-password-1",
            },
            OffsetDateTime::now_utc(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpError::Expired)));
        assert!(store.find_by_id(user.id).await.unwrap().unwrap().otp.is_some());
    }

    #[tokio::test]
    async fn confirm_rejects_unknown_user() {
        let store = MemoryStore::default();
        for user_id in ["not-a-uuid".to_string(), Uuid::new_v4().to_string()] {
            let err = confirm_password_reset(
                &store,
                &otp_cfg(),
                ResetConfirmation {
                    user_id: &user_id,
                    otp: "123456",
                    new_password1: "new-password-1",
                    new_password2: "new-password-1",
                },
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::InvalidUser));
        }
    }

    #[tokio::test]
    async fn new_request_overwrites_pending_code() {
        let store = MemoryStore::default();
        let mailer = RecordingMailer::default();
        let user = student(&store).await;
        let earlier = OffsetDateTime::now_utc() - Duration::seconds(60);
        store.store_otp(user.id, "old-cd", earlier).await.unwrap();
        request_password_reset(&store, &mailer, &otp_cfg(), "ada@example.com", OffsetDateTime::now_utc())
            .await
            .unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.otp.as_deref(), Some("old-cd"));
        assert!(stored.otp_created_at.unwrap() > earlier);
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let store = MemoryStore::default();
        let admin = BootstrapAdmin {
            email: "root@example.com".into(),
            password: "admin-password".into(),
            name: "Root".into(),
        };
        ensure_bootstrap_admin(&store, &admin).await.unwrap();
        ensure_bootstrap_admin(&store, &admin).await.unwrap();
        assert_eq!(store.count_by_role(Role::Admin).await.unwrap(), 1);
        assert!(store.find_profile(store.find_by_email("root@example.com").await.unwrap().unwrap().id)
            .await
            .unwrap()
            .is_none());
    }
}
