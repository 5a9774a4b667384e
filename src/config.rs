use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub expiry_seconds: i64,
    pub from_email: String,
}

/// Credentials for the admin account created at startup, if configured.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "coursehub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "coursehub-users".into()),
            ttl_minutes: env_number("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_number("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let otp = OtpConfig {
            expiry_seconds: env_number("OTP_EXPIRY_SECONDS").unwrap_or(15 * 60),
            from_email: std::env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "no-reply@example.com".into()),
        };
        let bootstrap_admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".into()),
            }),
            _ => None,
        };
        Ok(Self {
            database_url,
            jwt,
            otp,
            minio_endpoint: std::env::var("MINIO_ENDPOINT")?,
            minio_bucket: std::env::var("MINIO_BUCKET")?,
            minio_access_key: std::env::var("MINIO_ACCESS_KEY")?,
            minio_secret_key: std::env::var("MINIO_SECRET_KEY")?,
            bootstrap_admin,
        })
    }
}

fn env_number(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}
