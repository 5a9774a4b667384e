use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::AppConfig, error::UniqueViolation};

/// Postgres-backed implementation of the repository traits.
#[derive(Clone)]
pub struct PgStore {
    pub db: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        Ok(Self { db })
    }
}

/// Turns a unique-constraint failure into [`UniqueViolation`] so handlers can
/// answer with a conflict instead of a 500.
pub(crate) fn map_unique(err: sqlx::Error, what: &'static str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            UniqueViolation(what).into()
        }
        _ => anyhow::Error::new(err),
    }
}
