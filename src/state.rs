use std::sync::Arc;

use crate::accounts::repo::UserRepo;
use crate::config::AppConfig;
use crate::courses::repo::CourseRepo;
use crate::db::PgStore;
use crate::mail::{LogMailer, Mailer};
use crate::storage::{Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub courses: Arc<dyn CourseRepo>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = PgStore::connect(&config).await?;
        let storage = Arc::new(Storage::from_config(&config).await?) as Arc<dyn StorageClient>;

        Ok(Self {
            users: Arc::new(store.clone()),
            courses: Arc::new(store),
            storage,
            mailer: Arc::new(LogMailer),
            config,
        })
    }
}
