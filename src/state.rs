use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{jwt::JwtKeys, password::PasswordHasher};
use crate::config::AppConfig;
use crate::mail::{HttpMailer, LogMailer, Mailer};
use crate::store::{CredentialStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn CredentialStore> = match &config.database_url {
            Some(url) => {
                let pg = PgStore::connect(url, config.database_max_connections).await?;
                pg.migrate().await?;
                info!("connected to postgres credential store");
                Arc::new(pg)
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory credential store, data will not persist");
                Arc::new(MemoryStore::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match HttpMailer::from_config(&config.mail) {
            Some(m) => Arc::new(m),
            None => {
                warn!("MAIL_API_URL/MAIL_API_KEY not set; emails will only be logged");
                Arc::new(LogMailer::new(&config.mail))
            }
        };

        Self::from_parts(store, mailer, Arc::new(config))
    }

    pub fn from_parts(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt);
        let hasher = PasswordHasher::new(&config.password)?;
        Ok(Self {
            store,
            mailer,
            config,
            keys,
            hasher,
        })
    }
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> Self {
        Self::fake_with(
            AppConfig::for_tests(),
            Arc::new(crate::mail::testing::RecordingMailer::default()),
        )
    }

    pub fn fake_with(config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::from_parts(Arc::new(MemoryStore::new()), mailer, Arc::new(config))
            .expect("test config is valid")
    }
}
