use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Connects the pool, applies migrations and derives the signing keys.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(Arc::new(config), users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserStore>) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        Self { config, jwt, users }
    }

    /// Releases the store's connections.
    pub async fn shutdown(&self) {
        self.users.close().await;
    }

    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::users::repo::MemoryUserStore>) {
        let store = Arc::new(crate::users::repo::MemoryUserStore::default());
        let users = store.clone() as Arc<dyn UserStore>;
        let state = Self::from_parts(Arc::new(crate::config::test_config()), users);
        (state, store)
    }
}
