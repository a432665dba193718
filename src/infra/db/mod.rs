//! Postgres adapters for the repository traits.
//!
//! One `PostgresRepositories` value implements every read and write trait of
//! `application::repos`; queries live next to the trait they serve.

mod errors;
mod groups;
mod pages;

pub use errors::map_sqlx_error;

use std::{sync::Arc, time::Duration};

use sqlx::{
    Postgres, Transaction,
    migrate::MigrateError,
    postgres::{PgPool, PgPoolOptions},
};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
    }

    /// Apply the embedded `migrations/` directory.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool())
            .await
            .map(|_| ())
    }
}
