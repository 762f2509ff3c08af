use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::application::{ApplicationRow, NewApplication};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Write-once storage for submitted applications.
///
/// Carried in `AppState` as `Arc<dyn ApplicationStore>` so handlers can be
/// exercised against an in-memory store.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts exactly one record and returns it with its assigned id and timestamp.
    async fn insert(&self, application: &NewApplication) -> Result<ApplicationRow, StoreError>;
}

pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn insert(&self, application: &NewApplication) -> Result<ApplicationRow, StoreError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            INSERT INTO applications (name, email, phone, position)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, phone, position, created_at
            "#,
        )
        .bind(&application.name)
        .bind(&application.email)
        .bind(&application.phone)
        .bind(&application.position)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
