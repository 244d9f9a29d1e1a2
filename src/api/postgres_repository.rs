//! Postgres definition backend.
//!
//! Definitions are stored as one JSON document per row, mirroring the
//! document backend; the relational store contributes durability and
//! transactions, not a row-per-field schema.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::api::repository::{Repository, RepositoryError, POSTGRES_SCHEME};
use crate::api::Definition;

pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Build a lazy pool for the DSN; connectivity problems surface on the
    /// first fetch.
    pub fn connect(dsn: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new().max_connections(4).connect_lazy(dsn)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_all(&self) -> Result<Vec<Definition>, RepositoryError> {
        let rows: Vec<(Json<Definition>,)> =
            sqlx::query_as("SELECT definition FROM api_definitions")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(Json(definition),)| definition).collect())
    }

    async fn close(&self) -> Result<(), RepositoryError> {
        self.pool.close().await;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        POSTGRES_SCHEME
    }
}
