//! OAuth spec repositories.
//!
//! Same backend triple and scheme selection as the definition repository;
//! OAuth specs are fetched as full snapshots alongside definitions on every
//! reload.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Database};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use url::Url;

use crate::api::repository::{RepositoryError, FILE_SCHEME, MONGODB_SCHEME, POSTGRES_SCHEME};
use crate::oauth::OAuthSpec;

const COLLECTION: &str = "oauth_servers";

/// Uniform contract over OAuth spec backends.
#[async_trait]
pub trait OAuthRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<OAuthSpec>, RepositoryError>;

    async fn close(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Create the OAuth repository matching the DSN scheme.
pub async fn build_oauth_repository(
    dsn: &str,
) -> Result<Arc<dyn OAuthRepository>, RepositoryError> {
    let url = Url::parse(dsn)?;

    match url.scheme() {
        MONGODB_SCHEME => Ok(Arc::new(MongoOAuthRepository::connect(dsn).await?)),
        FILE_SCHEME => Ok(Arc::new(FileSystemOAuthRepository::new(format!(
            "{}/oauth_servers",
            url.path()
        )))),
        POSTGRES_SCHEME => Ok(Arc::new(PostgresOAuthRepository::connect(dsn)?)),
        other => Err(RepositoryError::UnsupportedScheme(other.to_string())),
    }
}

/// Filesystem backend: one OAuth spec document per file.
pub struct FileSystemOAuthRepository {
    path: PathBuf,
}

impl FileSystemOAuthRepository {
    /// A missing directory is not an error here: OAuth specs are optional
    /// and most file-backed deployments configure none.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OAuthRepository for FileSystemOAuthRepository {
    async fn find_all(&self) -> Result<Vec<OAuthSpec>, RepositoryError> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }

        let mut specs = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
            {
                Ok(spec) => specs.push(spec),
                Err(error) => {
                    tracing::error!(
                        file = %path.display(),
                        error = %error,
                        "Skipping malformed OAuth spec"
                    );
                }
            }
        }

        Ok(specs)
    }
}

/// MongoDB backend over the `oauth_servers` collection.
pub struct MongoOAuthRepository {
    client: Client,
    database: Database,
}

impl MongoOAuthRepository {
    pub async fn connect(dsn: &str) -> Result<Self, RepositoryError> {
        let client = Client::with_uri_str(dsn).await?;
        let database = client
            .default_database()
            .ok_or(RepositoryError::MissingDatabase)?;
        Ok(Self { client, database })
    }
}

#[async_trait]
impl OAuthRepository for MongoOAuthRepository {
    async fn find_all(&self) -> Result<Vec<OAuthSpec>, RepositoryError> {
        let cursor = self
            .database
            .collection::<OAuthSpec>(COLLECTION)
            .find(doc! {})
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn close(&self) -> Result<(), RepositoryError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// Postgres backend: one JSON document per row.
pub struct PostgresOAuthRepository {
    pool: PgPool,
}

impl PostgresOAuthRepository {
    pub fn connect(dsn: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new().max_connections(2).connect_lazy(dsn)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl OAuthRepository for PostgresOAuthRepository {
    async fn find_all(&self) -> Result<Vec<OAuthSpec>, RepositoryError> {
        let rows: Vec<(Json<OAuthSpec>,)> =
            sqlx::query_as("SELECT spec FROM oauth_servers")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(Json(spec),)| spec).collect())
    }

    async fn close(&self) -> Result<(), RepositoryError> {
        self.pool.close().await;
        Ok(())
    }
}
