//! Definition repository contract and backend selection.
//!
//! # Responsibilities
//! - Define the uniform fetch-all/close contract over definition backends
//! - Select the concrete backend from the connection DSN scheme
//! - Expose the optional push-based change-watch
//!
//! # Design Decisions
//! - Backends always return a full, consistent snapshot, never a delta;
//!   reload correctness must not depend on message ordering.
//! - Watch only signals "something changed"; the changed rows are never
//!   delivered through the channel.
//! - An unrecognized scheme is a fatal startup error, never a silent
//!   default.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use url::Url;

use crate::api::file_repository::FileSystemRepository;
use crate::api::mongo_repository::MongoRepository;
use crate::api::postgres_repository::PostgresRepository;
use crate::api::Definition;

pub(crate) const MONGODB_SCHEME: &str = "mongodb";
pub(crate) const FILE_SCHEME: &str = "file";
pub(crate) const POSTGRES_SCHEME: &str = "postgres";

/// Signal that the stored configuration changed and must be re-fetched.
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationChanged;

/// Errors produced by definition repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid repository DSN: {0}")]
    InvalidDsn(#[from] url::ParseError),

    #[error("the scheme {0} is not supported to load API definitions")]
    UnsupportedScheme(String),

    #[error("definition path not found: {0}")]
    PathNotFound(String),

    #[error("the DSN names no database")]
    MissingDatabase,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Uniform contract over definition backends.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Fetch the full definition snapshot.
    async fn find_all(&self) -> Result<Vec<Definition>, RepositoryError>;

    /// Release backend resources.
    async fn close(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    /// Start a background change-watch, signalling through `tx`.
    ///
    /// Returns whether a watch loop was started; backends without change
    /// detection keep the default and rely on the cluster notifier.
    fn watch(
        &self,
        _shutdown: broadcast::Receiver<()>,
        _tx: mpsc::Sender<ConfigurationChanged>,
    ) -> bool {
        false
    }

    /// The scheme this backend was selected by.
    fn kind(&self) -> &'static str;
}

/// Create the repository matching the DSN scheme.
pub async fn build_repository(
    dsn: &str,
    refresh: Duration,
) -> Result<Arc<dyn Repository>, RepositoryError> {
    let url = Url::parse(dsn)?;

    match url.scheme() {
        MONGODB_SCHEME => {
            tracing::debug!("MongoDB configuration chosen");
            Ok(Arc::new(MongoRepository::connect(dsn, refresh).await?))
        }
        FILE_SCHEME => {
            tracing::debug!("File system based configuration chosen");
            let api_path = format!("{}/apis", url.path());

            tracing::debug!(api_path = %api_path, "Trying to load configuration files");
            Ok(Arc::new(FileSystemRepository::new(api_path)?))
        }
        POSTGRES_SCHEME => {
            tracing::debug!("Postgres configuration chosen");
            Ok(Arc::new(PostgresRepository::connect(dsn)?))
        }
        other => Err(RepositoryError::UnsupportedScheme(other.to_string())),
    }
}
