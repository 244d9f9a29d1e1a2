//! MongoDB definition backend.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Database};
use tokio::sync::{broadcast, mpsc};

use crate::api::repository::{ConfigurationChanged, Repository, RepositoryError, MONGODB_SCHEME};
use crate::api::Definition;

const COLLECTION: &str = "api_specs";

pub struct MongoRepository {
    client: Client,
    database: Database,
    refresh: Duration,
}

impl MongoRepository {
    /// Build a client for the DSN. The driver connects lazily, so a fatal
    /// connectivity problem surfaces on the first fetch.
    pub async fn connect(dsn: &str, refresh: Duration) -> Result<Self, RepositoryError> {
        let client = Client::with_uri_str(dsn).await?;
        let database = client
            .default_database()
            .ok_or(RepositoryError::MissingDatabase)?;

        Ok(Self {
            client,
            database,
            refresh,
        })
    }
}

#[async_trait]
impl Repository for MongoRepository {
    /// Fetch the full snapshot; never an incremental delta.
    async fn find_all(&self) -> Result<Vec<Definition>, RepositoryError> {
        let cursor = self
            .database
            .collection::<Definition>(COLLECTION)
            .find(doc! {})
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn close(&self) -> Result<(), RepositoryError> {
        self.client.clone().shutdown().await;
        Ok(())
    }

    /// Re-signal on a fixed interval. The payload carries no rows; the
    /// manager re-fetches the whole set on every signal.
    fn watch(
        &self,
        mut shutdown: broadcast::Receiver<()>,
        tx: mpsc::Sender<ConfigurationChanged>,
    ) -> bool {
        let refresh = self.refresh;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh);
            // The first tick fires immediately; the initial load already
            // happened, so skip it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        let _ = tx.try_send(ConfigurationChanged);
                    }
                }
            }
        });

        true
    }

    fn kind(&self) -> &'static str {
        MONGODB_SCHEME
    }
}
