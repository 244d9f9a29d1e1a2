//! Filesystem definition backend.
//!
//! Treats a directory as a list of one-definition-per-file JSON documents.
//! A malformed document is logged and skipped; the remaining valid
//! documents are still returned, so a single bad file never takes down the
//! whole set of APIs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::{broadcast, mpsc};

use crate::api::repository::{ConfigurationChanged, Repository, RepositoryError, FILE_SCHEME};
use crate::api::Definition;

pub struct FileSystemRepository {
    path: PathBuf,
}

impl FileSystemRepository {
    /// Create a repository over an existing definition directory.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(RepositoryError::PathNotFound(path.display().to_string()));
        }
        Ok(Self { path })
    }

    fn read_definition(path: &Path) -> Result<Definition, String> {
        let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&content).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Repository for FileSystemRepository {
    /// Re-read the directory on every call so a reload always observes the
    /// current on-disk state.
    async fn find_all(&self) -> Result<Vec<Definition>, RepositoryError> {
        let mut definitions = Vec::new();

        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match Self::read_definition(&path) {
                Ok(definition) => definitions.push(definition),
                Err(error) => {
                    // Partial success: keep serving the valid files.
                    tracing::error!(
                        file = %path.display(),
                        error = %error,
                        "Skipping malformed API definition"
                    );
                }
            }
        }

        Ok(definitions)
    }

    fn watch(
        &self,
        mut shutdown: broadcast::Receiver<()>,
        tx: mpsc::Sender<ConfigurationChanged>,
    ) -> bool {
        let path = self.path.clone();

        let mut watcher = match RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::info!("API definition change detected");
                        // try_send coalesces bursts; the reload re-reads
                        // everything anyway.
                        let _ = tx.try_send(ConfigurationChanged);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create definition watcher");
                return false;
            }
        };

        if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
            tracing::error!(error = %e, path = %path.display(), "Failed to watch definition directory");
            return false;
        }

        tracing::info!(path = %path.display(), "Definition watcher started");

        // The watcher stops when dropped; park it until shutdown.
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drop(watcher);
        });

        true
    }

    fn kind(&self) -> &'static str {
        FILE_SCHEME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_definition(dir: &Path, name: &str) {
        let body = format!(
            r#"{{"name": "{name}", "listen_path": "/{name}", "upstream_url": "http://{name}:8080"}}"#
        );
        std::fs::write(dir.join(format!("{name}.json")), body).unwrap();
    }

    #[tokio::test]
    async fn test_loads_one_definition_per_file() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(dir.path(), "users");
        write_definition(dir.path(), "orders");

        let repo = FileSystemRepository::new(dir.path()).unwrap();
        let mut names: Vec<String> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        names.sort();

        assert_eq!(names, vec!["orders", "users"]);
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(dir.path(), "users");
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let repo = FileSystemRepository::new(dir.path()).unwrap();
        let definitions = repo.find_all().await.unwrap();

        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "users");
    }

    #[tokio::test]
    async fn test_non_json_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(dir.path(), "users");
        std::fs::write(dir.path().join("README.md"), "# not a definition").unwrap();

        let repo = FileSystemRepository::new(dir.path()).unwrap();
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(FileSystemRepository::new("/does/not/exist").is_err());
    }
}
