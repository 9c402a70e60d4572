//! Named workflow storage.
//!
//! [`DirectoryWorkflowStore`] serves every `*.json` file in one directory;
//! the file stem is the workflow name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::graph::GraphFormat;
use crate::types::Timestamp;

const WORKFLOW_EXTENSION: &str = "json";

/// One entry of a workflow listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSummary {
    /// File name including extension.
    pub id: String,
    /// Workflow name (file stem), used to load and run it.
    pub name: String,
    pub modified_at: Timestamp,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn list(&self) -> Result<Vec<WorkflowSummary>, CoreError>;

    /// Load and classify a workflow by name (a trailing `.json` is accepted).
    async fn load(&self, name: &str) -> Result<GraphFormat, CoreError>;
}

/// Workflow store over a directory of JSON files.
pub struct DirectoryWorkflowStore {
    dir: PathBuf,
}

impl DirectoryWorkflowStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a workflow name to a file inside the store directory.
    ///
    /// Names that could escape the directory resolve to nothing.
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let stem = name.strip_suffix(".json").unwrap_or(name);
        if stem.is_empty()
            || stem.contains(['/', '\\'])
            || stem.contains("..")
        {
            return None;
        }
        Some(self.dir.join(format!("{stem}.{WORKFLOW_EXTENSION}")))
    }
}

#[async_trait]
impl WorkflowStore for DirectoryWorkflowStore {
    async fn list(&self) -> Result<Vec<WorkflowSummary>, CoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir = %self.dir.display(), "Workflow directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(CoreError::Internal(format!(
                    "Failed to read workflow directory {}: {e}",
                    self.dir.display()
                )))
            }
        };

        let mut workflows = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(WORKFLOW_EXTENSION) {
                continue;
            }
            let (Some(file_name), Some(stem)) = (
                path.file_name().and_then(|n| n.to_str()),
                path.file_stem().and_then(|n| n.to_str()),
            ) else {
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable workflow");
                    continue;
                }
            };
            let modified_at = metadata
                .modified()
                .map(Timestamp::from)
                .unwrap_or_else(|_| chrono::Utc::now());

            workflows.push(WorkflowSummary {
                id: file_name.to_string(),
                name: stem.to_string(),
                modified_at,
            });
        }

        workflows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workflows)
    }

    async fn load(&self, name: &str) -> Result<GraphFormat, CoreError> {
        let not_found = || CoreError::not_found("Workflow", name);
        let path = self.path_for(name).ok_or_else(not_found)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(CoreError::Internal(format!(
                    "Failed to read workflow {}: {e}",
                    path.display()
                )))
            }
        };

        let document: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::UnsupportedFormat(format!("Workflow '{name}' is not valid JSON: {e}"))
        })?;

        GraphFormat::classify(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn write(dir: &Path, file: &str, contents: &str) {
        std::fs::write(dir.join(file), contents).unwrap();
    }

    #[tokio::test]
    async fn lists_only_json_files_sorted_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "portrait.json", "{}");
        write(tmp.path(), "basic_txt2img.json", "{}");
        write(tmp.path(), "notes.txt", "ignore me");
        std::fs::create_dir(tmp.path().join("nested.json")).unwrap();

        let store = DirectoryWorkflowStore::new(tmp.path());
        let list = store.list().await.unwrap();

        let names: Vec<_> = list.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["basic_txt2img", "portrait"]);
        assert_eq!(list[0].id, "basic_txt2img.json");
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryWorkflowStore::new(tmp.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_accepts_name_with_or_without_extension() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "basic.json",
            r#"{"3": {"class_type": "KSampler", "inputs": {"seed": 1}}}"#,
        );
        let store = DirectoryWorkflowStore::new(tmp.path());

        let a = store.load("basic").await.unwrap();
        let b = store.load("basic.json").await.unwrap();
        assert_eq!(a, b);
        assert_matches!(a, GraphFormat::NodeMap(_));
    }

    #[tokio::test]
    async fn load_classifies_list_format() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "ui.json", r#"{"nodes": [{"id": 1}], "links": []}"#);
        let store = DirectoryWorkflowStore::new(tmp.path());
        assert_matches!(store.load("ui").await.unwrap(), GraphFormat::List(_));
    }

    #[tokio::test]
    async fn missing_workflow_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryWorkflowStore::new(tmp.path());
        assert_matches!(
            store.load("nope").await,
            Err(CoreError::NotFound { entity: "Workflow", id }) if id == "nope"
        );
    }

    #[tokio::test]
    async fn traversal_names_are_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryWorkflowStore::new(tmp.path().join("workflows"));
        write(tmp.path(), "secret.json", "{}");
        for name in ["../secret", "a/b", "..", ""] {
            assert_matches!(store.load(name).await, Err(CoreError::NotFound { .. }));
        }
    }

    #[tokio::test]
    async fn invalid_json_is_unsupported_format() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "broken.json", "{ not json");
        let store = DirectoryWorkflowStore::new(tmp.path());
        assert_matches!(
            store.load("broken").await,
            Err(CoreError::UnsupportedFormat(_))
        );
    }
}
