use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::agent_error::AgentError;
use crate::error::{Error, Result};

/// Documents the underwriting flow expects to find.
pub const EXPECTED_DOCUMENTS: [&str; 3] = ["gst", "itr", "bank_statement"];

/// Read-only store of `<data_type>.json` documents in one directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `data_type` inside the root. Only plain file stems are
    /// accepted, so absolute paths and `..` never leave the directory.
    fn path_for(&self, data_type: &str) -> Result<PathBuf> {
        let mut components = Path::new(data_type).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !data_type.contains(['/', '\\', '\0']);

        if !plain {
            return Err(Error::AgentError(AgentError::InvalidDocument {
                data_type: data_type.to_string(),
                reason: "not a plain document name".to_string(),
            }));
        }
        Ok(self.root.join(format!("{}.json", data_type)))
    }

    /// Sorted document types available on disk. A missing directory is empty.
    pub async fn list_available(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut available = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                available.push(stem.to_string());
            }
        }

        available.sort();
        Ok(available)
    }

    pub async fn fetch(&self, data_type: &str) -> Result<Value> {
        let path = self.path_for(data_type)?;
        debug!("Loading document {}", path.display());

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::AgentError(AgentError::DocumentNotFound(
                    data_type.to_string(),
                )));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|e| {
            Error::AgentError(AgentError::InvalidDocument {
                data_type: data_type.to_string(),
                reason: e.to_string(),
            })
        })
    }

    /// Entries of `expected` that have no document on disk.
    pub async fn missing(&self, expected: &[&str]) -> Result<Vec<String>> {
        let available = self.list_available().await?;
        Ok(expected
            .iter()
            .filter(|doc| !available.iter().any(|a| a.as_str() == **doc))
            .map(|doc| doc.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gst.json"), r#"{"turnover": 1200000}"#).unwrap();
        std::fs::write(dir.path().join("itr.json"), r#"{"income": 450000}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let store = DocumentStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_list_available_only_json() {
        let (_dir, store) = seeded_store();

        let available = store.list_available().await.unwrap();
        assert_eq!(available, vec!["broken", "gst", "itr"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("nope"));

        assert!(store.list_available().await.unwrap().is_empty());
        assert_eq!(
            store.missing(&EXPECTED_DOCUMENTS).await.unwrap(),
            vec!["gst", "itr", "bank_statement"]
        );
    }

    #[tokio::test]
    async fn test_fetch() {
        let (_dir, store) = seeded_store();

        assert_eq!(store.fetch("gst").await.unwrap(), json!({"turnover": 1200000}));

        let err = store.fetch("bank_statement").await.unwrap_err();
        assert!(matches!(err, Error::AgentError(AgentError::DocumentNotFound(_))));
        assert_eq!(err.to_string(), "agent error: Data file bank_statement.json not found");

        let err = store.fetch("broken").await.unwrap_err();
        assert!(matches!(
            err,
            Error::AgentError(AgentError::InvalidDocument { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_expected_documents() {
        let (_dir, store) = seeded_store();

        assert_eq!(
            store.missing(&EXPECTED_DOCUMENTS).await.unwrap(),
            vec!["bank_statement"]
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_paths_outside_root() {
        let (_dir, store) = seeded_store();
        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("secret.json"), r#"{"pin": 4321}"#).unwrap();
        let absolute = other.path().join("secret");

        for data_type in [
            absolute.to_str().unwrap(),
            "../secret",
            "..",
            ".",
            "",
            "nested/gst",
            "gst\\..",
        ] {
            let err = store.fetch(data_type).await.unwrap_err();
            assert!(
                matches!(err, Error::AgentError(AgentError::InvalidDocument { .. })),
                "{:?} was not rejected",
                data_type
            );
            assert!(!err.to_string().contains("4321"));
        }

        assert!(store.fetch("gst").await.is_ok());
    }
}
