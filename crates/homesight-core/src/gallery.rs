//! Persisted identity gallery — name → embedding, JSON on disk.
//!
//! The document is a single JSON object mapping each registered name to its
//! flat float embedding. Saves replace the whole document atomically
//! (temp file + rename); loads never fail the caller — a missing store is
//! an empty gallery, and an unreadable one is recovered to empty with the
//! damaged file set aside and the recovery reported.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::Embedding;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What `load` found on disk. `Recovered` is the corruption case the
/// service surfaces instead of silently starting over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No persisted store yet.
    Fresh,
    /// Store read cleanly, with this many entries.
    Loaded(usize),
    /// Store was unreadable or malformed; the damaged file was moved to
    /// `backup` (when the move itself succeeded) and the gallery is empty.
    Recovered { backup: Option<PathBuf> },
}

/// In-memory gallery of registered identities.
///
/// Names are unique keys; re-registering a name overwrites its embedding.
/// Mutations touch memory only — callers persist explicitly with [`save`],
/// which is how a registration keeps insert+save inside one transaction
/// boundary.
///
/// [`save`]: IdentityGallery::save
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IdentityGallery {
    entries: BTreeMap<String, Embedding>,
}

impl IdentityGallery {
    /// Load the persisted gallery, never failing the caller.
    pub fn load(path: &Path) -> (Self, LoadOutcome) {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (Self::default(), LoadOutcome::Fresh);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "gallery unreadable, recovering to empty");
                return (Self::default(), LoadOutcome::Recovered { backup: quarantine(path) });
            }
        };

        match parse_document(&text) {
            Ok(entries) => {
                let outcome = LoadOutcome::Loaded(entries.len());
                (Self { entries }, outcome)
            }
            Err(reason) => {
                tracing::error!(path = %path.display(), reason, "gallery malformed, recovering to empty");
                (Self::default(), LoadOutcome::Recovered { backup: quarantine(path) })
            }
        }
    }

    /// Persist the full gallery, replacing the prior document atomically.
    pub fn save(&self, path: &Path) -> Result<(), GalleryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string(&self.entries)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Insert or overwrite one identity (last write wins).
    pub fn insert(&mut self, name: impl Into<String>, embedding: Embedding) {
        self.entries.insert(name.into(), embedding);
    }

    /// Remove one identity; false if the name was never registered.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Embedding> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Embedding)> {
        self.entries.iter().map(|(name, e)| (name.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse and validate the persisted document: valid JSON object, and every
/// embedding non-empty with one shared dimension.
fn parse_document(text: &str) -> Result<BTreeMap<String, Embedding>, String> {
    let entries: BTreeMap<String, Embedding> =
        serde_json::from_str(text).map_err(|e| e.to_string())?;

    let mut dim = None;
    for (name, embedding) in &entries {
        if embedding.values.is_empty() {
            return Err(format!("entry {name:?} has an empty embedding"));
        }
        match dim {
            None => dim = Some(embedding.dim()),
            Some(d) if d != embedding.dim() => {
                return Err(format!(
                    "entry {name:?} has dimension {}, expected {d}",
                    embedding.dim()
                ));
            }
            Some(_) => {}
        }
    }
    Ok(entries)
}

/// Move a damaged store aside so the next save cannot destroy evidence.
fn quarantine(path: &Path) -> Option<PathBuf> {
    let backup = path.with_extension("json.corrupt");
    match std::fs::rename(path, &backup) {
        Ok(()) => Some(backup),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not set damaged gallery aside");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_load_missing_is_fresh_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (gallery, outcome) = IdentityGallery::load(&dir.path().join("gallery.json"));
        assert!(gallery.is_empty());
        assert_eq!(outcome, LoadOutcome::Fresh);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");

        let mut gallery = IdentityGallery::default();
        gallery.insert("alice", embedding(&[0.25, -0.5, 1.0]));
        gallery.insert("bob", embedding(&[0.0, 0.125, -1.0]));
        gallery.save(&path).unwrap();

        let (loaded, outcome) = IdentityGallery::load(&path);
        assert_eq!(outcome, LoadOutcome::Loaded(2));
        assert_eq!(loaded.names(), vec!["alice", "bob"]);
        for (name, original) in gallery.iter() {
            let restored = loaded.get(name).unwrap();
            for (a, b) in original.values.iter().zip(&restored.values) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut gallery = IdentityGallery::default();
        gallery.insert("alice", embedding(&[1.0, 0.0]));
        gallery.insert("alice", embedding(&[0.0, 1.0]));
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.get("alice"), Some(&embedding(&[0.0, 1.0])));
    }

    #[test]
    fn test_remove() {
        let mut gallery = IdentityGallery::default();
        gallery.insert("alice", embedding(&[1.0]));
        assert!(gallery.remove("alice"));
        assert!(!gallery.remove("alice"));
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_malformed_store_recovers_and_quarantines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        std::fs::write(&path, "{ not json").unwrap();

        let (gallery, outcome) = IdentityGallery::load(&path);
        assert!(gallery.is_empty());
        let backup = match outcome {
            LoadOutcome::Recovered { backup } => backup,
            other => panic!("expected recovery, got {other:?}"),
        };
        let backup = backup.unwrap();
        assert!(backup.exists());
        assert!(!path.exists(), "damaged file should have been moved aside");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
    }

    #[test]
    fn test_mismatched_dimensions_recover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        std::fs::write(&path, r#"{"alice":[1.0,0.0],"bob":[1.0,0.0,0.0]}"#).unwrap();

        let (gallery, outcome) = IdentityGallery::load(&path);
        assert!(gallery.is_empty());
        assert!(matches!(outcome, LoadOutcome::Recovered { .. }));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");

        let mut gallery = IdentityGallery::default();
        gallery.insert("alice", embedding(&[1.0]));
        gallery.save(&path).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["gallery.json"]);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/gallery.json");
        IdentityGallery::default().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_document_shape_is_flat_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");

        let mut gallery = IdentityGallery::default();
        gallery.insert("alice", embedding(&[1.0, 0.5]));
        gallery.save(&path).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["alice"], serde_json::json!([1.0, 0.5]));
    }
}
