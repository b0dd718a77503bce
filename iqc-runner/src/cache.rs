//! Evaluation cache: one JSON file per evaluation id.
//!
//! The evaluation id is a content fingerprint of the analyte config, the
//! options and the runs, so a hit is always safe to reuse.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runner::AnalyteEvaluation;

/// Directory of evaluated analytes, keyed by [`evaluation_id`].
///
/// Entries are plain pretty-printed JSON, the same format as
/// `evaluation.json` in an artifact bundle, so a cached file can be inspected
/// or copied by hand.
///
/// [`evaluation_id`]: crate::runner::evaluation_id
#[derive(Debug, Clone)]
pub struct EvaluationCache {
    cache_dir: PathBuf,
}

impl EvaluationCache {
    /// Creates the cache, creating `cache_dir` if needed.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("failed to create cache directory {}", cache_dir.display())
        })?;

        Ok(Self { cache_dir })
    }

    /// Directory holding the cached `<evaluation_id>.json` files.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Checks whether an entry file exists for the id, without reading it.
    pub fn contains(&self, evaluation_id: &str) -> bool {
        self.entry_path(evaluation_id).exists()
    }

    /// Retrieves a cached evaluation.
    ///
    /// Returns `None` if nothing is cached under the id, or if the stored
    /// evaluation carries a different id (a renamed or hand-edited file).
    /// Unreadable or unparsable entries are errors.
    pub fn get(&self, evaluation_id: &str) -> Result<Option<AnalyteEvaluation>> {
        let path = self.entry_path(evaluation_id);

        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path).context("failed to read cached evaluation")?;
        let evaluation: AnalyteEvaluation =
            serde_json::from_str(&json).context("failed to deserialize cached evaluation")?;

        if evaluation.evaluation_id != evaluation_id {
            return Ok(None);
        }
        Ok(Some(evaluation))
    }

    /// Stores an evaluation under its own `evaluation_id`, replacing any
    /// existing entry.
    pub fn put(&self, evaluation: &AnalyteEvaluation) -> Result<()> {
        let path = self.entry_path(&evaluation.evaluation_id);
        let json =
            serde_json::to_string_pretty(evaluation).context("failed to serialize evaluation")?;
        std::fs::write(&path, json).context("failed to write cached evaluation")?;
        Ok(())
    }

    /// Removes one entry. Missing entries are not an error.
    pub fn remove(&self, evaluation_id: &str) -> Result<()> {
        let path = self.entry_path(evaluation_id);
        if path.exists() {
            std::fs::remove_file(&path).context("failed to remove cached evaluation")?;
        }
        Ok(())
    }

    /// Removes every cached evaluation; other files in the directory are left alone.
    pub fn clear(&self) -> Result<()> {
        for path in self.json_files()? {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Number of cached evaluations.
    pub fn len(&self) -> Result<usize> {
        Ok(self.json_files()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn json_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.cache_dir)
            .with_context(|| format!("failed to list {}", self.cache_dir.display()))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .collect())
    }

    fn entry_path(&self, evaluation_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{evaluation_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::tests::sample_evaluation;

    #[test]
    fn put_then_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = EvaluationCache::new(temp_dir.path()).unwrap();
        let evaluation = sample_evaluation();
        let id = evaluation.evaluation_id.clone();

        assert!(!cache.contains(&id));
        assert!(cache.get(&id).unwrap().is_none());

        cache.put(&evaluation).unwrap();

        assert!(cache.contains(&id));
        let cached = cache.get(&id).unwrap().unwrap();
        assert_eq!(cached.evaluation_id, id);
        assert_eq!(cached.violations, evaluation.violations);
    }

    #[test]
    fn remove_and_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = EvaluationCache::new(temp_dir.path()).unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "keep me").unwrap();

        for i in 0..3 {
            let mut evaluation = sample_evaluation();
            evaluation.evaluation_id = format!("eval_{i}");
            cache.put(&evaluation).unwrap();
        }
        assert_eq!(cache.len().unwrap(), 3);

        cache.remove("eval_1").unwrap();
        assert!(!cache.contains("eval_1"));
        assert_eq!(cache.len().unwrap(), 2);

        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[test]
    fn entry_under_a_foreign_id_is_a_miss() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = EvaluationCache::new(temp_dir.path()).unwrap();
        let evaluation = sample_evaluation();
        cache.put(&evaluation).unwrap();

        let original = temp_dir
            .path()
            .join(format!("{}.json", evaluation.evaluation_id));
        std::fs::rename(&original, temp_dir.path().join("renamed.json")).unwrap();

        assert!(cache.contains("renamed"));
        assert!(cache.get("renamed").unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = EvaluationCache::new(temp_dir.path()).unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();

        let err = cache.get("broken").unwrap_err();
        assert!(err.to_string().contains("failed to deserialize cached evaluation"));
    }

    #[test]
    fn creates_nested_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let cache = EvaluationCache::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(cache.dir(), nested.as_path());
    }
}
