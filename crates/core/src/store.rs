//! Document repositories keyed by `problem_id`.
//!
//! The filename convention is the join key between categories:
//! `{id}.qmd` for problems, `{id}_solution.qmd` for solutions and
//! `{id}_handout.qmd` for presentation documents.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::StoreError;

pub const PROBLEM_SUFFIX: &str = ".qmd";
pub const SOLUTION_SUFFIX: &str = "_solution.qmd";
pub const HANDOUT_SUFFIX: &str = "_handout.qmd";

pub trait DocumentStore {
    fn get(&self, id: &str) -> Result<Option<String>, StoreError>;

    /// All ids, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn put(&self, id: &str, text: &str) -> Result<(), StoreError>;

    /// Creates the document only if `id` is absent. Returns `false` (and
    /// writes nothing) when it already exists.
    fn put_new(&self, id: &str, text: &str) -> Result<bool, StoreError>;

    fn exists(&self, id: &str) -> bool;
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    let bad = id.trim().is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Storage root layout: one directory per document category.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn problems_dir(&self) -> PathBuf {
        self.root.join("problems")
    }

    pub fn solutions_dir(&self) -> PathBuf {
        self.root.join("solutions")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn problems(&self) -> FsStore {
        FsStore::new(self.problems_dir(), PROBLEM_SUFFIX)
    }

    pub fn solutions(&self) -> FsStore {
        FsStore::new(self.solutions_dir(), SOLUTION_SUFFIX)
    }

    pub fn handouts(&self) -> FsStore {
        FsStore::new(self.output_dir(), HANDOUT_SUFFIX)
    }
}

/// Flat directory of `{id}{suffix}` files.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
    suffix: String,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{}", self.suffix))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|err| StoreError::io(&self.dir, err))
    }
}

impl DocumentStore for FsStore {
    fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
        validate_id(id)?;
        let path = self.path_for(id);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.dir, err)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io(&self.dir, err))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(self.suffix.as_str()) {
                if !id.is_empty() {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn put(&self, id: &str, text: &str) -> Result<(), StoreError> {
        validate_id(id)?;
        self.ensure_dir()?;
        let path = self.path_for(id);
        fs::write(&path, text).map_err(|err| StoreError::io(path, err))
    }

    fn put_new(&self, id: &str, text: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        self.ensure_dir()?;
        let path = self.path_for(id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(StoreError::io(path, err)),
        };
        file.write_all(text.as_bytes())
            .map_err(|err| StoreError::io(&path, err))?;
        Ok(true)
    }

    fn exists(&self, id: &str) -> bool {
        validate_id(id).is_ok() && self.path_for(id).is_file()
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, K, V>(docs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = docs
            .into_iter()
            .map(|(id, text)| (id.into(), text.into()))
            .collect();
        Self {
            docs: RwLock::new(map),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
        validate_id(id)?;
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.keys().cloned().collect())
    }

    fn put(&self, id: &str, text: &str) -> Result<(), StoreError> {
        validate_id(id)?;
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        docs.insert(id.to_string(), text.to_string());
        Ok(())
    }

    fn put_new(&self, id: &str, text: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        if docs.contains_key(id) {
            return Ok(false);
        }
        docs.insert(id.to_string(), text.to_string());
        Ok(true)
    }

    fn exists(&self, id: &str) -> bool {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fs_store_uses_suffix_convention() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let problems = layout.problems();
        let solutions = layout.solutions();
        problems.put("a-1", "problem").unwrap();
        solutions.put("a-1", "solution").unwrap();
        assert!(layout.problems_dir().join("a-1.qmd").is_file());
        assert!(layout.solutions_dir().join("a-1_solution.qmd").is_file());
        assert_eq!(problems.list().unwrap(), vec!["a-1"]);
        assert_eq!(solutions.list().unwrap(), vec!["a-1"]);
        assert_eq!(problems.get("a-1").unwrap().as_deref(), Some("problem"));
        assert_eq!(problems.get("missing").unwrap(), None);
    }

    #[test]
    fn put_new_is_first_writer_wins() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path().join("problems"), PROBLEM_SUFFIX);
        assert!(store.put_new("x", "first").unwrap());
        assert!(!store.put_new("x", "second").unwrap());
        assert_eq!(store.get("x").unwrap().as_deref(), Some("first"));

        let memory = MemoryStore::new();
        assert!(memory.put_new("x", "first").unwrap());
        assert!(!memory.put_new("x", "second").unwrap());
        assert_eq!(memory.get("x").unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn listing_a_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path().join("nope"), PROBLEM_SUFFIX);
        assert!(store.list().unwrap().is_empty());
        assert!(!store.exists("x"));
    }

    #[test]
    fn ids_with_path_components_are_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.put("../escape", "x"),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(store.get("a/b"), Err(StoreError::InvalidId(_))));
    }
}
