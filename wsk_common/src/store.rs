//! Generic document-storage interface.
//!
//! This module defines the [`DocumentStore`] trait, the persistence seam of
//! the service: named collections of JSON documents addressed by id.
//! Implementations can back this with various storage backends while the
//! store layer controls what is stored and enforces uniqueness.

use crate::Error;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// A named-collection document storage interface.
///
/// This trait uses `&self` for all methods, allowing implementations to use
/// interior mutability for thread-safe access. Values are `Vec<u8>` holding
/// serialized JSON documents.
///
/// See [`MemoryStore`] for a simple in-memory implementation and
/// [`FileStore`] for the durable one.
pub trait DocumentStore: Send + Sync + Debug {
    /// Retrieve a document by collection and id.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Insert or replace a document.
    fn put(&self, collection: &str, id: &str, bytes: &[u8]) -> Result<(), Error>;

    /// Remove a document.
    ///
    /// Returns `Ok(())` even if the document did not exist.
    fn delete(&self, collection: &str, id: &str) -> Result<(), Error>;

    /// All `(id, document)` pairs in a collection, in no particular order.
    fn list(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, Error>;
}

/// A simple in-memory implementation of [`DocumentStore`].
///
/// Useful for testing or ephemeral storage scenarios.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self
            .data
            .lock()
            .expect("lock poisoned")
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    fn put(&self, collection: &str, id: &str, bytes: &[u8]) -> Result<(), Error> {
        self.data
            .lock()
            .expect("lock poisoned")
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        if let Some(c) = self.data.lock().expect("lock poisoned").get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
        Ok(self
            .data
            .lock()
            .expect("lock poisoned")
            .get(collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

/// A [`DocumentStore`] storing one file per document under
/// `<root>/<collection>/<id>.json`.
///
/// Ids are escaped so that any id is a valid file name on every platform.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a `FileStore` rooted at `root`, creating the directory if
    /// needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FileStore { root })
    }

    fn path(&self, collection: &str, id: &str) -> PathBuf {
        let mut path = self.root.join(collection);
        path.push(format!("{}.json", escape_id(id)));
        path
    }
}

impl DocumentStore for FileStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, Error> {
        match fs::read(self.path(collection, id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, collection: &str, id: &str, bytes: &[u8]) -> Result<(), Error> {
        let path = self.path(collection, id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        // Write to a sibling temp file first so readers never see a torn doc.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        match fs::remove_file(self.path(collection, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let dir = self.root.join(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut result = vec![];
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(escaped) = name.strip_suffix(".json") else {
                continue;
            };
            let id = unescape_id(escaped)?;
            result.push((id, fs::read(&path)?));
        }
        Ok(result)
    }
}

/// Escape an id into a portable file name: `[A-Za-z0-9._-]` pass through,
/// everything else becomes `%XX`.
fn escape_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(b as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn unescape_id(escaped: &str) -> Result<String, Error> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped
                .get(i + 1..i + 3)
                .ok_or_else(|| Error::Generic(format!("truncated escape in id {escaped:?}")))?;
            out.push(
                u8::from_str_radix(hex, 16)
                    .map_err(|_| Error::Generic(format!("bad escape in id {escaped:?}")))?,
            );
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Error::Generic(format!("non-utf8 id {escaped:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn DocumentStore) {
        assert_eq!(store.get("subs", "a1").unwrap(), None);

        store.put("subs", "a1", b"{\"x\":1}").unwrap();
        assert_eq!(store.get("subs", "a1").unwrap(), Some(b"{\"x\":1}".to_vec()));

        store.put("subs", "a1", b"{\"x\":2}").unwrap();
        assert_eq!(store.get("subs", "a1").unwrap(), Some(b"{\"x\":2}".to_vec()));

        store.put("utxos", "txid:0", b"{}").unwrap();
        let mut all = store.list("subs").unwrap();
        all.sort();
        assert_eq!(all, vec![("a1".to_string(), b"{\"x\":2}".to_vec())]);
        assert_eq!(store.list("utxos").unwrap()[0].0, "txid:0");
        assert_eq!(store.list("empty").unwrap(), vec![]);

        store.delete("subs", "a1").unwrap();
        assert_eq!(store.get("subs", "a1").unwrap(), None);
        store.delete("subs", "a1").unwrap();
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let tempdir = TempDir::new().unwrap();
        exercise(&FileStore::new(tempdir.path().join("docs")).unwrap());
    }

    #[test]
    fn test_file_store_reopen() {
        let tempdir = TempDir::new().unwrap();
        let root = tempdir.path().join("docs");
        {
            let store = FileStore::new(&root).unwrap();
            store.put("state", "cursor", b"42").unwrap();
        }
        let store = FileStore::new(&root).unwrap();
        assert_eq!(store.get("state", "cursor").unwrap(), Some(b"42".to_vec()));
    }

    #[test]
    fn test_id_escaping() {
        for id in ["plain", "txid:7", "JT-ABC123", "odd/../id", "100%"] {
            assert_eq!(unescape_id(&escape_id(id)).unwrap(), id);
        }
        assert!(!escape_id("txid:7").contains(':'));
        assert!(!escape_id("odd/../id").contains('/'));
    }
}
