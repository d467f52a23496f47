//! Generic encrypted snapshot store.
//!
//! Each store keeps its working set in memory and persists the whole
//! set as one encrypted file. Mutations update the map under the lock
//! and enqueue a serialized snapshot to a writer task; the request path
//! never waits for disk. `shutdown()` closes the queue and joins the
//! writer, so every acknowledged mutation is on disk when it returns.
//!
//! Load is deliberately forgiving: a missing file yields an empty store,
//! and an undecryptable or unparseable file is logged and treated as
//! empty. One corrupted store file must not keep the host from starting
//! or touch its sibling stores.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use taskpilot_auth::{AuthError, AuthResult};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::encryption::{CryptoError, EncryptionService};

/// Extracts the map key from a record.
type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// An in-memory record map persisted as a single encrypted file.
pub struct EncryptedSnapshotStore<T> {
    records: Mutex<HashMap<String, T>>,
    key_fn: KeyFn<T>,
    tx: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    write_error: Arc<StdMutex<Option<String>>>,
    path: PathBuf,
}

impl<T> EncryptedSnapshotStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Opens the store, loading whatever the file holds.
    ///
    /// Records rejected by `keep` (expired at load) are dropped. Load
    /// never fails: corruption is logged via `tracing::warn!` and the
    /// store starts empty.
    ///
    /// Spawns the writer task, so this must run inside a Tokio runtime.
    pub fn open(
        path: PathBuf,
        encryption: EncryptionService,
        key_fn: impl Fn(&T) -> String + Send + Sync + 'static,
        keep: impl Fn(&T) -> bool,
    ) -> Self {
        let key_fn: KeyFn<T> = Box::new(key_fn);
        let mut records = HashMap::new();

        match encryption.decrypt_from_file(&path) {
            Ok(plaintext) => match serde_json::from_slice::<Vec<T>>(&plaintext) {
                Ok(loaded) => {
                    let total = loaded.len();
                    for record in loaded.into_iter().filter(|r| keep(r)) {
                        records.insert(key_fn(&record), record);
                    }
                    tracing::debug!(
                        path = %path.display(),
                        loaded = records.len(),
                        dropped = total - records.len(),
                        "loaded store file"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "store file is unparseable, starting empty"
                    );
                }
            },
            Err(CryptoError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::debug!(path = %path.display(), "no store file, starting empty");
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "store file is unreadable, starting empty"
                );
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let write_error = Arc::new(StdMutex::new(None));
        let writer = tokio::spawn(writer_task(
            rx,
            path.clone(),
            encryption,
            Arc::clone(&write_error),
        ));

        Self {
            records: Mutex::new(records),
            key_fn,
            tx: StdMutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            write_error,
            path,
        }
    }

    /// Reads from the record map.
    pub async fn read<R>(&self, f: impl FnOnce(&HashMap<String, T>) -> R) -> R {
        let records = self.records.lock().await;
        f(&records)
    }

    /// Applies a mutation and enqueues a snapshot.
    ///
    /// The closure runs in the same critical section as the snapshot
    /// capture, so the persisted state always corresponds to a state the
    /// map actually held.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store has been shut down.
    pub async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, T>) -> R,
    ) -> AuthResult<R> {
        self.try_mutate(|records| Ok(f(records))).await
    }

    /// Applies a fallible mutation, snapshotting only on success.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or a storage error if the store
    /// has been shut down.
    pub async fn try_mutate<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, T>) -> AuthResult<R>,
    ) -> AuthResult<R> {
        let mut records = self.records.lock().await;
        let result = f(&mut records)?;

        let snapshot: Vec<&T> = records.values().collect();
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| AuthError::storage(format!("snapshot serialization failed: {e}")))?;

        // send while still holding the records lock: snapshots must
        // reach the writer in mutation order, or backlog collapsing
        // could flush a stale state
        let tx = self.tx.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let sent = matches!(tx.as_ref(), Some(tx) if tx.send(bytes).is_ok());
        drop(tx);
        drop(records);

        if sent {
            Ok(result)
        } else {
            Err(AuthError::storage(format!(
                "store {} is shut down",
                self.path.display()
            )))
        }
    }

    /// Inserts a record keyed by `key_fn`.
    ///
    /// # Errors
    ///
    /// Returns a storage error on duplicate key or after shutdown.
    pub async fn insert(&self, record: T) -> AuthResult<()> {
        let key = (self.key_fn)(&record);
        self.try_mutate(move |records| {
            if records.contains_key(&key) {
                return Err(AuthError::storage(format!("duplicate record key: {key}")));
            }
            records.insert(key, record);
            Ok(())
        })
        .await
    }

    /// Looks up a record by key.
    pub async fn get(&self, key: &str) -> Option<T> {
        self.read(|records| records.get(key).cloned()).await
    }

    /// Removes a record, returning `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error after shutdown.
    pub async fn remove(&self, key: &str) -> AuthResult<bool> {
        let key = key.to_string();
        self.mutate(move |records| records.remove(&key).is_some())
            .await
    }

    /// Drops all records rejected by `keep`, returning how many went.
    ///
    /// # Errors
    ///
    /// Returns a storage error after shutdown.
    pub async fn retain(&self, keep: impl Fn(&T) -> bool + Send) -> AuthResult<usize> {
        self.mutate(move |records| {
            let before = records.len();
            records.retain(|_, r| keep(r));
            before - records.len()
        })
        .await
    }

    /// Closes the snapshot queue and joins the writer task.
    ///
    /// When this returns `Ok`, the last enqueued snapshot is durably on
    /// disk. Subsequent mutations fail.
    ///
    /// # Errors
    ///
    /// Surfaces any write error the writer hit, including on its final
    /// flush.
    pub async fn shutdown(&self) -> AuthResult<()> {
        // dropping the sender ends the writer's receive loop
        if let Some(tx) = self.tx.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            drop(tx);
        }

        if let Some(handle) = self.writer.lock().await.take() {
            handle
                .await
                .map_err(|e| AuthError::storage(format!("writer task panicked: {e}")))?;
        }

        let error = self
            .write_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        match error {
            Some(message) => Err(AuthError::storage(message)),
            None => Ok(()),
        }
    }
}

/// Drains snapshots and writes the most recent one to disk.
///
/// Intermediate snapshots that queued up behind a slow write are
/// skipped; only the newest state matters.
async fn writer_task(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    path: PathBuf,
    encryption: EncryptionService,
    write_error: Arc<StdMutex<Option<String>>>,
) {
    while let Some(mut snapshot) = rx.recv().await {
        // collapse the backlog to the latest snapshot
        while let Ok(newer) = rx.try_recv() {
            snapshot = newer;
        }

        match encryption.encrypt_to_file(&path, &snapshot) {
            Ok(()) => {
                write_error
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .take();
            }
            Err(err) => {
                tracing::error!(
                    path = %path.display(),
                    error = %err,
                    "failed to persist store snapshot"
                );
                write_error
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .replace(err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::encryption::KeySource;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        live: bool,
    }

    fn record(name: &str) -> Record {
        Record {
            name: name.to_string(),
            live: true,
        }
    }

    fn encryption(key: [u8; 32]) -> EncryptionService {
        EncryptionService::initialize(KeySource::Provided(key)).unwrap()
    }

    fn open(path: PathBuf, key: [u8; 32]) -> EncryptedSnapshotStore<Record> {
        EncryptedSnapshotStore::open(path, encryption(key), |r: &Record| r.name.clone(), |r| {
            r.live
        })
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path().join("s.enc"), EncryptionService::generate_key());

        store.insert(record("a")).await.unwrap();
        assert_eq!(store.get("a").await, Some(record("a")));
        assert!(store.insert(record("a")).await.is_err());

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert_eq!(store.get("a").await, None);

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.enc");
        let key = EncryptionService::generate_key();

        let store = open(path.clone(), key);
        store.insert(record("a")).await.unwrap();
        store.insert(record("b")).await.unwrap();
        store.remove("a").await.unwrap();
        store.shutdown().await.unwrap();

        let reopened = open(path, key);
        assert_eq!(reopened.get("b").await, Some(record("b")));
        assert_eq!(reopened.get("a").await, None);
        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_drops_rejected_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.enc");
        let key = EncryptionService::generate_key();

        let store = open(path.clone(), key);
        store.insert(record("live")).await.unwrap();
        store
            .insert(Record {
                name: "dead".to_string(),
                live: false,
            })
            .await
            .unwrap();
        store.shutdown().await.unwrap();

        let reopened = open(path, key);
        assert!(reopened.get("live").await.is_some());
        assert!(reopened.get("dead").await.is_none());
        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.enc");
        let key = EncryptionService::generate_key();

        let store = open(path.clone(), key);
        store.insert(record("a")).await.unwrap();
        store.shutdown().await.unwrap();

        let mut blob = std::fs::read(&path).unwrap();
        blob[20] ^= 0xFF;
        std::fs::write(&path, blob).unwrap();

        let reopened = open(path, key);
        assert!(reopened.get("a").await.is_none());
        reopened.insert(record("fresh")).await.unwrap();
        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(
            dir.path().join("never-written.enc"),
            EncryptionService::generate_key(),
        );
        assert!(store.get("anything").await.is_none());
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_mutations_flush_final_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.enc");
        let key = EncryptionService::generate_key();

        let store = std::sync::Arc::new(open(path.clone(), key));
        store.insert(record("rotated-away")).await.unwrap();

        // interleave inserts with the removal across tasks
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert(record(&format!("r{i}"))).await.unwrap();
            }));
        }
        let remover = std::sync::Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            assert!(remover.remove("rotated-away").await.unwrap());
        }));
        for handle in handles {
            handle.await.unwrap();
        }
        store.shutdown().await.unwrap();

        // what lands on disk is the state after every acknowledged
        // mutation, never an earlier snapshot
        let reopened = open(path, key);
        assert!(reopened.get("rotated-away").await.is_none());
        for i in 0..16 {
            assert!(reopened.get(&format!("r{i}")).await.is_some());
        }
        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_mutations_after_shutdown_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path().join("s.enc"), EncryptionService::generate_key());
        store.shutdown().await.unwrap();

        assert!(store.insert(record("late")).await.is_err());
    }

    #[tokio::test]
    async fn test_try_mutate_failure_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.enc");
        let key = EncryptionService::generate_key();

        let store = open(path.clone(), key);
        store.insert(record("a")).await.unwrap();
        let err = store
            .try_mutate::<()>(|_records| Err(AuthError::storage("deliberate failure")))
            .await
            .unwrap_err();
        assert!(err.is_server_error());
        assert!(store.get("a").await.is_some());
        store.shutdown().await.unwrap();

        let reopened = open(path, key);
        assert!(reopened.get("a").await.is_some());
        reopened.shutdown().await.unwrap();
    }
}
