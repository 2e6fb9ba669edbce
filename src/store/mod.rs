//! File lifecycle store: per-file status plus the summary produced for it.
//!
//! The store upholds one invariant: a [`SummaryRecord`] exists for a file exactly when that
//! file is [`FileStatus::Processed`]. [`LifecycleStore::add_summary`] is the only way to reach
//! `PROCESSED`, and it commits status and summary under a single write lock.

pub mod types;

pub use types::{FileStatus, KeyPoints, StoredFile, SummaryRecord, sha256_hex};

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors raised by store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No file with the given identifier has been registered.
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// No summary with the given identifier exists.
    #[error("summary not found: {0}")]
    SummaryNotFound(String),
    /// Status change that would break the summary/status pairing.
    #[error("cannot set status {status} on file {file_id} directly; commit a summary instead")]
    InvalidTransition {
        /// File the change was requested for.
        file_id: String,
        /// Requested status.
        status: FileStatus,
    },
}

/// Keyed store of files and summaries shared between pipeline workers and readers.
pub trait LifecycleStore: Send + Sync {
    /// Register a file. Re-adding an identifier replaces the earlier record.
    fn add_file(&self, file: StoredFile);

    /// Replace the status of a file with `PENDING` or `FAILED`.
    ///
    /// Any summary held for the file is dropped in the same step. `PROCESSED` is rejected;
    /// use [`LifecycleStore::add_summary`].
    fn update_status(&self, file_id: &str, status: FileStatus) -> Result<StoredFile, StoreError>;

    /// Store a summary and mark its file `PROCESSED` atomically.
    ///
    /// A previous summary for the same file is replaced.
    fn add_summary(&self, summary: SummaryRecord) -> Result<(), StoreError>;

    /// Look up a file by identifier.
    fn get_file(&self, file_id: &str) -> Option<StoredFile>;

    /// Look up a summary by its own identifier.
    fn get_summary(&self, summary_id: &str) -> Result<SummaryRecord, StoreError>;

    /// Look up the summary belonging to a file, if the file is `PROCESSED`.
    fn get_summary_by_file(&self, file_id: &str) -> Option<SummaryRecord>;

    /// List files registered under one upload.
    fn list_files_by_upload(&self, upload_id: &str) -> Vec<StoredFile>;

    /// Mark a file `FAILED`.
    fn mark_failed(&self, file_id: &str) -> Result<StoredFile, StoreError> {
        self.update_status(file_id, FileStatus::Failed)
    }
}

#[derive(Default)]
struct StoreState {
    files: HashMap<String, StoredFile>,
    summaries: HashMap<String, SummaryRecord>,
    summary_by_file: HashMap<String, String>,
}

impl StoreState {
    fn drop_summary_for(&mut self, file_id: &str) {
        if let Some(summary_id) = self.summary_by_file.remove(file_id) {
            self.summaries.remove(&summary_id);
        }
    }
}

/// Process-local [`LifecycleStore`] guarded by a single `RwLock`.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written entry: every write
    // replaces whole records, so the state is still consistent after poisoning.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LifecycleStore for InMemoryStore {
    fn add_file(&self, file: StoredFile) {
        let mut state = self.write();
        state.drop_summary_for(&file.id);
        if file.status == FileStatus::Processed {
            tracing::warn!(file_id = %file.id, "Registering file as PENDING; PROCESSED requires a summary");
        }
        let file = StoredFile {
            status: FileStatus::Pending,
            ..file
        };
        state.files.insert(file.id.clone(), file);
    }

    fn update_status(&self, file_id: &str, status: FileStatus) -> Result<StoredFile, StoreError> {
        if status == FileStatus::Processed {
            return Err(StoreError::InvalidTransition {
                file_id: file_id.to_string(),
                status,
            });
        }

        let mut state = self.write();
        let current = state
            .files
            .get(file_id)
            .ok_or_else(|| StoreError::FileNotFound(file_id.to_string()))?;
        let replacement = StoredFile {
            status,
            ..current.clone()
        };
        state.drop_summary_for(file_id);
        state
            .files
            .insert(file_id.to_string(), replacement.clone());
        tracing::debug!(file_id, %status, "File status updated");
        Ok(replacement)
    }

    fn add_summary(&self, summary: SummaryRecord) -> Result<(), StoreError> {
        let mut state = self.write();
        let current = state
            .files
            .get(&summary.file_id)
            .ok_or_else(|| StoreError::FileNotFound(summary.file_id.clone()))?;
        let replacement = StoredFile {
            status: FileStatus::Processed,
            ..current.clone()
        };

        state.drop_summary_for(&summary.file_id);
        state
            .summary_by_file
            .insert(summary.file_id.clone(), summary.id.clone());
        state.files.insert(summary.file_id.clone(), replacement);
        tracing::debug!(file_id = %summary.file_id, summary_id = %summary.id, "Summary committed");
        state.summaries.insert(summary.id.clone(), summary);
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Option<StoredFile> {
        self.read().files.get(file_id).cloned()
    }

    fn get_summary(&self, summary_id: &str) -> Result<SummaryRecord, StoreError> {
        self.read()
            .summaries
            .get(summary_id)
            .cloned()
            .ok_or_else(|| StoreError::SummaryNotFound(summary_id.to_string()))
    }

    fn get_summary_by_file(&self, file_id: &str) -> Option<SummaryRecord> {
        let state = self.read();
        state
            .summary_by_file
            .get(file_id)
            .and_then(|summary_id| state.summaries.get(summary_id))
            .cloned()
    }

    fn list_files_by_upload(&self, upload_id: &str) -> Vec<StoredFile> {
        let mut files: Vec<StoredFile> = self
            .read()
            .files
            .values()
            .filter(|file| file.upload_id == upload_id)
            .cloned()
            .collect();
        files.sort_by(|left, right| left.filename.cmp(&right.filename).then(left.id.cmp(&right.id)));
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::OffsetDateTime;

    fn file(upload_id: &str, name: &str) -> StoredFile {
        StoredFile::new(upload_id, name, None, "digest", format!("/data/{name}"))
    }

    fn summary_for(file_id: &str, text: &str) -> SummaryRecord {
        SummaryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            summary_text: text.to_string(),
            key_points: KeyPoints {
                chunks: vec![text.to_string()],
                structured: None,
            },
            model: "test-model".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn update_status_on_unknown_file_is_not_found() {
        let store = InMemoryStore::new();
        let error = store
            .update_status("missing", FileStatus::Failed)
            .expect_err("unknown id");
        assert_eq!(error, StoreError::FileNotFound("missing".into()));
    }

    #[test]
    fn add_summary_marks_file_processed() {
        let store = InMemoryStore::new();
        let record = file("u1", "report.pdf");
        let file_id = record.id.clone();
        store.add_file(record);

        let summary = summary_for(&file_id, "done");
        let summary_id = summary.id.clone();
        store.add_summary(summary).expect("commit");

        assert_eq!(
            store.get_file(&file_id).map(|f| f.status),
            Some(FileStatus::Processed)
        );
        assert_eq!(
            store.get_summary_by_file(&file_id).map(|s| s.id),
            Some(summary_id.clone())
        );
        assert_eq!(store.get_summary(&summary_id).expect("by id").summary_text, "done");
    }

    #[test]
    fn add_summary_for_unknown_file_is_rejected() {
        let store = InMemoryStore::new();
        let error = store
            .add_summary(summary_for("ghost", "text"))
            .expect_err("unknown file");
        assert_eq!(error, StoreError::FileNotFound("ghost".into()));
        assert!(store.get_summary_by_file("ghost").is_none());
    }

    #[test]
    fn reprocessing_replaces_previous_summary() {
        let store = InMemoryStore::new();
        let record = file("u1", "notes.txt");
        let file_id = record.id.clone();
        store.add_file(record);

        let first = summary_for(&file_id, "first");
        let first_id = first.id.clone();
        store.add_summary(first).expect("first");
        store.add_summary(summary_for(&file_id, "second")).expect("second");

        assert_eq!(
            store.get_summary_by_file(&file_id).map(|s| s.summary_text),
            Some("second".to_string())
        );
        assert!(store.get_summary(&first_id).is_err());
    }

    #[test]
    fn processed_cannot_be_set_without_summary() {
        let store = InMemoryStore::new();
        let record = file("u1", "a.txt");
        let file_id = record.id.clone();
        store.add_file(record);

        let error = store
            .update_status(&file_id, FileStatus::Processed)
            .expect_err("rejected");
        assert!(matches!(error, StoreError::InvalidTransition { .. }));
        assert_eq!(
            store.get_file(&file_id).map(|f| f.status),
            Some(FileStatus::Pending)
        );
    }

    #[test]
    fn leaving_processed_drops_the_summary() {
        let store = InMemoryStore::new();
        let record = file("u1", "a.txt");
        let file_id = record.id.clone();
        store.add_file(record);
        store.add_summary(summary_for(&file_id, "text")).expect("commit");

        let updated = store.mark_failed(&file_id).expect("failed");
        assert_eq!(updated.status, FileStatus::Failed);
        assert!(store.get_summary_by_file(&file_id).is_none());
    }

    #[test]
    fn lists_only_files_of_the_requested_upload() {
        let store = InMemoryStore::new();
        store.add_file(file("u1", "b.txt"));
        store.add_file(file("u1", "a.txt"));
        store.add_file(file("u2", "c.txt"));

        let names: Vec<String> = store
            .list_files_by_upload("u1")
            .into_iter()
            .map(|f| f.filename)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert!(store.list_files_by_upload("u3").is_empty());
    }

    #[test]
    fn readers_never_see_processed_without_summary() {
        let store = Arc::new(InMemoryStore::new());
        let ids: Vec<String> = (0..32)
            .map(|i| {
                let record = file("u1", &format!("{i}.txt"));
                let id = record.id.clone();
                store.add_file(record);
                id
            })
            .collect();

        let writer = {
            let store = Arc::clone(&store);
            let ids = ids.clone();
            std::thread::spawn(move || {
                for id in &ids {
                    store.add_summary(summary_for(id, "ok")).expect("commit");
                }
            })
        };

        for _ in 0..200 {
            for id in &ids {
                let processed = store
                    .get_file(id)
                    .is_some_and(|f| f.status == FileStatus::Processed);
                if processed {
                    assert!(store.get_summary_by_file(id).is_some());
                }
            }
        }
        writer.join().expect("writer thread");
    }
}
