use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use uuid::Uuid;
use walkdir::WalkDir;

use super::{Store, StoreError, document::OrderDocument};
use crate::domain::{HistoryEntry, Status, WorkOrder};

/// A [`Store`] backed by a directory of JSON documents.
///
/// Each order lives in `<id>.json` and its history in `<id>.history.jsonl`,
/// one entry per line, append-only. Order documents are written to a
/// temporary file and renamed into place so readers never observe a partial
/// write. Commits take a process-wide guard and then an advisory lock file
/// in the store root, so the check-then-write of a compare-and-swap commit
/// is serialized across processes as well as threads. Locks left behind by
/// a crashed process are stolen once they age out.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    commit_guard: Mutex<()>,
}

/// An advisory cross-process lock, held for the duration of one commit.
///
/// Backed by exclusive creation of a lock file; dropping the guard removes
/// the file.
#[derive(Debug)]
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    const FILE_NAME: &'static str = ".lock";
    const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(10);
    const STALE_AFTER: std::time::Duration = std::time::Duration::from_secs(30);

    fn acquire(root: &Path) -> io::Result<Self> {
        let path = root.join(Self::FILE_NAME);
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(_) => return Ok(Self { path }),
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path) {
                        tracing::warn!("stealing stale lock file: {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    std::thread::sleep(Self::RETRY_DELAY);
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .is_ok_and(|modified| {
                modified
                    .elapsed()
                    .is_ok_and(|age| age > Self::STALE_AFTER)
            })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            commit_guard: Mutex::new(()),
        })
    }

    /// The directory this store reads and writes.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn order_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn history_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.history.jsonl"))
    }

    fn read_order(&self, id: Uuid) -> Result<WorkOrder, StoreError> {
        let content = fs::read_to_string(self.order_path(id)).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(id)
            } else {
                StoreError::Io(error)
            }
        })?;
        let document: OrderDocument = serde_json::from_str(&content)?;
        Ok(document.into())
    }

    fn write_order(&self, order: &WorkOrder) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&OrderDocument::from(order))?;
        let tmp = self.root.join(format!(".{}.json.tmp", order.id()));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.order_path(order.id()))?;
        Ok(())
    }

    fn append_history(&self, entry: &HistoryEntry) -> io::Result<()> {
        let json = serde_json::to_string(entry).map_err(io::Error::other)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(entry.order))?;
        writeln!(file, "{json}")
    }

    fn try_load(&self, path: &Path) -> Result<WorkOrder, PathBuf> {
        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<Uuid>().ok())
            .ok_or_else(|| path.to_path_buf())?;
        self.read_order(id).map_err(|error| {
            tracing::debug!("failed to load {}: {error}", path.display());
            path.to_path_buf()
        })
    }

    // The mutex keeps threads of this process from spinning on the lock
    // file; the lock file serializes against other processes.
    fn lock_commits(&self) -> Result<(std::sync::MutexGuard<'_, ()>, StoreLock), StoreError> {
        let guard = self
            .commit_guard
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let lock = StoreLock::acquire(&self.root)?;
        Ok((guard, lock))
    }
}

impl Store for DirectoryStore {
    fn insert(&self, order: &WorkOrder) -> Result<(), StoreError> {
        self.write_order(order)
    }

    fn load(&self, id: Uuid) -> Result<WorkOrder, StoreError> {
        self.read_order(id)
    }

    fn list(&self) -> Result<Vec<WorkOrder>, StoreError> {
        let paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();

        let results: Vec<Result<WorkOrder, PathBuf>> =
            paths.par_iter().map(|path| self.try_load(path)).collect();

        let mut orders = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(order) => orders.push(order),
                Err(path) => {
                    tracing::debug!("skipping unrecognized file: {}", path.display());
                }
            }
        }
        Ok(orders)
    }

    fn replace(
        &self,
        order: &WorkOrder,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _guard = self.lock_commits()?;

        let current = self.read_order(order.id())?;
        if current.updated_at() != expected_updated_at {
            return Err(StoreError::Conflict(order.id()));
        }
        self.write_order(order)
    }

    fn commit_transition(
        &self,
        order: &WorkOrder,
        entry: &HistoryEntry,
        expected_status: Status,
    ) -> Result<(), StoreError> {
        let _guard = self.lock_commits()?;

        let current = self.read_order(order.id())?;
        if current.status() != expected_status {
            return Err(StoreError::Conflict(order.id()));
        }

        self.write_order(order)?;
        if let Err(source) = self.append_history(entry) {
            // The order document is already on disk without its audit record.
            tracing::error!(
                id = %order.id(),
                error = %source,
                "order written but history append failed",
            );
            return Err(StoreError::Consistency {
                id: order.id(),
                source,
            });
        }
        Ok(())
    }

    fn history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
        if !self.order_path(id).try_exists()? {
            return Err(StoreError::NotFound(id));
        }

        let content = match fs::read_to_string(self.history_path(id)) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }

    fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        fs::remove_file(self.order_path(id)).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(id)
            } else {
                StoreError::Io(error)
            }
        })?;

        match fs::remove_file(self.history_path(id)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
