use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{AppError, Result};

/// A change notification for one watched directory, reduced to what the
/// watcher loop acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// An entry appeared at this path.
    Created(PathBuf),
    /// An entry at this path was removed. May be the watched directory itself.
    Removed(PathBuf),
    /// The OS dropped events. `None` means the affected directory is unknown.
    Overflow(Option<PathBuf>),
    /// The watch on this directory is no longer valid.
    Invalidated(PathBuf),
}

/// OS-level directory watching, one non-recursive watch per directory.
pub trait WatchBackend: Send + Sync {
    /// Start (or renew) watching `path` for entries being created or removed.
    fn watch(&self, path: &Path) -> notify::Result<()>;

    /// Stop watching `path`.
    fn unwatch(&self, path: &Path);
}

/// Backend for sessions with live updates turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl WatchBackend for NullBackend {
    fn watch(&self, _path: &Path) -> notify::Result<()> {
        Ok(())
    }

    fn unwatch(&self, _path: &Path) {}
}

/// Native notifications via `notify`, forwarded into a tokio channel.
pub struct NotifyBackend {
    watcher: Mutex<RecommendedWatcher>,
}

impl NotifyBackend {
    pub fn new(event_tx: mpsc::UnboundedSender<WatchEvent>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for change in translate(event) {
                        // Receiver gone means the session is shutting down.
                        let _ = event_tx.send(change);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "watch backend error");
                    if err.paths.is_empty() {
                        let _ = event_tx.send(WatchEvent::Overflow(None));
                    }
                    for path in err.paths {
                        let _ = event_tx.send(WatchEvent::Invalidated(path));
                    }
                }
            },
        )?;
        Ok(Self {
            watcher: Mutex::new(watcher),
        })
    }

    fn watcher(&self) -> MutexGuard<'_, RecommendedWatcher> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&self, path: &Path) -> notify::Result<()> {
        self.watcher().watch(path, RecursiveMode::NonRecursive)
    }

    fn unwatch(&self, path: &Path) {
        // Fails when the OS already dropped the watch (directory deleted).
        if let Err(err) = self.watcher().unwatch(path) {
            tracing::debug!(path = %path.display(), error = %err, "unwatch failed");
        }
    }
}

/// Map a raw `notify` event onto create/remove notifications.
///
/// Renames are a remove of the old name and a create of the new one.
/// Content modifications are ignored.
pub fn translate(event: notify::Event) -> Vec<WatchEvent> {
    if event.need_rescan() {
        return vec![WatchEvent::Overflow(event.paths.into_iter().next())];
    }
    let paths = event.paths;
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(WatchEvent::Created).collect()
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.into_iter().map(WatchEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = paths.into_iter();
            let mut out = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                out.push(WatchEvent::Removed(from));
            }
            if let Some(to) = paths.next() {
                out.push(WatchEvent::Created(to));
            }
            out
        }
        // Backends that cannot tell which side of a rename they saw.
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .into_iter()
            .map(|p| {
                if p.exists() {
                    WatchEvent::Created(p)
                } else {
                    WatchEvent::Removed(p)
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Reference-counted watch registrations over a [`WatchBackend`].
///
/// Each [`WatchHandle`] is one lease on a directory. The OS watch is renewed
/// on every registration and removed when the last lease is released, so an
/// update can take a new lease before dropping the old one without a gap.
pub struct Watches {
    backend: Box<dyn WatchBackend>,
    leases: Mutex<HashMap<PathBuf, usize>>,
}

impl Watches {
    pub fn new(backend: impl WatchBackend + 'static) -> Arc<Self> {
        Arc::new(Self {
            backend: Box::new(backend),
            leases: Mutex::new(HashMap::new()),
        })
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<PathBuf, usize>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a lease on `path`, (re-)registering it with the OS.
    pub fn register(self: &Arc<Self>, path: &Path) -> Result<WatchHandle> {
        let mut leases = self.leases();
        self.backend
            .watch(path)
            .map_err(|err| AppError::WatchRegistrationFailed {
                path: path.to_path_buf(),
                source: err,
            })?;
        *leases.entry(path.to_path_buf()).or_insert(0) += 1;
        Ok(WatchHandle {
            path: path.to_path_buf(),
            owner: Arc::clone(self),
        })
    }

    fn release(&self, path: &Path) {
        let mut leases = self.leases();
        let Some(count) = leases.get_mut(path) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            leases.remove(path);
            self.backend.unwatch(path);
        }
    }

    /// Number of directories currently watched.
    #[cfg(test)]
    pub fn watched_count(&self) -> usize {
        self.leases().len()
    }

    #[cfg(test)]
    pub fn is_watched(&self, path: &Path) -> bool {
        self.leases().contains_key(path)
    }
}

/// A live lease on one directory watch. Dropping it cancels the lease.
pub struct WatchHandle {
    path: PathBuf,
    owner: Arc<Watches>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.owner.release(&self.path);
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("path", &self.path)
            .finish()
    }
}
