//! The set of opened folders, their latest listings, and their watches.
//!
//! A path is present exactly when the user has opened it; the root is
//! present for the life of the session. Entries hold immutable snapshots
//! behind `Arc`, so readers copy the map of pointers and release the lock
//! before walking it.
//!
//! Listings are read off the lock. Each activation or update takes a
//! generation number; a finished read is stored only if its entry still
//! carries that generation, so a read that outlives a collapse (or is
//! overtaken by a newer read) is dropped instead of resurrecting the entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fs::snapshot::FolderSnapshot;
use crate::fs::source::DirectorySource;
use crate::fs::watch::{WatchHandle, Watches};
use crate::projection::{project, PreviewItem};

/// Opened folders and their snapshots, detached from the registry lock.
pub type ActiveView = HashMap<PathBuf, Arc<FolderSnapshot>>;

struct ActiveEntry {
    snapshot: Arc<FolderSnapshot>,
    watch: Option<WatchHandle>,
    generation: u64,
}

/// Claim on a pending read for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    path: PathBuf,
    generation: u64,
}

/// Result of [`Registry::toggle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    /// Entry inserted; its listing arrives once the ticket is loaded.
    Activated(Ticket),
    Deactivated,
    /// Missing path, or an attempt to close the root.
    Ignored,
}

pub struct Registry {
    root: PathBuf,
    source: Arc<dyn DirectorySource>,
    watches: Arc<Watches>,
    entries: Mutex<HashMap<PathBuf, ActiveEntry>>,
    generations: AtomicU64,
}

impl Registry {
    pub fn new(root: PathBuf, source: Arc<dyn DirectorySource>, watches: Arc<Watches>) -> Self {
        Self {
            root,
            source,
            watches,
            entries: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, ActiveEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> &Arc<dyn DirectorySource> {
        &self.source
    }

    pub fn watches(&self) -> &Arc<Watches> {
        &self.watches
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.source.exists(path)
    }

    pub fn is_active(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn snapshot(&self, path: &Path) -> Option<Arc<FolderSnapshot>> {
        self.entries().get(path).map(|e| Arc::clone(&e.snapshot))
    }

    /// Whether the entry for `path` holds a live watch.
    #[cfg(test)]
    pub fn is_watched(&self, path: &Path) -> bool {
        self.entries()
            .get(path)
            .is_some_and(|e| e.watch.is_some())
    }

    /// Consistent copy of every opened folder's snapshot.
    pub fn view(&self) -> ActiveView {
        self.entries()
            .iter()
            .map(|(path, entry)| (path.clone(), Arc::clone(&entry.snapshot)))
            .collect()
    }

    /// Rows for the current state, computed off the lock.
    pub fn preview(&self) -> Vec<PreviewItem> {
        project(&self.view(), &self.root)
    }

    // ── Activation ───────────────────────────────────────────────────────────

    /// Open `path` and wait for its listing. No-op when `path` does not exist.
    ///
    /// Returns whether this call's listing was stored.
    pub async fn activate(&self, path: &Path) -> bool {
        match self.begin_activate(path) {
            Some(ticket) => self.load(ticket).await,
            None => false,
        }
    }

    /// Insert an empty entry for `path` (or claim a re-read if it is already
    /// open) and return the ticket to load. `None` when `path` is missing.
    pub fn begin_activate(&self, path: &Path) -> Option<Ticket> {
        if !self.source.exists(path) {
            debug!(path = %path.display(), "activate skipped: path does not exist");
            return None;
        }
        let generation = self.next_generation();
        let mut entries = self.entries();
        match entries.get_mut(path) {
            Some(entry) => entry.generation = generation,
            None => {
                entries.insert(
                    path.to_path_buf(),
                    ActiveEntry {
                        snapshot: Arc::new(FolderSnapshot::pending(path.to_path_buf())),
                        watch: None,
                        generation,
                    },
                );
            }
        }
        Some(Ticket {
            path: path.to_path_buf(),
            generation,
        })
    }

    /// Read the ticket's directory and store the result if still wanted.
    ///
    /// Unreadable directories are stored as empty snapshots.
    pub async fn load(&self, ticket: Ticket) -> bool {
        let source = Arc::clone(&self.source);
        let path = ticket.path.clone();
        let snapshot = tokio::task::spawn_blocking(move || {
            FolderSnapshot::read_or_empty(source.as_ref(), &path)
        })
        .await
        .unwrap_or_else(|err| {
            warn!(path = %ticket.path.display(), error = %err, "directory read task failed");
            FolderSnapshot::unreadable(ticket.path.clone())
        });
        self.commit(ticket, snapshot)
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.entries()
            .get(&ticket.path)
            .is_some_and(|e| e.generation == ticket.generation)
    }

    fn commit(&self, ticket: Ticket, snapshot: FolderSnapshot) -> bool {
        if !self.is_current(&ticket) {
            debug!(path = %ticket.path.display(), "discarding stale listing");
            return false;
        }

        // Always a fresh registration: the directory may have been replaced
        // since the previous watch was taken.
        let watch = if snapshot.watchable {
            match self.watches.register(&ticket.path) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!(error = %err, "folder will not receive live updates");
                    None
                }
            }
        } else {
            None
        };

        let size = snapshot.size;
        let (committed, released) = {
            let mut entries = self.entries();
            match entries.get_mut(&ticket.path) {
                Some(entry) if entry.generation == ticket.generation => {
                    entry.snapshot = Arc::new(snapshot);
                    (true, std::mem::replace(&mut entry.watch, watch))
                }
                _ => (false, watch),
            }
        };
        // Lease release may call into the OS; keep it off the lock.
        drop(released);

        if committed {
            debug!(path = %ticket.path.display(), entries = size, "listing stored");
        } else {
            debug!(path = %ticket.path.display(), "discarding stale listing");
        }
        committed
    }

    // ── Updates ──────────────────────────────────────────────────────────────

    /// Re-read an opened folder and renew its watch.
    ///
    /// `Ok(false)` when `path` is not open or the read was overtaken;
    /// `StalePath` when it no longer exists.
    pub async fn update(&self, path: &Path) -> Result<bool> {
        if !self.source.exists(path) {
            return Err(AppError::StalePath(path.to_path_buf()));
        }
        let ticket = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(path) else {
                return Ok(false);
            };
            entry.generation = self.next_generation();
            Ticket {
                path: path.to_path_buf(),
                generation: entry.generation,
            }
        };
        Ok(self.load(ticket).await)
    }

    // ── Deactivation ─────────────────────────────────────────────────────────

    /// Close `path`, releasing its watch. Idempotent; the root stays open.
    pub fn deactivate(&self, path: &Path) -> bool {
        if path == self.root {
            debug!("refusing to deactivate the root");
            return false;
        }
        let removed = self.entries().remove(path);
        match removed {
            Some(entry) => {
                drop(entry);
                info!(path = %path.display(), "folder closed");
                true
            }
            None => false,
        }
    }

    /// Drop `path` and every opened folder beneath it, for directories that
    /// vanished from disk. If the root is affected it stays, emptied.
    pub fn evict_subtree(&self, path: &Path) -> usize {
        let mut released: Vec<WatchHandle> = Vec::new();
        let mut evicted = 0;
        {
            let mut entries = self.entries();
            let doomed: Vec<PathBuf> = entries
                .keys()
                .filter(|k| k.starts_with(path) && **k != self.root)
                .cloned()
                .collect();
            for key in doomed {
                if let Some(entry) = entries.remove(&key) {
                    evicted += 1;
                    released.extend(entry.watch);
                }
            }
            if self.root.starts_with(path) {
                if let Some(root) = entries.get_mut(&self.root) {
                    root.snapshot = Arc::new(FolderSnapshot::unreadable(self.root.clone()));
                    root.generation = self.next_generation();
                    released.extend(root.watch.take());
                }
            }
        }
        drop(released);
        if evicted > 0 {
            info!(path = %path.display(), evicted, "vanished folders evicted");
        }
        evicted
    }

    /// Open if closed, close if open.
    ///
    /// Closing happens immediately. Opening inserts an empty entry and
    /// returns a ticket the caller must [`load`](Self::load).
    pub fn toggle(&self, path: &Path) -> Toggle {
        if self.is_active(path) {
            if self.deactivate(path) {
                Toggle::Deactivated
            } else {
                Toggle::Ignored
            }
        } else {
            match self.begin_activate(path) {
                Some(ticket) => {
                    info!(path = %path.display(), "folder opened");
                    Toggle::Activated(ticket)
                }
                None => Toggle::Ignored,
            }
        }
    }

    /// Remove every entry, root included, releasing all watches.
    pub fn clear(&self) {
        let drained: Vec<ActiveEntry> = self.entries().drain().map(|(_, e)| e).collect();
        debug!(entries = drained.len(), "registry cleared");
        drop(drained);
    }

    /// Opened folders with a live watch.
    #[cfg(test)]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.entries()
            .iter()
            .filter(|(_, e)| e.watch.is_some())
            .map(|(p, _)| p.clone())
            .collect()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::source::LocalFs;
    use crate::fs::testing::{GatedSource, RecordingBackend, VirtualSource};
    use crate::projection::PreviewItemState;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        File::create(dir.path().join("src").join("main.rs")).unwrap();
        File::create(dir.path().join("src").join("lib.rs")).unwrap();
        File::create(dir.path().join("Cargo.toml")).unwrap();
        dir
    }

    fn registry_with(
        dir: &TempDir,
        source: Arc<dyn DirectorySource>,
    ) -> (Arc<Registry>, RecordingBackend) {
        let backend = RecordingBackend::default();
        let watches = Watches::new(backend.clone());
        let registry = Arc::new(Registry::new(dir.path().to_path_buf(), source, watches));
        (registry, backend)
    }

    fn names(items: &[PreviewItem]) -> Vec<(usize, String)> {
        items.iter().map(|i| (i.level, i.name.clone())).collect()
    }

    #[tokio::test]
    async fn activate_reads_and_watches() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));

        assert!(registry.activate(dir.path()).await);
        let snap = registry.snapshot(dir.path()).unwrap();
        assert_eq!(snap.subfolders.len(), 2);
        assert_eq!(snap.files.len(), 1);
        assert!(registry.is_watched(dir.path()));
        assert!(backend.is_watched(dir.path()));
    }

    #[tokio::test]
    async fn activate_missing_path_is_noop() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));
        let ghost = dir.path().join("ghost");
        assert!(!registry.activate(&ghost).await);
        assert!(!registry.is_active(&ghost));
        assert_eq!(backend.watched_len(), 0);
    }

    #[tokio::test]
    async fn toggle_expands_then_collapses() {
        let dir = setup_test_dir();
        let (registry, _backend) = registry_with(&dir, Arc::new(LocalFs));
        registry.activate(dir.path()).await;
        let src = dir.path().join("src");

        let before = registry.preview();
        assert_eq!(
            names(&before),
            vec![
                (1, "docs".to_string()),
                (1, "src".to_string()),
                (1, "Cargo.toml".to_string()),
            ]
        );

        let Toggle::Activated(ticket) = registry.toggle(&src) else {
            panic!("expected activation");
        };
        assert!(registry.load(ticket).await);
        let opened = registry.preview();
        assert_eq!(
            names(&opened),
            vec![
                (1, "docs".to_string()),
                (1, "src".to_string()),
                (2, "lib.rs".to_string()),
                (2, "main.rs".to_string()),
                (1, "Cargo.toml".to_string()),
            ]
        );
        assert_eq!(opened[1].state, PreviewItemState::OpenedFolder);

        assert_eq!(registry.toggle(&src), Toggle::Deactivated);
        assert_eq!(registry.preview(), before);
        assert_eq!(before[1].state, PreviewItemState::ClosedFolder);
    }

    #[tokio::test]
    async fn deactivate_twice_is_idempotent_and_releases_watch() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));
        registry.activate(dir.path()).await;
        let docs = dir.path().join("docs");
        registry.activate(&docs).await;
        assert!(backend.is_watched(&docs));

        assert!(registry.deactivate(&docs));
        let after_once = registry.view();
        assert!(!registry.deactivate(&docs));
        assert_eq!(registry.view(), after_once);
        assert!(!backend.is_watched(&docs));
        assert_eq!(registry.watches().watched_count(), 1);
    }

    #[tokio::test]
    async fn root_cannot_be_toggled_closed() {
        let dir = setup_test_dir();
        let (registry, _backend) = registry_with(&dir, Arc::new(LocalFs));
        registry.activate(dir.path()).await;
        assert_eq!(registry.toggle(dir.path()), Toggle::Ignored);
        assert!(registry.is_active(dir.path()));
    }

    #[tokio::test]
    async fn late_read_for_deactivated_path_is_discarded() {
        let dir = setup_test_dir();
        let gate = GatedSource::default();
        let (registry, backend) = registry_with(&dir, Arc::new(gate.clone()));
        let src = dir.path().join("src");

        let Toggle::Activated(ticket) = registry.toggle(&src) else {
            panic!("expected activation");
        };
        let pending = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.load(ticket).await }
        });

        // Opened but empty until the listing lands.
        assert!(registry.snapshot(&src).unwrap().files.is_empty());
        assert!(registry.deactivate(&src));

        gate.open();
        assert!(!pending.await.unwrap());
        assert!(!registry.is_active(&src));
        assert_eq!(backend.watched_len(), 0);
        assert_eq!(registry.watches().watched_count(), 0);
    }

    #[tokio::test]
    async fn newer_activation_wins_over_older_read() {
        let dir = setup_test_dir();
        let gate = GatedSource::default();
        let (registry, _backend) = registry_with(&dir, Arc::new(gate.clone()));
        let src = dir.path().join("src");

        let first = registry.begin_activate(&src).unwrap();
        let second = registry.begin_activate(&src).unwrap();
        gate.open();
        assert!(!registry.load(first).await);
        assert!(registry.load(second).await);
        assert_eq!(registry.snapshot(&src).unwrap().files.len(), 2);
        assert_eq!(registry.watches().watched_count(), 1);
    }

    #[tokio::test]
    async fn update_replaces_snapshot_and_renews_watch() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));
        registry.activate(dir.path()).await;
        let calls_before = backend.watch_calls();

        File::create(dir.path().join("new.txt")).unwrap();
        assert!(registry.update(dir.path()).await.unwrap());

        let snap = registry.snapshot(dir.path()).unwrap();
        assert_eq!(snap.files.len(), 2);
        assert_eq!(backend.watch_calls(), calls_before + 1);
        assert_eq!(registry.watches().watched_count(), 1);
        assert!(backend.is_watched(dir.path()));
    }

    #[tokio::test]
    async fn update_of_inactive_path_does_nothing() {
        let dir = setup_test_dir();
        let (registry, _backend) = registry_with(&dir, Arc::new(LocalFs));
        assert!(!registry.update(&dir.path().join("docs")).await.unwrap());
        assert!(!registry.is_active(&dir.path().join("docs")));
    }

    #[tokio::test]
    async fn update_of_vanished_path_is_stale() {
        let dir = setup_test_dir();
        let (registry, _backend) = registry_with(&dir, Arc::new(LocalFs));
        let docs = dir.path().join("docs");
        registry.activate(&docs).await;
        fs::remove_dir(&docs).unwrap();
        let err = registry.update(&docs).await.unwrap_err();
        assert!(matches!(err, AppError::StalePath(_)));
    }

    #[tokio::test]
    async fn failed_watch_leaves_folder_unwatched_but_open() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));
        let docs = dir.path().join("docs");
        backend.fail_on(&docs);

        assert!(registry.activate(&docs).await);
        assert!(registry.is_active(&docs));
        assert!(!registry.is_watched(&docs));
    }

    #[tokio::test]
    async fn synthetic_folders_are_never_watched() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(VirtualSource));
        assert!(registry.activate(dir.path()).await);
        assert!(!registry.snapshot(dir.path()).unwrap().watchable);
        assert_eq!(backend.watch_calls(), 0);
    }

    #[tokio::test]
    async fn evict_subtree_drops_descendants() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));
        let src = dir.path().join("src");
        let nested = src.join("nested");
        fs::create_dir(&nested).unwrap();
        registry.activate(dir.path()).await;
        registry.activate(&src).await;
        registry.activate(&nested).await;

        assert_eq!(registry.evict_subtree(&src), 2);
        assert!(!registry.is_active(&src));
        assert!(!registry.is_active(&nested));
        assert!(registry.is_active(dir.path()));
        assert_eq!(backend.watched_len(), 1);
    }

    #[tokio::test]
    async fn evicting_root_keeps_it_open_and_empty() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));
        registry.activate(dir.path()).await;
        registry.activate(&dir.path().join("src")).await;

        registry.evict_subtree(dir.path());
        assert_eq!(registry.len(), 1);
        let root = registry.snapshot(dir.path()).unwrap();
        assert!(!root.readable);
        assert!(registry.preview().is_empty());
        assert_eq!(backend.watched_len(), 0);
    }

    #[tokio::test]
    async fn clear_releases_every_watch() {
        let dir = setup_test_dir();
        let (registry, backend) = registry_with(&dir, Arc::new(LocalFs));
        registry.activate(dir.path()).await;
        registry.activate(&dir.path().join("src")).await;
        registry.activate(&dir.path().join("docs")).await;
        assert_eq!(backend.watched_len(), 3);
        assert_eq!(registry.watched_paths().len(), 3);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(backend.watched_len(), 0);
    }
}
