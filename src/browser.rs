//! One browsing session over a root directory.
//!
//! Owns the registry, the watcher loop, and every in-flight directory read.
//! All of them stop when the session is shut down or dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::event::{ChangeNotifier, Event};
use crate::fs::node::FileTreeNode;
use crate::fs::registry::{Registry, Ticket, Toggle};
use crate::fs::source::{DirectorySource, LocalFs};
use crate::fs::watch::{NotifyBackend, NullBackend, WatchEvent, Watches};
use crate::fs::watcher::WatcherLoop;
use crate::projection::PreviewItem;

pub struct Browser {
    registry: Arc<Registry>,
    notifier: ChangeNotifier,
    cancel: CancellationToken,
    tasks: TaskTracker,
    live: bool,
}

impl Browser {
    /// Session over the local filesystem. With `live` off, or when the OS
    /// watcher cannot be created, folders are listed once per open.
    pub fn start(
        root: PathBuf,
        live: bool,
        poll_interval: Duration,
        ui_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        let backend = if live {
            NotifyBackend::new(watch_tx)
                .map_err(|err| warn!(error = %err, "live updates unavailable"))
                .ok()
        } else {
            None
        };
        let live = backend.is_some();
        let watches = match backend {
            Some(backend) => Watches::new(backend),
            None => Watches::new(NullBackend),
        };
        let mut browser =
            Self::with_parts(root, Arc::new(LocalFs), watches, watch_rx, poll_interval, ui_tx);
        browser.live = live;
        browser
    }

    /// Session over explicit collaborators. Must be called inside a tokio
    /// runtime; the watcher loop is spawned immediately.
    pub fn with_parts(
        root: PathBuf,
        source: Arc<dyn DirectorySource>,
        watches: Arc<Watches>,
        watch_rx: mpsc::UnboundedReceiver<WatchEvent>,
        poll_interval: Duration,
        ui_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let registry = Arc::new(Registry::new(root, source, watches));
        let notifier = ChangeNotifier::new(ui_tx);
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();

        tasks.spawn(
            WatcherLoop::new(
                Arc::clone(&registry),
                watch_rx,
                notifier.clone(),
                poll_interval,
                cancel.clone(),
            )
            .run(),
        );

        Self {
            registry,
            notifier,
            cancel,
            tasks,
            live: true,
        }
    }

    /// Whether folder changes on disk are followed.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn root(&self) -> &Path {
        self.registry.root()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Rows for the current state.
    pub fn preview(&self) -> Vec<PreviewItem> {
        self.registry.preview()
    }

    /// Open or close `path`. Closing publishes right away; opening publishes
    /// once the listing has been read.
    pub fn toggle(&self, path: &Path) -> Toggle {
        let outcome = self.registry.toggle(path);
        match &outcome {
            Toggle::Activated(ticket) => self.spawn_load(ticket.clone()),
            Toggle::Deactivated => {
                self.notifier.publish(&self.registry);
            }
            Toggle::Ignored => {}
        }
        outcome
    }

    pub fn activate(&self, path: &Path) {
        if let Some(ticket) = self.registry.begin_activate(path) {
            self.spawn_load(ticket);
        }
    }

    pub fn deactivate(&self, path: &Path) {
        if self.registry.deactivate(path) {
            self.notifier.publish(&self.registry);
        }
    }

    /// Re-read an opened folder in the background.
    pub fn update(&self, path: &Path) {
        let registry = Arc::clone(&self.registry);
        let notifier = self.notifier.clone();
        let cancel = self.cancel.clone();
        let path = path.to_path_buf();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                updated = registry.update(&path) => match updated {
                    Ok(true) => {
                        notifier.publish(&registry);
                    }
                    Ok(false) => {}
                    Err(err) => warn!(error = %err, "update skipped"),
                },
            }
        });
    }

    /// List `folder` in the background and send it back as
    /// [`Event::Details`]. Opened folders don't need this: their snapshot
    /// already carries the count.
    pub fn describe(&self, folder: &Path) {
        let source = Arc::clone(self.registry.source());
        let notifier = self.notifier.clone();
        let cancel = self.cancel.clone();
        let folder = folder.to_path_buf();
        self.tasks.spawn(async move {
            let listing = tokio::task::spawn_blocking(move || {
                let node = FileTreeNode::folder(folder);
                node.children_from(source.as_ref());
                node
            });
            tokio::select! {
                _ = cancel.cancelled() => {}
                listed = listing => match listed {
                    Ok(node) => {
                        notifier.publish_details(node);
                    }
                    Err(err) => warn!(error = %err, "folder details task failed"),
                },
            }
        });
    }

    fn spawn_load(&self, ticket: Ticket) {
        let registry = Arc::clone(&self.registry);
        let notifier = self.notifier.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                committed = registry.load(ticket) => {
                    if committed {
                        notifier.publish(&registry);
                    }
                }
            }
        });
    }

    /// Stop the watcher loop and pending reads, then release every watch.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.registry.clear();
        info!(root = %self.registry.root().display(), "session closed");
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testing::{GatedSource, RecordingBackend};
    use crate::projection::PreviewItemState;
    use std::fs::{self, File};
    use tempfile::TempDir;

    struct Session {
        dir: TempDir,
        browser: Browser,
        backend: RecordingBackend,
        ui_rx: mpsc::UnboundedReceiver<Event>,
        _watch_tx: mpsc::UnboundedSender<WatchEvent>,
    }

    fn setup_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        File::create(dir.path().join("alpha").join("inner.txt")).unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        File::create(dir.path().join("file_a.txt")).unwrap();
        dir
    }

    async fn open(dir: TempDir, source: Arc<dyn DirectorySource>) -> Session {
        let backend = RecordingBackend::default();
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let browser = Browser::with_parts(
            dir.path().to_path_buf(),
            source,
            Watches::new(backend.clone()),
            watch_rx,
            Duration::from_millis(20),
            ui_tx,
        );
        let mut session = Session {
            dir,
            browser,
            backend,
            ui_rx,
            _watch_tx: watch_tx,
        };
        session.next_change().await;
        session
    }

    impl Session {
        async fn next_change(&mut self) -> Vec<PreviewItem> {
            let event = tokio::time::timeout(Duration::from_secs(5), self.ui_rx.recv())
                .await
                .expect("no tree change published")
                .expect("channel closed");
            match event {
                Event::TreeChanged(items) => items,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn describe_lists_closed_folder_without_activating_it() {
        let mut s = open(setup_test_dir(), Arc::new(LocalFs)).await;
        let alpha = s.dir.path().join("alpha");
        s.browser.describe(&alpha);

        let event = tokio::time::timeout(Duration::from_secs(5), s.ui_rx.recv())
            .await
            .expect("no details published")
            .expect("channel closed");
        let Event::Details(node) = event else {
            panic!("unexpected event: {:?}", event);
        };
        assert_eq!(node.path(), alpha);
        assert_eq!(node.children().len(), 1);
        assert!(!s.browser.registry().is_active(&alpha));
        s.browser.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_publishes_expanded_then_collapsed_rows() {
        let mut s = open(setup_test_dir(), Arc::new(LocalFs)).await;
        let alpha = s.dir.path().join("alpha");

        assert!(matches!(s.browser.toggle(&alpha), Toggle::Activated(_)));
        let opened = s.next_change().await;
        let names: Vec<(usize, &str)> =
            opened.iter().map(|i| (i.level, i.name.as_str())).collect();
        assert_eq!(
            names,
            vec![(1, "alpha"), (2, "inner.txt"), (1, "beta"), (1, "file_a.txt")]
        );

        assert_eq!(s.browser.toggle(&alpha), Toggle::Deactivated);
        let closed = s.next_change().await;
        assert_eq!(closed.len(), 3);
        assert_eq!(closed[0].state, PreviewItemState::ClosedFolder);
        s.browser.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_on_missing_path_is_ignored() {
        let s = open(setup_test_dir(), Arc::new(LocalFs)).await;
        assert_eq!(s.browser.toggle(&s.dir.path().join("nope")), Toggle::Ignored);
        s.browser.shutdown().await;
    }

    #[tokio::test]
    async fn update_publishes_new_entries() {
        let mut s = open(setup_test_dir(), Arc::new(LocalFs)).await;
        File::create(s.dir.path().join("later.txt")).unwrap();
        s.browser.update(s.dir.path());
        let items = s.next_change().await;
        assert!(items.iter().any(|i| i.name == "later.txt"));
        s.browser.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_releases_all_watches() {
        let mut s = open(setup_test_dir(), Arc::new(LocalFs)).await;
        s.browser.activate(&s.dir.path().join("alpha"));
        s.next_change().await;
        s.browser.activate(&s.dir.path().join("beta"));
        s.next_change().await;
        assert_eq!(s.backend.watched_len(), 3);

        let watches = Arc::clone(s.browser.registry().watches());
        s.browser.shutdown().await;
        assert_eq!(s.backend.watched_len(), 0);
        assert_eq!(watches.watched_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_with_read_in_flight_leaks_nothing() {
        let gate = GatedSource::default();
        let dir = setup_test_dir();
        let backend = RecordingBackend::default();
        let (_watch_tx, watch_rx) = mpsc::unbounded_channel();
        let (ui_tx, _ui_rx) = mpsc::unbounded_channel();
        let browser = Browser::with_parts(
            dir.path().to_path_buf(),
            Arc::new(gate.clone()),
            Watches::new(backend.clone()),
            watch_rx,
            Duration::from_millis(20),
            ui_tx,
        );
        browser.activate(&dir.path().join("alpha"));

        // Root and alpha reads are both parked on the gate.
        let shutdown = tokio::spawn(browser.shutdown());
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.open();
        shutdown.await.unwrap();
        assert_eq!(backend.watched_len(), 0);
    }

    #[tokio::test]
    async fn deactivate_publishes_and_is_idempotent() {
        let mut s = open(setup_test_dir(), Arc::new(LocalFs)).await;
        let beta = s.dir.path().join("beta");
        s.browser.activate(&beta);
        s.next_change().await;

        s.browser.deactivate(&beta);
        s.next_change().await;
        s.browser.deactivate(&beta);
        let quiet = tokio::time::timeout(Duration::from_millis(100), s.ui_rx.recv()).await;
        assert!(quiet.is_err());
        assert!(!s.browser.registry().is_active(&beta));
        s.browser.shutdown().await;
    }
}
