use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AppError;
use crate::event::ChangeNotifier;
use crate::fs::registry::{ActiveView, Registry};
use crate::fs::watch::WatchEvent;
use crate::projection::measure;

/// Work derived from one drained burst of watch events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Opened folders that were removed from disk.
    pub deleted: BTreeSet<PathBuf>,
    /// Directories that reported any change and need a re-read.
    pub touched: BTreeSet<PathBuf>,
}

impl Batch {
    /// Sort events into deletions and re-reads against the opened folders.
    pub fn collect(events: impl IntoIterator<Item = WatchEvent>, view: &ActiveView) -> Self {
        let mut batch = Batch::default();
        for event in events {
            match event {
                WatchEvent::Created(path) => batch.touch_parent(&path),
                WatchEvent::Removed(path) => {
                    batch.touch_parent(&path);
                    if view.contains_key(&path) {
                        batch.deleted.insert(path);
                    }
                }
                WatchEvent::Invalidated(path) | WatchEvent::Overflow(Some(path)) => {
                    batch.touched.insert(path);
                }
                // Unknown scope: distrust every watched listing.
                WatchEvent::Overflow(None) => batch.touched.extend(
                    view.iter()
                        .filter(|(_, snapshot)| snapshot.watchable)
                        .map(|(path, _)| path.clone()),
                ),
            }
        }
        let deleted = batch.deleted.clone();
        batch.touched.retain(|p| !deleted.contains(p));
        batch
    }

    fn touch_parent(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            self.touched.insert(parent.to_path_buf());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.touched.is_empty()
    }
}

/// Background loop turning OS notifications into registry updates.
///
/// Events are drained in bursts; each burst is applied in full and then
/// published to the UI once.
pub struct WatcherLoop {
    registry: Arc<Registry>,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    notifier: ChangeNotifier,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl WatcherLoop {
    pub fn new(
        registry: Arc<Registry>,
        events: mpsc::UnboundedReceiver<WatchEvent>,
        notifier: ChangeNotifier,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            events,
            notifier,
            poll_interval,
            cancel,
        }
    }

    /// Open the root, then process events until cancelled.
    pub async fn run(mut self) {
        let root = self.registry.root().to_path_buf();
        info!(root = %root.display(), "watcher loop started");

        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = self.registry.activate(&root) => {}
        }
        self.notifier.publish(&self.registry);

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = tokio::time::timeout(self.poll_interval, self.events.recv()) => received,
            };
            let first = match received {
                Err(_elapsed) => continue,
                Ok(Some(event)) => event,
                Ok(None) => {
                    // No backend left to report changes; idle until teardown.
                    debug!("watch channel closed");
                    self.cancel.cancelled().await;
                    break;
                }
            };

            let mut events = vec![first];
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            let batch = Batch::collect(events, &self.registry.view());
            if batch.is_empty() {
                continue;
            }
            debug!(
                deleted = batch.deleted.len(),
                touched = batch.touched.len(),
                "applying watch batch"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = apply(&self.registry, batch) => {}
            }
            let view = self.registry.view();
            debug!(
                active = view.len(),
                rows = measure(&view, &root),
                "watch batch applied"
            );
            if !self.notifier.publish(&self.registry) {
                debug!("UI gone, stopping watcher loop");
                break;
            }
        }
        info!("watcher loop stopped");
    }
}

/// Evict deleted folders, then re-read or evict every touched one.
pub async fn apply(registry: &Registry, batch: Batch) {
    for path in &batch.deleted {
        registry.evict_subtree(path);
    }

    let updates = batch.touched.iter().map(|path| async move {
        if !registry.exists(path) {
            registry.evict_subtree(path);
            return;
        }
        match registry.update(path).await {
            Ok(_) => {}
            // Deleted between the check and the read.
            Err(AppError::StalePath(_)) => {
                registry.evict_subtree(path);
            }
            Err(err) => debug!(path = %path.display(), error = %err, "update failed"),
        }
    });
    futures::future::join_all(updates).await;
}
