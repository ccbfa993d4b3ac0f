use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::fs::node::FileTreeNode;
use crate::fs::registry::Registry;
use crate::projection::PreviewItem;

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// A periodic tick for rendering.
    Tick,
    /// Terminal resize event.
    Resize(u16, u16),
    /// The opened folders changed; rows to render from now on.
    TreeChanged(Vec<PreviewItem>),
    /// A closed folder's children, listed off the UI task.
    Details(FileTreeNode),
}

/// Publishes fresh rows to the UI after registry changes.
///
/// Rows are computed from a detached view, so no registry lock is held
/// while the UI side runs.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChangeNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Send the registry's current rows. False when the UI is gone.
    pub fn publish(&self, registry: &Registry) -> bool {
        let items = registry.preview();
        tracing::trace!(rows = items.len(), "publishing tree");
        self.tx.send(Event::TreeChanged(items)).is_ok()
    }

    /// Send a node whose children are already listed.
    pub fn publish_details(&self, node: FileTreeNode) -> bool {
        self.tx.send(Event::Details(node)).is_ok()
    }
}

/// Async event handler that polls crossterm events and forwards them via a channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        // crossterm's poll blocks, so it gets its own thread.
        tokio::task::spawn_blocking(move || loop {
            let forwarded = if event::poll(tick_rate).unwrap_or(false) {
                match event::read() {
                    Ok(CrosstermEvent::Key(key)) => event_tx.send(Event::Key(key)),
                    Ok(CrosstermEvent::Mouse(mouse)) => event_tx.send(Event::Mouse(mouse)),
                    Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(Event::Resize(w, h)),
                    _ => Ok(()),
                }
            } else {
                event_tx.send(Event::Tick)
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx, tx }
    }

    /// Sender for the filesystem side to publish tree changes.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (blocks until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::ChannelClosed("event channel".into()))
    }
}
