//! Test doubles for the filesystem collaborators.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::fs::source::{DirectorySource, Listing, LocalFs};
use crate::fs::watch::WatchBackend;

/// Records which directories the OS would be watching.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    watched: Arc<Mutex<HashSet<PathBuf>>>,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
    calls: Arc<AtomicUsize>,
}

impl RecordingBackend {
    pub fn fail_on(&self, path: &Path) {
        self.failing.lock().unwrap().insert(path.to_path_buf());
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.lock().unwrap().contains(path)
    }

    pub fn watched_len(&self) -> usize {
        self.watched.lock().unwrap().len()
    }

    pub fn watch_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WatchBackend for RecordingBackend {
    fn watch(&self, path: &Path) -> notify::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(path) {
            return Err(notify::Error::generic("watch refused").add_path(path.to_path_buf()));
        }
        self.watched.lock().unwrap().insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&self, path: &Path) {
        self.watched.lock().unwrap().remove(path);
    }
}

/// Local filesystem whose listings block until the gate is opened.
#[derive(Clone, Default)]
pub struct GatedSource {
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl GatedSource {
    pub fn open(&self) {
        let (lock, cvar) = &*self.gate;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
}

impl DirectorySource for GatedSource {
    fn list(&self, path: &Path) -> io::Result<Listing> {
        let (lock, cvar) = &*self.gate;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
        drop(open);
        LocalFs.list(path)
    }

    fn exists(&self, path: &Path) -> bool {
        LocalFs.exists(path)
    }
}

/// Local filesystem that reports every directory as unwatchable.
#[derive(Clone, Copy, Default)]
pub struct VirtualSource;

impl DirectorySource for VirtualSource {
    fn list(&self, path: &Path) -> io::Result<Listing> {
        LocalFs.list(path)
    }

    fn exists(&self, path: &Path) -> bool {
        LocalFs.exists(path)
    }

    fn watchable(&self, _path: &Path) -> bool {
        false
    }
}
