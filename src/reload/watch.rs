//! Filesystem watch subscriptions.
//!
//! A watch is a [`WatchHandle`]; dropping it cancels the subscription.
//! Sessions hold at most one handle per target and replace it by dropping
//! the old one before creating the new one.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::debug;

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// Created, removed, or renamed: the file may have been replaced.
    Rename,
    /// Contents written.
    Change,
}

impl WatchKind {
    /// Map a notify event; metadata and access events are ignored.
    pub fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) | EventKind::Remove(_) => Some(Self::Rename),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
                Some(Self::Change)
            }
            _ => None,
        }
    }
}

/// Callback invoked for each event on a watched file.
pub type WatchCallback = Arc<dyn Fn(WatchKind) + Send + Sync>;

/// Live subscription; dropping it stops delivery.
pub struct WatchHandle {
    _guard: Box<dyn Send>,
}

impl WatchHandle {
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WatchHandle")
    }
}

/// Source of file watch subscriptions.
pub trait WatchBackend: Send + Sync + 'static {
    /// Watch a single existing file.
    ///
    /// Fails with `io::ErrorKind::NotFound` when the file does not exist.
    fn watch(&self, path: &Path, callback: WatchCallback) -> io::Result<WatchHandle>;
}

/// Watches through one shared `notify` watcher.
///
/// Parent directories are watched and events are dispatched by file path, so
/// a file replaced by an atomic save keeps being observed. Each directory is
/// watched once however many subscriptions it holds; the last handle to go
/// unwatches it.
#[derive(Clone)]
pub struct NotifyBackend {
    inner: Arc<Inner>,
}

struct Inner {
    /// Watcher and directory refcounts. Never locked by the event thread.
    watcher: Mutex<Directories>,
    subscribers: Arc<Mutex<Subscribers>>,
}

struct Directories {
    watcher: RecommendedWatcher,
    counts: FxHashMap<PathBuf, usize>,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    by_path: FxHashMap<PathBuf, Vec<(u64, WatchCallback)>>,
}

impl Subscribers {
    fn insert(&mut self, keys: &[PathBuf], callback: &WatchCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        for key in keys {
            self.by_path
                .entry(key.clone())
                .or_default()
                .push((id, Arc::clone(callback)));
        }
        id
    }

    fn remove(&mut self, keys: &[PathBuf], id: u64) {
        for key in keys {
            if let Some(entries) = self.by_path.get_mut(key) {
                entries.retain(|(entry, _)| *entry != id);
                if entries.is_empty() {
                    self.by_path.remove(key);
                }
            }
        }
    }

    fn matching(&self, paths: &[PathBuf]) -> Vec<WatchCallback> {
        let mut seen = Vec::new();
        let mut callbacks = Vec::new();
        for entries in paths.iter().filter_map(|p| self.by_path.get(p)) {
            for (id, callback) in entries {
                if !seen.contains(id) {
                    seen.push(*id);
                    callbacks.push(Arc::clone(callback));
                }
            }
        }
        callbacks
    }
}

impl NotifyBackend {
    pub fn new() -> io::Result<Self> {
        let subscribers = Arc::new(Mutex::new(Subscribers::default()));
        let dispatch = Arc::clone(&subscribers);
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            let Some(kind) = WatchKind::from_event(&event.kind) else { return };
            // Released before calling out
            let callbacks = dispatch.lock().matching(&event.paths);
            for callback in callbacks {
                callback(kind);
            }
        })
        .map_err(into_io)?;

        Ok(Self {
            inner: Arc::new(Inner {
                watcher: Mutex::new(Directories {
                    watcher,
                    counts: FxHashMap::default(),
                }),
                subscribers,
            }),
        })
    }

    /// Number of directories currently watched.
    #[cfg(test)]
    fn watched_dirs(&self) -> usize {
        self.inner.watcher.lock().counts.len()
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&self, path: &Path, callback: WatchCallback) -> io::Result<WatchHandle> {
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ));
        }
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let mut keys = vec![path.to_path_buf()];
        // Some platforms report canonical paths (`/private/var/...` on macOS).
        if let Ok(canonical) = path.canonicalize()
            && canonical != path
        {
            keys.push(canonical);
        }

        {
            let mut dirs = self.inner.watcher.lock();
            let count = dirs.counts.get(&dir).copied().unwrap_or(0);
            if count == 0 {
                dirs.watcher
                    .watch(&dir, RecursiveMode::NonRecursive)
                    .map_err(into_io)?;
            }
            dirs.counts.insert(dir.clone(), count + 1);
        }

        let id = self.inner.subscribers.lock().insert(&keys, &callback);
        Ok(WatchHandle::new(Subscription {
            inner: Arc::clone(&self.inner),
            id,
            keys,
            dir,
        }))
    }
}

/// Guard held inside a [`WatchHandle`] from [`NotifyBackend`].
struct Subscription {
    inner: Arc<Inner>,
    id: u64,
    keys: Vec<PathBuf>,
    dir: PathBuf,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.subscribers.lock().remove(&self.keys, self.id);

        let mut dirs = self.inner.watcher.lock();
        let Some(count) = dirs.counts.get_mut(&self.dir) else { return };
        *count -= 1;
        if *count == 0 {
            dirs.counts.remove(&self.dir);
            if let Err(e) = dirs.watcher.unwatch(&self.dir) {
                debug!("watch"; "unwatch {} failed: {e}", self.dir.display());
            }
        }
    }
}

fn into_io(err: notify::Error) -> io::Error {
    match err.kind {
        notify::ErrorKind::Io(e) => e,
        notify::ErrorKind::PathNotFound => io::Error::new(io::ErrorKind::NotFound, "path not found"),
        _ => io::Error::other(err.to_string()),
    }
}
