//! File watching and the coalescing change queue
//!
//! The notify watcher runs callbacks on its own thread. Each relevant change is
//! pushed into a [`ChangeQueue`] which keeps at most one pending entry per path,
//! so a burst of saves to the same file results in a single analysis run.
//!
//! Directories are registered one by one so excluded trees like `node_modules`
//! never consume watches, and a directory that cannot be watched only loses
//! its own changes.

use std::collections::{HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::error::MonitorResult;

#[derive(Debug, Default)]
struct QueueState {
    order: VecDeque<PathBuf>,
    pending: HashSet<PathBuf>,
}

/// FIFO of changed paths with one slot per path
#[derive(Debug, Default)]
pub struct ChangeQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a changed path
    ///
    /// Returns `false` when the path is already pending; the change is then
    /// covered by the pending run.
    pub fn push(&self, path: PathBuf) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.pending.insert(path.clone()) {
                trace!("change to {} coalesced into pending run", path.display());
                return false;
            }
            state.order.push_back(path);
        }

        self.notify.notify_one();
        true
    }

    /// Take the oldest pending path
    pub fn pop(&self) -> Option<PathBuf> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let path = state.order.pop_front()?;
        state.pending.remove(&path);
        Some(path)
    }

    /// Wait until something was pushed since the last wake-up
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending change
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.order.clear();
        state.pending.clear();
    }
}

/// Watcher over the monitored root feeding a [`ChangeQueue`]
///
/// Dropping the watcher detaches it.
pub struct FileWatcher {
    _watcher: Arc<Mutex<RecommendedWatcher>>,
    root: PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("root", &self.root).finish()
    }
}

impl FileWatcher {
    /// Watch every directory below `root` that is not excluded
    ///
    /// Fails only when `root` itself cannot be watched. Directories created
    /// later are registered as they appear. Must be called inside a tokio
    /// runtime.
    pub fn start(root: &Path, ignored_dirs: Vec<String>, queue: Arc<ChangeQueue>) -> MonitorResult<Self> {
        let root = root.to_path_buf();
        let ignored_dirs: Arc<[String]> = ignored_dirs.into();
        let (dir_tx, dir_rx) = mpsc::unbounded_channel();

        let mut watcher = {
            let root = root.clone();
            let ignored_dirs = Arc::clone(&ignored_dirs);
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &root, &ignored_dirs, &queue, &dir_tx),
                Err(e) => warn!(error = %e, paths = ?e.paths, "file watch error, skipping"),
            })?
        };

        let registered = watch_tree(&root, &root, &ignored_dirs, |dir| {
            watcher.watch(dir, RecursiveMode::NonRecursive)
        })?;

        let watcher = Arc::new(Mutex::new(watcher));
        tokio::spawn(register_new_dirs(
            Arc::downgrade(&watcher),
            root.clone(),
            ignored_dirs,
            dir_rx,
        ));

        info!(path = %root.display(), directories = registered, "watching source tree for changes");
        Ok(Self {
            _watcher: watcher,
            root,
        })
    }
}

/// Register `dir` and every directory below it that is not excluded
///
/// A directory that cannot be read or watched is skipped with a warning. Only
/// a failure on `dir` itself is returned. Yields the number of directories
/// registered.
fn watch_tree(
    dir: &Path,
    root: &Path,
    ignored_dirs: &[String],
    mut register: impl FnMut(&Path) -> notify::Result<()>,
) -> notify::Result<usize> {
    let walker = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| entry.file_type().is_dir() && !is_ignored(entry.path(), root, ignored_dirs));

    let mut registered = 0;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(notify::Error::io(e.into()).add_path(dir.to_path_buf()));
            }
            Err(e) => {
                warn!(error = %e, "cannot read directory, skipping");
                continue;
            }
        };

        match register(entry.path()) {
            Ok(()) => registered += 1,
            Err(e) if entry.depth() == 0 => return Err(e),
            Err(e) => warn!(
                path = %entry.path().display(),
                error = %e,
                "cannot watch directory, skipping"
            ),
        }
    }

    Ok(registered)
}

/// Register directories created after the watcher started
///
/// Ends once the watcher is dropped, which also closes the channel.
async fn register_new_dirs(
    watcher: Weak<Mutex<RecommendedWatcher>>,
    root: PathBuf,
    ignored_dirs: Arc<[String]>,
    mut new_dirs: mpsc::UnboundedReceiver<PathBuf>,
) {
    while let Some(dir) = new_dirs.recv().await {
        let Some(watcher) = watcher.upgrade() else {
            break;
        };
        register_dir(&watcher, &dir, &root, &ignored_dirs);
    }
}

fn register_dir(watcher: &Mutex<RecommendedWatcher>, dir: &Path, root: &Path, ignored_dirs: &[String]) {
    let mut watcher = watcher.lock().unwrap_or_else(PoisonError::into_inner);
    match watch_tree(dir, root, ignored_dirs, |path| {
        watcher.watch(path, RecursiveMode::NonRecursive)
    }) {
        Ok(count) => debug!(path = %dir.display(), "watching {count} new directories"),
        Err(e) => warn!(path = %dir.display(), error = %e, "cannot watch new directory, skipping"),
    }
}

fn handle_fs_event(
    event: &Event,
    root: &Path,
    ignored_dirs: &[String],
    queue: &ChangeQueue,
    new_dirs: &mpsc::UnboundedSender<PathBuf>,
) {
    if !is_change(&event.kind) {
        return;
    }

    for path in &event.paths {
        if is_ignored(path, root, ignored_dirs) {
            trace!("ignoring change in excluded path {}", path.display());
            continue;
        }

        if path.is_dir() {
            if is_arrival(&event.kind) {
                let _ = new_dirs.send(path.clone());
            }
            continue;
        }

        queue.push(path.clone());
    }
}

/// Whether the event brings a path into the tree
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Whether `path` lies in an excluded directory or is a hidden/temporary file
pub fn is_ignored(path: &Path, root: &Path, ignored_dirs: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);

    let hidden = relative
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    if hidden {
        return true;
    }

    relative.components().any(|component| match component {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|name| ignored_dirs.iter().any(|dir| dir == name)),
        _ => false,
    })
}
