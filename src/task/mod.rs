//! Task factory: the concurrency primitive the rest of the core builds on.
//!
//! A thin, name-addressable wrapper over `std::thread`, matching the shape
//! of the original's `Tasks.c` (`CreateTask`/`Task_get_id_by_name`/
//! `Task_kill`) but backed by a `Mutex`-protected registry instead of an
//! unsynchronized linked list (see `DESIGN.md`, "Unsynchronised task list").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::{Error, ResourceError, Result};

/// Maximum stack size assignable to a task.
pub const MAX_STACK_SIZE: usize = 1024 * 1024;

/// Identifier for a spawned task. `0` is never issued and stands for "no task".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// The null task id, returned by `create` on failure.
    pub const NONE: TaskId = TaskId(0);

    /// Whether this is the null id.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Cooperative cancellation flag observed by a task's entry routine.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Whether termination has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

struct TaskEntry {
    id: TaskId,
    name: String,
    handle: Option<JoinHandle<()>>,
    cancel: CancelToken,
}

/// Process-wide registry of live tasks.
///
/// Construct one `Registry` per process (typically behind an `Arc`) and
/// share it with every component that spawns workers, per the Design Note
/// to hoist globals into an explicit context.
pub struct Registry {
    tasks: Mutex<Vec<TaskEntry>>,
    next_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tasks: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// Spawn a named worker running `entry`, with `stack_bytes` capped to
    /// [`MAX_STACK_SIZE`]. Returns [`TaskId::NONE`] on failure to spawn.
    pub fn create<F>(&self, name: &str, stack_bytes: usize, entry: F) -> Result<TaskId>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let cancel = CancelToken::new();
        let cancel_for_entry = cancel.clone();
        let stack = stack_bytes.min(MAX_STACK_SIZE);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .stack_size(stack)
            .spawn(move || entry(cancel_for_entry))
            .map_err(|e| {
                tracing::error!(name, error = %e, "failed to spawn task");
                Error::Resource(ResourceError::TaskCreationFailed { detail: e.to_string() })
            })?;

        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tasks.lock().expect("task registry poisoned").push(TaskEntry {
            id,
            name: name.to_string(),
            handle: Some(handle),
            cancel,
        });
        Ok(id)
    }

    /// First-match lookup of a task's id by name.
    pub fn get_id_by_name(&self, name: &str) -> TaskId {
        self.tasks
            .lock()
            .expect("task registry poisoned")
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
            .unwrap_or(TaskId::NONE)
    }

    /// Asynchronously request termination of a task and remove it from the registry.
    ///
    /// Sets the task's cancellation flag, joins its thread, then drops its
    /// entry. Callers whose entry routine blocks on a condition variable
    /// must separately wake it (the cancel flag alone cannot interrupt a
    /// blocked wait); the stepper worker does this in its `destroy` path.
    pub fn kill(&self, id: TaskId) {
        let entry = {
            let mut tasks = self.tasks.lock().expect("task registry poisoned");
            let pos = tasks.iter().position(|t| t.id == id);
            pos.map(|i| tasks.remove(i))
        };
        if let Some(mut entry) = entry {
            entry.cancel.cancel();
            if let Some(handle) = entry.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn create_and_lookup_by_name() {
        let registry = Registry::new();
        let (tx, rx) = mpsc::channel();
        let id = registry
            .create("probe", 16 * 1024, move |_cancel| {
                tx.send(()).unwrap();
            })
            .unwrap();
        rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert!(!id.is_none());
        assert_eq!(registry.get_id_by_name("probe"), id);
    }

    #[test]
    fn unknown_name_returns_none_id() {
        let registry = Registry::new();
        assert_eq!(registry.get_id_by_name("nope"), TaskId::NONE);
    }

    #[test]
    fn kill_observes_cancel_token() {
        let registry = Registry::new();
        let (tx, rx) = mpsc::channel();
        let id = registry
            .create("looper", 16 * 1024, move |cancel| {
                tx.send(()).unwrap();
                while !cancel.is_cancelled() {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
            })
            .unwrap();
        rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        registry.kill(id);
        assert!(registry.get_id_by_name("looper").is_none());
    }
}
