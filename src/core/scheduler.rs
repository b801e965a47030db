//! Deferred tasks
//!
//! Time-based, cancellable callbacks keyed by an owner identity. Nothing here
//! blocks: due tasks are handed back to the caller, which is responsible for
//! checking that the owner is still alive before acting.

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

#[derive(Debug)]
struct Scheduled<K, A> {
    id: TaskId,
    key: K,
    due: f32,
    action: A,
}

/// A due task returned by [`DeferredTasks::run_due`].
#[derive(Debug, Clone, PartialEq)]
pub struct DueTask<K, A> {
    /// Task handle
    pub id: TaskId,
    /// Owner key
    pub key: K,
    /// Scheduled action
    pub action: A,
}

/// Pending deferred actions ordered by due time.
#[derive(Debug)]
pub struct DeferredTasks<K, A> {
    tasks: Vec<Scheduled<K, A>>,
    next_id: u64,
}

impl<K: PartialEq, A> DeferredTasks<K, A> {
    /// Create an empty task list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedule `action` for `key` at simulated time `due`.
    pub fn schedule(&mut self, key: K, due: f32, action: A) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Scheduled {
            id,
            key,
            due,
            action,
        });
        id
    }

    /// Cancel one task. Returns `false` if it already ran or never existed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    /// Cancel every task owned by `key`, returning how many were removed.
    pub fn cancel_key(&mut self, key: &K) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.key != *key);
        before - self.tasks.len()
    }

    /// Remove and return every task due at or before `now`, ordered by due
    /// time and then scheduling order.
    pub fn run_due(&mut self, now: f32) -> Vec<DueTask<K, A>> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|task| task.due <= now);
        self.tasks = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)));
        due.into_iter()
            .map(|task| DueTask {
                id: task.id,
                key: task.key,
                action: task.action,
            })
            .collect()
    }

    /// Remove and return every task regardless of due time.
    pub fn drain_all(&mut self) -> Vec<DueTask<K, A>> {
        self.run_due(f32::INFINITY)
    }

    /// Check whether `key` owns a pending task.
    #[must_use]
    pub fn has_pending(&self, key: &K) -> bool {
        self.tasks.iter().any(|task| task.key == *key)
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<K: PartialEq, A> Default for DeferredTasks<K, A> {
    fn default() -> Self {
        Self::new()
    }
}
