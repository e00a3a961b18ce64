//! In-memory task cache: tasks plus their comments and attachments.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use dobro_shared::models::{Task, TaskComment};
use dobro_shared::types::{TaskId, UserId};

/// Keyed store of tasks the client has seen.  Comment and attachment lists
/// are replaced wholesale by fetch replies and extended (with duplicate
/// suppression) by add broadcasts.
#[derive(Debug, Default)]
pub struct TaskCache {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskCache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one task by id.
    pub fn merge(&self, task: Task) {
        let mut tasks = self.tasks.write();
        debug!(task_id = %task.id, "merging task");
        tasks.insert(task.id.clone(), task);
    }

    /// Insert or replace a batch of tasks.
    pub fn merge_all(&self, batch: impl IntoIterator<Item = Task>) {
        let mut tasks = self.tasks.write();
        for task in batch {
            tasks.insert(task.id.clone(), task);
        }
    }

    /// Look up a single task.
    pub fn get(&self, task_id: &TaskId) -> Option<Task> {
        self.tasks.read().get(task_id).cloned()
    }

    /// Snapshot of all cached tasks.
    pub fn all(&self) -> Vec<Task> {
        self.tasks.read().values().cloned().collect()
    }

    /// Tasks assigned to a user.
    pub fn assigned_to(&self, user_id: &UserId) -> Vec<Task> {
        self.tasks
            .read()
            .values()
            .filter(|t| t.assigned_to.as_ref() == Some(user_id))
            .cloned()
            .collect()
    }

    /// Tasks created by a user.
    pub fn created_by(&self, user_id: &UserId) -> Vec<Task> {
        self.tasks
            .read()
            .values()
            .filter(|t| &t.created_by == user_id)
            .cloned()
            .collect()
    }

    /// Replace a task's comment list (a `get_task_comments` reply).
    /// Comments tagged for a different task are dropped, same as in
    /// [`TaskCache::add_comment`].  Ignored when the task is not cached.
    pub fn set_comments(&self, task_id: &TaskId, comments: Vec<TaskComment>) {
        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.get_mut(task_id) {
            task.comments = comments
                .into_iter()
                .filter(|comment| {
                    comment
                        .task_id
                        .as_ref()
                        .map_or(true, |target| target == task_id)
                })
                .collect();
        } else {
            debug!(task_id = %task_id, "comments for unknown task ignored");
        }
    }

    /// Append one comment from an `add_task_comment` broadcast.
    ///
    /// Drops exact duplicates and comments that name a different task, so
    /// a shared broadcast cannot leak into the wrong drawer.  Returns
    /// whether the comment was added.
    pub fn add_comment(&self, task_id: &TaskId, comment: TaskComment) -> bool {
        if let Some(ref target) = comment.task_id {
            if target != task_id {
                debug!(task_id = %task_id, target = %target, "comment for another task dropped");
                return false;
            }
        }
        let mut tasks = self.tasks.write();
        let Some(task) = tasks.get_mut(task_id) else {
            debug!(task_id = %task_id, "comment for unknown task ignored");
            return false;
        };
        if task.comments.contains(&comment) {
            return false;
        }
        task.comments.push(comment);
        true
    }

    /// Replace a task's attachment list (a `get_task_attachments` reply).
    pub fn set_attachments(&self, task_id: &TaskId, attachments: Vec<String>) {
        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.get_mut(task_id) {
            task.attachments = attachments;
        } else {
            debug!(task_id = %task_id, "attachments for unknown task ignored");
        }
    }

    /// Extend a task's attachment list, skipping URLs already present.
    pub fn add_attachments(&self, task_id: &TaskId, urls: &[String]) {
        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.get_mut(task_id) {
            for url in urls {
                if !task.attachments.contains(url) {
                    task.attachments.push(url.clone());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    pub fn clear(&self) {
        self.tasks.write().clear();
    }
}
