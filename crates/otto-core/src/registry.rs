// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use otto_bus::{ChannelCoordinate, TaskId};

use crate::{TaskError, TaskFsm};

/// Shared handle to one task's state machine.
pub type TaskHandle = Arc<Mutex<TaskFsm>>;

/// In-memory index of live task state machines.
///
/// `create` enforces the active-set bound *before* allocating anything, so
/// a rejected intake leaves no partial task behind.
pub struct TaskRegistry {
    tasks: Mutex<TaskTable>,
    max_active: usize,
}

struct TaskTable {
    by_id: HashMap<TaskId, TaskHandle>,
    /// Creation order, for deterministic listings.
    order: Vec<TaskId>,
}

impl TaskRegistry {
    pub fn new(max_active: usize) -> Self {
        Self {
            tasks: Mutex::new(TaskTable {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
            max_active: max_active.max(1),
        }
    }

    /// Allocate an id and register a new task.
    pub fn create(
        &self,
        channel: ChannelCoordinate,
        input_text: impl Into<String>,
    ) -> Result<(TaskId, TaskHandle), TaskError> {
        let mut table = self.tasks.lock().expect("task table poisoned");
        let active = table
            .by_id
            .values()
            .filter(|h| !h.lock().expect("task poisoned").is_terminal())
            .count();
        if active >= self.max_active {
            return Err(TaskError::ActiveLimitReached(self.max_active));
        }
        let id = TaskId(Uuid::new_v4().to_string());
        let handle: TaskHandle = Arc::new(Mutex::new(TaskFsm::new(
            id.clone(),
            channel,
            input_text,
        )));
        table.by_id.insert(id.clone(), Arc::clone(&handle));
        table.order.push(id.clone());
        Ok((id, handle))
    }

    pub fn get(&self, id: &TaskId) -> Option<TaskHandle> {
        self.tasks
            .lock()
            .expect("task table poisoned")
            .by_id
            .get(id)
            .cloned()
    }

    /// Every known task, in creation order.
    pub fn list_all(&self) -> Vec<TaskHandle> {
        let table = self.tasks.lock().expect("task table poisoned");
        table
            .order
            .iter()
            .filter_map(|id| table.by_id.get(id).cloned())
            .collect()
    }

    /// Tasks not yet in a terminal state, in creation order.
    pub fn list_active(&self) -> Vec<TaskHandle> {
        self.list_all()
            .into_iter()
            .filter(|h| !h.lock().expect("task poisoned").is_terminal())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.list_active().len()
    }

    /// Drop a task from the index, making it unreachable.
    pub fn remove(&self, id: &TaskId) -> Option<TaskHandle> {
        let mut table = self.tasks.lock().expect("task table poisoned");
        table.order.retain(|t| t != id);
        table.by_id.remove(id)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChannelCoordinate {
        ChannelCoordinate::new("cli", "main")
    }

    #[test]
    fn create_assigns_unique_ids() {
        let reg = TaskRegistry::new(5);
        let (a, _) = reg.create(channel(), "one").unwrap();
        let (b, _) = reg.create(channel(), "two").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn get_returns_the_registered_handle() {
        let reg = TaskRegistry::new(5);
        let (id, handle) = reg.create(channel(), "x").unwrap();
        let fetched = reg.get(&id).unwrap();
        assert!(Arc::ptr_eq(&handle, &fetched));
    }

    #[test]
    fn cap_rejects_with_typed_error_and_no_partial_task() {
        let reg = TaskRegistry::new(2);
        reg.create(channel(), "a").unwrap();
        reg.create(channel(), "b").unwrap();
        let err = reg.create(channel(), "c").unwrap_err();
        assert!(matches!(err, TaskError::ActiveLimitReached(2)));
        assert_eq!(reg.list_all().len(), 2, "no partial task registered");
    }

    #[test]
    fn terminal_tasks_free_capacity() {
        let reg = TaskRegistry::new(1);
        let (_, handle) = reg.create(channel(), "a").unwrap();
        assert!(reg.create(channel(), "b").is_err());
        handle.lock().unwrap().force_cancel();
        assert!(reg.create(channel(), "b").is_ok());
    }

    #[test]
    fn list_active_excludes_terminal() {
        let reg = TaskRegistry::new(5);
        let (_, h1) = reg.create(channel(), "a").unwrap();
        reg.create(channel(), "b").unwrap();
        h1.lock().unwrap().force_fail("X", "y");
        assert_eq!(reg.list_all().len(), 2);
        assert_eq!(reg.list_active().len(), 1);
    }

    #[test]
    fn listings_preserve_creation_order() {
        let reg = TaskRegistry::new(5);
        let (a, _) = reg.create(channel(), "first").unwrap();
        let (b, _) = reg.create(channel(), "second").unwrap();
        let all = reg.list_all();
        assert_eq!(all[0].lock().unwrap().id(), &a);
        assert_eq!(all[1].lock().unwrap().id(), &b);
    }

    #[test]
    fn remove_makes_task_unreachable() {
        let reg = TaskRegistry::new(5);
        let (id, _) = reg.create(channel(), "a").unwrap();
        assert!(reg.remove(&id).is_some());
        assert!(reg.get(&id).is_none());
        assert!(reg.remove(&id).is_none());
    }
}
