// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Manager tasks: long operations (load, save) run on their own thread.

The caller gets a task ID back immediately and polls
[`ManagerTaskSystem::status`] until the task leaves `Running`. IDs come from a
monotonic counter and are never reused. Finished tasks stay queryable until
[`ManagerTaskSystem::cleanup_finished`] or shutdown.
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::types::{ServiceError, ServiceResult};

/// Lifecycle of a manager task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Running,
    Success,
    Failure,
    /// Reserved; no timeout is enforced
    TimeOut,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

#[derive(Debug)]
struct TaskOutcome {
    status: TaskStatus,
    output: Value,
}

/// One manager task
pub struct ManagerTaskData {
    id: u64,
    kind: &'static str,
    input: Value,
    outcome: Mutex<TaskOutcome>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerTaskData {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn status(&self) -> TaskStatus {
        self.outcome.lock().status
    }

    pub fn output(&self) -> Value {
        self.outcome.lock().output.clone()
    }

    fn finish(&self, result: ServiceResult<Value>) {
        let mut outcome = self.outcome.lock();
        match result {
            Ok(output) => {
                info!(target: "nes-services", "Task {} ({}) succeeded", self.id, self.kind);
                outcome.status = TaskStatus::Success;
                outcome.output = output;
            }
            Err(e) => {
                warn!(target: "nes-services", "Task {} ({}) failed: {}", self.id, self.kind, e);
                outcome.status = TaskStatus::Failure;
                outcome.output = json!({ "Error": e.to_string() });
            }
        }
    }

    fn join(&self) {
        let mut slot = self.handle.lock();
        // A task thread may end up dropping the last reference to the system
        if slot
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id())
        {
            return;
        }
        if let Some(handle) = slot.take() {
            if handle.join().is_err() {
                warn!(target: "nes-services", "Task {} ({}) panicked", self.id, self.kind);
            }
        }
    }
}

/// Task table plus the counter that hands out task IDs
#[derive(Default)]
pub struct ManagerTaskSystem {
    next_id: AtomicU64,
    tasks: RwLock<AHashMap<u64, Arc<ManagerTaskData>>>,
}

impl ManagerTaskSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task and run `job` on a fresh thread. The task is queryable
    /// as `Running` before this returns.
    pub fn spawn<F>(&self, kind: &'static str, input: Value, job: F) -> ServiceResult<u64>
    where
        F: FnOnce(u64) -> ServiceResult<Value> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(ManagerTaskData {
            id,
            kind,
            input,
            outcome: Mutex::new(TaskOutcome {
                status: TaskStatus::Running,
                output: Value::Null,
            }),
            handle: Mutex::new(None),
        });
        self.tasks.write().insert(id, Arc::clone(&task));

        let runner = Arc::clone(&task);
        let spawned = thread::Builder::new()
            .name(format!("nes-task-{}", id))
            .spawn(move || {
                let result = job(runner.id);
                runner.finish(result);
            });

        match spawned {
            Ok(handle) => {
                *task.handle.lock() = Some(handle);
                debug!(target: "nes-services", "Task {} ({}) started", id, kind);
                Ok(id)
            }
            Err(e) => {
                self.tasks.write().remove(&id);
                Err(ServiceError::Internal(format!("failed to spawn task thread: {}", e)))
            }
        }
    }

    pub fn get(&self, id: u64) -> ServiceResult<Arc<ManagerTaskData>> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or(ServiceError::UnknownTask(id))
    }

    /// Status and output of a task; a pure read
    pub fn status(&self, id: u64) -> ServiceResult<(TaskStatus, Value)> {
        let task = self.get(id)?;
        let outcome = task.outcome.lock();
        Ok((outcome.status, outcome.output.clone()))
    }

    /// Poll until the task finishes.
    pub fn wait(&self, id: u64, poll_interval: Duration) -> ServiceResult<TaskStatus> {
        let task = self.get(id)?;
        loop {
            let status = task.status();
            if status.is_finished() {
                return Ok(status);
            }
            thread::sleep(poll_interval);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join and drop every finished task. Returns how many were removed.
    pub fn cleanup_finished(&self) -> usize {
        let finished: Vec<Arc<ManagerTaskData>> = {
            let mut tasks = self.tasks.write();
            let ids: Vec<u64> = tasks
                .iter()
                .filter(|(_, t)| t.status().is_finished())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| tasks.remove(id)).collect()
        };
        for task in &finished {
            task.join();
        }
        finished.len()
    }

    /// Wait for every task thread to exit.
    pub fn shutdown(&self) {
        let tasks: Vec<Arc<ManagerTaskData>> = self.tasks.read().values().cloned().collect();
        for task in tasks {
            task.join();
        }
    }
}

impl Drop for ManagerTaskSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    const POLL: Duration = Duration::from_millis(1);

    #[test]
    fn test_task_ids_strictly_increase() {
        let tasks = ManagerTaskSystem::new();
        let ids: Vec<u64> = (0..5)
            .map(|_| tasks.spawn("Noop", Value::Null, |_| Ok(Value::Null)).unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        tasks.shutdown();
        assert_eq!(tasks.cleanup_finished(), 5);
        let next = tasks.spawn("Noop", Value::Null, |_| Ok(Value::Null)).unwrap();
        assert!(next > ids[4]);
    }

    #[test]
    fn test_running_until_job_returns() {
        let tasks = ManagerTaskSystem::new();
        let (release, gate) = mpsc::channel::<()>();
        let id = tasks
            .spawn("Gated", json!({ "In": 1 }), move |task_id| {
                gate.recv().map_err(|e| ServiceError::Internal(e.to_string()))?;
                Ok(json!({ "TaskID": task_id }))
            })
            .unwrap();

        // Polling has no side effects
        for _ in 0..3 {
            assert_eq!(tasks.status(id).unwrap(), (TaskStatus::Running, Value::Null));
        }
        assert_eq!(tasks.cleanup_finished(), 0);

        release.send(()).unwrap();
        assert_eq!(tasks.wait(id, POLL).unwrap(), TaskStatus::Success);
        assert_eq!(tasks.status(id).unwrap().1, json!({ "TaskID": id }));
        assert_eq!(tasks.get(id).unwrap().input(), &json!({ "In": 1 }));
    }

    #[test]
    fn test_failed_job_reports_error() {
        let tasks = ManagerTaskSystem::new();
        let id = tasks
            .spawn("Broken", Value::Null, |_| {
                Err(ServiceError::Persistence("disk full".into()))
            })
            .unwrap();
        assert_eq!(tasks.wait(id, POLL).unwrap(), TaskStatus::Failure);
        let (_, output) = tasks.status(id).unwrap();
        assert!(output["Error"].as_str().unwrap().contains("disk full"));
    }

    #[test]
    fn test_unknown_task() {
        let tasks = ManagerTaskSystem::new();
        assert_eq!(tasks.status(42), Err(ServiceError::UnknownTask(42)));
    }
}
