use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use synthtrack::client::{BackendFuture, TaskBackend};
use synthtrack::errors::TrackerError;
use synthtrack::model::{FailedTask, GenerationRequest, SubmittedTask, Task, TaskResult};

/// One scripted answer to a status fetch.
#[derive(Debug, Clone)]
pub enum StatusReply {
    Task(Task),
    TransportError(String),
    DecodeError(String),
}

/// How the failed-task listing should fail, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFailure {
    /// 404 from the listing endpoint.
    Unavailable,
    /// 503 from the listing endpoint.
    Transient,
    /// 400 from the listing endpoint.
    Permanent,
}

#[derive(Default)]
struct Script {
    statuses: HashMap<String, VecDeque<StatusReply>>,
    last_status: HashMap<String, StatusReply>,
    fetches: HashMap<String, usize>,
    gates: HashMap<String, (usize, Arc<Notify>)>,
    failed_tasks: Vec<FailedTask>,
    list_failure: Option<ListFailure>,
    list_calls: usize,
    retries: HashMap<String, SubmittedTask>,
    retry_calls: Vec<String>,
    submissions: VecDeque<SubmittedTask>,
    submitted_requests: Vec<GenerationRequest>,
    cancel_calls: Vec<String>,
}

/// A fake backend that:
/// - replays scripted status replies per task id (the last reply repeats
///   once the script runs out),
/// - records every call,
/// - can hold status fetches in flight until the test releases them.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Append status replies for `task_id`, in order.
    pub fn script_statuses(&self, task_id: &str, tasks: Vec<Task>) {
        let mut script = self.lock();
        let queue = script.statuses.entry(task_id.to_string()).or_default();
        queue.extend(tasks.into_iter().map(StatusReply::Task));
    }

    pub fn push_reply(&self, task_id: &str, reply: StatusReply) {
        let mut script = self.lock();
        script
            .statuses
            .entry(task_id.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Make every fetch of `task_id` after the first `after` wait for a
    /// permit on the returned `Notify` before replying.
    pub fn pause_fetches_after(&self, task_id: &str, after: usize) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock()
            .gates
            .insert(task_id.to_string(), (after, Arc::clone(&gate)));
        gate
    }

    /// Status fetches started for `task_id`, including held ones.
    pub fn fetch_count(&self, task_id: &str) -> usize {
        self.lock().fetches.get(task_id).copied().unwrap_or(0)
    }

    pub fn set_failed_tasks(&self, tasks: Vec<FailedTask>) {
        self.lock().failed_tasks = tasks;
    }

    /// Server-side effect of a retry finishing: flip the record to resolved.
    pub fn mark_retry_succeeded(&self, failed_task_id: &str, result: TaskResult) {
        let mut script = self.lock();
        if let Some(task) = script
            .failed_tasks
            .iter_mut()
            .find(|t| t.id == failed_task_id)
        {
            task.has_successful_retry = true;
            task.successful_retry_result = Some(result);
        }
    }

    pub fn fail_listing(&self, failure: Option<ListFailure>) {
        self.lock().list_failure = failure;
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn on_retry(&self, failed_task_id: &str, reply: SubmittedTask) {
        self.lock()
            .retries
            .insert(failed_task_id.to_string(), reply);
    }

    pub fn retry_calls(&self) -> Vec<String> {
        self.lock().retry_calls.clone()
    }

    pub fn on_submit(&self, reply: SubmittedTask) {
        self.lock().submissions.push_back(reply);
    }

    pub fn submitted_requests(&self) -> Vec<GenerationRequest> {
        self.lock().submitted_requests.clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.lock().cancel_calls.clone()
    }
}

impl TaskBackend for ScriptedBackend {
    fn submit<'a>(&'a self, request: &'a GenerationRequest) -> BackendFuture<'a, SubmittedTask> {
        Box::pin(async move {
            let mut script = self.lock();
            script.submitted_requests.push(request.clone());
            script
                .submissions
                .pop_front()
                .ok_or_else(|| TrackerError::Service {
                    status: 503,
                    message: "no scripted submission".to_string(),
                })
        })
    }

    fn fetch_status<'a>(&'a self, task_id: &'a str) -> BackendFuture<'a, Task> {
        Box::pin(async move {
            let (reply, gate) = {
                let mut guard = self.lock();
                let script = &mut *guard;

                let count = script.fetches.entry(task_id.to_string()).or_insert(0);
                *count += 1;
                let n = *count;

                let gate = script
                    .gates
                    .get(task_id)
                    .filter(|(after, _)| n > *after)
                    .map(|(_, gate)| Arc::clone(gate));

                let next = script
                    .statuses
                    .get_mut(task_id)
                    .and_then(|queue| queue.pop_front());
                let reply = match next {
                    Some(reply) => {
                        script
                            .last_status
                            .insert(task_id.to_string(), reply.clone());
                        Some(reply)
                    }
                    None => script.last_status.get(task_id).cloned(),
                };

                (reply, gate)
            };

            if let Some(gate) = gate {
                gate.notified().await;
            }

            match reply {
                Some(StatusReply::Task(task)) => Ok(task),
                Some(StatusReply::TransportError(msg)) => Err(TrackerError::Transport(msg)),
                Some(StatusReply::DecodeError(msg)) => Err(TrackerError::Decode(msg)),
                None => Err(TrackerError::NotFound(format!("task {task_id}"))),
            }
        })
    }

    fn list_failed_tasks(&self, limit: u32, offset: u32) -> BackendFuture<'_, Vec<FailedTask>> {
        Box::pin(async move {
            let mut script = self.lock();
            script.list_calls += 1;

            match script.list_failure {
                Some(ListFailure::Unavailable) => Err(TrackerError::NotFound("Not Found".into())),
                Some(ListFailure::Transient) => Err(TrackerError::Service {
                    status: 503,
                    message: "Service Unavailable".into(),
                }),
                Some(ListFailure::Permanent) => Err(TrackerError::Service {
                    status: 400,
                    message: "bad pagination".into(),
                }),
                None => Ok(script
                    .failed_tasks
                    .iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect()),
            }
        })
    }

    fn retry_failed_task<'a>(
        &'a self,
        failed_task_id: &'a str,
    ) -> BackendFuture<'a, SubmittedTask> {
        Box::pin(async move {
            let mut script = self.lock();
            script.retry_calls.push(failed_task_id.to_string());
            script
                .retries
                .get(failed_task_id)
                .cloned()
                .ok_or_else(|| TrackerError::Service {
                    status: 409,
                    message: format!("task {failed_task_id} cannot be retried"),
                })
        })
    }

    fn cancel_task<'a>(&'a self, task_id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.lock().cancel_calls.push(task_id.to_string());
            Ok(())
        })
    }
}
