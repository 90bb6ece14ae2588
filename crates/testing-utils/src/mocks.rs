//! Recording test doubles for the worker and host probe ports
//!
//! State lives behind `Arc<Mutex<..>>` so clones share what they record.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator_domain::{HostProbe, Identifier, Task, Worker, WorkerEvent, WorkerEventSender};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// A call the mock worker received
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteCall<J> {
    pub job_id: J,
    pub task_name: String,
    pub host_id: Option<String>,
}

/// A cancel or timeout signal the mock worker received
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCall<J> {
    pub job_id: J,
    pub host_id: Option<String>,
}

/// Mock implementation of the Worker port
///
/// Records every call; optionally emits `Executing` on execute and `Cancelled`
/// on cancel through the attached event sender.
#[derive(Clone)]
pub struct MockWorker<J> {
    executed: Arc<Mutex<Vec<ExecuteCall<J>>>>,
    cancelled: Arc<Mutex<Vec<SignalCall<J>>>>,
    timed_out: Arc<Mutex<Vec<SignalCall<J>>>>,
    fail_execute: Arc<Mutex<bool>>,
    events: Option<WorkerEventSender<J>>,
}

impl<J: Identifier> MockWorker<J> {
    pub fn new() -> Self {
        Self {
            executed: Arc::new(Mutex::new(Vec::new())),
            cancelled: Arc::new(Mutex::new(Vec::new())),
            timed_out: Arc::new(Mutex::new(Vec::new())),
            fail_execute: Arc::new(Mutex::new(false)),
            events: None,
        }
    }

    pub fn with_events(mut self, events: WorkerEventSender<J>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn set_fail_execute(&self, fail: bool) {
        *self.fail_execute.lock().unwrap() = fail;
    }

    pub fn executed(&self) -> Vec<ExecuteCall<J>> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_ids(&self) -> Vec<J> {
        self.executed().into_iter().map(|c| c.job_id).collect()
    }

    pub fn cancelled(&self) -> Vec<J> {
        self.cancel_calls().into_iter().map(|c| c.job_id).collect()
    }

    pub fn cancel_calls(&self) -> Vec<SignalCall<J>> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn timed_out(&self) -> Vec<J> {
        self.timeout_calls().into_iter().map(|c| c.job_id).collect()
    }

    pub fn timeout_calls(&self) -> Vec<SignalCall<J>> {
        self.timed_out.lock().unwrap().clone()
    }

    fn emit(&self, event: WorkerEvent<J>) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

impl<J: Identifier> Default for MockWorker<J> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<J: Identifier, T: Identifier> Worker<J, T> for MockWorker<J> {
    async fn execute(
        &self,
        job_id: &J,
        task: &Task<T>,
        _parameters: &HashMap<String, serde_json::Value>,
        host_id: Option<&str>,
    ) -> OrchestratorResult<()> {
        if *self.fail_execute.lock().unwrap() {
            return Err(OrchestratorError::execution("mock worker failure"));
        }
        self.executed.lock().unwrap().push(ExecuteCall {
            job_id: job_id.clone(),
            task_name: task.name.clone(),
            host_id: host_id.map(str::to_string),
        });
        self.emit(WorkerEvent::Executing {
            job_id: job_id.clone(),
            host_id: host_id.map(str::to_string),
        });
        Ok(())
    }

    async fn cancel(&self, job_id: &J, host_id: Option<&str>) -> OrchestratorResult<()> {
        self.cancelled.lock().unwrap().push(SignalCall {
            job_id: job_id.clone(),
            host_id: host_id.map(str::to_string),
        });
        self.emit(WorkerEvent::Cancelled {
            job_id: job_id.clone(),
            reason: None,
        });
        Ok(())
    }

    async fn timeout(&self, job_id: &J, host_id: Option<&str>) -> OrchestratorResult<()> {
        self.timed_out.lock().unwrap().push(SignalCall {
            job_id: job_id.clone(),
            host_id: host_id.map(str::to_string),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock implementation of the HostProbe port
///
/// Hosts answer `true` unless marked down; a host with a configured delay
/// sleeps before answering, which lets tests exercise response thresholds.
#[derive(Debug, Clone, Default)]
pub struct MockHostProbe {
    down: Arc<Mutex<HashSet<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    probes: Arc<Mutex<Vec<String>>>,
}

impl MockHostProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, host_id: &str, down: bool) {
        let mut hosts = self.down.lock().unwrap();
        if down {
            hosts.insert(host_id.to_string());
        } else {
            hosts.remove(host_id);
        }
    }

    pub fn set_delay(&self, host_id: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(host_id.to_string(), delay);
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostProbe for MockHostProbe {
    async fn is_host_available(&self, host_id: &str) -> OrchestratorResult<bool> {
        self.probes.lock().unwrap().push(host_id.to_string());
        let delay = self.delays.lock().unwrap().get(host_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(!self.down.lock().unwrap().contains(host_id))
    }
}
