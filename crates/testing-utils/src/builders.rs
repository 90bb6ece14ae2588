//! Test data builders for creating domain entities
//!
//! Builders use `u64` job ids and `String` task ids, matching what the
//! workspace tests use.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use orchestrator_domain::{
    DynamicTimeout, Host, Job, JobStatus, ParameterSpec, Task, WORKFLOW_TIMEOUT_PARAMETER,
};

pub type TestJob = Job<u64, String>;
pub type TestTask = Task<String>;

fn ago(duration: Duration) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Builder for creating test Job entities
pub struct JobBuilder {
    job: TestJob,
}

impl JobBuilder {
    pub fn new(id: u64) -> Self {
        Self {
            job: Job::new(id, "test_task".to_string()),
        }
    }

    pub fn with_task(mut self, task_id: &str) -> Self {
        self.job.task_id = task_id.to_string();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_account(mut self, account_id: &str) -> Self {
        self.job.account_id = Some(account_id.to_string());
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.job.tag = Some(tag.to_string());
        self
    }

    pub fn with_host(mut self, host_id: &str) -> Self {
        self.job.host_id = Some(host_id.to_string());
        self
    }

    pub fn with_host_group(mut self, group: &str) -> Self {
        self.job.host_group = Some(group.to_string());
        self
    }

    pub fn with_parameter(mut self, name: &str, value: serde_json::Value) -> Self {
        self.job.parameters.insert(name.to_string(), value);
        self
    }

    pub fn with_workflow_timeout(self, timespan: &str) -> Self {
        self.with_parameter(WORKFLOW_TIMEOUT_PARAMETER, serde_json::json!(timespan))
    }

    pub fn requested_ago(mut self, duration: Duration) -> Self {
        self.job.requested = ago(duration);
        self
    }

    pub fn starting_ago(mut self, duration: Duration) -> Self {
        self.job.status = JobStatus::Starting;
        self.job.starting = Some(ago(duration));
        self
    }

    /// Marks the job InProgress, started (and last heartbeat) `duration` ago
    pub fn started_ago(mut self, duration: Duration) -> Self {
        let at = ago(duration);
        self.job.status = JobStatus::InProgress;
        self.job.started = Some(at);
        self.job.heartbeat = Some(at);
        self
    }

    pub fn heartbeat_ago(mut self, duration: Duration) -> Self {
        self.job.heartbeat = Some(ago(duration));
        self
    }

    pub fn without_heartbeat(mut self) -> Self {
        self.job.heartbeat = None;
        self
    }

    pub fn build(self) -> TestJob {
        self.job
    }
}

/// Builder for creating test Host entities
pub struct HostBuilder {
    host: Host,
}

impl HostBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            host: Host::new(id),
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.host.group = Some(group.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.host.priority = priority;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.host.running_jobs_limit = limit;
        self
    }

    pub fn with_cloud_instance(mut self, handler_type: &str) -> Self {
        self.host.cloud_instance_handler_type = Some(handler_type.to_string());
        self
    }

    pub fn with_cloud_parameter(mut self, name: &str, value: serde_json::Value) -> Self {
        self.host
            .cloud_instance_parameters
            .insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> Host {
        self.host
    }
}

/// Builder for creating test Task entities
pub struct TaskBuilder {
    task: TestTask,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: Task::new(id.to_string(), id),
        }
    }

    pub fn with_parameter(mut self, name: &str, type_hint: &str) -> Self {
        self.task
            .parameters
            .insert(name.to_string(), ParameterSpec::optional(type_hint));
        self
    }

    pub fn with_required_parameter(mut self, name: &str, type_hint: &str) -> Self {
        self.task
            .parameters
            .insert(name.to_string(), ParameterSpec::required(type_hint));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.task.timeout = Some(timeout);
        self
    }

    /// Enables dynamic timeouts, optionally with a task-level workflow timeout
    pub fn with_dynamic_timeout(mut self, workflow_timeout: Option<Duration>) -> Self {
        self.task.dynamic_timeout = Some(DynamicTimeout {
            workflow_timeout,
            termination_grace_period: Duration::from_secs(30),
        });
        self
    }

    pub fn build(self) -> TestTask {
        self.task
    }
}

/// Cloud instance parameters with both delays set, for the simulated handler
pub fn cloud_delays(startup_ms: u64, shutdown_ms: u64) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("startup_delay_ms".to_string(), serde_json::json!(startup_ms)),
        ("shutdown_delay_ms".to_string(), serde_json::json!(shutdown_ms)),
    ])
}
