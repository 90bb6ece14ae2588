use metrics::{counter, gauge};

use orchestrator_domain::JobStatus;

/// 调度指标
///
/// 未安装 recorder 时所有记录都是空操作。
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_dispatched(&self) {
        counter!("orchestrator_jobs_dispatched_total").increment(1);
    }

    pub fn record_dispatch_failed(&self, reason: &'static str) {
        counter!("orchestrator_jobs_dispatch_failed_total", "reason" => reason).increment(1);
    }

    pub fn record_finished(&self, status: JobStatus) {
        counter!("orchestrator_jobs_finished_total", "status" => status.as_str()).increment(1);
    }

    pub fn record_timed_out(&self) {
        counter!("orchestrator_jobs_timed_out_total").increment(1);
    }

    pub fn record_heartbeat_lost(&self) {
        counter!("orchestrator_jobs_heartbeat_lost_total").increment(1);
    }

    pub fn record_not_started(&self) {
        counter!("orchestrator_jobs_not_started_total").increment(1);
    }

    pub fn set_pending(&self, count: usize) {
        gauge!("orchestrator_jobs_pending").set(count as f64);
    }
}
