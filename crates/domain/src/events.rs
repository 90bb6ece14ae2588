//! 领域事件
//!
//! 服务在变更前发送 `*ing` 事件，变更成功后发送 `*ed` 事件。

use tokio::sync::broadcast;

use crate::entities::{Host, Job};
use crate::query::JobFilter;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// 作业生命周期事件
#[derive(Debug, Clone)]
pub enum JobEvent<J, T> {
    Adding(Job<J, T>),
    Added(Job<J, T>),
    Updating(Job<J, T>),
    Updated(Job<J, T>),
    Deleting(J),
    Deleted(J),
    DeletingMultiple(JobFilter<T>),
    DeletedMultiple { filter: JobFilter<T>, count: u64 },
}

impl<J, T> JobEvent<J, T> {
    pub fn event_type(&self) -> &'static str {
        match self {
            JobEvent::Adding(_) => "job.adding",
            JobEvent::Added(_) => "job.added",
            JobEvent::Updating(_) => "job.updating",
            JobEvent::Updated(_) => "job.updated",
            JobEvent::Deleting(_) => "job.deleting",
            JobEvent::Deleted(_) => "job.deleted",
            JobEvent::DeletingMultiple(_) => "job.deleting_multiple",
            JobEvent::DeletedMultiple { .. } => "job.deleted_multiple",
        }
    }
}

/// 主机生命周期事件
#[derive(Debug, Clone)]
pub enum HostEvent {
    Adding(Host),
    Added(Host),
    Updating(Host),
    Updated(Host),
    Deleting(String),
    Deleted(String),
}

impl HostEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            HostEvent::Adding(_) => "host.adding",
            HostEvent::Added(_) => "host.added",
            HostEvent::Updating(_) => "host.updating",
            HostEvent::Updated(_) => "host.updated",
            HostEvent::Deleting(_) => "host.deleting",
            HostEvent::Deleted(_) => "host.deleted",
        }
    }
}

/// 基于广播通道的事件发布者
#[derive(Debug, Clone)]
pub struct EventPublisher<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventPublisher<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 没有订阅者时事件被丢弃
    pub fn publish(&self, event: E) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for EventPublisher<E> {
    fn default() -> Self {
        Self::new()
    }
}
