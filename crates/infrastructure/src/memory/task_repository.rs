use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use orchestrator_domain::{Identifier, Task, TaskRepository};
use orchestrator_errors::OrchestratorResult;

/// 内存任务仓储
#[derive(Debug, Clone)]
pub struct InMemoryTaskRepository<T> {
    tasks: Arc<RwLock<HashMap<T, Task<T>>>>,
}

impl<T: Identifier> InMemoryTaskRepository<T> {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_tasks(tasks: Vec<Task<T>>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks: Arc::new(RwLock::new(map)),
        }
    }

    /// 任务由外部系统维护，这里仅供装配与测试写入
    pub async fn insert(&self, task: Task<T>) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }
}

impl<T: Identifier> Default for InMemoryTaskRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Identifier> TaskRepository<T> for InMemoryTaskRepository<T> {
    async fn get(&self, id: &T) -> OrchestratorResult<Option<Task<T>>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn get_all(&self) -> OrchestratorResult<Vec<Task<T>>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn contains(&self, id: &T) -> OrchestratorResult<bool> {
        Ok(self.tasks.read().await.contains_key(id))
    }
}
