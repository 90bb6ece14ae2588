use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use orchestrator_domain::{Identifier, Job, JobRepository, Query};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// 内存作业仓储
///
/// 主机认领在写锁内完成计数与赋值，多个调度循环并发认领同一主机时不会超过并发上限。
#[derive(Debug, Clone)]
pub struct InMemoryJobRepository<J, T> {
    jobs: Arc<RwLock<HashMap<J, Job<J, T>>>>,
}

impl<J: Identifier, T: Identifier> InMemoryJobRepository<J, T> {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.jobs.write().await.clear();
    }
}

impl<J: Identifier, T: Identifier> Default for InMemoryJobRepository<J, T> {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_jobs<'a, J: Identifier, T: Identifier>(
    jobs: impl Iterator<Item = &'a Job<J, T>>,
    query: &Query,
) -> OrchestratorResult<Vec<Job<J, T>>> {
    let mut matched = Vec::new();
    for job in jobs {
        if query.matches(job)? {
            matched.push(job.clone());
        }
    }
    Ok(matched)
}

#[async_trait]
impl<J: Identifier, T: Identifier> JobRepository<J, T> for InMemoryJobRepository<J, T> {
    async fn add(&self, job: &Job<J, T>) -> OrchestratorResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(OrchestratorError::JobAlreadyExists {
                id: job.id.to_string(),
            });
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update(&self, job: &Job<J, T>) -> OrchestratorResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(OrchestratorError::job_not_found(&job.id)),
        }
    }

    async fn remove(&self, id: &J) -> OrchestratorResult<bool> {
        Ok(self.jobs.write().await.remove(id).is_some())
    }

    async fn remove_by_query(&self, query: &Query) -> OrchestratorResult<u64> {
        let mut jobs = self.jobs.write().await;
        let ids: Vec<J> = filter_jobs(jobs.values(), query)?
            .into_iter()
            .map(|job| job.id)
            .collect();
        for id in &ids {
            jobs.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn get(&self, id: &J) -> OrchestratorResult<Option<Job<J, T>>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn get_all(&self) -> OrchestratorResult<Vec<Job<J, T>>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn get_by_query(&self, query: &Query) -> OrchestratorResult<Vec<Job<J, T>>> {
        let jobs = self.jobs.read().await;
        filter_jobs(jobs.values(), query)
    }

    async fn get_last(&self, query: &Query) -> OrchestratorResult<Option<Job<J, T>>> {
        let jobs = self.jobs.read().await;
        Ok(filter_jobs(jobs.values(), query)?
            .into_iter()
            .max_by(|a, b| a.requested.cmp(&b.requested)))
    }

    async fn count(&self, query: &Query) -> OrchestratorResult<u64> {
        let jobs = self.jobs.read().await;
        Ok(filter_jobs(jobs.values(), query)?.len() as u64)
    }

    async fn contains(&self, id: &J) -> OrchestratorResult<bool> {
        Ok(self.jobs.read().await.contains_key(id))
    }

    async fn try_assign_host(
        &self,
        id: &J,
        host_id: &str,
        host_group: Option<&str>,
        running_jobs_limit: u32,
    ) -> OrchestratorResult<bool> {
        let mut jobs = self.jobs.write().await;

        let active = jobs
            .values()
            .filter(|job| &job.id != id && job.is_assigned_to(host_id) && job.status.occupies_host())
            .count() as u64;
        if active >= u64::from(running_jobs_limit) {
            debug!("主机 {} 已满: {}/{}", host_id, active, running_jobs_limit);
            return Ok(false);
        }

        let job = jobs
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::job_not_found(id))?;
        job.host_id = Some(host_id.to_string());
        job.host_group = host_group.map(str::to_string);
        Ok(true)
    }

    async fn count_active_on_host(&self, host_id: &str) -> OrchestratorResult<u64> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| job.is_assigned_to(host_id) && job.status.occupies_host())
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_domain::{JobFilter, JobStatus};

    fn job(id: u32) -> Job<u32, String> {
        Job::new(id, "task".to_string())
    }

    #[tokio::test]
    async fn test_add_rejects_duplicates() {
        let repo = InMemoryJobRepository::new();
        repo.add(&job(1)).await.unwrap();
        assert!(repo.add(&job(1)).await.is_err());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_job_fails() {
        let repo: InMemoryJobRepository<u32, String> = InMemoryJobRepository::new();
        let err = repo.update(&job(9)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_try_assign_host_respects_limit() {
        let repo = InMemoryJobRepository::new();
        for id in 1..=3 {
            repo.add(&job(id)).await.unwrap();
        }

        assert!(repo.try_assign_host(&1, "h1", None, 2).await.unwrap());
        assert!(repo.try_assign_host(&2, "h1", None, 2).await.unwrap());
        assert!(!repo.try_assign_host(&3, "h1", None, 2).await.unwrap());
        // 已分配的作业重新认领同一主机不计自身
        assert!(repo.try_assign_host(&1, "h1", None, 2).await.unwrap());
        assert_eq!(repo.count_active_on_host("h1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_finished_jobs_release_capacity() {
        let repo = InMemoryJobRepository::new();
        repo.add(&job(1)).await.unwrap();
        repo.add(&job(2)).await.unwrap();
        assert!(repo.try_assign_host(&1, "h1", Some("g"), 1).await.unwrap());

        let mut finished = repo.get(&1).await.unwrap().unwrap();
        assert_eq!(finished.host_group.as_deref(), Some("g"));
        finished.status = JobStatus::Completed;
        repo.update(&finished).await.unwrap();

        assert!(repo.try_assign_host(&2, "h1", Some("g"), 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_assign_unknown_job() {
        let repo: InMemoryJobRepository<u32, String> = InMemoryJobRepository::new();
        assert!(repo.try_assign_host(&1, "h1", None, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_exceed_limit() {
        let repo = Arc::new(InMemoryJobRepository::new());
        for id in 0..20 {
            repo.add(&job(id)).await.unwrap();
        }

        let mut handles = Vec::new();
        for id in 0..20 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.try_assign_host(&id, "h1", None, 3).await.unwrap()
            }));
        }
        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 3);
    }

    #[tokio::test]
    async fn test_query_operations() {
        let repo = InMemoryJobRepository::new();
        repo.add(&job(1).with_tag("a")).await.unwrap();
        repo.add(&job(2).with_tag("b")).await.unwrap();
        let mut newest = job(3).with_tag("a");
        newest.requested = chrono::Utc::now() + chrono::Duration::seconds(5);
        repo.add(&newest).await.unwrap();

        let query = JobFilter::<String>::new().with_tag("a").to_query();
        assert_eq!(repo.count(&query).await.unwrap(), 2);
        assert_eq!(repo.get_last(&query).await.unwrap().unwrap().id, 3);
        assert_eq!(repo.remove_by_query(&query).await.unwrap(), 2);
        assert_eq!(repo.len().await, 1);
    }
}
