#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use orchestrator_dispatcher::{CloudInstanceManager, HostPool, JobWorker, PriorityLoadBalancer};
    use orchestrator_domain::{
        CloudInstanceHandlerRegistry, CloudInstanceStatus, Host, JobRepository, JobService,
        JobStatus, WorkerEvent,
    };
    use orchestrator_infrastructure::{
        simulated_factory, InMemoryHostRepository, InMemoryJobRepository, InMemoryTaskRepository,
        SIMULATED_HANDLER_TYPE,
    };
    use orchestrator_testing_utils::{
        cloud_delays, init_test_logging, HostBuilder, JobBuilder, MockWorker, TaskBuilder, TestEnv,
    };

    struct Harness {
        jobs: InMemoryJobRepository<u64, String>,
        worker: MockWorker<u64>,
        cloud: Arc<CloudInstanceManager>,
        host: Host,
        job_worker: JobWorker<u64, String>,
    }

    impl Harness {
        fn new(limit: u32) -> Self {
            init_test_logging();
            let registry = CloudInstanceHandlerRegistry::new().with(
                SIMULATED_HANDLER_TYPE,
                simulated_factory(Duration::from_secs(5), Duration::from_secs(5)),
            );
            let cloud = Arc::new(CloudInstanceManager::new(registry));

            let mut host = HostBuilder::new("cloud-1")
                .with_limit(limit)
                .with_cloud_instance(SIMULATED_HANDLER_TYPE)
                .build();
            host.cloud_instance_parameters = cloud_delays(150, 150);
            let pool = HostPool::Flat(Arc::new(InMemoryHostRepository::with_hosts(vec![
                host.clone(),
            ])));

            let jobs: InMemoryJobRepository<u64, String> = InMemoryJobRepository::new();
            let tasks = Arc::new(InMemoryTaskRepository::with_tasks(vec![
                TaskBuilder::new("test_task").build(),
            ]));
            let worker = MockWorker::new();
            let service: Arc<JobService<u64, String>> =
                Arc::new(JobService::new(Arc::new(jobs.clone()), tasks.clone()));
            let balancer = PriorityLoadBalancer::new(
                pool.clone(),
                Arc::new(jobs.clone()),
                Arc::clone(&cloud),
            );
            let job_worker = JobWorker::new(service, tasks, Arc::new(worker.clone()))
                .with_load_balancer(Arc::new(balancer), pool)
                .with_cloud_instances(Arc::clone(&cloud));

            Self {
                jobs,
                worker,
                cloud,
                host,
                job_worker,
            }
        }

        async fn cloud_status(&self) -> CloudInstanceStatus {
            self.cloud.status_of(&self.host).await.unwrap().unwrap()
        }

        async fn wait_for_cloud(&self, expected: CloudInstanceStatus) -> bool {
            TestEnv::wait_for(
                || async move { self.cloud_status().await == expected },
                Duration::from_secs(3),
            )
            .await
        }

        async fn status(&self, id: u64) -> JobStatus {
            self.jobs.get(&id).await.unwrap().unwrap().status
        }

        async fn complete(&self, id: u64) {
            self.job_worker
                .handle_worker_event(WorkerEvent::Executed {
                    job_id: id,
                    status: JobStatus::Completed,
                    message: None,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_cloud_instance_lifecycle() {
        let h = Harness::new(1);
        h.jobs.add(&JobBuilder::new(1).build()).await.unwrap();
        assert_eq!(h.cloud_status().await, CloudInstanceStatus::Stopped);

        // 选中主机后开始启动，作业在实例就绪前保持 Pending
        let dispatched = h.job_worker.execute_pending().await.unwrap();
        assert!(dispatched.is_empty());
        assert!(h.wait_for_cloud(CloudInstanceStatus::Starting).await);
        assert_eq!(h.status(1).await, JobStatus::Pending);
        assert_eq!(
            h.jobs.get(&1).await.unwrap().unwrap().host_id.as_deref(),
            Some("cloud-1")
        );

        let dispatched = h.job_worker.execute_pending().await.unwrap();
        assert!(dispatched.is_empty());
        assert!(h.worker.executed().is_empty());

        assert!(h.wait_for_cloud(CloudInstanceStatus::Running).await);
        let dispatched = h.job_worker.execute_pending().await.unwrap();
        assert_eq!(dispatched, vec![1]);
        assert_eq!(h.status(1).await, JobStatus::InProgress);

        // 主机上最后一个作业完成后停止实例
        h.complete(1).await;
        assert_eq!(h.status(1).await, JobStatus::Completed);
        assert_eq!(h.cloud_status().await, CloudInstanceStatus::Stopping);
        assert!(h.wait_for_cloud(CloudInstanceStatus::Stopped).await);
        assert_eq!(h.cloud.cached_count().await, 1);
    }

    #[tokio::test]
    async fn test_instance_kept_while_jobs_remain() {
        let h = Harness::new(2);
        h.jobs.add(&JobBuilder::new(1).build()).await.unwrap();
        h.jobs.add(&JobBuilder::new(2).build()).await.unwrap();

        h.job_worker.execute_pending().await.unwrap();
        assert!(h.wait_for_cloud(CloudInstanceStatus::Running).await);
        let mut dispatched = h.job_worker.execute_pending().await.unwrap();
        dispatched.sort();
        assert_eq!(dispatched, vec![1, 2]);

        h.complete(1).await;
        assert_eq!(h.cloud_status().await, CloudInstanceStatus::Running);

        h.complete(2).await;
        assert!(h.wait_for_cloud(CloudInstanceStatus::Stopped).await);
    }

    #[tokio::test]
    async fn test_cancelled_pending_job_releases_instance() {
        let h = Harness::new(1);
        h.jobs.add(&JobBuilder::new(1).build()).await.unwrap();

        h.job_worker.execute_pending().await.unwrap();
        assert!(h.wait_for_cloud(CloudInstanceStatus::Running).await);

        h.job_worker.cancel(&1).await.unwrap();
        assert_eq!(h.status(1).await, JobStatus::Cancelled);
        assert!(h.wait_for_cloud(CloudInstanceStatus::Stopped).await);
    }
}
