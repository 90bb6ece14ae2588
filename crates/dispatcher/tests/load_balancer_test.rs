#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use orchestrator_dispatcher::{
        CloudInstanceManager, HostPool, LoadBalancer, PriorityLoadBalancer, RoundRobinLoadBalancer,
    };
    use orchestrator_domain::{Host, HostRepository, JobRepository, JobStatus, OrchestratorError};
    use orchestrator_infrastructure::{
        InMemoryGroupedHostRepository, InMemoryHostRepository, InMemoryJobRepository,
    };
    use orchestrator_testing_utils::{HostBuilder, JobBuilder, MockHostProbe};

    type Jobs = InMemoryJobRepository<u64, String>;

    fn priority_balancer(
        hosts: &InMemoryHostRepository,
        jobs: &Jobs,
    ) -> PriorityLoadBalancer<u64, String> {
        PriorityLoadBalancer::new(
            HostPool::Flat(Arc::new(hosts.clone())),
            Arc::new(jobs.clone()),
            Arc::new(CloudInstanceManager::default()),
        )
    }

    fn round_robin(
        hosts: Vec<Host>,
        jobs: &Jobs,
        probe: &MockHostProbe,
    ) -> RoundRobinLoadBalancer<u64, String> {
        RoundRobinLoadBalancer::new(
            HostPool::Flat(Arc::new(InMemoryHostRepository::with_hosts(hosts))),
            Arc::new(jobs.clone()),
            Arc::new(CloudInstanceManager::default()),
            Arc::new(probe.clone()),
        )
    }

    async fn pending(jobs: &Jobs, id: u64) {
        jobs.add(&JobBuilder::new(id).build()).await.unwrap();
    }

    async fn host_of(balancer: &dyn LoadBalancer<u64>, id: u64) -> Option<String> {
        balancer.get_host(&id, None).await.unwrap().map(|h| h.id)
    }

    #[tokio::test]
    async fn test_priority_prefers_lowest_priority_with_capacity() {
        let hosts = InMemoryHostRepository::with_hosts(vec![
            HostBuilder::new("slow").with_priority(3).build(),
            HostBuilder::new("fast").with_priority(1).build(),
            HostBuilder::new("medium").with_priority(2).build(),
        ]);
        let jobs = Jobs::new();
        let balancer = priority_balancer(&hosts, &jobs);

        for id in 1..=3 {
            pending(&jobs, id).await;
        }
        assert_eq!(host_of(&balancer, 1).await.as_deref(), Some("fast"));
        assert_eq!(host_of(&balancer, 2).await.as_deref(), Some("medium"));
        assert_eq!(host_of(&balancer, 3).await.as_deref(), Some("slow"));

        pending(&jobs, 4).await;
        assert_eq!(host_of(&balancer, 4).await, None);
    }

    #[tokio::test]
    async fn test_priority_without_hosts_returns_none() {
        let hosts = InMemoryHostRepository::new();
        let jobs = Jobs::new();
        pending(&jobs, 1).await;

        let balancer = priority_balancer(&hosts, &jobs);
        assert_eq!(host_of(&balancer, 1).await, None);
    }

    #[tokio::test]
    async fn test_capacity_scenario_with_limit_raise() {
        let hosts = InMemoryHostRepository::with_hosts(vec![
            HostBuilder::new("A").with_priority(1).with_limit(1).build(),
            HostBuilder::new("B").with_priority(2).with_limit(2).build(),
        ]);
        let jobs = Jobs::new();
        jobs.add(
            &JobBuilder::new(1)
                .with_host("A")
                .with_status(JobStatus::InProgress)
                .build(),
        )
        .await
        .unwrap();
        let balancer = priority_balancer(&hosts, &jobs);

        pending(&jobs, 2).await;
        assert_eq!(host_of(&balancer, 2).await.as_deref(), Some("B"));
        let mut job2 = jobs.get(&2).await.unwrap().unwrap();
        job2.status = JobStatus::InProgress;
        jobs.update(&job2).await.unwrap();

        pending(&jobs, 3).await;
        assert_eq!(host_of(&balancer, 3).await.as_deref(), Some("B"));
        let mut job3 = jobs.get(&3).await.unwrap().unwrap();
        job3.status = JobStatus::InProgress;
        jobs.update(&job3).await.unwrap();

        pending(&jobs, 4).await;
        assert_eq!(host_of(&balancer, 4).await, None);

        hosts.set_running_jobs_limit("B", 3).await.unwrap();
        assert_eq!(host_of(&balancer, 4).await.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_completed_jobs_release_capacity() {
        let hosts = InMemoryHostRepository::with_hosts(vec![HostBuilder::new("A").build()]);
        let jobs = Jobs::new();
        let balancer = priority_balancer(&hosts, &jobs);

        pending(&jobs, 1).await;
        pending(&jobs, 2).await;
        assert_eq!(host_of(&balancer, 1).await.as_deref(), Some("A"));
        assert_eq!(host_of(&balancer, 2).await, None);

        let mut job1 = jobs.get(&1).await.unwrap().unwrap();
        job1.status = JobStatus::Completed;
        jobs.update(&job1).await.unwrap();
        assert_eq!(host_of(&balancer, 2).await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_concurrent_selection_respects_limit() {
        let hosts = InMemoryHostRepository::with_hosts(vec![HostBuilder::new("A").with_limit(2).build()]);
        let jobs = Jobs::new();
        let balancer = Arc::new(priority_balancer(&hosts, &jobs));
        for id in 0..10 {
            pending(&jobs, id).await;
        }

        let mut handles = Vec::new();
        for id in 0..10u64 {
            let balancer = Arc::clone(&balancer);
            handles.push(tokio::spawn(async move {
                balancer.get_host(&id, None).await.unwrap().is_some()
            }));
        }
        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 2);
        assert_eq!(jobs.count_active_on_host("A").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_group_rules() {
        let grouped = Arc::new(InMemoryGroupedHostRepository::with_hosts(vec![
            HostBuilder::new("g1").with_group("gpu").build(),
            HostBuilder::new("c1").with_group("cpu").build(),
        ]));
        let jobs = Jobs::new();
        pending(&jobs, 1).await;
        let balancer: PriorityLoadBalancer<u64, String> = PriorityLoadBalancer::new(
            HostPool::Grouped(grouped),
            Arc::new(jobs.clone()),
            Arc::new(CloudInstanceManager::default()),
        );

        let host = balancer.get_host(&1, Some("gpu")).await.unwrap().unwrap();
        assert_eq!(host.id, "g1");
        let job = jobs.get(&1).await.unwrap().unwrap();
        assert_eq!(job.host_group.as_deref(), Some("gpu"));

        let err = balancer.get_host(&1, None).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::HostGroupRequired));

        let err = balancer.get_host(&1, Some("tpu")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::HostGroupNotFound { .. }));

        let flat = InMemoryHostRepository::with_hosts(vec![HostBuilder::new("A").build()]);
        let balancer = priority_balancer(&flat, &jobs);
        let err = balancer.get_host(&1, Some("gpu")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_round_robin_rotates_then_cycles() {
        let jobs = Jobs::new();
        let probe = MockHostProbe::new();
        let balancer = round_robin(
            vec![
                HostBuilder::new("h1").build(),
                HostBuilder::new("h2").build(),
                HostBuilder::new("h3").build(),
            ],
            &jobs,
            &probe,
        );

        let mut picked = Vec::new();
        for id in 1..=6 {
            pending(&jobs, id).await;
            let host = host_of(&balancer, id).await.unwrap();
            picked.push(host);

            // 释放容量，只观察轮转顺序
            let mut job = jobs.get(&id).await.unwrap().unwrap();
            job.status = JobStatus::Completed;
            jobs.update(&job).await.unwrap();
        }
        assert_eq!(picked, vec!["h1", "h2", "h3", "h1", "h2", "h3"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_round_robin_spreads_concurrent_selections() {
        let jobs = Jobs::new();
        let probe = MockHostProbe::new();
        for id in ["h1", "h2", "h3"] {
            probe.set_delay(id, Duration::from_millis(30));
        }
        let balancer = Arc::new(round_robin(
            vec![
                HostBuilder::new("h1").with_limit(10).build(),
                HostBuilder::new("h2").with_limit(10).build(),
                HostBuilder::new("h3").with_limit(10).build(),
            ],
            &jobs,
            &probe,
        ));
        for id in 1..=3 {
            pending(&jobs, id).await;
        }

        let mut handles = Vec::new();
        for id in 1..=3u64 {
            let balancer = Arc::clone(&balancer);
            handles.push(tokio::spawn(async move {
                balancer.get_host(&id, None).await.unwrap().map(|h| h.id)
            }));
        }
        let mut picked = Vec::new();
        for handle in handles {
            picked.push(handle.await.unwrap().unwrap());
        }
        picked.sort();
        assert_eq!(picked, vec!["h1", "h2", "h3"]);
    }

    #[tokio::test]
    async fn test_round_robin_exhausts_unit_capacity() {
        let jobs = Jobs::new();
        let probe = MockHostProbe::new();
        let balancer = round_robin(
            vec![HostBuilder::new("h1").build(), HostBuilder::new("h2").build()],
            &jobs,
            &probe,
        );

        for id in 1..=3 {
            pending(&jobs, id).await;
        }
        let first = host_of(&balancer, 1).await.unwrap();
        let second = host_of(&balancer, 2).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(host_of(&balancer, 3).await, None);
    }

    #[tokio::test]
    async fn test_round_robin_prefers_lower_tier() {
        let jobs = Jobs::new();
        let probe = MockHostProbe::new();
        let balancer = round_robin(
            vec![
                HostBuilder::new("backup").with_priority(5).build(),
                HostBuilder::new("p1").with_priority(1).build(),
                HostBuilder::new("p2").with_priority(1).build(),
            ],
            &jobs,
            &probe,
        );

        for id in 1..=3 {
            pending(&jobs, id).await;
        }
        let mut tier = vec![
            host_of(&balancer, 1).await.unwrap(),
            host_of(&balancer, 2).await.unwrap(),
        ];
        tier.sort();
        assert_eq!(tier, vec!["p1", "p2"]);
        assert_eq!(host_of(&balancer, 3).await.as_deref(), Some("backup"));
    }

    #[tokio::test]
    async fn test_round_robin_skips_unavailable_hosts() {
        let jobs = Jobs::new();
        let probe = MockHostProbe::new();
        probe.set_down("h1", true);
        let balancer = round_robin(
            vec![HostBuilder::new("h1").build(), HostBuilder::new("h2").build()],
            &jobs,
            &probe,
        );

        pending(&jobs, 1).await;
        assert_eq!(host_of(&balancer, 1).await.as_deref(), Some("h2"));
        assert!(probe.probes().contains(&"h1".to_string()));
    }

    #[tokio::test]
    async fn test_round_robin_skips_slow_hosts() {
        let jobs = Jobs::new();
        let probe = MockHostProbe::new();
        probe.set_delay("h1", Duration::from_millis(500));
        let balancer = round_robin(
            vec![HostBuilder::new("h1").build(), HostBuilder::new("h2").build()],
            &jobs,
            &probe,
        )
        .with_response_threshold(Duration::from_millis(50));

        pending(&jobs, 1).await;
        assert_eq!(host_of(&balancer, 1).await.as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn test_round_robin_zero_threshold_returns_none() {
        let jobs = Jobs::new();
        let probe = MockHostProbe::new();
        let balancer = round_robin(vec![HostBuilder::new("h1").build()], &jobs, &probe)
            .with_response_threshold(Duration::ZERO);

        pending(&jobs, 1).await;
        assert_eq!(host_of(&balancer, 1).await, None);
        assert!(probe.probes().is_empty());
        let job = jobs.get(&1).await.unwrap().unwrap();
        assert!(job.host_id.is_none());
    }
}
