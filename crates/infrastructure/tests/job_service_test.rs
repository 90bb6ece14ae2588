#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use orchestrator_domain::{
        JobEvent, JobFilter, JobService, JobStatus, OrchestratorError, Progress,
    };
    use orchestrator_infrastructure::{
        InMemoryAccountRepository, InMemoryJobRepository, InMemoryTaskRepository,
    };
    use orchestrator_testing_utils::{JobBuilder, TaskBuilder};

    fn service() -> JobService<u64, String> {
        let tasks = InMemoryTaskRepository::with_tasks(vec![
            TaskBuilder::new("test_task")
                .with_parameter("source", "string")
                .build(),
            TaskBuilder::new("export")
                .with_required_parameter("target", "string")
                .with_dynamic_timeout(None)
                .build(),
        ]);
        JobService::new(Arc::new(InMemoryJobRepository::new()), Arc::new(tasks))
            .with_account_repository(Arc::new(InMemoryAccountRepository::with_accounts([
                "acme",
            ])))
    }

    #[tokio::test]
    async fn test_add_publishes_events() {
        let service = service();
        let mut events = service.subscribe();

        service.add(JobBuilder::new(1).build()).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), JobEvent::Adding(job) if job.id == 1));
        assert!(matches!(events.recv().await.unwrap(), JobEvent::Added(job) if job.id == 1));
        assert!(service.contains(&1).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_jobs() {
        let service = service();
        service.add(JobBuilder::new(1).build()).await.unwrap();

        let err = service.add(JobBuilder::new(1).build()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::JobAlreadyExists { .. }));

        let err = service
            .add(JobBuilder::new(2).with_task("missing").build())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::TaskNotFound { .. }));

        let err = service
            .add(JobBuilder::new(3).with_account("nobody").build())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AccountNotFound { .. }));

        let err = service
            .add(JobBuilder::new(4).with_parameter("unknown", json!(1)).build())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidArgument(_)));

        let err = service
            .add(JobBuilder::new(5).with_task("export").build())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidArgument(_)));

        assert_eq!(service.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_workflow_timeout_parameter_validation() {
        let service = service();

        service
            .add(
                JobBuilder::new(1)
                    .with_task("export")
                    .with_parameter("target", json!("s3"))
                    .with_workflow_timeout("1.00:00:00")
                    .build(),
            )
            .await
            .unwrap();

        let err = service
            .add(
                JobBuilder::new(2)
                    .with_task("export")
                    .with_parameter("target", json!("s3"))
                    .with_workflow_timeout("soon")
                    .build(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidArgument(_)));

        // 不支持动态超时的任务不接受 WorkflowTimeout
        let err = service
            .add(JobBuilder::new(3).with_workflow_timeout("01:00:00").build())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_oversized_workflow_timeout_is_rejected() {
        let service = service();

        for (id, value) in [(1, json!(1e30)), (2, json!("9999999999999999:00:00"))] {
            let err = service
                .add(
                    JobBuilder::new(id)
                        .with_task("export")
                        .with_parameter("target", json!("s3"))
                        .with_parameter("WorkflowTimeout", value)
                        .build(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidArgument(_)));
        }
        assert!(service.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_known_account_is_accepted() {
        let service = service();
        let job = service
            .add(JobBuilder::new(1).with_account("acme").build())
            .await
            .unwrap();
        assert_eq!(job.account_id.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_status_updates_follow_state_machine() {
        let service = service();
        service.add(JobBuilder::new(1).build()).await.unwrap();

        service.update_status(&1, JobStatus::Starting).await.unwrap();
        service.update_status(&1, JobStatus::InProgress).await.unwrap();
        let err = service
            .update_status(&1, JobStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        let job = service
            .update_status_with_message(&1, JobStatus::Error, Some("boom".to_string()))
            .await
            .unwrap();
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert!(job.finished.is_some());

        let err = service.update_status(&1, JobStatus::Cancel).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_update_checks_transition_from_stored_status() {
        let service = service();
        service
            .add(JobBuilder::new(1).with_status(JobStatus::Completed).build())
            .await
            .unwrap();

        let mut job = service.get(&1).await.unwrap().unwrap();
        job.status = JobStatus::Cancelling;
        let err = service.update(job).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        let mut job = service.get(&1).await.unwrap().unwrap();
        job.tag = Some("rerun".to_string());
        let updated = service.update(job).await.unwrap();
        assert_eq!(updated.tag.as_deref(), Some("rerun"));

        let err = service.update(JobBuilder::new(9).build()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_finished_job_cannot_be_reopened() {
        let service = service();
        service.add(JobBuilder::new(1).build()).await.unwrap();
        service.update_status(&1, JobStatus::InProgress).await.unwrap();
        service.update_status(&1, JobStatus::TimedOut).await.unwrap();

        for status in [JobStatus::Pending, JobStatus::InProgress, JobStatus::Completed] {
            let err = service.update_status(&1, status).await.unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        }

        let mut job = service.get(&1).await.unwrap().unwrap();
        job.status = JobStatus::Pending;
        let err = service.update(job).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert_eq!(
            service.get(&1).await.unwrap().unwrap().status,
            JobStatus::TimedOut
        );
    }

    #[tokio::test]
    async fn test_progress_and_heartbeat() {
        let service = service();
        service.add(JobBuilder::new(1).build()).await.unwrap();

        let job = service.update_heartbeat(&1).await.unwrap();
        assert!(job.heartbeat.is_some());

        let job = service
            .update_progress(&1, Progress::new(75))
            .await
            .unwrap();
        assert_eq!(job.progress, Some(Progress::new(75)));
    }

    #[tokio::test]
    async fn test_queries_and_removal() {
        let service = service();
        service
            .add(
                JobBuilder::new(1)
                    .with_tag("nightly")
                    .requested_ago(Duration::from_secs(300))
                    .build(),
            )
            .await
            .unwrap();
        service
            .add(
                JobBuilder::new(2)
                    .with_tag("nightly")
                    .requested_ago(Duration::from_secs(60))
                    .build(),
            )
            .await
            .unwrap();
        service
            .add(JobBuilder::new(3).with_tag("adhoc").build())
            .await
            .unwrap();

        let nightly = JobFilter::new().with_tag("nightly");
        let found = service.get_by_filter(&nightly).await.unwrap();
        assert_eq!(found.iter().map(|j| j.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(service.count(&nightly).await.unwrap(), 2);
        assert_eq!(service.get_last(&nightly).await.unwrap().unwrap().id, 2);
        assert_eq!(
            service.get_last_status(&nightly).await.unwrap(),
            JobStatus::Pending
        );
        assert_eq!(
            service
                .get_last_status(&JobFilter::new().with_tag("none"))
                .await
                .unwrap(),
            JobStatus::Unknown
        );

        let mut events = service.subscribe();
        assert_eq!(service.remove_by_filter(nightly).await.unwrap(), 2);
        assert!(matches!(events.recv().await.unwrap(), JobEvent::DeletingMultiple(_)));
        assert!(matches!(
            events.recv().await.unwrap(),
            JobEvent::DeletedMultiple { count: 2, .. }
        ));

        service.remove(&3).await.unwrap();
        assert!(service.remove(&3).await.unwrap_err().is_not_found());
        assert!(service.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_by_status_and_task() {
        let service = service();
        service.add(JobBuilder::new(1).build()).await.unwrap();
        service
            .add(
                JobBuilder::new(2)
                    .with_task("export")
                    .with_parameter("target", json!("s3"))
                    .build(),
            )
            .await
            .unwrap();
        service.update_status(&2, JobStatus::InProgress).await.unwrap();

        let pending = service.get_by_status(JobStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 1);

        let filter = JobFilter::new()
            .with_task("export".to_string())
            .with_status(JobStatus::InProgress);
        assert_eq!(service.count(&filter).await.unwrap(), 1);
    }
}
