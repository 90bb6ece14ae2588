use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use orchestrator_config::{AppConfig, LoadBalancerKind, MonitorConfig};
use orchestrator_dispatcher::{
    CloudInstanceManager, HostPool, JobWorker, JobWorkerConfig, LoadBalancer,
    PriorityLoadBalancer, RoundRobinLoadBalancer,
};
use orchestrator_domain::{
    worker_event_channel, CloudInstanceHandlerRegistry, GroupedHostService, Host, HostEvent,
    HostProbe, HostService, Job, JobFilter, JobRepository, JobService, JobStatus, Task,
    TaskRepository, Worker, WorkerEventReceiver,
};
use orchestrator_infrastructure::{
    simulated_factory, InMemoryGroupedHostRepository, InMemoryHostRepository,
    InMemoryJobRepository, InMemoryTaskRepository, LocalWorker, SIMULATED_HANDLER_TYPE,
};

use crate::seed::{host_from_seed, task_from_seed};
use crate::shutdown::ShutdownSignal;

pub type JobId = Uuid;
pub type TaskId = String;

/// 命令行提供的运行参数
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// 启动时提交的演示作业数量
    pub demo_jobs: usize,
    /// 本地执行后端完成一个作业所需的时间
    pub job_duration: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            demo_jobs: 0,
            job_duration: Duration::from_secs(5),
        }
    }
}

/// 运行期的主机管理入口，与负载均衡共用同一个主机仓储
#[derive(Clone)]
pub enum HostAdmin {
    Flat(Arc<HostService>),
    Grouped(Arc<GroupedHostService>),
}

impl HostAdmin {
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        match self {
            HostAdmin::Flat(service) => service.subscribe(),
            HostAdmin::Grouped(service) => service.subscribe(),
        }
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    options: RunOptions,
    tasks: Vec<Task<TaskId>>,
    hosts: Vec<Host>,
    jobs: Arc<JobService<JobId, TaskId>>,
    host_admin: Option<HostAdmin>,
    cloud: Arc<CloudInstanceManager>,
    job_worker: Arc<JobWorker<JobId, TaskId>>,
    worker_events: Mutex<Option<WorkerEventReceiver<JobId>>>,
}

impl Application {
    pub fn new(config: AppConfig, options: RunOptions) -> Result<Self> {
        let tasks = config
            .tasks
            .iter()
            .map(task_from_seed)
            .collect::<Result<Vec<_>>>()?;
        let hosts: Vec<Host> = config.hosts.iter().map(host_from_seed).collect();

        let registry = CloudInstanceHandlerRegistry::new().with(
            SIMULATED_HANDLER_TYPE,
            simulated_factory(
                Duration::from_millis(config.cloud.default_startup_delay_ms),
                Duration::from_millis(config.cloud.default_shutdown_delay_ms),
            ),
        );
        for host in &hosts {
            if let Some(handler_type) = &host.cloud_instance_handler_type {
                if !registry.contains(handler_type) {
                    bail!(
                        "主机 {} 使用了未注册的云实例处理器类型: {}，可选: {:?}",
                        host.id,
                        handler_type,
                        registry.handler_types()
                    );
                }
            }
        }
        let cloud = Arc::new(CloudInstanceManager::new(registry));

        let job_repository: Arc<dyn JobRepository<JobId, TaskId>> =
            Arc::new(InMemoryJobRepository::new());
        let task_repository: Arc<dyn TaskRepository<TaskId>> =
            Arc::new(InMemoryTaskRepository::with_tasks(tasks.clone()));
        let jobs = Arc::new(JobService::new(
            Arc::clone(&job_repository),
            Arc::clone(&task_repository),
        ));

        let (sender, receiver) = worker_event_channel::<JobId>();
        let local_worker = Arc::new(LocalWorker::new(sender, options.job_duration));
        let worker: Arc<dyn Worker<JobId, TaskId>> = local_worker.clone();
        let probe: Arc<dyn HostProbe> = local_worker;

        let mut job_worker = JobWorker::new(Arc::clone(&jobs), task_repository, worker)
            .with_cloud_instances(Arc::clone(&cloud))
            .with_config(JobWorkerConfig {
                starting_timeout: Duration::from_secs(config.monitor.starting_timeout_seconds),
            });

        let mut host_admin = None;
        if hosts.is_empty() {
            info!("未配置主机，作业直接交给执行后端");
        } else {
            let pool = if config.uses_host_groups() {
                let repository =
                    Arc::new(InMemoryGroupedHostRepository::with_hosts(hosts.clone()));
                host_admin = Some(HostAdmin::Grouped(Arc::new(GroupedHostService::new(
                    repository.clone(),
                ))));
                HostPool::Grouped(repository)
            } else {
                let repository = Arc::new(InMemoryHostRepository::with_hosts(hosts.clone()));
                host_admin = Some(HostAdmin::Flat(Arc::new(HostService::new(repository.clone()))));
                HostPool::Flat(repository)
            };
            let load_balancer: Arc<dyn LoadBalancer<JobId>> = match config.dispatcher.load_balancer
            {
                LoadBalancerKind::Priority => Arc::new(PriorityLoadBalancer::new(
                    pool.clone(),
                    Arc::clone(&job_repository),
                    Arc::clone(&cloud),
                )),
                LoadBalancerKind::RoundRobin => Arc::new(
                    RoundRobinLoadBalancer::new(
                        pool.clone(),
                        Arc::clone(&job_repository),
                        Arc::clone(&cloud),
                        probe,
                    )
                    .with_response_threshold(Duration::from_millis(
                        config.dispatcher.host_response_threshold_ms,
                    )),
                ),
            };
            info!(
                "负载均衡策略: {}，主机数: {}",
                load_balancer.name(),
                hosts.len()
            );
            job_worker = job_worker.with_load_balancer(load_balancer, pool);
        }

        Ok(Self {
            config,
            options,
            tasks,
            hosts,
            jobs,
            host_admin,
            cloud,
            job_worker: Arc::new(job_worker),
            worker_events: Mutex::new(Some(receiver)),
        })
    }

    pub fn jobs(&self) -> &Arc<JobService<JobId, TaskId>> {
        &self.jobs
    }

    /// 未配置主机时为 `None`
    pub fn host_admin(&self) -> Option<&HostAdmin> {
        self.host_admin.as_ref()
    }

    /// 运行到收到关闭信号为止
    pub async fn run(&self, mut shutdown: ShutdownSignal) -> Result<()> {
        let receiver = self
            .worker_events
            .lock()
            .await
            .take()
            .context("应用已经在运行")?;

        self.submit_demo_jobs().await?;

        let listener = {
            let job_worker = Arc::clone(&self.job_worker);
            let mut shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = job_worker.listen(receiver) => {}
                    _ = shutdown.recv() => {
                        info!("事件监听收到关闭信号");
                    }
                }
            })
        };

        let host_watcher = self.host_admin.as_ref().map(|admin| {
            let cloud = Arc::clone(&self.cloud);
            let receiver = admin.subscribe();
            let mut shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cloud.watch_host_events(receiver) => {}
                    _ = shutdown.recv() => {}
                }
            })
        });

        let dispatcher = tokio::spawn(run_dispatch_loop(
            Arc::clone(&self.job_worker),
            Duration::from_secs(self.config.dispatcher.execute_pending_interval_seconds),
            shutdown.resubscribe(),
        ));

        let monitor = tokio::spawn(run_monitor_loop(
            Arc::clone(&self.job_worker),
            self.config.monitor.clone(),
            shutdown.resubscribe(),
        ));

        shutdown.recv().await;
        info!("应用收到关闭信号");

        let (listener, dispatcher, monitor) = tokio::join!(listener, dispatcher, monitor);
        if let Some(host_watcher) = host_watcher {
            if let Err(e) = host_watcher.await {
                error!("主机事件监听异常退出: {}", e);
            }
        }
        for (name, result) in [("事件监听", listener), ("派发循环", dispatcher), ("监控循环", monitor)] {
            if let Err(e) = result {
                error!("{}异常退出: {}", name, e);
            }
        }

        self.log_summary().await
    }

    async fn submit_demo_jobs(&self) -> Result<()> {
        if self.options.demo_jobs == 0 {
            return Ok(());
        }
        if self.tasks.is_empty() {
            warn!("没有配置任务，跳过演示作业");
            return Ok(());
        }

        let groups: Vec<String> = self
            .hosts
            .iter()
            .filter_map(|h| h.group.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for i in 0..self.options.demo_jobs {
            let task = &self.tasks[i % self.tasks.len()];
            let mut job = Job::new(Uuid::new_v4(), task.id.clone())
                .with_priority((i % 3) as i32 + 1)
                .with_tag("demo");
            for (name, spec) in &task.parameters {
                if spec.required {
                    job = job.with_parameter(name.as_str(), serde_json::json!("demo"));
                }
            }
            if !groups.is_empty() {
                job = job.with_host_group(groups[i % groups.len()].as_str());
            }
            self.jobs
                .add(job)
                .await
                .with_context(|| format!("提交演示作业失败 (任务: {})", task.id))?;
        }

        info!("已提交 {} 个演示作业", self.options.demo_jobs);
        Ok(())
    }

    async fn log_summary(&self) -> Result<()> {
        for status in [
            JobStatus::Pending,
            JobStatus::Starting,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Error,
            JobStatus::TimedOut,
            JobStatus::Cancelled,
        ] {
            let count = self
                .jobs
                .count(&JobFilter::new().with_status(status))
                .await?;
            if count > 0 {
                info!("作业状态 {}: {}", status, count);
            }
        }
        Ok(())
    }
}

/// 周期性处理取消请求并派发待执行作业
async fn run_dispatch_loop(
    job_worker: Arc<JobWorker<JobId, TaskId>>,
    period: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = job_worker.process_cancel_requests().await {
                    error!("处理取消请求失败: {}", e);
                }
                if let Err(e) = job_worker.execute_pending().await {
                    error!("派发待执行作业失败: {}", e);
                }
            }
            _ = shutdown.recv() => {
                info!("派发循环收到关闭信号");
                break;
            }
        }
    }
}

/// 周期性执行心跳、超时与启动失败扫描
async fn run_monitor_loop(
    job_worker: Arc<JobWorker<JobId, TaskId>>,
    config: MonitorConfig,
    mut shutdown: ShutdownSignal,
) {
    let heartbeat_timeout = Duration::from_secs(config.heartbeat_timeout_seconds);
    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_seconds));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = job_worker.monitor_in_progress_heartbeat(heartbeat_timeout).await {
                    error!("心跳扫描失败: {}", e);
                }
                let timeouts = if config.use_dynamic_timeouts {
                    job_worker.monitor_timeouts().await
                } else {
                    job_worker.clean_long_running_jobs().await
                };
                if let Err(e) = timeouts {
                    error!("超时扫描失败: {}", e);
                }
                if let Err(e) = job_worker.clean_not_started_jobs().await {
                    error!("启动失败扫描失败: {}", e);
                }
            }
            _ = shutdown.recv() => {
                info!("监控循环收到关闭信号");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownManager;
    use orchestrator_testing_utils::TestEnv;

    fn config() -> AppConfig {
        AppConfig::from_toml(
            r#"
[dispatcher]
execute_pending_interval_seconds = 1

[monitor]
interval_seconds = 1

[[hosts]]
id = "h1"
running_jobs_limit = 2

[[hosts]]
id = "h2"
priority = 2

[[tasks]]
id = "import"
name = "Import"
parameters = { path = "string!" }
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_demo_jobs_run_to_completion() {
        let app = Arc::new(
            Application::new(
                config(),
                RunOptions {
                    demo_jobs: 4,
                    job_duration: Duration::from_millis(50),
                },
            )
            .unwrap(),
        );
        let shutdown = ShutdownManager::new();
        let handle = {
            let app = Arc::clone(&app);
            let signal = shutdown.subscribe();
            tokio::spawn(async move { app.run(signal).await })
        };

        let completed = JobFilter::new().with_status(JobStatus::Completed);
        let jobs = Arc::clone(app.jobs());
        let done = TestEnv::wait_for(
            || {
                let jobs = Arc::clone(&jobs);
                let completed = completed.clone();
                async move { jobs.count(&completed).await.unwrap_or(0) == 4 }
            },
            Duration::from_secs(10),
        )
        .await;
        assert!(done);

        shutdown.shutdown();
        handle.await.unwrap().unwrap();
        assert!(app.run(shutdown.subscribe()).await.is_err());
    }

    #[tokio::test]
    async fn test_removed_host_drops_cloud_handler() {
        let mut config = config();
        config.hosts[0].cloud_instance_handler_type = Some(SIMULATED_HANDLER_TYPE.to_string());
        let app = Arc::new(Application::new(config, RunOptions::default()).unwrap());
        let host = app.hosts[0].clone();
        app.cloud.handler_for(&host).await.unwrap();
        assert_eq!(app.cloud.cached_count().await, 1);

        let shutdown = ShutdownManager::new();
        let handle = {
            let app = Arc::clone(&app);
            let signal = shutdown.subscribe();
            tokio::spawn(async move { app.run(signal).await })
        };
        // 等待运行循环订阅主机事件
        tokio::time::sleep(Duration::from_millis(50)).await;

        let Some(HostAdmin::Flat(hosts)) = app.host_admin() else {
            panic!("expected flat host admin");
        };
        hosts.remove("h1").await.unwrap();

        let cloud = Arc::clone(&app.cloud);
        let evicted = TestEnv::wait_for(
            || {
                let cloud = Arc::clone(&cloud);
                async move { cloud.cached_count().await == 0 }
            },
            Duration::from_secs(2),
        )
        .await;
        assert!(evicted);

        shutdown.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_unknown_cloud_handler_rejected() {
        let mut config = config();
        config.hosts[0].cloud_instance_handler_type = Some("aws".to_string());
        assert!(Application::new(config, RunOptions::default()).is_err());
    }
}
