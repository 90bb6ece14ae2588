use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orchestrator::app::{Application, RunOptions};
use orchestrator::shutdown::{wait_for_signal, ShutdownManager};
use orchestrator_config::{AppConfig, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("orchestrator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("作业编排与主机负载均衡引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时依次查找 config/orchestrator.toml 和 orchestrator.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("demo-jobs")
                .long("demo-jobs")
                .value_name("COUNT")
                .help("启动后提交的演示作业数量")
                .value_parser(value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            Arg::new("job-duration")
                .long("job-duration")
                .value_name("SECONDS")
                .help("本地执行后端完成一个作业所需的秒数")
                .value_parser(value_parser!(u64))
                .default_value("5"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str)).with_context(|| {
        format!(
            "加载配置失败: {}",
            config_path.map(String::as_str).unwrap_or("<默认路径>")
        )
    })?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.parse().map_err(anyhow::Error::msg)?;
    }

    init_logging(&config.observability.log_level, config.observability.log_format)?;
    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_port)?;
    }

    let options = RunOptions {
        demo_jobs: matches.get_one::<usize>("demo-jobs").copied().unwrap_or(0),
        job_duration: Duration::from_secs(
            matches.get_one::<u64>("job-duration").copied().unwrap_or(5),
        ),
    };

    info!("启动作业编排引擎");
    info!(
        "负载均衡: {:?}，派发间隔: {}秒，监控间隔: {}秒",
        config.dispatcher.load_balancer,
        config.dispatcher.execute_pending_interval_seconds,
        config.monitor.interval_seconds
    );

    let app = Arc::new(Application::new(config, options)?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown = shutdown_manager.subscribe();
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_signal().await.context("安装信号处理器失败")?;
    info!("开始优雅关闭...");
    shutdown_manager.shutdown();

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("作业编排引擎已退出");
    Ok(())
}

fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}

fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("安装Prometheus指标导出器失败")?;
    info!("Prometheus指标导出器监听端口 {}", port);
    Ok(())
}
