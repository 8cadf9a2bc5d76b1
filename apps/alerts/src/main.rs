use std::sync::Arc;

use alerts::{
    CyclePolicy, Monitor, MonitorHandle, Pipeline, config::Config, notifier::TelegramNotifier,
    timer::CronTimer,
};
use anyhow::{Context, Result};
use stock::{
    AlertStore, CredentialStore, FmpSource, KeyValueStore, MemoryStore, PriceResolver,
    PriceSource, RedisStore, TwelveDataSource, http_client,
};
use tokio::sync::mpsc;
use tokio_cron_scheduler::JobScheduler;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const COMMAND_QUEUE: usize = 4;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    info!(version = %config.version, "starting stock price alerts");

    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisStore::new(url, config.key_prefix.clone())
                .await
                .context("init redis store failed")?,
        ),
        None => {
            warn!("REDIS_URL not set, alerts are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let alerts = AlertStore::new(Arc::clone(&kv));
    let credentials = CredentialStore::new(Arc::clone(&kv));

    if let Some(creds) = &config.credentials {
        credentials.save(creds).await?;
    }

    let client = http_client(config.http_timeout)?;
    let sources: Vec<Box<dyn PriceSource>> = vec![
        Box::new(FmpSource::new(
            client.clone(),
            config.fmp_base_url.clone(),
            config.fmp_api_key.clone(),
        )),
        Box::new(TwelveDataSource::new(
            client.clone(),
            config.twelve_data_base_url.clone(),
            config.twelve_data_api_key.clone(),
        )),
    ];

    let pipeline = Pipeline {
        alerts,
        credentials,
        resolver: Arc::new(PriceResolver::new(sources)),
        notifier: Arc::new(TelegramNotifier::new(client, config.telegram_base_url.clone())),
        policy: CyclePolicy {
            keep_alert_on_notify_failure: config.keep_alert_on_notify_failure,
        },
    };

    let mut sched = JobScheduler::new()
        .await
        .context("failed to create job scheduler")?;

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let timer = CronTimer::new(sched.clone(), tx.clone());
    let monitor = Monitor::new(timer, pipeline, config.initial_delay, config.check_interval);
    let monitor_task = tokio::spawn(monitor.run(rx));

    sched.start().await?;

    let handle = MonitorHandle::new(tx);
    handle.installed().await?;

    shutdown_signal().await;

    // queued behind any running cycle, which finishes first
    handle.shutdown().await?;
    monitor_task.await?;
    sched.shutdown().await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            warn!("failed to install signal handlers, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
