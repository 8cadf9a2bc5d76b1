use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use stock::{Alert, AlertStore, CredentialStore, Credentials, PriceResolver};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use tracing_futures::Instrument;

use crate::{notifier::Notifier, timer::Timer};

pub const ALARM_NAME: &str = "stockPriceCheck";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// First start of the process.
    Installed,
    /// Re-arm request, e.g. after an alert was added.
    StartMonitoring,
    Alarm(String),
    /// Stop after the commands queued ahead of it, including any cycle.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Armed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CyclePolicy {
    /// Keep a triggered alert when the notification could not be delivered.
    pub keep_alert_on_notify_failure: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub triggered: usize,
    pub failed: usize,
}

/// Everything one evaluation cycle needs.
#[derive(Clone)]
pub struct Pipeline {
    pub alerts: AlertStore,
    pub credentials: CredentialStore,
    pub resolver: Arc<PriceResolver>,
    pub notifier: Arc<dyn Notifier>,
    pub policy: CyclePolicy,
}

impl Pipeline {
    #[instrument(name = "run_cycle", skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let alerts = self.alerts.load().await.context("load alerts")?;
        if alerts.is_empty() {
            debug!("no alerts to check");
            return Ok(CycleReport::default());
        }

        let Some(credentials) = self.credentials.load().await.context("load credentials")? else {
            info!(alerts = alerts.len(), "telegram credentials not configured, skipping cycle");
            return Ok(CycleReport::default());
        };

        info!(alerts = alerts.len(), "checking stock prices");

        let mut report = CycleReport::default();

        for alert in alerts {
            report.checked += 1;

            let span = tracing::info_span!("check_alert", id = alert.id, symbol = %alert.symbol);

            match self.check_alert(&alert, &credentials).instrument(span).await {
                Ok(true) => report.triggered += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    error!(id = alert.id, symbol = %alert.symbol, error = ?e, "alert check failed");
                }
            }
        }

        info!(
            checked = report.checked,
            triggered = report.triggered,
            failed = report.failed,
            "completed price check"
        );
        Ok(report)
    }

    /// Returns true if the alert fired.
    async fn check_alert(&self, alert: &Alert, credentials: &Credentials) -> Result<bool> {
        let price = self.resolver.resolve(&alert.symbol).await;

        debug!(
            price,
            target = alert.price,
            kind = %alert.kind,
            "evaluating alert"
        );

        if !alert.should_trigger(price) {
            return Ok(false);
        }

        let delivered = match self.notifier.notify(&alert.message(price), credentials).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = ?e, "notification failed");
                false
            }
        };

        if delivered || !self.policy.keep_alert_on_notify_failure {
            self.alerts.remove(alert.id).await.context("remove triggered alert")?;
            info!(price, "alert triggered and removed");
        } else {
            info!(price, "alert triggered, kept for retry after notification failure");
        }

        Ok(true)
    }
}

/// Sends commands to a running `Monitor`.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<Command>,
}

impl MonitorHandle {
    pub fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    pub async fn installed(&self) -> Result<()> {
        self.send(Command::Installed).await
    }

    pub async fn start_monitoring(&self) -> Result<()> {
        self.send(Command::StartMonitoring).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("monitor is not running"))
    }
}

/// Owns the recurring timer and runs one cycle per alarm.
/// Commands are handled one at a time, so cycles never overlap.
pub struct Monitor<T> {
    timer: T,
    pipeline: Pipeline,
    delay: Duration,
    period: Duration,
    state: MonitorState,
}

impl<T: Timer> Monitor<T> {
    pub fn new(timer: T, pipeline: Pipeline, delay: Duration, period: Duration) -> Self {
        Self {
            timer,
            pipeline,
            delay,
            period,
            state: MonitorState::Idle,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Clear then create, so re-arming never stacks timers.
    pub async fn arm(&mut self) -> Result<()> {
        self.timer.clear(ALARM_NAME).await?;
        self.timer.create(ALARM_NAME, self.delay, self.period).await?;
        self.state = MonitorState::Armed;
        Ok(())
    }

    pub async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Installed | Command::StartMonitoring => {
                info!(command = ?cmd, "arming price check timer");
                if let Err(e) = self.arm().await {
                    error!(error = ?e, "arm timer failed");
                }
            }
            Command::Alarm(name) if name == ALARM_NAME => {
                if let Err(e) = self.pipeline.run_cycle().await {
                    error!(error = ?e, "price check cycle aborted");
                }
            }
            Command::Alarm(name) => debug!(alarm = %name, "ignoring unknown alarm"),
            Command::Shutdown => {
                if let Err(e) = self.timer.clear(ALARM_NAME).await {
                    warn!(error = ?e, "clear timer failed");
                }
                self.state = MonitorState::Idle;
            }
        }
    }

    /// Runs until `Command::Shutdown` or until every sender is dropped.
    /// A cycle in progress always runs to completion first.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            let stop = cmd == Command::Shutdown;
            self.handle(cmd).await;
            if stop {
                break;
            }
        }
        info!("monitor stopped");
    }
}
