//! The async report sender, per spec.md §4.10.
//!
//! A long-lived worker with bounded channels: `fan_in` (reports accepted
//! from call sites), `acks` (write completions from spawned POST workers),
//! and a `finish`/`done` pair for graceful shutdown. Sender state
//! (`in_flight`, `lost`, `counter`) is touched only by this loop; workers
//! communicate back exclusively through `acks`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bearer_config::envelope::{AgentInfo, ApplicationInfo, RuntimeInfo};
use bearer_config::Config;
use bearer_protocol::log_level::LogLevel;
use bearer_protocol::report::{ReportLog, ReportType};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::SenderError;

const FAN_IN_CAPACITY: usize = 100;
const ACKS_CAPACITY: usize = 1000;
const IDLE_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Serialize)]
struct LogsEnvelope {
    #[serde(rename = "secretKey")]
    secret_key: String,
    #[serde(rename = "appEnvironment")]
    app_environment: String,
    application: ApplicationInfo,
    runtime: RuntimeInfo,
    agent: AgentInfo,
    logs: Vec<ReportLog>,
}

pub enum PostOutcome {
    Success,
    HttpError(u16),
    NetworkError(String),
}

/// The narrow POST boundary the sender drives, mocked in tests (spec.md
/// §10.5).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn post(&self, report: ReportLog) -> PostOutcome;
}

pub struct ReqwestReportTransport {
    client: reqwest::Client,
    config: Arc<Config>,
}

impl ReqwestReportTransport {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ReportTransport for ReqwestReportTransport {
    async fn post(&self, report: ReportLog) -> PostOutcome {
        let environment = self.config.environment_tag().unwrap_or("").to_string();
        let encoded_environment = URL_SAFE_NO_PAD.encode(environment.as_bytes());
        let envelope = LogsEnvelope {
            secret_key: self
                .config
                .secret_key()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
            app_environment: encoded_environment.clone(),
            application: ApplicationInfo {
                environment: encoded_environment,
            },
            runtime: RuntimeInfo::detect(),
            agent: AgentInfo::default(),
            logs: vec![report],
        };

        let result = self
            .client
            .post(self.config.logs_endpoint().clone())
            .header(
                "Authorization",
                self.config.secret_key().map(|k| k.as_str().to_string()).unwrap_or_default(),
            )
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Accept", "application/json")
            .json(&envelope)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    PostOutcome::Success
                } else {
                    PostOutcome::HttpError(status.as_u16())
                }
            }
            Err(err) => PostOutcome::NetworkError(err.to_string()),
        }
    }
}

/// A handle to the running sender task. Dropping it without calling
/// [`SenderHandle::close`] abandons the task; prefer `close` for a clean
/// drain.
pub struct SenderHandle {
    fan_in: mpsc::Sender<ReportLog>,
    finish_tx: Option<oneshot::Sender<()>>,
    done_rx: oneshot::Receiver<()>,
    task: JoinHandle<()>,
}

impl SenderHandle {
    pub async fn submit(&self, report: ReportLog) -> Result<(), SenderError> {
        if self.fan_in.send(report).await.is_err() {
            tracing::warn!("report sender is closed, dropping report");
            return Err(SenderError::FanInClosed);
        }
        Ok(())
    }

    /// Signals `finish`, closes `fan_in`, and awaits the drain loop's `done`.
    pub async fn close(self) {
        let SenderHandle {
            fan_in,
            finish_tx,
            mut done_rx,
            task,
        } = self;
        drop(fan_in);
        if let Some(tx) = finish_tx {
            let _ = tx.send(());
        }
        let _ = (&mut done_rx).await;
        let _ = task.await;
    }
}

pub fn spawn<T: ReportTransport + 'static>(config: Arc<Config>, transport: T) -> SenderHandle {
    let transport = Arc::new(transport);
    let (fan_in_tx, fan_in_rx) = mpsc::channel(FAN_IN_CAPACITY);
    let (acks_tx, acks_rx) = mpsc::channel(ACKS_CAPACITY);
    let (finish_tx, finish_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let task = tokio::spawn(run(config, transport, fan_in_rx, acks_rx, acks_tx, finish_rx, done_tx));

    SenderHandle {
        fan_in: fan_in_tx,
        finish_tx: Some(finish_tx),
        done_rx,
        task,
    }
}

struct SenderState {
    in_flight: usize,
    in_flight_limit: usize,
    lost: usize,
    counter: u64,
}

impl SenderState {
    fn accept<T: ReportTransport + 'static>(
        &mut self,
        report: ReportLog,
        transport: &Arc<T>,
        acks_tx: &mpsc::Sender<u32>,
    ) {
        if self.in_flight >= self.in_flight_limit {
            self.lost += 1;
            return;
        }
        self.in_flight += 1;
        spawn_post(transport.clone(), report, acks_tx.clone());
    }

    fn acknowledge<T: ReportTransport + 'static>(
        &mut self,
        n: u32,
        config: &Config,
        transport: &Arc<T>,
        acks_tx: &mpsc::Sender<u32>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(n as usize);
        self.counter += n as u64;
        if self.lost > 0 && self.in_flight < self.in_flight_limit {
            self.in_flight += 1;
            let loss_report = synthesize_loss_report(config, self.lost);
            spawn_post(transport.clone(), loss_report, acks_tx.clone());
            self.lost = 0;
        }
    }
}

async fn run<T: ReportTransport + 'static>(
    config: Arc<Config>,
    transport: Arc<T>,
    mut fan_in: mpsc::Receiver<ReportLog>,
    mut acks_rx: mpsc::Receiver<u32>,
    acks_tx: mpsc::Sender<u32>,
    mut finish_rx: oneshot::Receiver<()>,
    done_tx: oneshot::Sender<()>,
) {
    let mut state = SenderState {
        in_flight: 0,
        in_flight_limit: config.in_flight_limit(),
        lost: 0,
        counter: 0,
    };
    let mut idle = tokio::time::interval(IDLE_INTERVAL);

    loop {
        tokio::select! {
            report = fan_in.recv() => {
                match report {
                    Some(rl) => state.accept(rl, &transport, &acks_tx),
                    None => break,
                }
            }
            Some(n) = acks_rx.recv() => {
                state.acknowledge(n, &config, &transport, &acks_tx);
            }
            _ = &mut finish_rx => {
                break;
            }
            _ = idle.tick() => {}
        }
    }

    drain(&config, &transport, &mut fan_in, &mut acks_rx, &acks_tx, &mut state).await;
    let _ = done_tx.send(());
}

async fn drain<T: ReportTransport + 'static>(
    config: &Arc<Config>,
    transport: &Arc<T>,
    fan_in: &mut mpsc::Receiver<ReportLog>,
    acks_rx: &mut mpsc::Receiver<u32>,
    acks_tx: &mpsc::Sender<u32>,
    state: &mut SenderState,
) {
    let mut fan_in_closed = false;
    loop {
        if fan_in_closed && state.in_flight == 0 {
            return;
        }
        tokio::select! {
            report = fan_in.recv(), if !fan_in_closed => {
                match report {
                    Some(rl) => state.accept(rl, transport, acks_tx),
                    None => fan_in_closed = true,
                }
            }
            Some(n) = acks_rx.recv() => {
                state.acknowledge(n, config, transport, acks_tx);
            }
        }
    }
}

fn spawn_post<T: ReportTransport + 'static>(transport: Arc<T>, report: ReportLog, acks_tx: mpsc::Sender<u32>) {
    tokio::spawn(async move {
        match transport.post(report.clone()).await {
            PostOutcome::Success => {}
            PostOutcome::HttpError(status) if status < 100 || status >= 400 => {
                tracing::warn!(status, ?report, "logs endpoint rejected report");
            }
            PostOutcome::HttpError(_) => {}
            PostOutcome::NetworkError(message) => {
                tracing::warn!(%message, "network error posting report");
            }
        }
        let _ = acks_tx.send(1).await;
    });
}

fn synthesize_loss_report(config: &Config, lost: usize) -> ReportLog {
    let host = config.logs_endpoint().host_str().unwrap_or_default().to_string();
    let port = config.logs_endpoint().port_or_known_default().unwrap_or(443);
    let mut report = ReportLog::minimal(LogLevel::Restricted, config.logs_endpoint().scheme(), &host, port, ReportType::ReportLoss);
    report.error_code = Some(lost.to_string());
    report.error_message = Some(format!("{lost} report logs were lost"));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearer_config::SecretKey;

    fn config() -> Arc<Config> {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        Arc::new(Config::builder(Some(key)).build().unwrap())
    }

    fn report() -> ReportLog {
        ReportLog::minimal(LogLevel::Detected, "https", "api.example.com", 443, ReportType::RequestEnd)
    }

    #[tokio::test]
    async fn accepted_reports_are_posted_and_acknowledged() {
        let mut transport = MockReportTransport::new();
        transport.expect_post().returning(|_| PostOutcome::Success);

        let handle = spawn(config(), transport);
        let _ = handle.submit(report()).await;
        handle.close().await;
    }

    #[tokio::test]
    async fn saturated_in_flight_drops_and_loses_reports() {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        let cfg = Arc::new(
            Config::builder(Some(key))
                .apply(vec![bearer_config::in_flight_limit(1)])
                .unwrap()
                .build()
                .unwrap(),
        );

        let mut transport = MockReportTransport::new();
        transport.expect_post().returning(|_| PostOutcome::Success);

        let handle = spawn(cfg, transport);
        for _ in 0..5 {
            let _ = handle.submit(report()).await;
        }
        handle.close().await;
    }

    #[tokio::test]
    async fn network_error_still_acknowledges() {
        let mut transport = MockReportTransport::new();
        transport
            .expect_post()
            .returning(|_| PostOutcome::NetworkError("connection refused".to_string()));

        let handle = spawn(config(), transport);
        let _ = handle.submit(report()).await;
        handle.close().await;
    }

    #[test]
    fn envelope_base64url_encodes_environment_tag() {
        let key = SecretKey::parse(&format!("app_{}", "a".repeat(50))).unwrap();
        let cfg = Arc::new(
            Config::builder(Some(key))
                .apply(vec![bearer_config::environment_tag("staging")])
                .unwrap()
                .build()
                .unwrap(),
        );
        let environment = cfg.environment_tag().unwrap_or("").to_string();
        let encoded = URL_SAFE_NO_PAD.encode(environment.as_bytes());
        assert_eq!(encoded, "c3RhZ2luZw");
    }

    #[tokio::test]
    async fn submit_reports_fan_in_closed_once_the_receiver_is_gone() {
        let (fan_in_tx, fan_in_rx) = mpsc::channel(FAN_IN_CAPACITY);
        drop(fan_in_rx);
        let (finish_tx, _finish_rx) = oneshot::channel();
        let (_done_tx, done_rx) = oneshot::channel();
        let handle = SenderHandle {
            fan_in: fan_in_tx,
            finish_tx: Some(finish_tx),
            done_rx,
            task: tokio::spawn(async {}),
        };

        let result = handle.submit(report()).await;
        assert!(matches!(result, Err(SenderError::FanInClosed)));
    }
}
