//! # Renewal Daemon
//!
//! Periodically runs the ACME client, which in turn invokes the
//! `rotate-secrets` hook whenever a certificate was renewed.
//!
//! The client inherits the resolved environment (with `_FILE` values filled
//! in) rather than the raw process environment. Its stdout and stderr are
//! streamed into the log line by line under the `dehydrated` target.
//!
//! When metrics are served, the client also gets `ROTATION_METRICS_DIR`, and
//! the rotation metrics the hook leaves there are recorded after every run.

use crate::config::{DaemonConfig, Environment};
use crate::constants::SHORT_RENEWAL_INTERVAL_MINUTES;
use crate::observability::metrics;
use anyhow::{Context, Result};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RenewalDaemon {
    config: DaemonConfig,
    env: Environment,
    extra_args: Vec<String>,
}

impl RenewalDaemon {
    /// `extra_args` are appended after `--domain DOMAIN`
    pub fn new(config: DaemonConfig, mut env: Environment, extra_args: Vec<String>) -> Self {
        if let Some(dir) = &config.rotation_metrics_dir {
            env.set("ROTATION_METRICS_DIR", dir.to_string_lossy());
        }
        Self {
            config,
            env,
            extra_args,
        }
    }

    /// Full command line of the renewal client
    pub fn command_line(&self) -> Vec<String> {
        let mut line = vec![
            self.config.renewal_command.clone(),
            "--domain".to_string(),
            self.config.domain.clone(),
        ];
        line.extend(self.extra_args.iter().cloned());
        line
    }

    /// Run the client once and wait for it to exit
    pub async fn run_once(&self) -> Result<ExitStatus> {
        info!("Starting periodic check for certificate renewal...");
        metrics::increment_renewal_runs();

        let mut child = Command::new(&self.config.renewal_command)
            .arg("--domain")
            .arg(&self.config.domain)
            .args(&self.extra_args)
            .env_clear()
            .envs(self.env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.config.renewal_command))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(forward_lines(stdout), forward_lines(stderr));

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for {}", self.config.renewal_command))?;
        metrics::set_last_renewal_timestamp(chrono::Utc::now().timestamp());
        Ok(status)
    }

    /// Record the rotation metrics the hook left behind, if metrics are served
    async fn collect_rotation_metrics(&self) {
        let Some(dir) = &self.config.rotation_metrics_dir else {
            return;
        };
        match metrics::collect_rotation_snapshots(dir).await {
            Ok(0) => {}
            Ok(count) => debug!("Recorded metrics of {} rotation runs", count),
            Err(e) => warn!("Failed to collect rotation metrics: {:#}", e),
        }
    }

    /// Run until `INTERVAL` is 0 or the process is interrupted
    pub async fn run(&self) -> Result<()> {
        if self.config.interval_is_short() {
            warn!(
                "{} minutes between checking if certificates need renewing is very short. \
                 You should only need to check for certificates once or twice a day (anything under {} minutes is unusual).",
                self.config.interval_minutes, SHORT_RENEWAL_INTERVAL_MINUTES
            );
        }
        debug!("Renewal command will be: {}", self.command_line().join(" "));

        loop {
            match self.run_once().await {
                Ok(status) if status.success() => info!("Renewal check finished"),
                Ok(status) => {
                    metrics::increment_renewal_failures();
                    warn!("{} exited with {}", self.config.renewal_command, status);
                }
                Err(e) => {
                    metrics::increment_renewal_failures();
                    if self.config.interval().is_none() {
                        return Err(e);
                    }
                    error!("{:#}", e);
                }
            }

            self.collect_rotation_metrics().await;

            let Some(interval) = self.config.interval() else {
                info!("Exiting because the interval is set to 0.");
                return Ok(());
            };

            info!(
                "Waiting {} minutes until next check...",
                self.config.interval_minutes
            );
            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    info!("Received shutdown signal, exiting");
                    return Ok(());
                }
            }
        }
    }
}

async fn forward_lines<R>(stream: Option<R>)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if !line.is_empty() {
                    info!(target: "dehydrated", "{}", line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read renewal output: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::RotationSnapshot;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn config(command: &str, interval: u64) -> DaemonConfig {
        DaemonConfig {
            domain: "example.com".to_string(),
            interval_minutes: interval,
            renewal_command: command.to_string(),
            metrics_port: None,
            rotation_metrics_dir: None,
        }
    }

    fn env() -> Environment {
        Environment::from_vars([("PATH", std::env::var("PATH").unwrap_or_default())])
    }

    #[test]
    fn test_command_line() {
        let daemon = RenewalDaemon::new(
            config("dehydrated", 720),
            Environment::default(),
            vec!["--cron".to_string(), "--accept-terms".to_string()],
        );
        assert_eq!(
            daemon.command_line(),
            vec!["dehydrated", "--domain", "example.com", "--cron", "--accept-terms"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_once_reports_exit_status() {
        let daemon = RenewalDaemon::new(config("true", 0), env(), Vec::new());
        assert!(daemon.run_once().await.unwrap().success());

        let daemon = RenewalDaemon::new(config("false", 0), env(), Vec::new());
        assert!(!daemon.run_once().await.unwrap().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_interval_runs_once_and_exits() {
        let daemon = RenewalDaemon::new(config("true", 0), env(), Vec::new());
        daemon.run().await.unwrap();
    }

    #[test]
    fn test_client_learns_where_to_leave_rotation_metrics() {
        let mut with_metrics = config("dehydrated", 720);
        with_metrics.metrics_port = Some(9090);
        with_metrics.rotation_metrics_dir = Some(PathBuf::from("/tmp/rotation-metrics"));

        let daemon = RenewalDaemon::new(with_metrics, Environment::default(), Vec::new());
        assert_eq!(daemon.env.get("ROTATION_METRICS_DIR"), Some("/tmp/rotation-metrics"));

        let daemon = RenewalDaemon::new(config("dehydrated", 720), Environment::default(), Vec::new());
        assert!(!daemon.env.contains("ROTATION_METRICS_DIR"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_records_rotation_metrics_left_by_the_hook() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = RotationSnapshot {
            aliases_refreshed: BTreeMap::from([("cert".to_string(), 3)]),
            ..RotationSnapshot::default()
        };
        let written = metrics::write_rotation_snapshot(dir.path(), "example.com", &snapshot)
            .await
            .unwrap();

        let mut with_metrics = config("true", 0);
        with_metrics.metrics_port = Some(9090);
        with_metrics.rotation_metrics_dir = Some(dir.path().to_path_buf());

        let refreshed =
            |s: &RotationSnapshot| s.aliases_refreshed.get("cert").copied().unwrap_or(0);
        let before = refreshed(&metrics::rotation_snapshot());
        RenewalDaemon::new(with_metrics, env(), Vec::new())
            .run()
            .await
            .unwrap();

        assert!(refreshed(&metrics::rotation_snapshot()) >= before + 3);
        assert!(!written.exists());
    }

    #[tokio::test]
    async fn test_missing_command_fails_in_run_once_mode() {
        let daemon = RenewalDaemon::new(
            config("definitely-not-a-renewal-client", 0),
            env(),
            Vec::new(),
        );
        assert!(daemon.run().await.is_err());
    }
}
