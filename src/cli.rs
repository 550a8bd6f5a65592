//! # rotate-secrets
//!
//! Deploy hook invoked by the ACME client after a certificate was renewed.
//!
//! ## Usage
//!
//! ```bash
//! KEY_SECRET=key CERT_SECRET=cert \
//!   rotate-secrets example.com privkey.pem cert.pem fullchain.pem chain.pem
//! ```
//!
//! Only kinds whose prefix variable is set are rotated. Exits non-zero when
//! the rotation stopped early, or when any item failed under
//! `ROTATION_FAILURE_POLICY=continue`.
//!
//! When `ROTATION_METRICS_DIR` is set (the daemon sets it whenever it serves
//! metrics), the run's rotation metrics are left there for the daemon.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use swarm_secret_rotator::config::{DockerConfig, Environment, RotationConfig};
use swarm_secret_rotator::controller::rotation::{rotate, CertificateFiles, RotationPlan};
use swarm_secret_rotator::model::VersionStamp;
use swarm_secret_rotator::observability::metrics;
use swarm_secret_rotator::provider::DockerSwarm;
use swarm_secret_rotator::runtime::{init_tracing, install_crypto_provider};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "rotate-secrets", version)]
#[command(about = "Rotate Docker Swarm secrets to a renewed certificate", long_about = None)]
struct Args {
    /// Domain the certificate was issued for
    domain: String,
    /// Private key file
    keyfile: PathBuf,
    /// Certificate file
    certfile: PathBuf,
    /// Full chain file (certificate followed by intermediates)
    fullchainfile: PathBuf,
    /// Chain file (intermediates only)
    chainfile: PathBuf,
    /// Version stamp to use instead of the current local time
    #[arg(long)]
    stamp: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let raw_env = Environment::from_vars(std::env::vars());
    init_tracing(&raw_env)?;
    install_crypto_provider();
    let env = raw_env.resolve_file_indirection();

    let rotation = RotationConfig::from_env(&env).context("Invalid rotation configuration")?;
    let docker = DockerConfig::from_env(&env).context("Invalid Docker configuration")?;

    let stamp = args
        .stamp
        .as_deref()
        .map_or_else(VersionStamp::now, VersionStamp::new);
    let files = CertificateFiles {
        key: args.keyfile,
        cert: args.certfile,
        fullchain: args.fullchainfile,
        chain: args.chainfile,
    };
    let plan = RotationPlan::new(&rotation, &args.domain, &files, stamp)
        .context("Cannot build secret names")?;

    let swarm = DockerSwarm::new(&docker).context("Failed to create Docker client")?;
    info!(
        "Rotating secrets for {} on {} (failure policy: {})",
        args.domain,
        swarm.endpoint(),
        rotation.failure_policy
    );

    let result = rotate(&swarm, &swarm, &plan).await;

    let snapshot = metrics::rotation_snapshot();
    if let Some(dir) = env.get("ROTATION_METRICS_DIR").filter(|_| !snapshot.is_empty()) {
        let name = format!("{}-{}", args.domain, plan.stamp);
        match metrics::write_rotation_snapshot(Path::new(dir), &name, &snapshot).await {
            Ok(path) => debug!("Rotation metrics written to {}", path.display()),
            Err(e) => warn!("Failed to hand rotation metrics to the daemon: {:#}", e),
        }
    }

    let report = result.with_context(|| format!("Secret rotation for {} failed", args.domain))?;

    if report.is_success() {
        info!("All done!");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            "Rotation for {} finished with {} failures",
            args.domain,
            report.failure_count()
        );
        Ok(ExitCode::FAILURE)
    }
}
