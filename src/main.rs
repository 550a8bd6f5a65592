//! # Swarm Secret Rotator
//!
//! Renewal daemon. Runs the ACME client every `INTERVAL` minutes with
//! `--domain $DOMAIN` followed by any arguments given on the command line.
//!
//! ## Usage
//!
//! ```bash
//! DOMAIN=example.com KEY_SECRET=key CERT_SECRET=cert \
//!   swarm-secret-rotator --cron --hook /usr/local/bin/hook.sh
//! ```
//!
//! `_FILE` variables are resolved before anything else, so
//! `DOMAIN_FILE=/run/secrets/domain` works for every setting, including the
//! ones only the deploy hook reads.

use anyhow::{Context, Result};
use clap::Parser;
use swarm_secret_rotator::config::{DaemonConfig, Environment};
use swarm_secret_rotator::runtime::{
    init_tracing, install_crypto_provider, start_metrics_server, RenewalDaemon,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swarm-secret-rotator", version)]
#[command(about = "Periodically renews certificates and rotates them into Docker Swarm secrets", long_about = None)]
struct Args {
    /// Arguments passed to the renewal command after `--domain DOMAIN`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    renewal_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let raw_env = Environment::from_vars(std::env::vars());
    init_tracing(&raw_env)?;
    install_crypto_provider();
    let env = raw_env.resolve_file_indirection();

    let config = DaemonConfig::from_env(&env).context("Invalid daemon configuration")?;
    info!(
        "Starting swarm-secret-rotator v{} for {}",
        env!("CARGO_PKG_VERSION"),
        config.domain
    );

    // Kept alive for the lifetime of the daemon
    let _server_state = match config.metrics_port {
        Some(port) => Some(start_metrics_server(port).await?),
        None => None,
    };

    RenewalDaemon::new(config, env, args.renewal_args)
        .run()
        .await
}
