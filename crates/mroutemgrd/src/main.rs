//! Multicast route provisioning daemon
//!
//! Main entry point for mroutemgrd.
//! Installs the multicast route once, then serves metrics until SIGINT/SIGTERM
//! (or exits straight away with `--oneshot`).

use anyhow::{Context, anyhow};
use clap::Parser;
use mroutemgrd::config::version_line;
use mroutemgrd::{
    Args, Config, MetricsCollector, MroutedError, NetlinkRouteTable, Provisioner, RunMode,
    start_metrics_server,
};
use std::process::ExitCode;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const PROGRAM_NAME: &str = "mroutemgrd";

fn main() -> ExitCode {
    let args = Args::parse();

    if args.version {
        println!("{}", version_line());
        return ExitCode::SUCCESS;
    }

    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", PROGRAM_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.log_level) {
        eprintln!("{}: {}", PROGRAM_NAME, e);
        return ExitCode::FAILURE;
    }

    info!("{}: Starting", PROGRAM_NAME);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "{}: Failed to build runtime", PROGRAM_NAME);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => {
            info!("{}: Exiting normally", PROGRAM_NAME);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let operation = e
                .downcast_ref::<MroutedError>()
                .map(MroutedError::operation)
                .unwrap_or("startup");
            error!(operation, error = %format!("{:#}", e), "{}: Fatal", PROGRAM_NAME);
            ExitCode::FAILURE
        }
    }
}

/// Install the global tracing subscriber; RUST_LOG overrides `log_level`
fn init_logging(log_level: &str) -> mroutemgrd::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| MroutedError::Config(format!("Invalid log level '{}': {}", log_level, e)))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| MroutedError::Config(format!("Failed to set logger: {}", e)))?;

    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let metrics = MetricsCollector::new().map_err(MroutedError::from)?;
    metrics.inc("main", "start", "count");

    let mut server = tokio::spawn(start_metrics_server(
        metrics.clone(),
        config.prom_listen,
        config.prom_path.clone(),
        shutdown.clone(),
    ));

    info!(bridge = %config.bridge_name, mode = ?config.run_mode, "Service init complete");

    let bridge = config.bridge_name.clone();
    let provision_metrics = metrics.clone();
    let provisioned = tokio::task::spawn_blocking(move || {
        let table = NetlinkRouteTable::new().map_err(|e| MroutedError::Resolution {
            name: bridge.clone(),
            reason: e.to_string(),
        })?;
        Provisioner::new(table, provision_metrics).run(&bridge)
    })
    .await
    .context("provisioning task failed")?;

    let report = match provisioned {
        Ok(report) => report,
        Err(e) => {
            shutdown.cancel();
            return Err(e.into());
        }
    };

    info!(
        interface = %report.interface.name,
        route = %report.route,
        outcome = %report.outcome,
        "{}: Route provisioned",
        PROGRAM_NAME
    );

    match config.run_mode {
        RunMode::Oneshot => shutdown.cancel(),
        RunMode::Daemon => {
            info!("Serving metrics until SIGINT/SIGTERM");
            tokio::select! {
                _ = shutdown.cancelled() => {}
                result = &mut server => {
                    server_result(result)?;
                    return Err(anyhow!("metrics server stopped unexpectedly"));
                }
            }
        }
    }

    server_result(server.await)
}

fn server_result(joined: Result<std::io::Result<()>, JoinError>) -> anyhow::Result<()> {
    joined
        .context("metrics server task failed")?
        .context("metrics server failed")
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = shutdown.cancelled() => return,
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = shutdown.cancelled() => return,
        }
    }

    info!("Signal caught, closing application");
    shutdown.cancel();
}
