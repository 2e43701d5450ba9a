//! Command-line configuration
//!
//! Flags are parsed once into an immutable [`Config`] that is passed to whatever needs it.

use crate::error::{MroutedError, Result};
use clap::Parser;
use std::net::SocketAddr;

/// Bridge the multicast route is pointed at unless overridden
pub const DEFAULT_BRIDGE_NAME: &str = "br-siden";

/// Metrics listen address (all addresses, dual-stack)
pub const DEFAULT_PROM_LISTEN: &str = "[::]:9901";

pub const DEFAULT_PROM_PATH: &str = "/metrics";

/// Commit and build date, injected at build time when available
pub const BUILD_COMMIT: &str = match option_env!("GIT_COMMIT") {
    Some(commit) => commit,
    None => env!("CARGO_PKG_VERSION"),
};
pub const BUILD_DATE: &str = match option_env!("BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mroutemgrd",
    about = "Install a multicast route through a bridge interface",
    disable_version_flag = true
)]
pub struct Args {
    /// Print commit and build date, then exit
    #[arg(long)]
    pub version: bool,

    /// Bridge interface the multicast route points at
    #[arg(long, default_value = DEFAULT_BRIDGE_NAME)]
    pub bridge_name: String,

    /// Prometheus HTTP listen address
    #[arg(long, default_value = DEFAULT_PROM_LISTEN)]
    pub prom_listen: SocketAddr,

    /// Prometheus HTTP path
    #[arg(long, default_value = DEFAULT_PROM_PATH)]
    pub prom_path: String,

    /// Log filter (e.g. "info", "debug", "mroutemgrd=trace"); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Tokio worker threads
    #[arg(long, default_value_t = 1)]
    pub worker_threads: usize,

    /// Exit after provisioning instead of serving metrics until signalled
    #[arg(long)]
    pub oneshot: bool,
}

/// Whether the process stays up after provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Serve metrics until SIGINT/SIGTERM
    Daemon,
    /// Exit as soon as provisioning finishes
    Oneshot,
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bridge_name: String,
    pub prom_listen: SocketAddr,
    pub prom_path: String,
    pub log_level: String,
    pub worker_threads: usize,
    pub run_mode: RunMode,
}

impl Config {
    /// Build and validate a configuration from parsed flags
    pub fn from_args(args: Args) -> Result<Self> {
        let config = Self {
            bridge_name: args.bridge_name,
            prom_listen: args.prom_listen,
            prom_path: args.prom_path,
            log_level: args.log_level,
            worker_threads: args.worker_threads,
            run_mode: if args.oneshot {
                RunMode::Oneshot
            } else {
                RunMode::Daemon
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bridge_name.is_empty() {
            return Err(MroutedError::Config(
                "bridge name cannot be empty".to_string(),
            ));
        }
        if !self.prom_path.starts_with('/') {
            return Err(MroutedError::Config(format!(
                "metrics path must start with '/': {}",
                self.prom_path
            )));
        }
        if self.worker_threads == 0 {
            return Err(MroutedError::Config(
                "worker threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Line printed by `--version`
pub fn version_line() -> String {
    format!("commit:{}\tdate(UTC):{}", BUILD_COMMIT, BUILD_DATE)
}
