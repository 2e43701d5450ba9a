//! Error types for mroutemgrd

use thiserror::Error;

/// Errors that can stop a provisioning run
///
/// `AlreadyPresent` is deliberately absent: a duplicate route is an outcome, not an error.
#[derive(Debug, Error)]
pub enum MroutedError {
    /// No interface with the requested name exists on the host
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    /// Interface lookup failed for any other reason
    #[error("Failed to resolve interface {name}: {reason}")]
    Resolution { name: String, reason: String },

    /// Kernel rejected the route for a reason other than duplication
    #[error("Failed to install route {route}: {reason}")]
    InstallFailed { route: String, reason: String },

    /// Malformed destination block
    #[error("Invalid address block: {0}")]
    InvalidAddressBlock(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Provisioner was asked to run again after reaching a terminal state
    #[error("Provisioning already finished in state {0}")]
    AlreadyRan(String),
}

impl MroutedError {
    /// Operation that was being attempted, for the fatal diagnostic
    pub fn operation(&self) -> &'static str {
        match self {
            MroutedError::InterfaceNotFound(_) | MroutedError::Resolution { .. } => {
                "resolve interface"
            }
            MroutedError::InstallFailed { .. } => "install route",
            MroutedError::InvalidAddressBlock(_) => "build route",
            MroutedError::Config(_) => "load configuration",
            MroutedError::Metrics(_) => "register metrics",
            MroutedError::AlreadyRan(_) => "provision",
        }
    }
}

/// Result type for mroutemgrd operations
pub type Result<T> = std::result::Result<T, MroutedError>;
