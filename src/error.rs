/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise error types for the Confluence service panel,
    separating host-facing failures from the fetch failures
    absorbed by the refresh cycle.

  Security / Safety Notes:
    Error contexts never carry passwords or session cookies;
    only URLs and parameter names are exposed.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2025-02-11 COD  Established panel error taxonomy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::process::ExitCode;

use thiserror::Error;

/// Result alias for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Enumerates high-level error domains surfaced to the host.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error("Parameter `{parameter}` rejected: {code}")]
    Validation { parameter: String, code: String },
}

impl PanelError {
    pub fn validation(parameter: &str, code: &str) -> Self {
        PanelError::Validation {
            parameter: parameter.to_string(),
            code: code.to_string(),
        }
    }

    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PanelError::Config(_) => ExitCode::from(20),
            PanelError::Validation { .. } => ExitCode::from(21),
            PanelError::Network(_) => ExitCode::from(30),
            PanelError::Serialization(_) => ExitCode::from(31),
            PanelError::Filesystem(_) => ExitCode::from(40),
            PanelError::Runtime(_) => ExitCode::from(50),
        }
    }
}

/// Why a link fetch did not produce a usable payload.
///
/// The refresh cycle treats every variant the same way (warning banner),
/// the distinction only feeds the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("no active session: {0}")]
    Unauthenticated(String),
}
