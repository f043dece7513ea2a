/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load the operator configuration describing the Confluence
    node, the attached space and the logging location, and
    project it onto the host data model.

  Security / Safety Notes:
    The file may contain a Confluence password; it is read
    only and never echoed back in diagnostics.

  Dependencies:
    toml + serde for parsing, dirs for default locations.

  Operational Scope:
    Consumed once at start-up by the CLI entry point.

  Revision History:
    2025-02-11 COD  Authored configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults for every optional key
    - Missing explicit files are errors, never ignored
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PanelError, Result};
use crate::model::{
    Configuration, Node, Parameters, Subscription, PARAMETER_HELP, PARAMETER_PASSWORD,
    PARAMETER_SPACE, PARAMETER_URL, PARAMETER_USER,
};

const APP_DIR: &str = "km-confluence";
const DEFAULT_QUERY: &str = "rest/links";

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub node: NodeConfig,
    pub subscription: SubscriptionConfig,
    pub logging: LoggingConfig,
}

/// `[node]` section: one Confluence instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub id: String,
    pub url: String,
    /// Path appended to `url` to resolve the global panel links.
    pub query: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub help: Option<String>,
    /// Request timeout in seconds; transport defaults apply when unset.
    pub timeout: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "service:km:confluence:default".into(),
            url: String::new(),
            query: DEFAULT_QUERY.into(),
            user: None,
            password: None,
            help: None,
            timeout: None,
        }
    }
}

/// `[subscription]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub id: u32,
    pub space: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
}

impl PanelConfig {
    /// Load from `path`, or from the default location when `None`.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load(explicit),
            None => match default_config_path() {
                Some(default) if default.exists() => Self::load(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PanelError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|err| PanelError::Config(format!("Invalid {}: {err}", path.display())))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        let mut config: PanelConfig = toml::from_str(raw)?;
        config.node.url = config.node.url.trim_end_matches('/').to_string();
        config.node.query = config.node.query.trim_start_matches('/').to_string();
        Ok(config)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
                .join("logs")
        })
    }

    /// Fail early when no Confluence URL is configured.
    pub fn require_url(&self) -> Result<&str> {
        if self.node.url.is_empty() {
            return Err(PanelError::Config("`node.url` is required".into()));
        }
        Ok(&self.node.url)
    }

    pub fn node(&self) -> Node {
        let mut parameters = Parameters::new();
        parameters.insert(PARAMETER_URL.into(), self.node.url.clone());
        if let Some(user) = &self.node.user {
            parameters.insert(PARAMETER_USER.into(), user.clone());
        }
        if let Some(password) = &self.node.password {
            parameters.insert(PARAMETER_PASSWORD.into(), password.clone());
        }
        if let Some(help) = &self.node.help {
            parameters.insert(PARAMETER_HELP.into(), help.clone());
        }
        Node {
            id: self.node.id.clone(),
            name: Some("Confluence".into()),
            parameters,
        }
    }

    /// Configuration bound to the global panel.
    pub fn global_configuration(&self) -> Configuration {
        let mut parameters = Parameters::new();
        parameters.insert("query".into(), self.node.query.clone());
        Configuration {
            node: self.node(),
            parameters,
        }
    }

    /// Subscription carrying node parameters plus the space key.
    pub fn subscription(&self) -> Subscription {
        let node = self.node();
        let mut parameters = node.parameters.clone();
        if let Some(space) = &self.subscription.space {
            parameters.insert(PARAMETER_SPACE.into(), space.clone());
        }
        Subscription {
            id: self.subscription.id,
            node,
            parameters,
            data: None,
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}
