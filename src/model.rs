/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::model
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Shared structures describing subscriptions, node
    configurations and the Confluence space enrichment data.

  Security / Safety Notes:
    Pure data containers; no I/O performed in this module.
    Parameter maps may hold passwords and must not be logged.

  Dependencies:
    serde for (de)serialization of host payloads.

  Operational Scope:
    Read by descriptors and the refresh controller; produced
    by the configuration layer and the space client.

  Revision History:
    2025-02-11 COD  Introduced subscription data contracts.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Optional enrichment never required for rendering
============================================================*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Namespace of this service inside the host framework.
pub const SERVICE_ID: &str = "service:km:confluence";
/// Base URL of the Confluence instance.
pub const PARAMETER_URL: &str = "service:km:confluence:url";
/// Space key (not name).
pub const PARAMETER_SPACE: &str = "service:km:confluence:space";
/// Login able to browse spaces.
pub const PARAMETER_USER: &str = "service:km:confluence:user";
pub const PARAMETER_PASSWORD: &str = "service:km:confluence:password";
/// Help page shared by the whole knowledge-management family.
pub const PARAMETER_HELP: &str = "service:km:help";

/// Parameter name to value mapping, as stored by the host.
pub type Parameters = BTreeMap<String, String>;

/// A configured service node (one Confluence instance).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

/// Node plus the per-panel parameters (`query` for the global panel).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub node: Node,
    #[serde(default)]
    pub parameters: Parameters,
}

impl Configuration {
    /// Endpoint resolving the links shown in the global panel.
    pub fn links_url(&self) -> Option<String> {
        let base = self.node.parameters.get(PARAMETER_URL)?;
        let query = self.parameters.get("query")?;
        Some(format!("{base}/{query}"))
    }
}

/// One attachment of the service to a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    pub id: u32,
    pub node: Node,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub data: Option<SubscriptionData>,
}

impl Subscription {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Enriched space, when the status check attached one.
    pub fn space(&self) -> Option<&Space> {
        self.data.as_ref()?.space.as_ref()
    }
}

/// Snapshot attached to a subscription by the status check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionData {
    #[serde(default)]
    pub space: Option<Space>,
}

/// A Confluence space: key as `id`, display name as `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<SpaceActivity>,
}

/// Last update seen in a space. Every field is optional: the activity
/// stream is scraped, not served by a REST API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceActivity {
    /// Moment as rendered by Confluence, in the locale of the querying user.
    #[serde(default)]
    pub moment: Option<String>,
    #[serde(default)]
    pub author: Option<SimpleUser>,
    /// Inlined `data:` URL, absent for the default avatar.
    #[serde(default)]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
}

/// Minimal user identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl SimpleUser {
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            self.id.clone()
        } else {
            parts.join(" ")
        }
    }

    /// Two upper-case letters: first letters of the first two words of the
    /// full name, or the first two letters of a single word.
    pub fn initials(&self) -> String {
        let full = self.full_name();
        let words: Vec<&str> = full.split_whitespace().collect();
        let letters: String = match words.as_slice() {
            [first, second, ..] => first.chars().take(1).chain(second.chars().take(1)).collect(),
            [single] => single.chars().take(2).collect(),
            [] => String::new(),
        };
        letters.to_uppercase()
    }
}
