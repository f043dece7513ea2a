/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::links
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Model the link-resolution payload served by Confluence and
    turn it into the ordered list entries of the global panel.

  Security / Safety Notes:
    Space names and hrefs are remote input and are escaped
    when rendered.

  Dependencies:
    serde / serde_json for the payload shape.

  Operational Scope:
    Payload validated by the fetcher, rendered by the refresh
    controller on every successful cycle.

  Revision History:
    2025-02-11 COD  Authored link list renderer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Source order preserved, no sorting
    - Pure rendering with no side effects
============================================================*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchFailure;
use crate::markup::escape_html;

/// Position of the browsable page link inside a space's `link` relations.
///
/// Confluence returns a heterogeneous relation list; the second entry is the
/// one pointing at the space home. A schema change upstream breaks this.
pub const CANONICAL_LINK_INDEX: usize = 1;

/// Body of `GET <url>/<query>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinksPayload {
    pub spaces: Vec<SpaceLinks>,
}

/// One space and its link relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceLinks {
    pub name: String,
    #[serde(default)]
    pub link: Vec<Value>,
}

impl SpaceLinks {
    pub fn canonical_href(&self) -> Option<&str> {
        self.link.get(CANONICAL_LINK_INDEX)?.get("href")?.as_str()
    }
}

impl LinksPayload {
    /// Reject payloads with a space lacking its canonical href.
    pub fn validate(&self) -> Result<(), FetchFailure> {
        match self
            .spaces
            .iter()
            .position(|space| space.canonical_href().is_none())
        {
            Some(index) => Err(FetchFailure::MalformedResponse(format!(
                "space #{index} (`{}`) has no link[{CANONICAL_LINK_INDEX}].href",
                self.spaces[index].name
            ))),
            None => Ok(()),
        }
    }
}

/// A presentable link. Entries are kept in payload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub name: String,
    pub href: String,
}

impl LinkEntry {
    pub fn to_markup(&self) -> String {
        format!(
            r#"<li><a target="_blank" href="{}"><i class="fa fa-chevron-right"></i>{}</a></li>"#,
            escape_html(&self.href),
            escape_html(&self.name)
        )
    }
}

/// Map a payload to link entries. Spaces without a canonical href are skipped.
pub fn render(payload: &LinksPayload) -> Vec<LinkEntry> {
    payload
        .spaces
        .iter()
        .filter_map(|space| {
            space.canonical_href().map(|href| LinkEntry {
                name: space.name.clone(),
                href: href.to_string(),
            })
        })
        .collect()
}
