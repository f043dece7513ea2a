/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::view
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    In-memory rendering surface for mounted panels: regions,
    the busy indicator and the dashboard that owns global
    panels by identifier.

  Security / Safety Notes:
    Regions store markup that callers have already escaped.

  Dependencies:
    std::sync::Mutex for shared view ownership.

  Operational Scope:
    Mutated by descriptors on mount and by the refresh
    controller on every cycle; rendered to HTML by the CLI.

  Revision History:
    2025-02-11 COD  Introduced view surface and dashboard.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Idempotent mounting keyed by panel identifier
    - Lock poisoning never blocks indicator release
============================================================*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::markup::escape_html;

const SPINNER: &str = r#"<i class="fa fa-spin fa-circle-o-notch"></i>"#;

/// A toggleable block of the panel holding child markup.
#[derive(Debug, Clone)]
pub struct Region {
    class: &'static str,
    hidden: bool,
    items: Vec<String>,
    busy: u32,
}

impl Region {
    pub fn new(class: &'static str, hidden: bool) -> Self {
        Self {
            class,
            hidden,
            items: Vec::new(),
            busy: 0,
        }
    }

    pub fn hide(&mut self) {
        self.hidden = true;
    }

    pub fn reveal(&mut self) {
        self.hidden = false;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Drop child markup; the busy indicator is not a child.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn append(&mut self, markup: String) {
        self.items.push(markup);
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_busy(&self) -> bool {
        self.busy > 0
    }

    fn render(&self, tag: &str, content: &str) -> String {
        let hidden = if self.hidden { " hidden" } else { "" };
        let spinner = if self.is_busy() { SPINNER } else { "" };
        format!(
            r#"<{tag} class="{}{hidden}">{content}{}{spinner}</{tag}>"#,
            self.class,
            self.items.concat()
        )
    }
}

/// Shows and clears a busy state scoped to one region.
pub trait BusyIndicator: Send + Sync {
    fn show_busy(&self, region: &mut Region);
    fn hide_busy(&self, region: &mut Region);
}

/// Default indicator: a spinner visible while at least one cycle holds it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Spinner;

impl BusyIndicator for Spinner {
    fn show_busy(&self, region: &mut Region) {
        region.busy = region.busy.saturating_add(1);
    }

    fn hide_busy(&self, region: &mut Region) {
        region.busy = region.busy.saturating_sub(1);
    }
}

/// Live panel surface bound to one configuration.
#[derive(Debug)]
pub struct ViewContext {
    id: String,
    header: Vec<String>,
    login_href: Option<String>,
    refresh_bound: bool,
    warning_text: String,
    pub warning: Region,
    pub links: Region,
    generation: u64,
}

/// View shared between the host and in-flight refresh cycles.
pub type SharedView = Arc<Mutex<ViewContext>>;

/// Lock a shared view, recovering the data if a holder panicked.
pub fn lock_view(view: &SharedView) -> MutexGuard<'_, ViewContext> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ViewContext {
    pub fn new(id: &str, warning_text: &str) -> Self {
        Self {
            id: id.to_string(),
            header: Vec::new(),
            login_href: None,
            refresh_bound: false,
            warning_text: warning_text.to_string(),
            warning: Region::new("confluence-warning", true),
            links: Region::new("confluence-resolved-links", false),
            generation: 0,
        }
    }

    pub fn shared(self) -> SharedView {
        Arc::new(Mutex::new(self))
    }

    /// Prepend header markup once; repeated mounts do not stack copies.
    pub fn prepend_header(&mut self, markup: String) {
        if !self.header.contains(&markup) {
            self.header.insert(0, markup);
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn set_login_href(&mut self, href: Option<String>) {
        self.login_href = href;
    }

    pub fn login_href(&self) -> Option<&str> {
        self.login_href.as_deref()
    }

    pub fn bind_refresh(&mut self) {
        self.refresh_bound = true;
    }

    pub fn is_refresh_bound(&self) -> bool {
        self.refresh_bound
    }

    /// Start a refresh cycle and return its generation.
    pub fn begin_cycle(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// True while no later cycle has started.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn to_html(&self) -> String {
        let login = self
            .login_href
            .as_deref()
            .map(|href| {
                format!(
                    r#"<a class="confluence-login" target="_blank" href="{}">Login</a>"#,
                    escape_html(href)
                )
            })
            .unwrap_or_default();
        let refresh = if self.refresh_bound {
            r#"<a class="confluence-refresh"><i class="fa fa-refresh"></i></a>"#
        } else {
            ""
        };
        format!(
            r#"<div class="global-configuration" id="{}">{}{refresh}{}{}</div>"#,
            escape_html(&self.id),
            self.header.concat(),
            self.warning
                .render("div", &format!("{}{login}", escape_html(&self.warning_text))),
            self.links.render("ul", ""),
        )
    }
}

struct MountedPanel {
    id: String,
    nav_icon: String,
    view: SharedView,
}

/// Host container for global panels and their navigation icons.
#[derive(Default)]
pub struct Dashboard {
    panels: Vec<MountedPanel>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `view` under `id`, replacing any panel previously mounted there.
    pub fn mount(&mut self, id: &str, nav_icon: String, view: SharedView) {
        self.panels.retain(|panel| panel.id != id);
        self.panels.push(MountedPanel {
            id: id.to_string(),
            nav_icon,
            view,
        });
    }

    pub fn to_html(&self) -> String {
        let icons: String = self.panels.iter().map(|p| p.nav_icon.as_str()).collect();
        let panels: String = self
            .panels
            .iter()
            .map(|panel| lock_view(&panel.view).to_html())
            .collect();
        format!(r#"<div class="extra-menu">{icons}{panels}</div>"#)
    }
}
