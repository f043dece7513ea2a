/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::refresh
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Drive one refresh cycle of the global panel: reset the
    view, hold the busy indicator, fetch, then render links or
    reveal the warning banner.

  Security / Safety Notes:
    Never raises to the host; every fetch failure ends in the
    warning banner.

  Dependencies:
    tokio for the fetch task, the LinkFetcher seam.

  Operational Scope:
    Invoked once when a panel mounts and again on every manual
    refresh of that panel.

  Revision History:
    2025-02-11 COD  Implemented refresh lifecycle.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Busy indicator released on every exit path
    - Stale responses discarded by generation
    - Full replacement of the list, never a merge
============================================================*/

use std::sync::Arc;

use crate::error::FetchFailure;
use crate::fetcher::{FetchOutcome, LinkFetcher};
use crate::links;
use crate::logger::Logger;
use crate::model::Configuration;
use crate::view::{lock_view, BusyIndicator, SharedView};

/// Releases the busy indicator of a view's link region when dropped.
struct BusyGuard {
    view: SharedView,
    indicator: Arc<dyn BusyIndicator>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut view = lock_view(&self.view);
        self.indicator.hide_busy(&mut view.links);
    }
}

/// Runs refresh cycles against shared views.
pub struct RefreshController {
    fetcher: Arc<dyn LinkFetcher>,
    indicator: Arc<dyn BusyIndicator>,
    logger: Arc<Logger>,
}

impl RefreshController {
    pub fn new(
        fetcher: Arc<dyn LinkFetcher>,
        indicator: Arc<dyn BusyIndicator>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            fetcher,
            indicator,
            logger,
        }
    }

    /// Run one cycle. Always returns with the busy indicator released.
    pub async fn refresh(&self, view: &SharedView, configuration: &Configuration) {
        let (generation, _busy) = {
            let mut state = lock_view(view);
            state.warning.hide();
            state.links.reveal();
            state.links.clear();
            let generation = state.begin_cycle();
            self.indicator.show_busy(&mut state.links);
            let guard = BusyGuard {
                view: Arc::clone(view),
                indicator: Arc::clone(&self.indicator),
            };
            (generation, guard)
        };
        self.logger
            .debug("REFRESH", format!("cycle {generation} started"));

        let outcome = match configuration.links_url() {
            Some(url) => self.dispatch(url).await,
            None => Err(FetchFailure::Transport(
                "node URL or links query is not configured".into(),
            )),
        };

        self.apply(view, generation, outcome);
    }

    async fn dispatch(&self, url: String) -> FetchOutcome {
        let fetcher = Arc::clone(&self.fetcher);
        match tokio::spawn(async move { fetcher.fetch(&url).await }).await {
            Ok(outcome) => outcome,
            Err(err) => Err(FetchFailure::Transport(format!(
                "link fetch task aborted: {err}"
            ))),
        }
    }

    fn apply(&self, view: &SharedView, generation: u64, outcome: FetchOutcome) {
        let mut state = lock_view(view);
        if !state.is_current(generation) {
            self.logger.debug(
                "STALE",
                format!("cycle {generation} superseded; response discarded"),
            );
            return;
        }
        match outcome {
            Ok(payload) => {
                let entries = links::render(&payload);
                self.logger
                    .info("LINKS", format!("cycle {generation} rendered {} links", entries.len()));
                for entry in entries {
                    state.links.append(entry.to_markup());
                }
            }
            Err(reason) => {
                self.logger
                    .warn("LINKS", format!("cycle {generation} failed: {reason}"));
                state.warning.reveal();
            }
        }
    }
}

/// Host-facing handle of a mounted global panel; `refresh` is the
/// activation of its refresh affordance.
#[derive(Clone)]
pub struct RefreshHandle {
    view: SharedView,
    configuration: Configuration,
    controller: Arc<RefreshController>,
}

impl RefreshHandle {
    pub fn new(
        view: SharedView,
        configuration: Configuration,
        controller: Arc<RefreshController>,
    ) -> Self {
        Self {
            view,
            configuration,
            controller,
        }
    }

    pub async fn refresh(&self) {
        self.controller
            .refresh(&self.view, &self.configuration)
            .await;
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }
}
