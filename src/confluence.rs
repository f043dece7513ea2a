/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::confluence
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Confluence service descriptor: space selector, key and
    feature rendering, activity badge and the global links
    panel.

  Security / Safety Notes:
    Space keys are URL-escaped in paths; remote names, titles
    and URLs are HTML-escaped.

  Dependencies:
    urlencoding for path segments, async-trait for mounting.

  Operational Scope:
    Registered under `service:km:confluence` in the service
    registry and mounted by the host.

  Revision History:
    2025-02-11 COD  Implemented Confluence descriptor.
    2025-03-04 COD  Tooltip parts escaped for HTML tooltips.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Delegation to base renderers where nothing is added
    - Idempotent global panel mount
============================================================*/

use std::sync::Arc;

use async_trait::async_trait;
use urlencoding::encode;

use crate::markup::escape_html;
use crate::model::{
    Configuration, SimpleUser, SpaceActivity, Subscription, PARAMETER_HELP, PARAMETER_SPACE,
    PARAMETER_URL, SERVICE_ID,
};
use crate::refresh::{RefreshController, RefreshHandle};
use crate::service::{ServiceDescriptor, SubscriptionEditor};
use crate::view::{lock_view, Dashboard, SharedView, ViewContext};

/// Dashboard identifier of the global links panel.
pub const PANEL_ID: &str = "confluence-links";

const SUGGEST_ENDPOINT: &str = "service/km/confluence/";
const NAV_ICON: &str = r#"<img class="nav-icon visible-retracted" src="main/plugin/km/confluence/img/confluence.png" alt="confluence" title="" data-toggle="tooltip" data-container="body" data-original-title="Confluence">"#;
const WARNING_TEXT: &str = "You are not logged in to Confluence: links cannot be resolved. ";

pub struct ConfluenceDescriptor {
    controller: Arc<RefreshController>,
}

impl ConfluenceDescriptor {
    pub fn new(controller: Arc<RefreshController>) -> Self {
        Self { controller }
    }

    /// Fresh, unmounted surface for the global panel.
    pub fn new_view() -> SharedView {
        ViewContext::new(PANEL_ID, WARNING_TEXT).shared()
    }

    fn home_url(subscription: &Subscription) -> String {
        format!(
            "{}/display/{}",
            subscription.parameter(PARAMETER_URL).unwrap_or_default(),
            encode(subscription.parameter(PARAMETER_SPACE).unwrap_or_default())
        )
    }

    /// Badge linking to the last updated page. The tooltip is rendered as
    /// HTML from the decoded `title`, so its remote parts are escaped twice.
    fn activity_badge(activity: &SpaceActivity) -> String {
        let author = activity.author.as_ref();
        let tooltip: Vec<String> = [
            activity.page.clone(),
            author.map(SimpleUser::full_name),
            activity.moment.clone(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .map(|part| escape_html(&escape_html(&part)))
        .collect();

        let initials = author
            .map(SimpleUser::initials)
            .filter(|initials| !initials.is_empty())
            .unwrap_or_else(|| "?".into());
        let badge = match activity.author_avatar.as_deref().filter(|src| !src.is_empty()) {
            Some(src) => format!(
                r#"<img class="avatar" src="{}" alt="{}">"#,
                escape_html(src),
                escape_html(&initials)
            ),
            None => format!(
                r#"<span class="avatar avatar-initials">{}</span>"#,
                escape_html(&initials)
            ),
        };
        let href = activity
            .page_url
            .as_deref()
            .map(|url| format!(r#" href="{}""#, escape_html(url)))
            .unwrap_or_default();
        format!(
            r#"<a{href} target="_blank" class="feature" data-toggle="tooltip" data-html="true" title="{}">{badge}</a>"#,
            tooltip.join("<br>")
        )
    }
}

#[async_trait]
impl ServiceDescriptor for ConfluenceDescriptor {
    fn id(&self) -> &str {
        SERVICE_ID
    }

    fn configure_subscription_parameters(
        &self,
        editor: &mut SubscriptionEditor,
        configuration: &Configuration,
    ) {
        self.base()
            .register_typed_select(editor, configuration, PARAMETER_SPACE, SUGGEST_ENDPOINT);
    }

    fn render_key(&self, subscription: &Subscription) -> String {
        self.base().render_key(subscription, Some(PARAMETER_SPACE))
    }

    fn render_details_key(&self, subscription: &Subscription) -> String {
        let name = subscription
            .space()
            .map(|space| escape_html(&space.name));
        self.base()
            .generate_carousel(&[Some(self.render_key(subscription)), name])
    }

    fn render_features(&self, subscription: &Subscription) -> String {
        let mut result = self.base().render_service_link(
            "home",
            &Self::home_url(subscription),
            PARAMETER_SPACE,
            None,
            r#" target="_blank""#,
        );
        result.push_str(
            &self
                .base()
                .render_service_help_link(&subscription.parameters, PARAMETER_HELP),
        );
        result
    }

    fn render_details_features(&self, subscription: &Subscription) -> String {
        subscription
            .space()
            .and_then(|space| space.activity.as_ref())
            .map(Self::activity_badge)
            .unwrap_or_default()
    }

    async fn render_global(
        &self,
        dashboard: &mut Dashboard,
        view: SharedView,
        configuration: &Configuration,
    ) -> Option<RefreshHandle> {
        dashboard.mount(PANEL_ID, NAV_ICON.to_string(), Arc::clone(&view));
        {
            let mut state = lock_view(&view);
            state.prepend_header(self.base().to_icon(SERVICE_ID, "x64"));
            state.set_login_href(configuration.node.parameters.get(PARAMETER_URL).cloned());
            state.bind_refresh();
        }

        let handle = RefreshHandle::new(view, configuration.clone(), Arc::clone(&self.controller));
        handle.refresh().await;
        Some(handle)
    }
}
