/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::service
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Define the contract every service descriptor honours and
    the shared base renderers descriptors delegate to.

  Security / Safety Notes:
    Base renderers escape every parameter value they embed.

  Dependencies:
    async-trait for the mount operation, serde for exposing
    editor registrations to the host.

  Operational Scope:
    Implemented by the Confluence descriptor and by generic
    descriptors resolved from the registry.

  Revision History:
    2025-02-11 COD  Authored descriptor contract.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit delegation to base defaults
    - Rendering never fails on missing optional data
============================================================*/

use async_trait::async_trait;
use serde::Serialize;

use crate::markup::escape_html;
use crate::model::{Configuration, Parameters, Subscription};
use crate::refresh::RefreshHandle;
use crate::view::{Dashboard, SharedView};

/// A parameter input backed by a remote suggestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedSelect {
    pub parameter: String,
    /// Endpoint queried as `<endpoint><criteria>`.
    pub endpoint: String,
}

/// Inputs registered for the subscription editor.
#[derive(Debug, Default, Serialize)]
pub struct SubscriptionEditor {
    pub selects: Vec<TypedSelect>,
}

impl SubscriptionEditor {
    pub fn select(&self, parameter: &str) -> Option<&TypedSelect> {
        self.selects.iter().find(|s| s.parameter == parameter)
    }
}

/// Shared default renderers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseService;

const BASE: BaseService = BaseService;

impl BaseService {
    /// Register a select for `parameter`, suggestions served under
    /// `<endpoint><node>/`. Re-registering a parameter replaces it.
    pub fn register_typed_select(
        &self,
        editor: &mut SubscriptionEditor,
        configuration: &Configuration,
        parameter: &str,
        endpoint: &str,
    ) {
        editor.selects.retain(|s| s.parameter != parameter);
        editor.selects.push(TypedSelect {
            parameter: parameter.to_string(),
            endpoint: format!("{endpoint}{}/", configuration.node.id),
        });
    }

    /// Value of `parameter`, falling back to the node name then id.
    pub fn render_key(&self, subscription: &Subscription, parameter: Option<&str>) -> String {
        let value = parameter
            .and_then(|name| subscription.parameter(name))
            .or(subscription.node.name.as_deref())
            .unwrap_or(subscription.node.id.as_str());
        escape_html(value)
    }

    pub fn render_service_link(
        &self,
        icon: &str,
        href: &str,
        tooltip: &str,
        text: Option<&str>,
        attributes: &str,
    ) -> String {
        format!(
            r#"<a href="{}" rel="noopener"{attributes} data-toggle="tooltip" title="{}"><i class="fa fa-{icon}"></i>{}</a>"#,
            escape_html(href),
            escape_html(tooltip),
            text.map(escape_html).unwrap_or_default()
        )
    }

    /// Help link when `help_key` is set, empty otherwise.
    pub fn render_service_help_link(&self, parameters: &Parameters, help_key: &str) -> String {
        match parameters.get(help_key).filter(|href| !href.is_empty()) {
            Some(href) => self.render_service_link(
                "question-circle-o",
                href,
                "service:help",
                None,
                r#" target="_blank""#,
            ),
            None => String::new(),
        }
    }

    /// Icon of a service: `service:km:confluence` maps to
    /// `main/plugin/km/confluence/img/confluence-<size>.png`.
    pub fn to_icon(&self, service_id: &str, size: &str) -> String {
        let path: Vec<&str> = service_id
            .split(':')
            .skip_while(|segment| *segment == "service")
            .collect();
        let leaf = path.last().copied().unwrap_or(service_id);
        format!(
            r#"<img src="main/plugin/{}/img/{leaf}-{size}.png" class="tool" alt="{leaf}" title="{}">"#,
            path.join("/"),
            escape_html(service_id)
        )
    }

    /// Carousel over the present items; a single item is returned bare.
    pub fn generate_carousel(&self, items: &[Option<String>]) -> String {
        let present: Vec<&String> = items
            .iter()
            .flatten()
            .filter(|item| !item.is_empty())
            .collect();
        match present.as_slice() {
            [] => String::new(),
            [single] => (*single).clone(),
            many => {
                let slides: String = many
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let active = if index == 0 { " active" } else { "" };
                        format!(r#"<div class="item{active}">{item}</div>"#)
                    })
                    .collect();
                format!(r#"<div class="carousel" data-ride="carousel"><div class="carousel-inner">{slides}</div></div>"#)
            }
        }
    }
}

/// Contract between the host and one service plugin.
///
/// Every method has a default that lands on [`BaseService`]; a plugin
/// overrides what it renders differently and calls `self.base()` for the
/// rest.
#[async_trait]
pub trait ServiceDescriptor: Send + Sync {
    /// Namespace of the service, e.g. `service:km:confluence`.
    fn id(&self) -> &str;

    fn base(&self) -> &BaseService {
        &BASE
    }

    fn configure_subscription_parameters(
        &self,
        _editor: &mut SubscriptionEditor,
        _configuration: &Configuration,
    ) {
    }

    fn render_key(&self, subscription: &Subscription) -> String {
        self.base().render_key(subscription, None)
    }

    fn render_details_key(&self, subscription: &Subscription) -> String {
        self.render_key(subscription)
    }

    fn render_features(&self, _subscription: &Subscription) -> String {
        String::new()
    }

    fn render_details_features(&self, _subscription: &Subscription) -> String {
        String::new()
    }

    /// Mount the global panel into `dashboard`. Services without one
    /// return `None`.
    async fn render_global(
        &self,
        _dashboard: &mut Dashboard,
        _view: SharedView,
        _configuration: &Configuration,
    ) -> Option<RefreshHandle> {
        None
    }
}
