/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::space
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Authenticated Confluence client used to validate spaces,
    search them for the subscription editor, check the node
    status and collect the last activity of a space.

  Security / Safety Notes:
    The password only travels in the login form body. The
    session lives in the client's cookie store and redirects
    are never followed implicitly.

  Dependencies:
    reqwest for HTTP, regex for the activity stream, scraper
    for the version meta tag, unicode-normalization for the
    space search, base64 for inlining avatars, urlencoding
    for path segments.

  Operational Scope:
    Feeds `subscription.data.space` consumed by the detail
    renderers, and backs the `spaces` / `status` commands.

  Revision History:
    2025-02-11 COD  Implemented space client.
    2025-03-04 COD  Shared cookie jar, latest release lookup,
                    accent-insensitive search.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Validation failures name the offending parameter
    - Activity scraping never fails a validation
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LOCATION};
use reqwest::{redirect, StatusCode, Url};
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use urlencoding::encode;

use crate::error::{PanelError, Result};
use crate::logger::Logger;
use crate::model::{
    Parameters, SimpleUser, Space, SpaceActivity, PARAMETER_PASSWORD, PARAMETER_SPACE,
    PARAMETER_URL, PARAMETER_USER,
};

const ACTIVITY_PATTERN: &str = r#"(?s)logo"\s*src="([^"]+)".*data-username="([^"]+)"[^>]+>([^<]+)<.*href="([^"]+)"[^>]*>([^<]+)<.*update-item-date">([^<]+)<"#;
const VERSION_SELECTOR: &str = r#"meta[name="ajs-version-number"]"#;
const JIRA_URL: &str = "https://jira.atlassian.com";
const JIRA_PROJECT: &str = "CONF";
const PAGE_SIZE: usize = 100;
const MAX_MATCHES: usize = 10;

#[derive(Debug, Deserialize)]
struct RawSpace {
    key: String,
    #[serde(default)]
    name: String,
}

impl From<RawSpace> for Space {
    fn from(raw: RawSpace) -> Self {
        Space {
            id: raw.key,
            name: raw.name,
            activity: None,
        }
    }
}

/// Release entry of a Jira project.
#[derive(Debug, Deserialize)]
struct JiraVersion {
    name: String,
    #[serde(default)]
    released: bool,
    #[serde(default, rename = "releaseDate")]
    release_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SpacePage {
    #[serde(default)]
    results: Vec<RawSpace>,
    #[serde(default, rename = "_links")]
    links: Map<String, Value>,
}

pub struct SpaceClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    activity_pattern: Regex,
    logger: Arc<Logger>,
}

impl SpaceClient {
    /// Build a client from node parameters (`url`, `user`, `password`).
    /// The session opened by [`SpaceClient::authenticate`] lands in `jar`.
    pub fn new(
        parameters: &Parameters,
        timeout: Option<u64>,
        jar: Arc<Jar>,
        logger: Arc<Logger>,
    ) -> Result<Self> {
        let base_url = parameters
            .get(PARAMETER_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PanelError::Config(format!("`{PARAMETER_URL}` is not set")))?;

        let mut headers = HeaderMap::new();
        headers.insert("x-atlassian-token", HeaderValue::from_static("nocheck"));
        let mut builder = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .cookie_provider(jar)
            .default_headers(headers)
            .user_agent("KM-Confluence/0.3 (linux)");
        if let Some(seconds) = timeout {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder
            .build()
            .map_err(|err| PanelError::Network(format!("Failed to build HTTP client: {err}")))?;
        let activity_pattern = Regex::new(ACTIVITY_PATTERN)
            .map_err(|err| PanelError::Runtime(format!("Invalid activity pattern: {err}")))?;

        Ok(Self {
            client,
            base_url,
            user: parameters.get(PARAMETER_USER).cloned().unwrap_or_default(),
            password: parameters
                .get(PARAMETER_PASSWORD)
                .map(|p| p.trim().to_string())
                .unwrap_or_default(),
            activity_pattern,
            logger,
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}{resource}", self.base_url)
    }

    /// Scheme and authority of the base URL, without its path.
    fn host_url(&self) -> String {
        Url::parse(&self.base_url)
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_else(|_| self.base_url.clone())
    }

    /// Body of a 200 response, `None` for any other status.
    async fn get_text(&self, resource: &str) -> Result<Option<String>> {
        let url = self.url(resource);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| PanelError::Network(format!("GET {url} failed: {err}")))?;
        if response.status() != StatusCode::OK {
            self.logger
                .debug("CONFLUENCE", format!("GET {url} answered {}", response.status()));
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|err| PanelError::Network(format!("Reading {url} failed: {err}")))?;
        Ok(Some(body))
    }

    /// Version advertised by the public password-recovery page.
    pub async fn version(&self) -> Result<Option<String>> {
        let page = self
            .get_text("/forgotuserpassword.action")
            .await?
            .unwrap_or_default();
        Ok(parse_version(&page))
    }

    /// Latest released Confluence version, as published on Atlassian's Jira.
    pub async fn last_version(&self) -> Result<Option<String>> {
        self.latest_release(JIRA_URL, JIRA_PROJECT).await
    }

    async fn latest_release(&self, jira_url: &str, project: &str) -> Result<Option<String>> {
        let url = format!("{jira_url}/rest/api/2/project/{}/versions", encode(project));
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| PanelError::Network(format!("GET {url} failed: {err}")))?;
        if response.status() != StatusCode::OK {
            self.logger
                .debug("JIRA", format!("GET {url} answered {}", response.status()));
            return Ok(None);
        }
        let versions: Vec<JiraVersion> = response.json().await.map_err(|err| {
            PanelError::Serialization(format!("Failed to decode {url}: {err}"))
        })?;
        Ok(latest_released(versions))
    }

    /// Open a session through the login form.
    pub async fn authenticate(&self) -> Result<()> {
        let url = self.url("/dologin.action");
        let form = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| PanelError::Network(format!("GET {url} failed: {err}")))?;
        if !form.status().is_success() {
            self.logger
                .warn("LOGIN", format!("login form answered {}", form.status()));
            return Err(PanelError::validation(PARAMETER_URL, "confluence-login"));
        }
        let response = self
            .client
            .post(&url)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .form(&[
                ("os_username", self.user.as_str()),
                ("os_password", self.password.as_str()),
                ("os_destination", ""),
                ("atl_token", ""),
                ("login", "Connexion"),
            ])
            .send()
            .await
            .map_err(|err| PanelError::Network(format!("POST {url} failed: {err}")))?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok());
        if accepts_login(response.status(), location) {
            self.logger
                .debug("LOGIN", format!("session opened for `{}`", self.user));
            Ok(())
        } else {
            self.logger
                .warn("LOGIN", format!("login rejected for `{}`", self.user));
            Err(PanelError::validation(PARAMETER_URL, "confluence-login"))
        }
    }

    /// Node is reachable, credentials are valid and grant admin access.
    pub async fn check_status(&self) -> Result<()> {
        if self.version().await?.is_none() {
            return Err(PanelError::validation(PARAMETER_URL, "confluence-connection"));
        }
        self.authenticate().await?;
        if self.get_text("/plugins/servlet/upm").await?.is_none() {
            return Err(PanelError::validation(PARAMETER_URL, "confluence-admin"));
        }
        Ok(())
    }

    /// Up to ten global spaces whose key or name contains `criteria`.
    pub async fn find_spaces(&self, criteria: &str) -> Result<Vec<Space>> {
        self.authenticate().await?;
        let needle = normalize(criteria);
        let mut result: Vec<Space> = Vec::new();
        let mut start = 0;
        loop {
            let resource = format!("/rest/api/space?type=global&limit={PAGE_SIZE}&start={start}");
            let page: SpacePage = match self.get_text(&resource).await? {
                Some(body) => serde_json::from_str(&body).map_err(|err| {
                    PanelError::Serialization(format!("Failed to decode space page: {err}"))
                })?,
                None => SpacePage::default(),
            };
            let has_next = page.links.contains_key("next");
            result.extend(
                page.results
                    .into_iter()
                    .map(Space::from)
                    .filter(|space| matches_criteria(space, &needle)),
            );
            if !has_next || result.len() >= MAX_MATCHES {
                break;
            }
            start += PAGE_SIZE;
        }
        result.truncate(MAX_MATCHES);
        Ok(result)
    }

    async fn space_json(&self, space: &str) -> Result<String> {
        self.get_text(&format!("/rest/api/space/{}", encode(space)))
            .await?
            .ok_or_else(|| PanelError::validation(PARAMETER_SPACE, "confluence-space"))
    }

    /// Check the space exists.
    pub async fn link(&self, space: &str) -> Result<()> {
        self.authenticate().await?;
        self.space_json(space).await.map(|_| ())
    }

    /// Space details with its last activity, when one can be scraped.
    pub async fn validate_space(&self, space: &str) -> Result<Space> {
        self.authenticate().await?;
        let body = self.space_json(space).await?;
        let raw: RawSpace = serde_json::from_str(&body).map_err(|err| {
            PanelError::Serialization(format!("Failed to decode space `{space}`: {err}"))
        })?;
        let mut result = Space::from(raw);

        let history = self
            .get_text(&format!(
                "/plugins/recently-updated/changes.action?theme=social&pageSize=1&spaceKeys={}",
                encode(space)
            ))
            .await?
            .unwrap_or_default();
        if let Some((mut activity, avatar_url)) =
            parse_activity(&self.activity_pattern, &history, &self.host_url())
        {
            activity.author_avatar = self.fetch_avatar(&avatar_url).await;
            result.activity = Some(activity);
        }
        Ok(result)
    }

    /// PNG avatar as a data URL; `None` for the default avatar or on failure.
    async fn fetch_avatar(&self, url: &str) -> Option<String> {
        if url.ends_with("/default.png") {
            return None;
        }
        let response = match self.client.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => response,
            Ok(response) => {
                self.logger
                    .debug("AVATAR", format!("{url} answered {}", response.status()));
                return None;
            }
            Err(err) => {
                self.logger.debug("AVATAR", format!("{url} failed: {err}"));
                return None;
            }
        };
        let bytes = response.bytes().await.ok()?;
        Some(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)))
    }
}

/// Login succeeded when redirected anywhere but back to the login form.
fn accepts_login(status: StatusCode, location: Option<&str>) -> bool {
    status.is_redirection()
        && location.is_some_and(|location| !location.ends_with("dologin.action"))
}

fn parse_version(page: &str) -> Option<String> {
    let selector = Selector::parse(VERSION_SELECTOR).ok()?;
    Html::parse_document(page)
        .select(&selector)
        .find_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(str::to_string)
}

/// Most recently released version; undated releases are ignored.
fn latest_released(versions: Vec<JiraVersion>) -> Option<String> {
    versions
        .into_iter()
        .filter(|version| version.released && version.release_date.is_some())
        .max_by(|a, b| a.release_date.cmp(&b.release_date))
        .map(|version| version.name)
}

/// Trimmed, lowercased and stripped of accents (`Équipe` matches `equipe`).
fn normalize(value: &str) -> String {
    value
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn matches_criteria(space: &Space, needle: &str) -> bool {
    normalize(&space.name).contains(needle) || normalize(&space.id).contains(needle)
}

/// Extract the last activity and the author avatar URL from the
/// recently-updated HTML stream.
fn parse_activity(pattern: &Regex, html: &str, host_url: &str) -> Option<(SpaceActivity, String)> {
    let captures = pattern.captures(html)?;
    let group = |index: usize| captures.get(index).map(|m| m.as_str().trim().to_string());
    let avatar_url = format!("{host_url}{}", group(1)?);
    let activity = SpaceActivity {
        moment: group(6),
        author: group(2).map(|login| SimpleUser {
            id: login,
            first_name: group(3),
            last_name: None,
        }),
        author_avatar: None,
        page: group(5),
        page_url: group(4).map(|path| format!("{host_url}{path}")),
    };
    Some((activity, avatar_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::{http_response, serve_once, serve_script, ScriptedServer};
    use crate::fetcher::{HttpLinkFetcher, LinkFetcher};

    const CHANGES: &str = r#"
        <ul class="update-items">
          <li class="update-item">
            <img class="userLogo logo" src="/download/attachments/1/user-avatar" alt="">
            <div class="update-item-content">
              <a class="url fn" data-username="jdoe" href="/display/~jdoe">John Doe</a>
              <a class="update-item-title" href="/display/SPACE/Release+Notes">Release Notes</a>
              <span class="update-item-date">2 hours ago</span>
            </div>
          </li>
        </ul>"#;

    fn client_with_jar(url: &str, jar: Arc<Jar>) -> SpaceClient {
        let mut parameters = Parameters::new();
        parameters.insert(PARAMETER_URL.into(), url.into());
        parameters.insert(PARAMETER_USER.into(), "bot".into());
        parameters.insert(PARAMETER_PASSWORD.into(), " secret ".into());
        SpaceClient::new(&parameters, Some(5), jar, Arc::new(Logger::stderr_only())).unwrap()
    }

    fn client(url: &str) -> SpaceClient {
        client_with_jar(url, Arc::new(Jar::default()))
    }

    fn ok(content_type: &str, body: &str) -> String {
        http_response("200 OK", &[("Content-Type", content_type)], body)
    }

    fn json(body: &str) -> String {
        ok("application/json", body)
    }

    fn not_found() -> String {
        http_response("404 Not Found", &[], "")
    }

    /// Login form followed by an accepted login.
    fn login() -> Vec<String> {
        vec![
            ok("text/html", "<form></form>"),
            http_response(
                "302 Found",
                &[
                    ("Location", "/index.action"),
                    ("Set-Cookie", "JSESSIONID=s3ss10n; Path=/"),
                ],
                "",
            ),
        ]
    }

    fn script(responses: Vec<String>) -> Vec<String> {
        login().into_iter().chain(responses).collect()
    }

    fn space_page(spaces: &[(&str, &str)], next: bool) -> String {
        let results: Vec<Value> = spaces
            .iter()
            .map(|(key, name)| serde_json::json!({"key": key, "name": name}))
            .collect();
        let links = if next {
            serde_json::json!({"next": "/rest/api/space?next=true"})
        } else {
            serde_json::json!({})
        };
        json(&serde_json::json!({"results": results, "_links": links}).to_string())
    }

    fn rejected_code(result: Result<impl std::fmt::Debug>) -> String {
        match result {
            Err(PanelError::Validation { code, .. }) => code,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    async fn served(responses: Vec<String>) -> (ScriptedServer, SpaceClient) {
        let server = serve_script(responses).await;
        let client = client(&server.base);
        (server, client)
    }

    #[test]
    fn activity_is_scraped_against_host_url() {
        let pattern = Regex::new(ACTIVITY_PATTERN).unwrap();
        let (activity, avatar) =
            parse_activity(&pattern, CHANGES, "https://wiki.example").unwrap();
        assert_eq!(avatar, "https://wiki.example/download/attachments/1/user-avatar");
        assert_eq!(activity.moment.as_deref(), Some("2 hours ago"));
        assert_eq!(activity.page.as_deref(), Some("Release Notes"));
        assert_eq!(
            activity.page_url.as_deref(),
            Some("https://wiki.example/display/SPACE/Release+Notes")
        );
        let author = activity.author.unwrap();
        assert_eq!(author.id, "jdoe");
        assert_eq!(author.full_name(), "John Doe");
    }

    #[test]
    fn empty_stream_has_no_activity() {
        let pattern = Regex::new(ACTIVITY_PATTERN).unwrap();
        assert!(parse_activity(&pattern, "", "https://wiki.example").is_none());
        assert!(parse_activity(&pattern, "<ul></ul>", "https://wiki.example").is_none());
    }

    #[test]
    fn host_url_drops_context_path() {
        let client = client("https://wiki.example/confluence/");
        assert_eq!(client.base_url, "https://wiki.example/confluence");
        assert_eq!(client.host_url(), "https://wiki.example");
        assert_eq!(client.password, "secret");
    }

    #[test]
    fn version_is_read_from_meta_tag() {
        let page = r#"<meta name="ajs-version-number" content="5.7.5"><meta name="x">"#;
        assert_eq!(parse_version(page).as_deref(), Some("5.7.5"));
        assert_eq!(parse_version("<html></html>"), None);
        assert_eq!(
            parse_version(r#"<meta name="ajs-version-number" content="">"#),
            None
        );
    }

    #[test]
    fn version_meta_tolerates_attribute_order_and_spacing() {
        assert_eq!(
            parse_version(r#"<meta content="7.19.2" name="ajs-version-number">"#).as_deref(),
            Some("7.19.2")
        );
        assert_eq!(
            parse_version(r#"<meta  name="ajs-version-number"   content=" 7.19.2 " >"#).as_deref(),
            Some("7.19.2")
        );
    }

    #[test]
    fn latest_release_is_the_most_recent_released_version() {
        let versions: Vec<JiraVersion> = serde_json::from_value(serde_json::json!([
            {"name": "8.5.0", "released": true, "releaseDate": "2023-07-10"},
            {"name": "9.0.0", "released": false, "releaseDate": "2024-10-01"},
            {"name": "8.9.1", "released": true, "releaseDate": "2024-04-02"},
            {"name": "8.9.2", "released": true}
        ]))
        .unwrap();
        assert_eq!(latest_released(versions).as_deref(), Some("8.9.1"));
        assert_eq!(latest_released(Vec::new()), None);
    }

    #[test]
    fn login_requires_redirect_away_from_form() {
        assert!(accepts_login(StatusCode::FOUND, Some("/")));
        assert!(!accepts_login(StatusCode::FOUND, Some("/dologin.action")));
        assert!(!accepts_login(StatusCode::FOUND, None));
        assert!(!accepts_login(StatusCode::OK, Some("/")));
    }

    #[test]
    fn criteria_match_key_or_name_ignoring_case() {
        let space = Space {
            id: "ENG".into(),
            name: "Engineering Handbook".into(),
            activity: None,
        };
        assert!(matches_criteria(&space, &normalize("eng")));
        assert!(matches_criteria(&space, &normalize(" HANDBOOK ")));
        assert!(!matches_criteria(&space, &normalize("sales")));
    }

    #[test]
    fn criteria_match_ignoring_accents() {
        let space = Space {
            id: "EQP".into(),
            name: "Équipe Produit".into(),
            activity: None,
        };
        assert!(matches_criteria(&space, &normalize("equipe")));
        assert!(matches_criteria(&space, &normalize("ÉQUIPE PRODUIT")));
        assert_eq!(normalize(" Café "), "cafe");
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let result = SpaceClient::new(
            &Parameters::new(),
            None,
            Arc::new(Jar::default()),
            Arc::new(Logger::stderr_only()),
        );
        assert!(matches!(result, Err(PanelError::Config(_))));
    }

    #[tokio::test]
    async fn version_over_http() {
        let base = serve_once(ok(
            "text/html",
            r#"<meta name="ajs-version-number" content="7.19.2">"#,
        ))
        .await;
        assert_eq!(client(&base).version().await.unwrap().as_deref(), Some("7.19.2"));
    }

    #[tokio::test]
    async fn unreachable_version_page_means_no_version() {
        let base = serve_once(not_found()).await;
        assert_eq!(client(&base).version().await.unwrap(), None);
    }

    #[tokio::test]
    async fn latest_release_over_http() {
        let (server, client) = served(vec![json(
            r#"[{"name":"8.5.0","released":true,"releaseDate":"2023-07-10"}]"#,
        )])
        .await;
        let latest = client.latest_release(&server.base, "CONF").await.unwrap();
        assert_eq!(latest.as_deref(), Some("8.5.0"));
        assert!(server
            .request(0)
            .starts_with("GET /rest/api/2/project/CONF/versions "));
    }

    #[tokio::test]
    async fn login_posts_form_with_atlassian_token() {
        let (server, client) = served(login()).await;
        client.authenticate().await.unwrap();

        assert!(server.request(0).starts_with("GET /dologin.action "));
        let post = server.request(1);
        assert!(post.starts_with("POST /dologin.action "));
        assert!(post.contains("os_username=bot"));
        assert!(post.contains("os_password=secret"));
        assert!(post.to_ascii_lowercase().contains("x-atlassian-token: nocheck"));
    }

    #[tokio::test]
    async fn login_bounced_back_to_form_is_rejected() {
        let (_server, client) = served(vec![
            ok("text/html", "<form></form>"),
            http_response("302 Found", &[("Location", "/dologin.action")], ""),
        ])
        .await;
        assert_eq!(rejected_code(client.authenticate().await), "confluence-login");
    }

    #[tokio::test]
    async fn unavailable_login_form_aborts_login() {
        let (server, client) =
            served(vec![http_response("500 Internal Server Error", &[], "")]).await;
        assert_eq!(rejected_code(client.authenticate().await), "confluence-login");
        assert_eq!(server.served(), 1);
    }

    #[tokio::test]
    async fn login_session_is_shared_with_link_fetcher() {
        let jar = Arc::new(Jar::default());
        let server = serve_script(script(vec![json(r#"{"spaces":[]}"#)])).await;
        client_with_jar(&server.base, Arc::clone(&jar))
            .authenticate()
            .await
            .unwrap();

        let fetcher = HttpLinkFetcher::new(Some(5), jar).unwrap();
        let outcome = fetcher.fetch(&format!("{}/rest/links", server.base)).await;
        assert!(outcome.is_ok());
        assert!(server
            .request(2)
            .to_ascii_lowercase()
            .contains("cookie: jsessionid=s3ss10n"));
    }

    #[tokio::test]
    async fn find_spaces_follows_next_links() {
        let (server, client) = served(script(vec![
            space_page(&[("ENG", "Engineering"), ("HR", "People")], true),
            space_page(&[("OPS", "Engineering Ops")], false),
        ]))
        .await;
        let spaces = client.find_spaces("engineering").await.unwrap();
        let keys: Vec<&str> = spaces.iter().map(|space| space.id.as_str()).collect();
        assert_eq!(keys, ["ENG", "OPS"]);
        assert!(server.request(2).contains("start=0"));
        assert!(server.request(3).contains("start=100"));
    }

    #[tokio::test]
    async fn find_spaces_stops_at_ten_matches() {
        let many: Vec<(String, String)> = (0..12)
            .map(|index| (format!("DOC{index}"), format!("Docs {index}")))
            .collect();
        let page: Vec<(&str, &str)> = many
            .iter()
            .map(|(key, name)| (key.as_str(), name.as_str()))
            .collect();
        let (server, client) = served(script(vec![space_page(&page, true)])).await;
        let spaces = client.find_spaces("docs").await.unwrap();
        assert_eq!(spaces.len(), 10);
        assert_eq!(spaces[9].id, "DOC9");
        assert_eq!(server.served(), 3);
    }

    #[tokio::test]
    async fn unreadable_space_page_counts_as_empty() {
        let (_server, client) =
            served(script(vec![http_response("500 Internal Server Error", &[], "")])).await;
        assert!(client.find_spaces("eng").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_space_page_is_serialization_error() {
        let (_server, client) = served(script(vec![json("{not json")])).await;
        assert!(matches!(
            client.find_spaces("eng").await,
            Err(PanelError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn link_rejects_unknown_space() {
        let (server, client) = served(script(vec![not_found()])).await;
        assert_eq!(rejected_code(client.link("Team A/B").await), "confluence-space");
        assert!(server.request(2).starts_with("GET /rest/api/space/Team%20A%2FB "));
    }

    #[tokio::test]
    async fn validate_space_rejects_unknown_space() {
        let (_server, client) = served(script(vec![not_found()])).await;
        assert_eq!(
            rejected_code(client.validate_space("NOPE").await),
            "confluence-space"
        );
    }

    #[tokio::test]
    async fn validate_space_inlines_author_avatar() {
        let (server, client) = served(script(vec![
            json(r#"{"key":"ENG","name":"Engineering"}"#),
            ok("text/html", CHANGES),
            ok("image/png", "PNG"),
        ]))
        .await;
        let space = client.validate_space("ENG").await.unwrap();
        assert_eq!(space.id, "ENG");
        assert_eq!(space.name, "Engineering");

        let activity = space.activity.unwrap();
        assert_eq!(activity.author_avatar.as_deref(), Some("data:image/png;base64,UE5H"));
        assert_eq!(
            activity.page_url,
            Some(format!("{}/display/SPACE/Release+Notes", server.base))
        );
        assert!(server.request(3).contains("spaceKeys=ENG"));
        assert!(server
            .request(4)
            .starts_with("GET /download/attachments/1/user-avatar "));
    }

    #[tokio::test]
    async fn validate_space_skips_default_avatar() {
        let changes = CHANGES.replace(
            "/download/attachments/1/user-avatar",
            "/images/icons/profilepics/default.png",
        );
        let (server, client) = served(script(vec![
            json(r#"{"key":"ENG","name":"Engineering"}"#),
            ok("text/html", &changes),
        ]))
        .await;
        let activity = client.validate_space("ENG").await.unwrap().activity.unwrap();
        assert_eq!(activity.author_avatar, None);
        assert_eq!(activity.page.as_deref(), Some("Release Notes"));
        assert_eq!(server.served(), 4);
    }

    #[tokio::test]
    async fn validate_space_rejects_malformed_space_json() {
        let (_server, client) = served(script(vec![json("[]")])).await;
        assert!(matches!(
            client.validate_space("ENG").await,
            Err(PanelError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn status_requires_version_page() {
        let (_server, client) = served(vec![ok("text/html", "<html></html>")]).await;
        assert_eq!(rejected_code(client.check_status().await), "confluence-connection");
    }

    #[tokio::test]
    async fn status_requires_admin_access() {
        let version = ok("text/html", r#"<meta name="ajs-version-number" content="7.19.2">"#);
        let mut responses = vec![version];
        responses.extend(script(vec![http_response("403 Forbidden", &[], "")]));
        let (server, client) = served(responses).await;
        assert_eq!(rejected_code(client.check_status().await), "confluence-admin");
        assert!(server.request(3).starts_with("GET /plugins/servlet/upm "));
    }

    #[tokio::test]
    async fn status_up_with_admin_access() {
        let version = ok("text/html", r#"<meta name="ajs-version-number" content="7.19.2">"#);
        let mut responses = vec![version];
        responses.extend(script(vec![ok("text/html", "<html>upm</html>")]));
        let (_server, client) = served(responses).await;
        assert!(client.check_status().await.is_ok());
    }
}
