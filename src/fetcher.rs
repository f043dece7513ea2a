/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::fetcher
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Issue the single GET behind a refresh cycle and classify
    the response as a payload or a fetch failure.

  Security / Safety Notes:
    No credentials are sent beyond the ambient session cookies
    held by the client. Redirects are never followed, so a
    bounce to the login page cannot pass as a payload.

  Dependencies:
    reqwest for HTTP, async-trait for the fetcher seam.

  Operational Scope:
    Invoked by the refresh controller once per cycle.

  Revision History:
    2025-02-11 COD  Implemented link fetcher.
    2025-03-04 COD  Session cookies come from the shared jar.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Structured response parsing with explicit error paths
    - No retry; a failed cycle waits for a manual refresh
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, StatusCode};

use crate::error::{FetchFailure, PanelError, Result};
use crate::links::LinksPayload;

/// Outcome of one link fetch.
pub type FetchOutcome = std::result::Result<LinksPayload, FetchFailure>;

/// Seam between the refresh controller and the network.
#[async_trait]
pub trait LinkFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// reqwest-backed fetcher riding on the session held in `jar`.
#[derive(Clone)]
pub struct HttpLinkFetcher {
    client: reqwest::Client,
}

impl HttpLinkFetcher {
    /// `jar` is shared with the space client that opens the session.
    pub fn new(timeout: Option<u64>, jar: Arc<Jar>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .cookie_provider(jar)
            .user_agent("KM-Confluence/0.3 (linux)");
        if let Some(seconds) = timeout {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder
            .build()
            .map_err(|err| PanelError::Network(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkFetcher for HttpLinkFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| FetchFailure::Transport(format!("GET {url} failed: {err}")))?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            return Err(FetchFailure::Unauthenticated(format!(
                "{url} redirected to `{location}`"
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchFailure::Unauthenticated(format!(
                "{url} answered {status}"
            )));
        }
        if !status.is_success() {
            return Err(FetchFailure::Transport(format!("{url} answered {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        if let Some(content_type) = content_type {
            if !content_type.contains("json") {
                return Err(FetchFailure::MalformedResponse(format!(
                    "{url} served `{content_type}` instead of JSON"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| FetchFailure::Transport(format!("Reading {url} failed: {err}")))?;
        let payload: LinksPayload = serde_json::from_slice(&body).map_err(|err| {
            FetchFailure::MalformedResponse(format!("Failed to decode {url}: {err}"))
        })?;
        payload.validate()?;
        Ok(payload)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Local server answering one scripted response per connection, in order.
    pub(crate) struct ScriptedServer {
        pub base: String,
        pub requests: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedServer {
        pub(crate) fn request(&self, index: usize) -> String {
            self.requests.lock().unwrap()[index].clone()
        }

        pub(crate) fn served(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    pub(crate) async fn serve_script(responses: Vec<String>) -> ScriptedServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        ScriptedServer {
            base: format!("http://{addr}"),
            requests,
        }
    }

    /// Serve `response` to the first connection; return the base URL.
    pub(crate) async fn serve_once(response: String) -> String {
        serve_script(vec![response]).await.base
    }

    /// Head and body of one request; the body is drained so closing the
    /// socket does not reset the connection.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buffer = [0_u8; 4096];
        let mut request = Vec::new();
        let head_end = loop {
            if let Some(index) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break index + 4;
            }
            let read = socket.read(&mut buffer).await.unwrap();
            if read == 0 {
                break request.len();
            }
            request.extend_from_slice(&buffer[..read]);
        };
        let head = String::from_utf8_lossy(&request[..head_end]).into_owned();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while request.len() < head_end + length {
            let read = socket.read(&mut buffer).await.unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..read]);
        }
        String::from_utf8_lossy(&request).into_owned()
    }

    pub(crate) fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut response = format!("HTTP/1.1 {status}\r\n");
        for (name, value) in headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }
        response.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));
        response
    }

    async fn fetch_from(response: String) -> FetchOutcome {
        let base = serve_once(response).await;
        let fetcher = HttpLinkFetcher::new(Some(5), Arc::new(Jar::default())).unwrap();
        fetcher.fetch(&format!("{base}/rest/links")).await
    }

    #[tokio::test]
    async fn json_body_is_success() {
        let body = r#"{"spaces":[{"name":"Eng","link":[{},{"href":"https://wiki.example/spaces/ENG"}]}]}"#;
        let payload = fetch_from(http_response(
            "200 OK",
            &[("Content-Type", "application/json;charset=UTF-8")],
            body,
        ))
        .await
        .unwrap();
        assert_eq!(payload.spaces.len(), 1);
        assert_eq!(
            payload.spaces[0].canonical_href(),
            Some("https://wiki.example/spaces/ENG")
        );
    }

    #[tokio::test]
    async fn html_login_page_is_malformed() {
        let outcome = fetch_from(http_response(
            "200 OK",
            &[("Content-Type", "text/html")],
            "<html>login</html>",
        ))
        .await;
        assert!(matches!(outcome, Err(FetchFailure::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn unexpected_json_shape_is_malformed() {
        let outcome = fetch_from(http_response(
            "200 OK",
            &[("Content-Type", "application/json")],
            r#"{"results":[]}"#,
        ))
        .await;
        assert!(matches!(outcome, Err(FetchFailure::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn redirect_to_login_is_unauthenticated() {
        let outcome = fetch_from(http_response(
            "302 Found",
            &[("Location", "/login.action?os_destination=rest")],
            "",
        ))
        .await;
        assert!(matches!(outcome, Err(FetchFailure::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn server_error_is_transport_failure() {
        let outcome = fetch_from(http_response("500 Internal Server Error", &[], "")).await;
        assert!(matches!(outcome, Err(FetchFailure::Transport(_))));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let fetcher = HttpLinkFetcher::new(Some(5), Arc::new(Jar::default())).unwrap();
        let outcome = fetcher.fetch(&format!("http://{addr}/rest/links")).await;
        assert!(matches!(outcome, Err(FetchFailure::Transport(_))));
    }

    #[tokio::test]
    async fn session_cookies_from_the_jar_are_sent() {
        let server = serve_script(vec![http_response(
            "200 OK",
            &[("Content-Type", "application/json")],
            r#"{"spaces":[]}"#,
        )])
        .await;
        let jar = Arc::new(Jar::default());
        let url = reqwest::Url::parse(&server.base).unwrap();
        jar.add_cookie_str("JSESSIONID=abc123; Path=/", &url);

        let fetcher = HttpLinkFetcher::new(Some(5), jar).unwrap();
        let outcome = fetcher.fetch(&format!("{}/rest/links", server.base)).await;
        assert!(outcome.unwrap().spaces.is_empty());
        assert!(server
            .request(0)
            .to_ascii_lowercase()
            .contains("cookie: jsessionid=abc123"));
    }
}
