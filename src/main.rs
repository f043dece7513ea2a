/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point acting as a minimal host: loads the node and
    subscription configuration, resolves the Confluence
    descriptor and prints the markup it produces.

  Security / Safety Notes:
    Operates within user privileges and performs HTTPS
    requests against the configured Confluence node only.

  Dependencies:
    clap for CLI parsing, chrono for session stamps.

  Operational Scope:
    Used by operators to preview panels, search spaces and
    check node status without the full host framework.

  Revision History:
    2025-02-11 COD  Authored panel host runtime.
    2025-03-04 COD  Login before mounting links; log sealing no
                    longer masks the command outcome.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

mod config;
mod confluence;
mod error;
mod fetcher;
mod links;
mod logger;
mod markup;
mod model;
mod refresh;
mod registry;
mod service;
mod space;
mod view;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use reqwest::cookie::Jar;
use serde::Serialize;

use config::PanelConfig;
use confluence::ConfluenceDescriptor;
use error::{PanelError, Result};
use fetcher::HttpLinkFetcher;
use logger::Logger;
use model::{SubscriptionData, PARAMETER_SPACE};
use refresh::RefreshController;
use registry::ServiceRegistry;
use service::SubscriptionEditor;
use space::SpaceClient;
use view::{lock_view, Dashboard, Spinner};

/// Command-line arguments for KM-Confluence.
#[derive(Debug, Parser)]
#[command(
    name = "KM-Confluence",
    version,
    author = "Synavera Systems",
    about = "Confluence space panel for service subscriptions"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH", global = true)]
    log: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mount the global links panel and print the dashboard markup.
    Links {
        /// Manual refreshes to run after the initial one.
        #[arg(long, default_value_t = 0)]
        refreshes: u32,
    },
    /// Render the subscription key and features.
    Render {
        /// Enrich from Confluence and render the detail variants.
        #[arg(long, action = ArgAction::SetTrue)]
        details: bool,
    },
    /// Search spaces by key or name.
    Spaces { criteria: String },
    /// Check the configured space exists before attaching it.
    Link,
    /// Check the node is reachable and the credentials grant admin access.
    Status,
    /// Print the subscription editor registration as JSON.
    Editor,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[KM-Confluence] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = PanelConfig::load_from_optional_path(cli.config.as_deref())?;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("panel_{session_stamp}.log")));
    let logger = Arc::new(Logger::new(Some(log_path), cli.verbose)?);
    logger.info("INIT", format!("node {} loaded", config.node.id));

    let jar = Arc::new(Jar::default());
    let fetcher = HttpLinkFetcher::new(config.node.timeout, Arc::clone(&jar))?;
    let controller = RefreshController::new(
        Arc::new(fetcher),
        Arc::new(Spinner),
        Arc::clone(&logger),
    );
    let mut registry = ServiceRegistry::new();
    registry.register(Box::new(ConfluenceDescriptor::new(Arc::new(controller))));

    let session = Session {
        config: &config,
        jar: &jar,
        logger: &logger,
    };
    let outcome = execute(cli.command, &session, &registry).await;
    conclude(&logger, outcome)
}

/// Seal the log; a sealing failure never masks the command outcome.
fn conclude(logger: &Logger, outcome: Result<ExitCode>) -> Result<ExitCode> {
    if let Err(err) = &outcome {
        logger.error("FAILED", err.to_string());
    }
    if let Err(err) = logger.finalize() {
        logger.error("FINALIZE", err.to_string());
    }
    outcome
}

/// What every command draws on: configuration, the shared cookie jar
/// holding the Confluence session, and the logger.
struct Session<'a> {
    config: &'a PanelConfig,
    jar: &'a Arc<Jar>,
    logger: &'a Arc<Logger>,
}

impl Session<'_> {
    fn space_client(&self) -> Result<SpaceClient> {
        self.config.require_url()?;
        SpaceClient::new(
            &self.config.node().parameters,
            self.config.node.timeout,
            Arc::clone(self.jar),
            Arc::clone(self.logger),
        )
    }
}

async fn execute(
    command: Command,
    session: &Session<'_>,
    registry: &ServiceRegistry,
) -> Result<ExitCode> {
    let Session { config, logger, .. } = *session;
    let descriptor = registry.resolve(&config.node.id);
    match command {
        Command::Links { refreshes } => {
            config.require_url()?;
            if config.node.user.is_some() {
                if let Err(err) = session.space_client()?.authenticate().await {
                    logger.warn("LOGIN", format!("links will be fetched without a session: {err}"));
                }
            }
            let configuration = config.global_configuration();
            let mut dashboard = Dashboard::new();
            let view = ConfluenceDescriptor::new_view();
            let handle = descriptor
                .render_global(&mut dashboard, view, &configuration)
                .await
                .ok_or_else(|| {
                    PanelError::Runtime(format!("{} has no global panel", descriptor.id()))
                })?;
            for _ in 0..refreshes {
                handle.refresh().await;
            }
            let warned = !lock_view(handle.view()).warning.is_hidden();
            if warned {
                logger.warn("LINKS", "links unavailable; login to Confluence and refresh");
            }
            println!("{}", dashboard.to_html());
        }
        Command::Render { details } => {
            let mut subscription = config.subscription();
            if details {
                let space = required_space(config)?;
                let client = session.space_client()?;
                let enriched = client.validate_space(&space).await?;
                logger.info("SPACE", format!("space {} enriched", enriched.id));
                subscription.data = Some(SubscriptionData {
                    space: Some(enriched),
                });
                println!("{}", descriptor.render_details_key(&subscription));
                println!("{}", descriptor.render_details_features(&subscription));
            }
            println!("{}", descriptor.render_key(&subscription));
            println!("{}", descriptor.render_features(&subscription));
        }
        Command::Spaces { criteria } => {
            let spaces = session.space_client()?.find_spaces(&criteria).await?;
            logger.info("SPACES", format!("{} spaces match `{criteria}`", spaces.len()));
            print_json(&spaces)?;
        }
        Command::Link => {
            let space = required_space(config)?;
            session.space_client()?.link(&space).await?;
            logger.info("LINK", format!("space {space} is linkable"));
            println!("→ Space {space} exists");
        }
        Command::Status => {
            let client = session.space_client()?;
            client.check_status().await?;
            let version = client.version().await?.unwrap_or_else(|| "unknown".into());
            let latest = client.last_version().await.unwrap_or_else(|err| {
                logger.warn("JIRA", format!("latest release unknown: {err}"));
                None
            });
            match latest {
                Some(latest) => println!("→ Confluence {version} is up (latest release {latest})"),
                None => println!("→ Confluence {version} is up"),
            }
        }
        Command::Editor => {
            let mut editor = SubscriptionEditor::default();
            descriptor.configure_subscription_parameters(&mut editor, &config.global_configuration());
            print_json(&editor)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn required_space(config: &PanelConfig) -> Result<String> {
    config
        .subscription()
        .parameter(PARAMETER_SPACE)
        .map(str::to_string)
        .ok_or_else(|| PanelError::Config("`subscription.space` is required".into()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| PanelError::Serialization(format!("Failed to render JSON: {err}")))?;
    println!("{rendered}");
    Ok(())
}
