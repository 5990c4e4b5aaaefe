//! charla — HTTP gateway for browser-automated messaging sessions.

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::Parser,
    tokio::sync::mpsc,
    tracing::{info, warn},
    tracing_subscriber::EnvFilter,
};

use {
    charla_assistant::{AssistantDriver, ChromiumPageFactory, spawn_idle_sweeper},
    charla_auto_reply::{AutoReplyRouter, HttpKeywordMatcher},
    charla_config::CharlaConfig,
    charla_connector::{EventCallback, connect_with_retry},
    charla_gateway::{
        AppState, HttpTokenValidator, LocalAssistantRelay, SessionReplySender, serve,
    },
    charla_sessions::{SessionManager, spawn_event_pump},
};

#[derive(Parser)]
#[command(name = "charla", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, env = "CHARLA_CONFIG")]
    config: Option<PathBuf>,

    /// Listener port override.
    #[arg(long, env = "CHARLA_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("charla=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = CharlaConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Sidecar events flow through a channel so the manager can be built
    // after the transport.
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let callback: EventCallback = Arc::new(move |event| {
        let _ = event_tx.send(event);
    });

    let (connector, disconnect_rx) = connect_with_retry(
        &config.sidecar.url,
        config.sidecar.request_timeout(),
        callback,
        config.sidecar.connect_retries,
    )
    .await
    .context("connecting to messaging sidecar")?;

    let validator = HttpTokenValidator::new(&config.validation)
        .context("building token validation client")?;

    let sessions = Arc::new(SessionManager::new(
        Arc::new(connector),
        Arc::new(validator),
        config.sessions.clone(),
    ));
    let _pump = spawn_event_pump(Arc::clone(&sessions), event_rx);

    let assistant = Arc::new(AssistantDriver::new(
        Arc::new(ChromiumPageFactory::new(config.assistant.clone())),
        config.assistant.clone(),
    ));
    let _sweeper = spawn_idle_sweeper(Arc::clone(&assistant));

    let keyword =
        HttpKeywordMatcher::new(&config.keyword).context("building keyword matching client")?;
    let router = Arc::new(AutoReplyRouter::new(
        Arc::new(LocalAssistantRelay::new(Arc::clone(&assistant))),
        Arc::new(keyword),
        Arc::new(SessionReplySender::new(Arc::clone(&sessions))),
        config.auto_reply.clone(),
    ));
    sessions.set_inbound_sink(router).await;

    let state = AppState {
        sessions,
        assistant: Arc::clone(&assistant),
    };

    info!(port = config.server.port, "starting charla");
    tokio::select! {
        result = serve(&config.server, state) => result,
        _ = disconnect_rx => {
            warn!("sidecar connection lost, shutting down");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            assistant.close_all().await;
            Ok(())
        },
    }
}
