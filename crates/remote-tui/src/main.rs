mod action;
mod app;
mod app_state;
mod component;
mod components;
mod markup;
mod tabs;
mod theme;
mod widgets;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use remote_client::{Controller, HttpTransport};
use remote_proto::config::Config;
use remote_proto::session::SessionStore;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::prelude::*;

use crate::tabs::TabMemory;

#[derive(Parser, Debug)]
#[command(name = "remote-panel", about = "Terminal remote control for a planetarium server")]
struct Args {
    /// Server base URL, overriding the config file
    #[arg(short, long)]
    server: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Tracing layer that forwards WARN and ERROR lines to the status bar.
struct LogForwardLayer {
    sender: broadcast::Sender<String>,
}

impl LogForwardLayer {
    fn new(sender: broadcast::Sender<String>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogForwardLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // No receiver yet (or any more) is fine.
        let _ = self.sender.send(message);
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Subscribe before logging starts so early warnings reach the status bar.
    let (log_tx, log_rx) = broadcast::channel::<String>(100);

    let data_dir = remote_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("panel.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(LogForwardLayer::new(log_tx))
        .with(tracing_subscriber::EnvFilter::new(log_filter))
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("remote-panel log: {}", log_path.display());
    info!("remote-panel starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(server) = args.server {
        config.server.base_url = server;
    }
    info!("server: {}", config.server.base_url);

    // ── Controller ───────────────────────────────────────────────────────────
    let transport = Arc::new(HttpTransport::new(&config.server)?);
    let (controller, handle) = Controller::new(transport, config.ui.clone());
    let updates = handle.subscribe();
    tokio::spawn(controller.run());

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let tab_memory = TabMemory::new(SessionStore::open_default());
    let app = app::App::new(handle, tab_memory, config.ui);
    app.run(updates, log_rx).await?;

    Ok(())
}
