//! Multi-listener server daemon.
//!
//! Boots a declarative server topology: one primary listener (HTTP or
//! WebSocket when present) plus secondary ports, with event callbacks
//! resolved from the handler container. Serves until interrupted.
//!
//! Without `--config` a built-in demo topology is used: an HTTP server on
//! 9501 and a raw TCP server on 9502, both handled by [`AppService`]
//! registered under `app.service`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multiserve::event::BEFORE_START;
use multiserve::{
    EventCallback, EventContext, EventHandler, HandlerContainer, HandlerRef, LifecycleBus,
    MiddlewareInitializer, RunMode, ServerCollection, ServerDefinition, ServerKind,
    ServerNameAware, ServerOrchestrator, TokioEngine,
};

#[derive(Parser)]
#[command(name = "multiserve", about = "Multi-listener server bootstrap", version)]
struct Args {
    /// Path to a TOML server topology; the built-in demo topology is used
    /// when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multiserve=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading server topology");
            multiserve::config::load(path)?
        }
        None => demo_topology(),
    };

    let container = Arc::new(HandlerContainer::new());
    container.register("app.service", || Arc::new(AppService::default()));

    let bus = Arc::new(LifecycleBus::default());
    let mut lifecycle_rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = lifecycle_rx.recv().await {
            tracing::info!(event = %event.name(), "Lifecycle notification");
        }
    });

    let engine = Arc::new(TokioEngine::new());
    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            shutdown.trigger();
        }
    });

    let mut orchestrator = ServerOrchestrator::new(engine, container, bus);
    orchestrator.initialize(config).await?;
    orchestrator.start().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Topology served when no config file is given.
fn demo_topology() -> ServerCollection {
    ServerCollection::new(RunMode::MultiProcess)
        .with_setting("max_connections", 1024i64)
        .with_server(
            ServerDefinition::new("http", ServerKind::Http, "0.0.0.0", 9501)
                .with_callback("request", HandlerRef::symbolic("app.service", "on_request"))
                .with_callback(BEFORE_START, HandlerRef::symbolic("app.service", "warm_up")),
        )
        .with_server(
            ServerDefinition::new("tcp", ServerKind::Base, "0.0.0.0", 9502)
                .with_setting("recv_buffer_size", 8192i64)
                .with_callback("connect", HandlerRef::symbolic("app.service", "on_connect"))
                .with_callback("receive", HandlerRef::symbolic("app.service", "on_receive")),
        )
}

/// Demo application handler. Payloads arrive raw; protocol parsing belongs
/// to layers above this crate.
#[derive(Default)]
struct AppService {
    server_name: Mutex<String>,
}

impl AppService {
    fn label(&self) -> String {
        self.server_name
            .lock()
            .expect("server name mutex poisoned")
            .clone()
    }

    async fn on_request(&self, ctx: EventContext) {
        tracing::info!(
            server = %self.label(),
            peer = ?ctx.peer,
            bytes = ctx.data.as_ref().map_or(0, Vec::len),
            "HTTP payload received"
        );
    }

    async fn on_connect(&self, ctx: EventContext) {
        tracing::info!(server = %self.label(), peer = ?ctx.peer, "Client connected");
    }

    async fn on_receive(&self, ctx: EventContext) {
        tracing::info!(
            server = %self.label(),
            peer = ?ctx.peer,
            bytes = ctx.data.as_ref().map_or(0, Vec::len),
            "Data received"
        );
    }

    async fn warm_up(&self) {
        tracing::info!("Warming application state before start");
    }
}

impl EventHandler for AppService {
    fn resolve_method(self: Arc<Self>, method: &str) -> Option<EventCallback> {
        match method {
            "on_request" => {
                let this = Arc::clone(&self);
                Some(EventCallback::new(move |ctx| {
                    let this = Arc::clone(&this);
                    async move { this.on_request(ctx).await }
                }))
            }
            "on_connect" => {
                let this = Arc::clone(&self);
                Some(EventCallback::new(move |ctx| {
                    let this = Arc::clone(&this);
                    async move { this.on_connect(ctx).await }
                }))
            }
            "on_receive" => {
                let this = Arc::clone(&self);
                Some(EventCallback::new(move |ctx| {
                    let this = Arc::clone(&this);
                    async move { this.on_receive(ctx).await }
                }))
            }
            "warm_up" => {
                let this = Arc::clone(&self);
                Some(EventCallback::new(move |_ctx| {
                    let this = Arc::clone(&this);
                    async move { this.warm_up().await }
                }))
            }
            _ => None,
        }
    }

    fn server_name_aware(&self) -> Option<&dyn ServerNameAware> {
        Some(self)
    }

    fn middleware_initializer(&self) -> Option<&dyn MiddlewareInitializer> {
        Some(self)
    }
}

impl ServerNameAware for AppService {
    fn set_server_name(&self, name: &str) {
        *self
            .server_name
            .lock()
            .expect("server name mutex poisoned") = name.to_string();
    }
}

impl MiddlewareInitializer for AppService {
    fn init_core_middleware(&self, server_name: &str) {
        tracing::debug!(server = %server_name, "Core middleware initialized");
    }
}
