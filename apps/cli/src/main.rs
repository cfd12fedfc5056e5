//! Composition root: wires the NodeHandler Registry, Credential Resolver,
//! FlowVersion store, Execution Store and EventBus together and serves
//! the Control API over HTTP (§9).

mod demo;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use flowright_api::AppState;
use flowright_core::FlowId;
use flowright_credential::InMemoryCredentialResolver;
use flowright_eventbus::EventBus;
use flowright_execution::InMemoryExecutionStore;
use flowright_log::LogFormat;
use flowright_node::NodeRegistry;
use flowright_workflow::{Definition, Edge, FlowVersion, InMemoryFlowVersionStore, Node};

#[derive(Parser)]
#[command(name = "flowright", about = "Flowright flow execution engine")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: CliLogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliLogFormat {
    Pretty,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the Control API HTTP server.
    Serve {
        /// Address to bind the HTTP listener to.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// Seed an in-memory demo FlowVersion and print its id on startup.
        #[arg(long)]
        seed_demo_flow: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    flowright_log::init(cli.log_format.into());

    match cli.command {
        Command::Serve { addr, seed_demo_flow } => serve(addr, seed_demo_flow).await,
    }
}

async fn serve(addr: SocketAddr, seed_demo_flow: bool) -> anyhow::Result<()> {
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(demo::ManualTrigger::new()))?;
    registry.register(Arc::new(demo::PassThrough::new()))?;
    let registry = Arc::new(registry);

    let flow_versions = Arc::new(InMemoryFlowVersionStore::new());
    if seed_demo_flow {
        let version = seed_demo_flow_version();
        tracing::info!(flow_version_id = %version.id, "seeded demo flow version");
        flow_versions.put(version);
    }

    let state = AppState::new(
        registry,
        Arc::new(InMemoryCredentialResolver::new()),
        flow_versions,
        Arc::new(InMemoryExecutionStore::new()),
        Arc::new(EventBus::new()),
    );

    let router = flowright_api::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "flowright control api listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutting down");
}

/// `manualTrigger -> passThrough`, published so it's runnable without `allowDraft`.
fn seed_demo_flow_version() -> FlowVersion {
    let definition = Definition::empty()
        .with_node(Node::new("start", "manualTrigger", "Start"))
        .with_node(Node::new("echo", "passThrough", "Echo"))
        .with_edge(Edge::main("start", "echo"));

    let mut version = FlowVersion::draft(FlowId::new(), "v1", definition);
    version.status = flowright_workflow::FlowVersionStatus::Published;
    version
}
