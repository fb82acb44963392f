//! `mgmtframe` server binary.
//!
//! Serves the management protocol on top of the in-memory collaborators.

mod cli;

use clap::Parser;
use mgmtframe::{
    dispatcher::Dispatcher,
    memory,
    model::ServerIdentity,
    registry::CommandRegistry,
    server::ManagementServer,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        mgmtframe::metrics::describe();
        info!(%addr, "serving metrics");
    }
    #[cfg(not(feature = "metrics"))]
    if cli.metrics_addr.is_some() {
        tracing::warn!("built without the metrics feature; --metrics-addr ignored");
    }

    let collaborators =
        memory::collaborators([ServerIdentity::new("localhost", "main-server-group", "server-one")]);
    let dispatcher = Dispatcher::new(CommandRegistry::standard(), collaborators);
    let mut server = ManagementServer::with_dispatcher(dispatcher)?;
    if let Some(workers) = cli.workers {
        server = server.workers(workers);
    }
    if let Some(len) = cli.max_frame_length {
        server = server.max_frame_length(len);
    }

    server.bind(cli.bind)?.run().await?;
    Ok(())
}
