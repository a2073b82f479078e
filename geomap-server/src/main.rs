//! geomap-bridge: stdio JSON-RPC host for geomap sessions.

use clap::Parser;
use geomap_server::{run_stdio, CliArgs, LogFormat, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing on stderr; stdout carries protocol frames.
///
/// Set `RUST_LOG` to control log levels (default: info,geomap_core=debug,geomap_rpc=debug).
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,geomap_core=debug,geomap_rpc=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from(CliArgs::parse());
    init_tracing(config.log_format);

    tracing::info!(
        version = geomap_core::VERSION,
        width = config.width,
        height = config.height,
        "Starting geomap-bridge"
    );

    run_stdio(&config, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
