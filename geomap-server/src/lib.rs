//! # Geomap Bridge
//!
//! Hosts geomap sessions for a remote view-model owner over stdio.
//!
//! ## Protocol
//!
//! One JSON-RPC 2.0 request per stdin line, one response per stdout line.
//! Forwarded events are written as `map/event` notifications, interleaved
//! with responses; the events a request causes precede its response.
//! Logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! geomap-bridge --session main --width 1024 --height 768
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use std::io;

use clap::{Parser, ValueEnum};
use geomap_rpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, MapRpcServer, RpcConfig};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Command-line arguments for geomap-bridge.
#[derive(Debug, Clone, Parser)]
#[command(name = "geomap-bridge")]
#[command(about = "Stdio JSON-RPC bridge for geomap sessions")]
#[command(version)]
pub struct CliArgs {
    /// Session used when a request names none
    #[arg(long, env = "GEOMAP_SESSION", default_value = "default")]
    pub session: String,

    /// Default viewport width in pixels
    #[arg(long, default_value = "800")]
    pub width: f64,

    /// Default viewport height in pixels
    #[arg(long, default_value = "600")]
    pub height: f64,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Default session id.
    pub session: String,
    /// Default viewport width in pixels.
    pub width: f64,
    /// Default viewport height in pixels.
    pub height: f64,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let rpc = RpcConfig::default();
        Self {
            session: rpc.default_session,
            width: rpc.width,
            height: rpc.height,
            log_format: LogFormat::Text,
        }
    }
}

impl From<CliArgs> for ServerConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            session: args.session,
            width: args.width,
            height: args.height,
            log_format: args.log_format,
        }
    }
}

impl ServerConfig {
    /// The RPC server configuration.
    #[must_use]
    pub fn rpc(&self) -> RpcConfig {
        RpcConfig {
            default_session: self.session.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

/// Handle one input line.
///
/// Returns `None` for blank lines and for client notifications (requests
/// without an `id`), which get no response.
pub async fn handle_line(server: &MapRpcServer, line: &str) -> Option<JsonRpcResponse> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Unparsable request line");
            return Some(JsonRpcResponse::error(
                Value::Null,
                -32700,
                format!("Parse error: {e}"),
            ));
        }
    };

    let id = value.get("id").cloned();
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                id.unwrap_or(Value::Null),
                -32600,
                format!("Invalid request: {e}"),
            ))
        }
    };

    let response = server.handle_request(request).await;
    id.map(|_| response)
}

/// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
pub async fn run_stdio<R, W>(config: &ServerConfig, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut server = MapRpcServer::new(config.rpc());
    server.set_notifier(tx);

    tracing::info!(session = %config.session, "geomap bridge serving on stdio");

    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            biased;

            Some(notification) = rx.recv() => {
                write_frame(&mut writer, &notification).await?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let response = handle_line(&server, &line).await;
                flush_notifications(&mut rx, &mut writer).await?;
                if let Some(response) = response {
                    write_frame(&mut writer, &response).await?;
                }
            }
        }
    }

    flush_notifications(&mut rx, &mut writer).await?;
    writer.flush().await?;
    tracing::info!("stdin closed, geomap bridge stopping");
    Ok(())
}

async fn flush_notifications<W: AsyncWrite + Unpin>(
    rx: &mut mpsc::UnboundedReceiver<JsonRpcNotification>,
    writer: &mut W,
) -> io::Result<()> {
    while let Ok(notification) = rx.try_recv() {
        write_frame(writer, &notification).await?;
    }
    Ok(())
}

async fn write_frame<W, T>(writer: &mut W, frame: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json =
        serde_json::to_string(frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await
}
