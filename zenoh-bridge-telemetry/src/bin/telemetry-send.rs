//! Bench tool that plays the data source.
//!
//! Reads `<id> <value>` lines from stdin (`0x01 100.0`, `2 20`) and sends
//! each as one fixed-width frame. Connects to a listening bridge by default;
//! with `--listen` it waits for a dialing bridge instead.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use hmi_common::{LoggingConfig, init_tracing};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use zenoh_bridge_telemetry::{Frame, ParameterId, RawValue, ValueEncoding};

/// Send telemetry frames typed on stdin.
#[derive(Parser, Debug)]
#[command(name = "telemetry-send")]
#[command(about = "Sends [id][value] telemetry frames read from stdin")]
#[command(version)]
struct Args {
    /// Bridge host (or bind address with --listen)
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Bridge port
    #[arg(short, long, default_value_t = 1048)]
    port: u16,

    /// Value encoding (f32, i16, i32, u16)
    #[arg(short, long, default_value = "f32")]
    encoding: ValueEncoding,

    /// Wait for the bridge to connect instead of dialing it
    #[arg(long)]
    listen: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Parse one `<id> <value>` line. Identifiers may be hex (`0x01`) or decimal.
fn parse_line(line: &str, encoding: ValueEncoding) -> Result<Frame, String> {
    let mut parts = line.split_whitespace();
    let (Some(id), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected '<id> <value>', got '{}'", line.trim()));
    };

    let id = match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => id.parse(),
    }
    .map_err(|e| format!("invalid identifier '{}': {}", id, e))?;

    Ok(Frame {
        id: ParameterId(id),
        value: RawValue::parse(value, encoding)?,
    })
}

async fn open(args: &Args) -> Result<(TcpStream, SocketAddr)> {
    let addr = format!("{}:{}", args.host, args.port);

    if args.listen {
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!(bind = %addr, "Waiting for the bridge to connect");
        return Ok(listener.accept().await?);
    }

    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    let peer = stream.peer_addr()?;
    Ok((stream, peer))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&LoggingConfig::default().with_level_override(Some(&args.log_level)))?;

    let (mut stream, peer) = open(&args).await?;
    tracing::info!(peer = %peer, encoding = %args.encoding, "Connected");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let frame = match parse_line(line, args.encoding) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("{}", e);
                continue;
            }
        };

        stream
            .write_all(&frame.to_bytes())
            .await
            .context("Connection to the bridge lost")?;
        tracing::info!(id = %frame.id, value = %frame.value, "Sent");
    }

    stream.shutdown().await?;
    Ok(())
}
