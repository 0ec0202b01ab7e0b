//! CLI command implementations

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use futures::StreamExt;
use seekable_core::{MediaType, SeekFlags, SeekableConfig, SeekableMedia};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print container and stream metadata as JSON
    Info {
        /// `http(s)://` URL or local path
        source: String,
    },
    /// Print the packet found at a timestamp as JSON
    Packet {
        /// `http(s)://` URL or local path
        source: String,
        /// Timestamp in seconds
        #[arg(long)]
        at: f64,
        /// Stream type to read from
        #[arg(long, default_value = "audio")]
        media_type: MediaType,
        /// Preferred stream index
        #[arg(long)]
        stream: Option<usize>,
        /// Land exactly on the timestamp instead of the preceding sync point
        #[arg(long)]
        forward: bool,
    },
    /// Write the raw audio packets of a time range to a file
    Export {
        /// `http(s)://` URL or local path
        source: String,
        /// Start in seconds
        #[arg(long, default_value = "0")]
        start: f64,
        /// End in seconds, 0 for the end of the media
        #[arg(long, default_value = "0")]
        end: f64,
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands, buffer_size: Option<usize>) -> anyhow::Result<()> {
    let mut media = SeekableMedia::new(SeekableConfig::from_env());

    match command {
        Commands::Info { source } => {
            load(&mut media, &source, buffer_size).await?;
            show_info(&media).await
        }
        Commands::Packet {
            source,
            at,
            media_type,
            stream,
            forward,
        } => {
            load(&mut media, &source, buffer_size).await?;
            show_packet(&media, at, media_type, stream, forward).await
        }
        Commands::Export {
            source,
            start,
            end,
            output,
        } => {
            load(&mut media, &source, buffer_size).await?;
            export_audio(&media, start, end, output).await
        }
    }
}

async fn load(media: &mut SeekableMedia, source: &str, buffer_size: Option<usize>) -> anyhow::Result<()> {
    let result = if source.starts_with("http://") || source.starts_with("https://") {
        media.load_url(source, buffer_size).await
    } else {
        media.load_file(source, buffer_size).await
    };
    result.with_context(|| format!("Failed to load {source}"))
}

/// Print media info
///
/// # Errors
/// - `BridgeError` - Session lookup failed
pub async fn show_info(media: &SeekableMedia) -> anyhow::Result<()> {
    let info = media.media_info().await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Print one packet's metadata
///
/// # Errors
/// - `BridgeError::StreamNotFound` - No stream of the requested type
/// - `BridgeError::PacketRead` - No packet at that position
pub async fn show_packet(
    media: &SeekableMedia,
    at: f64,
    media_type: MediaType,
    stream: Option<usize>,
    forward: bool,
) -> anyhow::Result<()> {
    let handle = media.handle().context("No media loaded")?;
    let flags = if forward {
        SeekFlags::NONE
    } else {
        SeekFlags::BACKWARD
    };

    let packet = media
        .bridge()
        .fetch_packet(handle, media_type, stream, at, flags)
        .await?;
    println!("{}", serde_json::to_string_pretty(&packet)?);
    Ok(())
}

/// Export raw audio packets
///
/// # Errors
/// - `BridgeError` - Streaming failed to start
/// - `std::io::Error` - Output file could not be written
pub async fn export_audio(
    media: &SeekableMedia,
    start: f64,
    end: f64,
    output: PathBuf,
) -> anyhow::Result<()> {
    let mut stream = media.audio_stream(start, end).await?;
    let mut file = File::create(&output)
        .await
        .with_context(|| format!("Cannot create {}", output.display()))?;

    let mut packets = 0u64;
    let mut bytes = 0u64;
    while let Some(packet) = stream.packets.next().await {
        let packet = packet?;
        file.write_all(&packet.data).await?;
        packets += 1;
        bytes += packet.data.len() as u64;
    }
    file.flush().await?;

    info!("Exported {} packets to {}", packets, output.display());
    println!(
        "Exported {packets} packets ({bytes} bytes, {}) to {}",
        stream.mime_type,
        output.display()
    );
    Ok(())
}
