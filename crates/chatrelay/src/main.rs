//! chatrelay - streaming relay from an LLM provider to data stream clients

use std::path::PathBuf;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay::config::Config;
use chatrelay::error::Result;
use chatrelay::proxy::ProxyServer;
use chatrelay::transcode::{TranscodeStream, pipe};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// chatrelay - relay LLM token streams as data stream frames
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Relay an OpenAI-compatible SSE stream as data stream frames")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the relay server (default command)
    #[command(name = "serve")]
    Serve,
    /// Transcode a captured SSE body into frames on stdout
    #[command(name = "transcode")]
    Transcode {
        /// SSE capture to read (defaults to stdin)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
        /// Check that every frame decodes back to its text, failing otherwise
        #[arg(long)]
        verify: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
        Some(Command::Transcode { input, verify }) => transcode(input, verify).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chatrelay=debug"));

    // stdout carries frames in transcode mode
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting chatrelay");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config);

    ProxyServer::new(config).serve().await?;

    tracing::info!("chatrelay stopped");
    Ok(())
}

async fn transcode(input: Option<PathBuf>, verify: bool) -> Result<()> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = match input {
        Some(path) => {
            tracing::info!("Transcoding {}", path.display());
            Box::new(tokio::fs::File::open(&path).await?)
        }
        None => Box::new(tokio::io::stdin()),
    };

    let frames = TranscodeStream::new(Box::pin(read_chunks(reader))).with_verification(verify);
    let mut stdout = tokio::io::stdout();
    let stats = pipe(frames, &mut stdout).await?;

    tracing::info!(
        frames = stats.frames,
        malformed = stats.malformed,
        bytes_in = stats.bytes_in,
        verified = verify,
        "Transcoding finished"
    );
    Ok(())
}

fn read_chunks<R>(reader: R) -> impl Stream<Item = std::io::Result<Bytes>>
where
    R: AsyncRead + Unpin,
{
    stream::unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), reader))
            }
            Err(e) => Some((Err(e), reader)),
        }
    })
}
