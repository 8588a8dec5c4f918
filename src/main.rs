use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nls_client::core::nls::{
    CloseCallback, DataCallback, ErrorCallback, MessageCallback, RecorderPreset, ResponseHeader,
};
use nls_client::{
    ClientConfig, NlsData, NlsError, NlsSession, RecognitionParams, RelayClient, StartOptions,
    TaskType,
};

/// NLS client - streaming speech synthesis and recognition
#[derive(Parser, Debug)]
#[command(name = "nls-client")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize speech from text
    Synthesize {
        /// Text to synthesize
        #[arg(short = 't', long = "text")]
        text: String,

        /// Output audio file
        #[arg(short = 'o', long = "output", default_value = "output.wav")]
        output: PathBuf,
    },

    /// Recognize speech from an audio file
    Recognize {
        /// Input audio file (raw PCM or WAV at the configured sample rate)
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// How audio chunks are materialized before sending
        #[arg(short = 's', long = "strategy", value_enum, default_value_t = Strategy::Blob)]
        strategy: Strategy,
    },

    /// Send a recording to the transcription relay
    Relay {
        /// Input audio file
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Relay endpoint (defaults to NLS_RELAY_URL)
        #[arg(short = 'u', long = "url")]
        url: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    Blob,
    Buffer,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Synthesize { text, output } => {
            let config = load_config(cli.config.as_deref())?;
            synthesize(&config, &text, &output).await
        }
        Commands::Recognize { input, strategy } => {
            let config = load_config(cli.config.as_deref())?;
            recognize(&config, &input, strategy).await
        }
        Commands::Relay { input, url } => {
            let url = match url {
                Some(url) => url,
                None => load_config(cli.config.as_deref())?
                    .relay_url
                    .clone()
                    .ok_or_else(|| anyhow!("No relay URL: pass --url or set NLS_RELAY_URL"))?,
            };
            relay(&url, &input).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    match path {
        Some(config_path) => {
            info!("Loading configuration from {}", config_path.display());
            ClientConfig::from_file(config_path).map_err(|e| anyhow!(e.to_string()))
        }
        None => ClientConfig::from_env().map_err(|e| anyhow!(e.to_string())),
    }
}

/// Callbacks that forward everything the session reports into a channel.
fn channel_options(tx: mpsc::UnboundedSender<NlsData>) -> StartOptions {
    let on_data: DataCallback = Arc::new(move |data: NlsData| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(data);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let on_message: MessageCallback = Arc::new(|header: ResponseHeader| {
        Box::pin(async move {
            info!("Event {} (status {:?})", header.name, header.status);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let on_error: ErrorCallback = Arc::new(|error: NlsError| {
        Box::pin(async move {
            warn!("Session error: {}", error);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let on_close: CloseCallback = Arc::new(|| {
        Box::pin(async move {
            info!("Session closed");
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    StartOptions::new()
        .on_data(on_data)
        .on_message(on_message)
        .on_error(on_error)
        .on_close(on_close)
}

async fn synthesize(config: &ClientConfig, text: &str, output: &Path) -> anyhow::Result<()> {
    let session = NlsSession::new(config.session_config(), TaskType::Synthesis)?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    session.start(channel_options(tx)).await?;
    session.send_text(Some(text)).await?;
    session.closed().await;

    let mut audio = None;
    while let Ok(data) = rx.try_recv() {
        audio = data.audio_bytes().or(audio);
    }
    let audio = audio.context("Session closed without synthesized audio")?;

    tokio::fs::write(output, &audio)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} bytes to {}", audio.len(), output.display());
    Ok(())
}

async fn recognize(config: &ClientConfig, input: &Path, strategy: Strategy) -> anyhow::Result<()> {
    let audio = read_audio(input).await?;

    let session = NlsSession::new(config.session_config(), TaskType::Recognition)?
        .with_recognition_params(RecognitionParams {
            sample_rate: config.sample_rate,
            ..Default::default()
        })?
        .with_pacing(config.pacing().map_err(|e| anyhow!(e.to_string()))?);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let printer = tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if let NlsData::Result(payload) = data {
                println!("{}", payload["result"].as_str().unwrap_or_default());
            }
        }
    });

    session.start(channel_options(tx)).await?;
    session.send_text(None).await?;

    let report = match strategy {
        Strategy::Blob => session.send_audio_blob(audio).await,
        Strategy::Buffer => match session.send_audio_buffer(audio) {
            Some(handle) => Some(handle.await?),
            None => None,
        },
    };
    // The gateway may have rejected the start command already
    let report = report.ok_or(NlsError::NotConnected)?;
    info!(
        "Uploaded {} of {} bytes in {} chunks",
        report.bytes_sent, report.total_bytes, report.chunks_sent
    );

    session.closed().await;
    drop(session);
    printer.await?;
    Ok(())
}

async fn relay(url: &str, input: &Path) -> anyhow::Result<()> {
    let audio = read_audio(input).await?;
    let response = RelayClient::new(url).transcribe(&audio).await?;

    match response.text() {
        Some(text) => println!("{text}"),
        None => println!("{}", response.data),
    }
    info!("Relay took {:.2}s", response.duration);
    Ok(())
}

async fn read_audio(input: &Path) -> anyhow::Result<Bytes> {
    let audio = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let preset = input
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(RecorderPreset::from_extension);
    match preset {
        Some(preset) => info!(
            "Read {} bytes of {} audio from {}",
            audio.len(),
            preset.mime_type,
            input.display()
        ),
        None => info!("Read {} bytes from {}", audio.len(), input.display()),
    }

    Ok(Bytes::from(audio))
}
