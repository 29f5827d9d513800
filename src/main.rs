use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use sttstream_audio::{
    AudioSource, DeviceManager, FileAudioSource, MicrophoneAudioSource, MicrophoneOptions,
};
use sttstream_core::config::{self, API_KEY_ENV};
use sttstream_core::{ApiKey, AppConfig, SessionConfig};
use sttstream_session::{SessionOptions, StreamingSession};
use sttstream_sink::SinkRegistry;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sttstream", about = "Streaming speech recognition client")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio file to recognize
    #[arg(short, long, conflicts_with = "time")]
    path: Option<PathBuf>,

    /// Record from the microphone for this many seconds
    #[arg(short, long, num_args = 0..=1, value_name = "SECONDS")]
    time: Option<Option<u32>>,

    /// Environment file to load before reading config (default: nearest `.env`)
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Print capture devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_file = config::load_env_file(cli.env_file.as_deref())
        .context("failed to load environment file")?;

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {path:?}"))?,
        None => AppConfig::default(),
    };

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Recognized text goes to stdout; diagnostics stay on stderr.
    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    if cli.list_devices {
        let devices = DeviceManager::new()
            .describe_input_devices()
            .context("failed to enumerate capture devices")?;
        for line in devices {
            println!("{line}");
        }
        return Ok(());
    }

    let api_key = match config.service.api_key.as_deref() {
        Some(key) if !key.is_empty() => ApiKey::new(key),
        _ => ApiKey::from_env(API_KEY_ENV).context("no API key configured")?,
    };

    let session_config = config
        .recognition
        .to_session_config()
        .context("invalid [recognition] settings")?;

    let source = open_source(&cli, &config, &session_config)?;

    let mut sink = SinkRegistry::new()
        .open(&config.output)
        .await
        .with_context(|| format!("failed to set up sink '{}'", config.output.sink))?;

    let options = SessionOptions {
        deadline: config.service.deadline(),
        forward_partials: config.recognition.partial_results,
        ..SessionOptions::default()
    };
    let mut session = StreamingSession::open(&config.service, &api_key, options)
        .await
        .context("failed to connect to the recognition service")?;

    let token = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling session");
            token.cancel();
        }
    });

    let result = session.run(&session_config, source, sink.as_mut()).await;

    if let Err(e) = sink.shutdown().await {
        tracing::warn!(sink = sink.name(), "sink shutdown failed: {e}");
    }

    match result {
        Ok(report) => {
            tracing::debug!(?report, "done");
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn open_source(
    cli: &Cli,
    config: &AppConfig,
    session_config: &SessionConfig,
) -> Result<Box<dyn AudioSource>> {
    match cli.time {
        Some(seconds) => {
            let options = MicrophoneOptions {
                device_name: config.audio.device_name.clone(),
                sample_rate: session_config.sample_rate_hz(),
                channels: session_config.channel_count(),
                chunk_frames: config.audio.mic_chunk_size,
                duration_secs: seconds.unwrap_or(config.audio.default_record_seconds),
                recording_path: config.audio.recording_path(),
            };
            let source = MicrophoneAudioSource::open(options).with_context(|| {
                format!("failed to open capture device '{}'", config.audio.device_name)
            })?;
            Ok(Box::new(source))
        }
        None => {
            let path = cli
                .path
                .clone()
                .unwrap_or_else(|| config.audio.default_file.clone());
            let source = FileAudioSource::open(&path, config.audio.file_chunk_size)
                .with_context(|| format!("failed to open audio file {}", path.display()))?;
            Ok(Box::new(source))
        }
    }
}
