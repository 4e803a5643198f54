use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use streamscribe::api::{ApiClient, RemoteConfigUpdate};
use streamscribe::audio::AudioSource;
use streamscribe::audio::FileAudioSource;
use streamscribe::cli::{Cli, Commands, ConfigAction};
use streamscribe::config::Config;
use streamscribe::stream::{SessionEvent, StreamSession, WsConnector};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        None => {
            // Mic mode: stream from the default (or selected) input device.
            let source = make_mic_source(config.input_device(cli.device.as_deref()))?;
            run_stream(&config, source, cli.quiet).await?;
        }
        Some(Commands::File { path, no_pacing }) => {
            let source = FileAudioSource::open(&path)?
                .with_block_size(config.audio.block_size)
                .with_pacing(!no_pacing);
            log::info!(
                "loaded {}: {}ms of audio in {} blocks",
                path.display(),
                source.duration_ms(),
                source.block_count()
            );
            run_stream(&config, Box::new(source), cli.quiet).await?;
        }
        Some(Commands::Transcribe { path }) => {
            let client = ApiClient::new(config.server.http_url.clone())?;
            let result = client.transcribe_file(&path).await?;
            if !cli.quiet {
                eprintln!(
                    "{:.1}s of audio, method {}, finished {}",
                    result.audio_duration, result.method, result.timestamp
                );
            }
            println!("{}", result.text);
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &config).await?;
        }
    }

    Ok(())
}

/// Map -v/-vv onto the log filter, keeping RUST_LOG authoritative when set.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/streamscribe/config.toml)
/// 3. Built-in defaults
/// Environment variables override the file; --server overrides everything.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = cli.config.as_deref() {
        Config::load(path)?
    } else if let Some(default_path) = Config::default_path() {
        Config::load_or_default(&default_path)?
    } else {
        Config::default()
    };

    config = config.with_env_overrides();
    if let Some(server) = &cli.server {
        config.server.url = server.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Open the microphone capture source.
#[cfg(feature = "cpal-audio")]
fn make_mic_source(device: Option<&str>) -> Result<Box<dyn AudioSource>> {
    let source = streamscribe::audio::CpalAudioSource::new(device)?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "cpal-audio"))]
fn make_mic_source(_device: Option<&str>) -> Result<Box<dyn AudioSource>> {
    anyhow::bail!("built without microphone support; use `streamscribe file <path>`")
}

/// Run one streaming session to completion, printing results as they come.
async fn run_stream(config: &Config, source: Box<dyn AudioSource>, quiet: bool) -> Result<()> {
    let connector = WsConnector::new(config.stream_url());
    let session = Arc::new(StreamSession::new(connector, config.session_config()));

    let mut events = session.start(source).await?;
    log::info!("streaming to {}", config.stream_url());

    // Ctrl+C requests the stop handshake; the session closes itself.
    {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("stop requested");
                if let Err(e) = session.stop().await {
                    log::error!("stop failed: {}", e);
                }
            }
        });
    }

    let mut saw_partial = false;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Transcription(result) => {
                if result.is_final {
                    if saw_partial {
                        println!();
                    }
                    println!("{}", result.text);
                } else if !quiet {
                    print!("\r{}", result.text);
                    std::io::stdout().flush().ok();
                    saw_partial = true;
                }
            }
            SessionEvent::Error(message) => {
                if saw_partial {
                    eprintln!();
                    saw_partial = false;
                }
                eprintln!("Error: {}", message);
            }
        }
    }

    // Event stream ended; make sure teardown finished before returning.
    session.stop().await?;
    Ok(())
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = streamscribe::audio::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    anyhow::bail!("built without microphone support")
}

/// Handle remote engine configuration commands.
async fn handle_config_command(action: ConfigAction, config: &Config) -> Result<()> {
    let client = ApiClient::new(config.server.http_url.clone())?;

    match action {
        ConfigAction::Show => {
            let remote = client.get_config().await?;
            println!("model_checkpoint = {:?}", remote.model_checkpoint);
            println!("method = {:?}", remote.method);
            println!("save_transcript = {}", remote.save_transcript);
            println!("chunk_size_ms = {}", remote.chunk_size_ms);
            println!("overlap_ms = {}", remote.overlap_ms);
        }
        ConfigAction::Set { key, value } => {
            let mut update = RemoteConfigUpdate::default();
            match key.as_str() {
                "model_checkpoint" => update.model_checkpoint = Some(value.clone()),
                "method" => update.method = Some(value.clone()),
                "save_transcript" => {
                    update.save_transcript = Some(value.parse().map_err(|_| {
                        anyhow::anyhow!("save_transcript expects true or false, got {:?}", value)
                    })?)
                }
                "chunk_size_ms" => {
                    update.chunk_size_ms = Some(value.parse().map_err(|_| {
                        anyhow::anyhow!("chunk_size_ms expects a number, got {:?}", value)
                    })?)
                }
                "overlap_ms" => {
                    update.overlap_ms = Some(value.parse().map_err(|_| {
                        anyhow::anyhow!("overlap_ms expects a number, got {:?}", value)
                    })?)
                }
                other => {
                    anyhow::bail!("unknown configuration key: {}", other);
                }
            }
            client.set_config(&update).await?;
            println!("Set {} = {}", key, value);
        }
    }
    Ok(())
}
