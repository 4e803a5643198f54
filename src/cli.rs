//! Command-line interface for streamscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Streaming transcription client
#[derive(Parser, Debug)]
#[command(
    name = "streamscribe",
    version,
    about = "Real-time transcription client"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// WebSocket server URL (e.g., ws://127.0.0.1:8000)
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Audio input device (e.g., hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Suppress partial results (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a WAV file through the live transcription endpoint
    File {
        /// WAV file to stream
        path: PathBuf,

        /// Send audio as fast as possible instead of at real-time pace
        #[arg(long)]
        no_pacing: bool,
    },

    /// Upload a WAV file for one-shot transcription
    Transcribe {
        /// WAV file to upload
        path: PathBuf,
    },

    /// List available audio input devices
    Devices,

    /// View and modify the remote engine configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Remote configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the current engine configuration
    Show,
    /// Set an engine configuration value
    Set {
        /// Key (model_checkpoint, method, save_transcript, chunk_size_ms, overlap_ms)
        key: String,
        /// Value to set
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["streamscribe"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
        assert!(cli.server.is_none());
        assert!(cli.device.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_verbose_levels() {
        let cli = Cli::try_parse_from(["streamscribe", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
        let cli = Cli::try_parse_from(["streamscribe", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_with_options() {
        let cli = Cli::try_parse_from([
            "streamscribe",
            "--server",
            "ws://10.0.0.2:8000",
            "--device",
            "hw:0",
        ])
        .unwrap();

        assert_eq!(cli.server.as_deref(), Some("ws://10.0.0.2:8000"));
        assert_eq!(cli.device.as_deref(), Some("hw:0"));
    }

    #[test]
    fn test_parse_file_command() {
        let cli = Cli::try_parse_from(["streamscribe", "file", "speech.wav"]).unwrap();
        match cli.command {
            Some(Commands::File { path, no_pacing }) => {
                assert_eq!(path, PathBuf::from("speech.wav"));
                assert!(!no_pacing);
            }
            _ => panic!("Expected File command"),
        }
    }

    #[test]
    fn test_parse_file_no_pacing() {
        let cli =
            Cli::try_parse_from(["streamscribe", "file", "speech.wav", "--no-pacing"]).unwrap();
        match cli.command {
            Some(Commands::File { no_pacing, .. }) => assert!(no_pacing),
            _ => panic!("Expected File command"),
        }
    }

    #[test]
    fn test_parse_transcribe_requires_path() {
        let result = Cli::try_parse_from(["streamscribe", "transcribe"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_devices() {
        let cli = Cli::try_parse_from(["streamscribe", "devices"]).unwrap();
        match cli.command {
            Some(Commands::Devices) => {}
            _ => panic!("Expected Devices command"),
        }
    }

    #[test]
    fn test_parse_global_config() {
        let cli =
            Cli::try_parse_from(["streamscribe", "--config", "/path/to/config.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["streamscribe", "config", "show"]).unwrap();
        match cli.command {
            Some(Commands::Config { action }) => match action {
                ConfigAction::Show => {}
                _ => panic!("Expected Show action"),
            },
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli =
            Cli::try_parse_from(["streamscribe", "config", "set", "method", "streaming"]).unwrap();
        match cli.command {
            Some(Commands::Config { action }) => match action {
                ConfigAction::Set { key, value } => {
                    assert_eq!(key, "method");
                    assert_eq!(value, "streaming");
                }
                _ => panic!("Expected Set action"),
            },
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_config_requires_subcommand() {
        let result = Cli::try_parse_from(["streamscribe", "config"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let result = Cli::try_parse_from(["streamscribe", "invalid"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_global_options_after_command() {
        let cli =
            Cli::try_parse_from(["streamscribe", "devices", "--config", "/tmp/config.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
    }
}
