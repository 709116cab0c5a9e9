//! Command-line arguments.
//!
//! Connection flags override the config file when given; everything else
//! falls back to configured values. Verbosity feeds the default tracing
//! filter and `RUST_LOG` still wins when set.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::pipeline::ShowMode;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "plantdoc",
    about = "Knowledge-grounded plant disease diagnosis over llama-server",
    version
)]
pub struct Args {
    /// Images of the affected crop, diagnosed together in one run
    #[arg(required = true, value_name = "IMAGE")]
    pub images: Vec<PathBuf>,

    /// Configuration file (default: ~/.plantdoc/config.toml, created on first run)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// llama-server host
    #[arg(long)]
    pub host: Option<String>,

    /// llama-server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Model name registered with the serving process
    #[arg(long)]
    pub model: Option<String>,

    /// How much model output to surface while the run is in progress
    #[arg(long, value_enum, default_value = "none")]
    pub show: ShowArg,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowArg {
    /// Progress bar only
    #[default]
    None,
    /// Full stage output after each stage completes
    Stage,
    /// Token-by-token echo while the stage runs
    Stream,
}

impl ShowArg {
    pub fn show_mode(self) -> ShowMode {
        match self {
            ShowArg::None => ShowMode::None,
            ShowArg::Stage => ShowMode::Stage,
            ShowArg::Stream => ShowMode::Stream,
        }
    }
}

impl Args {
    /// Default tracing directive for the chosen verbosity
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_are_required() {
        assert!(Args::try_parse_from(["plantdoc"]).is_err());
        let args = Args::try_parse_from(["plantdoc", "leaf.jpg"]).unwrap();
        assert_eq!(args.images, vec![PathBuf::from("leaf.jpg")]);
    }

    #[test]
    fn test_multiple_images_and_overrides() {
        let args = Args::try_parse_from([
            "plantdoc",
            "a.jpg",
            "b.jpg",
            "--host",
            "10.0.0.2",
            "--port",
            "9090",
            "--model",
            "custom-vl",
        ])
        .unwrap();
        assert_eq!(args.images.len(), 2);
        assert_eq!(args.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(args.port, Some(9090));
        assert_eq!(args.model.as_deref(), Some("custom-vl"));
    }

    #[test]
    fn test_show_mode_mapping() {
        let args = Args::try_parse_from(["plantdoc", "leaf.jpg", "--show", "stream"]).unwrap();
        assert_eq!(args.show.show_mode(), ShowMode::Stream);
        let args = Args::try_parse_from(["plantdoc", "leaf.jpg"]).unwrap();
        assert_eq!(args.show.show_mode(), ShowMode::None);
    }

    #[test]
    fn test_log_directive() {
        let base = Args::try_parse_from(["plantdoc", "leaf.jpg"]).unwrap();
        assert_eq!(base.log_directive(), "info");

        let verbose = Args::try_parse_from(["plantdoc", "leaf.jpg", "-v"]).unwrap();
        assert_eq!(verbose.log_directive(), "debug");

        let trace = Args::try_parse_from(["plantdoc", "leaf.jpg", "-vv"]).unwrap();
        assert_eq!(trace.log_directive(), "trace");

        let quiet = Args::try_parse_from(["plantdoc", "leaf.jpg", "--quiet"]).unwrap();
        assert_eq!(quiet.log_directive(), "error");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["plantdoc", "leaf.jpg", "-q", "-v"]).is_err());
    }
}
