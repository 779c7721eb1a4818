use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{Parser as ClapParser, ValueEnum};
use sbc::process::resync::ResyncStrategy;
use sbc::process::stream::{DEFAULT_FLUSH_INTERVAL, DecoderOptions};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (sbc ",
    env!("SBC_VERSION"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    about        = "Recover and decode Bluetooth A2DP SBC bitstreams",
    long_about   = None,
)]
pub struct Cli {
    /// Input SBC bitstream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Write decoded audio to PATH (use "-" for raw PCM on stdout).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Play decoded audio on an output device.
    #[arg(long, conflicts_with = "output")]
    pub play: bool,

    /// Output device for --play (default: the system default device).
    #[arg(long, value_name = "NAME", requires = "play")]
    pub device: Option<String>,

    /// Audio format for file output.
    #[arg(long, value_enum, default_value_t = AudioFormat::Wav)]
    pub format: AudioFormat,

    /// How the next frame is chosen after a decode failure.
    #[arg(long, value_enum, default_value_t = ResyncArg::Fingerprint)]
    pub resync: ResyncArg,

    /// Frames written between output flushes.
    #[arg(
        long,
        value_name = "FRAMES",
        default_value_t = DEFAULT_FLUSH_INTERVAL,
        value_parser = clap::value_parser!(u32).range(1..).map(|n| n as usize),
    )]
    pub flush_interval: usize,

    /// Write a YAML stream report to PATH.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Set the log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show a progress bar while decoding.
    #[arg(long)]
    pub progress: bool,
}

impl Cli {
    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            resync: self.resync.into(),
            flush_interval: self.flush_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum AudioFormat {
    /// RIFF/WAVE, 16-bit PCM.
    Wav,
    /// Raw PCM (16-bit little-endian, interleaved).
    Pcm,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ResyncArg {
    /// Match syncword, mode byte and bitpool of the last good frame (default).
    Fingerprint,
    /// Accept any syncword.
    Syncword,
}

impl From<ResyncArg> for ResyncStrategy {
    fn from(arg: ResyncArg) -> Self {
        match arg {
            ResyncArg::Fingerprint => ResyncStrategy::Fingerprint,
            ResyncArg::Syncword => ResyncStrategy::Syncword,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_input_uses_defaults() {
        let cli = Cli::try_parse_from(["sbcd", "capture.sbc"]).unwrap();

        assert_eq!(cli.input, PathBuf::from("capture.sbc"));
        assert!(cli.output.is_none());
        assert!(cli.report.is_none());
        assert!(!cli.play);
        assert_eq!(cli.format, AudioFormat::Wav);
        assert_eq!(cli.decoder_options(), DecoderOptions::default());
    }

    #[test]
    fn decoder_flags() {
        let cli = Cli::try_parse_from([
            "sbcd",
            "-",
            "-o",
            "out.pcm",
            "--format",
            "pcm",
            "--resync",
            "syncword",
            "--flush-interval",
            "4",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(PathBuf::from("out.pcm")));
        assert_eq!(
            cli.decoder_options(),
            DecoderOptions {
                resync: ResyncStrategy::Syncword,
                flush_interval: 4
            }
        );
    }

    #[test]
    fn playback_flags() {
        let cli = Cli::try_parse_from(["sbcd", "a.sbc", "--play", "--device", "Speakers"]).unwrap();
        assert!(cli.play);
        assert_eq!(cli.device.as_deref(), Some("Speakers"));

        assert!(Cli::try_parse_from(["sbcd", "a.sbc", "--play", "-o", "out.wav"]).is_err());
        assert!(Cli::try_parse_from(["sbcd", "a.sbc", "--device", "Speakers"]).is_err());
    }

    #[test]
    fn zero_flush_interval_is_rejected() {
        assert!(Cli::try_parse_from(["sbcd", "a.sbc", "--flush-interval", "0"]).is_err());
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["sbcd"]).is_err());
    }
}
