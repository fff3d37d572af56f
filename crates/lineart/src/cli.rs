use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "lineart",
    author,
    version,
    about = "Line-art gallery, live preview, and video client"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Session config TOML; defaults to `lineart.toml` in the config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Rendering service base URL, overriding the config file.
    #[arg(long, global = true, env = "LINEART_SERVICE_URL", value_name = "URL")]
    pub service_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a gallery batch and save every artifact.
    Gallery {
        /// Directory for the gallery images (defaults to the output directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Render one display-only still image.
    Still {
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Generate a gallery, select one artifact, and stream preview frames.
    Preview(PreviewArgs),
    /// Generate a gallery, select one artifact, and render a full video.
    Video {
        /// Gallery slot to select.
        #[arg(long, value_name = "SLOT")]
        pick: usize,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print resolved config and output locations.
    Where,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Gallery slot to select.
    #[arg(long, value_name = "SLOT")]
    pub pick: usize,

    /// Stop the preview after this long (e.g. `10s`, `1m 30s`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Pointer script (`move X Y`, `reset`, `wait 500ms`, `stop`); `-` reads stdin.
    #[arg(long, value_name = "FILE|-")]
    pub script: Option<PathBuf>,

    /// Directory to write decoded preview frames to.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err("duration must be greater than zero".to_string());
        }
        return Ok(Duration::from_secs_f64(seconds));
    }
    let duration = humantime::parse_duration(trimmed)
        .map_err(|err| format!("invalid duration '{trimmed}': {err}"))?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}
