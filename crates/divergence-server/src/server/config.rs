use anyhow::bail;
use clap::Parser;
use divergence::{AssetFormat, Chances, JobSettings, MAX_DISPLAY_DIGITS};
use std::path::PathBuf;
use std::time::Duration;

/// Largest accepted `LOOKAHEAD`. Every cold request checks the whole window on
/// disk.
pub const MAX_LOOKAHEAD: u64 = 1_000;

/// Runtime configuration for the `divergence-server` binary.
///
/// Every value can be given as a CLI flag or an environment variable; a `.env`
/// file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "divergence-server",
    version,
    about = "Serves cached nixie-tube odometer animations"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:5000"))]
    pub server_addr: String,

    /// Frames rendered per animation.
    ///
    /// Environment variable: `RENDER_TOTAL_FRAMES`
    #[arg(long, env = "RENDER_TOTAL_FRAMES", default_value_t = 60)]
    pub total_frames: usize,

    /// Playback rate of the encoded animation, in frames per second.
    ///
    /// Environment variable: `RENDER_FRAMERATE`
    #[arg(long, env = "RENDER_FRAMERATE", default_value_t = 60)]
    pub framerate: u32,

    /// Number of tubes on the animated display.
    ///
    /// Environment variable: `DISPLAY_DIGITS`
    #[arg(long, env = "DISPLAY_DIGITS", default_value_t = 8)]
    pub digits: usize,

    /// How many values past the requested one are pre-rendered.
    ///
    /// Environment variable: `LOOKAHEAD`
    #[arg(long, env = "LOOKAHEAD", default_value_t = 5)]
    pub lookahead: u64,

    /// Durable cache served to clients.
    ///
    /// Environment variable: `CACHE_DIR`
    #[arg(long, env = "CACHE_DIR", default_value = "./cache")]
    pub cache_dir: PathBuf,

    /// Staging directory the worker writes finished renders to.
    ///
    /// Environment variable: `RENDER_OUTPUT_DIR`
    #[arg(long, env = "RENDER_OUTPUT_DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// Encoded format: `gif`, `webp` or `apng`.
    ///
    /// Environment variable: `ASSET_FORMAT`
    #[arg(long, env = "ASSET_FORMAT", default_value_t = AssetFormat::Gif)]
    pub format: AssetFormat,

    /// Width of the encoded animation; the height keeps the aspect ratio.
    /// `0` keeps the native size.
    ///
    /// Environment variable: `EXPORT_WIDTH`
    #[arg(long, env = "EXPORT_WIDTH", default_value_t = 1500)]
    pub export_width: u32,

    /// Encoder executable.
    ///
    /// Environment variable: `FFMPEG_BIN`
    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
    pub ffmpeg_bin: PathBuf,

    /// JSON file with the `on`, `half` and `off` tube materials. The built-in
    /// theme is used when unset.
    ///
    /// Environment variable: `TUBE_THEME`
    #[arg(long, env = "TUBE_THEME")]
    pub tube_theme: Option<PathBuf>,

    /// Per-tube, per-frame probability of a flicker starting.
    ///
    /// Environment variable: `FLICKER_START`
    #[arg(long, env = "FLICKER_START", default_value_t = 0.01)]
    pub flicker_start: f64,

    /// Probability of a dim flash instead of full darkness.
    ///
    /// Environment variable: `FLICKER_SKIP_DIM`
    #[arg(long, env = "FLICKER_SKIP_DIM", default_value_t = 0.5)]
    pub flicker_skip_dim: f64,

    /// Shortest flicker, in frames.
    ///
    /// Environment variable: `FLICKER_DURATION_MIN`
    #[arg(long, env = "FLICKER_DURATION_MIN", default_value_t = 0)]
    pub flicker_duration_min: u32,

    /// Longest flicker, in frames.
    ///
    /// Environment variable: `FLICKER_DURATION_MAX`
    #[arg(long, env = "FLICKER_DURATION_MAX", default_value_t = 5)]
    pub flicker_duration_max: u32,

    /// Seeds each job's RNG with `seed + value` for reproducible renders.
    ///
    /// Environment variable: `FLICKER_SEED`
    #[arg(long, env = "FLICKER_SEED")]
    pub flicker_seed: Option<u64>,

    /// Number of tubes on the static view counter.
    ///
    /// Environment variable: `COUNTER_DIGITS`
    #[arg(long, env = "COUNTER_DIGITS", default_value_t = 7)]
    pub counter_digits: usize,

    /// JSON file persisting view counts. Counts live in memory when unset.
    ///
    /// Environment variable: `COUNTER_STORE`
    #[arg(long, env = "COUNTER_STORE")]
    pub counter_store: Option<PathBuf>,

    /// Seconds to wait for an in-flight render on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub digits: usize,
    pub lookahead: u64,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub format: AssetFormat,
    pub export_width: u32,
    pub ffmpeg_bin: PathBuf,
    pub tube_theme: Option<PathBuf>,
    pub chances: Chances,
    pub job: JobSettings,
    pub counter_digits: usize,
    pub counter_store: Option<PathBuf>,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.total_frames == 0 {
            bail!("RENDER_TOTAL_FRAMES must be greater than 0");
        }

        if args.framerate == 0 {
            bail!("RENDER_FRAMERATE must be greater than 0");
        }

        if !(1..=MAX_DISPLAY_DIGITS).contains(&args.digits) {
            bail!(
                "DISPLAY_DIGITS ({}) must be between 1 and {}",
                args.digits,
                MAX_DISPLAY_DIGITS
            );
        }

        if args.lookahead > MAX_LOOKAHEAD {
            bail!(
                "LOOKAHEAD ({}) must be at most {}",
                args.lookahead,
                MAX_LOOKAHEAD
            );
        }

        if args.counter_digits == 0 {
            bail!("COUNTER_DIGITS must be greater than 0");
        }

        let chances = Chances {
            start: args.flicker_start,
            skip_dim: args.flicker_skip_dim,
            duration_min: args.flicker_duration_min,
            duration_max: args.flicker_duration_max,
        };
        chances.validate()?;

        Ok(Self {
            server_addr: args.server_addr,
            digits: args.digits,
            lookahead: args.lookahead,
            cache_dir: args.cache_dir,
            output_dir: args.output_dir,
            format: args.format,
            export_width: args.export_width,
            ffmpeg_bin: args.ffmpeg_bin,
            tube_theme: args.tube_theme,
            chances,
            job: JobSettings {
                total_frames: args.total_frames,
                framerate: args.framerate,
                seed: args.flicker_seed,
            },
            counter_digits: args.counter_digits,
            counter_store: args.counter_store,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = core::iter::once("divergence-server").chain(args.iter().copied());
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_are_valid() {
        let config = parse(&["--server-addr", "127.0.0.1:0"]).unwrap();
        assert_eq!(config.job.total_frames, 60);
        assert_eq!(config.job.framerate, 60);
        assert_eq!(config.chances, Chances::default());
        assert_eq!(config.format, AssetFormat::Gif);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn display_width_is_bounded() {
        assert!(parse(&["--digits", "0"]).is_err());
        assert!(parse(&["--digits", "20"]).is_err());
        assert!(parse(&["--digits", "19"]).is_ok());
    }

    #[test]
    fn probabilities_must_be_in_unit_interval() {
        assert!(parse(&["--flicker-start", "1.5"]).is_err());
        assert!(parse(&["--flicker-skip-dim=-0.1"]).is_err());
        assert!(parse(&["--flicker-duration-min", "6"]).is_err());
    }

    #[test]
    fn lookahead_is_bounded() {
        assert!(parse(&["--lookahead", "0"]).is_ok());
        assert!(parse(&["--lookahead", "1000"]).is_ok());
        assert!(parse(&["--lookahead", "1001"]).is_err());
        assert!(parse(&["--lookahead", "18446744073709551615"]).is_err());
    }

    #[test]
    fn format_is_parsed() {
        let config = parse(&["--format", "webp"]).unwrap();
        assert_eq!(config.format, AssetFormat::Webp);
        assert!(parse(&["--format", "mp4"]).is_err());
    }
}
