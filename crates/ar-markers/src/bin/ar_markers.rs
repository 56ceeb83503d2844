//! ar-markers CLI: replay recorded detection cycles through a full session.

use std::path::PathBuf;

use ar_markers::detect::load_cycles_json;
use ar_markers::{replay_session, CameraCalibration, SessionConfig};
use clap::{Args, Parser, Subcommand};

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ar-markers")]
#[command(about = "Marker-driven AR tracking: detection worker, pose mapping, object tracking")]
#[command(version)]
struct Cli {
    /// Log debug output from the session and the detection worker.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded detection cycles and report the tracked scene.
    Replay(ReplayArgs),

    /// Write a session config with default tuning.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Session config (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Recorded detection cycles (JSON array of marker arrays).
    #[arg(long)]
    cycles: PathBuf,

    /// Where to write the report (JSON). Printed to stdout when omitted.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Field of view of the virtual camera, degrees.
    #[arg(long, default_value = "60.0")]
    viewport_fov: f64,
}

#[derive(Debug, Clone, Args)]
struct InitConfigArgs {
    /// Output path for the config (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Camera intrinsics file read by the native detector.
    #[arg(long)]
    intrinsics: PathBuf,

    #[arg(long, default_value = "640")]
    width: u32,

    #[arg(long, default_value = "480")]
    height: u32,

    /// Printed marker side length in meters.
    #[arg(long, default_value = "0.05")]
    marker_size: f64,
}

fn init_logging(verbose: bool) -> CliResult<()> {
    #[cfg(feature = "tracing")]
    {
        // Filtering comes from RUST_LOG in this mode.
        let _ = verbose;
        let _ = LogTracer::init();
        ar_markers::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        ar_markers::core::init_with_level(level)?;
    }
    Ok(())
}

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    let config = SessionConfig::load_json(&args.config)?;
    let cycles = load_cycles_json(&args.cycles)?;
    let report = replay_session(config, cycles, args.viewport_fov)?;

    match &args.report {
        Some(path) => {
            report.write_json(path)?;
            println!(
                "wrote report for {} frames ({} objects) to {}",
                report.frames.len(),
                report.objects.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(reason) = &report.worker_error {
        return Err(format!("detection worker failed: {reason}").into());
    }
    Ok(())
}

fn run_init_config(args: &InitConfigArgs) -> CliResult<()> {
    let config = SessionConfig::new(CameraCalibration {
        width: args.width,
        height: args.height,
        marker_size_m: args.marker_size,
        intrinsics_path: args.intrinsics.clone(),
    });
    config.validate()?;
    config.write_json(&args.out)?;
    println!("wrote config to {}", args.out.display());
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Replay(args) => run_replay(&args),
        Commands::InitConfig(args) => run_init_config(&args),
    }
}
