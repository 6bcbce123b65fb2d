use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use snapsort::cli::{Command, run_cli};
use snapsort::config::Overrides;
use snapsort::output::OutputFormatter;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sort photos and videos into year/month folders by capture date.
#[derive(Debug, Parser)]
#[command(name = "snapsort", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Append log output to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sort every file under INPUT into OUTPUT
    Sort {
        input: PathBuf,
        output: PathBuf,

        /// Configuration file (defaults to .snapsortrc.toml, then ~/.config/snapsort/config.toml)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// File name pattern, e.g. YYYY_MM_DD_HHmmss
        #[arg(short, long)]
        pattern: Option<String>,

        /// Log what would happen without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Skip files smaller than this many megabytes
        #[arg(long, value_name = "MB")]
        min_size: Option<f64>,

        /// Skip images below this resolution, e.g. 1024x768
        #[arg(long, value_name = "WxH")]
        min_resolution: Option<String>,

        /// Write exif_data.csv into OUTPUT after sorting
        #[arg(long)]
        export_csv: bool,

        /// Downscale and recompress images while moving them
        #[arg(long)]
        optimize: bool,

        /// Number of files processed in parallel
        #[arg(short, long)]
        workers: Option<usize>,

        /// Sort files of any type, not just known photo and video formats
        #[arg(long)]
        all_types: bool,
    },
    /// Move every file recorded in OUTPUT's ledger back where it came from
    Restore { output: PathBuf },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Sort {
                input,
                output,
                config,
                pattern,
                dry_run,
                min_size,
                min_resolution,
                export_csv,
                optimize,
                workers,
                all_types,
            } => Command::Sort {
                input,
                output,
                config,
                overrides: Overrides {
                    filename_pattern: pattern,
                    dry_run,
                    min_size_mb: min_size,
                    min_resolution,
                    export_csv,
                    optimize_images: optimize,
                    workers,
                    all_types,
                },
            },
            Commands::Restore { output } => Command::Restore { output },
        }
    }
}

fn setup_logging(verbosity: u8, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Cannot open log file {}", path.display()))?;
        builder
            .filter_level(level.max(LevelFilter::Info))
            .target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("Logger already initialized")?;
    Ok(())
}

fn setup_shutdown_signal() -> anyhow::Result<Arc<AtomicBool>> {
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let signal_clone = Arc::clone(&shutdown_signal);

    ctrlc::set_handler(move || {
        signal_clone.store(true, Ordering::SeqCst);
        eprintln!("\nInterrupted, finishing files in progress...");
    })
    .context("Cannot install Ctrl-C handler")?;

    Ok(shutdown_signal)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = setup_logging(cli.verbose, cli.log_file.as_ref())
        .and_then(|()| setup_shutdown_signal())
        .and_then(|shutdown_signal| run_cli(cli.command.into(), shutdown_signal));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
