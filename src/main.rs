use clap::{Parser, Subcommand};
use env_logger::Env;
use log::LevelFilter;
use midi2tokens::{validate_input, Config, Encoding, Pipeline, PreprocessOptions, ProgressHandle, Split};
use std::path::PathBuf;

/// MIDI → token dataset preparation
#[derive(Parser)]
#[command(name = "midi2tokens")]
#[command(about = "Prepare MIDI corpora as compound tokens and event-token training sequences")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every .mid/.midi file under a directory to compound tokens
    Preprocess {
        /// Directory containing MIDI files (searched recursively)
        dir: PathBuf,

        /// Add a synthetic drum track underneath each file
        #[arg(long)]
        add_drum: bool,

        /// Log every failed file with the full error
        #[arg(long)]
        debug: bool,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Tokenize the Train/Test/Validation splits of a preprocessed dataset
    Tokenize {
        /// Directory containing the preprocessed splits
        datadir: PathBuf,

        /// Dataset augmentation factor for the training split (multiple of 10)
        #[arg(short = 'k', long, default_value_t = 1)]
        augment: u32,

        /// Use interarrival-time encoding (defaults to arrival-time)
        #[arg(short, long)]
        interarrival: bool,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    builder.parse_env(Env::default());
    let _ = builder.try_init();
}

fn load_or_default(config: Option<PathBuf>) -> anyhow::Result<Config> {
    match config {
        Some(path) => midi2tokens::config::load_config(path),
        None => Ok(Config::default()),
    }
}

fn progress_for(quiet: bool) -> ProgressHandle {
    if quiet {
        ProgressHandle::hidden()
    } else {
        ProgressHandle::new()
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Preprocess {
            dir,
            add_drum,
            debug,
            config,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose || debug, quiet);
            if !debug {
                midi2tokens::quiet_worker_panics();
            }

            let config = load_or_default(config)?;
            validate_input(&dir, &config)?;

            let pipeline = Pipeline::with_progress(config, progress_for(quiet));
            let files = pipeline.discover(&dir)?;

            if !quiet {
                println!(
                    "Preprocessing {} files with {} workers",
                    files.len(),
                    pipeline.config().preprocess.workers
                );
            }

            let summary = pipeline.preprocess(&files, PreprocessOptions { add_drum, debug })?;
            println!("{}", summary);
        }
        Commands::Tokenize {
            datadir,
            augment,
            interarrival,
            config,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            let config = load_or_default(config)?;
            validate_input(&datadir, &config)?;

            let encoding = if interarrival {
                Encoding::Interarrival
            } else {
                Encoding::Arrival
            };

            if !quiet {
                let tok = &config.tokenize;
                println!("Tokenizing MIDI dataset");
                println!("  encoding type: {}", encoding.name());
                println!("  train split: {}", Split::Train.name());
                println!("  validation split: {}", Split::Validation.name());
                println!("  test split: {}", Split::Test.name());
                println!("Tokenization parameters:");
                println!("  anticipation interval = {}s", tok.anticipation_interval_seconds);
                println!("  augment = {}x", augment);
                println!("  max track length = {}s", tok.max_track_time_seconds);
                println!("  min track length = {}s", tok.min_track_time_seconds);
                println!("  min track events = {}", tok.min_track_events);
            }

            let pipeline = Pipeline::with_progress(config, progress_for(quiet));
            let report = pipeline.tokenize(&datadir, augment, encoding)?;

            println!("{}", report);
            if !quiet {
                println!("Remember to shuffle the training split!");
            }
        }
        Commands::ValidateConfig { config } => {
            let config = midi2tokens::config::load_config(config)?;
            println!("Configuration is valid");
            if let Ok(json) = serde_json::to_string_pretty(&config) {
                println!("{}", json);
            }
        }
        Commands::ShowConfig => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
