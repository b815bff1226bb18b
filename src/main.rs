use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use joinprobe::averager::{average_summary_files, write_entries, MissingValuePolicy};
use joinprobe::config::SweepConfig;
use joinprobe::cursor::{AnySession, SyntheticSession};
use joinprobe::shuffle::Shuffler;
use joinprobe::sweep::{SweepDriver, SweepReport};
use joinprobe::timer::{MonotonicClock, SimulatedClock};

#[derive(Parser, Debug)]
#[command(name = "joinprobe", version, about = "Checkpoint-timed join benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every variant of a sweep
    Sweep {
        /// Detail log (fills `{base}` in `detail_path`)
        detail: String,
        /// Summary output (fills `{base}` in `summary_path`)
        summary: String,
        /// Sweep configuration (JSON); built-in defaults if omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured database URL
        #[arg(long)]
        database: Option<String>,
        /// Skip the database: every query yields ROWS synthetic rows
        #[arg(long = "dry-run", value_name = "ROWS")]
        dry_run: Option<u64>,
        /// Simulated delay between synthetic rows
        #[arg(long = "row-delay-ms", default_value_t = 1)]
        row_delay_ms: u64,
    },
    /// Average `<key>\t<value>` summary files key by key
    Average {
        /// Where to write the averaged summary
        output: PathBuf,
        /// Summary files to average
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Count keys missing from a file as 0 instead of skipping them
        #[arg(long = "zero-missing")]
        zero_missing: bool,
        /// Average the files that have a key; write 0 only for keys no file has
        #[arg(long = "fill-zero", conflicts_with = "zero_missing")]
        fill_zero: bool,
    },
    /// Recreate shuffled copies `<table>1..=N` of base tables
    Shuffle {
        /// Database URL
        #[arg(long)]
        database: String,
        /// Base tables
        #[arg(long, num_args = 1.., required = true)]
        tables: Vec<String>,
        /// Number of copies per table
        #[arg(long, default_value_t = 3)]
        copies: u32,
    },
    /// Print the default configuration as JSON
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match Cli::parse().command {
        Command::Sweep {
            detail,
            summary,
            config,
            database,
            dry_run,
            row_delay_ms,
        } => {
            let mut config = match config {
                Some(path) => SweepConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => SweepConfig::default(),
            };
            if let Some(url) = database {
                config.database = url;
            }

            let report = if let Some(rows) = dry_run {
                let clock = SimulatedClock::new();
                let session =
                    SyntheticSession::new(clock.clone(), rows, Duration::from_millis(row_delay_ms));
                SweepDriver::new(config, session, clock)?.run(&detail, &summary)
            } else {
                let session = AnySession::connect(&config.database)
                    .with_context(|| format!("connecting to {}", config.database))?;
                SweepDriver::new(config, session, MonotonicClock::new())?.run(&detail, &summary)
            };
            check(&report)
        }
        Command::Average {
            output,
            inputs,
            zero_missing,
            fill_zero,
        } => {
            let policy = if zero_missing {
                MissingValuePolicy::Zero
            } else if fill_zero {
                MissingValuePolicy::FillZero
            } else {
                MissingValuePolicy::Skip
            };
            let entries = average_summary_files(&inputs, policy)?;
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            write_entries(&mut BufWriter::new(file), &entries)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(keys = entries.len(), files = inputs.len(), output = %output.display(), "averaged");
            Ok(())
        }
        Command::Shuffle {
            database,
            tables,
            copies,
        } => {
            let mut session = AnySession::connect(&database)
                .with_context(|| format!("connecting to {database}"))?;
            Shuffler::numbered(tables, copies)?.run(&mut session)?;
            Ok(())
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&SweepConfig::default())?);
            Ok(())
        }
    }
}

fn check(report: &SweepReport) -> Result<()> {
    if !report.variants.is_empty() && report.completed() == 0 {
        bail!("all {} variants failed", report.variants.len());
    }
    if let Some(failed) = report.summaries.iter().find(|s| s.error.is_some()) {
        bail!(
            "summary for {} could not be written: {}",
            failed.group,
            failed.error.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
