//! femto-skim: command-line front-end
//!
//! Composes selection bitmasks from a cut layout file, and skims events into
//! derived tables. See the library documentation for the big picture.

use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};

use femto_skim::{
    bitmask::BitmaskBuilder,
    config::{self, SkimConfig},
    layout::CutLayout,
    numeric::Float,
    particle::Event,
    random::DEFAULT_SEED,
    report, scheduling,
    skim::Skimmer,
    Result,
};

use std::{fs::File, io::BufReader, path::{Path, PathBuf}, time::Instant};

#[derive(Parser)]
#[command(name = "femto-skim")]
#[command(about = "Selection bitmasks and derived tables for femtoscopy")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the bitmask of one manual choice of thresholds
    Manual {
        /// Cut layout file
        #[arg(short, long)]
        layout: PathBuf,

        /// Species whose layout should be used
        #[arg(short, long)]
        species: String,

        /// Chosen threshold, as `criterion=value` (repeatable)
        #[arg(long = "select", value_parser = parse_choice)]
        choices: Vec<(String, Float)>,
    },

    /// Enumerate the bitmasks of systematic variations
    Variations {
        /// Cut layout file
        #[arg(short, long)]
        layout: PathBuf,

        /// Species whose layout should be used
        #[arg(short, long)]
        species: String,

        /// Candidate thresholds, as `criterion=v1,v2,...` (repeatable)
        #[arg(long = "vary", value_parser = parse_candidates)]
        candidates: Vec<(String, Vec<Float>)>,

        /// Draw this many random combinations instead of enumerating them all
        #[arg(long)]
        sample: Option<usize>,

        /// Seed of the random draws
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Output file
        #[arg(short, long, default_value = "CutCulator.txt")]
        output: PathBuf,
    },

    /// Skim events into derived tables
    Skim {
        /// Producer configuration file. Defaults to built-in settings.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input events (JSON array)
        #[arg(short, long)]
        input: PathBuf,

        /// Output derived tables (pretty JSON)
        #[arg(short, long, default_value = "derived.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Manual { layout, species, choices } => cmd_manual(&layout, &species, &choices),
        Commands::Variations { layout, species, candidates, sample, seed, output } => {
            cmd_variations(&layout, &species, &candidates, sample, seed, &output)
        }
        Commands::Skim { config, input, output } => cmd_skim(config.as_deref(), &input, &output),
    }
}

/// Parse a `criterion=value` argument
fn parse_choice(arg: &str) -> std::result::Result<(String, Float), String> {
    let (name, value) = arg.split_once('=').ok_or("expected `criterion=value`")?;
    let value = value.trim().parse::<Float>().map_err(|e| format!("bad threshold `{value}`: {e}"))?;
    Ok((name.trim().to_owned(), value))
}

/// Parse a `criterion=v1,v2,...` argument
fn parse_candidates(arg: &str) -> std::result::Result<(String, Vec<Float>), String> {
    let (name, values) = arg.split_once('=').ok_or("expected `criterion=v1,v2,...`")?;
    let values = values
        .split(',')
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().parse::<Float>().map_err(|e| format!("bad threshold `{v}`: {e}")))
        .collect::<std::result::Result<Vec<Float>, String>>()?;
    Ok((name.trim().to_owned(), values))
}

/// Load a layout file and pick the layout of one species
fn load_layout(path: &Path, species: &str) -> Result<CutLayout> {
    config::load_layouts(path)?
        .into_iter()
        .find(|layout| layout.species() == species)
        .ok_or_else(|| eyre!("No layout for species `{}` in {}", species, path.display()))
}

fn cmd_manual(layout: &Path, species: &str, choices: &[(String, Float)]) -> Result<()> {
    let layout = load_layout(layout, species)?;
    let variation = BitmaskBuilder::new(&layout).manual(choices)?;
    tracing::info!(bits = variation.bits, "manual selection");
    println!("{}", variation);
    Ok(())
}

fn cmd_variations(
    layout: &Path,
    species: &str,
    candidates: &[(String, Vec<Float>)],
    sample: Option<usize>,
    seed: u64,
    output: &Path,
) -> Result<()> {
    let layout = load_layout(layout, species)?;
    let builder = BitmaskBuilder::new(&layout);
    let count = match sample {
        Some(count) => {
            tracing::info!(count, seed, "drawing random variations");
            report::write_variations(output, &layout, builder.sample(candidates, count, seed)?)?
        }
        None => {
            let variations = builder.variations(candidates)?;
            tracing::info!(total = variations.total(), "enumerating variations");
            report::write_variations(output, &layout, variations)?
        }
    };
    println!("Wrote {} variations to {}", count, output.display());
    Ok(())
}

fn cmd_skim(config_path: Option<&Path>, input: &Path, output: &Path) -> Result<()> {
    let cfg = match config_path {
        Some(path) => SkimConfig::load(path).wrap_err("Failed to load the configuration")?,
        None => {
            let cfg = SkimConfig::default();
            cfg.log();
            cfg
        }
    };

    let file = File::open(input)
        .wrap_err_with(|| format!("Failed to open input file {}", input.display()))?;
    let events: Vec<Event> = serde_json::from_reader(BufReader::new(file))
        .wrap_err_with(|| format!("Failed to decode events from {}", input.display()))?;

    // Start the clock after input I/O
    let saved_time = Instant::now();

    let skimmer = Skimmer::new(&cfg);
    let results = scheduling::run_skim(&events, |batch| skimmer.process_all(batch));

    let elapsed_time = saved_time.elapsed();

    report::write_tables(output, &results.tables)?;
    report::write_summary(&mut std::io::stdout().lock(), &results.stats, elapsed_time)?;
    Ok(())
}
