use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "modgrid - Lays out technology modules on a ship grid with simulated annealing, as a one-shot command or as a streaming job server.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to verify golden fixtures in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve optimization jobs over TCP with streamed progress.
    Serve(ServeArgs),
    /// Optimize one tech on one ship and write the resulting grid as JSON.
    Optimize(OptimizeArgs),
    /// Generate or verify golden fixtures.
    Golden(GoldenArgs),
    /// List the ships and techs of the module catalog.
    Catalog(CatalogArgs),
}

/// Options shared by every command that runs the optimizer.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Module catalog to load instead of the built-in one.
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Seed for the random number generator. Makes runs reproducible.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Wall-clock budget of a single optimization, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub time_budget: Option<f64>,

    /// Stop after this many annealing steps.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<u64>,

    /// Override a configuration value, e.g. `-S annealing.cooling-rate=0.9`.
    /// May be given multiple times.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Address to listen on, e.g. 127.0.0.1:7878.
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Arguments for the `optimize` subcommand.
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Ship type, as listed by `modgrid catalog`.
    #[arg(long, required = true)]
    pub ship: String,

    /// Tech to place.
    #[arg(long, required = true)]
    pub tech: String,

    /// Grid to start from, as grid JSON. Defaults to the ship's layout.
    #[arg(short, long, value_name = "PATH")]
    pub grid: Option<PathBuf>,

    /// Where to write the optimized grid. Prints to stdout when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Reward module owned by the player. May be given multiple times.
    #[arg(long = "reward", value_name = "ID")]
    pub rewards: Vec<String>,

    /// Restrict candidates to this module id. May be given multiple times.
    #[arg(long = "module", value_name = "ID")]
    pub modules: Vec<String>,

    /// Clear modules of other techs instead of working around them.
    #[arg(long)]
    pub forced: bool,

    /// Restrict the search to a compact window of the grid.
    #[arg(long)]
    pub window_sizing: bool,
}

/// Arguments for the `golden` subcommand.
#[derive(Args, Debug)]
pub struct GoldenArgs {
    #[command(subcommand)]
    pub command: GoldenCommands,
}

#[derive(Subcommand, Debug)]
pub enum GoldenCommands {
    /// Run the optimizer with a fixed seed and record inputs and output.
    Generate {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(long, required = true)]
        ship: String,

        #[arg(long, required = true)]
        tech: String,

        /// Path of the fixture file to write.
        #[arg(short, long, required = true, value_name = "PATH")]
        output: PathBuf,
    },
    /// Replay fixtures and compare against their recorded output.
    Verify {
        /// Fixture files to check.
        #[arg(required = true, value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Allowed absolute difference between recorded and replayed scores.
        #[arg(long, default_value_t = modgrid::workflows::golden::DEFAULT_TOLERANCE)]
        tolerance: f64,
    },
}

/// Arguments for the `catalog` subcommand.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Module catalog to list instead of the built-in one.
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Only list the techs of this ship.
    #[arg(long)]
    pub ship: Option<String>,
}
