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
    author = "GEODES contributors",
    version,
    about = "GEODES CLI - Geometric descriptors (helix axes, curvature, bend angles, charge clamps) for batches of protein structures.",
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

    /// Number of structures processed in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute helix and charge clamp descriptors for every input structure.
    Describe(DescribeArgs),
    /// Superpose structures onto a reference and compare their helix axes.
    Compare(CompareArgs),
}

/// Options shared by every descriptor command.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// PDB files or directories of PDB files (directories are read in file-name order).
    #[arg(required = true, value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Path of the CSV table to write.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Protein profile supplying reference helix windows and clamp residues.
    /// Either a built-in name (e.g. 'hvdr') or a path to a profile TOML file.
    #[arg(short, long, value_name = "NAME_OR_PATH")]
    pub profile: Option<String>,

    // --- Helix Overrides ---
    /// Residues trimmed from the start of each helix (negative values extend it).
    #[arg(long, value_name = "INT", allow_negative_numbers = true)]
    pub start_offset: Option<isize>,

    /// Residues trimmed from the end of each helix (negative values extend it).
    #[arg(long, value_name = "INT", allow_negative_numbers = true)]
    pub end_offset: Option<isize>,

    /// Minimum number of residues in a helix segment.
    #[arg(long, value_name = "INT")]
    pub min_length: Option<usize>,

    /// RMS residual (Å) above which a curved axis is fitted.
    #[arg(long, value_name = "FLOAT")]
    pub curvature_tolerance: Option<f64>,

    // --- Clamp Overrides ---
    /// Maximum distance (Å) between charged groups of a clamp pair.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub threshold: Option<f64>,

    /// Restrict the analysis to these chains (comma separated, e.g. A,B).
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub chains: Vec<char>,

    // --- Tools and Output ---
    /// DSSP executable used for secondary structure assignment.
    #[arg(long, value_name = "PATH")]
    pub dssp: Option<PathBuf>,

    /// Output table layout: 'per-structure' or 'per-descriptor'.
    #[arg(long, value_name = "LAYOUT")]
    pub layout: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S clamp.distance-threshold=5.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    pub set_values: Vec<String>,
}

/// Arguments for the `describe` subcommand.
#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for the `compare` subcommand.
#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Identifier (file stem) of the reference structure. Defaults to the first input.
    #[arg(short, long, value_name = "ID")]
    pub reference: Option<String>,

    /// External structural aligner executable. Without it, the built-in
    /// CA-based Kabsch superposition is used.
    #[arg(long, value_name = "PATH")]
    pub aligner: Option<PathBuf>,
}
