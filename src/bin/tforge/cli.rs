use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "tforge",
    about = "Training dataset construction from reactive MD trajectories",
    version,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a trajectory and report its chemical environment classes
    #[command(visible_alias = "s")]
    Scan(ScanArgs),

    /// Sample environments and write per-class descriptor files
    #[command(visible_alias = "b")]
    Build(BuildArgs),
}

/// Trajectory input options shared by all commands.
#[derive(Args)]
pub struct TrajectoryOptions {
    /// Trajectory file(s), streamed in order as one trajectory
    #[arg(short, long, value_name = "FILE", action = clap::ArgAction::Append, required = true)]
    pub input: Vec<PathBuf>,

    /// Trajectory format (inferred from extension if not specified)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<TrajectoryFormat>,

    /// Element names by atom type id (e.g. C,H,O)
    #[arg(short = 'a', long = "atom-names", value_name = "NAMES", value_delimiter = ',')]
    pub atom_names: Vec<String>,

    /// Pipeline configuration file (TOML); explicit flags take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Active-learning filter shared by scan and build.
#[derive(Args)]
#[command(next_help_heading = "Active-Learning Filter")]
pub struct FilterOptions {
    /// Per-atom model error file: one row of N floats per step
    #[arg(long = "error-file", value_name = "FILE")]
    pub error_file: Option<PathBuf>,

    /// Keep only atoms whose model error exceeds this threshold
    #[arg(long = "error-limit", value_name = "E", allow_hyphen_values = true)]
    pub error_limit: Option<f64>,
}

/// Sampling options (build command only).
#[derive(Args)]
#[command(next_help_heading = "Sampling")]
pub struct SamplingOptions {
    /// Neighbor cutoff radius for the environment descriptor (Å)
    #[arg(long, value_name = "Å")]
    pub cutoff: Option<f64>,

    /// Maximum samples retained per environment class
    #[arg(long, value_name = "N")]
    pub quota: Option<usize>,

    /// Selection policy within an over-quota class
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<PolicyArg>,
}

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub traj: TrajectoryOptions,

    #[command(flatten)]
    pub filter: FilterOptions,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub traj: TrajectoryOptions,

    /// Coordinate dump file(s) for the descriptor pass (defaults to the
    /// input when it is already dump-format)
    #[arg(long, value_name = "FILE", action = clap::ArgAction::Append)]
    pub coords: Vec<PathBuf>,

    #[command(flatten)]
    pub sampling: SamplingOptions,

    #[command(flatten)]
    pub filter: FilterOptions,

    /// Output directory for descriptor files
    #[arg(short, long = "out-dir", value_name = "DIR", default_value = "dataset")]
    pub out_dir: PathBuf,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrajectoryFormat {
    /// ReaxFF bond-list trajectory (`fix reaxff/bonds` output)
    Bond,
    /// LAMMPS coordinate dump (`ITEM:`-tagged sections)
    Dump,
}

impl From<TrajectoryFormat> for traj_forge::Format {
    fn from(format: TrajectoryFormat) -> Self {
        match format {
            TrajectoryFormat::Bond => Self::Bond,
            TrajectoryFormat::Dump => Self::Dump,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Evenly strided over the candidate list, endpoints included
    Stride,
    /// First Q candidates in (step, atom) order
    Leading,
}

impl From<PolicyArg> for traj_forge::SamplePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Stride => Self::Stride,
            PolicyArg::Leading => Self::Leading,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
