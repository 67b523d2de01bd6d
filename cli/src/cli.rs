use std::path::PathBuf;

/// Spatial block imputation CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "blockfill", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Impute missing block attributes and write them as CSV
    Impute(ImputeArgs),

    /// Hide a random share of complete blocks, impute them and print error metrics
    Evaluate(EvaluateArgs),
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyName {
    Mean,
    Knn,
    Idw,
    Spacematrix,
    Nmf,
}

/// Strategy selection shared by every subcommand.
#[derive(clap::Args, Debug)]
pub struct StrategyArgs {
    /// Imputation strategy; parameters come from --config when it names the same strategy
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyName>,

    /// JSON imputer configuration (features and strategy parameters)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ImputeArgs {
    /// Input block table (CSV with id, centroid_x, centroid_y, site_area, ...)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    #[command(flatten)]
    pub strategy: StrategyArgs,

    /// Block ids to impute, defaults to every block with a missing feature
    #[arg(long, value_delimiter = ',')]
    pub ids: Option<Vec<i64>>,

    /// Output CSV file, defaults to "./imputed.csv"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct EvaluateArgs {
    /// Input block table (CSV with id, centroid_x, centroid_y, site_area, ...)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    #[command(flatten)]
    pub strategy: StrategyArgs,

    /// Share of complete blocks to hide, in (0, 1)
    #[arg(long, default_value_t = 0.2)]
    pub holdout: f64,

    /// Seed for choosing the hidden blocks
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
