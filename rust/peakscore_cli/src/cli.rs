use clap::{
    Args,
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train a peak scoring model and store it in the registry
    Train(TrainArgs),
    /// Pick the peaks of a document with a trained model
    Reintegrate(ReintegrateArgs),
    /// Print the weights of a stored model
    Show(ShowArgs),
    /// Write the features of every candidate peak as an mProphet table
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the document JSON (will over-write the config file)
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Path to the chromatograms, JSON or NDJSON (will over-write the config file)
    #[arg(long)]
    pub chromatograms: Option<PathBuf>,

    /// Path to the model registry (will over-write the config file)
    #[arg(short, long)]
    pub registry: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Train from an mProphet feature table instead of a document
    #[arg(short, long)]
    pub features: Option<PathBuf>,

    /// Name of the trained model
    #[arg(short = 'n', long)]
    pub model_name: Option<String>,

    /// Use the legacy fixed-weight model
    #[arg(long)]
    pub legacy: bool,

    /// Use second best peaks as negatives
    #[arg(long)]
    pub second_best: bool,
}

#[derive(Args, Debug)]
pub struct ReintegrateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Registry model to use, defaults to the model bound to the document
    #[arg(short = 'n', long)]
    pub model_name: Option<String>,

    /// Q-value cutoff for keeping a peak
    #[arg(short, long)]
    pub q_cutoff: Option<f64>,

    /// Also replace peaks picked by hand
    #[arg(long)]
    pub overwrite_manual: bool,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Also write per peak scores as TSV
    #[arg(long)]
    pub write_scores: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Name of the model to show
    pub model_name: String,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Registry model whose calculators are exported, defaults to the
    /// default calculators of the configured model kind
    #[arg(short = 'n', long)]
    pub model_name: Option<String>,

    /// Use the legacy calculators
    #[arg(long)]
    pub legacy: bool,

    /// Path of the TSV table to write
    #[arg(short, long)]
    pub output: PathBuf,
}
