mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::{
    Cli,
    Command,
};
use config::{
    Config,
    OutputConfig,
};
use peakscore::scoring::ScoringModelKind;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let args = Cli::parse();

    match args.command {
        Command::Train(args) => {
            let mut config = Config::load(&args.common)?;
            if let Some(name) = args.model_name {
                config.training.model_name = name;
            }
            if args.legacy {
                config.training.kind = ScoringModelKind::Legacy;
            }
            if args.second_best {
                config.training.uses_second_best = true;
            }
            if let Some(features) = args.features {
                config.input.features = Some(features);
            }
            info!("Parsed configuration: {:#?}", config);

            let name = config.training.model_name.clone();
            match config.input.features.clone() {
                Some(path) => processing::train_from_table(&config, &path, &name)?,
                None => processing::train_from_document(&config, &name)?,
            }
        }
        Command::Reintegrate(args) => {
            let mut config = Config::load(&args.common)?;
            if let Some(name) = args.model_name {
                config.reintegration.model_name = Some(name);
            }
            if let Some(q_cutoff) = args.q_cutoff {
                config.reintegration.q_cutoff = q_cutoff;
            }
            if args.overwrite_manual {
                config.reintegration.options.overwrite_manual = true;
            }
            if args.write_scores {
                config.reintegration.write_scores = true;
            }
            if let Some(directory) = args.output_dir {
                config.output = Some(OutputConfig { directory });
            }
            info!("Parsed configuration: {:#?}", config);
            processing::reintegrate(&config)?;
        }
        Command::Show(args) => {
            let config = Config::load(&args.common)?;
            processing::show(&config, &args.model_name)?;
        }
        Command::Export(args) => {
            let mut config = Config::load(&args.common)?;
            if args.legacy {
                config.training.kind = ScoringModelKind::Legacy;
            }
            info!("Parsed configuration: {:#?}", config);
            processing::export_features(&config, args.model_name.as_deref(), &args.output)?;
        }
    }

    Ok(())
}
