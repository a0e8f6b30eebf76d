use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{
    info,
    warn,
};

use peakscore::calculators::CalculatorId;
use peakscore::data_sources::{
    FeatureTable,
    read_chromatograms,
    read_document,
    read_feature_table,
    save_feature_table,
    write_document,
};
use peakscore::ml::{
    TrainingInput,
    train_discriminant,
};
use peakscore::models::{
    ChromatogramSnapshot,
    Document,
};
use peakscore::registry::{
    AddOutcome,
    PeakScoringModelList,
};
use peakscore::reintegration::{
    ExtractedFeatures,
    ReintegrationHandler,
    extract_units,
    scoring_units,
};
use peakscore::scoring::{
    LinearModelParams,
    PeakScoringModel,
    ScoringModelKind,
};

use crate::config::Config;
use crate::errors::CliError;

fn required(path: &Option<PathBuf>, what: &str, flag: &str) -> Result<PathBuf, CliError> {
    path.clone().ok_or_else(|| CliError::Config {
        source: format!(
            "No {} provided, please provide one in either the config file or with the {} flag",
            what, flag
        ),
    })
}

pub fn load_inputs(config: &Config) -> Result<(Arc<Document>, ChromatogramSnapshot), CliError> {
    let document_path = required(&config.input.document, "document", "--document")?;
    let chromatograms_path = required(&config.input.chromatograms, "chromatograms", "--chromatograms")?;
    let document = read_document(&document_path)?;
    let chromatograms = read_chromatograms(&chromatograms_path)?;
    Ok((Arc::new(document), chromatograms))
}

/// Feature extraction in chunks, with a progress bar. Parallelism happens
/// within each chunk.
pub fn extract_with_progress(
    document: &Document,
    chromatograms: &ChromatogramSnapshot,
    calculators: &[CalculatorId],
    chunk_size: usize,
) -> Result<ExtractedFeatures, CliError> {
    let start = Instant::now();
    let units = scoring_units(document);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_err(|e| CliError::Config {
        source: e.to_string(),
    })?;

    let mut scored = Vec::with_capacity(units.len());
    for chunk in units.chunks(chunk_size).progress_with_style(style) {
        let out = extract_units(document, chromatograms, calculators, chunk)
            .map_err(peakscore::errors::PeakScoringError::from)?;
        scored.extend(out);
    }
    let features = ExtractedFeatures::from_units(calculators.to_vec(), scored);
    info!(
        "Extracted {} units ({} targets, {} decoys) in {:?}",
        features.num_units(),
        features.targets.len(),
        features.decoys.len(),
        start.elapsed()
    );
    Ok(features)
}

fn store_model(config: &Config, model: PeakScoringModel) -> Result<(), CliError> {
    let path = &config.registry.path;
    let mut registry = PeakScoringModelList::load(path)?;
    let name = model.name().to_string();
    let outcome = registry.add(model, config.registry.conflict_policy)?;
    if outcome == AddOutcome::Skipped {
        warn!("Model {} already in the registry, left unchanged", name);
    }
    registry.save(path)?;
    info!("{:?} model {} in {}", outcome, name, path.display());
    Ok(())
}

fn report_model(model: &PeakScoringModel, contributions: &[f64]) {
    println!("Model {} ({})", model.name(), model.kind());
    for (cw, pct) in model.calculator_weights().iter().zip(contributions.iter()) {
        if cw.weight.is_nan() {
            println!("  {:<40} {:>12}", cw.calculator.header_name(), "disabled");
        } else {
            println!(
                "  {:<40} {:>12.4} {:>8.1}%",
                cw.calculator.header_name(),
                cw.weight,
                pct * 100.0
            );
        }
    }
    if let Some(params) = model.parameters() {
        println!("  {:<40} {:>12.4}", "bias", params.bias());
    }
    if model.colinear_warning() {
        println!("  Some calculators are colinear, weights were regularized");
    }
}

/// Weights of a stored mProphet model with the same name, carried over to
/// the current calculators. Retraining starts from them.
fn stored_seed(config: &Config, model_name: &str) -> Result<Option<LinearModelParams>, CliError> {
    if config.training.kind != ScoringModelKind::MProphet {
        return Ok(None);
    }
    let registry = PeakScoringModelList::load(&config.registry.path)?;
    let stored = match registry.get(model_name) {
        Some(x) if x.kind() == config.training.kind => x,
        _ => return Ok(None),
    };
    let upgraded = stored.upgrade_calculators();
    if upgraded.calculators() != stored.calculators() {
        info!(
            "Stored model {} moved from {} to {} calculators",
            model_name,
            stored.calculators().len(),
            upgraded.calculators().len()
        );
    }
    Ok(upgraded.parameters().cloned())
}

pub fn train_from_document(config: &Config, model_name: &str) -> Result<(), CliError> {
    let (document, chromatograms) = load_inputs(config)?;
    let model = PeakScoringModel::new(model_name, config.training.kind)
        .with_uses_decoys(config.training.uses_decoys)
        .with_uses_second_best(config.training.uses_second_best);
    let features = extract_with_progress(
        &document,
        &chromatograms,
        model.calculators(),
        config.chunk_size,
    )?;
    let enabled = config.training.enabled_mask(model.calculators())?;
    let mut options = config.training.options();
    options.seed = stored_seed(config, model_name)?;
    let (trained, report) = model.train(&features.targets, &features.decoys, &enabled, &options)?;
    info!(
        "Training finished after {} iterations (converged: {})",
        report.iterations, report.converged
    );
    report_model(&trained, &report.percent_contributions);
    store_model(config, trained)
}

pub fn train_from_table(config: &Config, path: &Path, model_name: &str) -> Result<(), CliError> {
    let table: FeatureTable = read_feature_table(path)?;
    let options = config.training.options();

    if let Some(calculators) = table.calculators() {
        let model = PeakScoringModel::with_calculator_list(model_name, config.training.kind, calculators)
            .with_uses_decoys(config.training.uses_decoys)
            .with_uses_second_best(config.training.uses_second_best);
        let enabled = config.training.enabled_mask(model.calculators())?;
        let (trained, report) = model.train(&table.targets, &table.decoys, &enabled, &options)?;
        report_model(&trained, &report.percent_contributions);
        return store_model(config, trained);
    }

    // Columns that are not calculators can still be weighted, just not stored.
    warn!("Feature columns do not all name calculators, the weights will only be reported");
    let enabled = vec![true; table.columns.len()];
    let input = TrainingInput {
        targets: &table.targets,
        decoys: &table.decoys,
        names: &table.columns,
        enabled: &enabled,
        uses_decoys: config.training.uses_decoys,
        uses_second_best: config.training.uses_second_best,
    };
    let outcome = train_discriminant(&input, &options)?;
    println!("Weights for {}", path.display());
    for ((name, w), pct) in table
        .columns
        .iter()
        .zip(outcome.params.weights().iter())
        .zip(outcome.report.percent_contributions.iter())
    {
        println!("  {:<40} {:>12.4} {:>8.1}%", name, w, pct * 100.0);
    }
    println!("  {:<40} {:>12.4}", "bias", outcome.params.bias());
    Ok(())
}

fn find_model(
    config: &Config,
    name: Option<&str>,
    document: &Document,
) -> Result<Arc<PeakScoringModel>, CliError> {
    match name {
        Some(name) => {
            let registry = PeakScoringModelList::load(&config.registry.path)?;
            let model = registry.get(name).ok_or_else(|| CliError::Config {
                source: format!(
                    "The peak scoring model {} does not exist in {}",
                    name,
                    config.registry.path.display()
                ),
            })?;
            Ok(Arc::new(model.clone()))
        }
        None => document
            .settings
            .peak_scoring_model
            .clone()
            .ok_or_else(|| CliError::Config {
                source: "No model bound to the document, please name one with --model-name"
                    .to_string(),
            }),
    }
}

pub fn reintegrate(config: &Config) -> Result<(), CliError> {
    let (document, chromatograms) = load_inputs(config)?;
    let model = find_model(config, config.reintegration.model_name.as_deref(), &document)?;
    let output = config.output.as_ref().ok_or_else(|| CliError::Config {
        source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
    })?;
    std::fs::create_dir_all(&output.directory).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(output.directory.to_string_lossy().to_string()),
    })?;

    let features = extract_with_progress(
        &document,
        &chromatograms,
        model.calculators(),
        config.chunk_size,
    )?;
    let handler = ReintegrationHandler::from_features(
        Arc::clone(&document),
        &chromatograms,
        model,
        config.reintegration.options.clone(),
        features,
    )?;

    let q_cutoff = config.reintegration.q_cutoff;
    let out = handler.change_peaks(q_cutoff);
    let summary = handler.summary(q_cutoff);
    if Arc::ptr_eq(&out, &document) {
        println!("No peaks changed");
    }
    println!(
        "Kept {} of {} units at q <= {} ({} cleared, {} manual)",
        summary.kept, summary.units, q_cutoff, summary.cleared, summary.manual_skipped
    );

    write_document(&output.directory.join("document.json"), &out)?;
    if config.reintegration.write_scores {
        let path = output.directory.join("peak_scores.tsv");
        let file = std::fs::File::create(&path).map_err(|e| CliError::Io {
            source: e.to_string(),
            path: Some(path.to_string_lossy().to_string()),
        })?;
        let rows = handler.write_scores(std::io::BufWriter::new(file))?;
        info!("Wrote {} peak scores to {}", rows, path.display());
    }
    Ok(())
}

pub fn show(config: &Config, model_name: &str) -> Result<(), CliError> {
    let registry = PeakScoringModelList::load(&config.registry.path)?;
    let model = registry.get(model_name).ok_or_else(|| CliError::Config {
        source: format!("The peak scoring model {} does not exist", model_name),
    })?;

    // Contributions need target peaks to average over.
    let contributions = match (&config.input.document, &config.input.chromatograms) {
        (Some(_), Some(_)) if model.is_trained() => {
            let (document, chromatograms) = load_inputs(config)?;
            let features = extract_with_progress(
                &document,
                &chromatograms,
                model.calculators(),
                config.chunk_size,
            )?;
            let handler = ReintegrationHandler::from_features(
                document,
                &chromatograms,
                Arc::new(model.clone()),
                config.reintegration.options.clone(),
                features,
            )?;
            handler.percent_contributions()
        }
        _ => vec![f64::NAN; model.calculators().len()],
    };
    report_model(model, &contributions);
    Ok(())
}

pub fn export_features(
    config: &Config,
    model_name: Option<&str>,
    path: &Path,
) -> Result<(), CliError> {
    let (document, chromatograms) = load_inputs(config)?;
    let calculators = match model_name {
        Some(_) => find_model(config, model_name, &document)?.calculators().to_vec(),
        None => config.training.kind.default_calculators(),
    };
    let features = extract_with_progress(&document, &chromatograms, &calculators, config.chunk_size)?;
    save_feature_table(path, &calculators, &[&features.targets, &features.decoys])?;
    Ok(())
}
