use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

use peakscore::calculators::CalculatorId;
use peakscore::ml::{
    Subsample,
    TrainingOptions,
};
use peakscore::registry::ConflictPolicy;
use peakscore::reintegration::ReintegrationOptions;
use peakscore::scoring::ScoringModelKind;

use crate::cli::CommonArgs;
use crate::errors::CliError;

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub reintegration: ReintegrationConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub output: Option<OutputConfig>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    2000
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct InputConfig {
    pub document: Option<PathBuf>,
    pub chromatograms: Option<PathBuf>,
    pub features: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    pub model_name: String,
    pub kind: ScoringModelKind,
    pub uses_decoys: bool,
    pub uses_second_best: bool,
    /// Calculator names left out of training.
    pub disabled_calculators: Vec<String>,
    pub max_iterations: usize,
    pub initial_q_cutoff: f64,
    pub q_cutoff: f64,
    /// Part of the units used for training.
    pub subsample: Subsample,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let options = TrainingOptions::default();
        Self {
            model_name: "default".to_string(),
            kind: ScoringModelKind::default(),
            uses_decoys: true,
            uses_second_best: false,
            disabled_calculators: Vec::new(),
            max_iterations: options.max_iterations,
            initial_q_cutoff: options.initial_q_cutoff,
            q_cutoff: options.q_cutoff,
            subsample: options.subsample,
        }
    }
}

impl TrainingConfig {
    pub fn options(&self) -> TrainingOptions {
        TrainingOptions {
            max_iterations: self.max_iterations,
            initial_q_cutoff: self.initial_q_cutoff,
            q_cutoff: self.q_cutoff,
            subsample: self.subsample,
            ..Default::default()
        }
    }

    /// Mask over `calculators`, false for every disabled name.
    pub fn enabled_mask(&self, calculators: &[CalculatorId]) -> Result<Vec<bool>, CliError> {
        let mut disabled = Vec::with_capacity(self.disabled_calculators.len());
        for name in self.disabled_calculators.iter() {
            match CalculatorId::from_name(name) {
                Some(x) => disabled.push(x),
                None => {
                    return Err(CliError::Config {
                        source: format!("Unknown calculator {} in disabled_calculators", name),
                    });
                }
            }
        }
        Ok(calculators.iter().map(|c| !disabled.contains(c)).collect())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReintegrationConfig {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default = "default_q_cutoff")]
    pub q_cutoff: f64,
    #[serde(default)]
    pub write_scores: bool,
    #[serde(flatten)]
    pub options: ReintegrationOptions,
}

fn default_q_cutoff() -> f64 {
    0.01
}

impl Default for ReintegrationConfig {
    fn default() -> Self {
        Self {
            model_name: None,
            q_cutoff: default_q_cutoff(),
            write_scores: false,
            options: ReintegrationOptions::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("peak_scoring_models.json")
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    /// Read the config file if one was given, then apply the shared flags.
    pub fn load(args: &CommonArgs) -> Result<Self, CliError> {
        let mut config = match &args.config {
            Some(path) => {
                let conf = std::fs::File::open(path).map_err(|e| CliError::Io {
                    source: e.to_string(),
                    path: Some(path.to_string_lossy().to_string()),
                })?;
                serde_json::from_reader(conf)
                    .map_err(|e| CliError::ParseError { msg: e.to_string() })?
            }
            None => Config::default(),
        };

        if let Some(document) = &args.document {
            config.input.document = Some(document.clone());
        }
        if let Some(chromatograms) = &args.chromatograms {
            config.input.chromatograms = Some(chromatograms.clone());
        }
        if let Some(registry) = &args.registry {
            config.registry.path = registry.clone();
        }
        if config.chunk_size == 0 {
            return Err(CliError::Config {
                source: "chunk_size must be larger than 0".to_string(),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peakscore::ml::QValueMode;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "training": {"model_name": "run1", "kind": "legacy"},
            "reintegration": {"q_cutoff": 0.05, "q_value_mode": {"type": "storey", "lambda": 0.5}},
            "registry": {"conflict_policy": "overwrite"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.training.model_name, "run1");
        assert_eq!(config.training.kind, ScoringModelKind::Legacy);
        assert!(config.training.uses_decoys);
        assert_eq!(config.training.max_iterations, 10);
        assert_eq!(config.reintegration.q_cutoff, 0.05);
        assert_eq!(
            config.reintegration.options.q_value_mode,
            QValueMode::Storey { lambda: 0.5 }
        );
        assert_eq!(config.registry.conflict_policy, ConflictPolicy::Overwrite);
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.training.options().subsample, Subsample::All);

        let json = r#"{"training": {"subsample": {"random_half": {"seed": 3}}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.training.options().subsample,
            Subsample::RandomHalf { seed: 3 }
        );
    }

    #[test]
    fn test_enabled_mask() {
        let config = TrainingConfig {
            disabled_calculators: vec!["weighted_shape".to_string()],
            ..Default::default()
        };
        let calculators = [CalculatorId::MQuestIntensity, CalculatorId::MQuestWeightedShape];
        assert_eq!(config.enabled_mask(&calculators).unwrap(), vec![true, false]);

        let bad = TrainingConfig {
            disabled_calculators: vec!["nope".to_string()],
            ..Default::default()
        };
        assert!(bad.enabled_mask(&calculators).is_err());
    }
}
