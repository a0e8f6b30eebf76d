use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

use super::linear_model::LinearModelParams;
use super::record::ScoringModelRecord;
use crate::calculators::CalculatorId;
use crate::errors::{
    DataProcessingError,
    ModelFormatError,
    PeakScoringError,
    RegistryError,
    TrainingError,
};
use crate::ml::{
    QValueEstimator,
    TrainingInput,
    TrainingOptions,
    TrainingReport,
    train_discriminant,
    train_fixed_weights,
};
use crate::models::ScoredGroupPeaksSet;
use crate::registry::{
    Mergeable,
    Named,
    Stored,
};

/// Which default calculators and which training policy a model uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringModelKind {
    /// Fixed heuristic weights, only rescaled against the negatives.
    Legacy,
    /// Weights learned by iterative discriminant training.
    #[default]
    MProphet,
}

impl ScoringModelKind {
    pub fn default_calculators(&self) -> Vec<CalculatorId> {
        match self {
            ScoringModelKind::Legacy => CalculatorId::legacy_defaults(),
            ScoringModelKind::MProphet => CalculatorId::mprophet_defaults(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringModelKind::Legacy => "legacy",
            ScoringModelKind::MProphet => "mprophet",
        }
    }
}

impl std::fmt::Display for ScoringModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Weight of a calculator in the legacy heuristic score.
fn heuristic_weight(calculator: CalculatorId) -> Option<f64> {
    match calculator {
        CalculatorId::LegacyLogUnforcedArea => Some(1.0),
        CalculatorId::LegacyUnforcedCountScore => Some(1.0),
        CalculatorId::LegacyUnforcedCountScoreStandard => Some(1.0),
        CalculatorId::LegacyIdentifiedCount => Some(3.0),
        CalculatorId::LegacyIdentifiedCountStandard => Some(3.0),
        _ => None,
    }
}

/// Legacy heuristic weights laid out over `calculators`, NaN where the
/// heuristic has no opinion.
pub fn heuristic_params(calculators: &[CalculatorId]) -> LinearModelParams {
    let weights = calculators
        .iter()
        .map(|c| heuristic_weight(*c).unwrap_or(f64::NAN))
        .collect();
    LinearModelParams::new(weights, 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculatorWeight {
    pub calculator: CalculatorId,
    /// NaN for a disabled calculator.
    pub weight: f64,
}

/// A named, optionally trained linear peak scoring model.
///
/// The model lists the calculators it was built for. Feature vectors handed
/// to [PeakScoringModel::score] must follow that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ScoringModelRecord", into = "ScoringModelRecord")]
pub struct PeakScoringModel {
    name: String,
    kind: ScoringModelKind,
    calculators: Vec<CalculatorId>,
    parameters: Option<LinearModelParams>,
    uses_decoys: bool,
    uses_second_best: bool,
    decoy_mean: f64,
    decoy_stdev: f64,
    colinear_warning: bool,
}

impl PeakScoringModel {
    /// An untrained model over the default calculators of `kind`.
    pub fn new(name: impl Into<String>, kind: ScoringModelKind) -> Self {
        Self::with_calculator_list(name, kind, kind.default_calculators())
    }

    pub fn with_calculator_list(
        name: impl Into<String>,
        kind: ScoringModelKind,
        calculators: Vec<CalculatorId>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            calculators,
            parameters: None,
            uses_decoys: true,
            uses_second_best: false,
            decoy_mean: f64::NAN,
            decoy_stdev: f64::NAN,
            colinear_warning: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        name: String,
        kind: ScoringModelKind,
        calculators: Vec<CalculatorId>,
        parameters: Option<LinearModelParams>,
        uses_decoys: bool,
        uses_second_best: bool,
        decoy_mean: f64,
        decoy_stdev: f64,
        colinear_warning: bool,
    ) -> Self {
        Self {
            name,
            kind,
            calculators,
            parameters,
            uses_decoys,
            uses_second_best,
            decoy_mean,
            decoy_stdev,
            colinear_warning,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_uses_decoys(mut self, uses_decoys: bool) -> Self {
        self.uses_decoys = uses_decoys;
        self
    }

    pub fn with_uses_second_best(mut self, uses_second_best: bool) -> Self {
        self.uses_second_best = uses_second_best;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScoringModelKind {
        self.kind
    }

    pub fn calculators(&self) -> &[CalculatorId] {
        &self.calculators
    }

    pub fn parameters(&self) -> Option<&LinearModelParams> {
        self.parameters.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.parameters.is_some()
    }

    pub fn uses_decoys(&self) -> bool {
        self.uses_decoys
    }

    pub fn uses_second_best(&self) -> bool {
        self.uses_second_best
    }

    pub fn decoy_mean(&self) -> f64 {
        self.decoy_mean
    }

    pub fn decoy_stdev(&self) -> f64 {
        self.decoy_stdev
    }

    pub fn colinear_warning(&self) -> bool {
        self.colinear_warning
    }

    /// Composite score of one peak. NaN for an untrained model.
    pub fn score(&self, features: &[f64]) -> Result<f64, DataProcessingError> {
        match &self.parameters {
            Some(params) => params.score(features),
            None => Ok(f64::NAN),
        }
    }

    /// Calculators that carry a weight. Every calculator counts as enabled
    /// on an untrained model.
    pub fn enabled_calculators(&self) -> Vec<bool> {
        match &self.parameters {
            Some(params) => params.enabled_mask(),
            None => vec![true; self.calculators.len()],
        }
    }

    pub fn calculator_weights(&self) -> Vec<CalculatorWeight> {
        self.calculators
            .iter()
            .enumerate()
            .map(|(i, c)| CalculatorWeight {
                calculator: *c,
                weight: self
                    .parameters
                    .as_ref()
                    .and_then(|p| p.weights().get(i).copied())
                    .unwrap_or(f64::NAN),
            })
            .collect()
    }

    /// Per calculator share of the mean target score, see
    /// [LinearModelParams::percent_contributions].
    pub fn percent_contributions(&self, mean_features: &[f64]) -> Vec<f64> {
        match &self.parameters {
            Some(params) => params.percent_contributions(mean_features),
            None => vec![f64::NAN; self.calculators.len()],
        }
    }

    /// Estimator from the stored decoy statistics, `None` if untrained.
    pub fn q_value_estimator(&self) -> Option<QValueEstimator> {
        self.parameters.as_ref()?;
        QValueEstimator::new(self.decoy_mean, self.decoy_stdev).ok()
    }

    /// Re-express the model over a different calculator list.
    ///
    /// Weights follow their calculator. Calculators the model does not know
    /// come in disabled, the ones missing from `calculators` are dropped.
    pub fn with_calculators(&self, calculators: Vec<CalculatorId>) -> Self {
        let parameters = self.parameters.as_ref().map(|params| {
            let weights = calculators
                .iter()
                .map(|c| {
                    self.calculators
                        .iter()
                        .position(|x| x == c)
                        .and_then(|i| params.weights().get(i).copied())
                        .unwrap_or(f64::NAN)
                })
                .collect();
            LinearModelParams::new(weights, params.bias())
        });
        Self {
            calculators,
            parameters,
            ..self.clone()
        }
    }

    /// Same model over the current default calculators of its kind.
    pub fn upgrade_calculators(&self) -> Self {
        self.with_calculators(self.kind.default_calculators())
    }

    /// Train against feature vectors extracted with [Self::calculators].
    ///
    /// `enabled` selects the calculators to train. The returned model keeps
    /// this model's name and flags.
    pub fn train(
        &self,
        targets: &ScoredGroupPeaksSet,
        decoys: &ScoredGroupPeaksSet,
        enabled: &[bool],
        options: &TrainingOptions,
    ) -> Result<(Self, TrainingReport), TrainingError> {
        if enabled.len() != self.calculators.len() {
            return Err(TrainingError::FeatureCountMismatch {
                expected: self.calculators.len(),
                other: enabled.len(),
            });
        }
        let names: Vec<String> = self
            .calculators
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let input = TrainingInput {
            targets,
            decoys,
            names: &names,
            enabled,
            uses_decoys: self.uses_decoys,
            uses_second_best: self.uses_second_best,
        };

        info!(
            "Training {} model {} on {} target and {} decoy groups",
            self.kind,
            self.name,
            targets.len(),
            decoys.len()
        );
        let outcome = match self.kind {
            ScoringModelKind::Legacy => {
                train_fixed_weights(
                    &input,
                    &heuristic_params(&self.calculators),
                    options.subsample,
                )?
            }
            ScoringModelKind::MProphet => {
                let mut options = options.clone();
                if options.seed.is_none() {
                    options.seed = Some(heuristic_params(&self.calculators));
                }
                train_discriminant(&input, &options)?
            }
        };

        let model = Self {
            parameters: Some(outcome.params),
            decoy_mean: outcome.decoy_mean,
            decoy_stdev: outcome.decoy_stdev,
            colinear_warning: outcome.colinear_warning,
            ..self.clone()
        };
        Ok((model, outcome.report))
    }

    pub fn to_json(&self) -> Result<String, ModelFormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a model record. Structural problems (no calculators, unknown
    /// calculator names) come back as their own variants, not as JSON errors.
    pub fn from_json(json: &str) -> Result<Self, ModelFormatError> {
        let record: ScoringModelRecord = serde_json::from_str(json)?;
        Self::try_from(record)
    }
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Untrained statistics are NaN, and two untrained models still compare
/// equal.
impl PartialEq for PeakScoringModel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.calculators == other.calculators
            && self.parameters == other.parameters
            && self.uses_decoys == other.uses_decoys
            && self.uses_second_best == other.uses_second_best
            && same_value(self.decoy_mean, other.decoy_mean)
            && same_value(self.decoy_stdev, other.decoy_stdev)
            && self.colinear_warning == other.colinear_warning
    }
}

impl Named for PeakScoringModel {
    const KIND: &'static str = "peak scoring model";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Stored for PeakScoringModel {
    type Record = ScoringModelRecord;

    fn to_record(&self) -> ScoringModelRecord {
        ScoringModelRecord::from(self.clone())
    }

    fn from_record(record: ScoringModelRecord) -> Result<Self, PeakScoringError> {
        Ok(Self::try_from(record)?)
    }
}

fn mean_of_two(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

impl Mergeable for PeakScoringModel {
    /// Average of two trained models over the same calculators. A weight
    /// disabled in either model stays disabled.
    fn merge(&self, other: &Self) -> Result<Self, RegistryError> {
        let incompatible = || RegistryError::IncompatibleMerge {
            kind: Self::KIND,
            name: self.name.clone(),
        };
        if self.kind != other.kind || self.calculators != other.calculators {
            return Err(incompatible());
        }
        let (Some(mine), Some(theirs)) = (&self.parameters, &other.parameters) else {
            return Err(incompatible());
        };
        let weights = mine
            .weights()
            .iter()
            .zip(theirs.weights())
            .map(|(a, b)| mean_of_two(*a, *b))
            .collect();
        let params = LinearModelParams::new(weights, mean_of_two(mine.bias(), theirs.bias()));
        Ok(Self {
            parameters: Some(params),
            decoy_mean: mean_of_two(self.decoy_mean, other.decoy_mean),
            decoy_stdev: mean_of_two(self.decoy_stdev, other.decoy_stdev),
            colinear_warning: self.colinear_warning || other.colinear_warning,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(name: &str, weights: Vec<f64>, bias: f64) -> PeakScoringModel {
        let calculators = vec![
            CalculatorId::MQuestIntensity,
            CalculatorId::MQuestWeightedShape,
            CalculatorId::MQuestRetentionTimePrediction,
        ];
        PeakScoringModel::from_parts(
            name.to_string(),
            ScoringModelKind::MProphet,
            calculators,
            Some(LinearModelParams::new(weights, bias)),
            true,
            false,
            0.0,
            1.0,
            false,
        )
    }

    #[test]
    fn test_untrained_scores_nan() {
        let model = PeakScoringModel::new("default", ScoringModelKind::MProphet);
        assert!(!model.is_trained());
        assert!(model.score(&[1.0; 23]).unwrap().is_nan());
        assert!(model.q_value_estimator().is_none());
        assert_eq!(model.calculators().len(), 23);
        assert!(model.enabled_calculators().iter().all(|x| *x));
    }

    #[test]
    fn test_with_calculators_maps_by_identity() {
        let model = trained("m", vec![0.5, 2.0, -1.0], -3.0);
        let remapped = model.with_calculators(vec![
            CalculatorId::NextGenSignalNoise,
            CalculatorId::MQuestRetentionTimePrediction,
            CalculatorId::MQuestIntensity,
        ]);
        let weights: Vec<f64> = remapped.calculator_weights().iter().map(|x| x.weight).collect();
        assert!(weights[0].is_nan());
        assert_eq!(weights[1], -1.0);
        assert_eq!(weights[2], 0.5);
        assert_eq!(remapped.parameters().unwrap().bias(), -3.0);
        assert_eq!(remapped.name(), "m");
    }

    #[test]
    fn test_heuristic_params() {
        let params = heuristic_params(&CalculatorId::legacy_defaults());
        assert_eq!(params.weights()[0], 1.0);
        assert_eq!(params.weights()[3], 3.0);
        assert!(params.weights()[4].is_nan());
    }

    #[test]
    fn test_merge() {
        let a = trained("m", vec![1.0, f64::NAN, 2.0], 0.0);
        let b = trained("m", vec![3.0, 1.0, 4.0], -2.0);
        let merged = a.merge(&b).unwrap();
        let params = merged.parameters().unwrap();
        assert_eq!(params.weights()[0], 2.0);
        assert!(params.weights()[1].is_nan());
        assert_eq!(params.weights()[2], 3.0);
        assert_eq!(params.bias(), -1.0);

        let legacy = PeakScoringModel::new("m", ScoringModelKind::Legacy);
        assert_eq!(
            a.merge(&legacy),
            Err(RegistryError::IncompatibleMerge {
                kind: "peak scoring model",
                name: "m".to_string()
            })
        );
    }

    #[test]
    fn test_train_rejects_mask_of_wrong_length() {
        let model = PeakScoringModel::new("m", ScoringModelKind::Legacy);
        let empty = ScoredGroupPeaksSet::default();
        let err = model
            .train(&empty, &empty, &[true], &TrainingOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            TrainingError::FeatureCountMismatch {
                expected: 7,
                other: 1,
            }
        );
    }
}
