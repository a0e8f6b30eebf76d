//! Persisted form of a [PeakScoringModel].
//!
//! Calculators are stored by name next to their weight, so a model survives
//! changes to the calculator catalogue. Non-finite values are written as
//! `null`.

use serde::{
    Deserialize,
    Serialize,
};

use super::linear_model::LinearModelParams;
use super::model::{
    PeakScoringModel,
    ScoringModelKind,
};
use crate::calculators::CalculatorId;
use crate::errors::ModelFormatError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorWeightRecord {
    #[serde(rename = "type")]
    pub calculator: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringModelRecord {
    pub name: String,
    #[serde(default)]
    pub kind: ScoringModelKind,
    #[serde(default = "default_true")]
    pub uses_decoys: bool,
    #[serde(default)]
    pub uses_second_best: bool,
    #[serde(default)]
    pub colinear_warning: bool,
    /// Present only for a trained model.
    #[serde(default)]
    pub bias: Option<f64>,
    #[serde(default)]
    pub decoy_mean: Option<f64>,
    #[serde(default)]
    pub decoy_stdev: Option<f64>,
    pub calculators: Vec<CalculatorWeightRecord>,
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

impl From<PeakScoringModel> for ScoringModelRecord {
    fn from(model: PeakScoringModel) -> Self {
        let calculators = model
            .calculator_weights()
            .into_iter()
            .map(|cw| CalculatorWeightRecord {
                calculator: cw.calculator.name().to_string(),
                weight: finite(cw.weight),
            })
            .collect();
        Self {
            name: model.name().to_string(),
            kind: model.kind(),
            uses_decoys: model.uses_decoys(),
            uses_second_best: model.uses_second_best(),
            colinear_warning: model.colinear_warning(),
            bias: model.parameters().and_then(|p| finite(p.bias())),
            decoy_mean: finite(model.decoy_mean()),
            decoy_stdev: finite(model.decoy_stdev()),
            calculators,
        }
    }
}

impl TryFrom<ScoringModelRecord> for PeakScoringModel {
    type Error = ModelFormatError;

    fn try_from(record: ScoringModelRecord) -> Result<Self, Self::Error> {
        if record.calculators.is_empty() {
            return Err(ModelFormatError::NoCalculators { model: record.name });
        }
        let mut calculators = Vec::with_capacity(record.calculators.len());
        for entry in record.calculators.iter() {
            match CalculatorId::from_name(&entry.calculator) {
                Some(id) => calculators.push(id),
                None => {
                    return Err(ModelFormatError::UnknownCalculator {
                        model: record.name,
                        name: entry.calculator.clone(),
                    });
                }
            }
        }

        let parameters = record.bias.map(|bias| {
            let weights = record
                .calculators
                .iter()
                .map(|x| x.weight.unwrap_or(f64::NAN))
                .collect();
            LinearModelParams::new(weights, bias)
        });

        Ok(PeakScoringModel::from_parts(
            record.name,
            record.kind,
            calculators,
            parameters,
            record.uses_decoys,
            record.uses_second_best,
            record.decoy_mean.unwrap_or(f64::NAN),
            record.decoy_stdev.unwrap_or(f64::NAN),
            record.colinear_warning,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrained_record_has_no_bias() {
        let model = PeakScoringModel::new("fresh", ScoringModelKind::Legacy);
        let record = ScoringModelRecord::from(model.clone());
        assert_eq!(record.bias, None);
        assert!(record.calculators.iter().all(|x| x.weight.is_none()));
        assert_eq!(record.calculators[0].calculator, "log_unforced_area");

        let back = PeakScoringModel::try_from(record).unwrap();
        assert!(!back.is_trained());
        assert_eq!(back.calculators(), model.calculators());
    }

    #[test]
    fn test_unknown_calculator() {
        let record = ScoringModelRecord {
            name: "old".to_string(),
            kind: ScoringModelKind::MProphet,
            uses_decoys: true,
            uses_second_best: false,
            colinear_warning: false,
            bias: Some(1.0),
            decoy_mean: Some(0.0),
            decoy_stdev: Some(1.0),
            calculators: vec![CalculatorWeightRecord {
                calculator: "retired_calculator".to_string(),
                weight: Some(1.0),
            }],
        };
        match PeakScoringModel::try_from(record) {
            Err(ModelFormatError::UnknownCalculator { model, name }) => {
                assert_eq!(model, "old");
                assert_eq!(name, "retired_calculator");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
