//! Peak feature calculators.
//!
//! Every calculator is a pure function from one candidate peak (all the
//! label-type groups of a scoring unit at that candidate) plus a little
//! peptide context to a single `f64`. NaN is a legitimate answer and means
//! "not applicable here", e.g. a library dot-product for a peptide without
//! library intensities, or any standard variant without an internal standard.
//!
//! Calculators are identified by a stable name. Models persist those names,
//! never positions, so the catalogue can grow without invalidating them.

mod legacy;
mod mquest;
mod next_gen;
pub mod peak_data;

pub use peak_data::{
    GroupPeakData,
    PeakScoringContext,
    PeptidePeakData,
    TransitionPeakData,
};

use mquest::PairSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CalculatorId {
    LegacyLogUnforcedArea,
    LegacyUnforcedCountScore,
    LegacyUnforcedCountScoreStandard,
    LegacyIdentifiedCount,
    LegacyIdentifiedCountStandard,
    MQuestIntensity,
    MQuestStandardIntensity,
    MQuestRetentionTimePrediction,
    MQuestRetentionTimeSquaredPrediction,
    MQuestIntensityCorrelation,
    MQuestStandardIntensityCorrelation,
    MQuestReferenceCorrelation,
    MQuestShape,
    MQuestCoElution,
    MQuestWeightedShape,
    MQuestWeightedCoElution,
    MQuestWeightedReferenceShape,
    MQuestWeightedReferenceCoElution,
    MQuestStandardWeightedShape,
    MQuestStandardWeightedCoElution,
    NextGenSignalNoise,
    NextGenStandardSignalNoise,
    NextGenProductMassError,
    NextGenStandardProductMassError,
    NextGenPrecursorMassError,
    NextGenCrossWeightedShape,
    NextGenIsotopeDotProduct,
}

impl CalculatorId {
    pub const ALL: [CalculatorId; 27] = [
        CalculatorId::LegacyLogUnforcedArea,
        CalculatorId::LegacyUnforcedCountScore,
        CalculatorId::LegacyUnforcedCountScoreStandard,
        CalculatorId::LegacyIdentifiedCount,
        CalculatorId::LegacyIdentifiedCountStandard,
        CalculatorId::MQuestIntensity,
        CalculatorId::MQuestStandardIntensity,
        CalculatorId::MQuestRetentionTimePrediction,
        CalculatorId::MQuestRetentionTimeSquaredPrediction,
        CalculatorId::MQuestIntensityCorrelation,
        CalculatorId::MQuestStandardIntensityCorrelation,
        CalculatorId::MQuestReferenceCorrelation,
        CalculatorId::MQuestShape,
        CalculatorId::MQuestCoElution,
        CalculatorId::MQuestWeightedShape,
        CalculatorId::MQuestWeightedCoElution,
        CalculatorId::MQuestWeightedReferenceShape,
        CalculatorId::MQuestWeightedReferenceCoElution,
        CalculatorId::MQuestStandardWeightedShape,
        CalculatorId::MQuestStandardWeightedCoElution,
        CalculatorId::NextGenSignalNoise,
        CalculatorId::NextGenStandardSignalNoise,
        CalculatorId::NextGenProductMassError,
        CalculatorId::NextGenStandardProductMassError,
        CalculatorId::NextGenPrecursorMassError,
        CalculatorId::NextGenCrossWeightedShape,
        CalculatorId::NextGenIsotopeDotProduct,
    ];

    /// Calculators of a freshly created mProphet model, in weight order.
    pub fn mprophet_defaults() -> Vec<CalculatorId> {
        vec![
            CalculatorId::MQuestIntensity,
            CalculatorId::MQuestRetentionTimePrediction,
            CalculatorId::MQuestRetentionTimeSquaredPrediction,
            CalculatorId::MQuestIntensityCorrelation,
            CalculatorId::MQuestWeightedShape,
            CalculatorId::MQuestWeightedCoElution,
            CalculatorId::LegacyUnforcedCountScore,
            CalculatorId::NextGenSignalNoise,
            CalculatorId::NextGenProductMassError,
            CalculatorId::MQuestReferenceCorrelation,
            CalculatorId::MQuestWeightedReferenceShape,
            CalculatorId::MQuestWeightedReferenceCoElution,
            CalculatorId::LegacyUnforcedCountScoreStandard,
            CalculatorId::MQuestStandardIntensity,
            CalculatorId::MQuestStandardIntensityCorrelation,
            CalculatorId::NextGenStandardSignalNoise,
            CalculatorId::NextGenStandardProductMassError,
            CalculatorId::MQuestStandardWeightedShape,
            CalculatorId::MQuestStandardWeightedCoElution,
            CalculatorId::NextGenCrossWeightedShape,
            CalculatorId::NextGenPrecursorMassError,
            CalculatorId::NextGenIsotopeDotProduct,
            CalculatorId::LegacyIdentifiedCount,
        ]
    }

    /// Calculators of the legacy model, in weight order.
    pub fn legacy_defaults() -> Vec<CalculatorId> {
        vec![
            CalculatorId::LegacyLogUnforcedArea,
            CalculatorId::LegacyUnforcedCountScore,
            CalculatorId::LegacyUnforcedCountScoreStandard,
            CalculatorId::LegacyIdentifiedCount,
            CalculatorId::MQuestRetentionTimePrediction,
            CalculatorId::MQuestRetentionTimeSquaredPrediction,
            CalculatorId::LegacyIdentifiedCountStandard,
        ]
    }

    /// Stable persisted name.
    pub fn name(&self) -> &'static str {
        match self {
            CalculatorId::LegacyLogUnforcedArea => "log_unforced_area",
            CalculatorId::LegacyUnforcedCountScore => "unforced_count",
            CalculatorId::LegacyUnforcedCountScoreStandard => "standard_unforced_count",
            CalculatorId::LegacyIdentifiedCount => "identified_count",
            CalculatorId::LegacyIdentifiedCountStandard => "standard_identified_count",
            CalculatorId::MQuestIntensity => "intensity",
            CalculatorId::MQuestStandardIntensity => "standard_intensity",
            CalculatorId::MQuestRetentionTimePrediction => "retention_time_difference",
            CalculatorId::MQuestRetentionTimeSquaredPrediction => {
                "retention_time_squared_difference"
            }
            CalculatorId::MQuestIntensityCorrelation => "library_intensity_dot_product",
            CalculatorId::MQuestStandardIntensityCorrelation => {
                "standard_library_intensity_dot_product"
            }
            CalculatorId::MQuestReferenceCorrelation => "reference_intensity_dot_product",
            CalculatorId::MQuestShape => "shape",
            CalculatorId::MQuestCoElution => "coelution",
            CalculatorId::MQuestWeightedShape => "weighted_shape",
            CalculatorId::MQuestWeightedCoElution => "weighted_coelution",
            CalculatorId::MQuestWeightedReferenceShape => "reference_weighted_shape",
            CalculatorId::MQuestWeightedReferenceCoElution => "reference_weighted_coelution",
            CalculatorId::MQuestStandardWeightedShape => "standard_weighted_shape",
            CalculatorId::MQuestStandardWeightedCoElution => "standard_weighted_coelution",
            CalculatorId::NextGenSignalNoise => "signal_noise",
            CalculatorId::NextGenStandardSignalNoise => "standard_signal_noise",
            CalculatorId::NextGenProductMassError => "product_mass_error",
            CalculatorId::NextGenStandardProductMassError => "standard_product_mass_error",
            CalculatorId::NextGenPrecursorMassError => "precursor_mass_error",
            CalculatorId::NextGenCrossWeightedShape => "precursor_product_shape",
            CalculatorId::NextGenIsotopeDotProduct => "isotope_dot_product",
        }
    }

    /// Resolve a persisted name. Also accepts mProphet table column names
    /// (`var_` / `main_var_` prefixed).
    pub fn from_name(name: &str) -> Option<CalculatorId> {
        let name = name.trim();
        let name = name
            .strip_prefix("main_var_")
            .or_else(|| name.strip_prefix("var_"))
            .unwrap_or(name);
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Column header for tables and reports.
    pub fn header_name(&self) -> &'static str {
        match self {
            CalculatorId::LegacyLogUnforcedArea => "Log unforced area",
            CalculatorId::LegacyUnforcedCountScore => "Unforced count",
            CalculatorId::LegacyUnforcedCountScoreStandard => "Standard unforced count",
            CalculatorId::LegacyIdentifiedCount => "Identified count",
            CalculatorId::LegacyIdentifiedCountStandard => "Standard identified count",
            CalculatorId::MQuestIntensity => "Intensity",
            CalculatorId::MQuestStandardIntensity => "Standard intensity",
            CalculatorId::MQuestRetentionTimePrediction => "Retention time difference",
            CalculatorId::MQuestRetentionTimeSquaredPrediction => {
                "Retention time squared difference"
            }
            CalculatorId::MQuestIntensityCorrelation => "Library intensity dot-product",
            CalculatorId::MQuestStandardIntensityCorrelation => {
                "Standard library intensity dot-product"
            }
            CalculatorId::MQuestReferenceCorrelation => "Reference intensity dot-product",
            CalculatorId::MQuestShape => "Shape",
            CalculatorId::MQuestCoElution => "Co-elution",
            CalculatorId::MQuestWeightedShape => "Shape (weighted)",
            CalculatorId::MQuestWeightedCoElution => "Co-elution (weighted)",
            CalculatorId::MQuestWeightedReferenceShape => "Reference shape (weighted)",
            CalculatorId::MQuestWeightedReferenceCoElution => "Reference co-elution (weighted)",
            CalculatorId::MQuestStandardWeightedShape => "Standard shape (weighted)",
            CalculatorId::MQuestStandardWeightedCoElution => "Standard co-elution (weighted)",
            CalculatorId::NextGenSignalNoise => "Signal to noise",
            CalculatorId::NextGenStandardSignalNoise => "Standard signal to noise",
            CalculatorId::NextGenProductMassError => "Product mass error",
            CalculatorId::NextGenStandardProductMassError => "Standard product mass error",
            CalculatorId::NextGenPrecursorMassError => "Precursor mass error",
            CalculatorId::NextGenCrossWeightedShape => "Precursor-product shape score",
            CalculatorId::NextGenIsotopeDotProduct => "Precursor isotope dot product",
        }
    }

    /// Lower values are better, so a well trained weight is negative.
    pub fn is_reversed_score(&self) -> bool {
        matches!(
            self,
            CalculatorId::MQuestRetentionTimePrediction
                | CalculatorId::MQuestRetentionTimeSquaredPrediction
                | CalculatorId::MQuestCoElution
                | CalculatorId::MQuestWeightedCoElution
                | CalculatorId::MQuestWeightedReferenceCoElution
                | CalculatorId::MQuestStandardWeightedCoElution
                | CalculatorId::NextGenProductMassError
                | CalculatorId::NextGenStandardProductMassError
                | CalculatorId::NextGenPrecursorMassError
        )
    }

    pub fn calculate(&self, context: &PeakScoringContext, peak: &PeptidePeakData) -> f64 {
        match self {
            CalculatorId::LegacyLogUnforcedArea => legacy::log_unforced_area(peak),
            CalculatorId::LegacyUnforcedCountScore => {
                legacy::unforced_count_score(peak.analyte_groups())
            }
            CalculatorId::LegacyUnforcedCountScoreStandard => {
                legacy::unforced_count_score(peak.standard_groups())
            }
            CalculatorId::LegacyIdentifiedCount => legacy::identified_count(peak.analyte_groups()),
            CalculatorId::LegacyIdentifiedCountStandard => {
                legacy::identified_count(peak.standard_groups())
            }
            CalculatorId::MQuestIntensity => mquest::intensity(peak.analyte_groups()),
            CalculatorId::MQuestStandardIntensity => mquest::intensity(peak.standard_groups()),
            CalculatorId::MQuestRetentionTimePrediction => {
                mquest::retention_time_difference(context, peak)
            }
            CalculatorId::MQuestRetentionTimeSquaredPrediction => {
                mquest::retention_time_difference(context, peak).powi(2)
            }
            CalculatorId::MQuestIntensityCorrelation => {
                mquest::library_correlation(peak.analyte_groups())
            }
            CalculatorId::MQuestStandardIntensityCorrelation => {
                mquest::library_correlation(peak.standard_groups())
            }
            CalculatorId::MQuestReferenceCorrelation => mquest::reference_correlation(peak),
            CalculatorId::MQuestShape => mquest::shape(peak, PairSource::Analyte, false),
            CalculatorId::MQuestCoElution => mquest::coelution(peak, PairSource::Analyte, false),
            CalculatorId::MQuestWeightedShape => mquest::shape(peak, PairSource::Analyte, true),
            CalculatorId::MQuestWeightedCoElution => {
                mquest::coelution(peak, PairSource::Analyte, true)
            }
            CalculatorId::MQuestWeightedReferenceShape => {
                mquest::shape(peak, PairSource::Reference, true)
            }
            CalculatorId::MQuestWeightedReferenceCoElution => {
                mquest::coelution(peak, PairSource::Reference, true)
            }
            CalculatorId::MQuestStandardWeightedShape => {
                mquest::shape(peak, PairSource::Standard, true)
            }
            CalculatorId::MQuestStandardWeightedCoElution => {
                mquest::coelution(peak, PairSource::Standard, true)
            }
            CalculatorId::NextGenSignalNoise => next_gen::signal_noise(peak.analyte_groups()),
            CalculatorId::NextGenStandardSignalNoise => {
                next_gen::signal_noise(peak.standard_groups())
            }
            CalculatorId::NextGenProductMassError => {
                next_gen::mass_error(peak.analyte_groups(), false)
            }
            CalculatorId::NextGenStandardProductMassError => {
                next_gen::mass_error(peak.standard_groups(), false)
            }
            CalculatorId::NextGenPrecursorMassError => {
                next_gen::mass_error(peak.analyte_groups(), true)
            }
            CalculatorId::NextGenCrossWeightedShape => next_gen::precursor_product_shape(peak),
            CalculatorId::NextGenIsotopeDotProduct => next_gen::isotope_dot_product(peak),
        }
    }
}

impl std::fmt::Display for CalculatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Compute every calculator in `calculators` for one candidate, in order.
pub fn calculate_features(
    calculators: &[CalculatorId],
    context: &PeakScoringContext,
    peak: &PeptidePeakData,
) -> Vec<f64> {
    calculators
        .iter()
        .map(|c| c.calculate(context, peak))
        .collect()
}
