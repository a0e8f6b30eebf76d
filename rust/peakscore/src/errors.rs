use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum DataProcessingError {
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    ExpectedNonEmptyData {
        context: Option<String>,
    },
    ExpectedFiniteNonNanData {
        context: String,
    },
    InconsistentCandidateCount {
        expected: usize,
        other: usize,
        context: String,
    },
}

impl DataProcessingError {
    pub fn append_to_context(mut self, context: &str) -> Self {
        match &mut self {
            DataProcessingError::ExpectedSlicesSameLength {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::ExpectedNonEmptyData {
                context: owned_context,
            } => match owned_context {
                Some(x) => x.push_str(context),
                None => *owned_context = Some(context.to_string()),
            },
            DataProcessingError::ExpectedFiniteNonNanData {
                context: owned_context,
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::InconsistentCandidateCount {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
        }
        self
    }
}

impl std::fmt::Display for DataProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structural failures of a training call. All of them are fatal to the
/// call and carry enough context to tell which population or which
/// calculators were at fault.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    NoNegativePopulation {
        uses_decoys: bool,
        uses_second_best: bool,
        num_decoy_groups: usize,
    },
    NoEnabledCalculators {
        requested: usize,
        ineligible: Vec<String>,
    },
    EmptyTargetPopulation,
    DegenerateDecoyDistribution {
        mean: f64,
        stdev: f64,
        num_negatives: usize,
    },
    FeatureCountMismatch {
        expected: usize,
        other: usize,
    },
    Data(DataProcessingError),
}

impl std::fmt::Display for TrainingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingError::NoNegativePopulation {
                uses_decoys,
                uses_second_best,
                num_decoy_groups,
            } => write!(
                f,
                "Cannot train model without either decoys or second best peaks included (uses_decoys={}, uses_second_best={}, decoy groups={})",
                uses_decoys, uses_second_best, num_decoy_groups
            ),
            TrainingError::NoEnabledCalculators {
                requested,
                ineligible,
            } => write!(
                f,
                "No calculators left to train with ({} requested, ineligible: [{}])",
                requested,
                ineligible.join(", ")
            ),
            TrainingError::EmptyTargetPopulation => {
                write!(f, "Cannot train model without target peaks")
            }
            TrainingError::DegenerateDecoyDistribution {
                mean,
                stdev,
                num_negatives,
            } => write!(
                f,
                "Decoy score distribution is degenerate (mean={}, stdev={}, n={})",
                mean, stdev, num_negatives
            ),
            TrainingError::FeatureCountMismatch { expected, other } => write!(
                f,
                "Expected {} features per peak, found {}",
                expected, other
            ),
            TrainingError::Data(x) => write!(f, "{}", x),
        }
    }
}

impl From<DataProcessingError> for TrainingError {
    fn from(x: DataProcessingError) -> Self {
        Self::Data(x)
    }
}

#[derive(Debug)]
pub enum ModelFormatError {
    NoCalculators { model: String },
    UnknownCalculator { model: String, name: String },
    Json(serde_json::Error),
}

impl std::fmt::Display for ModelFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFormatError::NoCalculators { model } => {
                write!(f, "Peak scoring model {} has no calculators", model)
            }
            ModelFormatError::UnknownCalculator { model, name } => write!(
                f,
                "Peak scoring model {} references unknown calculator {}",
                model, name
            ),
            ModelFormatError::Json(e) => write!(f, "Invalid peak scoring model record: {}", e),
        }
    }
}

impl From<serde_json::Error> for ModelFormatError {
    fn from(x: serde_json::Error) -> Self {
        Self::Json(x)
    }
}

/// Every scored unit came out NaN (or, in strict mode, at least one did).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringIncompatibility {
    pub model: String,
    pub incompatible_groups: usize,
    pub total_groups: usize,
}

impl std::fmt::Display for ScoringIncompatibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "The peak scoring model {} is incompatible with {} of {} peptides in the document. Please train a new model.",
            self.model, self.incompatible_groups, self.total_groups
        )
    }
}

#[derive(Debug)]
pub enum ReintegrationError {
    Incompatible(ScoringIncompatibility),
    UntrainedModel { model: String },
    Data(DataProcessingError),
}

impl std::fmt::Display for ReintegrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReintegrationError::Incompatible(x) => write!(f, "{}", x),
            ReintegrationError::UntrainedModel { model } => write!(
                f,
                "The peak scoring model {} has not been trained",
                model
            ),
            ReintegrationError::Data(x) => write!(f, "{}", x),
        }
    }
}

impl From<ScoringIncompatibility> for ReintegrationError {
    fn from(x: ScoringIncompatibility) -> Self {
        Self::Incompatible(x)
    }
}

impl From<DataProcessingError> for ReintegrationError {
    fn from(x: DataProcessingError) -> Self {
        Self::Data(x)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NameConflict { kind: &'static str, name: String },
    NotFound { kind: &'static str, name: String },
    IncompatibleMerge { kind: &'static str, name: String },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NameConflict { kind, name } => {
                write!(f, "The {} {} already exists", kind, name)
            }
            RegistryError::NotFound { kind, name } => {
                write!(f, "The {} {} does not exist", kind, name)
            }
            RegistryError::IncompatibleMerge { kind, name } => write!(
                f,
                "The {} {} cannot be averaged with the existing one",
                kind, name
            ),
        }
    }
}

#[derive(Debug)]
pub enum FeatureTableError {
    MissingColumn {
        name: &'static str,
    },
    MainVariable {
        found: usize,
    },
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    Csv(csv::Error),
}

impl std::fmt::Display for FeatureTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureTableError::MissingColumn { name } => {
                write!(f, "Feature table is missing the {} column", name)
            }
            FeatureTableError::MainVariable { found } => write!(
                f,
                "Feature table needs exactly one main_var_ column, found {}",
                found
            ),
            FeatureTableError::InvalidValue { row, column, value } => write!(
                f,
                "Invalid value {:?} in column {} of row {}",
                value, column, row
            ),
            FeatureTableError::Csv(e) => write!(f, "{}", e),
        }
    }
}

impl From<csv::Error> for FeatureTableError {
    fn from(x: csv::Error) -> Self {
        Self::Csv(x)
    }
}

#[derive(Debug)]
pub enum PeakScoringError {
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    ParseError {
        msg: String,
    },
    DataProcessingError(DataProcessingError),
    TrainingError(TrainingError),
    ModelFormatError(ModelFormatError),
    ReintegrationError(ReintegrationError),
    RegistryError(RegistryError),
    FeatureTableError(FeatureTableError),
}

impl std::fmt::Display for PeakScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeakScoringError::TrainingError(x) => write!(f, "{}", x),
            PeakScoringError::ModelFormatError(x) => write!(f, "{}", x),
            PeakScoringError::ReintegrationError(x) => write!(f, "{}", x),
            PeakScoringError::RegistryError(x) => write!(f, "{}", x),
            PeakScoringError::FeatureTableError(x) => write!(f, "{}", x),
            PeakScoringError::Io {
                source,
                path: Some(path),
            } => write!(f, "{} ({})", source, path.display()),
            _ => write!(f, "{:?}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PeakScoringError>;

impl From<std::io::Error> for PeakScoringError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}

impl From<serde_json::Error> for PeakScoringError {
    fn from(val: serde_json::Error) -> Self {
        PeakScoringError::ParseError {
            msg: val.to_string(),
        }
    }
}

impl From<csv::Error> for PeakScoringError {
    fn from(x: csv::Error) -> Self {
        Self::FeatureTableError(FeatureTableError::Csv(x))
    }
}

impl From<DataProcessingError> for PeakScoringError {
    fn from(x: DataProcessingError) -> Self {
        Self::DataProcessingError(x)
    }
}

impl From<TrainingError> for PeakScoringError {
    fn from(x: TrainingError) -> Self {
        Self::TrainingError(x)
    }
}

impl From<ModelFormatError> for PeakScoringError {
    fn from(x: ModelFormatError) -> Self {
        Self::ModelFormatError(x)
    }
}

impl From<ReintegrationError> for PeakScoringError {
    fn from(x: ReintegrationError) -> Self {
        Self::ReintegrationError(x)
    }
}

impl From<RegistryError> for PeakScoringError {
    fn from(x: RegistryError) -> Self {
        Self::RegistryError(x)
    }
}

impl From<FeatureTableError> for PeakScoringError {
    fn from(x: FeatureTableError) -> Self {
        Self::FeatureTableError(x)
    }
}
