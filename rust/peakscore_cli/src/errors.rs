use peakscore::errors::{
    PeakScoringError,
    ReintegrationError,
    RegistryError,
    TrainingError,
};

#[derive(Debug)]
pub enum CliError {
    Config {
        source: String,
    },
    ParseError {
        msg: String,
    },
    Io {
        source: String,
        path: Option<String>,
    },
    Processing {
        source: String,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config { source } => write!(f, "Error interpreting the config: {}", source),
            CliError::ParseError { msg } => write!(f, "Error parsing config: {}", msg),
            CliError::Io { source, path } => {
                if let Some(path) = path {
                    write!(f, "Error reading file {}: {}", path, source)
                } else {
                    write!(f, "Error reading file: {}", source)
                }
            }
            CliError::Processing { source } => write!(f, "{}", source),
        }
    }
}

impl From<PeakScoringError> for CliError {
    fn from(e: PeakScoringError) -> Self {
        match e {
            PeakScoringError::Io { source, path } => CliError::Io {
                source: source.to_string(),
                path: path.map(|p| p.to_string_lossy().to_string()),
            },
            other => CliError::Processing {
                source: other.to_string(),
            },
        }
    }
}

impl From<TrainingError> for CliError {
    fn from(e: TrainingError) -> Self {
        CliError::Processing {
            source: e.to_string(),
        }
    }
}

impl From<ReintegrationError> for CliError {
    fn from(e: ReintegrationError) -> Self {
        CliError::Processing {
            source: e.to_string(),
        }
    }
}

impl From<RegistryError> for CliError {
    fn from(e: RegistryError) -> Self {
        CliError::Processing {
            source: e.to_string(),
        }
    }
}
