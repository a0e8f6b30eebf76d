//! Document wide peak picking with a trained scoring model.

mod accumulator;
pub mod features;
pub mod handler;
mod score_export;

pub use features::{
    ExtractedFeatures,
    ScoringUnit,
    candidate_bounds,
    extract_features,
    extract_unit,
    extract_units,
    scoring_units,
};
pub use handler::{
    ReintegrationHandler,
    ReintegrationOptions,
    ReintegrationSummary,
    reintegrate,
};
