pub mod calculators;
pub mod data_sources;
pub mod errors;
pub mod ml;
pub mod models;
pub mod registry;
pub mod reintegration;
pub mod scoring;
pub mod utils;

pub use calculators::CalculatorId;
pub use models::{
    ChromatogramProvider,
    ChromatogramSnapshot,
    Document,
};
pub use registry::{
    ConflictPolicy,
    PeakScoringModelList,
    SettingsList,
};
pub use reintegration::{
    ReintegrationHandler,
    ReintegrationOptions,
    reintegrate,
};
pub use scoring::{
    LinearModelParams,
    PeakScoringModel,
    ScoringModelKind,
};
