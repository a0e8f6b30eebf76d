pub mod linear_model;
pub mod model;
pub mod record;

pub use linear_model::LinearModelParams;
pub use model::{
    CalculatorWeight,
    PeakScoringModel,
    ScoringModelKind,
    heuristic_params,
};
pub use record::{
    CalculatorWeightRecord,
    ScoringModelRecord,
};
