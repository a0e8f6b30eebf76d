pub mod correlation;
pub mod stats;
