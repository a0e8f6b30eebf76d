pub mod lda;
pub mod qvalues;
pub mod training;

pub use qvalues::{
    QValueEstimator,
    QValueMode,
    storey_q_values,
};
pub use training::{
    TrainingInput,
    TrainingOptions,
    TrainingOutcome,
    TrainingReport,
    eligible_calculators,
    train_discriminant,
    train_fixed_weights,
    Subsample,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetDecoy {
    Target,
    Decoy,
}

pub trait LabelledScore {
    fn get_score(&self) -> f64;
    fn get_label(&self) -> TargetDecoy;
    fn assign_qval(&mut self, q: f32);
    fn get_qval(&self) -> f32;
}

impl LabelledScore for (f64, TargetDecoy, f32) {
    fn get_score(&self) -> f64 {
        self.0
    }

    fn get_label(&self) -> TargetDecoy {
        self.1
    }

    fn assign_qval(&mut self, q: f32) {
        self.2 = q
    }

    fn get_qval(&self) -> f32 {
        self.2
    }
}
