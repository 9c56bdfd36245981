//! Pluggable external collaborators: sample generation, feature mapping,
//! inference, and phase policy. Each is a trait plus one reference
//! implementation; the orchestration core only depends on the trait.

pub mod features;
pub mod generator;
pub mod model;
pub mod policy;

pub use features::{EwmaFeatureMapper, FeatureMapper};
pub use generator::{SampleGenerator, SyntheticGenerator};
pub use model::{InferenceModel, LinearSigmoidModel};
pub use policy::{top_congestion_junction, PhasePolicy, RingPhasePolicy, RingPhasePolicyConfig};
