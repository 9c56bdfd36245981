//! Inference model. Out of scope for correctness review; the core only
//! requires output count to equal input count and each record to carry the
//! same `ts_ms`/`junction` as its input feature, scored in `[0, 1]`.
//!
//! No accelerator offload is implemented here — this trait is the seam
//! where one would attach a GPU/batched implementation without touching
//! the predictor role that calls it.

use signalmesh_core::{Features, Prediction};

pub trait InferenceModel: Send + Sync {
    fn predict(&self, features: &[Features]) -> Vec<Prediction>;
}

const WEIGHTS: [f32; 6] = [0.06, 0.04, -0.05, 0.08, 0.02, 0.02];
const BIAS: f32 = 0.1;

/// A 6-weight linear model over `f[0..6)` through a sigmoid, clamped to
/// `[0, 1]`.
pub struct LinearSigmoidModel;

impl InferenceModel for LinearSigmoidModel {
    fn predict(&self, features: &[Features]) -> Vec<Prediction> {
        features
            .iter()
            .map(|feat| {
                let z: f32 = BIAS
                    + WEIGHTS
                        .iter()
                        .zip(feat.f.iter())
                        .map(|(w, x)| w * x)
                        .sum::<f32>();
                let y = 1.0 / (1.0 + (-z).exp());
                Prediction {
                    ts_ms: feat.ts_ms,
                    junction: feat.junction,
                    congestion_60s: y.clamp(0.0, 1.0),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_count_matches_input_and_score_is_bounded() {
        let model = LinearSigmoidModel;
        let feats = vec![Features::default(), Features::default()];
        let preds = model.predict(&feats);
        assert_eq!(preds.len(), 2);
        for p in preds {
            assert!((0.0..=1.0).contains(&p.congestion_60s));
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let model = LinearSigmoidModel;
        assert!(model.predict(&[]).is_empty());
    }

    #[test]
    fn preserves_ts_ms_and_junction() {
        let model = LinearSigmoidModel;
        let mut f = Features::default();
        f.ts_ms = 77;
        f.junction = 9;
        let preds = model.predict(&[f]);
        assert_eq!(preds[0].ts_ms, 77);
        assert_eq!(preds[0].junction, 9);
    }
}
