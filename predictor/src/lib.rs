//! Predictor role: scores one tick's feature slice through its
//! [`InferenceModel`] collaborator and advises the Controller when it ran
//! long enough to risk missing the tick boundary.

use signalmesh_collab::InferenceModel;
use signalmesh_core::{BackPressureLevel, Deadline, Features, Prediction, SteadyClock, TickFrame};

pub struct Predictor {
    model: Box<dyn InferenceModel>,
}

impl Predictor {
    pub fn new(model: Box<dyn InferenceModel>) -> Self {
        Self { model }
    }

    /// Scores `features` for `tick_id`, timed against `clock`/`budget`.
    /// Always returns a frame with one prediction per input feature, even
    /// an empty one for an empty slice. If the call overran its budget it
    /// also returns an advisory level-1 back-pressure hint; the Controller
    /// decides whether to act on it.
    pub fn handle_slice(
        &self,
        tick_id: u32,
        features: &[Features],
        clock: &SteadyClock,
        budget: Deadline,
    ) -> (TickFrame<Prediction>, Option<BackPressureLevel>) {
        let preds = self.model.predict(features);
        let frame = TickFrame::new(tick_id, preds);
        let overran = budget.expired(clock);
        let hint = if overran {
            Some(BackPressureLevel::new(1))
        } else {
            None
        };
        if overran {
            tracing::debug!(tick_id, slice_len = features.len(), "budget overrun, raising hint");
        } else {
            tracing::trace!(tick_id, slice_len = features.len(), "handle_slice");
        }
        (frame, hint)
    }
}
