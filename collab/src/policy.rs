//! Phase-adjustment policy. Out of scope for correctness review; the core
//! only requires output order to match input `preds` order (never sorted
//! by congestion) and a `reason` tag reflecting whether the tick was
//! complete.

use signalmesh_core::{PhaseCmd, Prediction, Reason};

pub trait PhasePolicy: Send + Sync {
    /// `complete == true` -> full-strength MODEL actions.
    /// `complete == false` -> de-rated HEUR actions.
    fn decide(&self, preds: &[Prediction], complete: bool) -> Vec<PhaseCmd>;
}

#[derive(Debug, Clone, Copy)]
pub struct RingPhasePolicyConfig {
    pub max_delta_per_tick: u8,
    pub heuristic_derate_pct: u8,
}

impl Default for RingPhasePolicyConfig {
    fn default() -> Self {
        Self {
            max_delta_per_tick: 6,
            heuristic_derate_pct: 50,
        }
    }
}

/// Maps congestion linearly to a signed delta, de-rates it when the tick's
/// predictions were incomplete, and advances a stateless 4-phase ring.
pub struct RingPhasePolicy {
    cfg: RingPhasePolicyConfig,
}

impl RingPhasePolicy {
    pub fn new(cfg: RingPhasePolicyConfig) -> Self {
        Self { cfg }
    }
}

impl Default for RingPhasePolicy {
    fn default() -> Self {
        Self::new(RingPhasePolicyConfig::default())
    }
}

impl PhasePolicy for RingPhasePolicy {
    fn decide(&self, preds: &[Prediction], complete: bool) -> Vec<PhaseCmd> {
        let derate_pct: i32 = if complete {
            100
        } else {
            self.cfg.heuristic_derate_pct.min(100) as i32
        };
        let reason = if complete { Reason::Model } else { Reason::Heur };
        let max_delta = self.cfg.max_delta_per_tick as i32;

        preds
            .iter()
            .map(|p| {
                let raw = congestion_to_delta(p.congestion_60s, max_delta);
                let derated = (raw * derate_pct) / 100;
                let clamped = derated.clamp(-max_delta, max_delta);
                let phase_id = next_phase_for_delta(p.junction, clamped);
                PhaseCmd {
                    ts_ms: p.ts_ms,
                    junction: p.junction,
                    phase_id,
                    delta_sec: clamped.unsigned_abs().min(max_delta as u32) as u8,
                    reason,
                }
            })
            .collect()
    }
}

fn congestion_to_delta(c01: f32, max_delta: i32) -> i32 {
    (c01.clamp(0.0, 1.0) * max_delta as f32).round() as i32
}

fn next_phase_for_delta(junction: u16, delta: i32) -> u8 {
    let phase = (junction % 4) as u8;
    if delta > 0 {
        (phase + 1) % 4
    } else {
        phase
    }
}

/// Identifies the junction with the true maximum `congestion_60s`, for the
/// observability line only — never used by the decision itself. A linear
/// scan, not an `nth_element`-style partial order, which can silently pick
/// a non-maximal element on ties depending on pivot choice.
pub fn top_congestion_junction(preds: &[Prediction]) -> Option<u16> {
    preds
        .iter()
        .max_by(|a, b| a.congestion_60s.total_cmp(&b.congestion_60s))
        .map(|p| p.junction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(junction: u16, c: f32) -> Prediction {
        Prediction {
            ts_ms: 0,
            junction,
            congestion_60s: c,
        }
    }

    #[test]
    fn complete_ticks_are_full_strength_and_tagged_model() {
        let policy = RingPhasePolicy::default();
        let cmds = policy.decide(&[pred(0, 1.0)], true);
        assert_eq!(cmds[0].delta_sec, 6);
        assert_eq!(cmds[0].reason, Reason::Model);
    }

    #[test]
    fn incomplete_ticks_are_derated_and_tagged_heur() {
        let policy = RingPhasePolicy::default();
        let cmds = policy.decide(&[pred(0, 1.0)], false);
        assert_eq!(cmds[0].delta_sec, 3); // 6 * 50%
        assert_eq!(cmds[0].reason, Reason::Heur);
    }

    #[test]
    fn output_order_matches_input_order() {
        let policy = RingPhasePolicy::default();
        let preds = vec![pred(5, 0.1), pred(2, 0.9), pred(8, 0.5)];
        let cmds = policy.decide(&preds, true);
        let junctions: Vec<u16> = cmds.iter().map(|c| c.junction).collect();
        assert_eq!(junctions, vec![5, 2, 8]);
    }

    #[test]
    fn top_congestion_is_the_true_maximum() {
        let preds = vec![pred(1, 0.2), pred(2, 0.9), pred(3, 0.5)];
        assert_eq!(top_congestion_junction(&preds), Some(2));
    }

    #[test]
    fn top_congestion_is_none_when_empty() {
        assert_eq!(top_congestion_junction(&[]), None);
    }
}
