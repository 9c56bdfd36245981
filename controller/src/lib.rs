//! Controller role: owns the back-pressure policy and the per-tick
//! ALIGN/GATHER/DECIDE/REGULATE state machine. Kept free of any transport
//! dependency — `gather` takes a polling closure so the same logic drives
//! both the in-process fabric and the single-host SPSC pipeline.

use signalmesh_collab::PhasePolicy;
use signalmesh_core::{BackPressureLevel, Deadline, PhaseCmd, Prediction, SteadyClock, TickFrame};

/// `r = misses / (t + 1)`, where `t` is the number of consecutive
/// incomplete ticks preceding this one.
pub fn miss_ratio(misses: u64, t: u64) -> f64 {
    misses as f64 / (t + 1) as f64
}

/// A complete tick is always level 0. An incomplete tick grades into
/// `{1,2,3}` by how bad the running miss ratio has gotten.
pub fn level_for(complete: bool, ratio: f64) -> u8 {
    if complete {
        0
    } else if ratio > 0.20 {
        3
    } else if ratio > 0.10 {
        2
    } else {
        1
    }
}

/// The absolute millisecond boundary at which tick `tick_id` should begin,
/// relative to a run that started at `start_ms`.
pub fn tick_boundary_ms(start_ms: u64, tick_ms: u64, tick_id: u32) -> u64 {
    start_ms + tick_id as u64 * tick_ms
}

#[derive(Debug, Clone)]
pub struct GatherOutcome {
    pub tick_id: u32,
    pub predictions: Vec<Prediction>,
    pub received: usize,
    pub expected: usize,
}

impl GatherOutcome {
    pub fn complete(&self) -> bool {
        self.received >= self.expected
    }

    pub fn misses(&self) -> usize {
        self.expected.saturating_sub(self.received)
    }
}

/// Polls `poll` for predictor frames until `expected` have arrived for
/// `tick_id` or `deadline` expires. A frame whose `tick_id` does not match
/// is a stale straggler from a prior tick; it is discarded without
/// counting toward `received`.
pub fn gather<F>(
    tick_id: u32,
    expected: usize,
    clock: &SteadyClock,
    deadline: Deadline,
    mut poll: F,
) -> GatherOutcome
where
    F: FnMut() -> Option<TickFrame<Prediction>>,
{
    let mut predictions = Vec::new();
    let mut received = 0usize;
    while received < expected && !deadline.expired(clock) {
        match poll() {
            Some(frame) if frame.tick_id == tick_id => {
                predictions.extend(frame.records);
                received += 1;
            }
            Some(_stale) => continue,
            None => std::thread::yield_now(),
        }
    }
    GatherOutcome {
        tick_id,
        predictions,
        received,
        expected,
    }
}

/// Holds the phase policy and the cumulative miss/tick counters the
/// back-pressure ratio is computed from. One instance lives for the whole
/// run; `misses` and `ticks` are monotonic for the run's lifetime.
pub struct Controller {
    policy: Box<dyn PhasePolicy>,
    misses: u64,
    ticks: u64,
}

impl Controller {
    pub fn new(policy: Box<dyn PhasePolicy>) -> Self {
        Self {
            policy,
            misses: 0,
            ticks: 0,
        }
    }

    /// REGULATE: counts a miss when the tick was incomplete (one per
    /// tick, not one per missing slice), folds it into the cumulative
    /// ratio, and returns the level to broadcast for the next tick. Only
    /// the *emitted* level is forced to 0 on a complete tick — `misses`
    /// and `ticks` themselves never reset.
    pub fn regulate(&mut self, outcome: &GatherOutcome) -> BackPressureLevel {
        if !outcome.complete() {
            self.misses += 1;
        }
        self.ticks += 1;
        let ratio = miss_ratio(self.misses, self.ticks);
        tracing::debug!(
            tick_id = outcome.tick_id,
            complete = outcome.complete(),
            misses = self.misses,
            ticks = self.ticks,
            ratio,
            "regulate"
        );
        BackPressureLevel::new(level_for(outcome.complete(), ratio))
    }

    /// DECIDE: delegates to the phase policy with the tick's completeness.
    pub fn decide(&self, outcome: &GatherOutcome) -> Vec<PhaseCmd> {
        tracing::trace!(tick_id = outcome.tick_id, "decide");
        self.policy.decide(&outcome.predictions, outcome.complete())
    }

    pub fn running_miss_ratio(&self) -> f64 {
        miss_ratio(self.misses, self.ticks)
    }
}
