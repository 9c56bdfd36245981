//! Single-host pipeline variant: each stage boundary is one lock-free SPSC
//! ring instead of a fabric channel, there is no predictor fan-out, and
//! back-pressure is inferred from ring occupancy rather than an explicit
//! reverse control message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use signalmesh_aggregator::Aggregator;
use signalmesh_collab::{
    top_congestion_junction, EwmaFeatureMapper, LinearSigmoidModel, RingPhasePolicy,
    SampleGenerator, SyntheticGenerator,
};
use signalmesh_controller::{tick_boundary_ms, Controller, GatherOutcome};
use signalmesh_core::{Deadline, Features, Prediction, SensorSample, SteadyClock, TickFrame};
use signalmesh_predictor::Predictor;
use signalmesh_transport::SpscRing;
use tracing::info;

use crate::config::PipelineConfig;

const RING_CAPACITY: usize = 8;
const BACKOFF: Duration = Duration::from_micros(100);

pub fn run(cfg: &PipelineConfig, stop: &Arc<AtomicBool>) -> anyhow::Result<()> {
    let clock = SteadyClock::start();
    let start_ms = clock.now_ms() + cfg.startup_slack_ms;

    let samples_ring: SpscRing<TickFrame<SensorSample>> = SpscRing::new(RING_CAPACITY);
    let features_ring: SpscRing<TickFrame<Features>> = SpscRing::new(RING_CAPACITY);
    let predictions_ring: SpscRing<TickFrame<Prediction>> = SpscRing::new(RING_CAPACITY);

    std::thread::scope(|scope| {
        scope.spawn(|| run_ingestor(cfg, stop, &clock, start_ms, &samples_ring));
        scope.spawn(|| run_aggregator(cfg, stop, &samples_ring, &features_ring));
        scope.spawn(|| run_predictor(cfg, stop, &clock, &features_ring, &predictions_ring));
        scope.spawn(|| run_controller(cfg, stop, &clock, &predictions_ring));
    });

    Ok(())
}

fn run_ingestor(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    clock: &SteadyClock,
    start_ms: u64,
    ring: &SpscRing<TickFrame<SensorSample>>,
) {
    let mut gen = SyntheticGenerator::new(cfg.junctions, cfg.lanes_per, cfg.tick_ms as u32, cfg.seed);
    for tick_id in 0..cfg.total_ticks as u32 {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        clock.sleep_until_ms(tick_boundary_ms(start_ms, cfg.tick_ms, tick_id));
        let samples = gen.generate(tick_id);
        ring.push_spin(TickFrame::new(tick_id, samples), BACKOFF);
    }
}

/// Maps ring occupancy fraction to a thinning level using the same
/// doubling stride as the fabric variant's explicit back-pressure level.
fn occupancy_level(ring: &SpscRing<TickFrame<Features>>) -> u8 {
    let frac = ring.len() as f64 / ring.capacity().max(1) as f64;
    if frac > 0.75 {
        3
    } else if frac > 0.5 {
        2
    } else if frac > 0.25 {
        1
    } else {
        0
    }
}

fn run_aggregator(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    in_ring: &SpscRing<TickFrame<SensorSample>>,
    out_ring: &SpscRing<TickFrame<Features>>,
) {
    let mapper = EwmaFeatureMapper::new(cfg.junctions);
    let mut aggregator = Aggregator::new(Box::new(mapper), cfg.junctions, cfg.lanes_per);

    for _ in 0..cfg.total_ticks {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let frame = loop {
            if let Some(f) = in_ring.pop() {
                break f;
            }
            if stop.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(BACKOFF);
        };
        let level = occupancy_level(out_ring);
        aggregator.fold_back_pressure([level]);
        let mut slices = aggregator.map_and_scatter(&frame.records, 1);
        let features = slices.pop().unwrap_or_default();
        out_ring.push_spin(TickFrame::new(frame.tick_id, features), BACKOFF);
    }
}

fn run_predictor(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    clock: &SteadyClock,
    in_ring: &SpscRing<TickFrame<Features>>,
    out_ring: &SpscRing<TickFrame<Prediction>>,
) {
    let predictor = Predictor::new(Box::new(LinearSigmoidModel));
    for _ in 0..cfg.total_ticks {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let frame = loop {
            if let Some(f) = in_ring.pop() {
                break f;
            }
            if stop.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(BACKOFF);
        };
        let deadline = Deadline::new(clock.now_ms(), cfg.budget_pred_ms);
        let (out, _hint) = predictor.handle_slice(frame.tick_id, &frame.records, clock, deadline);
        out_ring.push_spin(out, BACKOFF);
    }
}

fn run_controller(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    clock: &SteadyClock,
    ring: &SpscRing<TickFrame<Prediction>>,
) {
    let policy = RingPhasePolicy::default();
    let mut controller = Controller::new(Box::new(policy));

    for tick_id in 0..cfg.total_ticks as u32 {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let tick_start = clock.now_ms();
        let frame = loop {
            if let Some(f) = ring.pop() {
                break f;
            }
            if stop.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(BACKOFF);
        };
        let received = frame.records.len();
        let outcome = GatherOutcome {
            tick_id,
            predictions: frame.records,
            received,
            expected: cfg.junctions as usize,
        };

        let level = controller.regulate(&outcome);
        let cmds = controller.decide(&outcome);
        let top = top_congestion_junction(&outcome.predictions)
            .map(|j| j as i32)
            .unwrap_or(9_999);

        info!(
            tick = tick_id,
            received = outcome.received,
            expected = outcome.expected,
            phase_cmds = cmds.len(),
            top_congestion_junction = top,
            miss_ratio = controller.running_miss_ratio(),
            back_pressure_level = level.value(),
            latency_ms = clock.now_ms() - tick_start,
            "tick complete (spsc)"
        );
    }
}
