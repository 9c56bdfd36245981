//! Multi-peer fabric orchestration: one OS thread per logical role,
//! `predictors` of them, wired together with bounded channels. Role
//! placement mirrors the positional topology in [`signalmesh_core::Roles`]
//! even though threads replace separate processes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use signalmesh_aggregator::Aggregator;
use signalmesh_collab::{
    top_congestion_junction, EwmaFeatureMapper, LinearSigmoidModel, RingPhasePolicy,
    SampleGenerator, SyntheticGenerator,
};
use signalmesh_controller::{gather, tick_boundary_ms, Controller};
use signalmesh_core::{
    Deadline, Features, PipelineError, Prediction, SensorSample, SteadyClock, Tag, TickFrame,
};
use signalmesh_predictor::Predictor;
use signalmesh_transport::{channel, decode_frame, FabricRx, FabricTx};
use tracing::info;

use crate::config::PipelineConfig;

pub fn run(cfg: &PipelineConfig, stop: &Arc<AtomicBool>) -> Result<()> {
    if cfg.predictors < 1 {
        return Err(PipelineError::ConfigFault(
            "fabric mode needs at least one predictor".into(),
        )
        .into());
    }

    let clock = SteadyClock::start();
    let start_ms = clock.now_ms() + cfg.startup_slack_ms;

    let (ing_tx, agg_feat_rx) = channel(Tag::Feat);
    let (ctrl_bp_tx, agg_ctrl_bp_rx) = channel(Tag::Bp);

    let mut agg_pred_tx = Vec::with_capacity(cfg.predictors);
    let mut pred_feat_rx = Vec::with_capacity(cfg.predictors);
    for _ in 0..cfg.predictors {
        let (tx, rx) = channel(Tag::Feat);
        agg_pred_tx.push(tx);
        pred_feat_rx.push(rx);
    }

    let mut pred_out_tx = Vec::with_capacity(cfg.predictors);
    let mut ctrl_pred_rx = Vec::with_capacity(cfg.predictors);
    for _ in 0..cfg.predictors {
        let (tx, rx) = channel(Tag::Pred);
        pred_out_tx.push(tx);
        ctrl_pred_rx.push(rx);
    }

    // Predictor overrun hints go straight to the Aggregator (the Aggregator
    // max-folds every level it sees, authoritative or advisory), not
    // through the Controller.
    let mut pred_hint_tx = Vec::with_capacity(cfg.predictors);
    let mut agg_hint_rx = Vec::with_capacity(cfg.predictors);
    for _ in 0..cfg.predictors {
        let (tx, rx) = channel(Tag::Bp);
        pred_hint_tx.push(tx);
        agg_hint_rx.push(rx);
    }

    let mut agg_bp_rx = vec![agg_ctrl_bp_rx];
    agg_bp_rx.extend(agg_hint_rx);

    std::thread::scope(|scope| {
        scope.spawn(|| run_ingestor(cfg, stop, &clock, start_ms, ing_tx));
        scope.spawn(|| run_aggregator(cfg, stop, agg_feat_rx, agg_pred_tx, agg_bp_rx));

        for (i, ((feat_rx, out_tx), hint_tx)) in pred_feat_rx
            .into_iter()
            .zip(pred_out_tx)
            .zip(pred_hint_tx)
            .enumerate()
        {
            scope.spawn(move || run_predictor(cfg, stop, i, feat_rx, out_tx, hint_tx));
        }

        scope.spawn(|| run_controller(cfg, stop, &clock, start_ms, ctrl_pred_rx, ctrl_bp_tx));
    });

    Ok(())
}

fn run_ingestor(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    clock: &SteadyClock,
    start_ms: u64,
    tx: FabricTx,
) {
    let mut gen = SyntheticGenerator::new(cfg.junctions, cfg.lanes_per, cfg.tick_ms as u32, cfg.seed);
    for tick_id in 0..cfg.total_ticks as u32 {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        clock.sleep_until_ms(tick_boundary_ms(start_ms, cfg.tick_ms, tick_id));
        let samples = gen.generate(tick_id);
        if tx.send_frame(tick_id, &samples).is_err() {
            return;
        }
    }
}

fn run_aggregator(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    mut feat_rx: FabricRx,
    out_tx: Vec<FabricTx>,
    mut bp_rx: Vec<FabricRx>,
) {
    let mapper = EwmaFeatureMapper::new(cfg.junctions);
    let mut aggregator = Aggregator::new(Box::new(mapper), cfg.junctions, cfg.lanes_per);

    for _ in 0..cfg.total_ticks {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let raw = match feat_rx.recv_frame_blocking() {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let samples: Vec<SensorSample> = match decode_frame(Tag::Feat, &raw) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let levels: Vec<u8> = bp_rx.iter_mut().flat_map(|rx| rx.drain_levels()).collect();
        aggregator.fold_back_pressure(levels);
        let slices = aggregator.map_and_scatter(&samples, out_tx.len());
        for (tx, slice) in out_tx.iter().zip(slices) {
            let _ = tx.send_frame(raw.tick_id, &slice);
        }
    }
}

fn run_predictor(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    _idx: usize,
    mut feat_rx: FabricRx,
    out_tx: FabricTx,
    hint_tx: FabricTx,
) {
    let clock = SteadyClock::start();
    let predictor = Predictor::new(Box::new(LinearSigmoidModel));

    for _ in 0..cfg.total_ticks {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let raw = match feat_rx.recv_frame_blocking() {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let feats: Vec<Features> = match decode_frame(Tag::Feat, &raw) {
            Ok(f) => f,
            Err(_) => continue,
        };
        let deadline = Deadline::new(clock.now_ms(), cfg.budget_pred_ms);
        let (frame, hint) = predictor.handle_slice(raw.tick_id, &feats, &clock, deadline);
        // The overrun hint is reported before the prediction it pertains
        // to, so the Aggregator can fold it in no later than the tick the
        // overrun was detected on.
        if let Some(level) = hint {
            let _ = hint_tx.send_level(level.value());
        }
        let _ = out_tx.send_frame(frame.tick_id, &frame.records);
    }
}

fn run_controller(
    cfg: &PipelineConfig,
    stop: &AtomicBool,
    clock: &SteadyClock,
    start_ms: u64,
    mut pred_rx: Vec<FabricRx>,
    bp_tx: FabricTx,
) {
    let policy = RingPhasePolicy::default();
    let mut controller = Controller::new(Box::new(policy));

    for tick_id in 0..cfg.total_ticks as u32 {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        // ALIGN: lock to the tick grid before gathering.
        clock.sleep_until_ms(tick_boundary_ms(start_ms, cfg.tick_ms, tick_id));
        let tick_start = clock.now_ms();
        let tick_end = tick_boundary_ms(start_ms, cfg.tick_ms, tick_id + 1);
        let deadline = Deadline::new(tick_start, tick_end.saturating_sub(tick_start));

        // GATHER
        let outcome = gather(tick_id, pred_rx.len(), clock, deadline, || {
            poll_any(&mut pred_rx)
        });

        // DECIDE / REGULATE
        let level = controller.regulate(&outcome);
        if bp_tx.send_level(level.value()).is_err() {
            return;
        }
        let cmds = controller.decide(&outcome);
        let top = top_congestion_junction(&outcome.predictions)
            .map(|j| j as i32)
            .unwrap_or(9_999);

        info!(
            tick = tick_id,
            received = outcome.received,
            expected = outcome.expected,
            predictions = outcome.predictions.len(),
            phase_cmds = cmds.len(),
            top_congestion_junction = top,
            miss_ratio = controller.running_miss_ratio(),
            back_pressure_level = level.value(),
            latency_ms = clock.now_ms() - tick_start,
            "tick complete"
        );

        // HOLD: idle out the rest of the tick.
        clock.sleep_until_ms(tick_end);
    }
}

fn poll_any(rxs: &mut [FabricRx]) -> Option<TickFrame<Prediction>> {
    for rx in rxs.iter_mut() {
        if let Some(raw) = rx.try_recv_frame() {
            if let Ok(preds) = decode_frame::<Prediction>(Tag::Pred, &raw) {
                return Some(TickFrame::new(raw.tick_id, preds));
            }
        }
    }
    None
}
