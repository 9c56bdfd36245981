mod config;
mod fabric;
mod spsc;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use config::{PipelineConfig, RunMode};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = PipelineConfig::parse();

    tracing::info!(
        mode = ?cfg.mode,
        tick_ms = cfg.tick_ms,
        junctions = cfg.junctions,
        lanes_per = cfg.lanes_per,
        predictors = cfg.predictors,
        total_ticks = cfg.total_ticks,
        "starting pipeline"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        tracing::info!("signal received, stopping at next tick boundary");
        handler_stop.store(true, Ordering::Relaxed);
    })?;

    match cfg.mode {
        RunMode::Fabric => fabric::run(&cfg, &stop),
        RunMode::Spsc => spsc::run(&cfg, &stop),
    }
}
