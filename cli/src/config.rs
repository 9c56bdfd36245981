//! Run configuration, sourced from CLI flags with environment fallback.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RunMode {
    /// Multi-peer message-passing fabric: one thread per logical role,
    /// `predictors` of them, connected by bounded channels.
    Fabric,
    /// Single-host pipeline: one lock-free SPSC ring per stage boundary,
    /// no predictor fan-out, back-pressure inferred from queue occupancy.
    Spsc,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "signalmesh", about = "Traffic-signal decision pipeline")]
pub struct PipelineConfig {
    #[arg(long, env = "SIGNALMESH_MODE", value_enum, default_value = "fabric")]
    pub mode: RunMode,

    /// Tick period in milliseconds.
    #[arg(long, env = "TICK_MS", default_value_t = 100)]
    pub tick_ms: u64,

    /// Budget, in milliseconds, a Predictor has to score one slice.
    #[arg(long, env = "BUDGET_PRED_MS", default_value_t = 40)]
    pub budget_pred_ms: u64,

    /// Budget, in milliseconds, the Controller has to gather and decide.
    #[arg(long, env = "BUDGET_CTRL_MS", default_value_t = 60)]
    pub budget_ctrl_ms: u64,

    /// Number of junctions simulated.
    #[arg(long, env = "JUNCTIONS", default_value_t = 8)]
    pub junctions: u32,

    /// Lanes sampled per junction per tick.
    #[arg(long, env = "LANES_PER", default_value_t = 4)]
    pub lanes_per: u32,

    /// Number of ticks to run before exiting. `0` runs until killed.
    #[arg(long, env = "TOTAL_TICKS", default_value_t = 200)]
    pub total_ticks: u64,

    /// Grace period before tick 0's boundary, letting role threads spin up.
    #[arg(long, env = "STARTUP_SLACK_MS", default_value_t = 50)]
    pub startup_slack_ms: u64,

    /// Predictor worker count. Ignored (fixed at 1) in `spsc` mode.
    #[arg(long, env = "PREDICTORS", default_value_t = 3)]
    pub predictors: usize,

    /// PRNG seed for the synthetic sample generator.
    #[arg(long, env = "SEED", default_value_t = 7)]
    pub seed: u64,
}
