//! Data model, timing, and error types shared by every role in the
//! pipeline. Nothing in this crate blocks, sleeps past a budget, or owns a
//! transport — it is the vocabulary the other crates build on.

pub mod error;
pub mod schema;
pub mod time;

pub use error::{PipelineError, Result};
pub use schema::{
    BackPressureLevel, Features, PhaseCmd, Prediction, Reason, Roles, SensorSample, Tag,
    TickFrame, WireRecord, MAX_FEATURES,
};
pub use time::{Deadline, SteadyClock};
