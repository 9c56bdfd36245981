//! Shared error type for the orchestration core. Roles return this type
//! directly so callers can match on kind; only the CLI boundary wraps it in
//! `anyhow` to attach run context and pick an exit code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fewer than one predictor (world size < 4 in the positional model).
    /// Fatal at startup, before the tick loop begins.
    #[error("configuration fault: {0}")]
    ConfigFault(String),

    /// A frame's declared `count * record_size` exceeds what the receiver
    /// is prepared to hold, or the framing state machine saw messages out
    /// of order. The tick's contribution from that peer is discarded and
    /// counted as a missing slice; the pipeline is not aborted.
    #[error("malformed frame on tag {tag}: {reason}")]
    MalformedFrame { tag: u8, reason: String },

    /// A channel endpoint disconnected (peer thread exited). Surfaced the
    /// same way a missing slice is: the tick proceeds without it.
    #[error("channel disconnected: {0}")]
    ChannelClosed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fault_formats_reason() {
        let e = PipelineError::ConfigFault("need >=1 predictor".into());
        assert!(e.to_string().contains("need >=1 predictor"));
    }
}
