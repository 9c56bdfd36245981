//! The three-message wire framing contract: `tick_id`, then `count`, then
//! (if `count > 0`) a raw byte blob of `count * size_of::<Record>()` bytes.
//!
//! A real stream transport (TCP/HTTP) would see these as length-prefixed
//! messages on one connection; our in-process fabric models the same
//! three-step handshake over a channel so the receive-side state machine
//! (IDLE -> HAVE_TICK_ID -> HAVE_COUNT -> HAVE_PAYLOAD -> IDLE) is exercised
//! identically regardless of backing transport.

use signalmesh_core::WireRecord;

/// One of the three messages that make up a frame.
#[derive(Debug, Clone)]
pub enum WireMsg {
    TickId(u32),
    Count(i32),
    Payload(Vec<u8>),
}

/// An assembled frame: a tick id and its raw payload bytes (empty when
/// `count == 0`).
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub tick_id: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssemblerState {
    Idle,
    HaveTickId,
    HaveCount,
}

/// Drives the per-peer receive state machine over a stream of [`WireMsg`].
/// A message arriving out of turn (e.g. a `Payload` while idle, or a new
/// `TickId` while a `Payload` is still expected) is a framing protocol
/// error for that tick: the caller discards the in-flight frame and the
/// assembler resets to `Idle` so the next tick can still be framed.
pub struct FrameAssembler {
    state: AssemblerState,
    tick_id: u32,
    count: i32,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self {
            state: AssemblerState::Idle,
            tick_id: 0,
            count: 0,
        }
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one wire message. Returns `Ok(Some(frame))` once a full frame
    /// is assembled, `Ok(None)` if more messages are needed, or `Err` if the
    /// message arrived out of the expected sequence.
    pub fn feed(&mut self, msg: WireMsg) -> Result<Option<RawFrame>, FramingError> {
        match (self.state, msg) {
            (AssemblerState::Idle, WireMsg::TickId(t)) => {
                self.tick_id = t;
                self.state = AssemblerState::HaveTickId;
                Ok(None)
            }
            (AssemblerState::HaveTickId, WireMsg::Count(c)) => {
                self.count = c;
                if c > 0 {
                    self.state = AssemblerState::HaveCount;
                    Ok(None)
                } else {
                    self.state = AssemblerState::Idle;
                    Ok(Some(RawFrame {
                        tick_id: self.tick_id,
                        bytes: Vec::new(),
                    }))
                }
            }
            (AssemblerState::HaveCount, WireMsg::Payload(bytes)) => {
                self.state = AssemblerState::Idle;
                Ok(Some(RawFrame {
                    tick_id: self.tick_id,
                    bytes,
                }))
            }
            (state, msg) => {
                self.state = AssemblerState::Idle;
                Err(FramingError::OutOfSequence {
                    state: format!("{state:?}"),
                    msg: msg.kind(),
                })
            }
        }
    }
}

impl WireMsg {
    fn kind(&self) -> &'static str {
        match self {
            WireMsg::TickId(_) => "TickId",
            WireMsg::Count(_) => "Count",
            WireMsg::Payload(_) => "Payload",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FramingError {
    #[error("unexpected {msg} while in state {state}")]
    OutOfSequence { state: String, msg: &'static str },
}

/// Encodes a slice of POD records to their raw wire bytes.
pub fn encode_records<T: WireRecord>(records: &[T]) -> Vec<u8> {
    let byte_len = std::mem::size_of_val(records);
    // SAFETY: `T: WireRecord` guarantees a stable, padding-free repr(C)
    // layout valid for any bit pattern its fields admit, so reading it back
    // as bytes is sound for the lifetime of this borrow.
    let bytes = unsafe { std::slice::from_raw_parts(records.as_ptr() as *const u8, byte_len) };
    bytes.to_vec()
}

/// Decodes raw wire bytes back into POD records. Returns `None` if `bytes`
/// is not an exact multiple of `size_of::<T>()` — the malformed-frame case
/// from the error design (`count * record_size` does not match payload).
pub fn decode_records<T: WireRecord>(bytes: &[u8]) -> Option<Vec<T>> {
    let record_size = std::mem::size_of::<T>();
    if record_size == 0 || bytes.len() % record_size != 0 {
        return None;
    }
    let n = bytes.len() / record_size;
    let mut out = Vec::with_capacity(n);
    // SAFETY: length checked above; `T: WireRecord` is Copy and admits any
    // bit pattern, so reconstructing it from an aligned, correctly sized
    // byte span is sound. We copy into a freshly allocated, correctly
    // aligned `Vec<T>` rather than reinterpreting `bytes` in place, since
    // `bytes` has no alignment guarantee.
    unsafe {
        let src = bytes.as_ptr();
        for i in 0..n {
            let mut rec = std::mem::MaybeUninit::<T>::uninit();
            std::ptr::copy_nonoverlapping(
                src.add(i * record_size),
                rec.as_mut_ptr() as *mut u8,
                record_size,
            );
            out.push(rec.assume_init());
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalmesh_core::{Features, SensorSample};

    #[test]
    fn empty_count_yields_frame_with_no_payload_message() {
        let mut a = FrameAssembler::new();
        assert!(a.feed(WireMsg::TickId(7)).unwrap().is_none());
        let frame = a.feed(WireMsg::Count(0)).unwrap().unwrap();
        assert_eq!(frame.tick_id, 7);
        assert!(frame.bytes.is_empty());
    }

    #[test]
    fn nonzero_count_requires_payload() {
        let mut a = FrameAssembler::new();
        a.feed(WireMsg::TickId(1)).unwrap();
        assert!(a.feed(WireMsg::Count(2)).unwrap().is_none());
        let frame = a.feed(WireMsg::Payload(vec![1, 2, 3])).unwrap().unwrap();
        assert_eq!(frame.tick_id, 1);
        assert_eq!(frame.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn out_of_sequence_message_is_a_framing_error() {
        let mut a = FrameAssembler::new();
        assert!(a.feed(WireMsg::Payload(vec![])).is_err());
        // Resets to Idle and can frame the next tick cleanly.
        assert!(a.feed(WireMsg::TickId(2)).unwrap().is_none());
    }

    #[test]
    fn round_trips_sensor_samples() {
        let samples = vec![
            SensorSample {
                ts_ms: 1000,
                junction: 0,
                lane: 0,
                q_len: 3,
                arrivals: 12,
                avg_speed: 300,
            },
            SensorSample {
                ts_ms: 1000,
                junction: 0,
                lane: 1,
                q_len: 5,
                arrivals: 8,
                avg_speed: 280,
            },
        ];
        let bytes = encode_records(&samples);
        let back: Vec<SensorSample> = decode_records(&bytes).unwrap();
        assert_eq!(samples, back);
    }

    #[test]
    fn round_trips_features() {
        let mut f = Features::default();
        f.ts_ms = 42;
        f.junction = 3;
        f.f[0] = 1.5;
        let bytes = encode_records(&[f]);
        let back: Vec<Features> = decode_records(&bytes).unwrap();
        assert_eq!(back[0], f);
    }

    #[test]
    fn malformed_length_is_rejected() {
        let bytes = vec![0u8; 3];
        let back: Option<Vec<SensorSample>> = decode_records(&bytes);
        assert!(back.is_none());
    }
}
