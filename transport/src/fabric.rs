//! The message-passing fabric: role-pinned threads exchanging [`WireMsg`]
//! over bounded channels. This is the realization of the "peer" topology
//! from the external interface contract — each logical peer is a channel
//! endpoint rather than a separate OS process, but the framing and
//! blocking/non-blocking discipline is identical to what a real transport
//! adapter would need to preserve.

use crossbeam_channel::{Receiver, RecvError, Sender, TryRecvError};
use signalmesh_core::{PipelineError, Result, Tag, WireRecord};
use tracing::warn;

use crate::framing::{decode_records, encode_records, FrameAssembler, RawFrame, WireMsg};

/// Bounded capacity for one fabric channel. A frame is at most 3 messages;
/// this leaves headroom for one in-flight tick of slack without the
/// producer blocking on a healthy consumer.
const CHANNEL_CAPACITY: usize = 16;

/// Creates one fabric channel for a given logical tag between one producer
/// and one consumer.
pub fn channel(tag: Tag) -> (FabricTx, FabricRx) {
    let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
    (FabricTx { tag, tx }, FabricRx {
        tag,
        rx,
        assembler: FrameAssembler::new(),
    })
}

/// Send half of a fabric channel.
#[derive(Clone)]
pub struct FabricTx {
    tag: Tag,
    tx: Sender<WireMsg>,
}

impl FabricTx {
    /// Sends one tick's frame: `tick_id`, then `count`, then the payload
    /// message only when `count > 0`.
    pub fn send_frame<T: WireRecord>(&self, tick_id: u32, records: &[T]) -> Result<()> {
        let count = records.len() as i32;
        self.tx
            .send(WireMsg::TickId(tick_id))
            .map_err(|_| closed(self.tag))?;
        self.tx
            .send(WireMsg::Count(count))
            .map_err(|_| closed(self.tag))?;
        if count > 0 {
            let bytes = encode_records(records);
            self.tx
                .send(WireMsg::Payload(bytes))
                .map_err(|_| closed(self.tag))?;
        }
        Ok(())
    }

    /// Sends a single back-pressure level integer (the `BP` tag has no
    /// count/payload messages, just one integer per report).
    pub fn send_level(&self, level: u8) -> Result<()> {
        self.tx
            .send(WireMsg::Count(level as i32))
            .map_err(|_| closed(self.tag))
    }
}

fn closed(tag: Tag) -> PipelineError {
    PipelineError::ChannelClosed(format!("tag {:?} sender has no receiver", tag as u8))
}

/// Receive half of a fabric channel.
pub struct FabricRx {
    tag: Tag,
    rx: Receiver<WireMsg>,
    assembler: FrameAssembler,
}

impl FabricRx {
    /// Non-blocking: assembles and returns a frame if one is fully
    /// buffered already, without ever parking this thread. Returns `None`
    /// when the channel currently has no more messages to offer. A
    /// malformed (out-of-sequence) message is logged and treated as a
    /// dropped contribution for this tick, not a fatal error.
    pub fn try_recv_frame(&mut self) -> Option<RawFrame> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => match self.assembler.feed(msg) {
                    Ok(Some(frame)) => return Some(frame),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(tag = ?self.tag, error = %e, "framing protocol error, discarding");
                        continue;
                    }
                },
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Blocking receive, used at the Ingestor->Aggregator and
    /// Aggregator->Predictor transitions where the next stage genuinely has
    /// nothing to do until its input arrives.
    pub fn recv_frame_blocking(&mut self) -> Result<RawFrame> {
        loop {
            match self.rx.recv() {
                Ok(msg) => match self.assembler.feed(msg) {
                    Ok(Some(frame)) => return Ok(frame),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(tag = ?self.tag, error = %e, "framing protocol error, discarding");
                        continue;
                    }
                },
                Err(RecvError) => return Err(closed(self.tag)),
            }
        }
    }

    /// Drains every back-pressure level currently queued, without
    /// blocking. The `BP` tag carries bare integers, not framed records.
    pub fn drain_levels(&mut self) -> Vec<u8> {
        let mut levels = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(WireMsg::Count(level)) => levels.push(level.clamp(0, 255) as u8),
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        levels
    }
}

/// Decodes a [`RawFrame`]'s payload into typed records, mapping a length
/// mismatch to the malformed-frame error kind rather than panicking.
pub fn decode_frame<T: WireRecord>(tag: Tag, frame: &RawFrame) -> Result<Vec<T>> {
    if frame.bytes.is_empty() {
        return Ok(Vec::new());
    }
    decode_records(&frame.bytes).ok_or_else(|| PipelineError::MalformedFrame {
        tag: tag as u8,
        reason: format!(
            "{} bytes is not a multiple of record size",
            frame.bytes.len()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalmesh_core::SensorSample;

    #[test]
    fn round_trips_a_frame_through_the_channel() {
        let (tx, mut rx) = channel(Tag::Feat);
        let samples = vec![SensorSample {
            ts_ms: 5,
            junction: 1,
            lane: 0,
            q_len: 2,
            arrivals: 1,
            avg_speed: 100,
        }];
        tx.send_frame(3, &samples).unwrap();
        let frame = rx.recv_frame_blocking().unwrap();
        assert_eq!(frame.tick_id, 3);
        let back: Vec<SensorSample> = decode_frame(Tag::Feat, &frame).unwrap();
        assert_eq!(back, samples);
    }

    #[test]
    fn empty_frame_has_no_payload_round_trip() {
        let (tx, mut rx) = channel(Tag::Feat);
        tx.send_frame::<SensorSample>(1, &[]).unwrap();
        let frame = rx.recv_frame_blocking().unwrap();
        assert_eq!(frame.tick_id, 1);
        assert!(frame.bytes.is_empty());
    }

    #[test]
    fn try_recv_is_none_on_empty_channel() {
        let (_tx, mut rx) = channel(Tag::Pred);
        assert!(rx.try_recv_frame().is_none());
    }

    #[test]
    fn bp_levels_are_drained_as_plain_integers() {
        let (tx, mut rx) = channel(Tag::Bp);
        tx.send_level(2).unwrap();
        tx.send_level(1).unwrap();
        assert_eq!(rx.drain_levels(), vec![2, 1]);
    }
}
