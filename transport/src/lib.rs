//! Wire framing and the two interchangeable transports that carry it: an
//! in-process message-passing fabric (channel-backed, models the
//! multi-peer deployment) and a lock-free SPSC ring pipeline (the
//! single-host variant).

pub mod fabric;
pub mod framing;
pub mod spsc;

pub use fabric::{channel, decode_frame, FabricRx, FabricTx};
pub use framing::{decode_records, encode_records, FrameAssembler, FramingError, RawFrame, WireMsg};
pub use spsc::SpscRing;
