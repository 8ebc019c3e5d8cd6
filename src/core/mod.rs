//! Core module: ring buffer, channel, dan registry
//!
//! Prinsip desain:
//! - Dua tingkat lock: registry (lookup/insert saja) dan per-channel
//! - Reader menunggu di condvar, writer tidak pernah blocking
//! - Overwrite-on-overflow: data terbaru selalu menang

mod channel;
mod registry;
mod ring_buffer;

pub use channel::{Channel, ChannelStats, Identity, Mode};
pub use registry::ChannelRegistry;
pub use ring_buffer::{FillState, RingBuffer};
