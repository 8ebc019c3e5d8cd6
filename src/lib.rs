//! ringpipe - per-identity bounded byte pipe
//!
//! Setiap identity mendapat satu ring buffer SPSC sendiri:
//! - Exclusive open: satu reader dan satu writer per identity
//! - Blocking read: selalu tepat `len` byte, tidak ada short read
//! - Overwrite-on-overflow: writer tidak pernah menunggu, data lama dibuang
//!
//! ```
//! use ringpipe::{Endpoint, Identity, Mode};
//!
//! let endpoint = Endpoint::new();
//! let writer = endpoint.open(Identity(1000), Mode::Write).unwrap();
//! let reader = endpoint.open(Identity(1000), Mode::Read).unwrap();
//!
//! writer.write(b"hello").unwrap();
//! assert_eq!(reader.read(5).unwrap(), b"hello");
//! ```

pub mod config;
pub mod core;
pub mod endpoint;
pub mod error;
pub mod network;
pub mod protocol;

pub use crate::config::{PipeConfig, ServerConfig, DEFAULT_CAPACITY};
pub use crate::core::{Channel, ChannelRegistry, ChannelStats, FillState, Identity, Mode};
pub use crate::endpoint::{Endpoint, Handle, Interrupter};
pub use crate::error::{PipeError, Result};
