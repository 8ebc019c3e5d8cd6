//! Protocol Layer: framing biner untuk TCP endpoint
//!
//! Prinsip desain:
//! - Fixed-size frames: Hello 16 bytes, request/response 8 bytes
//! - Payload mengikuti frame sebagai raw bytes, tanpa message boundary
//! - Status code memetakan [`PipeError`](crate::PipeError) satu-satu

mod message;

pub use message::{
    Hello, Op, Request, Response, Status, FRAME_SIZE, HELLO_SIZE, MAGIC, VERSION,
};
