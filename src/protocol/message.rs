//! Wire format untuk TCP endpoint
//!
//! Layout (little-endian, fixed-size):
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Hello (16 bytes): magic u32 | version u8 | mode u8 |          │
//! │                   flags u16 | identity u32 | reserved u32     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Request (8 bytes): op u8 | reserved [u8; 3] | arg u32         │
//! │   + `arg` payload bytes untuk Op::Write                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Response (8 bytes): status u8 | reserved [u8; 3] | value u32  │
//! │   + `value` bytes untuk Op::Read yang sukses                  │
//! └──────────────────────────────────────────────────────────────┘
//!
//! Satu koneksi = satu handle. Mode dipilih sekali di Hello.

use crate::core::{Identity, Mode};
use crate::error::PipeError;

pub const MAGIC: u32 = 0x5250_4950; // "RPIP"
pub const VERSION: u8 = 1;
pub const HELLO_SIZE: usize = 16;
pub const FRAME_SIZE: usize = 8;

/// Handshake pertama dari client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    pub mode: Mode,
    pub identity: Identity,
    pub flags: u16,
}

impl Hello {
    pub fn new(identity: Identity, mode: Mode) -> Self {
        Self {
            mode,
            identity,
            flags: 0,
        }
    }

    pub fn encode(&self) -> [u8; HELLO_SIZE] {
        let mut buf = [0u8; HELLO_SIZE];
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[4] = VERSION;
        buf[5] = self.mode as u8;
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..12].copy_from_slice(&self.identity.0.to_le_bytes());
        buf
    }

    /// Returns `None` jika magic, versi, atau mode tidak valid
    pub fn decode(buf: &[u8; HELLO_SIZE]) -> Option<Self> {
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != MAGIC || buf[4] != VERSION {
            return None;
        }

        Some(Self {
            mode: Mode::from_u8(buf[5])?,
            flags: u16::from_le_bytes([buf[6], buf[7]]),
            identity: Identity(u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]])),
        })
    }
}

/// Operasi per request
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Baca tepat `arg` byte (blocking)
    Read = 1,
    /// Tulis `arg` byte yang mengikuti header
    Write = 2,
    /// Ganti kapasitas menjadi `arg`
    Resize = 3,
    /// Tutup handle dan koneksi
    Close = 4,
}

impl Op {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            3 => Some(Self::Resize),
            4 => Some(Self::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub op: Op,
    pub arg: u32,
}

impl Request {
    pub fn new(op: Op, arg: u32) -> Self {
        Self { op, arg }
    }

    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        encode_frame(self.op as u8, self.arg)
    }

    pub fn decode(buf: &[u8; FRAME_SIZE]) -> Option<Self> {
        let (op, arg) = decode_frame(buf);
        Some(Self {
            op: Op::from_u8(op)?,
            arg,
        })
    }
}

/// Status code di setiap response
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    Busy = 1,
    InitError = 2,
    AllocError = 3,
    CopyFault = 4,
    Interrupted = 5,
    WrongMode = 6,
    Closed = 7,
    ZeroCapacity = 8,
    /// Frame tidak valid
    Protocol = 9,
}

impl Status {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::Busy),
            2 => Some(Self::InitError),
            3 => Some(Self::AllocError),
            4 => Some(Self::CopyFault),
            5 => Some(Self::Interrupted),
            6 => Some(Self::WrongMode),
            7 => Some(Self::Closed),
            8 => Some(Self::ZeroCapacity),
            9 => Some(Self::Protocol),
            _ => None,
        }
    }
}

impl From<&PipeError> for Status {
    fn from(err: &PipeError) -> Self {
        match err {
            PipeError::Busy(_) => Self::Busy,
            PipeError::InitError { .. } => Self::InitError,
            PipeError::AllocError { .. } => Self::AllocError,
            PipeError::CopyFault(_) => Self::CopyFault,
            PipeError::Interrupted => Self::Interrupted,
            PipeError::WrongMode(_) => Self::WrongMode,
            PipeError::Closed => Self::Closed,
            PipeError::ZeroCapacity => Self::ZeroCapacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub value: u32,
}

impl Response {
    pub fn ok(value: u32) -> Self {
        Self {
            status: Status::Ok,
            value,
        }
    }

    pub fn error(status: Status) -> Self {
        Self { status, value: 0 }
    }

    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        encode_frame(self.status as u8, self.value)
    }

    pub fn decode(buf: &[u8; FRAME_SIZE]) -> Option<Self> {
        let (status, value) = decode_frame(buf);
        Some(Self {
            status: Status::from_u8(status)?,
            value,
        })
    }
}

impl From<&PipeError> for Response {
    fn from(err: &PipeError) -> Self {
        Self::error(Status::from(err))
    }
}

#[inline(always)]
fn encode_frame(tag: u8, value: u32) -> [u8; FRAME_SIZE] {
    let mut buf = [0u8; FRAME_SIZE];
    buf[0] = tag;
    buf[4..8].copy_from_slice(&value.to_le_bytes());
    buf
}

#[inline(always)]
fn decode_frame(buf: &[u8; FRAME_SIZE]) -> (u8, u32) {
    (buf[0], u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_layout() {
        let hello = Hello::new(Identity(1000), Mode::Write);
        let bytes = hello.encode();

        assert_eq!(&bytes[0..4], b"PIPR"); // MAGIC little-endian
        assert_eq!(bytes[4], VERSION);
        assert_eq!(bytes[5], 2);
        assert_eq!(Hello::decode(&bytes), Some(hello));
    }

    #[test]
    fn test_hello_rejects_garbage() {
        let mut bytes = Hello::new(Identity(1), Mode::Read).encode();
        bytes[5] = 3; // O_RDWR tidak didukung
        assert_eq!(Hello::decode(&bytes), None);

        let mut bytes = Hello::new(Identity(1), Mode::Read).encode();
        bytes[0] ^= 0xFF;
        assert_eq!(Hello::decode(&bytes), None);
    }

    #[test]
    fn test_unknown_op_and_status() {
        assert_eq!(Request::decode(&[9, 0, 0, 0, 1, 0, 0, 0]), None);
        assert_eq!(Response::decode(&[42, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(
            Response::decode(&[9, 0, 0, 0, 0, 0, 0, 0]),
            Some(Response::error(Status::Protocol))
        );

        let req = Request::decode(&[1, 0, 0, 0, 5, 0, 0, 0]).unwrap();
        assert_eq!(req, Request::new(Op::Read, 5));
    }

    #[test]
    fn test_error_to_status() {
        let resp = Response::from(&PipeError::Busy(Mode::Read));
        assert_eq!(resp.status, Status::Busy);
        assert_eq!(Status::from(&PipeError::Interrupted), Status::Interrupted);
    }
}
