//! Error taxonomy untuk seluruh operasi pipe
//!
//! Semua error dikembalikan ke caller langsung. Tidak ada retry internal
//! kecuali wait loop di sisi reader.

use std::io;

use thiserror::Error;

/// Error type untuk operasi endpoint, channel, dan registry
#[derive(Debug, Error)]
pub enum PipeError {
    /// Mode (read/write) sudah dipegang handle lain untuk identity ini
    #[error("channel busy: {0} side already open")]
    Busy(crate::Mode),

    /// Alokasi gagal saat membuat channel baru
    #[error("failed to initialize channel with capacity {capacity}")]
    InitError { capacity: usize },

    /// Alokasi gagal saat resize; kapasitas lama tetap berlaku
    #[error("failed to allocate {capacity} bytes for resize")]
    AllocError { capacity: usize },

    /// Copy dari/ke buffer caller gagal di tengah operasi
    #[error("copy fault: {0}")]
    CopyFault(#[source] io::Error),

    /// Blocking read dibatalkan (interrupt atau deadline)
    #[error("read interrupted")]
    Interrupted,

    /// Operasi tidak sesuai mode handle
    #[error("handle opened for {0}")]
    WrongMode(crate::Mode),

    /// Operasi pada handle yang sudah ditutup
    #[error("handle closed")]
    Closed,

    /// Kapasitas nol tidak valid
    #[error("capacity must be non-zero")]
    ZeroCapacity,
}

pub type Result<T> = std::result::Result<T, PipeError>;

impl PipeError {
    /// `true` jika caller bisa mencoba ulang operasi yang sama
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Interrupted)
    }
}
