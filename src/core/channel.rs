//! Channel: satu ring buffer per identity dengan monitor lock
//!
//! Semua mutasi ring buffer dan occupancy flag terjadi di bawah satu
//! `Mutex`. Reader yang kekurangan data menunggu di `Condvar` yang sama;
//! writer hanya memberi sinyal, tidak pernah menunggu.

use std::fmt;
use std::io::{Read, Write};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use super::ring_buffer::{FillState, RingBuffer};
use crate::error::{PipeError, Result};

/// Token identitas pemilik channel (uid pada host aslinya)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(pub u32);

impl From<u32> for Identity {
    fn from(uid: u32) -> Self {
        Self(uid)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

/// Arah akses sebuah handle
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Read = 1,
    Write = 2,
}

impl Mode {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Counter kumulatif per channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub bytes_written: u64,
    pub bytes_read: u64,
    /// Byte yang ditimpa sebelum sempat dibaca
    pub bytes_discarded: u64,
    pub reader_opens: u64,
    pub writer_opens: u64,
    pub copy_faults: u64,
}

struct ChannelState {
    ring: RingBuffer,
    reader_open: bool,
    writer_open: bool,
    // Naik setiap interrupt(); reader membandingkan dengan snapshot miliknya
    interrupt_epoch: u64,
    stats: ChannelStats,
}

impl ChannelState {
    fn flag_mut(&mut self, mode: Mode) -> &mut bool {
        match mode {
            Mode::Read => &mut self.reader_open,
            Mode::Write => &mut self.writer_open,
        }
    }
}

/// Per-identity byte channel
pub struct Channel {
    owner: Identity,
    state: Mutex<ChannelState>,
    readable: Condvar,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Channel")
            .field("owner", &self.owner)
            .field("capacity", &state.ring.capacity())
            .field("available", &state.ring.available())
            .field("reader_open", &state.reader_open)
            .field("writer_open", &state.writer_open)
            .finish()
    }
}

impl Channel {
    /// Membuat channel kosong untuk `owner`.
    ///
    /// Kegagalan alokasi dilaporkan sebagai `InitError`.
    pub fn new(owner: Identity, capacity: usize) -> Result<Self> {
        let ring = RingBuffer::with_capacity(capacity)?;
        debug!(%owner, capacity, "channel created");

        Ok(Self {
            owner,
            state: Mutex::new(ChannelState {
                ring,
                reader_open: false,
                writer_open: false,
                interrupt_epoch: 0,
                stats: ChannelStats::default(),
            }),
            readable: Condvar::new(),
        })
    }

    #[inline(always)]
    pub fn owner(&self) -> Identity {
        self.owner
    }

    /// Klaim sisi `mode`. Gagal `Busy` jika sisi itu sudah terbuka.
    pub fn acquire(&self, mode: Mode) -> Result<()> {
        let mut state = self.state.lock();
        let flag = state.flag_mut(mode);
        if *flag {
            debug!(owner = %self.owner, %mode, "open rejected: busy");
            return Err(PipeError::Busy(mode));
        }
        *flag = true;

        match mode {
            Mode::Read => state.stats.reader_opens += 1,
            Mode::Write => state.stats.writer_opens += 1,
        }
        debug!(owner = %self.owner, %mode, "side opened");
        Ok(())
    }

    /// Lepas sisi `mode`. Isi buffer tidak disentuh.
    pub fn release(&self, mode: Mode) {
        let mut state = self.state.lock();
        *state.flag_mut(mode) = false;
        debug!(owner = %self.owner, %mode, "side closed");
    }

    pub fn is_open(&self, mode: Mode) -> bool {
        let mut state = self.state.lock();
        *state.flag_mut(mode)
    }

    /// Tulis tepat `len` byte dari `src` lalu bangunkan reader.
    ///
    /// Returns `len`, termasuk byte yang langsung tertimpa.
    pub fn write_from<R: Read + ?Sized>(&self, src: &mut R, len: usize) -> Result<usize> {
        let mut state = self.state.lock();

        let discarded = match state.ring.write_from(src, len) {
            Ok(discarded) => discarded,
            Err(e) => {
                state.stats.copy_faults += 1;
                warn!(owner = %self.owner, len, error = %e, "copy from writer failed");
                return Err(PipeError::CopyFault(e));
            }
        };

        state.stats.bytes_written += len as u64;
        if discarded > 0 {
            state.stats.bytes_discarded += discarded as u64;
            debug!(owner = %self.owner, discarded, "overflow: unread bytes overwritten");
        }
        trace!(
            owner = %self.owner,
            len,
            available = state.ring.available(),
            write_pos = state.ring.write_pos(),
            "write"
        );

        self.readable.notify_all();
        Ok(len)
    }

    /// Baca tepat `len` byte ke `dst`, menunggu sampai tersedia.
    ///
    /// Menunggu di condvar dengan lock dilepas; predicate dicek ulang setiap
    /// kali bangun. Returns `Interrupted` jika [`interrupt`](Self::interrupt)
    /// dipanggil selama menunggu atau `deadline` lewat.
    pub fn read_to<W: Write + ?Sized>(
        &self,
        dst: &mut W,
        len: usize,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let epoch = state.interrupt_epoch;

        loop {
            if state.interrupt_epoch != epoch {
                debug!(owner = %self.owner, len, "blocked read interrupted");
                return Err(PipeError::Interrupted);
            }

            if state.ring.available() >= len {
                break;
            }

            trace!(
                owner = %self.owner,
                len,
                available = state.ring.available(),
                "reader sleeping"
            );
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(PipeError::Interrupted);
                    }
                    self.readable.wait_until(&mut state, deadline);
                }
                None => self.readable.wait(&mut state),
            }
        }

        if let Err(e) = state.ring.read_to(dst, len) {
            state.stats.copy_faults += 1;
            warn!(owner = %self.owner, len, error = %e, "copy to reader failed");
            return Err(PipeError::CopyFault(e));
        }

        state.stats.bytes_read += len as u64;
        trace!(
            owner = %self.owner,
            len,
            available = state.ring.available(),
            read_pos = state.ring.read_pos(),
            "read"
        );
        Ok(())
    }

    /// Batalkan semua read yang sedang menunggu di channel ini
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupt_epoch = state.interrupt_epoch.wrapping_add(1);
        self.readable.notify_all();
    }

    /// Ganti kapasitas ring buffer.
    ///
    /// Reader yang menunggu dibangunkan dan mengecek ulang predicate-nya
    /// terhadap kapasitas baru.
    pub fn resize(&self, new_capacity: usize) -> Result<()> {
        let mut state = self.state.lock();
        let old_capacity = state.ring.capacity();

        let discarded = state.ring.resize(new_capacity)?;
        state.stats.bytes_discarded += discarded as u64;
        debug!(
            owner = %self.owner,
            old_capacity,
            new_capacity,
            discarded,
            "channel resized"
        );

        self.readable.notify_all();
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }

    pub fn available(&self) -> usize {
        self.state.lock().ring.available()
    }

    pub fn fill_state(&self) -> FillState {
        self.state.lock().ring.fill_state()
    }

    pub fn stats(&self) -> ChannelStats {
        self.state.lock().stats
    }
}
