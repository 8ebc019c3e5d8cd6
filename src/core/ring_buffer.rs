//! Byte Ring Buffer dengan overwrite-on-overflow
//!
//! Struktur data murni tanpa sinkronisasi. Locking dilakukan oleh
//! [`Channel`](super::Channel) yang memiliki ring ini.
//!
//! Invariant:
//! - `available <= capacity`, `read_pos < capacity`, `write_pos < capacity`
//! - `write_pos == (read_pos + available) % capacity`
//! - `available` adalah satu-satunya sumber kebenaran untuk empty/full

use std::io::{self, Read, Write};

use crate::error::{PipeError, Result};

/// Status isi buffer, diturunkan dari jumlah byte yang belum dibaca
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    /// Tidak ada byte yang bisa dibaca
    Empty,
    /// Sebagian terisi
    Partial,
    /// Penuh; cursor tulis sudah menyusul cursor baca
    FullWrapped,
}

/// Fixed-capacity circular byte store
#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    available: usize,
}

/// Alokasi storage tanpa panic saat memory habis
fn allocate(capacity: usize) -> Option<Vec<u8>> {
    let mut storage = Vec::new();
    storage.try_reserve_exact(capacity).ok()?;
    Some(storage)
}

impl RingBuffer {
    /// Membuat ring buffer baru dengan kapasitas tetap.
    ///
    /// Returns `InitError` jika alokasi gagal.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipeError::ZeroCapacity);
        }
        let mut storage = allocate(capacity).ok_or(PipeError::InitError { capacity })?;
        storage.resize(capacity, 0);

        Ok(Self {
            storage,
            read_pos: 0,
            write_pos: 0,
            available: 0,
        })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Jumlah byte yang belum dibaca
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.available
    }

    #[inline(always)]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    #[inline(always)]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    pub fn fill_state(&self) -> FillState {
        match self.available {
            0 => FillState::Empty,
            n if n == self.capacity() => FillState::FullWrapped,
            _ => FillState::Partial,
        }
    }

    /// Byte yang belum dibaca, sebagai maksimal dua slice berurutan
    pub fn segments(&self) -> (&[u8], &[u8]) {
        self.segments_at(self.read_pos, self.available)
    }

    fn segments_at(&self, start: usize, len: usize) -> (&[u8], &[u8]) {
        let first = (self.capacity() - start).min(len);
        (
            &self.storage[start..start + first],
            &self.storage[..len - first],
        )
    }

    /// Tulis slice ke buffer.
    ///
    /// Returns jumlah byte lama (atau awal input) yang dibuang karena overflow.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut src = data;
        // Slice sebagai Read tidak pernah gagal selama panjangnya cukup
        self.write_from(&mut src, data.len()).unwrap_or(0)
    }

    /// Tulis tepat `len` byte dari `src`.
    ///
    /// Jika `len > capacity`, hanya `capacity` byte terakhir yang disimpan.
    /// Byte lama yang belum dibaca ditimpa jika ruang tidak cukup. Writer
    /// tidak pernah menunggu.
    ///
    /// Jika `src` gagal di tengah jalan, cursor tidak bergeser. Byte yang
    /// sudah tersalin ke storage tetap di sana.
    pub fn write_from<R: Read + ?Sized>(&mut self, src: &mut R, len: usize) -> io::Result<usize> {
        let capacity = self.capacity();
        let skip = len.saturating_sub(capacity);

        if skip > 0 {
            let skipped = io::copy(&mut (&mut *src).take(skip as u64), &mut io::sink())?;
            if skipped < skip as u64 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "source ended before declared length",
                ));
            }
        }

        let n = len - skip;
        let first = (capacity - self.write_pos).min(n);

        src.read_exact(&mut self.storage[self.write_pos..self.write_pos + first])?;
        if first < n {
            // Wraparound: sisa ditulis dari index 0
            src.read_exact(&mut self.storage[..n - first])?;
        }

        self.write_pos = (self.write_pos + n) % capacity;

        let overwritten = (self.available + n).saturating_sub(capacity);
        if overwritten > 0 {
            // Producer menyusul data yang belum dibaca
            self.read_pos = self.write_pos;
            self.available = capacity;
        } else {
            self.available += n;
        }

        Ok(skip + overwritten)
    }

    /// Baca tepat `len` byte ke `dst`.
    ///
    /// Returns `WouldBlock` jika byte tersedia kurang dari `len`; tidak ada
    /// short read. Jika `dst` gagal, cursor tidak bergeser.
    pub fn read_to<W: Write + ?Sized>(&mut self, dst: &mut W, len: usize) -> io::Result<()> {
        if self.available < len {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "not enough bytes available",
            ));
        }

        let (head, tail) = self.segments_at(self.read_pos, len);
        dst.write_all(head)?;
        if !tail.is_empty() {
            dst.write_all(tail)?;
        }

        self.read_pos = (self.read_pos + len) % self.capacity();
        self.available -= len;
        Ok(())
    }

    /// Baca tepat `out.len()` byte
    pub fn read_into(&mut self, out: &mut [u8]) -> io::Result<()> {
        let len = out.len();
        let mut dst = out;
        self.read_to(&mut dst, len)
    }

    /// Realokasi storage ke kapasitas baru.
    ///
    /// Byte yang belum dibaca dipadatkan ke awal storage baru. Jika kapasitas
    /// baru lebih kecil, hanya byte terbaru yang dipertahankan. Returns jumlah
    /// byte yang dibuang.
    pub fn resize(&mut self, new_capacity: usize) -> Result<usize> {
        if new_capacity == 0 {
            return Err(PipeError::ZeroCapacity);
        }
        let mut storage = allocate(new_capacity).ok_or(PipeError::AllocError {
            capacity: new_capacity,
        })?;

        let keep = self.available.min(new_capacity);
        let dropped = self.available - keep;
        let start = (self.read_pos + dropped) % self.capacity();

        let (head, tail) = self.segments_at(start, keep);
        storage.extend_from_slice(head);
        storage.extend_from_slice(tail);
        storage.resize(new_capacity, 0);

        self.storage = storage;
        self.read_pos = 0;
        self.write_pos = keep % new_capacity;
        self.available = keep;

        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingWriter {
        accept: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accept == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "fault"));
            }
            let n = buf.len().min(self.accept);
            self.accept -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn read_vec(rb: &mut RingBuffer, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        rb.read_into(&mut out).unwrap();
        out
    }

    #[test]
    fn test_basic_write_read() {
        let mut rb = RingBuffer::with_capacity(16).unwrap();
        assert_eq!(rb.fill_state(), FillState::Empty);

        assert_eq!(rb.write(b"hello"), 0);
        assert_eq!(rb.available(), 5);
        assert_eq!(rb.fill_state(), FillState::Partial);

        assert_eq!(read_vec(&mut rb, 5), b"hello");
        assert_eq!(rb.fill_state(), FillState::Empty);
    }

    #[test]
    fn test_roundtrip_all_lengths() {
        for capacity in 1..=12 {
            for n in 0..=capacity {
                let mut rb = RingBuffer::with_capacity(capacity).unwrap();
                // Geser cursor supaya sebagian kasus wrap
                rb.write(&vec![0xAA; capacity / 2]);
                read_vec(&mut rb, capacity / 2);

                let payload: Vec<u8> = (0..n as u8).collect();
                rb.write(&payload);
                assert_eq!(read_vec(&mut rb, n), payload, "cap={} n={}", capacity, n);
            }
        }
    }

    #[test]
    fn test_short_read_refused() {
        let mut rb = RingBuffer::with_capacity(8).unwrap();
        rb.write(b"abc");

        let mut out = [0u8; 4];
        let err = rb.read_into(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert_eq!(rb.available(), 3);
    }

    #[test]
    fn test_overflow_keeps_newest() {
        let mut rb = RingBuffer::with_capacity(4).unwrap();
        rb.write(b"abc");
        let dropped = rb.write(b"def");

        assert_eq!(dropped, 2);
        assert_eq!(rb.fill_state(), FillState::FullWrapped);
        assert_eq!(rb.read_pos(), rb.write_pos());
        assert_eq!(read_vec(&mut rb, 4), b"cdef");
    }

    #[test]
    fn test_single_write_larger_than_capacity() {
        let mut rb = RingBuffer::with_capacity(4).unwrap();
        let dropped = rb.write(b"0123456789");

        assert_eq!(dropped, 6);
        assert_eq!(read_vec(&mut rb, 4), b"6789");
    }

    #[test]
    fn test_wraparound_capacity_eight() {
        let mut rb = RingBuffer::with_capacity(8).unwrap();
        rb.write(b"ABCDEF");
        assert_eq!(read_vec(&mut rb, 4), b"ABCD");
        assert_eq!(rb.read_pos(), 4);
        assert_eq!(rb.available(), 2);

        // Tulis 6 byte: posisi 6,7 lalu wrap ke 0..3
        assert_eq!(rb.write(b"uvwxyz"), 0);
        assert_eq!(rb.write_pos(), 4);
        assert_eq!(rb.fill_state(), FillState::FullWrapped);

        assert_eq!(read_vec(&mut rb, 4), b"EFuv");
        assert_eq!(read_vec(&mut rb, 4), b"wxyz");
    }

    #[test]
    fn test_wraparound_with_overwrite() {
        let mut rb = RingBuffer::with_capacity(8).unwrap();
        rb.write(b"ABCDEF");
        read_vec(&mut rb, 4);

        // 2 belum dibaca + 7 baru > 8: byte tertua ("E") hilang
        assert_eq!(rb.write(b"tuvwxyz"), 1);
        assert_eq!(read_vec(&mut rb, 4), b"Ftuv");
        assert_eq!(read_vec(&mut rb, 4), b"wxyz");
    }

    #[test]
    fn test_copy_fault_keeps_cursors() {
        let mut rb = RingBuffer::with_capacity(8).unwrap();
        rb.write(b"abcdef");
        read_vec(&mut rb, 4);
        rb.write(b"ghij");

        let mut dst = FailingWriter { accept: 3 };
        assert!(rb.read_to(&mut dst, 6).is_err());
        assert_eq!(rb.available(), 6);
        assert_eq!(read_vec(&mut rb, 6), b"efghij");
    }

    #[test]
    fn test_write_from_short_source() {
        let mut rb = RingBuffer::with_capacity(8).unwrap();
        let mut src: &[u8] = b"abc";

        assert!(rb.write_from(&mut src, 5).is_err());
        assert_eq!(rb.available(), 0);
        assert_eq!(rb.write_pos(), 0);
    }

    #[test]
    fn test_resize_grow_preserves_unread() {
        let mut rb = RingBuffer::with_capacity(4).unwrap();
        rb.write(b"ab");
        read_vec(&mut rb, 1);
        rb.write(b"cde"); // wrap

        assert_eq!(rb.resize(16).unwrap(), 0);
        assert_eq!(rb.capacity(), 16);
        assert_eq!(rb.read_pos(), 0);
        assert_eq!(rb.segments().0, b"bcde");

        rb.write(b"fgh");
        assert_eq!(read_vec(&mut rb, 7), b"bcdefgh");
    }

    #[test]
    fn test_resize_shrink_keeps_newest() {
        let mut rb = RingBuffer::with_capacity(8).unwrap();
        rb.write(b"abcdefg");

        assert_eq!(rb.resize(3).unwrap(), 4);
        assert_eq!(rb.fill_state(), FillState::FullWrapped);
        assert_eq!(read_vec(&mut rb, 3), b"efg");
    }

    #[test]
    fn test_zero_capacity() {
        assert!(matches!(
            RingBuffer::with_capacity(0),
            Err(PipeError::ZeroCapacity)
        ));
        let mut rb = RingBuffer::with_capacity(4).unwrap();
        assert!(matches!(rb.resize(0), Err(PipeError::ZeroCapacity)));
        assert_eq!(rb.capacity(), 4);
    }

    #[test]
    fn test_allocation_failure_leaves_buffer_intact() {
        assert!(matches!(
            RingBuffer::with_capacity(usize::MAX),
            Err(PipeError::InitError {
                capacity: usize::MAX
            })
        ));

        let mut rb = RingBuffer::with_capacity(8).unwrap();
        rb.write(b"abcdef");
        read_vec(&mut rb, 2);

        assert!(matches!(
            rb.resize(usize::MAX),
            Err(PipeError::AllocError {
                capacity: usize::MAX
            })
        ));
        assert_eq!(rb.capacity(), 8);
        assert_eq!(rb.available(), 4);
        assert_eq!(rb.read_pos(), 2);
        assert_eq!(read_vec(&mut rb, 4), b"cdef");
    }
}
