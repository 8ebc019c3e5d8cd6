//! Endpoint API: open/close/read/write/resize
//!
//! Lapisan tipis di atas [`ChannelRegistry`] dan [`Channel`]. Setiap `open`
//! menghasilkan [`Handle`] yang terikat ke satu channel dan satu mode,
//! setara dengan file descriptor yang dibuka read-only atau write-only.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PipeConfig;
use crate::core::{Channel, ChannelRegistry, ChannelStats, Identity, Mode};
use crate::error::{PipeError, Result};

/// Titik masuk untuk host (server, test harness, dll)
#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    registry: Arc<ChannelRegistry>,
}

impl Endpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PipeConfig) -> Result<Self> {
        let registry = ChannelRegistry::with_config(config)?;
        Ok(Self::from_registry(Arc::new(registry)))
    }

    /// Endpoint di atas registry yang sudah ada; channel dibagi dengan
    /// semua endpoint lain yang memegang registry yang sama.
    pub fn from_registry(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Buka channel milik `identity` untuk `mode`.
    ///
    /// Registry lock sudah dilepas sebelum channel lock diambil.
    pub fn open(&self, identity: Identity, mode: Mode) -> Result<Handle> {
        let channel = self.registry.resolve(identity)?;
        channel.acquire(mode)?;

        Ok(Handle {
            channel,
            mode,
            open: true,
        })
    }
}

/// Handle terbuka ke satu channel.
///
/// Drop menutup handle. `close` boleh dipanggil berulang kali.
#[derive(Debug)]
pub struct Handle {
    channel: Arc<Channel>,
    mode: Mode,
    open: bool,
}

impl Handle {
    #[inline(always)]
    pub fn identity(&self) -> Identity {
        self.channel.owner()
    }

    #[inline(always)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn check(&self, wanted: Mode) -> Result<()> {
        if !self.open {
            return Err(PipeError::Closed);
        }
        if self.mode != wanted {
            return Err(PipeError::WrongMode(self.mode));
        }
        Ok(())
    }

    /// Tulis seluruh `data`. Returns `data.len()`.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut src = data;
        self.write_from(&mut src, data.len())
    }

    /// Tulis tepat `len` byte yang diambil dari `src`
    pub fn write_from<R: Read + ?Sized>(&self, src: &mut R, len: usize) -> Result<usize> {
        self.check(Mode::Write)?;
        self.channel.write_from(src, len)
    }

    /// Baca tepat `len` byte, blocking sampai tersedia
    pub fn read(&self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.min(self.channel.capacity()));
        self.read_to(&mut out, len)?;
        Ok(out)
    }

    /// Isi seluruh `out`, blocking sampai tersedia
    pub fn read_into(&self, out: &mut [u8]) -> Result<()> {
        let len = out.len();
        let mut dst = out;
        self.read_to(&mut dst, len)
    }

    pub fn read_to<W: Write + ?Sized>(&self, dst: &mut W, len: usize) -> Result<()> {
        self.check(Mode::Read)?;
        self.channel.read_to(dst, len, None)
    }

    /// Seperti [`read`](Self::read) tapi menyerah dengan `Interrupted`
    /// setelah `timeout`
    pub fn read_timeout(&self, len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.min(self.channel.capacity()));
        self.read_to_timeout(&mut out, len, timeout)?;
        Ok(out)
    }

    pub fn read_to_timeout<W: Write + ?Sized>(
        &self,
        dst: &mut W,
        len: usize,
        timeout: Duration,
    ) -> Result<()> {
        self.check(Mode::Read)?;
        self.channel
            .read_to(dst, len, Some(Instant::now() + timeout))
    }

    /// Ganti kapasitas channel. Berlaku untuk handle mode apa pun.
    pub fn resize(&self, new_capacity: usize) -> Result<()> {
        if !self.open {
            return Err(PipeError::Closed);
        }
        self.channel.resize(new_capacity)
    }

    /// Handle terpisah untuk membatalkan read yang sedang blocking dari
    /// thread lain
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            channel: Arc::clone(&self.channel),
        }
    }

    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }

    pub fn stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    /// Lepas occupancy flag. Panggilan kedua tidak berefek.
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            self.channel.release(self.mode);
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pembatal blocking read untuk satu channel
#[derive(Debug, Clone)]
pub struct Interrupter {
    channel: Arc<Channel>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.channel.interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_open_busy_per_mode() {
        let endpoint = Endpoint::new();
        let _reader = endpoint.open(Identity(1), Mode::Read).unwrap();

        assert!(matches!(
            endpoint.open(Identity(1), Mode::Read),
            Err(PipeError::Busy(Mode::Read))
        ));

        let _writer = endpoint.open(Identity(1), Mode::Write).unwrap();
        assert!(matches!(
            endpoint.open(Identity(1), Mode::Write),
            Err(PipeError::Busy(Mode::Write))
        ));

        // Identity lain tidak terpengaruh
        assert!(endpoint.open(Identity(2), Mode::Read).is_ok());
    }

    #[test]
    fn test_close_idempotent() {
        let endpoint = Endpoint::new();
        let mut first = endpoint.open(Identity(1), Mode::Read).unwrap();
        first.close();
        assert!(!first.is_open());

        let second = endpoint.open(Identity(1), Mode::Read).unwrap();

        // Close ulang tidak boleh melepas flag milik `second`
        first.close();
        assert!(matches!(
            endpoint.open(Identity(1), Mode::Read),
            Err(PipeError::Busy(Mode::Read))
        ));
        assert!(second.is_open());
    }

    #[test]
    fn test_drop_releases() {
        let endpoint = Endpoint::new();
        {
            let _writer = endpoint.open(Identity(5), Mode::Write).unwrap();
        }
        assert!(endpoint.open(Identity(5), Mode::Write).is_ok());

        // Channel tetap ada setelah semua handle ditutup
        assert_eq!(endpoint.registry().len(), 1);
    }

    #[test]
    fn test_wrong_mode_and_closed() {
        let endpoint = Endpoint::new();
        let mut reader = endpoint.open(Identity(1), Mode::Read).unwrap();
        let writer = endpoint.open(Identity(1), Mode::Write).unwrap();

        assert!(matches!(
            reader.write(b"x"),
            Err(PipeError::WrongMode(Mode::Read))
        ));
        assert!(matches!(
            writer.read(1),
            Err(PipeError::WrongMode(Mode::Write))
        ));

        reader.close();
        assert!(matches!(reader.read(1), Err(PipeError::Closed)));
        assert!(matches!(reader.resize(64), Err(PipeError::Closed)));
    }

    #[test]
    fn test_contents_survive_close() {
        let endpoint = Endpoint::new();
        let mut writer = endpoint.open(Identity(9), Mode::Write).unwrap();
        assert_eq!(writer.write(b"persist").unwrap(), 7);
        writer.close();

        let reader = endpoint.open(Identity(9), Mode::Read).unwrap();
        assert_eq!(reader.read(7).unwrap(), b"persist");
    }

    #[test]
    fn test_identities_isolated() {
        let endpoint = Endpoint::new();
        let writer_a = endpoint.open(Identity(1), Mode::Write).unwrap();
        let reader_b = endpoint.open(Identity(2), Mode::Read).unwrap();

        writer_a.write(b"secret").unwrap();
        assert!(matches!(
            reader_b.read_timeout(1, Duration::from_millis(20)),
            Err(PipeError::Interrupted)
        ));
    }

    #[test]
    fn test_resize_from_either_side() {
        let endpoint = Endpoint::new();
        let writer = endpoint.open(Identity(3), Mode::Write).unwrap();
        let reader = endpoint.open(Identity(3), Mode::Read).unwrap();

        writer.resize(64).unwrap();
        assert_eq!(reader.capacity(), 64);

        writer.write(&[7u8; 48]).unwrap();
        assert_eq!(reader.read(48).unwrap(), vec![7u8; 48]);

        reader.resize(16).unwrap();
        assert_eq!(writer.capacity(), 16);
    }

    #[test]
    fn test_interrupter_from_other_thread() {
        let endpoint = Endpoint::new();
        let reader = endpoint.open(Identity(4), Mode::Read).unwrap();
        let interrupter = reader.interrupter();

        let waiter = thread::spawn(move || reader.read(8));
        while !waiter.is_finished() {
            interrupter.interrupt();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(
            waiter.join().unwrap(),
            Err(PipeError::Interrupted)
        ));
    }
}
