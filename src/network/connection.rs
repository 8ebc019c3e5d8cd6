//! Connection handling untuk TCP endpoint
//!
//! Blocking I/O, satu thread per koneksi. Payload write dibaca per chunk ke
//! buffer pre-allocated supaya channel lock tidak dipegang selama menunggu
//! socket.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use crate::protocol::{Hello, Request, Response, FRAME_SIZE, HELLO_SIZE};

/// Ukuran chunk untuk payload write
pub const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Wrapper TcpStream dengan framing protocol
pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    chunk: Box<[u8]>,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        // Disable Nagle's algorithm untuk lower latency
        stream.set_nodelay(true)?;
        tune_socket_buffers(&stream);

        Ok(Self {
            stream,
            addr,
            chunk: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
        })
    }

    #[inline(always)]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Baca handshake.
    ///
    /// Returns `InvalidData` jika frame tidak valid.
    pub fn read_hello(&mut self) -> io::Result<Hello> {
        let mut buf = [0u8; HELLO_SIZE];
        self.stream.read_exact(&mut buf)?;
        Hello::decode(&buf).ok_or_else(|| invalid_data("invalid hello frame"))
    }

    /// Baca request berikutnya. Returns `None` jika client menutup koneksi
    /// di batas frame.
    pub fn read_request(&mut self) -> io::Result<Option<Request>> {
        let mut buf = [0u8; FRAME_SIZE];
        match self.stream.read_exact(&mut buf) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        Request::decode(&buf)
            .map(Some)
            .ok_or_else(|| invalid_data("invalid request frame"))
    }

    /// Baca `len` byte payload dalam chunk, serahkan tiap chunk ke `sink`.
    ///
    /// Payload selalu dikonsumsi habis walaupun `sink` gagal, supaya
    /// framing tetap sinkron. Error pertama dari `sink` dikembalikan.
    pub fn read_payload<E, F>(&mut self, len: usize, mut sink: F) -> io::Result<Result<(), E>>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        let mut remaining = len;
        let mut outcome = Ok(());

        while remaining > 0 {
            let n = remaining.min(self.chunk.len());
            self.stream.read_exact(&mut self.chunk[..n])?;
            remaining -= n;

            if outcome.is_ok() {
                outcome = sink(&self.chunk[..n]);
            }
        }

        Ok(outcome)
    }

    pub fn send_response(&mut self, response: Response, body: &[u8]) -> io::Result<()> {
        self.stream.write_all(&response.encode())?;
        if !body.is_empty() {
            self.stream.write_all(body)?;
        }
        self.stream.flush()
    }

    /// Check if connection is still alive
    pub fn is_alive(&self) -> bool {
        let mut peek_buf = [0u8; 1];
        if self.stream.set_nonblocking(true).is_err() {
            return false;
        }
        let alive = match self.stream.peek(&mut peek_buf) {
            Ok(0) => false, // EOF
            Ok(_) => true,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        };
        self.stream.set_nonblocking(false).is_ok() && alive
    }

    pub fn shutdown(&self) {
        self.stream.shutdown(std::net::Shutdown::Both).ok();
    }
}

fn invalid_data(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Perbesar socket buffer. Error diabaikan; tidak semua platform mendukung.
#[cfg(unix)]
fn tune_socket_buffers(stream: &TcpStream) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let optval: libc::c_int = 256 * 1024; // 256KB
    for opt in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        // SAFETY: fd valid selama `stream` hidup, optval berukuran c_int
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                &optval as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }
    }
}

#[cfg(not(unix))]
fn tune_socket_buffers(_stream: &TcpStream) {}
