//! TCP endpoint server
//!
//! Satu koneksi = satu handle. Accept loop non-blocking dengan adaptive
//! sleep; setiap koneksi dilayani thread sendiri karena read di channel
//! bisa blocking.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::Connection;
use crate::config::ServerConfig;
use crate::endpoint::{Endpoint, Handle};
use crate::error::PipeError;
use crate::protocol::{Op, Response, Status};

/// Server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub reads_served: AtomicU64,
    pub writes_served: AtomicU64,
    pub errors: AtomicU64,
    /// Error yang boleh dicoba ulang client (busy, interrupted)
    pub retryable: AtomicU64,
}

impl ServerStats {
    /// Catat error operasi pipe sesuai jenisnya
    pub fn record_error(&self, err: &PipeError) {
        if err.is_recoverable() {
            self.retryable.fetch_add(1, Ordering::Relaxed);
        } else {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn print_stats(&self, uptime: Duration) {
        let bytes_in = self.bytes_received.load(Ordering::Relaxed);
        let bytes_out = self.bytes_sent.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let retryable = self.retryable.load(Ordering::Relaxed);

        println!("\n📊 Server Stats (uptime: {:.1}s)", uptime.as_secs_f64());
        println!(
            "   Connections:   {} active / {} total ({} rejected)",
            self.connections_active.load(Ordering::Relaxed),
            self.connections_total.load(Ordering::Relaxed),
            self.connections_rejected.load(Ordering::Relaxed)
        );
        println!(
            "   Writes:        {} ({} bytes in)",
            self.writes_served.load(Ordering::Relaxed),
            bytes_in
        );
        println!(
            "   Reads:         {} ({} bytes out)",
            self.reads_served.load(Ordering::Relaxed),
            bytes_out
        );
        if errors > 0 || retryable > 0 {
            println!("   Errors:        {} ⚠️ ({} retryable)", errors, retryable);
        }
    }
}

/// Flag shutdown yang bisa dibagi ke signal handler atau test
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context bersama untuk semua thread koneksi
struct Shared {
    endpoint: Endpoint,
    stats: Arc<ServerStats>,
    shutdown: ShutdownHandle,
    read_poll: Duration,
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    shared: Arc<Shared>,
}

impl Server {
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let endpoint = Endpoint::with_config(config.pipe)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Self::bind_with(config, endpoint)
    }

    /// Bind dengan endpoint yang sudah ada (registry dibagi dengan caller)
    pub fn bind_with(config: ServerConfig, endpoint: Endpoint) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)?;
        listener.set_nonblocking(true)?;

        let shared = Arc::new(Shared {
            endpoint,
            stats: Arc::new(ServerStats::default()),
            shutdown: ShutdownHandle::default(),
            read_poll: config.read_poll,
        });

        Ok(Self {
            listener,
            config,
            shared,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.shared.stats)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shared.shutdown.clone()
    }

    /// Accept loop sampai shutdown diminta
    pub fn run(&self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "ringpipe server listening");

        let start_time = Instant::now();
        let mut last_stats_print = Instant::now();
        // Clone stream per worker untuk memutus koneksi saat shutdown
        let mut workers: Vec<(JoinHandle<()>, TcpStream)> = Vec::new();
        let mut next_client_id = 0u64;

        while !self.shared.shutdown.is_shutdown() {
            let mut accepted = false;

            loop {
                match self.listener.accept() {
                    Ok((stream, addr)) => {
                        accepted = true;
                        let id = next_client_id;
                        next_client_id += 1;

                        let setup = stream
                            .try_clone()
                            .and_then(|control| Ok((Connection::new(stream, addr)?, control)));
                        match setup {
                            Ok((conn, control)) => {
                                let shared = Arc::clone(&self.shared);
                                let worker = thread::Builder::new()
                                    .name(format!("ringpipe-conn-{}", id))
                                    .spawn(move || serve_connection(id, conn, &shared))?;
                                workers.push((worker, control));
                            }
                            Err(e) => warn!(%addr, error = %e, "failed to setup client"),
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        break;
                    }
                }
            }

            workers.retain(|(worker, _)| !worker.is_finished());

            if let Some(interval) = self.config.stats_interval {
                if last_stats_print.elapsed() > interval {
                    self.shared.stats.print_stats(start_time.elapsed());
                    last_stats_print = Instant::now();
                }
            }

            if !accepted {
                thread::sleep(Duration::from_millis(5));
            }
        }

        info!(workers = workers.len(), "shutting down");
        for (_, control) in &workers {
            control.shutdown(Shutdown::Both).ok();
        }
        self.shared.endpoint.registry().interrupt_all();
        for (worker, _) in workers {
            worker.join().ok();
        }
        Ok(())
    }
}

fn serve_connection(id: u64, mut conn: Connection, shared: &Shared) {
    let stats = &shared.stats;
    stats.connections_total.fetch_add(1, Ordering::Relaxed);
    stats.connections_active.fetch_add(1, Ordering::Relaxed);

    match open_handle(&mut conn, shared) {
        Ok(Some(mut handle)) => {
            info!(
                id,
                addr = %conn.addr(),
                identity = %handle.identity(),
                mode = %handle.mode(),
                "client connected"
            );
            if let Err(e) = request_loop(&mut conn, &handle, shared) {
                debug!(id, error = %e, "connection ended with error");
            }
            handle.close();
        }
        Ok(None) => {
            stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            stats.errors.fetch_add(1, Ordering::Relaxed);
            warn!(id, addr = %conn.addr(), error = %e, "handshake failed");
        }
    }

    conn.shutdown();
    stats.connections_active.fetch_sub(1, Ordering::Relaxed);
    info!(id, "client disconnected");
}

/// Handshake + open. Returns `None` jika open ditolak (status sudah dikirim).
fn open_handle(conn: &mut Connection, shared: &Shared) -> io::Result<Option<Handle>> {
    let hello = match conn.read_hello() {
        Ok(hello) => hello,
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            conn.send_response(Response::error(Status::Protocol), &[])?;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    match shared.endpoint.open(hello.identity, hello.mode) {
        Ok(handle) => {
            conn.send_response(Response::ok(handle.capacity() as u32), &[])?;
            Ok(Some(handle))
        }
        Err(e) => {
            debug!(identity = %hello.identity, mode = %hello.mode, error = %e, "open rejected");
            conn.send_response(Response::from(&e), &[])?;
            Ok(None)
        }
    }
}

fn request_loop(conn: &mut Connection, handle: &Handle, shared: &Shared) -> io::Result<()> {
    let stats = &shared.stats;

    loop {
        let request = match conn.read_request() {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            // Status Protocol sama seperti handshake yang rusak, lalu putus
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                conn.send_response(Response::error(Status::Protocol), &[])?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let len = request.arg as usize;

        match request.op {
            Op::Read => match blocking_read(conn, handle, len, shared) {
                Some(Ok(data)) => {
                    conn.send_response(Response::ok(data.len() as u32), &data)?;
                    stats.reads_served.fetch_add(1, Ordering::Relaxed);
                    stats
                        .bytes_sent
                        .fetch_add(data.len() as u64, Ordering::Relaxed);
                }
                Some(Err(e)) => {
                    stats.record_error(&e);
                    conn.send_response(Response::from(&e), &[])?;
                }
                // Client hilang atau server shutdown
                None => return Ok(()),
            },
            Op::Write => {
                let outcome = conn.read_payload(len, |chunk| handle.write(chunk).map(|_| ()))?;
                match outcome {
                    Ok(()) => {
                        conn.send_response(Response::ok(request.arg), &[])?;
                        stats.writes_served.fetch_add(1, Ordering::Relaxed);
                        stats.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.record_error(&e);
                        conn.send_response(Response::from(&e), &[])?;
                    }
                }
            }
            Op::Resize => match handle.resize(len) {
                Ok(()) => conn.send_response(Response::ok(request.arg), &[])?,
                Err(e) => {
                    stats.record_error(&e);
                    conn.send_response(Response::from(&e), &[])?;
                }
            },
            Op::Close => {
                conn.send_response(Response::ok(0), &[])?;
                return Ok(());
            }
        }
    }
}

/// Read dengan polling: timeout per slice dipakai untuk cek apakah client
/// masih hidup dan apakah server sedang shutdown.
fn blocking_read(
    conn: &Connection,
    handle: &Handle,
    len: usize,
    shared: &Shared,
) -> Option<Result<Vec<u8>, PipeError>> {
    loop {
        match handle.read_timeout(len, shared.read_poll) {
            Err(PipeError::Interrupted) => {
                if shared.shutdown.is_shutdown() {
                    return Some(Err(PipeError::Interrupted));
                }
                if !conn.is_alive() {
                    debug!(identity = %handle.identity(), "reader vanished while blocked");
                    return None;
                }
            }
            other => return Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Mode;

    #[test]
    fn test_record_error_splits_retryable() {
        let stats = ServerStats::default();

        stats.record_error(&PipeError::Busy(Mode::Read));
        stats.record_error(&PipeError::Interrupted);
        stats.record_error(&PipeError::Closed);
        stats.record_error(&PipeError::AllocError { capacity: 64 });

        assert_eq!(stats.retryable.load(Ordering::Relaxed), 2);
        assert_eq!(stats.errors.load(Ordering::Relaxed), 2);
    }
}
