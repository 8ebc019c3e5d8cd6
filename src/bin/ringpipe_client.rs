//! ringpipe Client - buka pipe milik satu identity lewat TCP endpoint
//!
//! # Usage
//!
//! ```text
//! cargo run --bin ringpipe_client -- write "hello world"
//! cargo run --bin ringpipe_client -- read 5
//! cargo run --bin ringpipe_client -- --identity 1001 resize 128
//! ```
//!
//! Tanpa `--identity`, uid proses saat ini dipakai (unix).

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::process;

use clap::{Parser, Subcommand};

use ringpipe::protocol::{Hello, Op, Request, Response, Status, FRAME_SIZE};
use ringpipe::{Identity, Mode};

#[derive(Parser, Debug)]
#[command(name = "ringpipe_client")]
#[command(about = "Read from or write to a per-identity ringpipe channel")]
struct Cli {
    /// Server address
    #[arg(long = "host", default_value = "127.0.0.1:9797")]
    host: String,

    /// Identity to open (defaults to the current uid)
    #[arg(short = 'i', long = "identity")]
    identity: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read exactly LEN bytes (blocks until available)
    Read {
        len: u32,
        /// Repeat the read this many times
        #[arg(short = 'n', long = "count", default_value_t = 1)]
        count: u32,
    },
    /// Write TEXT to the channel
    Write { text: String },
    /// Change the channel capacity
    Resize { capacity: u32 },
}

#[cfg(unix)]
fn current_identity() -> Identity {
    // SAFETY: getuid tidak pernah gagal
    Identity(unsafe { libc::getuid() })
}

#[cfg(not(unix))]
fn current_identity() -> Identity {
    Identity(0)
}

fn status_error(status: Status) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("server returned {:?}", status))
}

fn read_response(stream: &mut TcpStream) -> io::Result<Response> {
    let mut buf = [0u8; FRAME_SIZE];
    stream.read_exact(&mut buf)?;
    Response::decode(&buf)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid response frame"))
}

fn expect_ok(stream: &mut TcpStream) -> io::Result<u32> {
    let response = read_response(stream)?;
    match response.status {
        Status::Ok => Ok(response.value),
        status => Err(status_error(status)),
    }
}

/// Connect dan kirim Hello. Returns stream + kapasitas channel.
fn open(host: &str, identity: Identity, mode: Mode) -> io::Result<(TcpStream, u32)> {
    let mut stream = TcpStream::connect(host)?;
    stream.set_nodelay(true)?;
    stream.write_all(&Hello::new(identity, mode).encode())?;
    let capacity = expect_ok(&mut stream)?;
    Ok((stream, capacity))
}

fn close(mut stream: TcpStream) -> io::Result<()> {
    stream.write_all(&Request::new(Op::Close, 0).encode())?;
    expect_ok(&mut stream).map(|_| ())
}

fn run(cli: Cli) -> io::Result<()> {
    let identity = cli.identity.map(Identity).unwrap_or_else(current_identity);

    match cli.command {
        Command::Read { len, count } => {
            let (mut stream, capacity) = open(&cli.host, identity, Mode::Read)?;
            eprintln!("📖 {} opened for read (capacity {} bytes)", identity, capacity);

            let mut data = vec![0u8; len as usize];
            let stdout = io::stdout();
            for _ in 0..count {
                stream.write_all(&Request::new(Op::Read, len).encode())?;
                let got = expect_ok(&mut stream)?;
                stream.read_exact(&mut data[..got as usize])?;

                let mut out = stdout.lock();
                out.write_all(&data[..got as usize])?;
                out.write_all(b"\n")?;
            }
            close(stream)
        }
        Command::Write { text } => {
            let (mut stream, capacity) = open(&cli.host, identity, Mode::Write)?;
            let payload = text.as_bytes();

            stream.write_all(&Request::new(Op::Write, payload.len() as u32).encode())?;
            stream.write_all(payload)?;
            let accepted = expect_ok(&mut stream)?;

            if payload.len() > capacity as usize {
                eprintln!(
                    "⚠️ {} bytes exceed capacity {}; only the last {} are kept",
                    payload.len(),
                    capacity,
                    capacity
                );
            }
            eprintln!("✅ {} bytes written to {}", accepted, identity);
            close(stream)
        }
        Command::Resize { capacity } => {
            // Resize berlaku dari mode apa pun; pakai sisi write
            let (mut stream, old) = open(&cli.host, identity, Mode::Write)?;
            stream.write_all(&Request::new(Op::Resize, capacity).encode())?;
            let new = expect_ok(&mut stream)?;
            eprintln!("✅ {} resized: {} -> {} bytes", identity, old, new);
            close(stream)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ {}", e);
        process::exit(1);
    }
}
