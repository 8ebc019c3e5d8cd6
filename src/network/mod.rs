//! Network Layer: TCP endpoint untuk registry
//!
//! Berperan sebagai host yang menerjemahkan koneksi menjadi handle:
//! - Hello menentukan identity dan mode
//! - Thread per koneksi; read di channel boleh blocking
//! - Reader yang blocking di-poll agar client yang hilang melepas handle

mod connection;
mod server;

pub use connection::{Connection, CHUNK_SIZE};
pub use server::{Server, ServerStats, ShutdownHandle};
