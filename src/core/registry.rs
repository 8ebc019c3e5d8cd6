//! Registry identity → channel
//!
//! Lookup dan insert-on-miss terjadi dalam satu critical section, sehingga
//! open bersamaan untuk identity yang sama tidak pernah membuat dua channel.
//! Lock registry tidak pernah dipegang selama I/O ke ring buffer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::channel::{Channel, Identity};
use crate::config::PipeConfig;
use crate::error::Result;

/// Pemetaan identity ke channel miliknya.
///
/// Channel dibuat saat pertama kali di-resolve dan tidak pernah dihapus
/// selama registry hidup, walaupun semua handle sudah ditutup.
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<Identity, Arc<Channel>>>,
    config: PipeConfig,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            config: PipeConfig::default(),
        }
    }

    pub fn with_config(config: PipeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            channels: Mutex::new(HashMap::new()),
            config,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    /// Ambil channel untuk `identity`, buat baru jika belum ada.
    ///
    /// Returns `InitError` jika alokasi channel baru gagal; registry tidak
    /// berubah dalam kasus itu.
    pub fn resolve(&self, identity: Identity) -> Result<Arc<Channel>> {
        let mut channels = self.channels.lock();
        if let Some(channel) = channels.get(&identity) {
            return Ok(Arc::clone(channel));
        }

        let channel = Arc::new(Channel::new(identity, self.config.default_capacity)?);
        channels.insert(identity, Arc::clone(&channel));
        info!(%identity, total = channels.len(), "registered new channel");
        Ok(channel)
    }

    /// Lookup tanpa membuat channel
    pub fn get(&self, identity: Identity) -> Option<Arc<Channel>> {
        self.channels.lock().get(&identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Snapshot identity yang terdaftar, terurut
    pub fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.channels.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Bangunkan semua reader yang sedang menunggu (dipakai saat shutdown)
    pub fn interrupt_all(&self) {
        let channels: Vec<Arc<Channel>> = self.channels.lock().values().cloned().collect();
        for channel in channels {
            channel.interrupt();
        }
    }
}
