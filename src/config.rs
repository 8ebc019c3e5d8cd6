//! Konfigurasi registry dan server

use std::time::Duration;

use crate::error::{PipeError, Result};

/// Kapasitas default per channel (bytes)
pub const DEFAULT_CAPACITY: usize = 32;

/// Konfigurasi untuk [`ChannelRegistry`](crate::ChannelRegistry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeConfig {
    /// Kapasitas ring buffer untuk channel baru
    pub default_capacity: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl PipeConfig {
    pub fn with_capacity(default_capacity: usize) -> Result<Self> {
        let config = Self { default_capacity };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_capacity == 0 {
            return Err(PipeError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub pipe: PipeConfig,
    /// Interval print statistik; `None` = hanya saat shutdown
    pub stats_interval: Option<Duration>,
    /// Granularitas polling untuk reader yang sedang blocking
    pub read_poll: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9797".to_string(),
            pipe: PipeConfig::default(),
            stats_interval: Some(Duration::from_secs(5)),
            read_poll: Duration::from_millis(200),
        }
    }
}
