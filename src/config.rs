//! Server configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::aof::DEFAULT_SYNC_INTERVAL;
use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_PORT: u16 = 6379;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    pub bind: String,

    pub port: u16,

    /// Whether writes are recorded in, and the store rebuilt from, the append-only file.
    pub aof_enabled: bool,

    pub aof_path: PathBuf,

    /// How often the append-only file is fsynced. Bounds the writes lost on a crash.
    pub aof_sync_interval: Duration,

    /// Upper bound on the bytes buffered for a single incoming frame.
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            aof_enabled: true,
            aof_path: PathBuf::from("appendonly.aof"),
            aof_sync_interval: DEFAULT_SYNC_INTERVAL,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.bind = bind.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn aof_enabled(mut self, enabled: bool) -> Self {
        self.config.aof_enabled = enabled;
        self
    }

    pub fn aof_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.aof_path = path.into();
        self
    }

    pub fn aof_sync_interval(mut self, interval: Duration) -> Self {
        self.config.aof_sync_interval = interval;
        self
    }

    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
