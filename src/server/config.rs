//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pacer::Pacer;
use crate::registry::{DropPolicy, RegistryConfig};
use crate::source::SourceMode;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8000;

/// Default payload path
pub const DEFAULT_PAYLOAD: &str = "./fousekis_all.mp3";

/// Default chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default target bitrate (bits per second)
pub const DEFAULT_BITRATE: u64 = 128_000;

/// How long open streams may take to finish after a shutdown signal
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Content type used when none is configured and the extension says nothing
pub const FALLBACK_CONTENT_TYPE: &str = "audio/mpeg";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Payload to broadcast
    pub payload: PathBuf,

    /// How the payload is read
    pub source_mode: SourceMode,

    /// Bytes per chunk
    pub chunk_size: usize,

    /// Target output bitrate in bits per second
    pub bitrate: u64,

    /// Per-consumer queue and drop policy
    pub registry: RegistryConfig,

    /// Content type announced to listeners (guessed from the payload if unset)
    pub content_type: Option<String>,

    /// Time allowed for open connections to close after shutdown
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            payload: PathBuf::from(DEFAULT_PAYLOAD),
            source_mode: SourceMode::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            bitrate: DEFAULT_BITRATE,
            registry: RegistryConfig::default(),
            content_type: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Read the configuration from the process environment
    ///
    /// See [`from_lookup`](Self::from_lookup) for the variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a variable lookup
    ///
    /// | Variable           | Default              |
    /// |--------------------|----------------------|
    /// | `FILENAME`         | `./fousekis_all.mp3` |
    /// | `PORT`             | `8000`               |
    /// | `BIND_ADDR`        | `0.0.0.0:$PORT`      |
    /// | `CHUNK_SIZE`       | `4096`               |
    /// | `BITRATE`          | `128000`             |
    /// | `QUEUE_CAPACITY`   | `100`                |
    /// | `DROP_POLICY`      | `evict`              |
    /// | `SOURCE_MODE`      | `streaming`          |
    /// | `CONTENT_TYPE`     | guessed from payload |
    /// | `DRAIN_TIMEOUT_MS` | `5000`               |
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get("FILENAME") {
            config.payload = PathBuf::from(path);
        }
        if let Some(port) = get("PORT") {
            let port: u16 = parse("PORT", &port)?;
            config.bind_addr.set_port(port);
        }
        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", &addr)?;
        }
        if let Some(size) = get("CHUNK_SIZE") {
            config.chunk_size = parse("CHUNK_SIZE", &size)?;
        }
        if let Some(bitrate) = get("BITRATE") {
            config.bitrate = parse("BITRATE", &bitrate)?;
        }
        if let Some(capacity) = get("QUEUE_CAPACITY") {
            config.registry.queue_capacity = parse("QUEUE_CAPACITY", &capacity)?;
        }
        if let Some(policy) = get("DROP_POLICY") {
            config.registry.drop_policy = parse("DROP_POLICY", &policy)?;
        }
        if let Some(mode) = get("SOURCE_MODE") {
            config.source_mode = parse("SOURCE_MODE", &mode)?;
        }
        if let Some(content_type) = get("CONTENT_TYPE") {
            config.content_type = Some(content_type);
        }
        if let Some(millis) = get("DRAIN_TIMEOUT_MS") {
            config.drain_timeout = Duration::from_millis(parse("DRAIN_TIMEOUT_MS", &millis)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the payload path
    pub fn payload(mut self, path: impl Into<PathBuf>) -> Self {
        self.payload = path.into();
        self
    }

    /// Set the source mode
    pub fn source_mode(mut self, mode: SourceMode) -> Self {
        self.source_mode = mode;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set target bitrate in bits per second
    pub fn bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Set the per-consumer queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.registry = self.registry.queue_capacity(capacity);
        self
    }

    /// Set the drop policy
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.registry = self.registry.drop_policy(policy);
        self
    }

    /// Set the announced content type
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set how long open streams may take to close after shutdown
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Check that the numeric settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("CHUNK_SIZE", "must be greater than zero"));
        }
        if self.bitrate == 0 {
            return Err(Error::config("BITRATE", "must be greater than zero"));
        }
        if self.registry.queue_capacity == 0 {
            return Err(Error::config("QUEUE_CAPACITY", "must be greater than zero"));
        }
        Ok(())
    }

    /// Pacer for the configured chunk size and bitrate
    pub fn pacer(&self) -> Result<Pacer> {
        Pacer::for_bitrate(self.chunk_size, self.bitrate)
    }

    /// Content type announced on the stream
    pub fn resolved_content_type(&self) -> String {
        match self.content_type {
            Some(ref content_type) => content_type.clone(),
            None => guess_content_type(&self.payload),
        }
    }
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .iter()
        .find(|mime| matches!(mime.type_().as_str(), "audio" | "video"))
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

fn parse<T>(key: &'static str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| Error::config(key, format!("{value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.payload, PathBuf::from(DEFAULT_PAYLOAD));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.bitrate, DEFAULT_BITRATE);
        assert_eq!(config.source_mode, SourceMode::Streaming);
        assert_eq!(config.registry.drop_policy, DropPolicy::Evict);
        assert_eq!(config.drain_timeout, DEFAULT_DRAIN_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8001);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.payload, PathBuf::from(DEFAULT_PAYLOAD));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("FILENAME", "/srv/radio/loop.ogg"),
            ("PORT", "9090"),
            ("CHUNK_SIZE", "1600"),
            ("BITRATE", "64000"),
            ("QUEUE_CAPACITY", "10"),
            ("DROP_POLICY", "skip"),
            ("SOURCE_MODE", "buffered"),
            ("DRAIN_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.payload, PathBuf::from("/srv/radio/loop.ogg"));
        assert_eq!(config.bind_addr.port(), 9090);
        assert_eq!(config.chunk_size, 1600);
        assert_eq!(config.bitrate, 64_000);
        assert_eq!(config.registry.queue_capacity, 10);
        assert_eq!(config.registry.drop_policy, DropPolicy::Skip);
        assert_eq!(config.source_mode, SourceMode::Buffered);
        assert_eq!(config.drain_timeout, Duration::from_millis(250));
        assert_eq!(config.pacer().unwrap().interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_bind_addr_overrides_port() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("BIND_ADDR", "127.0.0.1:7000"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:7000".parse().unwrap());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "PORT", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("BITRATE", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "BITRATE", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("DROP_POLICY", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "DROP_POLICY", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("QUEUE_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "QUEUE_CAPACITY", .. }));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "  ")])).unwrap();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .payload("song.mp3")
            .chunk_size(1600)
            .bitrate(320_000)
            .queue_capacity(10)
            .drop_policy(DropPolicy::Skip)
            .source_mode(SourceMode::Buffered)
            .content_type("audio/aac")
            .drain_timeout(Duration::from_secs(1));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.payload, PathBuf::from("song.mp3"));
        assert_eq!(config.chunk_size, 1600);
        assert_eq!(config.bitrate, 320_000);
        assert_eq!(config.registry.queue_capacity, 10);
        assert_eq!(config.registry.drop_policy, DropPolicy::Skip);
        assert_eq!(config.source_mode, SourceMode::Buffered);
        assert_eq!(config.resolved_content_type(), "audio/aac");
        assert_eq!(config.drain_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_content_type_guess() {
        let mp3 = ServerConfig::default().payload("a/b/track.mp3");
        assert_eq!(mp3.resolved_content_type(), "audio/mpeg");

        let unknown = ServerConfig::default().payload("track.bin");
        assert_eq!(unknown.resolved_content_type(), FALLBACK_CONTENT_TYPE);

        let none = ServerConfig::default().payload("track");
        assert_eq!(none.resolved_content_type(), FALLBACK_CONTENT_TYPE);
    }
}
