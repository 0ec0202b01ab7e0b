//! Centralized configuration for Seekable.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

use std::time::Duration;

use crate::engine::SeekFlags;

/// Central configuration for all bridge components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SeekableConfig {
    pub io: IoConfig,
    pub http: HttpConfig,
    pub streaming: StreamingConfig,
}

/// Adapter buffering and container probing.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Working buffer size for each session's adapter
    pub buffer_size: usize,
    /// Bytes inspected when choosing an engine
    pub probe_size: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            buffer_size: 32768, // 32 KiB
            probe_size: 2048,
        }
    }
}

/// HTTP range source settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: format!("seekable/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Packet streaming settings.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Packets buffered between the streamer and a channel consumer
    pub channel_capacity: usize,
    /// Seek flags used by the convenience facade
    pub seek_flags: SeekFlags,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            seek_flags: SeekFlags::BACKWARD,
        }
    }
}

impl SeekableConfig {
    /// Creates configuration with environment variable overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("SEEKABLE_BUFFER_SIZE") {
            if let Ok(size) = value.parse::<usize>() {
                config.io.buffer_size = size;
            }
        }

        if let Ok(value) = std::env::var("SEEKABLE_PROBE_SIZE") {
            if let Ok(size) = value.parse::<usize>() {
                config.io.probe_size = size;
            }
        }

        if let Ok(value) = std::env::var("SEEKABLE_HTTP_TIMEOUT") {
            if let Ok(seconds) = value.parse::<u64>() {
                config.http.request_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(value) = std::env::var("SEEKABLE_CHANNEL_CAPACITY") {
            if let Ok(capacity) = value.parse::<usize>() {
                config.streaming.channel_capacity = capacity.max(1);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = SeekableConfig::default();

        assert_eq!(config.io.buffer_size, 32768);
        assert_eq!(config.io.probe_size, 2048);
        assert_eq!(config.http.request_timeout, Duration::from_secs(30));
        assert!(config.http.user_agent.starts_with("seekable/"));
        assert_eq!(config.streaming.channel_capacity, 16);
        assert_eq!(config.streaming.seek_flags, SeekFlags::BACKWARD);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("SEEKABLE_BUFFER_SIZE", "4096");
            std::env::set_var("SEEKABLE_HTTP_TIMEOUT", "5");
            std::env::set_var("SEEKABLE_CHANNEL_CAPACITY", "0");
        }

        let config = SeekableConfig::from_env();

        assert_eq!(config.io.buffer_size, 4096);
        assert_eq!(config.http.request_timeout, Duration::from_secs(5));
        assert_eq!(config.streaming.channel_capacity, 1);

        unsafe {
            std::env::remove_var("SEEKABLE_BUFFER_SIZE");
            std::env::remove_var("SEEKABLE_HTTP_TIMEOUT");
            std::env::remove_var("SEEKABLE_CHANNEL_CAPACITY");
        }
    }
}
