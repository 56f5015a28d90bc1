//! Configuration management for jailtree.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::copy::DEFAULT_BUFFER_SIZE;

/// Default loader configuration file consulted for library search paths.
pub const DEFAULT_LD_CONFIG: &str = "/etc/ld.so.conf";

/// Jailtree configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Loader configuration file (JAILTREE_LD_CONFIG).
    pub ld_config: PathBuf,
    /// Chunk size for buffered copies, in bytes (JAILTREE_COPY_BUFFER).
    pub copy_buffer: usize,
}

impl Config {
    /// Load configuration from .env and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let ld_config = env::var("JAILTREE_LD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LD_CONFIG));

        let copy_buffer = match env::var("JAILTREE_COPY_BUFFER") {
            Ok(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("invalid JAILTREE_COPY_BUFFER value: {raw}"))?,
            Err(_) => DEFAULT_BUFFER_SIZE,
        };

        Ok(Config {
            ld_config,
            copy_buffer,
        })
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  JAILTREE_LD_CONFIG: {}", self.ld_config.display());
        println!("  JAILTREE_COPY_BUFFER: {}", self.copy_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_without_environment() {
        env::remove_var("JAILTREE_LD_CONFIG");
        env::remove_var("JAILTREE_COPY_BUFFER");

        let config = Config::load().unwrap();

        assert_eq!(config.ld_config, PathBuf::from(DEFAULT_LD_CONFIG));
        assert_eq!(config.copy_buffer, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        env::set_var("JAILTREE_LD_CONFIG", "/tmp/alt-ld.conf");
        env::set_var("JAILTREE_COPY_BUFFER", "4096");

        let config = Config::load().unwrap();

        assert_eq!(config.ld_config, PathBuf::from("/tmp/alt-ld.conf"));
        assert_eq!(config.copy_buffer, 4096);

        env::remove_var("JAILTREE_LD_CONFIG");
        env::remove_var("JAILTREE_COPY_BUFFER");
    }

    #[test]
    #[serial]
    fn garbage_buffer_sizes_are_rejected() {
        env::set_var("JAILTREE_COPY_BUFFER", "lots");

        let err = Config::load().unwrap_err();
        assert!(err.to_string().contains("JAILTREE_COPY_BUFFER"));

        env::remove_var("JAILTREE_COPY_BUFFER");
    }
}
