//! The 32-byte RSP configuration block.
//!
//! Byte 0 enables high-level graphics emulation, byte 1 high-level audio;
//! the remaining 30 bytes are reserved and round-tripped verbatim so older
//! and newer builds can share one file.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Size of the on-disk configuration block
pub const CONFIG_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("config file too short: {0} bytes, expected {CONFIG_LEN}")]
    TooShort(usize),
}

/// RSP plugin configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    block: [u8; CONFIG_LEN],
}

impl Config {
    /// Configuration with every option disabled
    pub fn new() -> Self {
        Self {
            block: [0; CONFIG_LEN],
        }
    }

    /// Build a configuration from a raw 32-byte block
    pub fn from_block(block: [u8; CONFIG_LEN]) -> Self {
        Self { block }
    }

    /// Load the block from a file.
    ///
    /// Extra trailing bytes are ignored; a short file is an error so the
    /// caller can report it and fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read(path)?;
        if data.len() < CONFIG_LEN {
            return Err(ConfigError::TooShort(data.len()));
        }
        let mut block = [0; CONFIG_LEN];
        block.copy_from_slice(&data[..CONFIG_LEN]);
        Ok(Self { block })
    }

    /// Persist the block
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.block)?;
        Ok(())
    }

    /// Hand graphics tasks to the host's display list processor
    pub fn hle_gfx(&self) -> bool {
        self.block[0] != 0
    }

    /// Hand audio tasks to the host's audio list processor
    pub fn hle_aud(&self) -> bool {
        self.block[1] != 0
    }

    pub fn set_hle_gfx(&mut self, enabled: bool) {
        self.block[0] = enabled as u8;
    }

    pub fn set_hle_aud(&mut self, enabled: bool) {
        self.block[1] = enabled as u8;
    }

    /// Raw view of the block
    pub fn block(&self) -> &[u8; CONFIG_LEN] {
        &self.block
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_off() {
        let cfg = Config::new();
        assert!(!cfg.hle_gfx());
        assert!(!cfg.hle_aud());
    }

    #[test]
    fn test_flag_bytes() {
        let mut block = [0u8; CONFIG_LEN];
        block[0] = 1;
        let cfg = Config::from_block(block);
        assert!(cfg.hle_gfx());
        assert!(!cfg.hle_aud());

        let mut cfg = cfg;
        cfg.set_hle_aud(true);
        assert!(cfg.hle_aud());
    }

    #[test]
    fn test_round_trip_preserves_reserved_bytes() {
        let dir = std::env::temp_dir().join("emu_rsp_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rsp_conf.bin");

        let mut block = [0u8; CONFIG_LEN];
        block[0] = 1;
        block[17] = 0xAB;
        Config::from_block(block).save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.block()[17], 0xAB);
        assert!(loaded.hle_gfx());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_short_file_is_error() {
        let dir = std::env::temp_dir().join("emu_rsp_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rsp_conf_short.bin");
        std::fs::write(&path, [0u8; 8]).unwrap();

        match Config::load(&path) {
            Err(ConfigError::TooShort(8)) => {}
            other => panic!("expected TooShort error, got {:?}", other),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/rsp_conf.bin").is_err());
    }
}
