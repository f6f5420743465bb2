use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::RuntimeError;

/// Largest pyramid exponent accepted (2^20 samples per chunk).
pub const MAX_PYRAMID_EXPONENT: u32 = 20;

/// Configuration for the process-wide library runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfiguration {
    /// Base name of the native library, without platform prefix/suffix (default: `voxengine`).
    pub library_name: String,

    /// Directories tried, in order, after the bare file name.
    pub search_directories: Vec<PathBuf>,

    /// Explicit candidate list. Replaces the computed list when set.
    pub candidate_paths: Option<Vec<PathBuf>>,

    /// ABI version passed to the native `initialize` entry point (default: 1).
    pub api_version: u32,

    /// Capture pyramid used by microphone capture.
    pub capture: CapturePyramidConfig,
}

impl RuntimeConfiguration {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.library_name.trim().is_empty() && self.candidate_paths.is_none() {
            return Err(RuntimeError::ConfigurationFailed(
                "library name must not be empty".into(),
            ));
        }
        if let Some(ref candidates) = self.candidate_paths {
            if candidates.is_empty() {
                return Err(RuntimeError::ConfigurationFailed(
                    "explicit candidate list is empty".into(),
                ));
            }
        }
        if self.api_version == 0 {
            return Err(RuntimeError::ConfigurationFailed(
                "api version must be positive".into(),
            ));
        }
        self.capture.validate()
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            RuntimeError::ConfigurationFailed(format!("failed to parse configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, RuntimeError> {
        let json = fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigurationFailed(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for RuntimeConfiguration {
    fn default() -> Self {
        Self {
            library_name: "voxengine".into(),
            search_directories: Vec::new(),
            candidate_paths: None,
            api_version: 1,
            capture: CapturePyramidConfig::default(),
        }
    }
}

/// Shape of the capture buffer pyramid: chunk sizes `2^min_exponent ..= 2^max_exponent`,
/// each with `redundancy` instances cycled round-robin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturePyramidConfig {
    pub min_exponent: u32,
    pub max_exponent: u32,
    pub redundancy: usize,
}

impl CapturePyramidConfig {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.min_exponent == 0 || self.max_exponent > MAX_PYRAMID_EXPONENT {
            return Err(RuntimeError::ConfigurationFailed(format!(
                "pyramid exponents must lie in 1..={}",
                MAX_PYRAMID_EXPONENT
            )));
        }
        if self.min_exponent > self.max_exponent {
            return Err(RuntimeError::ConfigurationFailed(format!(
                "min exponent {} exceeds max exponent {}",
                self.min_exponent, self.max_exponent
            )));
        }
        if self.redundancy == 0 {
            return Err(RuntimeError::ConfigurationFailed(
                "pyramid redundancy must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Chunk sizes from largest to smallest.
    pub fn chunk_sizes(&self) -> impl Iterator<Item = usize> {
        (self.min_exponent..=self.max_exponent)
            .rev()
            .map(|exponent| 1usize << exponent)
    }

    pub fn smallest_chunk(&self) -> usize {
        1usize << self.min_exponent
    }
}

impl Default for CapturePyramidConfig {
    fn default() -> Self {
        Self {
            min_exponent: 10,
            max_exponent: 11,
            redundancy: 4,
        }
    }
}

/// Format of one encoder or decoder stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfiguration {
    /// Sample rate in Hz (default: 48000).
    pub sample_rate: u32,
    /// 1 = mono, 2 = interleaved stereo (default: 1).
    pub channels: u16,
}

impl StreamConfiguration {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.sample_rate == 0 {
            return Err(RuntimeError::ConfigurationFailed(
                "sample rate must be positive".into(),
            ));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(RuntimeError::ConfigurationFailed(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        Ok(())
    }
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
        }
    }
}
