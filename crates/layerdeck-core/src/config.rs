// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

const MIB: usize = 1024 * 1024;

/// Tunables for the template pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of fetched buffers kept in memory (default 2).
    pub cache_capacity: usize,
    /// Buffers at or above this size are never cached (default 50 MiB).
    pub cache_max_bytes: usize,
    /// Buffers above this size produce one `warning` progress event (default 20 MiB).
    pub large_buffer_warning_bytes: usize,
    /// Smallest buffer accepted as a template (default 1000 bytes).
    pub min_buffer_bytes: usize,
    /// How long the import routine may run before it is cancelled (default 120 s).
    pub parse_timeout_secs: u64,
    /// Fraction of the viewport the framed page occupies (default 0.8).
    pub frame_margin: f32,
    /// Leading bytes of a well-formed layered document.
    pub expected_signature: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 2,
            cache_max_bytes: 50 * MIB,
            large_buffer_warning_bytes: 20 * MIB,
            min_buffer_bytes: 1000,
            parse_timeout_secs: 120,
            frame_margin: 0.8,
            expected_signature: "8BPS".into(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(LoadError::Config("cache_capacity must be at least 1".into()));
        }
        if !(self.frame_margin > 0.0 && self.frame_margin <= 1.0) {
            return Err(LoadError::Config(format!(
                "frame_margin must be in (0, 1], got {}",
                self.frame_margin
            )));
        }
        if self.parse_timeout_secs == 0 {
            return Err(LoadError::Config("parse_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cache_capacity": 4 }}"#).unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.cache_capacity, 4);
        assert_eq!(config.parse_timeout_secs, 120);
        assert_eq!(config.expected_signature, "8BPS");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cache_capacity": 0 }}"#).unwrap();

        assert!(matches!(PipelineConfig::load(file.path()), Err(LoadError::Config(_))));
    }

    #[test]
    fn margin_must_be_a_fraction() {
        let config = PipelineConfig {
            frame_margin: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }
}
