// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sanity checks on a template buffer before it reaches the importer.

use layerdeck_core::PipelineConfig;
use layerdeck_core::error::{LoadError, Result};
use tracing::warn;

/// Reject buffers too small to be a layered document.
///
/// A missing signature is only logged: some exporters prepend junk, and the
/// importer is the final judge of the format.
pub fn validate_buffer(bytes: &[u8], config: &PipelineConfig) -> Result<()> {
    if bytes.len() < config.min_buffer_bytes {
        return Err(LoadError::CorruptBuffer {
            len: bytes.len(),
            min: config.min_buffer_bytes,
        });
    }

    let signature = config.expected_signature.as_bytes();
    if !bytes.starts_with(signature) {
        let found = String::from_utf8_lossy(&bytes[..signature.len().min(bytes.len())]).into_owned();
        warn!(
            expected = %config.expected_signature,
            found = %found,
            "unexpected file signature, attempting import anyway"
        );
    }
    Ok(())
}
