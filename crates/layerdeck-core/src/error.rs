// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Layerdeck.

use thiserror::Error;

/// Top-level error type for every step of the template pipeline.
#[derive(Debug, Error)]
pub enum LoadError {
    // -- Fetch errors --
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("fetch failed: server returned {status} {status_text}")]
    FetchStatus { status: u16, status_text: String },

    #[error("fetch failed: stream interrupted ({0})")]
    FetchInterrupted(String),

    // -- Buffer errors --
    #[error("template file is corrupted or too small ({len} bytes, need at least {min})")]
    CorruptBuffer { len: usize, min: usize },

    // -- Engine errors --
    #[error("editor engine disposed ({0})")]
    EngineDisposed(String),

    #[error("scene preparation failed: {0}")]
    Scene(String),

    // -- Parse errors --
    #[error("parse timeout: import did not finish within {secs}s")]
    ParseTimeout { secs: u64 },

    #[error("parse failed: {0}")]
    Parse(String),

    // -- Page visibility --
    #[error("page not found: index {index} is out of range ({page_count} pages)")]
    PageNotFound { index: usize, page_count: usize },

    #[error("template is single-sided; there is no {0} side to show")]
    SingleSided(String),

    #[error("load cancelled")]
    Cancelled,

    // -- Configuration / local I/O --
    #[error("invalid pipeline configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LoadError>;
