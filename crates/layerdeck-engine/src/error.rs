// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Errors raised by engine calls.

use thiserror::Error;

use crate::traits::BlockId;

/// Failure of a single call into the composition engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine has been disposed")]
    Disposed,

    #[error("invalid block handle {0}")]
    InvalidHandle(BlockId),

    #[error("import cancelled")]
    Cancelled,

    #[error("{0}")]
    Call(String),
}

/// Alias used by every engine-facing trait.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
