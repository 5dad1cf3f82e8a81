// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine liveness guard.
//
// The editor that owns the engine can tear it down at any moment (the user
// navigates away mid-download, or mid-import). The guard runs at pipeline
// entry and on both sides of the import call, and turns a vanished or
// misbehaving engine into `LoadError::EngineDisposed`. It never retries.

use tracing::warn;

use layerdeck_core::error::{LoadError, Result};
use layerdeck_engine::{BlockAccess, CompositionEngine, EngineError, SceneAccess, kinds};

/// Where in the pipeline the guard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Entry,
    BeforeParse,
    AfterParse,
}

impl Checkpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "pipeline entry",
            Self::BeforeParse => "before parse",
            Self::AfterParse => "after parse",
        }
    }
}

/// Fail with `EngineDisposed` unless both core accessors exist and a cheap
/// read through each of them succeeds.
pub fn assert_alive(engine: &dyn CompositionEngine, checkpoint: Checkpoint) -> Result<()> {
    let (scenes, blocks) = accessors(engine, checkpoint.as_str())?;

    let check = scenes
        .current()
        .map(|_| ())
        .and_then(|()| blocks.find_by_kind(kinds::SCENE).map(|_| ()));

    check.map_err(|err| {
        warn!(checkpoint = checkpoint.as_str(), error = %err, "engine failed liveness check");
        LoadError::EngineDisposed(format!("{}: {err}", checkpoint.as_str()))
    })
}

/// Both core accessors, or `EngineDisposed` naming `step`.
pub fn accessors<'a>(
    engine: &'a dyn CompositionEngine,
    step: &str,
) -> Result<(&'a dyn SceneAccess, &'a dyn BlockAccess)> {
    let scenes = engine
        .scenes()
        .ok_or_else(|| LoadError::EngineDisposed(format!("{step}: scene accessor missing")))?;
    let blocks = engine
        .blocks()
        .ok_or_else(|| LoadError::EngineDisposed(format!("{step}: block accessor missing")))?;
    Ok((scenes, blocks))
}

/// Map an engine failure inside `step`, keeping disposal distinct.
pub fn engine_error(step: &str, err: EngineError, other: impl FnOnce(String) -> LoadError) -> LoadError {
    match err {
        EngineError::Disposed => LoadError::EngineDisposed(step.to_string()),
        EngineError::Cancelled => LoadError::Cancelled,
        err => other(format!("{step}: {err}")),
    }
}
