// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parse orchestrator — runs the external import routine under a timeout and
// reconciles engine state afterwards.
//
// When the timeout (or the caller) wins, the import's cancellation token is
// fired and the import is given a short grace period to unwind before its
// future is dropped.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use layerdeck_core::error::{LoadError, Result};
use layerdeck_core::types::{Stage, TemplateDescriptor};
use layerdeck_engine::{BlockId, CompositionEngine, EngineError, ImageEncoder, TemplateImporter};

use crate::liveness::{Checkpoint, accessors, assert_alive, engine_error};
use crate::progress::ProgressReporter;
use crate::sanitize::is_leftover;

/// How long a cancelled import may take to acknowledge.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Pages produced by a successful import.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Pages in document order; index 0 is the default front.
    pub pages: Vec<BlockId>,
    /// Import diagnostics, formatted as `severity: text`.
    pub messages: Vec<String>,
}

/// Everything the orchestrator needs besides the engine.
pub struct ParseRequest<'a> {
    pub importer: &'a dyn TemplateImporter,
    pub encoder: &'a dyn ImageEncoder,
    pub bytes: &'a [u8],
    pub template: &'a TemplateDescriptor,
    pub timeout: Duration,
    /// Pages from an earlier template that survived teardown.
    pub leftover_pages: &'a [BlockId],
}

enum Interrupt {
    Timeout,
    Cancelled,
}

/// Import `request.bytes` into the current scene.
#[instrument(skip_all, fields(template = %request.template.name, bytes = request.bytes.len()))]
pub async fn parse(
    engine: &dyn CompositionEngine,
    request: ParseRequest<'_>,
    cancel: &CancellationToken,
    progress: &ProgressReporter<'_>,
) -> Result<ParseOutcome> {
    if let Err(err) = engine.register_default_assets().await {
        warn!(error = %err, "default fonts unavailable, text may fall back");
    }

    assert_alive(engine, Checkpoint::BeforeParse)?;
    progress.emit(Stage::Parsing, format!("Parsing {}...", request.template.name), 60);
    info!(timeout_secs = request.timeout.as_secs(), "starting import");

    let import_token = cancel.child_token();
    let import = request
        .importer
        .import(engine, request.bytes, request.encoder, import_token.clone());
    tokio::pin!(import);

    let interrupted = tokio::select! {
        result = &mut import => Ok(result),
        _ = tokio::time::sleep(request.timeout) => Err(Interrupt::Timeout),
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
    };

    let result = match interrupted {
        Ok(result) => result,
        Err(interrupt) => {
            import_token.cancel();
            match tokio::time::timeout(CANCEL_GRACE, &mut import).await {
                Ok(_) => debug!("import acknowledged cancellation"),
                Err(_) => warn!("import ignored cancellation, abandoning it"),
            }
            return Err(match interrupt {
                Interrupt::Timeout => {
                    warn!("import timed out");
                    LoadError::ParseTimeout { secs: request.timeout.as_secs() }
                }
                Interrupt::Cancelled => LoadError::Cancelled,
            });
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(EngineError::Disposed) => {
            return Err(LoadError::EngineDisposed("during import".into()));
        }
        Err(EngineError::Cancelled) => return Err(LoadError::Cancelled),
        Err(err) => return Err(LoadError::Parse(err.to_string())),
    };

    assert_alive(engine, Checkpoint::AfterParse)?;

    let (scenes, blocks) = accessors(engine, "reading imported pages")?;
    let scene = scenes
        .current()
        .map_err(|e| engine_error("reading imported scene", e, LoadError::Parse))?
        .ok_or_else(|| LoadError::Parse("import left no scene".into()))?;
    let mut pages = scenes
        .pages(scene)
        .map_err(|e| engine_error("reading imported pages", e, LoadError::Parse))?;
    let before = pages.len();
    pages.retain(|page| !request.leftover_pages.contains(page) && !is_leftover(blocks, *page));
    if pages.len() < before {
        debug!(skipped = before - pages.len(), "ignoring leftover pages");
    }

    if pages.is_empty() {
        return Err(LoadError::Parse("no pages produced".into()));
    }

    let messages: Vec<String> = report.messages().iter().map(ToString::to_string).collect();
    info!(pages = pages.len(), messages = messages.len(), "import finished");
    progress.emit(Stage::Parsing, format!("Imported {} page(s)", pages.len()), 85);

    Ok(ParseOutcome { pages, messages })
}
