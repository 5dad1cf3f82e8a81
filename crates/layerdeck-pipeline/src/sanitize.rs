// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scene sanitizer — gives the importer an empty, valid scene.
//
// Re-loading into a live editor must not leak pages from the previous
// template. Pages are torn down one by one; a page that refuses is recorded
// and skipped. A skipped page stays in the scene, so it is hidden and tagged
// with `LEFTOVER_PAGE_KEY`; later steps leave tagged pages out of the
// template. If the whole sequence fails, one fresh scene is attempted before
// giving up.

use tracing::{error, info, warn};

use layerdeck_core::error::{LoadError, Result};
use layerdeck_core::types::ItemFailure;
use layerdeck_engine::{
    BlockAccess, BlockId, CompositionEngine, EngineError, EngineResult, SceneAccess,
};

const STEP: &str = "sanitize";

/// Metadata key marking a page left over from a previous template.
pub const LEFTOVER_PAGE_KEY: &str = "layerdeck/leftover-page";

/// Scene ready for import.
#[derive(Debug, Clone)]
pub struct PreparedScene {
    pub scene: BlockId,
    /// Pages that could not be destroyed.
    pub failures: Vec<ItemFailure>,
    /// Those pages' handles. They are still in the scene, hidden.
    pub leftover: Vec<BlockId>,
    /// Whether a new scene was created rather than an existing one cleared.
    pub created: bool,
}

impl PreparedScene {
    fn fresh(scene: BlockId) -> Self {
        Self {
            scene,
            failures: Vec::new(),
            leftover: Vec::new(),
            created: true,
        }
    }
}

/// Clear or (re)create the target scene.
pub async fn prepare_scene(engine: &dyn CompositionEngine) -> Result<PreparedScene> {
    match sanitize(engine).await {
        Ok(prepared) => Ok(prepared),
        Err(err) => {
            warn!(error = %err, "scene sanitization failed, trying a fresh scene");
            fallback(engine).await
        }
    }
}

async fn sanitize(engine: &dyn CompositionEngine) -> EngineResult<PreparedScene> {
    let scenes = engine.scenes().ok_or(EngineError::Disposed)?;
    let blocks = engine.blocks().ok_or(EngineError::Disposed)?;

    let Some(scene) = scenes.current()? else {
        let scene = create_validated(scenes).await?;
        info!(%scene, "created scene");
        return Ok(PreparedScene::fresh(scene));
    };

    if !scenes.is_valid(scene)? {
        info!(%scene, "discarding stale scene");
        let scene = create_validated(scenes).await?;
        return Ok(PreparedScene::fresh(scene));
    }

    let mut failures = Vec::new();
    let mut leftover = Vec::new();
    let mut cleared = 0usize;
    for page in scenes.pages(scene)? {
        if !blocks.is_valid(page) {
            continue;
        }
        match blocks.destroy(page) {
            Ok(()) => cleared += 1,
            Err(err) => {
                warn!(%page, error = %err, "could not destroy page, hiding it");
                failures.push(ItemFailure::new(STEP, page, err));
                retire(blocks, page);
                leftover.push(page);
            }
        }
    }

    info!(%scene, cleared, skipped = failures.len(), "cleared existing scene");
    Ok(PreparedScene { scene, failures, leftover, created: false })
}

/// Hide and tag a page that survived teardown.
fn retire(blocks: &dyn BlockAccess, page: BlockId) {
    let result = blocks
        .set_visible(page, false)
        .and_then(|()| blocks.set_metadata(page, LEFTOVER_PAGE_KEY, "true"));
    if let Err(err) = result {
        warn!(%page, error = %err, "could not retire leftover page");
    }
}

/// Whether `page` was left over from an earlier template.
pub fn is_leftover(blocks: &dyn BlockAccess, page: BlockId) -> bool {
    blocks
        .metadata(page, LEFTOVER_PAGE_KEY)
        .is_ok_and(|value| value.as_deref() == Some("true"))
}

async fn fallback(engine: &dyn CompositionEngine) -> Result<PreparedScene> {
    let disposed = |detail: String| LoadError::Scene(format!("engine appears disposed ({detail})"));

    let scenes = engine
        .scenes()
        .ok_or_else(|| LoadError::EngineDisposed(format!("{STEP}: scene accessor missing")))?;

    match create_validated(scenes).await {
        Ok(scene) => {
            info!(%scene, "fallback scene created");
            Ok(PreparedScene::fresh(scene))
        }
        Err(EngineError::Disposed) => Err(LoadError::EngineDisposed(STEP.into())),
        Err(err) => {
            error!(error = %err, "fallback scene creation failed");
            Err(disposed(err.to_string()))
        }
    }
}

async fn create_validated(scenes: &dyn SceneAccess) -> EngineResult<BlockId> {
    let scene = scenes.create().await?;
    if !scenes.is_valid(scene)? {
        return Err(EngineError::InvalidHandle(scene));
    }
    Ok(scene)
}
