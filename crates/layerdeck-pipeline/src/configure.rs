// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capability configurator — assigns end-user editing permissions to every
// imported block.
//
// Each block is configured independently. A block that fails is recorded in
// the report and the walk moves on; only a vanished engine stops it.

use tracing::{debug, info, instrument, warn};

use layerdeck_core::error::{LoadError, Result};
use layerdeck_core::types::ItemFailure;
use layerdeck_engine::{BlockAccess, BlockId, CompositionEngine, EngineResult, Scope, kinds};

use crate::liveness::accessors;

const STEP: &str = "configure";

/// Metadata key tagging a block whose image content may be swapped.
pub const REPLACEABLE_IMAGE_KEY: &str = "layerdeck/replaceable-image";

/// What a block is, as far as editing permissions go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockClass {
    /// Image or graphic: content can be replaced.
    Image,
    /// Text: content editable, layout locked.
    Text,
    /// Anything else, left exactly as imported.
    Other(String),
}

impl BlockClass {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            kinds::IMAGE | kinds::GRAPHIC => Self::Image,
            kinds::TEXT => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Outcome of one configuration pass.
#[derive(Debug, Clone, Default)]
pub struct ConfigureReport {
    /// Blocks given image or text permissions.
    pub configured: usize,
    /// Blocks of other kinds, made visible but otherwise untouched.
    pub untouched: usize,
    pub failures: Vec<ItemFailure>,
}

/// Configure every direct child of every page, then frame `front`.
#[instrument(skip_all, fields(pages = pages.len()))]
pub async fn configure(
    engine: &dyn CompositionEngine,
    pages: &[BlockId],
    front: Option<BlockId>,
    margin: f32,
) -> Result<ConfigureReport> {
    let (_, blocks) = accessors(engine, STEP)?;
    let mut report = ConfigureReport::default();

    for &page in pages {
        let children = match blocks.children(page) {
            Ok(children) => children,
            Err(err) => {
                warn!(%page, error = %err, "could not list page blocks, skipping page");
                report.failures.push(ItemFailure::new(STEP, page, err));
                continue;
            }
        };

        for block in children {
            match configure_block(blocks, block) {
                Ok(BlockClass::Other(kind)) => {
                    debug!(%block, %kind, "left as imported");
                    report.untouched += 1;
                }
                Ok(_) => report.configured += 1,
                Err(err) => {
                    warn!(%block, error = %err, "block configuration failed, skipping");
                    report.failures.push(ItemFailure::new(STEP, block, err));
                }
            }
        }
    }

    if engine.blocks().is_none() {
        return Err(LoadError::EngineDisposed("during configuration".into()));
    }

    if let Some(front) = front
        && let Err(err) = engine.frame(front, margin).await
    {
        warn!(page = %front, error = %err, "could not frame front page");
    }

    info!(
        configured = report.configured,
        untouched = report.untouched,
        failed = report.failures.len(),
        "configured blocks"
    );
    Ok(report)
}

fn configure_block(blocks: &dyn BlockAccess, block: BlockId) -> EngineResult<BlockClass> {
    blocks.set_visible(block, true)?;

    let class = BlockClass::from_kind(&blocks.kind(block)?);
    match &class {
        BlockClass::Image => {
            blocks.set_metadata(block, REPLACEABLE_IMAGE_KEY, "true")?;
            blocks.set_scope_enabled(block, Scope::FillChange, true)?;
        }
        BlockClass::Text => {
            blocks.set_scope_enabled(block, Scope::TextEdit, true)?;
            blocks.set_scope_enabled(block, Scope::Select, true)?;
            for scope in [Scope::Move, Scope::Resize, Scope::Rotate] {
                blocks.set_scope_enabled(block, scope, false)?;
            }
            if let Ok(text) = blocks.text(block) {
                let preview: String = text.chars().take(32).collect();
                debug!(%block, %preview, "text block editable");
            }
        }
        BlockClass::Other(_) => {}
    }
    Ok(class)
}
