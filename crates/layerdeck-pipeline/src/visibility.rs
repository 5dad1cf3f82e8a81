// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page visibility controller — shows exactly one side of a template.

use tracing::{debug, info, warn};

use layerdeck_core::error::{LoadError, Result};
use layerdeck_core::types::{Side, TemplateDescriptor};
use layerdeck_engine::CompositionEngine;

use crate::liveness::{accessors, engine_error};
use crate::sanitize::is_leftover;

const STEP: &str = "show side";

/// Make the page for `side` the only visible page and frame it.
///
/// Returns the index of the page now shown. A single-sided template only has
/// a front; asking for its back fails with `SingleSided`. Pages left over from
/// an earlier template are kept hidden and do not count.
pub async fn show_side(
    engine: &dyn CompositionEngine,
    template: &TemplateDescriptor,
    side: Side,
    margin: f32,
) -> Result<usize> {
    let (scenes, blocks) = accessors(engine, STEP)?;
    let scene = scenes
        .current()
        .map_err(|e| engine_error(STEP, e, LoadError::Scene))?
        .ok_or_else(|| LoadError::Scene(format!("{STEP}: no scene loaded")))?;
    let (leftover, pages): (Vec<_>, Vec<_>) = scenes
        .pages(scene)
        .map_err(|e| engine_error(STEP, e, LoadError::Scene))?
        .into_iter()
        .partition(|page| is_leftover(blocks, *page));

    if side == Side::Back && !template.is_double_sided(pages.len()) {
        return Err(LoadError::SingleSided(side.to_string()));
    }

    let index = template.page_index(side);
    let Some(&target) = pages.get(index) else {
        return Err(LoadError::PageNotFound {
            index,
            page_count: pages.len(),
        });
    };

    for &page in pages.iter().chain(&leftover) {
        blocks
            .set_visible(page, page == target)
            .map_err(|e| engine_error(STEP, e, LoadError::Scene))?;
    }

    if let Ok((width, height)) = blocks.size(target) {
        debug!(page = %target, width, height, "page size");
    }
    if let Err(err) = engine.frame(target, margin).await {
        warn!(page = %target, error = %err, "could not frame page");
    }

    info!(%side, index, "showing side");
    Ok(index)
}
