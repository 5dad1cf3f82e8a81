// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process composition engine and fixture importer.
//
// `MemoryEngine` keeps a plain block tree behind a mutex and can be told to
// misbehave (dispose itself, fail specific calls) so that every recovery path
// of the pipeline can be exercised without a real editor. `FixtureImporter`
// populates the current scene from a fixed page layout through the public
// engine traits only, the same way the real import library does.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::encode::ImageEncoder;
use crate::error::{EngineError, EngineResult};
use crate::traits::*;

#[derive(Debug, Clone)]
struct Node {
    kind: String,
    parent: Option<BlockId>,
    children: Vec<BlockId>,
    visible: bool,
    stale: bool,
    size: (f32, f32),
    text: String,
    fill: Option<Vec<u8>>,
    metadata: BTreeMap<String, String>,
    scopes: HashMap<Scope, bool>,
}

impl Node {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            parent: None,
            children: Vec::new(),
            visible: true,
            stale: false,
            size: (0.0, 0.0),
            text: String::new(),
            fill: None,
            metadata: BTreeMap::new(),
            scopes: HashMap::new(),
        }
    }
}

/// Injected misbehaviour.
#[derive(Debug, Default)]
struct Faults {
    block_reads_broken: bool,
    scene_reads_broken: bool,
    framing_broken: bool,
    scene_creation_failures: usize,
    broken_kinds: HashSet<BlockId>,
    undestroyable: HashSet<BlockId>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    nodes: HashMap<BlockId, Node>,
    scene: Option<BlockId>,
    faults: Faults,
    frames: Vec<(BlockId, f32)>,
    asset_registrations: usize,
}

impl State {
    fn insert(&mut self, kind: &str) -> BlockId {
        self.next_id += 1;
        let id = BlockId(self.next_id);
        self.nodes.insert(id, Node::new(kind));
        id
    }

    fn node(&self, block: BlockId) -> EngineResult<&Node> {
        match self.nodes.get(&block) {
            Some(node) if !node.stale => Ok(node),
            _ => Err(EngineError::InvalidHandle(block)),
        }
    }

    fn node_mut(&mut self, block: BlockId) -> EngineResult<&mut Node> {
        match self.nodes.get_mut(&block) {
            Some(node) if !node.stale => Ok(node),
            _ => Err(EngineError::InvalidHandle(block)),
        }
    }

    fn remove_subtree(&mut self, block: BlockId) {
        if let Some(node) = self.nodes.remove(&block) {
            for child in node.children {
                self.remove_subtree(child);
            }
            if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
                parent.children.retain(|c| *c != block);
            }
        }
        if self.scene == Some(block) {
            self.scene = None;
        }
    }
}

/// Composition engine held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
    disposed: AtomicBool,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, State>> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(EngineError::Disposed);
        }
        self.state
            .lock()
            .map_err(|_| EngineError::Call("engine state lock poisoned".into()))
    }

    /// Lock for a block read or write, honouring the broken-reads fault.
    fn lock_blocks(&self) -> EngineResult<MutexGuard<'_, State>> {
        let state = self.lock()?;
        if state.faults.block_reads_broken {
            return Err(EngineError::Call("block accessor unavailable".into()));
        }
        Ok(state)
    }

    fn lock_scenes(&self) -> EngineResult<MutexGuard<'_, State>> {
        let state = self.lock()?;
        if state.faults.scene_reads_broken {
            return Err(EngineError::Call("scene accessor unavailable".into()));
        }
        Ok(state)
    }

    fn with_faults(&self, f: impl FnOnce(&mut Faults)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state.faults);
        }
    }

    // -- Fault injection ------------------------------------------------------

    /// Tear the engine down. Accessors return `None` afterwards.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Make every fallible block call fail.
    pub fn break_block_reads(&self, broken: bool) {
        self.with_faults(|f| f.block_reads_broken = broken);
    }

    /// Make `current` and `pages` fail.
    pub fn break_scene_reads(&self, broken: bool) {
        self.with_faults(|f| f.scene_reads_broken = broken);
    }

    pub fn break_framing(&self, broken: bool) {
        self.with_faults(|f| f.framing_broken = broken);
    }

    /// Fail the next `count` scene creations.
    pub fn fail_scene_creations(&self, count: usize) {
        self.with_faults(|f| f.scene_creation_failures = count);
    }

    /// Make `kind` fail for one block.
    pub fn break_kind_of(&self, block: BlockId) {
        self.with_faults(|f| {
            f.broken_kinds.insert(block);
        });
    }

    /// Make `destroy` fail for one block.
    pub fn refuse_destroy_of(&self, block: BlockId) {
        self.with_faults(|f| {
            f.undestroyable.insert(block);
        });
    }

    /// Leave the handle in place but mark it stale, as after an engine-side reset.
    pub fn invalidate(&self, block: BlockId) {
        if let Ok(mut state) = self.state.lock()
            && let Some(node) = state.nodes.get_mut(&block)
        {
            node.stale = true;
        }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn current_scene(&self) -> Option<BlockId> {
        self.state.lock().ok().and_then(|s| s.scene)
    }

    /// Pages of the current scene, in order.
    pub fn page_ids(&self) -> Vec<BlockId> {
        self.state
            .lock()
            .ok()
            .and_then(|s| {
                let scene = s.scene?;
                let node = s.nodes.get(&scene)?;
                Some(
                    node.children
                        .iter()
                        .copied()
                        .filter(|c| s.nodes.get(c).is_some_and(|n| n.kind == kinds::PAGE))
                        .collect(),
                )
            })
            .unwrap_or_default()
    }

    /// Indices (into [`page_ids`](Self::page_ids)) of the visible pages.
    pub fn visible_page_indices(&self) -> Vec<usize> {
        let pages = self.page_ids();
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        pages
            .iter()
            .enumerate()
            .filter(|(_, id)| state.nodes.get(*id).is_some_and(|n| n.visible))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn scope_of(&self, block: BlockId, scope: Scope) -> Option<bool> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.nodes.get(&block).and_then(|n| n.scopes.get(&scope).copied()))
    }

    pub fn metadata_of(&self, block: BlockId, key: &str) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.nodes.get(&block).and_then(|n| n.metadata.get(key).cloned()))
    }

    pub fn has_fill(&self, block: BlockId) -> bool {
        self.state
            .lock()
            .map(|s| s.nodes.get(&block).is_some_and(|n| n.fill.is_some()))
            .unwrap_or(false)
    }

    /// Every framing request that succeeded, oldest first.
    pub fn frames(&self) -> Vec<(BlockId, f32)> {
        self.state.lock().map(|s| s.frames.clone()).unwrap_or_default()
    }

    pub fn asset_registrations(&self) -> usize {
        self.state.lock().map(|s| s.asset_registrations).unwrap_or(0)
    }
}

#[async_trait]
impl CompositionEngine for MemoryEngine {
    fn scenes(&self) -> Option<&dyn SceneAccess> {
        if self.is_disposed() {
            return None;
        }
        Some(self as &dyn SceneAccess)
    }

    fn blocks(&self) -> Option<&dyn BlockAccess> {
        if self.is_disposed() {
            return None;
        }
        Some(self as &dyn BlockAccess)
    }

    async fn register_default_assets(&self) -> EngineResult<()> {
        let mut state = self.lock()?;
        state.asset_registrations += 1;
        Ok(())
    }

    async fn frame(&self, block: BlockId, margin: f32) -> EngineResult<()> {
        let mut state = self.lock()?;
        if state.faults.framing_broken {
            return Err(EngineError::Call("viewport unavailable".into()));
        }
        state.node(block)?;
        state.frames.push((block, margin));
        Ok(())
    }
}

#[async_trait]
impl SceneAccess for MemoryEngine {
    fn current(&self) -> EngineResult<Option<BlockId>> {
        Ok(self.lock_scenes()?.scene)
    }

    async fn create(&self) -> EngineResult<BlockId> {
        let mut state = self.lock()?;
        if state.faults.scene_creation_failures > 0 {
            state.faults.scene_creation_failures -= 1;
            return Err(EngineError::Call("scene creation failed".into()));
        }
        if let Some(old) = state.scene.take() {
            state.remove_subtree(old);
        }
        let scene = state.insert(kinds::SCENE);
        state.scene = Some(scene);
        debug!(%scene, "memory engine created scene");
        Ok(scene)
    }

    fn is_valid(&self, scene: BlockId) -> EngineResult<bool> {
        let state = self.lock()?;
        Ok(state.node(scene).is_ok_and(|n| n.kind == kinds::SCENE))
    }

    fn pages(&self, scene: BlockId) -> EngineResult<Vec<BlockId>> {
        let state = self.lock_scenes()?;
        let node = state.node(scene)?;
        Ok(node
            .children
            .iter()
            .copied()
            .filter(|c| state.nodes.get(c).is_some_and(|n| n.kind == kinds::PAGE))
            .collect())
    }
}

impl BlockAccess for MemoryEngine {
    fn is_valid(&self, block: BlockId) -> bool {
        self.lock().is_ok_and(|s| s.node(block).is_ok())
    }

    fn find_by_kind(&self, kind: &str) -> EngineResult<Vec<BlockId>> {
        let state = self.lock_blocks()?;
        let mut found: Vec<BlockId> = state
            .nodes
            .iter()
            .filter(|(_, n)| !n.stale && n.kind == kind)
            .map(|(id, _)| *id)
            .collect();
        found.sort();
        Ok(found)
    }

    fn children(&self, block: BlockId) -> EngineResult<Vec<BlockId>> {
        Ok(self.lock_blocks()?.node(block)?.children.clone())
    }

    fn kind(&self, block: BlockId) -> EngineResult<String> {
        let state = self.lock_blocks()?;
        if state.faults.broken_kinds.contains(&block) {
            return Err(EngineError::Call(format!("kind of {block} is unreadable")));
        }
        Ok(state.node(block)?.kind.clone())
    }

    fn is_visible(&self, block: BlockId) -> EngineResult<bool> {
        Ok(self.lock_blocks()?.node(block)?.visible)
    }

    fn set_visible(&self, block: BlockId, visible: bool) -> EngineResult<()> {
        self.lock_blocks()?.node_mut(block)?.visible = visible;
        Ok(())
    }

    fn size(&self, block: BlockId) -> EngineResult<(f32, f32)> {
        Ok(self.lock_blocks()?.node(block)?.size)
    }

    fn metadata(&self, block: BlockId, key: &str) -> EngineResult<Option<String>> {
        Ok(self.lock_blocks()?.node(block)?.metadata.get(key).cloned())
    }

    fn set_metadata(&self, block: BlockId, key: &str, value: &str) -> EngineResult<()> {
        self.lock_blocks()?
            .node_mut(block)?
            .metadata
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_scope_enabled(&self, block: BlockId, scope: Scope, enabled: bool) -> EngineResult<()> {
        self.lock_blocks()?.node_mut(block)?.scopes.insert(scope, enabled);
        Ok(())
    }

    fn text(&self, block: BlockId) -> EngineResult<String> {
        let state = self.lock_blocks()?;
        let node = state.node(block)?;
        if node.kind != kinds::TEXT {
            return Err(EngineError::Call(format!("{block} is not a text block")));
        }
        Ok(node.text.clone())
    }

    fn destroy(&self, block: BlockId) -> EngineResult<()> {
        let mut state = self.lock_blocks()?;
        if state.faults.undestroyable.contains(&block) {
            return Err(EngineError::Call(format!("{block} refused to be destroyed")));
        }
        state.node(block)?;
        state.remove_subtree(block);
        Ok(())
    }

    fn create(&self, kind: &str) -> EngineResult<BlockId> {
        Ok(self.lock_blocks()?.insert(kind))
    }

    fn append_child(&self, parent: BlockId, child: BlockId) -> EngineResult<()> {
        let mut state = self.lock_blocks()?;
        state.node(child)?;
        state.node_mut(parent)?.children.push(child);
        state.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn set_size(&self, block: BlockId, width: f32, height: f32) -> EngineResult<()> {
        self.lock_blocks()?.node_mut(block)?.size = (width, height);
        Ok(())
    }

    fn set_text(&self, block: BlockId, text: &str) -> EngineResult<()> {
        self.lock_blocks()?.node_mut(block)?.text = text.to_string();
        Ok(())
    }

    fn set_fill_image(&self, block: BlockId, encoded: Vec<u8>) -> EngineResult<()> {
        self.lock_blocks()?.node_mut(block)?.fill = Some(encoded);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixture importer
// ---------------------------------------------------------------------------

/// One block of a fixture page.
#[derive(Debug, Clone)]
pub struct FixtureBlock {
    pub kind: String,
    pub text: Option<String>,
}

impl FixtureBlock {
    pub fn image() -> Self {
        Self { kind: kinds::IMAGE.into(), text: None }
    }

    pub fn graphic() -> Self {
        Self { kind: kinds::GRAPHIC.into(), text: None }
    }

    pub fn text(content: &str) -> Self {
        Self { kind: kinds::TEXT.into(), text: Some(content.into()) }
    }

    pub fn other(kind: &str) -> Self {
        Self { kind: kind.into(), text: None }
    }
}

/// One page of a fixture layout.
#[derive(Debug, Clone)]
pub struct FixturePage {
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<FixtureBlock>,
}

impl FixturePage {
    /// A business-card sized page (85 x 55 mm at 300 dpi).
    pub fn card(blocks: Vec<FixtureBlock>) -> Self {
        Self { width: 1004.0, height: 650.0, blocks }
    }
}

/// How the fixture importer settles.
#[derive(Debug, Clone)]
pub enum ImportBehaviour {
    /// Build the layout and return.
    Complete,
    /// Build the layout after sleeping.
    Delay(Duration),
    /// Report failure without touching the scene.
    Fail(String),
    /// Build no pages at all.
    Empty,
    /// Never finish on its own; only cancellation ends it.
    NeverSettle,
}

type ImportHook = Box<dyn Fn() + Send + Sync>;

/// Import routine that populates the current scene from a fixed layout.
pub struct FixtureImporter {
    pages: Vec<FixturePage>,
    behaviour: ImportBehaviour,
    hook: Option<ImportHook>,
    after_build: Option<ImportHook>,
    calls: AtomicUsize,
    cancelled: AtomicBool,
}

impl FixtureImporter {
    pub fn new(pages: Vec<FixturePage>) -> Self {
        Self {
            pages,
            behaviour: ImportBehaviour::Complete,
            hook: None,
            after_build: None,
            calls: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn with_behaviour(mut self, behaviour: ImportBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Run `hook` at the start of every import (e.g. to dispose the engine mid-parse).
    pub fn with_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Run `hook` once the layout is built, just before the import returns.
    pub fn with_after_build(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_build = Some(Box::new(hook));
        self
    }

    /// Number of times `import` was entered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether an import observed its cancellation token firing.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn build(
        &self,
        engine: &dyn CompositionEngine,
        encoder: &dyn ImageEncoder,
        report: &mut ImportReport,
    ) -> EngineResult<()> {
        let scenes = engine.scenes().ok_or(EngineError::Disposed)?;
        let blocks = engine.blocks().ok_or(EngineError::Disposed)?;
        let scene = scenes
            .current()?
            .ok_or_else(|| EngineError::Call("import needs a scene".into()))?;

        for layout in &self.pages {
            let page = blocks.create(kinds::PAGE)?;
            blocks.set_size(page, layout.width, layout.height)?;
            blocks.append_child(scene, page)?;

            for fixture in &layout.blocks {
                let block = blocks.create(&fixture.kind)?;
                blocks.append_child(page, block)?;
                // Imported layers arrive hidden; configuration reveals them.
                blocks.set_visible(block, false)?;
                if let Some(text) = &fixture.text {
                    blocks.set_text(block, text)?;
                }
                if fixture.kind == kinds::IMAGE || fixture.kind == kinds::GRAPHIC {
                    let png = encoder.encode(2, 2, vec![200; 16])?;
                    blocks.set_fill_image(block, png)?;
                }
                if fixture.kind != kinds::IMAGE && fixture.kind != kinds::GRAPHIC && fixture.kind != kinds::TEXT {
                    report.push(
                        MessageSeverity::Warning,
                        format!("layer kind '{}' imported as-is", fixture.kind),
                    );
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateImporter for FixtureImporter {
    async fn import(
        &self,
        engine: &dyn CompositionEngine,
        bytes: &[u8],
        encoder: &dyn ImageEncoder,
        cancel: CancellationToken,
    ) -> EngineResult<ImportReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.hook {
            hook();
        }

        match &self.behaviour {
            ImportBehaviour::Fail(reason) => return Err(EngineError::Call(reason.clone())),
            ImportBehaviour::NeverSettle => {
                cancel.cancelled().await;
                self.cancelled.store(true, Ordering::SeqCst);
                warn!("fixture import cancelled");
                return Err(EngineError::Cancelled);
            }
            ImportBehaviour::Delay(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => {}
                    _ = cancel.cancelled() => {
                        self.cancelled.store(true, Ordering::SeqCst);
                        return Err(EngineError::Cancelled);
                    }
                }
            }
            ImportBehaviour::Complete | ImportBehaviour::Empty => {}
        }

        let mut report = ImportReport::default();
        if !matches!(self.behaviour, ImportBehaviour::Empty) {
            self.build(engine, encoder, &mut report)?;
        }
        if let Some(hook) = &self.after_build {
            hook();
        }
        report.push(
            MessageSeverity::Info,
            format!("imported {} page(s) from {} bytes", self.pages.len(), bytes.len()),
        );
        Ok(report)
    }
}
