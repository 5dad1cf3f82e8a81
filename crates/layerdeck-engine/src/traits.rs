// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait definitions for the composition engine and its import library.
//
// The engine is an external, stateful system. It can be torn down by its
// owner at any time, which is why the top-level accessors are optional:
// a disposed engine reports `None` instead of handing out dangling APIs.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::encode::ImageEncoder;
use crate::error::EngineResult;

/// Opaque handle to a scene, page, or block inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Block kind names reported by [`BlockAccess::kind`].
pub mod kinds {
    pub const SCENE: &str = "scene";
    pub const PAGE: &str = "page";
    pub const IMAGE: &str = "image";
    pub const GRAPHIC: &str = "graphic";
    pub const TEXT: &str = "text";
}

/// Named permission flag controlling what an end user may do with a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    FillChange,
    TextEdit,
    Select,
    Move,
    Resize,
    Rotate,
}

impl Scope {
    pub const ALL: [Scope; 6] = [
        Self::FillChange,
        Self::TextEdit,
        Self::Select,
        Self::Move,
        Self::Resize,
        Self::Rotate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FillChange => "fill-change",
            Self::TextEdit => "text-edit",
            Self::Select => "select",
            Self::Move => "move",
            Self::Resize => "resize",
            Self::Rotate => "rotate",
        }
    }
}

/// Top-level handle to a live composition engine.
#[async_trait]
pub trait CompositionEngine: Send + Sync {
    /// Scene accessor, or `None` once the engine has been disposed.
    fn scenes(&self) -> Option<&dyn SceneAccess>;

    /// Block accessor, or `None` once the engine has been disposed.
    fn blocks(&self) -> Option<&dyn BlockAccess>;

    /// Make the default font set available to imported text. Idempotent.
    async fn register_default_assets(&self) -> EngineResult<()>;

    /// Zoom the viewport so `block` fills `margin` of the available space.
    async fn frame(&self, block: BlockId, margin: f32) -> EngineResult<()>;
}

/// Scene-level operations, plus the page list of a scene.
#[async_trait]
pub trait SceneAccess: Send + Sync {
    /// The current scene, if any.
    fn current(&self) -> EngineResult<Option<BlockId>>;

    /// Create a fresh scene, replacing the current one.
    async fn create(&self) -> EngineResult<BlockId>;

    /// Whether `scene` is a live scene handle.
    fn is_valid(&self, scene: BlockId) -> EngineResult<bool>;

    /// Pages of `scene` in document order.
    fn pages(&self, scene: BlockId) -> EngineResult<Vec<BlockId>>;
}

/// Per-block operations.
pub trait BlockAccess: Send + Sync {
    fn is_valid(&self, block: BlockId) -> bool;

    fn find_by_kind(&self, kind: &str) -> EngineResult<Vec<BlockId>>;

    fn children(&self, block: BlockId) -> EngineResult<Vec<BlockId>>;

    fn kind(&self, block: BlockId) -> EngineResult<String>;

    fn is_visible(&self, block: BlockId) -> EngineResult<bool>;

    fn set_visible(&self, block: BlockId, visible: bool) -> EngineResult<()>;

    /// Width and height in design units.
    fn size(&self, block: BlockId) -> EngineResult<(f32, f32)>;

    fn metadata(&self, block: BlockId, key: &str) -> EngineResult<Option<String>>;

    fn set_metadata(&self, block: BlockId, key: &str, value: &str) -> EngineResult<()>;

    fn set_scope_enabled(&self, block: BlockId, scope: Scope, enabled: bool) -> EngineResult<()>;

    /// String content of a text block.
    fn text(&self, block: BlockId) -> EngineResult<String>;

    fn destroy(&self, block: BlockId) -> EngineResult<()>;

    // -- Construction, used by import routines --

    fn create(&self, kind: &str) -> EngineResult<BlockId>;

    fn append_child(&self, parent: BlockId, child: BlockId) -> EngineResult<()>;

    fn set_size(&self, block: BlockId, width: f32, height: f32) -> EngineResult<()>;

    fn set_text(&self, block: BlockId, text: &str) -> EngineResult<()>;

    /// Attach encoded image bytes as the block's fill.
    fn set_fill_image(&self, block: BlockId, encoded: Vec<u8>) -> EngineResult<()>;
}

/// Severity of a message reported by the import routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Warning,
    Error,
}

/// One diagnostic line from the import routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportMessage {
    pub severity: MessageSeverity,
    pub text: String,
}

impl std::fmt::Display for ImportMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            MessageSeverity::Info => "info",
            MessageSeverity::Warning => "warning",
            MessageSeverity::Error => "error",
        };
        write!(f, "{level}: {}", self.text)
    }
}

/// Diagnostics log returned by a finished import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    messages: Vec<ImportMessage>,
}

impl ImportReport {
    pub fn push(&mut self, severity: MessageSeverity, text: impl Into<String>) {
        self.messages.push(ImportMessage {
            severity,
            text: text.into(),
        });
    }

    pub fn messages(&self) -> &[ImportMessage] {
        &self.messages
    }
}

/// The external import library that decodes a layered document into the
/// current scene.
///
/// Implementations must watch `cancel` and return [`EngineError::Cancelled`]
/// promptly once it fires; the pipeline cancels it when the parse timeout
/// expires.
///
/// [`EngineError::Cancelled`]: crate::error::EngineError::Cancelled
#[async_trait]
pub trait TemplateImporter: Send + Sync {
    async fn import(
        &self,
        engine: &dyn CompositionEngine,
        bytes: &[u8],
        encoder: &dyn ImageEncoder,
        cancel: CancellationToken,
    ) -> EngineResult<ImportReport>;
}
