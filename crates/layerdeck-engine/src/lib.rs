// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layerdeck Engine — the boundary between the template pipeline and the
// live document-composition engine.
//
// The pipeline only ever talks to the engine through the traits in `traits`.
// `memory` provides an in-process engine and a fixture importer so the
// pipeline can be driven without a real editor.

pub mod encode;
pub mod error;
pub mod memory;
pub mod traits;

pub use encode::{ImageEncoder, PngEncoder};
pub use error::{EngineError, EngineResult};
pub use memory::{FixtureBlock, FixtureImporter, FixturePage, ImportBehaviour, MemoryEngine};
pub use traits::*;
