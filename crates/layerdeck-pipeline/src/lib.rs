// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layerdeck Pipeline — turns a layered design file into an editable,
// multi-page scene inside a live composition engine.
//
//   fetch → (cache hit skips the network) → validate → sanitize → parse
//         → configure → show side
//
// Every step returns a `Result`; `TemplateLoader` folds the outcome into a
// `LoadResult` so callers only ever inspect a value.

pub mod cache;
pub mod configure;
pub mod fetch;
pub mod liveness;
pub mod loader;
pub mod parse;
pub mod progress;
pub mod sanitize;
pub mod validate;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{BufferCache, CacheEntry};
pub use fetch::{ReqwestTransport, Transport};
pub use loader::{LoadOptions, TemplateLoader};
pub use progress::{ProgressFn, ProgressReporter};
