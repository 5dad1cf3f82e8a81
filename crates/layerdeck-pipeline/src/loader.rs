// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template loader — the composition root of the pipeline.
//
// `TemplateLoader` owns the configuration, the buffer cache, the transport
// and the import routine, and exposes the three caller-facing operations.
// Callers never receive a raw error: every run is folded into a
// `LoadResult` or `SwitchResult`.
//
// The caller serialises loads against one engine; the loader takes no lock
// on the engine itself.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use layerdeck_core::PipelineConfig;
use layerdeck_core::error::Result;
use layerdeck_core::types::{
    LoadId, LoadResult, LoadSummary, Side, Stage, SwitchResult, TemplateDescriptor,
};
use layerdeck_engine::{CompositionEngine, ImageEncoder, PngEncoder, TemplateImporter};

use crate::cache::{BufferCache, CacheEntry, cache_key};
use crate::configure::configure;
use crate::fetch::{ReqwestTransport, Transport, fetch_bytes};
use crate::liveness::{Checkpoint, assert_alive};
use crate::parse::{ParseRequest, parse};
use crate::progress::{ProgressFn, ProgressReporter};
use crate::sanitize::prepare_scene;
use crate::validate::validate_buffer;
use crate::visibility::show_side;

/// Per-call options for [`TemplateLoader::load_template_with`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Side left visible after the load. Single-sided templates always show
    /// their front.
    pub side: Side,
    /// Aborts the fetch and the import when fired.
    pub cancel: Option<CancellationToken>,
}

/// Loads layered templates into a live composition engine.
pub struct TemplateLoader {
    config: PipelineConfig,
    cache: Arc<Mutex<BufferCache>>,
    transport: Arc<dyn Transport>,
    importer: Arc<dyn TemplateImporter>,
    encoder: Arc<dyn ImageEncoder>,
}

impl TemplateLoader {
    /// Loader fetching over HTTP(S) with a private cache.
    pub fn new(config: PipelineConfig, importer: Arc<dyn TemplateImporter>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(config, transport, importer)
    }

    pub fn with_transport(
        config: PipelineConfig,
        transport: Arc<dyn Transport>,
        importer: Arc<dyn TemplateImporter>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(Mutex::new(BufferCache::new(config.cache_capacity)));
        Ok(Self {
            config,
            cache,
            transport,
            importer,
            encoder: Arc::new(PngEncoder),
        })
    }

    /// Share `cache` with other loaders (e.g. one per editor session).
    pub fn with_cache(mut self, cache: Arc<Mutex<BufferCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn cache(&self) -> Arc<Mutex<BufferCache>> {
        Arc::clone(&self.cache)
    }

    /// Fetch (or reuse) `reference` and load it, showing the front side.
    pub async fn load_template(
        &self,
        engine: &dyn CompositionEngine,
        reference: &str,
        on_progress: &ProgressFn,
        template: Option<&TemplateDescriptor>,
    ) -> LoadResult {
        self.load_template_with(engine, reference, on_progress, template, LoadOptions::default())
            .await
    }

    #[instrument(skip_all, fields(load_id = %LoadId::new()))]
    pub async fn load_template_with(
        &self,
        engine: &dyn CompositionEngine,
        reference: &str,
        on_progress: &ProgressFn,
        template: Option<&TemplateDescriptor>,
        options: LoadOptions,
    ) -> LoadResult {
        let progress = ProgressReporter::new(on_progress);
        let template = template
            .cloned()
            .unwrap_or_else(|| TemplateDescriptor::from_reference(reference));
        let cancel = scope(&options);

        let result = self
            .run_template(engine, reference, &template, options.side, &cancel, &progress)
            .await;
        finish(result)
    }

    /// Load bytes picked from local storage. The fetcher and the cache are
    /// bypassed; everything else is the same pipeline.
    #[instrument(skip_all, fields(load_id = %LoadId::new(), bytes = bytes.len()))]
    pub async fn load_from_local_file(
        &self,
        engine: &dyn CompositionEngine,
        bytes: Vec<u8>,
        on_progress: &ProgressFn,
    ) -> LoadResult {
        let progress = ProgressReporter::new(on_progress);
        finish(self.run_local(engine, &bytes, &progress).await)
    }

    /// Read `path` and load it like [`load_from_local_file`](Self::load_from_local_file).
    #[instrument(skip_all, fields(load_id = %LoadId::new(), path = %path.as_ref().display()))]
    pub async fn load_from_path(
        &self,
        engine: &dyn CompositionEngine,
        path: impl AsRef<Path>,
        on_progress: &ProgressFn,
    ) -> LoadResult {
        let progress = ProgressReporter::new(on_progress);
        let result = match tokio::fs::read(path.as_ref()).await {
            Ok(bytes) => self.run_local(engine, &bytes, &progress).await,
            Err(err) => Err(err.into()),
        };
        finish(result)
    }

    /// Show the requested side of an already loaded template.
    #[instrument(skip_all, fields(side = %side))]
    pub async fn switch_side(
        &self,
        engine: &dyn CompositionEngine,
        template: &TemplateDescriptor,
        side: Side,
    ) -> SwitchResult {
        let result = match assert_alive(engine, Checkpoint::Entry) {
            Ok(()) => show_side(engine, template, side, self.config.frame_margin).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            warn!(error = %err, "side switch failed");
        }
        SwitchResult::from(result)
    }

    async fn run_template(
        &self,
        engine: &dyn CompositionEngine,
        reference: &str,
        template: &TemplateDescriptor,
        side: Side,
        cancel: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<LoadSummary> {
        assert_alive(engine, Checkpoint::Entry)?;
        info!(template = %template.name, "loading template");

        let key = cache_key(reference);
        let cached = self.cache_op(|cache| {
            cache
                .get(&key)
                .map(|e| (Arc::clone(&e.bytes), e.inserted_at))
        });

        if let Some((bytes, inserted_at)) = cached.flatten() {
            let age_secs = (Utc::now() - inserted_at).num_seconds();
            info!(bytes = bytes.len(), age_secs, "cache hit");
            progress.emit(Stage::Cached, "Using cached template", 50);
            return match self.apply(engine, &bytes, template, side, cancel, progress).await {
                Ok(summary) => {
                    self.cache_op(|cache| cache.record_result(&key, summary.clone()));
                    Ok(summary)
                }
                Err(err) => {
                    warn!(error = %err, "cached template failed to load, evicting it");
                    self.cache_op(|cache| cache.remove(&key));
                    Err(err)
                }
            };
        }

        let bytes = fetch_bytes(self.transport.as_ref(), reference, progress, cancel).await?;
        self.warn_if_large(bytes.len(), progress);

        let bytes: Arc<[u8]> = Arc::from(bytes);
        let summary = self.apply(engine, &bytes, template, side, cancel, progress).await?;

        if bytes.len() < self.config.cache_max_bytes {
            let entry = CacheEntry::new(Arc::clone(&bytes), template.clone(), Some(summary.clone()));
            self.cache_op(|cache| cache.put(key, entry));
        } else {
            info!(bytes = bytes.len(), "template too large to cache");
        }
        Ok(summary)
    }

    async fn run_local(
        &self,
        engine: &dyn CompositionEngine,
        bytes: &[u8],
        progress: &ProgressReporter<'_>,
    ) -> Result<LoadSummary> {
        assert_alive(engine, Checkpoint::Entry)?;
        progress.emit(Stage::Processing, "Reading local file...", 50);
        self.warn_if_large(bytes.len(), progress);

        let template = TemplateDescriptor::local_file();
        let cancel = CancellationToken::new();
        self.apply(engine, bytes, &template, Side::Front, &cancel, progress)
            .await
    }

    /// Everything after the bytes are in hand.
    async fn apply(
        &self,
        engine: &dyn CompositionEngine,
        bytes: &[u8],
        template: &TemplateDescriptor,
        side: Side,
        cancel: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<LoadSummary> {
        validate_buffer(bytes, &self.config)?;

        // The fetch can take seconds; the engine may be gone by now.
        assert_alive(engine, Checkpoint::BeforeParse)?;
        progress.emit(Stage::Processing, "Preparing canvas...", 52);
        let prepared = prepare_scene(engine).await?;

        let request = ParseRequest {
            importer: self.importer.as_ref(),
            encoder: self.encoder.as_ref(),
            bytes,
            template,
            timeout: self.config.parse_timeout(),
            leftover_pages: &prepared.leftover,
        };
        let outcome = parse(engine, request, cancel, progress).await?;

        progress.emit(Stage::Processing, "Setting up editable layers...", 90);
        let page_count = outcome.pages.len();
        let is_double_sided = template.is_double_sided(page_count);
        let front = outcome.pages.get(template.page_index(Side::Front)).copied();
        let configured = configure(engine, &outcome.pages, front, self.config.frame_margin).await?;

        let side = if side == Side::Back && !is_double_sided {
            info!("template is single-sided, showing front");
            Side::Front
        } else {
            side
        };
        let visible_page = show_side(engine, template, side, self.config.frame_margin).await?;

        let mut diagnostics = prepared.failures;
        diagnostics.extend(configured.failures);

        progress.emit(Stage::Complete, "Template ready", 100);
        info!(page_count, is_double_sided, visible_page, "template loaded");

        Ok(LoadSummary {
            page_count,
            is_double_sided,
            visible_page,
            messages: outcome.messages,
            diagnostics,
        })
    }

    fn warn_if_large(&self, len: usize, progress: &ProgressReporter<'_>) {
        if len > self.config.large_buffer_warning_bytes {
            let mb = len as f64 / (1024.0 * 1024.0);
            warn!(bytes = len, "large template buffer");
            progress.emit(
                Stage::Warning,
                format!("Large file ({mb:.1} MB), processing may take a while"),
                progress.current(),
            );
        }
    }

    /// Run `f` on the cache. A poisoned lock skips the cache rather than
    /// failing the load.
    fn cache_op<R>(&self, f: impl FnOnce(&mut BufferCache) -> R) -> Option<R> {
        match self.cache.lock() {
            Ok(mut cache) => Some(f(&mut cache)),
            Err(_) => {
                warn!("template cache lock poisoned, bypassing cache");
                None
            }
        }
    }
}

fn scope(options: &LoadOptions) -> CancellationToken {
    options
        .cancel
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default()
}

fn finish(result: Result<LoadSummary>) -> LoadResult {
    if let Err(err) = &result {
        warn!(error = %err, "template load failed");
    }
    LoadResult::from(result)
}
