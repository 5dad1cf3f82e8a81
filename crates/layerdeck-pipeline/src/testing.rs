// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared test helpers: an in-process transport, a progress recorder, and
// synthetic template buffers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use layerdeck_core::error::{LoadError, Result};
use layerdeck_core::types::{ProgressEvent, Stage};

use crate::fetch::{Body, Transport};

/// Install a log subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A buffer that starts with the layered-document signature.
pub fn psd_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"8BPS".to_vec();
    bytes.resize(len.max(4), 0x2a);
    bytes
}

/// How a registered URL answers.
#[derive(Clone)]
enum Route {
    /// Served in `chunk` sized pieces with a content length.
    Chunked { bytes: Vec<u8>, chunk: usize },
    /// Served without a content length.
    Whole(Vec<u8>),
    /// Fails after `after` chunks.
    Interrupted { bytes: Vec<u8>, chunk: usize, after: usize },
    Status(u16, &'static str),
}

type RequestHook = Box<dyn Fn() + Send + Sync>;

/// Transport answering from a fixed routing table. Unknown URLs get 404.
#[derive(Default)]
pub struct StaticTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: AtomicUsize,
    on_request: Option<RequestHook>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(self, url: &str, route: Route) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), route);
        }
        self
    }

    pub fn serve(self, url: &str, bytes: Vec<u8>) -> Self {
        let chunk = (bytes.len() / 4).max(1);
        self.route(url, Route::Chunked { bytes, chunk })
    }

    pub fn serve_whole(self, url: &str, bytes: Vec<u8>) -> Self {
        self.route(url, Route::Whole(bytes))
    }

    pub fn serve_interrupted(self, url: &str, bytes: Vec<u8>, after: usize) -> Self {
        let chunk = (bytes.len() / 4).max(1);
        self.route(url, Route::Interrupted { bytes, chunk, after })
    }

    pub fn serve_status(self, url: &str, status: u16, text: &'static str) -> Self {
        self.route(url, Route::Status(status, text))
    }

    /// Run `hook` while each request is in flight.
    pub fn on_request(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_request = Some(Box::new(hook));
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn get(&self, url: &str) -> Result<Body> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_request {
            hook();
        }
        let route = self
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(url).cloned())
            .unwrap_or(Route::Status(404, "Not Found"));

        match route {
            Route::Status(status, text) => Err(LoadError::FetchStatus {
                status,
                status_text: text.to_string(),
            }),
            Route::Whole(bytes) => Ok(Body::Whole(bytes)),
            Route::Chunked { bytes, chunk } => {
                let total = bytes.len() as u64;
                let chunks: Vec<std::io::Result<Vec<u8>>> =
                    bytes.chunks(chunk).map(|c| Ok(c.to_vec())).collect();
                Ok(Body::Chunked {
                    total,
                    stream: stream::iter(chunks).boxed(),
                })
            }
            Route::Interrupted { bytes, chunk, after } => {
                let total = bytes.len() as u64;
                let mut chunks: Vec<std::io::Result<Vec<u8>>> = bytes
                    .chunks(chunk)
                    .take(after)
                    .map(|c| Ok(c.to_vec()))
                    .collect();
                chunks.push(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
                Ok(Body::Chunked {
                    total,
                    stream: stream::iter(chunks).boxed(),
                })
            }
        }
    }
}

/// Records every progress event.
#[derive(Clone, Default)]
pub struct ProgressLog {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> impl Fn(ProgressEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| {
            if let Ok(mut events) = events.lock() {
                events.push(event);
            }
        }
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.percent).collect()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.events().iter().filter(|e| e.stage == stage).count()
    }
}
