// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded buffer cache keyed by template reference.
//
// Eviction is by insertion order: the oldest insertion goes first once the
// cache is full, and reading an entry does not refresh it. Only raw bytes are
// cached; the scene itself belongs to one live engine and is rebuilt from the
// bytes on every hit.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use layerdeck_core::types::{LoadSummary, TemplateDescriptor, TemplateRef};

/// One cached template buffer.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bytes: Arc<[u8]>,
    /// Descriptor the bytes were loaded with.
    pub template: TemplateDescriptor,
    /// Outcome of the most recent successful load from these bytes.
    pub last_result: Option<LoadSummary>,
    pub inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(bytes: Arc<[u8]>, template: TemplateDescriptor, last_result: Option<LoadSummary>) -> Self {
        Self {
            bytes,
            template,
            last_result,
            inserted_at: Utc::now(),
        }
    }
}

/// Cache key for a reference. URLs key by themselves; inline data keys by
/// its SHA-256 so large data URLs are not held twice.
pub fn cache_key(reference: &str) -> String {
    match TemplateRef::parse(reference) {
        TemplateRef::Url(url) => url.to_string(),
        TemplateRef::Inline(data) => {
            let digest = Sha256::digest(data.as_bytes());
            format!("inline:{}", hex::encode(digest))
        }
    }
}

/// Insertion-ordered cache with a fixed capacity.
#[derive(Debug)]
pub struct BufferCache {
    capacity: usize,
    /// Oldest insertion at the front.
    entries: VecDeque<(String, CacheEntry)>,
}

impl BufferCache {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    /// Insert `entry`, replacing any entry with the same key. Returns the key
    /// evicted to make room, if any.
    pub fn put(&mut self, key: String, entry: CacheEntry) -> Option<String> {
        self.remove(&key);

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front().map(|(k, _)| k)
        } else {
            None
        };
        if let Some(old) = &evicted {
            debug!(key = %old, "evicting oldest cached template");
        }

        debug!(key = %key, bytes = entry.bytes.len(), "caching template buffer");
        self.entries.push_back((key, entry));
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        self.entries.remove(position).map(|(_, e)| e)
    }

    /// Refresh the stored outcome without touching insertion order.
    pub fn record_result(&mut self, key: &str, summary: LoadSummary) {
        if let Some((_, entry)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.last_result = Some(summary);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
