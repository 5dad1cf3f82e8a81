// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress reporting for one pipeline run.

use std::sync::atomic::{AtomicU8, Ordering};

use layerdeck_core::types::{ProgressEvent, Stage};

/// Caller-supplied progress callback.
pub type ProgressFn = dyn Fn(ProgressEvent) + Send + Sync;

/// Wraps the caller's callback for a single load.
///
/// Percentages are clamped to 0–100 and never go backwards: a step that asks
/// for a lower value than the last one emitted is reported at the last value.
pub struct ProgressReporter<'a> {
    sink: &'a ProgressFn,
    last: AtomicU8,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a ProgressFn) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    pub fn emit(&self, stage: Stage, message: impl Into<String>, percent: u8) {
        let requested = percent.min(100);
        let previous = self.last.fetch_max(requested, Ordering::SeqCst);
        (self.sink)(ProgressEvent {
            stage,
            message: message.into(),
            percent: requested.max(previous),
        });
    }

    /// Last percentage emitted.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn never_goes_backwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |e: ProgressEvent| seen.lock().unwrap().push(e.percent)
        };
        let progress = ProgressReporter::new(&sink);

        progress.emit(Stage::Fetching, "a", 30);
        progress.emit(Stage::Warning, "b", 10);
        progress.emit(Stage::Complete, "c", 250);

        assert_eq!(*seen.lock().unwrap(), vec![30, 30, 100]);
        assert_eq!(progress.current(), 100);
    }
}
