// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Layerdeck template pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LoadError;
use crate::human_errors::{humanize_error, user_message};

/// Correlation identifier for one pipeline run (shows up in log spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadId(pub Uuid);

impl LoadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a template's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateRef<'a> {
    /// Fetched over the network.
    Url(&'a str),
    /// A `data:` URL carrying the bytes inline.
    Inline(&'a str),
}

impl<'a> TemplateRef<'a> {
    /// Classify a raw reference string.
    pub fn parse(reference: &'a str) -> Self {
        if reference.trim_start().starts_with("data:") {
            Self::Inline(reference.trim_start())
        } else {
            Self::Url(reference)
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

/// Face of a physical card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Front,
    Back,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Front => f.write_str("front"),
            Self::Back => f.write_str("back"),
        }
    }
}

/// Identifies a loadable template and its side/page layout.
///
/// Supplied by the caller and never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// URL or `data:` reference to the template bytes.
    pub reference: String,
    /// Display name shown in progress messages.
    pub name: String,
    /// Declared side count (1 or 2). `None` means "infer from page count".
    #[serde(default)]
    pub sides: Option<u8>,
    /// Explicit page index of the front face.
    #[serde(default)]
    pub front_page_index: Option<usize>,
    /// Explicit page index of the back face.
    #[serde(default)]
    pub back_page_index: Option<usize>,
}

impl TemplateDescriptor {
    /// Descriptor for a reference with no layout hints. The name is taken from
    /// the last path segment of a URL.
    pub fn from_reference(reference: &str) -> Self {
        let name = match TemplateRef::parse(reference) {
            TemplateRef::Inline(_) => "Embedded template".to_string(),
            TemplateRef::Url(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|path| path.rsplit('/').find(|seg| !seg.is_empty()))
                .unwrap_or(url)
                .to_string(),
        };
        Self {
            reference: reference.to_string(),
            name,
            sides: None,
            front_page_index: None,
            back_page_index: None,
        }
    }

    /// Descriptor used for files picked from local storage.
    pub fn local_file() -> Self {
        Self {
            reference: String::new(),
            name: "Local file".to_string(),
            sides: None,
            front_page_index: None,
            back_page_index: None,
        }
    }

    /// Whether the template has two faces, given the number of imported pages.
    pub fn is_double_sided(&self, page_count: usize) -> bool {
        match self.sides {
            Some(sides) => sides == 2,
            None => page_count == 2,
        }
    }

    /// 0-based page index for a side. Defaults are front = 0, back = 1; the
    /// hints only apply when both are supplied.
    pub fn page_index(&self, side: Side) -> usize {
        let (front, back) = match (self.front_page_index, self.back_page_index) {
            (Some(front), Some(back)) => (front, back),
            _ => (0, 1),
        };
        match side {
            Side::Front => front,
            Side::Back => back,
        }
    }
}

/// Pipeline stage carried by a [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetching,
    Cached,
    Processing,
    Parsing,
    Warning,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Cached => "cached",
            Self::Processing => "processing",
            Self::Parsing => "parsing",
            Self::Warning => "warning",
            Self::Complete => "complete",
        }
    }
}

/// Transient pipeline state reported to the caller for UI feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    /// Overall completion, 0–100. Fetch covers 0–50, parsing 50–100.
    pub percent: u8,
}

/// One item that failed inside a best-effort loop without aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Pipeline step the loop belongs to (e.g. "sanitize", "configure").
    pub step: String,
    /// The item that failed, usually a block handle.
    pub item: String,
    pub detail: String,
}

impl ItemFailure {
    pub fn new(step: &str, item: impl std::fmt::Display, detail: impl std::fmt::Display) -> Self {
        Self {
            step: step.to_string(),
            item: item.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub page_count: usize,
    pub is_double_sided: bool,
    /// Page index left visible after the load.
    pub visible_page: usize,
    /// Messages reported by the import routine.
    pub messages: Vec<String>,
    /// Partial failures collected while sanitizing and configuring.
    pub diagnostics: Vec<ItemFailure>,
}

/// Result handed back to the caller of a load. Never carries a panic or a
/// raw error: failures are described by `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    pub success: bool,
    pub page_count: usize,
    pub is_double_sided: bool,
    pub messages: Vec<String>,
    pub diagnostics: Vec<ItemFailure>,
    /// Plain-language failure description (`None` on success).
    pub error: Option<String>,
    /// Whether retrying the same load may succeed.
    pub retriable: bool,
}

impl LoadResult {
    pub fn succeeded(summary: LoadSummary) -> Self {
        Self {
            success: true,
            page_count: summary.page_count,
            is_double_sided: summary.is_double_sided,
            messages: summary.messages,
            diagnostics: summary.diagnostics,
            error: None,
            retriable: false,
        }
    }

    pub fn failed(err: &LoadError) -> Self {
        Self {
            success: false,
            page_count: 0,
            is_double_sided: false,
            messages: Vec::new(),
            diagnostics: Vec::new(),
            error: Some(user_message(err)),
            retriable: humanize_error(err).retriable,
        }
    }
}

impl From<crate::error::Result<LoadSummary>> for LoadResult {
    fn from(result: crate::error::Result<LoadSummary>) -> Self {
        match result {
            Ok(summary) => Self::succeeded(summary),
            Err(err) => Self::failed(&err),
        }
    }
}

/// Result of switching the visible side of a double-sided template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchResult {
    pub success: bool,
    pub page_index: Option<usize>,
    pub error: Option<String>,
}

impl From<crate::error::Result<usize>> for SwitchResult {
    fn from(result: crate::error::Result<usize>) -> Self {
        match result {
            Ok(index) => Self {
                success: true,
                page_index: Some(index),
                error: None,
            },
            Err(err) => Self {
                success: false,
                page_index: None,
                error: Some(user_message(&err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_are_inline() {
        assert!(TemplateRef::parse("data:application/octet-stream;base64,OEJQUw==").is_inline());
        assert!(!TemplateRef::parse("https://cdn.example.com/cards/front.psd").is_inline());
    }

    #[test]
    fn name_comes_from_last_path_segment() {
        let desc = TemplateDescriptor::from_reference("https://cdn.example.com/cards/gold.psd?v=3");
        assert_eq!(desc.name, "gold.psd");
    }

    #[test]
    fn page_hints_need_both_sides() {
        let mut desc = TemplateDescriptor::from_reference("https://x/a.psd");
        desc.front_page_index = Some(1);
        assert_eq!(desc.page_index(Side::Front), 0);
        assert_eq!(desc.page_index(Side::Back), 1);

        desc.back_page_index = Some(0);
        assert_eq!(desc.page_index(Side::Front), 1);
        assert_eq!(desc.page_index(Side::Back), 0);
    }

    #[test]
    fn declared_sides_override_page_count() {
        let mut desc = TemplateDescriptor::from_reference("https://x/a.psd");
        assert!(desc.is_double_sided(2));
        assert!(!desc.is_double_sided(3));

        desc.sides = Some(1);
        assert!(!desc.is_double_sided(2));
        desc.sides = Some(2);
        assert!(desc.is_double_sided(1));
    }

    #[test]
    fn descriptor_deserializes_without_hints() {
        let desc: TemplateDescriptor =
            serde_json::from_str(r#"{"reference":"https://x/a.psd","name":"A"}"#).unwrap();
        assert_eq!(desc.sides, None);
        assert_eq!(desc.front_page_index, None);
    }

    #[test]
    fn failed_result_carries_message() {
        let result = LoadResult::failed(&LoadError::ParseTimeout { secs: 120 });
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timeout"));
    }
}
