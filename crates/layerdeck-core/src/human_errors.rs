// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language error messages for the template wizard.
//
// Known causes are rewritten into something a card designer can act on.
// Anything unrecognised is passed through untouched so support can still
// read the technical detail.

use crate::error::LoadError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or slow import; trying again may work.
    Transient,
    /// User must do something (pick a smaller or different file).
    ActionRequired,
    /// Retrying the same input will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the caller may offer a retry button.
    pub retriable: bool,
    pub severity: Severity,
}

/// Message placed on a failed `LoadResult`.
///
/// Memory exhaustion becomes a "file too large" hint; every other error is
/// passed through as its display text.
pub fn user_message(err: &LoadError) -> String {
    if is_out_of_memory(err) {
        "File too large. Please try a smaller file.".into()
    } else {
        err.to_string()
    }
}

/// Only the import's own cause text is inspected. Fetch errors carry the
/// reference, and a URL may well contain the word.
fn is_out_of_memory(err: &LoadError) -> bool {
    match err {
        LoadError::Parse(detail) => detail.to_ascii_lowercase().contains("memory"),
        LoadError::Io(io_err) => io_err.kind() == std::io::ErrorKind::OutOfMemory,
        _ => false,
    }
}

/// Convert a `LoadError` into a `HumanError` for the wizard's error panel.
pub fn humanize_error(err: &LoadError) -> HumanError {
    match err {
        LoadError::Fetch(_) | LoadError::FetchInterrupted(_) => HumanError {
            message: "We couldn't download this template.".into(),
            suggestion: "Check your internet connection, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        LoadError::FetchStatus { status, .. } => {
            if (500..600).contains(status) {
                HumanError {
                    message: "The template server had a problem.".into(),
                    suggestion: "Wait a moment and try again.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            } else {
                HumanError {
                    message: "This template isn't available.".into(),
                    suggestion: format!("The server answered with status {status}. Try picking another template."),
                    retriable: false,
                    severity: Severity::Permanent,
                }
            }
        }

        LoadError::CorruptBuffer { .. } => HumanError {
            message: "This file looks damaged.".into(),
            suggestion: "Try exporting the design again, or choose a different file.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        LoadError::EngineDisposed(_) => HumanError {
            message: "The editor was closed while the template was loading.".into(),
            suggestion: "Open the editor again to reload the template.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LoadError::Scene(_) => HumanError {
            message: "The editor couldn't prepare a blank canvas.".into(),
            suggestion: "Reload the page and try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        LoadError::ParseTimeout { .. } => HumanError {
            message: "This template took too long to open.".into(),
            suggestion: "Large files can be slow. Try again, or use a smaller file.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        LoadError::Parse(_) => {
            if is_out_of_memory(err) {
                HumanError {
                    message: "File too large. Please try a smaller file.".into(),
                    suggestion: "Reduce the image sizes in the design, or flatten unused layers.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "We couldn't read this design file.".into(),
                    suggestion: "Make sure it's a layered design file saved by a recent editor version.".into(),
                    retriable: false,
                    severity: Severity::Permanent,
                }
            }
        }

        LoadError::PageNotFound { .. } | LoadError::SingleSided(_) => HumanError {
            message: "That side of the card doesn't exist.".into(),
            suggestion: "This template only has the sides shown in the editor.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LoadError::Cancelled => HumanError {
            message: "Loading was cancelled.".into(),
            suggestion: "Pick the template again when you're ready.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        LoadError::Config(_) | LoadError::Serialization(_) => HumanError {
            message: "The app had an internal setup problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LoadError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The app doesn't have permission to read that file.".into(),
                    suggestion: "Check the file permissions, or copy the file somewhere else first.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading the file.".into(),
                    suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }
    }
}
