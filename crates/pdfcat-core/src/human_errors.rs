// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the upload/download surface.
//
// Every technical error is mapped to plain English with a clear suggestion.
// "Could not process" and "processed but too large" stay distinct because
// they need different corrective actions.

use crate::error::PdfCatError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The user should pick a different file or fix a setting.
    ActionRequired,
    /// The document was processed; lower the scale or quality and try again.
    AdjustSettings,
    /// Cannot be fixed by retrying, e.g. a damaged file or encoder failure.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether running again with other settings could help.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `PdfCatError` into a `HumanError`.
pub fn humanize_error(err: &PdfCatError) -> HumanError {
    match err {
        // -- Input errors --
        PdfCatError::UnsupportedDocument(_) => HumanError {
            message: "This PDF can't be opened.".into(),
            suggestion: "The file may be damaged or password-protected. Remove the password or try a different file.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PdfCatError::UnsupportedImageFormat(_) => HumanError {
            message: "This logo image can't be used.".into(),
            suggestion: "Save the logo as a PNG or JPEG, then select it again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PdfCatError::InvalidSettings(detail) => HumanError {
            message: "One of the settings is out of range.".into(),
            suggestion: format!("Move the slider back into its range and try again. ({detail})"),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        // -- Pipeline errors --
        PdfCatError::SizeTargetMissed { actual, target } => HumanError {
            message: "The compressed PDF is still too large.".into(),
            suggestion: format!(
                "It came out at {} KB but needs to be under {} KB. Lower the compression scale or quality and try again.",
                actual.div_ceil(1024),
                target / 1024
            ),
            retriable: true,
            severity: Severity::AdjustSettings,
        },

        PdfCatError::Render { page, .. } => HumanError {
            message: format!("Page {page} couldn't be processed."),
            suggestion: "This page has content, such as text, that can't be turned into an image here. Use metadata-only compression instead.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PdfCatError::PdfError(_) | PdfCatError::Compression(_) => HumanError {
            message: "PDF processing failed.".into(),
            suggestion: "Please try again with a different file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PdfCatError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Storage / persistence --
        PdfCatError::Io(io_err) => HumanError {
            message: "A file couldn't be read or written.".into(),
            suggestion: format!("Check the file exists and that you can write to the output folder. ({io_err})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PdfCatError::Serialization(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "Check the settings file is valid JSON, or delete it to use the defaults.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_target_asks_for_new_settings() {
        let err = PdfCatError::SizeTargetMissed {
            actual: 3 * 1024 * 1024,
            target: 1024 * 1024,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::AdjustSettings);
        assert!(human.retriable);
        assert!(human.suggestion.contains("3072 KB"));
    }

    #[test]
    fn render_failure_is_permanent() {
        let err = PdfCatError::Render {
            page: 4,
            detail: "unsupported shading".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.message.contains('4'));
    }

    #[test]
    fn encrypted_pdf_needs_user_action() {
        let human = humanize_error(&PdfCatError::UnsupportedDocument("encrypted".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }
}
