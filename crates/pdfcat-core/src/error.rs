// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for PDF Cat.

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all PDF Cat operations.
#[derive(Debug, Error)]
pub enum PdfCatError {
    // -- Input errors --
    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("unsupported watermark image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    // -- Pipeline errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("page {page} could not be rendered: {detail}")]
    Render { page: u32, detail: String },

    #[error("compression failed: {0}")]
    Compression(String),

    /// The output was produced but is larger than the caller's target.
    #[error("compressed output is {actual} bytes, above the {target} byte target")]
    SizeTargetMissed { actual: usize, target: usize },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PdfCatError {
    /// Classify the error for the caller's corrective action.
    ///
    /// Nothing in the pipeline retries on its own; this only tells the caller
    /// whether new parameters could help.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SizeTargetMissed { .. } => ErrorClass::AdjustParameters,
            Self::InvalidSettings(_) | Self::UnsupportedImageFormat(_) => ErrorClass::InvalidInput,
            Self::UnsupportedDocument(_) => ErrorClass::InvalidInput,
            Self::PdfError(_)
            | Self::ImageError(_)
            | Self::Render { .. }
            | Self::Compression(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Permanent,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PdfCatError>;
