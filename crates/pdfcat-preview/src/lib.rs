// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pdfcat-preview — Live watermark preview for PDF Cat.
//
// Recomputes the watermarked document on every settings change, keeps only
// the newest cycle's result, and owns the single live preview handle.

pub mod controller;
pub mod handle;

pub use controller::{PreviewController, PreviewJob, PreviewOutcome, PreviewResult, PreviewState};
pub use handle::{PreviewHandle, PreviewStore};
