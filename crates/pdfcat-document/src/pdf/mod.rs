// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — document model and serializer.

pub mod document;
pub mod writer;

pub use document::{Metadata, Page, PdfDocument};
pub use writer::SaveOptions;
