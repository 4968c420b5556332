// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pdfcat-document — Document processing for PDF Cat.
//
// Provides the PDF document model and serializer, percentage-based watermark
// placement, the watermark compositor, a page rasterizer, and the compression
// strategies built on top of it.

pub mod compress;
pub mod geometry;
pub mod image;
pub mod pdf;
pub mod raster;
pub mod watermark;

// Re-export the primary items so callers can use `pdfcat_document::PdfDocument` etc.
pub use compress::{CompressedDocument, Compressor};
pub use self::image::processor::ImageProcessor;
pub use pdf::document::{Metadata, Page, PdfDocument};
pub use pdf::writer::SaveOptions;
pub use raster::{BasicRasterizer, PageRasterizer, Viewport};
pub use watermark::composite;
