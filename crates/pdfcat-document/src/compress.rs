// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compressor — shrinks a document either by clearing metadata and re-saving
// compactly, or by rendering every page to a JPEG and rebuilding the document
// from those images. Both strategies report per-page progress and can enforce
// an optional output size target.

use std::sync::Arc;

use image::DynamicImage;
use lopdf::content::Operation;
use lopdf::{Object, Stream, dictionary};
use pdfcat_core::error::{PdfCatError, Result};
use pdfcat_core::{CompressionSpec, CompressionStrategy};
use tracing::{debug, info, instrument, warn};

use crate::geometry::Matrix;
use crate::image::ImageProcessor;
use crate::pdf::document::real;
use crate::pdf::{PdfDocument, SaveOptions};
use crate::raster::{BasicRasterizer, PageRasterizer, Viewport};

/// Resource name of the page image on rasterized pages.
const PAGE_IMAGE: &str = "Im0";

/// A finished compression run.
#[derive(Debug, Clone)]
pub struct CompressedDocument {
    pub document: PdfDocument,
    /// Serialized output; its length is what the size target was checked
    /// against.
    pub bytes: Vec<u8>,
}

/// Runs compression strategies against a fixed rasterizer backend.
///
/// The backend is chosen once at construction and never swapped.
pub struct Compressor {
    rasterizer: Arc<dyn PageRasterizer>,
    save_options: SaveOptions,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(Arc::new(BasicRasterizer::new()))
    }
}

impl Compressor {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            rasterizer,
            save_options: SaveOptions::default(),
        }
    }

    /// Serializer tuning for the output document.
    pub fn with_save_options(mut self, save_options: SaveOptions) -> Self {
        self.save_options = save_options;
        self
    }

    pub fn rasterizer_name(&self) -> &str {
        self.rasterizer.name()
    }

    /// Compress `document` with the chosen strategy.
    ///
    /// `progress` receives `pages_done / total_pages` after each page, ending
    /// at exactly 1.0. A missed size target fails with
    /// [`PdfCatError::SizeTargetMissed`]; nothing is retried here.
    #[instrument(skip_all, fields(pages = document.page_count(), rasterizer = self.rasterizer.name()))]
    pub async fn compress(
        &self,
        document: &PdfDocument,
        strategy: &CompressionStrategy,
        progress: impl FnMut(f32),
    ) -> Result<CompressedDocument> {
        let compressed = match strategy {
            CompressionStrategy::Rasterize(spec) => self.rasterize(document, spec, progress).await?,
            CompressionStrategy::StripMetadata { .. } => {
                self.strip_metadata(document, progress).await?
            }
        };

        if let Some(target) = strategy.target_max_bytes() {
            let actual = compressed.bytes.len();
            if actual > target {
                warn!(actual, target, "compressed output above size target");
                return Err(PdfCatError::SizeTargetMissed { actual, target });
            }
        }

        info!(bytes = compressed.bytes.len(), "compression finished");
        Ok(compressed)
    }

    async fn rasterize(
        &self,
        document: &PdfDocument,
        spec: &CompressionSpec,
        mut progress: impl FnMut(f32),
    ) -> Result<CompressedDocument> {
        spec.validate()?;
        let quality = spec.jpeg_quality();
        let total = document.page_count();
        let mut output = PdfDocument::empty();

        for (index, page) in document.pages().iter().enumerate() {
            let viewport = Viewport::for_page(page, spec.scale_factor);
            tokio::task::yield_now().await;

            let raster = self
                .rasterizer
                .render(document, page, &viewport)
                .map_err(|err| match err {
                    PdfCatError::Render { .. } => err,
                    other => PdfCatError::Render {
                        page: page.number,
                        detail: other.to_string(),
                    },
                })?;
            tokio::task::yield_now().await;

            let (width, height) = raster.dimensions();
            let jpeg = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(raster))
                .to_jpeg_bytes(quality)
                .map_err(|err| {
                    PdfCatError::Compression(format!("page {}: {}", page.number, err))
                })?;
            tokio::task::yield_now().await;

            let image_id = output.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            ));
            let (w, h) = (width as f32, height as f32);
            let operations = vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    Matrix::scale(w, h).to_array().into_iter().map(real).collect(),
                ),
                Operation::new("Do", vec![Object::Name(PAGE_IMAGE.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ];
            let resources = dictionary! {
                "XObject" => dictionary! { PAGE_IMAGE => image_id },
            };
            output.add_page(w, h, operations, resources)?;

            debug!(page = page.number, width, height, "page rasterized");
            progress((index + 1) as f32 / total as f32);
        }

        if total == 0 {
            progress(1.0);
        }

        let bytes = output.save(&self.save_options).await?;
        Ok(CompressedDocument {
            document: output,
            bytes,
        })
    }

    async fn strip_metadata(
        &self,
        document: &PdfDocument,
        mut progress: impl FnMut(f32),
    ) -> Result<CompressedDocument> {
        let mut output = document.clone();
        output.clear_metadata();

        let total = output.page_count();
        for index in 0..total {
            progress((index + 1) as f32 / total as f32);
        }
        if total == 0 {
            progress(1.0);
        }

        let options = SaveOptions {
            compact_object_layout: true,
            ..self.save_options
        };
        let bytes = output.save(&options).await?;
        Ok(CompressedDocument {
            document: output,
            bytes,
        })
    }
}
