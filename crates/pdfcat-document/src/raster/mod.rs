// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterizer seam — turns one page into a pixel buffer at a given viewport.
//
// The compressor only talks to `PageRasterizer`; `BasicRasterizer` is the
// built-in implementation.

pub mod basic;

pub use basic::BasicRasterizer;

use image::RgbaImage;
use pdfcat_core::error::Result;

use tracing::warn;

use crate::geometry::Matrix;
use crate::pdf::{Page, PdfDocument};

/// Longest side of any rendered page, in pixels.
pub const MAX_DIMENSION_PX: u32 = 8192;

/// Pixel dimensions of one rendered page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Page size times `scale`, rounded to whole pixels (never zero).
    ///
    /// Pages whose longest side would exceed [`MAX_DIMENSION_PX`] are scaled
    /// down to fit, keeping the aspect ratio. Width and height follow the
    /// page as displayed, so a quarter-turned page swaps them.
    pub fn for_page(page: &Page, scale: f32) -> Self {
        let longest = page.width.max(page.height) * scale;
        let scale = if longest > MAX_DIMENSION_PX as f32 {
            let capped = scale * MAX_DIMENSION_PX as f32 / longest;
            warn!(
                page = page.number,
                requested = scale,
                capped,
                "page dimensions capped to {MAX_DIMENSION_PX}px"
            );
            capped
        } else {
            scale
        };

        let pixels = |points: f32| (points * scale).round().clamp(1.0, MAX_DIMENSION_PX as f32) as u32;
        let (width, height) = (pixels(page.width), pixels(page.height));
        let (width, height) = if page.rotation % 180 == 90 {
            (height, width)
        } else {
            (width, height)
        };
        Self {
            scale,
            width,
            height,
        }
    }

    /// Maps page space (origin bottom-left) onto pixel space (origin
    /// top-left), turned clockwise by the page's `/Rotate`.
    pub fn device_matrix(&self, page: &Page) -> Matrix {
        let (x0, y0) = page.origin;
        let s = self.scale;
        let upright = Matrix::new(s, 0.0, 0.0, -s, -x0 * s, (y0 + page.height) * s);

        let (w, h) = (page.width * s, page.height * s);
        let turn = match page.rotation {
            90 => Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
            180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
            270 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
            _ => Matrix::IDENTITY,
        };
        upright.concat(turn)
    }
}

/// Renders pages to RGBA pixels.
///
/// Implementations are shared behind an `Arc` and may be called from any
/// thread.
pub trait PageRasterizer: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Render `page` of `document` into an image exactly
    /// `viewport.width` x `viewport.height` pixels.
    fn render(&self, document: &PdfDocument, page: &Page, viewport: &Viewport) -> Result<RgbaImage>;
}
