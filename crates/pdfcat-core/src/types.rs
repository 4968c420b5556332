// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for PDF Cat: watermark and compression parameters.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PdfCatError, Result};

/// File name used for watermarked downloads.
pub const WATERMARKED_FILE_NAME: &str = "watermarked-document.pdf";

/// Name of the compressed artifact derived from the uploaded file name.
pub fn compressed_file_name(original: &str) -> String {
    format!("compressed_{original}")
}

/// Which watermark variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    #[default]
    Text,
    Image,
}

/// Placement fields shared by both watermark variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
    /// Counter-clockwise, wrapped to [0, 360).
    pub rotation_degrees: f32,
    /// 0 = left edge, 100 = right edge.
    pub horizontal_percent: f32,
    /// 0 = bottom edge, 100 = top edge.
    pub vertical_percent: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            opacity: 0.3,
            rotation_degrees: 45.0,
            horizontal_percent: 50.0,
            vertical_percent: 50.0,
        }
    }
}

impl Placement {
    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<()> {
        check_range("opacity", self.opacity, 0.0, 1.0)?;
        check_range("rotation", self.rotation_degrees, 0.0, 360.0)?;
        check_range("horizontal position", self.horizontal_percent, 0.0, 100.0)?;
        check_range("vertical position", self.vertical_percent, 0.0, 100.0)
    }
}

/// What gets drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkContent {
    /// A single run of text, drawn from its baseline origin.
    Text { content: String, font_size: f32 },
    /// An encoded PNG or JPEG, drawn centred on the placement point.
    Image { bytes: Arc<[u8]>, scale_percent: f32 },
}

/// A complete, executable watermark request.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    pub content: WatermarkContent,
    pub placement: Placement,
}

impl WatermarkSpec {
    pub fn text(content: impl Into<String>, font_size: f32, placement: Placement) -> Self {
        Self {
            content: WatermarkContent::Text {
                content: content.into(),
                font_size,
            },
            placement,
        }
    }

    pub fn image(bytes: impl Into<Arc<[u8]>>, scale_percent: f32, placement: Placement) -> Self {
        Self {
            content: WatermarkContent::Image {
                bytes: bytes.into(),
                scale_percent,
            },
            placement,
        }
    }

    pub fn kind(&self) -> WatermarkKind {
        match self.content {
            WatermarkContent::Text { .. } => WatermarkKind::Text,
            WatermarkContent::Image { .. } => WatermarkKind::Image,
        }
    }

    /// Validate numeric ranges. Empty text or image bytes are the caller's
    /// precondition and are not checked here.
    pub fn validate(&self) -> Result<()> {
        self.placement.validate()?;
        match &self.content {
            WatermarkContent::Text { font_size, .. } => check_positive("font size", *font_size),
            WatermarkContent::Image { scale_percent, .. } => {
                check_positive("image scale", *scale_percent)
            }
        }
    }
}

/// Editable watermark configuration as held by a preview session.
///
/// Text and image settings live side by side; switching `kind` never clears
/// the inactive variant, so toggling back restores what was there.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSettings {
    pub kind: WatermarkKind,
    pub text: String,
    pub font_size: f32,
    pub image: Option<Arc<[u8]>>,
    pub image_scale_percent: f32,
    pub placement: Placement,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            kind: WatermarkKind::Text,
            text: "CONFIDENTIAL".to_string(),
            font_size: 80.0,
            image: None,
            image_scale_percent: 100.0,
            placement: Placement::default(),
        }
    }
}

impl WatermarkSettings {
    /// Switch the active variant.
    pub fn select(&mut self, kind: WatermarkKind) {
        self.kind = kind;
    }

    /// The request for the active variant, or `None` if that variant has no
    /// text or no image yet.
    pub fn active_spec(&self) -> Option<WatermarkSpec> {
        match self.kind {
            WatermarkKind::Text if !self.text.is_empty() => Some(WatermarkSpec::text(
                self.text.clone(),
                self.font_size,
                self.placement,
            )),
            WatermarkKind::Image => self
                .image
                .as_ref()
                .filter(|bytes| !bytes.is_empty())
                .map(|bytes| {
                    WatermarkSpec::image(Arc::clone(bytes), self.image_scale_percent, self.placement)
                }),
            WatermarkKind::Text => None,
        }
    }
}

/// Parameters for one rasterizing compression run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSpec {
    /// Applied to each page's natural size before rendering, in (0, 1].
    pub scale_factor: f32,
    /// JPEG encode quality in (0, 1].
    pub quality: f32,
    /// Fail with `SizeTargetMissed` when the output is larger than this.
    pub target_max_bytes: Option<usize>,
}

impl Default for CompressionSpec {
    fn default() -> Self {
        Self {
            scale_factor: 0.5,
            quality: 0.9,
            target_max_bytes: None,
        }
    }
}

impl CompressionSpec {
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("scale factor", self.scale_factor)?;
        check_unit_interval("JPEG quality", self.quality)
    }

    /// Quality mapped onto the 1–100 scale JPEG encoders expect.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// The two ways of shrinking a document. They enforce size differently, so
/// the caller picks one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Clear metadata and re-save with a compact object layout. Page content
    /// is untouched.
    StripMetadata { target_max_bytes: Option<usize> },
    /// Render every page to a JPEG and rebuild the document from the images.
    Rasterize(CompressionSpec),
}

impl CompressionStrategy {
    pub fn target_max_bytes(&self) -> Option<usize> {
        match self {
            Self::StripMetadata { target_max_bytes } => *target_max_bytes,
            Self::Rasterize(spec) => spec.target_max_bytes,
        }
    }
}

/// Classification of errors for caller decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// The input or settings cannot be processed as given.
    InvalidInput,
    /// Processing worked but the result missed a target; different
    /// parameters may succeed.
    AdjustParameters,
    /// Processing failed outright.
    Permanent,
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(PdfCatError::InvalidSettings(format!(
            "{name} must be between {min} and {max}, got {value}"
        )))
    }
}

fn check_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PdfCatError::InvalidSettings(format!(
            "{name} must be greater than zero, got {value}"
        )))
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(PdfCatError::InvalidSettings(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_kind_keeps_both_configurations() {
        let mut settings = WatermarkSettings {
            text: "DRAFT".into(),
            font_size: 120.0,
            image: Some(Arc::from(vec![1u8, 2, 3])),
            image_scale_percent: 40.0,
            ..Default::default()
        };

        settings.select(WatermarkKind::Image);
        assert_eq!(settings.active_spec().map(|s| s.kind()), Some(WatermarkKind::Image));

        settings.select(WatermarkKind::Text);
        let spec = settings.active_spec().unwrap();
        assert_eq!(
            spec.content,
            WatermarkContent::Text {
                content: "DRAFT".into(),
                font_size: 120.0
            }
        );
        assert_eq!(settings.image_scale_percent, 40.0);
    }

    #[test]
    fn incomplete_variant_has_no_spec() {
        let mut settings = WatermarkSettings::default();
        settings.select(WatermarkKind::Image);
        assert!(settings.active_spec().is_none());

        settings.select(WatermarkKind::Text);
        settings.text.clear();
        assert!(settings.active_spec().is_none());
    }

    #[test]
    fn placement_ranges_are_enforced() {
        let mut placement = Placement::default();
        assert!(placement.validate().is_ok());
        placement.opacity = 1.5;
        assert!(matches!(
            placement.validate(),
            Err(PdfCatError::InvalidSettings(_))
        ));
    }

    #[test]
    fn compression_spec_bounds() {
        let spec = CompressionSpec {
            scale_factor: 0.0,
            ..Default::default()
        };
        assert!(spec.validate().is_err());
        assert!(CompressionSpec::default().validate().is_ok());
        assert_eq!(CompressionSpec::default().jpeg_quality(), 90);
    }

    #[test]
    fn compressed_name_is_prefixed() {
        assert_eq!(compressed_file_name("report.pdf"), "compressed_report.pdf");
    }
}
