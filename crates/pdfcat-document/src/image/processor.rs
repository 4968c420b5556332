// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decodes PNG/JPEG watermark images, splits them into the
// colour and alpha planes a PDF image XObject needs, and encodes page rasters
// as JPEG. Built on the `image` crate.

use image::{DynamicImage, ImageFormat};
use pdfcat_core::error::{PdfCatError, Result};
use tracing::{debug, instrument};

/// A single decoded image.
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode PNG or JPEG bytes.
    ///
    /// The format is sniffed from the bytes themselves. Anything other than
    /// PNG or JPEG, or a PNG/JPEG that does not decode, fails with
    /// [`PdfCatError::UnsupportedImageFormat`].
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let format = image::guess_format(data)
            .map_err(|_| PdfCatError::UnsupportedImageFormat("unrecognised image data".into()))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(PdfCatError::UnsupportedImageFormat(format!(
                "{:?} images cannot be used, only PNG and JPEG",
                format
            )));
        }

        let img = image::load_from_memory_with_format(data, format).map_err(|err| {
            PdfCatError::UnsupportedImageFormat(format!("{:?} image could not be decoded: {}", format, err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            ?format,
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Natural width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Natural height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Whether any pixel is less than fully opaque.
    pub fn has_transparency(&self) -> bool {
        self.image.color().has_alpha() && self.image.to_rgba8().pixels().any(|p| p.0[3] < u8::MAX)
    }

    /// Interleaved 8-bit RGB samples, plus an 8-bit alpha plane when the image
    /// has any transparency.
    pub fn rgb_and_alpha(&self) -> (Vec<u8>, Option<Vec<u8>>) {
        let rgb = self.image.to_rgb8().into_raw();
        let alpha = self.has_transparency().then(|| {
            self.image
                .to_rgba8()
                .pixels()
                .map(|p| p.0[3])
                .collect::<Vec<u8>>()
        });
        (rgb, alpha)
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode as baseline JPEG with the given quality (1-100). Alpha is
    /// dropped.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder).map_err(|err| {
            PdfCatError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| PdfCatError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}
