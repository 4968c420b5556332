// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark compositor — draws one text run or one image onto every page of a
// document at a percentage position, with rotation and opacity.
//
// Text is set in Helvetica (WinAnsi), grey, from its baseline origin. Images are
// embedded once as a Flate-compressed RGB XObject (plus a soft mask when the
// source has transparency) and drawn centred on the placement point on each page.

use lopdf::content::Operation;
use lopdf::{Object, ObjectId, Stream, StringFormat, dictionary};
use pdfcat_core::error::Result;
use pdfcat_core::{Placement, WatermarkContent, WatermarkSpec};
use tracing::{debug, info, instrument, warn};

use crate::geometry::{self, Anchor, DrawOrigin, Matrix};
use crate::image::ImageProcessor;
use crate::pdf::document::real;
use crate::pdf::{Page, PdfDocument};

/// Fill colour for text watermarks.
const TEXT_GREY: f32 = 0.5;

/// Apply `spec` to every page of `document` and return it.
///
/// The document is taken by value and edited in place; callers that need the
/// original keep their own copy. Page count, order, and sizes never change.
#[instrument(skip_all, fields(kind = ?spec.kind(), pages = document.page_count()))]
pub async fn composite(mut document: PdfDocument, spec: &WatermarkSpec) -> Result<PdfDocument> {
    spec.validate()?;

    let opacity = spec.placement.opacity;
    let graphics_state = document.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => real(opacity),
        "CA" => real(opacity),
    });

    let pages = document.pages().to_vec();
    match &spec.content {
        WatermarkContent::Text { content, font_size } => {
            let font = document.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            });
            let encoded = encode_win_ansi(content);

            for page in &pages {
                let origin = page_origin(page, &spec.placement, Anchor::Baseline);
                let gs_name = document.add_resource(page, "ExtGState", "GsW", graphics_state)?;
                let font_name = document.add_resource(page, "Font", "FW", font)?;
                let ops = text_operations(&gs_name, &font_name, *font_size, &encoded, origin.matrix());
                document.append_operations(page, ops)?;
                debug!(page = page.number, x = origin.x, y = origin.y, "text watermark drawn");
                tokio::task::yield_now().await;
            }
        }
        WatermarkContent::Image {
            bytes,
            scale_percent,
        } => {
            let image = ImageProcessor::from_bytes(bytes)?;
            tokio::task::yield_now().await;

            let (natural_width, natural_height) = (image.width(), image.height());
            let xobject = embed_image(&mut document, &image);
            tokio::task::yield_now().await;

            let (width, height) = geometry::image_draw_size(natural_width, natural_height, *scale_percent);
            for page in &pages {
                let origin = page_origin(page, &spec.placement, Anchor::Centered { width, height });
                let gs_name = document.add_resource(page, "ExtGState", "GsW", graphics_state)?;
                let image_name = document.add_resource(page, "XObject", "ImW", xobject)?;
                let ops = image_operations(&gs_name, &image_name, width, height, origin.matrix());
                document.append_operations(page, ops)?;
                debug!(page = page.number, x = origin.x, y = origin.y, "image watermark drawn");
                tokio::task::yield_now().await;
            }
        }
    }

    info!(pages = pages.len(), "watermark composited");
    Ok(document)
}

/// Placement resolved against the page's MediaBox.
fn page_origin(page: &Page, placement: &Placement, anchor: Anchor) -> DrawOrigin {
    let mut origin = geometry::locate(page.width, page.height, placement, anchor);
    origin.x += page.origin.0;
    origin.y += page.origin.1;
    origin
}

fn text_operations(
    gs_name: &str,
    font_name: &str,
    font_size: f32,
    encoded: &[u8],
    matrix: Matrix,
) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(gs_name.as_bytes().to_vec())]),
        Operation::new("rg", vec![real(TEXT_GREY), real(TEXT_GREY), real(TEXT_GREY)]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name.as_bytes().to_vec()), real(font_size)],
        ),
        Operation::new("Tm", matrix_operands(matrix)),
        Operation::new(
            "Tj",
            vec![Object::String(encoded.to_vec(), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn image_operations(gs_name: &str, image_name: &str, width: f32, height: f32, matrix: Matrix) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(gs_name.as_bytes().to_vec())]),
        Operation::new("cm", matrix_operands(matrix)),
        Operation::new("cm", matrix_operands(Matrix::scale(width, height))),
        Operation::new("Do", vec![Object::Name(image_name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

fn matrix_operands(matrix: Matrix) -> Vec<Object> {
    matrix.to_array().into_iter().map(real).collect()
}

/// Add the image (and its soft mask, if any) as XObjects.
fn embed_image(document: &mut PdfDocument, image: &ImageProcessor) -> ObjectId {
    let (rgb, alpha) = image.rgb_and_alpha();

    let soft_mask = alpha.map(|alpha| {
        let mut mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        let _ = mask.compress();
        document.add_object(mask)
    });

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width() as i64,
        "Height" => image.height() as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if let Some(mask_id) = soft_mask {
        dict.set("SMask", mask_id);
    }
    let mut stream = Stream::new(dict, rgb);
    let _ = stream.compress();
    document.add_object(stream)
}

/// Encode text for a WinAnsi simple font. Characters outside the encoding
/// become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut replaced = 0usize;
    let bytes = text
        .chars()
        .map(|ch| {
            win_ansi_byte(ch).unwrap_or_else(|| {
                replaced += 1;
                b'?'
            })
        })
        .collect::<Vec<u8>>();
    if replaced > 0 {
        warn!(replaced, "watermark text has characters Helvetica cannot show");
    }
    bytes
}

fn win_ansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        ' '..='~' => ch as u8,
        '\u{A0}'..='\u{FF}' => ch as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '™' => 0x99,
        _ => return None,
    };
    Some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::SaveOptions;
    use crate::pdf::document::{fixtures, number};
    use image::{DynamicImage, Rgba, RgbaImage};
    use pdfcat_core::PdfCatError;

    fn find<'a>(ops: &'a [Operation], operator: &str) -> Vec<&'a Operation> {
        ops.iter().filter(|op| op.operator == operator).collect()
    }

    fn operands(op: &Operation) -> Vec<f32> {
        op.operands.iter().filter_map(number).collect()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn png(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([20, 40, 200, alpha]));
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(img))
            .to_png_bytes()
            .unwrap()
    }

    #[tokio::test]
    async fn text_lands_at_page_centre_on_every_page() {
        let doc = fixtures::shaded_document(3, 1500.0, 1200.0);
        let spec = WatermarkSpec::text("CONFIDENTIAL", 80.0, Placement::default());

        let out = composite(doc, &spec).await.unwrap();
        assert_eq!(out.page_count(), 3);

        for page in out.pages() {
            assert_eq!((page.width, page.height), (1500.0, 1200.0));
            let ops = out.operations(page).unwrap();

            assert_eq!(find(&ops, "Tj").len(), 1);
            assert_eq!(find(&ops, "Tm").len(), 1);
            let tm = operands(find(&ops, "Tm")[0]);
            let (sin, cos) = 45f32.to_radians().sin_cos();
            assert!(close(tm[0], cos) && close(tm[1], sin));
            assert!(close(tm[4], 750.0) && close(tm[5], 600.0));

            let tf = operands(find(&ops, "Tf")[0]);
            assert_eq!(tf, vec![80.0]);

            let resources = out.resources(page);
            let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
            let state = out.resolve(states.get(b"GsW").unwrap()).as_dict().unwrap();
            assert!(close(number(state.get(b"ca").unwrap()).unwrap(), 0.3));
        }
    }

    #[tokio::test]
    async fn each_page_uses_its_own_size() {
        let mut doc = PdfDocument::empty();
        doc.add_page(100.0, 100.0, vec![], lopdf::Dictionary::new()).unwrap();
        doc.add_page(300.0, 200.0, vec![], lopdf::Dictionary::new()).unwrap();
        let placement = Placement {
            rotation_degrees: 0.0,
            ..Placement::default()
        };
        let spec = WatermarkSpec::text("DRAFT", 24.0, placement);

        let out = composite(doc, &spec).await.unwrap();
        let centres: Vec<(f32, f32)> = out
            .pages()
            .iter()
            .map(|page| {
                let ops = out.operations(page).unwrap();
                let tm = operands(find(&ops, "Tm")[0]);
                (tm[4], tm[5])
            })
            .collect();
        assert_eq!(centres, vec![(50.0, 50.0), (150.0, 100.0)]);
    }

    #[tokio::test]
    async fn image_is_centred_at_half_scale() {
        let doc = fixtures::shaded_document(1, 200.0, 100.0);
        let placement = Placement {
            rotation_degrees: 0.0,
            opacity: 1.0,
            ..Placement::default()
        };
        let spec = WatermarkSpec::image(png(40, 20, 128), 100.0, placement);

        let out = composite(doc, &spec).await.unwrap();
        let page = out.pages()[0];
        let ops = out.operations(&page).unwrap();

        let cms = find(&ops, "cm");
        assert_eq!(operands(cms[0]), vec![1.0, 0.0, 0.0, 1.0, 90.0, 45.0]);
        assert_eq!(operands(cms[1]), vec![20.0, 0.0, 0.0, 10.0, 0.0, 0.0]);

        let resources = out.resources(&page);
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image = match out.resolve(xobjects.get(b"ImW").unwrap()) {
            Object::Stream(stream) => stream,
            other => panic!("expected image stream, got {other:?}"),
        };
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 40);
        assert!(image.dict.has(b"SMask"));
    }

    #[tokio::test]
    async fn unsupported_logo_is_rejected() {
        let doc = fixtures::shaded_document(1, 100.0, 100.0);
        let spec = WatermarkSpec::image(b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec(), 100.0, Placement::default());
        let err = composite(doc, &spec).await.unwrap_err();
        assert!(matches!(err, PdfCatError::UnsupportedImageFormat(_)));
    }

    #[tokio::test]
    async fn out_of_range_settings_are_rejected() {
        let doc = fixtures::shaded_document(1, 100.0, 100.0);
        let spec = WatermarkSpec::text(
            "X",
            40.0,
            Placement {
                opacity: 2.0,
                ..Placement::default()
            },
        );
        let err = composite(doc, &spec).await.unwrap_err();
        assert!(matches!(err, PdfCatError::InvalidSettings(_)));
    }

    #[tokio::test]
    async fn watermarked_output_reopens() {
        let doc = fixtures::shaded_document(2, 612.0, 792.0);
        let spec = WatermarkSpec::text("Ünïcødé ✓", 40.0, Placement::default());
        let out = composite(doc, &spec).await.unwrap();

        let bytes = out.save(&SaveOptions::default()).await.unwrap();
        let reopened = PdfDocument::parse(&bytes).unwrap();
        assert_eq!(reopened.page_count(), 2);
        let ops = reopened.operations(&reopened.pages()[1]).unwrap();
        assert_eq!(find(&ops, "Tj").len(), 1);
    }

    #[test]
    fn win_ansi_replaces_unmappable_characters() {
        assert_eq!(encode_win_ansi("Café"), b"Caf\xE9".to_vec());
        assert_eq!(encode_win_ansi("a—b"), b"a\x97b".to_vec());
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }
}
