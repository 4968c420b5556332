// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Basic rasterizer — paints vector paths and image XObjects onto a white page.
//
// Covers the graphics-state stack (q/Q/cm), device colours for fill and stroke,
// opacity and line width from ExtGState, rectangles and line/curve paths, image
// XObjects (JPEG, or raw/Flate samples in Gray/RGB/CMYK with an optional soft
// mask), and nested form XObjects. Visible text, shadings, inline images and
// image encodings outside that list fail the page with `PdfCatError::Render`
// rather than leaving it blank.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use pdfcat_core::error::{PdfCatError, Result};
use tracing::{debug, instrument, warn};

use super::{PageRasterizer, Viewport};
use crate::geometry::Matrix;
use crate::image::ImageProcessor;
use crate::pdf::document::number;
use crate::pdf::{Page, PdfDocument};

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// Line segments per Bézier curve.
const CURVE_STEPS: usize = 12;

/// Paints vector paths and images. Pages that show text are refused.
#[derive(Debug, Clone)]
pub struct BasicRasterizer {
    background: Rgba<u8>,
}

impl Default for BasicRasterizer {
    fn default() -> Self {
        Self {
            background: Rgba([255, 255, 255, 255]),
        }
    }
}

impl BasicRasterizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageRasterizer for BasicRasterizer {
    fn name(&self) -> &str {
        "basic"
    }

    #[instrument(skip_all, fields(page = page.number, width = viewport.width, height = viewport.height))]
    fn render(&self, document: &PdfDocument, page: &Page, viewport: &Viewport) -> Result<RgbaImage> {
        let operations = document.operations(page).map_err(|err| PdfCatError::Render {
            page: page.number,
            detail: err.to_string(),
        })?;
        let resources = document.resources(page);

        let mut painter = Painter {
            document,
            page: page.number,
            canvas: RgbaImage::from_pixel(viewport.width, viewport.height, self.background),
            images: HashMap::new(),
        };
        let state = GraphicsState {
            ctm: viewport.device_matrix(page),
            ..GraphicsState::default()
        };
        painter.run(&operations, &resources, state, 0)?;

        debug!(images = painter.images.len(), "page painted");
        Ok(painter.canvas)
    }
}

/// `Tr` modes that paint nothing (invisible, clip only).
const INVISIBLE_TEXT_MODES: [i64; 2] = [3, 7];

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    /// User space to device pixels.
    ctm: Matrix,
    fill: [u8; 3],
    fill_alpha: f32,
    stroke: [u8; 3],
    stroke_alpha: f32,
    /// In user-space units.
    line_width: f32,
    text_render_mode: i64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: [0, 0, 0],
            fill_alpha: 1.0,
            stroke: [0, 0, 0],
            stroke_alpha: 1.0,
            line_width: 1.0,
            text_render_mode: 0,
        }
    }
}

/// Subpaths in device space.
#[derive(Debug, Default)]
struct Path {
    subpaths: Vec<Vec<(f32, f32)>>,
}

impl Path {
    fn move_to(&mut self, point: (f32, f32)) {
        self.subpaths.push(vec![point]);
    }

    fn line_to(&mut self, point: (f32, f32)) {
        match self.subpaths.last_mut() {
            Some(current) => current.push(point),
            None => self.move_to(point),
        }
    }

    fn close(&mut self) {
        if let Some(current) = self.subpaths.last_mut() {
            if let (Some(&first), Some(&last)) = (current.first(), current.last()) {
                if current.len() > 1 && first != last {
                    current.push(first);
                }
            }
        }
    }

    fn current(&self) -> Option<(f32, f32)> {
        self.subpaths.last().and_then(|sub| sub.last().copied())
    }

    fn curve_to(&mut self, c1: (f32, f32), c2: (f32, f32), end: (f32, f32)) {
        let Some(start) = self.current() else {
            self.move_to(end);
            return;
        };
        for step in 1..=CURVE_STEPS {
            let t = step as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            let (w0, w1, w2, w3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            self.line_to((
                w0 * start.0 + w1 * c1.0 + w2 * c2.0 + w3 * end.0,
                w0 * start.1 + w1 * c1.1 + w2 * c2.1 + w3 * end.1,
            ));
        }
    }

    fn clear(&mut self) {
        self.subpaths.clear();
    }
}

struct Painter<'a> {
    document: &'a PdfDocument,
    page: u32,
    canvas: RgbaImage,
    /// Decoded image XObjects; `None` marks one that could not be decoded.
    images: HashMap<ObjectId, Option<RgbaImage>>,
}

impl Painter<'_> {
    fn run(
        &mut self,
        operations: &[Operation],
        resources: &Dictionary,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut path = Path::default();

        for op in operations {
            let n: Vec<f32> = op.operands.iter().filter_map(number).collect();
            let ctm = state.ctm;
            let point = move |x: f32, y: f32| ctm.transform_point(x, y);

            match op.operator.as_str() {
                "q" => stack.push(state),
                "Q" => {
                    if let Some(previous) = stack.pop() {
                        state = previous;
                    }
                }
                "cm" => {
                    if let [a, b, c, d, e, f] = n[..] {
                        state.ctm = Matrix::new(a, b, c, d, e, f).concat(state.ctm);
                    }
                }
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(rgb) = device_color(&n) {
                        state.fill = rgb;
                    }
                }
                "G" | "RG" | "K" | "SC" | "SCN" => {
                    if let Some(rgb) = device_color(&n) {
                        state.stroke = rgb;
                    }
                }
                "w" => {
                    if let [width] = n[..] {
                        state.line_width = width.max(0.0);
                    }
                }
                "gs" => self.apply_ext_gstate(resources, op, &mut state),
                "Tr" => {
                    if let [mode] = n[..] {
                        state.text_render_mode = mode as i64;
                    }
                }
                "Tj" | "TJ" | "'" | "\"" => {
                    if !INVISIBLE_TEXT_MODES.contains(&state.text_render_mode) {
                        return Err(self.unsupported("text"));
                    }
                }
                "sh" => return Err(self.unsupported("shading")),
                "BI" | "ID" | "EI" => return Err(self.unsupported("inline image")),
                "m" => {
                    if let [x, y] = n[..] {
                        path.move_to(point(x, y));
                    }
                }
                "l" => {
                    if let [x, y] = n[..] {
                        path.line_to(point(x, y));
                    }
                }
                "c" => {
                    if let [x1, y1, x2, y2, x3, y3] = n[..] {
                        path.curve_to(point(x1, y1), point(x2, y2), point(x3, y3));
                    }
                }
                "v" => {
                    if let [x2, y2, x3, y3] = n[..] {
                        if let Some(start) = path.current() {
                            path.curve_to(start, point(x2, y2), point(x3, y3));
                        }
                    }
                }
                "y" => {
                    if let [x1, y1, x3, y3] = n[..] {
                        let end = point(x3, y3);
                        path.curve_to(point(x1, y1), end, end);
                    }
                }
                "re" => {
                    if let [x, y, w, h] = n[..] {
                        path.move_to(point(x, y));
                        path.line_to(point(x + w, y));
                        path.line_to(point(x + w, y + h));
                        path.line_to(point(x, y + h));
                        path.close();
                    }
                }
                "h" => path.close(),
                "f" | "F" | "f*" => {
                    self.fill(&path, &state);
                    path.clear();
                }
                "S" => {
                    self.stroke(&path, &state);
                    path.clear();
                }
                "s" => {
                    path.close();
                    self.stroke(&path, &state);
                    path.clear();
                }
                "B" | "B*" => {
                    self.fill(&path, &state);
                    self.stroke(&path, &state);
                    path.clear();
                }
                "b" | "b*" => {
                    path.close();
                    self.fill(&path, &state);
                    self.stroke(&path, &state);
                    path.clear();
                }
                "n" => path.clear(),
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    if let Some(id) = lookup(self.document, resources, b"XObject", name) {
                        self.draw_xobject(id, resources, &state, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn unsupported(&self, what: &str) -> PdfCatError {
        PdfCatError::Render {
            page: self.page,
            detail: format!("{what} cannot be drawn by the basic rasterizer"),
        }
    }

    /// Pick up fill/stroke opacity and line width from a named ExtGState.
    fn apply_ext_gstate(&self, resources: &Dictionary, op: &Operation, state: &mut GraphicsState) {
        let Some(dict) = op
            .operands
            .first()
            .and_then(|o| o.as_name().ok())
            .and_then(|name| lookup(self.document, resources, b"ExtGState", name))
            .and_then(|id| self.document.inner().get_dictionary(id).ok())
        else {
            return;
        };
        let value = |key: &[u8]| dict.get(key).ok().and_then(number);
        if let Some(alpha) = value(b"ca") {
            state.fill_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(alpha) = value(b"CA") {
            state.stroke_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(width) = value(b"LW") {
            state.line_width = width.max(0.0);
        }
    }

    fn fill(&mut self, path: &Path, state: &GraphicsState) {
        for subpath in &path.subpaths {
            fill_polygon(&mut self.canvas, subpath, state.fill, state.fill_alpha);
        }
    }

    /// Each segment becomes a quad of the device-space line width, at least
    /// one pixel wide.
    fn stroke(&mut self, path: &Path, state: &GraphicsState) {
        let m = state.ctm;
        let scale = (m.a * m.d - m.b * m.c).abs().sqrt();
        let half = (state.line_width * scale).max(1.0) / 2.0;
        for subpath in &path.subpaths {
            for segment in subpath.windows(2) {
                if let Some(quad) = segment_quad(segment[0], segment[1], half) {
                    fill_polygon(&mut self.canvas, &quad, state.stroke, state.stroke_alpha);
                }
            }
        }
    }

    fn draw_xobject(
        &mut self,
        id: ObjectId,
        parent_resources: &Dictionary,
        state: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let document = self.document;
        let Ok(Object::Stream(stream)) = document.inner().get_object(id) else {
            return Ok(());
        };
        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok();

        match subtype {
            Some(b"Image") => {
                if !self.images.contains_key(&id) {
                    let decoded = decode_image(document, stream);
                    if decoded.is_none() {
                        warn!(page = self.page, object = ?id, "image encoding not supported");
                    }
                    self.images.insert(id, decoded);
                }
                match self.images.get(&id) {
                    Some(Some(image)) => {
                        draw_image(&mut self.canvas, image, state.ctm, state.fill_alpha);
                        Ok(())
                    }
                    _ => Err(PdfCatError::Render {
                        page: self.page,
                        detail: format!("image XObject {:?} could not be decoded", id),
                    }),
                }
            }
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let content = Content::decode(&bytes).map_err(|err| PdfCatError::Render {
                    page: self.page,
                    detail: format!("form XObject {:?}: {}", id, err),
                })?;
                let resources = match stream.dict.get(b"Resources") {
                    Ok(obj) => document
                        .resolve(obj)
                        .as_dict()
                        .cloned()
                        .unwrap_or_else(|_| parent_resources.clone()),
                    Err(_) => parent_resources.clone(),
                };
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|obj| matrix_from(document, obj))
                    .unwrap_or(Matrix::IDENTITY);

                let nested = GraphicsState {
                    ctm: form_matrix.concat(state.ctm),
                    ..*state
                };
                self.run(&content.operations, &resources, nested, depth + 1)
            }
            Some(b"Form") => Err(PdfCatError::Render {
                page: self.page,
                detail: format!("form XObjects nested deeper than {MAX_FORM_DEPTH}"),
            }),
            _ => Ok(()),
        }
    }
}

/// Look up `name` in a resource category, returning the referenced object.
fn lookup(document: &PdfDocument, resources: &Dictionary, category: &[u8], name: &[u8]) -> Option<ObjectId> {
    let entries = document.resolve(resources.get(category).ok()?).as_dict().ok()?;
    entries.get(name).ok()?.as_reference().ok()
}

fn matrix_from(document: &PdfDocument, object: &Object) -> Option<Matrix> {
    let values: Vec<f32> = document
        .resolve(object)
        .as_array()
        .ok()?
        .iter()
        .filter_map(number)
        .collect();
    match values[..] {
        [a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
        _ => None,
    }
}

/// Gray, RGB, or CMYK components (0-1) to 8-bit RGB, chosen by count.
fn device_color(components: &[f32]) -> Option<[u8; 3]> {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match *components {
        [gray] => Some([to_byte(gray); 3]),
        [r, g, b] => Some([to_byte(r), to_byte(g), to_byte(b)]),
        [c, m, y, k] => Some([
            to_byte((1.0 - c) * (1.0 - k)),
            to_byte((1.0 - m) * (1.0 - k)),
            to_byte((1.0 - y) * (1.0 - k)),
        ]),
        _ => None,
    }
}

/// The rectangle covering a line segment, `half` pixels either side.
fn segment_quad(from: (f32, f32), to: (f32, f32), half: f32) -> Option<[(f32, f32); 4]> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length < f32::EPSILON {
        return None;
    }
    let (nx, ny) = (-dy / length * half, dx / length * half);
    Some([
        (from.0 + nx, from.1 + ny),
        (to.0 + nx, to.1 + ny),
        (to.0 - nx, to.1 - ny),
        (from.0 - nx, from.1 - ny),
    ])
}

/// Source-over blend of one colour into a pixel.
fn blend(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let alpha = alpha.min(1.0);
    for (channel, value) in dst.0.iter_mut().zip(src) {
        *channel = (value as f32 * alpha + *channel as f32 * (1.0 - alpha)).round() as u8;
    }
    dst.0[3] = u8::MAX;
}

fn fill_polygon(canvas: &mut RgbaImage, subpath: &[(f32, f32)], color: [u8; 3], alpha: f32) {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(subpath.len());
    for &(x, y) in subpath {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        let p = Point::new(x.round() as i32, y.round() as i32);
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return;
    }

    // Rasterize the polygon into a coverage mask over its bounding box, then
    // blend through the mask.
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0).max(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0).max(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0).min(cw - 1);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0).min(ch - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    let offset: Vec<Point<i32>> = points
        .iter()
        .map(|p| Point::new(p.x - min_x, p.y - min_y))
        .collect();
    let mut mask = image::GrayImage::new((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32);
    draw_polygon_mut(&mut mask, &offset, image::Luma([u8::MAX]));

    for (mx, my, coverage) in mask.enumerate_pixels() {
        if coverage.0[0] > 0 {
            let pixel = canvas.get_pixel_mut(mx + min_x as u32, my + min_y as u32);
            blend(pixel, color, alpha);
        }
    }
}

/// Paint an image mapped onto the unit square by `ctm`.
fn draw_image(canvas: &mut RgbaImage, image: &RgbaImage, ctm: Matrix, alpha: f32) {
    let Some(inverse) = ctm.invert() else {
        return;
    };
    let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(u, v)| ctm.transform_point(u, v));
    let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).ceil();
    let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).ceil();
    let max_x = (max_x.max(0.0) as u32).min(canvas.width());
    let max_y = (max_y.max(0.0) as u32).min(canvas.height());

    let (iw, ih) = (image.width() as f32, image.height() as f32);
    for py in min_y..max_y {
        for px in min_x..max_x {
            let (u, v) = inverse.transform_point(px as f32 + 0.5, py as f32 + 0.5);
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            // Image row 0 sits at the top of the unit square (v = 1).
            let sx = ((u * iw) as u32).min(image.width() - 1);
            let sy = (((1.0 - v) * ih) as u32).min(image.height() - 1);
            let sample = image.get_pixel(sx, sy).0;
            let coverage = alpha * sample[3] as f32 / 255.0;
            blend(canvas.get_pixel_mut(px, py), [sample[0], sample[1], sample[2]], coverage);
        }
    }
}

/// Decode an image XObject to RGBA. `None` for encodings this rasterizer
/// does not handle.
fn decode_image(document: &PdfDocument, stream: &Stream) -> Option<RgbaImage> {
    let filters = stream.filters().unwrap_or_default();

    let mut rgba = if filters.iter().any(|f| *f == b"DCTDecode") {
        ImageProcessor::from_bytes(&stream.content)
            .ok()?
            .into_dynamic()
            .to_rgba8()
    } else if filters.iter().all(|f| *f == b"FlateDecode") {
        let samples = if filters.is_empty() {
            stream.content.clone()
        } else {
            stream.decompressed_content().ok()?
        };
        decode_samples(document, &stream.dict, &samples)?
    } else {
        return None;
    };

    if let Some(mask) = soft_mask(document, stream, rgba.width(), rgba.height()) {
        for (pixel, alpha) in rgba.pixels_mut().zip(mask) {
            pixel.0[3] = alpha;
        }
    }
    Some(rgba)
}

fn soft_mask(document: &PdfDocument, stream: &Stream, width: u32, height: u32) -> Option<Vec<u8>> {
    let id = stream.dict.get(b"SMask").ok()?.as_reference().ok()?;
    let mask = document.inner().get_object(id).ok()?.as_stream().ok()?;
    let samples = mask
        .decompressed_content()
        .unwrap_or_else(|_| mask.content.clone());
    let expected = (width as usize).checked_mul(height as usize)?;
    (samples.len() == expected).then_some(samples)
}

/// Raw 8-bit samples in a device colour space to RGBA.
fn decode_samples(document: &PdfDocument, dict: &Dictionary, samples: &[u8]) -> Option<RgbaImage> {
    let dimension = |key: &[u8]| -> Option<u32> {
        let value = number(document.resolve(dict.get(key).ok()?))?;
        (value >= 1.0 && value <= u32::MAX as f32).then_some(value as u32)
    };
    let width = dimension(b"Width")?;
    let height = dimension(b"Height")?;
    let bits = dict.get(b"BitsPerComponent").ok().and_then(number).unwrap_or(8.0);
    if bits != 8.0 {
        return None;
    }

    let channels = match document.resolve(dict.get(b"ColorSpace").ok()?) {
        Object::Name(name) => color_channels(name)?,
        Object::Array(items) => icc_channels(document, items)?,
        _ => return None,
    };
    // Declared sizes come straight from the file; the sample data must back
    // them before anything is allocated.
    let expected = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels)?;
    if samples.len() < expected {
        return None;
    }

    let mut image = RgbaImage::new(width, height);
    for (pixel, chunk) in image.pixels_mut().zip(samples.chunks_exact(channels)) {
        let components: Vec<f32> = chunk.iter().map(|&b| b as f32 / 255.0).collect();
        let [r, g, b] = device_color(&components)?;
        *pixel = Rgba([r, g, b, u8::MAX]);
    }
    Some(image)
}

fn color_channels(name: &[u8]) -> Option<usize> {
    match name {
        b"DeviceGray" | b"CalGray" => Some(1),
        b"DeviceRGB" | b"CalRGB" => Some(3),
        b"DeviceCMYK" => Some(4),
        _ => None,
    }
}

/// `[/ICCBased stream]` uses the stream's component count.
fn icc_channels(document: &PdfDocument, items: &[Object]) -> Option<usize> {
    let head = items.first()?.as_name().ok()?;
    if head != b"ICCBased" {
        return color_channels(head);
    }
    let profile = document.resolve(items.get(1)?).as_stream().ok()?;
    let n = number(profile.dict.get(b"N").ok()?)?;
    match n as usize {
        channels @ (1 | 3 | 4) => Some(channels),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::SaveOptions;
    use crate::pdf::document::{fixtures, real};
    use crate::watermark::composite;
    use lopdf::dictionary;
    use pdfcat_core::{Placement, WatermarkSpec};

    fn render(document: &PdfDocument, scale: f32) -> RgbaImage {
        let page = document.pages()[0];
        let viewport = Viewport::for_page(&page, scale);
        BasicRasterizer::new().render(document, &page, &viewport).unwrap()
    }

    #[test]
    fn blank_page_is_white() {
        let mut doc = PdfDocument::empty();
        doc.add_page(100.0, 50.0, vec![], Dictionary::new()).unwrap();
        let img = render(&doc, 1.0);
        assert_eq!(img.dimensions(), (100, 50));
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn filled_rectangle_uses_bottom_left_origin() {
        let mut doc = PdfDocument::empty();
        let ops = vec![
            Operation::new("rg", vec![real(1.0), real(0.0), real(0.0)]),
            Operation::new("re", vec![real(0.0), real(0.0), real(50.0), real(25.0)]),
            Operation::new("f", vec![]),
        ];
        doc.add_page(100.0, 100.0, ops, Dictionary::new()).unwrap();
        let img = render(&doc, 1.0);

        // Bottom-left quadrant is red, top-left stays white.
        assert_eq!(img.get_pixel(10, 90).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(10, 10).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(90, 90).0, [255, 255, 255, 255]);
    }

    #[test]
    fn graphics_state_stack_restores_colour() {
        let mut doc = PdfDocument::empty();
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("g", vec![real(0.0)]),
            Operation::new("Q", vec![]),
            Operation::new("re", vec![real(0.0), real(0.0), real(20.0), real(20.0)]),
            Operation::new("f", vec![]),
        ];
        doc.add_page(20.0, 20.0, ops, Dictionary::new()).unwrap();
        let img = render(&doc, 1.0);
        // Default fill is black either way; the rectangle must be painted.
        assert_eq!(img.get_pixel(10, 10).0, [0, 0, 0, 255]);
    }

    #[test]
    fn ext_gstate_alpha_blends_with_white() {
        let mut doc = PdfDocument::empty();
        let gs = doc.add_object(dictionary! { "Type" => "ExtGState", "ca" => real(0.5) });
        let resources = dictionary! { "ExtGState" => dictionary! { "Half" => gs } };
        let ops = vec![
            Operation::new("gs", vec![Object::Name(b"Half".to_vec())]),
            Operation::new("g", vec![real(0.0)]),
            Operation::new("re", vec![real(0.0), real(0.0), real(10.0), real(10.0)]),
            Operation::new("f", vec![]),
        ];
        doc.add_page(10.0, 10.0, ops, resources).unwrap();
        let img = render(&doc, 1.0);
        let [r, g, b, a] = img.get_pixel(5, 5).0;
        assert!((127..=128).contains(&r) && r == g && g == b);
        assert_eq!(a, 255);
    }

    #[tokio::test]
    async fn image_watermark_is_painted() {
        let doc = fixtures::shaded_document(1, 200.0, 100.0);
        let logo = image::RgbaImage::from_pixel(80, 40, Rgba([0, 0, 255, 255]));
        let bytes = ImageProcessor::from_dynamic(image::DynamicImage::ImageRgba8(logo))
            .to_png_bytes()
            .unwrap();
        let placement = Placement {
            opacity: 1.0,
            rotation_degrees: 0.0,
            ..Placement::default()
        };
        let doc = composite(doc, &WatermarkSpec::image(bytes, 100.0, placement))
            .await
            .unwrap();

        let img = render(&doc, 1.0);
        // Drawn 40x20 centred on (100, 50).
        assert_eq!(img.get_pixel(100, 50).0, [0, 0, 255, 255]);
        // Outside the logo the grey page fill shows.
        assert_eq!(img.get_pixel(10, 10).0, [204, 204, 204, 255]);
    }

    fn image_page(dict: Dictionary, content: Vec<u8>) -> PdfDocument {
        let mut doc = PdfDocument::empty();
        let image = doc.add_object(Stream::new(dict, content));
        let resources = dictionary! { "XObject" => dictionary! { "Im" => image } };
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![real(10.0), real(0.0), real(0.0), real(10.0), real(0.0), real(0.0)],
            ),
            Operation::new("Do", vec![Object::Name(b"Im".to_vec())]),
            Operation::new("Q", vec![]),
        ];
        doc.add_page(20.0, 20.0, ops, resources).unwrap();
        doc
    }

    fn render_result(document: &PdfDocument) -> Result<RgbaImage> {
        let page = document.pages()[0];
        let viewport = Viewport::for_page(&page, 1.0);
        BasicRasterizer::new().render(document, &page, &viewport)
    }

    #[tokio::test]
    async fn visible_text_fails_the_page() {
        let doc = fixtures::shaded_document(1, 200.0, 100.0);
        let placement = Placement {
            opacity: 1.0,
            ..Placement::default()
        };
        let doc = composite(doc, &WatermarkSpec::text("HELLO WORLD", 40.0, placement))
            .await
            .unwrap();

        let err = render_result(&doc).unwrap_err();
        assert!(matches!(err, PdfCatError::Render { page: 1, .. }), "got {err:?}");
    }

    #[test]
    fn invisible_text_is_allowed() {
        let mut doc = PdfDocument::empty();
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tr", vec![Object::Integer(3)]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), real(12.0)]),
            Operation::new(
                "Tj",
                vec![Object::String(b"ocr layer".to_vec(), lopdf::StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ];
        doc.add_page(50.0, 50.0, ops, Dictionary::new()).unwrap();
        let img = render(&doc, 1.0);
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn stroked_line_is_painted() {
        let mut doc = PdfDocument::empty();
        let ops = vec![
            Operation::new("RG", vec![real(0.0), real(0.0), real(1.0)]),
            Operation::new("w", vec![real(4.0)]),
            Operation::new("m", vec![real(10.0), real(50.0)]),
            Operation::new("l", vec![real(90.0), real(50.0)]),
            Operation::new("S", vec![]),
        ];
        doc.add_page(100.0, 100.0, ops, Dictionary::new()).unwrap();
        let img = render(&doc, 1.0);
        assert_eq!(img.get_pixel(50, 50).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(50, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn undecodable_image_fails_the_page() {
        let doc = image_page(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "JPXDecode",
            },
            b"not a jpeg 2000 codestream".to_vec(),
        );
        let err = render_result(&doc).unwrap_err();
        assert!(matches!(err, PdfCatError::Render { page: 1, .. }));
    }

    #[test]
    fn oversized_image_header_fails_without_allocating() {
        let doc = image_page(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 65536,
                "Height" => 65537,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0u8; 16],
        );
        let err = render_result(&doc).unwrap_err();
        assert!(matches!(err, PdfCatError::Render { page: 1, .. }));
    }

    #[tokio::test]
    async fn rotated_page_is_rendered_as_displayed() {
        let mut doc = PdfDocument::empty();
        let ops = vec![
            Operation::new("rg", vec![real(1.0), real(0.0), real(0.0)]),
            Operation::new("re", vec![real(0.0), real(0.0), real(50.0), real(25.0)]),
            Operation::new("f", vec![]),
        ];
        let page = doc.add_page(200.0, 100.0, ops, Dictionary::new()).unwrap();
        doc.inner_mut()
            .get_dictionary_mut(page.id)
            .unwrap()
            .set("Rotate", Object::Integer(90));
        let bytes = doc.save(&SaveOptions::default()).await.unwrap();
        let doc = PdfDocument::parse(&bytes).unwrap();

        let img = render(&doc, 1.0);
        assert_eq!(img.dimensions(), (100, 200));
        // The page's bottom-left corner is shown top-left after a clockwise turn.
        assert_eq!(img.get_pixel(10, 40).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(90, 190).0, [255, 255, 255, 255]);
    }

    #[test]
    fn device_colours_convert() {
        assert_eq!(device_color(&[1.0]), Some([255, 255, 255]));
        assert_eq!(device_color(&[0.0, 0.0, 0.0, 1.0]), Some([0, 0, 0]));
        assert_eq!(device_color(&[1.0, 0.0]), None);
    }
}
