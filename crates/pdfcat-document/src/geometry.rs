// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry resolver — maps percentage placement onto absolute page coordinates
// and builds the affine transforms used by the compositor and rasterizer.

use pdfcat_core::Placement;

/// Baseline multiplier for image watermarks: `scale_percent = 100` draws the
/// image at half its natural pixel size.
pub const IMAGE_BASE_SCALE: f32 = 0.5;

/// Map a percentage position onto a page.
///
/// `x = h / 100 * width`, `y = v / 100 * height`, in the page's own units
/// with the origin at the bottom-left.
pub fn resolve(
    page_width: f32,
    page_height: f32,
    horizontal_percent: f32,
    vertical_percent: f32,
) -> (f32, f32) {
    (
        horizontal_percent / 100.0 * page_width,
        vertical_percent / 100.0 * page_height,
    )
}

/// Wrap an angle into [0, 360).
pub fn normalize_rotation(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Rendered size of an image watermark from its natural pixel size.
pub fn image_draw_size(natural_width: u32, natural_height: u32, scale_percent: f32) -> (f32, f32) {
    let factor = IMAGE_BASE_SCALE * (scale_percent / 100.0);
    (natural_width as f32 * factor, natural_height as f32 * factor)
}

/// How the drawn object hangs off the resolved point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// The point is the text baseline origin; no centring.
    Baseline,
    /// The point is the centre of a box of the given rendered size.
    Centered { width: f32, height: f32 },
}

/// Where and at what angle an object is drawn on one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawOrigin {
    pub x: f32,
    pub y: f32,
    /// Counter-clockwise degrees in [0, 360), applied about (x, y).
    pub rotation_degrees: f32,
}

impl DrawOrigin {
    /// Translate to the origin, then rotate about it.
    pub fn matrix(&self) -> Matrix {
        Matrix::rotation(self.rotation_degrees).concat(Matrix::translation(self.x, self.y))
    }
}

/// Resolve a placement on a page of the given size.
pub fn locate(page_width: f32, page_height: f32, placement: &Placement, anchor: Anchor) -> DrawOrigin {
    let (x, y) = resolve(
        page_width,
        page_height,
        placement.horizontal_percent,
        placement.vertical_percent,
    );
    let (x, y) = match anchor {
        Anchor::Baseline => (x, y),
        Anchor::Centered { width, height } => (x - width / 2.0, y - height / 2.0),
    };
    DrawOrigin {
        x,
        y,
        rotation_degrees: normalize_rotation(placement.rotation_degrees),
    }
}

/// A PDF affine matrix `[a b c d e f]` (row-vector convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation about the origin.
    pub fn rotation(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self` applied first, then `rhs`.
    pub fn concat(self, rhs: Self) -> Self {
        Self {
            a: self.a * rhs.a + self.b * rhs.c,
            b: self.a * rhs.b + self.b * rhs.d,
            c: self.c * rhs.a + self.d * rhs.c,
            d: self.c * rhs.b + self.d * rhs.d,
            e: self.e * rhs.a + self.f * rhs.c + rhs.e,
            f: self.e * rhs.b + self.f * rhs.d + rhs.f,
        }
    }

    pub fn transform_point(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// `None` for degenerate (zero-area) transforms.
    pub fn invert(self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Self {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }

    pub fn to_array(self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}
