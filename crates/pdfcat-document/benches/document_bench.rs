// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the pdfcat-document crate: placement resolution,
// text watermark compositing, and page rasterization on small synthetic
// documents.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lopdf::Dictionary;
use lopdf::content::Operation;

use pdfcat_core::{CompressionSpec, CompressionStrategy, Placement, WatermarkSpec};
use pdfcat_document::{Compressor, PdfDocument, composite, geometry};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A document of `pages` US Letter pages, each with a few filled rectangles.
fn sample_document(pages: usize) -> PdfDocument {
    let mut doc = PdfDocument::empty();
    for _ in 0..pages {
        let mut ops = Vec::new();
        for row in 0..8 {
            let y = 60.0 + row as f32 * 80.0;
            let shade = row as f32 / 8.0;
            ops.push(Operation::new("rg", vec![0.2f32.into(), 0.3f32.into(), shade.into()]));
            ops.push(Operation::new("re", vec![50f32.into(), y.into(), 500f32.into(), 40f32.into()]));
            ops.push(Operation::new("f", vec![]));
        }
        doc.add_page(612.0, 792.0, ops, Dictionary::new())
            .expect("fixture page");
    }
    doc
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("current-thread runtime")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_resolve(c: &mut Criterion) {
    c.bench_function("geometry::resolve (A4)", |b| {
        b.iter(|| geometry::resolve(black_box(595.0), black_box(842.0), 37.5, 62.5));
    });
}

/// Text watermark on a 20-page document, including the clone the caller
/// would take to keep the original.
fn bench_text_composite(c: &mut Criterion) {
    let rt = runtime();
    let doc = sample_document(20);
    let spec = WatermarkSpec::text("CONFIDENTIAL", 80.0, Placement::default());

    c.bench_function("composite text (20 pages)", |b| {
        b.iter(|| {
            let out = rt.block_on(composite(doc.clone(), &spec)).expect("composite");
            black_box(out.page_count());
        });
    });
}

/// Rasterizing compression of a 2-page document at half scale.
fn bench_rasterize(c: &mut Criterion) {
    let rt = runtime();
    let doc = sample_document(2);
    let compressor = Compressor::default();
    let strategy = CompressionStrategy::Rasterize(CompressionSpec::default());

    c.bench_function("compress rasterize (2 pages, 0.5x)", |b| {
        b.iter(|| {
            let out = rt
                .block_on(compressor.compress(&doc, &strategy, |_| {}))
                .expect("compress");
            black_box(out.bytes.len());
        });
    });
}

criterion_group!(benches, bench_resolve, bench_text_composite, bench_rasterize);
criterion_main!(benches);
