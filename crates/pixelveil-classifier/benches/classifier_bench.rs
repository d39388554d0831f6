// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the text classifier: single-span latency on each
// tier and batch throughput.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pixelveil_classifier::{ClassifierSettings, TextClassifier};
use pixelveil_core::{DetectedTextRegion, Rect01};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Latency of a regex hit (early exit) versus a full miss that walks every
/// pattern and lands on the fallback.
fn bench_classify_single(c: &mut Criterion) {
    let classifier =
        TextClassifier::new(ClassifierSettings::default()).expect("patterns compile");

    let mut group = c.benchmark_group("classify_single");
    for (label, text) in [
        ("national_id_hit", "S1234567A"),
        ("email_hit", "john.doe@example.com"),
        ("miss", "Fresh bread baked daily in store"),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| black_box(classifier.classify(black_box(text))));
        });
    }
    group.finish();
}

/// Throughput for a receipt-sized batch of 500 spans.
fn bench_classify_batch(c: &mut Criterion) {
    let classifier =
        TextClassifier::new(ClassifierSettings::default()).expect("patterns compile");
    let samples = [
        "TOTAL 12.50",
        "Card 4111 1111 1111 1111",
        "Thank you for shopping",
        "Tel +65 9123 4567",
        "Cashier: 04",
    ];
    let regions: Vec<DetectedTextRegion> = samples
        .iter()
        .cycle()
        .take(500)
        .map(|t| DetectedTextRegion {
            text: (*t).to_string(),
            normalized_box: Rect01::new(0.1, 0.1, 0.5, 0.05),
            confidence: 0.9,
        })
        .collect();

    c.bench_function("classify_batch (500 spans)", |b| {
        b.iter(|| black_box(classifier.classify_batch(black_box(&regions))));
    });
}

criterion_group!(benches, bench_classify_single, bench_classify_batch);
criterion_main!(benches);
