//! Cell normalization benchmarks
//!
//! Once pages are in memory the per-cell normalization work dominates a
//! scrape pass, so the hot paths here are the ones worth watching.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use enquiry_sync::domain::ColumnSpec;
use enquiry_sync::infrastructure::normalizer::{
    derive_filtered, extract_link, split_composite, strip_trailing_break,
};

const VEHICLE: &str = "SLR8126K<br>Toyota Corolla Altis 1.6A<br>2019<br>73,000 km<br>Singapore";
const ACTION: &str = r#"<a href="tel:+6591234567">Call</a> <a href="/enquiry/48213">View</a>"#;
const ORIGIN: &str = "https://www.motorist.sg";

fn columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::stripped("Seller"),
        ColumnSpec::composite(
            "Vehicle",
            &["Plate", "Model", "Manufacturing_date", "Details", "Country"],
        ),
        ColumnSpec::first_line("Agent"),
        ColumnSpec::text("Created Date"),
        ColumnSpec::link("Link"),
    ]
}

fn cells() -> Vec<String> {
    vec![
        "Lim Bee Hoon<br>".to_string(),
        VEHICLE.to_string(),
        "Alice Tan\nSenior Agent".to_string(),
        "01/08/2026".to_string(),
        ACTION.to_string(),
    ]
}

fn normalizer_benches(c: &mut Criterion) {
    c.bench_function("split_composite vehicle cell", |b| {
        b.iter(|| split_composite(black_box(VEHICLE), black_box(5)))
    });

    c.bench_function("extract_link action cell", |b| {
        b.iter(|| extract_link(black_box(ACTION), black_box(ORIGIN)))
    });

    c.bench_function("strip_trailing_break seller cell", |b| {
        b.iter(|| strip_trailing_break(black_box("Lim Bee Hoon<br>")))
    });

    c.bench_function("derive_filtered full record", |b| {
        let columns = columns();
        let cells = cells();
        b.iter(|| derive_filtered(black_box(&cells), black_box(&columns), black_box(ORIGIN)))
    });
}

criterion_group!(benches, normalizer_benches);
criterion_main!(benches);
