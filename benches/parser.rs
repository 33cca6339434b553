use cluefin_xbrl::{extract_financial_statements, parse_xbrl_directory, ParseOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[path = "../tests/common/mod.rs"]
mod common;

fn segmented_report(segments: usize) -> common::Filing {
    let mut builder = common::annual_report();
    for i in 0..segments {
        let id = format!("CFY2023eFY_Segment{i}");
        builder = builder
            .dimensional_instant(&id, "2023-12-31", &[("SegmentsAxis", "ReportableSegmentsMember")])
            .money("Assets", &id, &(i * 10).to_string())
            .money("Liabilities", &id, &(i * 4).to_string());
    }
    builder.write()
}

fn parse_filing(c: &mut Criterion) {
    let filing = common::annual_report().write();
    c.bench_function("parse_annual_report", |b| {
        b.iter(|| parse_xbrl_directory(black_box(filing.dir())));
    });

    let large = segmented_report(2_000);
    c.bench_function("parse_segmented_report", |b| {
        b.iter(|| parse_xbrl_directory(black_box(large.dir())));
    });
}

fn project_statements(c: &mut Criterion) {
    let large = segmented_report(2_000);
    let plain = parse_xbrl_directory(large.dir()).unwrap();
    c.bench_function("project_statements", |b| {
        b.iter(|| extract_financial_statements(black_box(&plain)));
    });

    let options = ParseOptions::default().with_dimensional_rows(true);
    let dimensional = cluefin_xbrl::parse_xbrl_directory_with(large.dir(), &options).unwrap();
    c.bench_function("project_statements_dimensional", |b| {
        b.iter(|| extract_financial_statements(black_box(&dimensional)));
    });
}

criterion_group!(benches, parse_filing, project_statements);
criterion_main!(benches);
