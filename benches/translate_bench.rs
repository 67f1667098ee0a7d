//! Benchmarks for InfluxQL parsing and translation
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use influxql2promql::influxql::{parse_expr, parse_statement};
use influxql2promql::translator::{translate_condition, ConditionLimits, Translator};

const QUERIES: &[(&str, &str)] = &[
    ("bare_field", "SELECT free FROM disk"),
    (
        "tag_filter",
        r#"SELECT free FROM "disk" WHERE host = 'h1' AND path = '/opt'"#,
    ),
    (
        "grouped_mean",
        r#"SELECT mean("in") FROM "swap" WHERE host =~ /web-[0-9]+/ AND time > now() - 1h GROUP BY time(2d), host"#,
    ),
    (
        "nested_chain",
        r#"SELECT abs(mean("bps_recv")) FROM "vm_netio" WHERE project_domain != '' AND time > now() - 7d GROUP BY time(7d), "vm_name", "vm_id""#,
    ),
    (
        "union",
        "SELECT sum(free), mean(used), max(total) FROM disk WHERE host = 'a' GROUP BY time(5m)",
    ),
];

/// `a0 = 'v' OR a1 = 'v' OR ...`
fn or_condition(terms: usize) -> String {
    (0..terms)
        .map(|i| format!("a{} = 'v{}'", i, i))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for (name, query) in QUERIES {
        group.throughput(Throughput::Bytes(query.len() as u64));
        group.bench_function(*name, |b| {
            b.iter(|| parse_statement(black_box(query)).unwrap())
        });
    }

    group.finish();
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");
    let translator = Translator::default();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for (name, query) in QUERIES {
        let stmt = parse_statement(query).unwrap();

        group.bench_function(format!("{}_ast", name), |b| {
            b.iter(|| translator.translate_at(black_box(&stmt), now).unwrap())
        });

        group.bench_function(format!("{}_text", name), |b| {
            b.iter(|| translator.translate_str_at(black_box(query), now).unwrap())
        });
    }

    group.finish();
}

fn bench_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditions");
    let limits = ConditionLimits::default();

    for terms in [1, 8, 32] {
        let cond = parse_expr(&or_condition(terms)).unwrap();

        group.throughput(Throughput::Elements(terms as u64));
        group.bench_function(format!("or_{}", terms), |b| {
            b.iter(|| translate_condition(Some(black_box(&cond)), &limits).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_translate, bench_conditions);
criterion_main!(benches);
