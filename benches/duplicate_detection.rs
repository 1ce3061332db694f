use casegrid::common::ManualClock;
use casegrid::integrity::rules;
use casegrid::integrity::similarity::{levenshtein, text_similarity};
use casegrid::record::TableSnapshot;
use casegrid::storage::InMemoryBackend;
use casegrid::{CaseEngine, CellValue, EngineConfig, FieldName, SchemaMapper, TableId};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

const SUBJECTS: [&str; 5] = [
    "Password reset fails",
    "Refund not received",
    "Cannot log in on mobile",
    "Invoice shows wrong total",
    "Delivery is late again",
];

/// Seed `per_table` cases in each messaging table; a handful of customers
/// reuse addresses so blocking buckets are non-trivial.
fn seeded_snapshots(per_table: usize) -> Vec<TableSnapshot> {
    let mapper = SchemaMapper::standard().expect("standard schema");
    let backend = Arc::new(InMemoryBackend::with_tables(mapper.tables().cloned()));
    let config = EngineConfig::default()
        .with_inter_chunk_delay(Duration::ZERO)
        .with_rate_window(usize::MAX, Duration::from_secs(1))
        .with_sweep_interval(None);
    let engine = CaseEngine::with_mapper(backend, mapper, config, Arc::new(ManualClock::new()))
        .expect("build engine");
    engine.initialize_tables().expect("initialize tables");

    let tables = ["Email Cases", "Web Form Cases", "Chat Cases", "Social Cases"];
    for (t, table) in tables.iter().enumerate() {
        let table = TableId::new(*table);
        for i in 0..per_table {
            let mut fields = BTreeMap::new();
            fields.insert(
                FieldName::CustomerEmail,
                CellValue::from(format!("customer{}@example.com", i % 40)),
            );
            fields.insert(
                FieldName::Subject,
                CellValue::from(SUBJECTS[(i + t) % SUBJECTS.len()]),
            );
            engine.create_record(&table, fields).expect("seed case");
        }
    }

    engine
        .mapper()
        .tables()
        .map(|table| engine.scan_table(table).expect("scan"))
        .collect()
}

fn bench_duplicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrity/duplicates");
    for per_table in [50usize, 200] {
        let snapshots = seeded_snapshots(per_table);
        group.bench_with_input(
            BenchmarkId::new("uncapped", per_table * 4),
            &snapshots,
            |b, snapshots| {
                b.iter(|| {
                    let scan = rules::duplicates(black_box(snapshots), 0.85, usize::MAX);
                    black_box(scan.comparisons);
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("capped_1000", per_table * 4),
            &snapshots,
            |b, snapshots| {
                b.iter(|| {
                    let scan = rules::duplicates(black_box(snapshots), 0.85, 1_000);
                    black_box(scan.truncated);
                });
            },
        );
    }
    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    c.bench_function("similarity/levenshtein_20", |b| {
        b.iter(|| levenshtein(black_box("Password reset fails"), black_box("Password reset fail!")));
    });
    c.bench_function("similarity/text_80", |b| {
        let a = "Customer reports the checkout page freezes after entering a discount code twice";
        let z = "Customer reported the checkout page froze after entering the discount code twice";
        b.iter(|| text_similarity(black_box(a), black_box(z)));
    });
}

criterion_group!(benches, bench_duplicates, bench_similarity);
criterion_main!(benches);
