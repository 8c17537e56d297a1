use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use traitlens::explain::extract_references;
use traitlens::population::ensure_population;
use traitlens::provision::provision_limits;
use traitlens::storage::InMemoryHierarchyStore;
use traitlens::{
    evaluate_flat, evaluate_template, HierarchyStore, MonitorConfig, TemplateId, TemplateParent,
    TemplateRole, ValueGenerator,
};

fn make_population(count: usize) -> (InMemoryHierarchyStore, TemplateId) {
    let store = InMemoryHierarchyStore::new();
    let t = store
        .add_entity_template("Temperature_Simple", TemplateRole::Asset)
        .unwrap();
    for name in ["Temperature", "Humidity"] {
        store
            .add_attribute_template(TemplateParent::Entity(t.id), name)
            .unwrap();
    }
    provision_limits(&store, "Temperature_Simple|Temperature", 0.0, 90.0).unwrap();
    store.commit().unwrap();
    ensure_population(&store, "Temperature_Simple", count, &ValueGenerator::new(42)).unwrap();
    (store, t.id)
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for count in [100usize, 1_000, 5_000] {
        let (store, template) = make_population(count);
        let config = MonitorConfig::default()
            .with_flat_page_size(count)
            .with_template_page_size(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("template", count), &count, |b, _| {
            b.iter(|| evaluate_template(&store, template, "Temperature", &config).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("flat", count), &count, |b, _| {
            b.iter(|| evaluate_flat(&store, &config).unwrap());
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let expression = "Trigger if 'Temperature' > 'LimitHi' and 'Humidity' < 'LimitLo' or 'Pressure' > 3";
    c.bench_function("explain/extract_references", |b| {
        b.iter(|| extract_references(std::hint::black_box(expression)));
    });
}

criterion_group!(benches, bench_strategies, bench_extract);
criterion_main!(benches);
