//! Path template matching benchmarks.
//!
//! Run with: cargo bench -p portcullis-router

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use portcullis_router::{RouteEntry, Router};

/// Generate a set of path templates shaped like a typical CRUD API.
fn generate_templates(count: usize) -> Vec<(String, &'static str)> {
    let resources = ["pets", "owners", "stores", "orders", "vets", "visits"];
    let methods = ["GET", "POST", "PUT", "DELETE"];

    let mut templates = Vec::new();

    for resource in &resources {
        templates.push((format!("/{}", resource), "GET"));
        templates.push((format!("/{}", resource), "POST"));
        templates.push((format!("/{}/{{id}}", resource), "GET"));
        templates.push((format!("/{}/{{id}}", resource), "PUT"));
        templates.push((format!("/{}/{{id}}", resource), "DELETE"));
    }

    templates.push(("/owners/{ownerId}/pets".to_string(), "GET"));
    templates.push(("/owners/{ownerId}/pets/{petId}".to_string(), "GET"));
    templates.push(("/pets/{petId}/visits/{visitId}".to_string(), "GET"));

    while templates.len() < count {
        let i = templates.len();
        let resource = resources[i % resources.len()];
        let method = methods[i % methods.len()];
        templates.push((format!("/v{}/{}/{{id}}", i / 10, resource), method));
    }

    templates.truncate(count);
    templates
}

fn build_router(templates: &[(String, &str)]) -> Router {
    let mut router = Router::new();
    for (i, (path, method)) in templates.iter().enumerate() {
        router.insert(path, method, RouteEntry::new(i, path));
    }
    router
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_lookup");

    for count in [10, 100, 1000] {
        let router = build_router(&generate_templates(count));

        group.bench_with_input(BenchmarkId::new("static", count), &router, |b, router| {
            b.iter(|| black_box(router.lookup("/pets", "GET")));
        });

        group.bench_with_input(BenchmarkId::new("nested_params", count), &router, |b, router| {
            b.iter(|| black_box(router.lookup("/owners/12/pets/34", "GET")));
        });

        group.bench_with_input(BenchmarkId::new("encoded_param", count), &router, |b, router| {
            b.iter(|| black_box(router.lookup("/pets/caf%C3%A9", "GET")));
        });

        group.bench_with_input(BenchmarkId::new("not_found", count), &router, |b, router| {
            b.iter(|| black_box(router.lookup("/no/such/path", "GET")));
        });
    }

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_build");

    for count in [10, 100, 500] {
        let templates = generate_templates(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &templates, |b, t| {
            b.iter(|| black_box(build_router(t)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_build);
criterion_main!(benches);
