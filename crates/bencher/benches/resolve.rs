use bencher::{sample_router, test_cases};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

fn benchmark_resolve(criterion: &mut Criterion) {
    let router = sample_router().expect("sample routes should register");
    let mut group = criterion.benchmark_group("resolve");

    for case in test_cases() {
        group.bench_with_input(BenchmarkId::new(format!("{:?}", case.group()), case.name()), &case, |b, case| {
            b.iter(|| black_box(router.resolve(case.method(), case.path())));
        });
    }

    group.finish();
}

fn benchmark_dispatch(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("tokio runtime");
    let router = sample_router().expect("sample routes should register");
    let mut group = criterion.benchmark_group("dispatch");

    for case in test_cases() {
        group.bench_with_input(BenchmarkId::new(format!("{:?}", case.group()), case.name()), &case, |b, case| {
            b.to_async(&runtime).iter(|| async {
                let response = router.handle(case.request()).await.expect("dispatch should not fail");
                black_box(response.status())
            });
        });
    }

    group.finish();
}

criterion_group!(routing, benchmark_resolve, benchmark_dispatch);
criterion_main!(routing);
