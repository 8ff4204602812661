#[macro_use]
extern crate criterion;
extern crate mandelmp;

use criterion::Criterion;
use mandelmp::kernel::Kernel;
use mandelmp::{
    render, DomainBounds, JobConfig, Partitioner, RemainderPolicy, Scheme, TransportKind,
};

fn tile_kernel(c: &mut Criterion) {
    let p = Partitioner::new(
        1,
        64,
        DomainBounds::default(),
        Scheme::Contiguous,
        RemainderPolicy::Spread,
    )
    .unwrap();
    let rows = p.partition(0).rows;
    let kernel = Kernel::new(256, 100, 1).unwrap();
    c.bench_function("tile 256x64", move |b| b.iter(|| kernel.render_rows(&rows).unwrap()));
}

fn job(transport: TransportKind) -> JobConfig {
    JobConfig {
        width: 256,
        height: 192,
        workers: 4,
        threads: 1,
        transport,
        ..JobConfig::default()
    }
}

fn transports(c: &mut Criterion) {
    c.bench_function("gather 256x192 P=4", |b| {
        b.iter(|| render(&job(TransportKind::Gather)).unwrap())
    });
    c.bench_function("p2p 256x192 P=4", |b| {
        b.iter(|| render(&job(TransportKind::PointToPoint)).unwrap())
    });
    c.bench_function("pack 256x192 P=4", |b| {
        b.iter(|| render(&job(TransportKind::PackUnpack)).unwrap())
    });
}

criterion_group!(benches, tile_kernel, transports);
criterion_main!(benches);
