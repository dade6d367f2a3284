//! Uncontended coordinator latency: how much the admission protocol costs
//! when no thread ever has to wait.

use criterion::{criterion_group, criterion_main, Criterion};

use relocator_rs::{ComponentId, DeviceId, StorageSystem, SystemConfig, TransferFn};

fn dev(raw: u64) -> DeviceId {
    DeviceId::from_raw(raw)
}

fn comp(raw: u64) -> ComponentId {
    ComponentId::from_raw(raw)
}

fn bench_add_remove(c: &mut Criterion) {
    let system = StorageSystem::new(
        SystemConfig::new()
            .with_device(dev(1), 4)
            .with_component(comp(1), dev(1)),
    )
    .unwrap();

    c.bench_function("uncontended_add_remove", |b| {
        b.iter(|| {
            system
                .execute(&TransferFn::add(comp(2), dev(1), || {}, || {}))
                .unwrap();
            system
                .execute(&TransferFn::remove(comp(2), dev(1), || {}, || {}))
                .unwrap();
        });
    });
}

fn bench_move_bounce(c: &mut Criterion) {
    let system = StorageSystem::new(
        SystemConfig::new()
            .with_device(dev(1), 1)
            .with_device(dev(2), 1)
            .with_component(comp(1), dev(1)),
    )
    .unwrap();

    c.bench_function("uncontended_move_bounce", |b| {
        b.iter(|| {
            system
                .execute(&TransferFn::relocate(comp(1), dev(1), dev(2), || {}, || {}))
                .unwrap();
            system
                .execute(&TransferFn::relocate(comp(1), dev(2), dev(1), || {}, || {}))
                .unwrap();
        });
    });
}

criterion_group!(benches, bench_add_remove, bench_move_bounce);
criterion_main!(benches);
