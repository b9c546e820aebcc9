use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use esox_leasepool::{
    CapacityPolicy, Kind, ManualScheduler, MemoryHost, NodeClass, ObjectPooler, PoolConfiguration,
    PoolKey, PropertyValue, RestorationSchema,
};

fn pooler(policy: CapacityPolicy) -> (ObjectPooler<MemoryHost>, PoolKey<esox_leasepool::NodeId>) {
    let host = Arc::new(MemoryHost::new());
    let root = host.create(
        NodeClass::primitive("Part"),
        [("Transparency", PropertyValue::Number(0.0))],
    );
    for _ in 0..8 {
        let child = host.create(
            NodeClass::primitive("Part"),
            [("Transparency", PropertyValue::Number(0.25))],
        );
        host.attach(root, child);
    }

    let schema = RestorationSchema::builder()
        .kind(Kind::BasePrimitive, ["Transparency"])
        .build();
    let pooler = ObjectPooler::new(
        host,
        Arc::new(ManualScheduler::new()),
        schema,
        PoolConfiguration::default().with_capacity_policy(policy),
    );
    (pooler, PoolKey::Direct(root))
}

fn acquire_release(c: &mut Criterion) {
    let (pooler, key) = pooler(CapacityPolicy::Fixed);
    pooler.create_pool(&key, 64).unwrap();

    c.bench_function("acquire_release_warm", |b| {
        b.iter(|| {
            let entry = pooler.get_object(&key).unwrap().unwrap();
            entry.release().unwrap();
            black_box(entry);
        });
    });
}

fn scan_past_leased(c: &mut Criterion) {
    let (pooler, key) = pooler(CapacityPolicy::Fixed);
    pooler.create_pool(&key, 64).unwrap();
    let held: Vec<_> = (0..63).map(|_| pooler.get_object(&key).unwrap().unwrap()).collect();

    c.bench_function("acquire_last_of_64", |b| {
        b.iter(|| {
            let entry = pooler.get_object(&key).unwrap().unwrap();
            entry.release().unwrap();
            black_box(entry);
        });
    });

    drop(held);
}

criterion_group!(benches, acquire_release, scan_past_leased);
criterion_main!(benches);
