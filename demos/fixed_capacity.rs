//! Fixed-capacity pool with pre-warming and waiting on the tokio timer

use std::sync::Arc;
use std::time::Duration;

use esox_leasepool::{
    CapacityPolicy, MemoryHost, NodeClass, ObjectPooler, PoolConfiguration, PoolKey, PoolResult,
    PropertyValue, RestorationSchema, TokioScheduler,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> PoolResult<()> {
    println!("=== esox_leasepool - Fixed Capacity ===\n");

    let host = Arc::new(MemoryHost::new());
    let projectile = host.create(
        NodeClass::primitive("Part"),
        [("Transparency", PropertyValue::Number(0.0))],
    );

    let pooler = ObjectPooler::new(
        Arc::clone(&host),
        Arc::new(TokioScheduler::new().with_tick(Duration::from_millis(5))),
        RestorationSchema::visual_defaults(),
        PoolConfiguration::default()
            .with_capacity_policy(CapacityPolicy::Fixed)
            .with_lenient_properties(),
    );
    pooler.register_alias("Projectile", projectile)?;
    let key = PoolKey::named("Projectile");

    let created = pooler.create_pool(&key, 2)?;
    println!("Pre-warmed {created} entries");

    let first = pooler.get_object_async(&key).await?;
    let second = pooler.get_object_async(&key).await?;
    println!("Leased entries {} and {}", first.id(), second.id());
    println!("Third try without waiting: {:?}", pooler.get_object(&key)?.map(|e| e.id()));

    first.release_after(Duration::from_millis(40));
    let started = tokio::time::Instant::now();
    let third = pooler.get_object_async(&key).await?;
    println!(
        "Waited {:?} for entry {} to come back",
        started.elapsed(),
        third.id()
    );

    let metrics = pooler.get_metrics();
    println!("Wait ticks: {}, exhausted events: {}", metrics.wait_ticks, metrics.exhausted_events);

    let destroyed = pooler.clear_pool(&key)?;
    println!("Cleared pool, destroyed {destroyed} instances");

    Ok(())
}
