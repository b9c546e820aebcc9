//! Basic usage examples for ObjectPooler

use std::sync::Arc;
use std::time::Duration;

use esox_leasepool::{
    Color3, Kind, ManualScheduler, MemoryHost, NodeClass, ObjectPooler, PoolConfiguration,
    PoolKey, PropertyValue, RestorationSchema,
};

fn main() {
    println!("=== esox_leasepool - Basic Examples ===\n");

    // Example 1: lease, mutate, release
    lease_and_release();

    // Example 2: delayed release and supersession
    delayed_release();

    // Example 3: descendants are restored too
    descendant_restore();

    // Example 4: metrics and health
    metrics_and_health();
}

fn setup() -> (Arc<MemoryHost>, Arc<ManualScheduler>, ObjectPooler<MemoryHost>) {
    let host = Arc::new(MemoryHost::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let schema = RestorationSchema::builder()
        .kind(Kind::BasePrimitive, ["Transparency", "Color"])
        .kind(Kind::Class("PointLight".into()), ["Brightness"])
        .build();
    let pooler = ObjectPooler::new(
        Arc::clone(&host),
        scheduler.clone(),
        schema,
        PoolConfiguration::default(),
    );
    (host, scheduler, pooler)
}

fn lamp(host: &MemoryHost) -> esox_leasepool::NodeId {
    let lamp = host.create(
        NodeClass::primitive("Part"),
        [
            ("Transparency", PropertyValue::Number(0.0)),
            ("Color", Color3::new(1.0, 1.0, 1.0).into()),
        ],
    );
    let light = host.create(
        NodeClass::named("PointLight"),
        [("Brightness", PropertyValue::Number(1.0))],
    );
    host.attach(lamp, light);
    lamp
}

fn lease_and_release() {
    println!("1. Lease and release:");
    let (host, _scheduler, pooler) = setup();
    pooler.register_alias("Lamp", lamp(&host)).unwrap();
    let key = PoolKey::named("Lamp");

    let entry = pooler.get_object(&key).unwrap().unwrap();
    host.unpark(*entry.instance());
    host.set(*entry.instance(), "Transparency", 0.8);
    println!(
        "   Leased entry {} -> {:?}",
        entry.id(),
        host.property(*entry.instance(), "Transparency")
    );

    entry.release().unwrap();
    println!("   Released -> {:?}", host.property(*entry.instance(), "Transparency"));

    let again = pooler.get_object(&key).unwrap().unwrap();
    println!("   Next lease reuses entry {}\n", again.id());
}

fn delayed_release() {
    println!("2. Delayed release:");
    let (host, scheduler, pooler) = setup();
    let key = PoolKey::Direct(lamp(&host));

    let entry = pooler.get_object(&key).unwrap().unwrap();
    entry.release_after(Duration::from_secs(10));
    entry.release_after(Duration::from_secs(2));

    scheduler.advance(Duration::from_secs(2));
    println!("   Available after 2s: {}", entry.is_available());

    scheduler.advance(Duration::from_secs(8));
    println!("   Stale releases ignored: {}\n", pooler.get_metrics().stale_releases);
}

fn descendant_restore() {
    println!("3. Descendant restore:");
    let (host, _scheduler, pooler) = setup();
    let key = PoolKey::Direct(lamp(&host));

    let entry = pooler.get_object(&key).unwrap().unwrap();
    let light = host.children(*entry.instance())[0];
    host.set(light, "Brightness", 5.0);
    println!("   Light brightness while leased: {:?}", host.property(light, "Brightness"));

    entry.release().unwrap();
    println!("   After release: {:?}\n", host.property(light, "Brightness"));
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let (host, _scheduler, pooler) = setup();
    let key = PoolKey::Direct(lamp(&host));

    let _first = pooler.get_object(&key).unwrap();
    let _second = pooler.get_object(&key).unwrap();

    let health = pooler.get_health_status(&key);
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Utilization: {:.1}%", health.utilization * 100.0);
    for warning in &health.warnings {
        println!("   Warning: {warning}");
    }

    let metrics = pooler.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
