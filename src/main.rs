// esox_leasepool demo binary
// Run the demos with: cargo run --example basic

use std::sync::Arc;
use std::time::Duration;

use esox_leasepool::{
    MemoryHost, NodeClass, ObjectPooler, PoolConfiguration, PoolKey, PoolResult, PropertyValue,
    RestorationSchema, TokioScheduler,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== esox_leasepool ===");
    println!("See demos/ for more, e.g. cargo run --example basic");
    println!();

    let host = Arc::new(MemoryHost::new());
    let barrel = host.create(
        NodeClass::primitive("Part"),
        [
            ("Transparency", PropertyValue::Number(0.0)),
            ("Anchored", PropertyValue::Bool(true)),
        ],
    );

    let pooler = ObjectPooler::new(
        Arc::clone(&host),
        Arc::new(TokioScheduler::new()),
        RestorationSchema::visual_defaults(),
        PoolConfiguration::default().with_lenient_properties(),
    );
    pooler.register_alias("Barrel", barrel)?;
    let key = PoolKey::named("Barrel");

    let entry = pooler.get_object_async(&key).await?;
    host.set(*entry.instance(), "Transparency", 0.7);
    println!(
        "  Leased {:?}, transparency now {:?}",
        entry.instance(),
        host.property(*entry.instance(), "Transparency")
    );

    entry.release_after(Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("  After delayed release: {:?}", host.property(*entry.instance(), "Transparency"));
    println!("  Available again: {}", entry.is_available());

    Ok(())
}
