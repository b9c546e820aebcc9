//! Capabilities the pool consumes from its environment

use std::fmt::Debug;
use std::hash::Hash;

use crate::errors::HostError;
use crate::schema::NodeClass;
use crate::value::PropertyValue;

/// The environment that owns prototypes and instances.
///
/// A host manufactures instances from prototypes, hides ("parks") idle ones,
/// destroys them, and gives the snapshot recorder read/write access to their
/// properties. Handles are cheap to clone; the host owns the objects behind
/// them.
pub trait Host: Send + Sync + 'static {
    /// Template that new instances are cloned from
    type Prototype: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// A manufactured instance or one of its descendants
    type Instance: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Produce an independent copy of `prototype`, including whatever
    /// placement side effect hides it until a caller uses it.
    fn manufacture(&self, prototype: &Self::Prototype) -> Result<Self::Instance, HostError>;

    /// Undo any placement a leaseholder applied and hide the instance again
    fn park(&self, instance: &Self::Instance) -> Result<(), HostError>;

    /// Release everything held by a manufactured instance
    fn destroy(&self, instance: &Self::Instance) -> Result<(), HostError>;

    fn class_of(&self, node: &Self::Instance) -> Result<NodeClass, HostError>;

    /// Read a property. `Ok(None)` means the node has no such property.
    fn get_property(
        &self,
        node: &Self::Instance,
        name: &str,
    ) -> Result<Option<PropertyValue>, HostError>;

    fn set_property(
        &self,
        node: &Self::Instance,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), HostError>;

    /// Every node below `node` in the ownership tree, in a stable order
    fn descendants_of(&self, node: &Self::Instance) -> Result<Vec<Self::Instance>, HostError>;

    /// Whether `node` is still somewhere below `ancestor`
    fn contains(&self, ancestor: &Self::Instance, node: &Self::Instance) -> Result<bool, HostError>;
}

/// An ephemeral connection a leaseholder creates while it holds an entry.
///
/// The entry disconnects all of them when it is released.
pub trait Subscription: Send + 'static {
    fn disconnect(self: Box<Self>);
}

impl<F> Subscription for F
where
    F: FnOnce() + Send + 'static,
{
    fn disconnect(self: Box<Self>) {
        (*self)();
    }
}

/// Tasks listening on behalf of a leaseholder are aborted on release.
impl<T: Send + 'static> Subscription for tokio::task::JoinHandle<T> {
    fn disconnect(self: Box<Self>) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn closure_subscription_runs_on_disconnect() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let subscription: Box<dyn Subscription> =
            Box::new(move || flag.store(true, Ordering::SeqCst));

        subscription.disconnect();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn join_handle_subscription_aborts_task() {
        let held = Arc::new(());
        let task_copy = Arc::clone(&held);
        let handle = tokio::spawn(async move {
            let _held = task_copy;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        assert_eq!(Arc::strong_count(&held), 2);

        let subscription: Box<dyn Subscription> = Box::new(handle);
        subscription.disconnect();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(Arc::strong_count(&held), 1);
    }
}
