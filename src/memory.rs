//! In-memory scene graph host
//!
//! `MemoryHost` keeps nodes in a flat arena with parent/child links. It backs
//! the tests, demos and benchmarks, and is a reference for writing a [`Host`]
//! over a real scene.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::errors::HostError;
use crate::host::Host;
use crate::schema::NodeClass;
use crate::value::PropertyValue;

/// Handle of a node in a [`MemoryHost`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum MemoryHostError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("manufacturing from {0:?} was refused")]
    ManufactureRefused(NodeId),

    #[error("writes to {0:?} were refused")]
    WriteRefused(NodeId),
}

#[derive(Debug, Clone)]
struct Node {
    class: NodeClass,
    properties: BTreeMap<String, PropertyValue>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    parked: bool,
}

#[derive(Default)]
struct Scene {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
}

impl Scene {
    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, MemoryHostError> {
        self.nodes.get(&id).ok_or(MemoryHostError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, MemoryHostError> {
        self.nodes.get_mut(&id).ok_or(MemoryHostError::UnknownNode(id))
    }

    fn unlink(&mut self, id: NodeId) {
        let parent = self.nodes.get_mut(&id).and_then(|node| node.parent.take());
        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
    }

    fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, MemoryHostError> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id)?.children.iter().rev().copied().collect();

        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next)?.children.iter().rev().copied());
        }

        Ok(out)
    }

    fn deep_copy(
        &mut self,
        source: NodeId,
        parent: Option<NodeId>,
    ) -> Result<NodeId, MemoryHostError> {
        let original = self.node(source)?.clone();
        let copy = self.insert(Node {
            class: original.class,
            properties: original.properties,
            parent,
            children: Vec::new(),
            parked: original.parked,
        });

        for child in original.children {
            let child_copy = self.deep_copy(child, Some(copy))?;
            self.node_mut(copy)?.children.push(child_copy);
        }

        Ok(copy)
    }
}

/// Thread-safe in-memory [`Host`].
///
/// Prototypes and instances are both [`NodeId`]s. Manufacturing deep-copies
/// the prototype subtree as a new parked root.
pub struct MemoryHost {
    scene: Mutex<Scene>,
    /// Manufactures left before refusing; `usize::MAX` means unlimited
    manufacture_budget: AtomicUsize,
    refuse_writes: AtomicBool,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            scene: Mutex::default(),
            manufacture_budget: AtomicUsize::new(usize::MAX),
            refuse_writes: AtomicBool::new(false),
        }
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detached, unparked node
    pub fn create<I, S>(&self, class: NodeClass, properties: I) -> NodeId
    where
        I: IntoIterator<Item = (S, PropertyValue)>,
        S: Into<String>,
    {
        self.scene.lock().insert(Node {
            class,
            properties: properties
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
            parent: None,
            children: Vec::new(),
            parked: false,
        })
    }

    /// Make `child` the last child of `parent`, moving it if needed
    pub fn attach(&self, parent: NodeId, child: NodeId) {
        self.scene.lock().link(parent, child);
    }

    /// Remove `node` from its parent; the node and its subtree stay alive
    pub fn detach(&self, node: NodeId) {
        self.scene.lock().unlink(node);
    }

    pub fn set(&self, node: NodeId, name: &str, value: impl Into<PropertyValue>) {
        if let Some(node) = self.scene.lock().nodes.get_mut(&node) {
            node.properties.insert(name.to_string(), value.into());
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<PropertyValue> {
        self.scene
            .lock()
            .nodes
            .get(&node)
            .and_then(|node| node.properties.get(name).cloned())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.scene
            .lock()
            .nodes
            .get(&node)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn is_alive(&self, node: NodeId) -> bool {
        self.scene.lock().nodes.contains_key(&node)
    }

    pub fn is_parked(&self, node: NodeId) -> bool {
        self.scene
            .lock()
            .nodes
            .get(&node)
            .is_some_and(|node| node.parked)
    }

    /// Put a leased instance into use
    pub fn unpark(&self, node: NodeId) {
        if let Some(node) = self.scene.lock().nodes.get_mut(&node) {
            node.parked = false;
        }
    }

    pub fn node_count(&self) -> usize {
        self.scene.lock().nodes.len()
    }

    /// Make every following `manufacture` call fail until switched back
    pub fn refuse_manufacture(&self, refuse: bool) {
        let budget = if refuse { 0 } else { usize::MAX };
        self.manufacture_budget.store(budget, Ordering::Relaxed);
    }

    /// Allow `count` more manufactures, then refuse the rest
    pub fn limit_manufacture(&self, count: usize) {
        self.manufacture_budget.store(count, Ordering::Relaxed);
    }

    /// Make `park` and `set_property` fail until switched back
    pub fn refuse_writes(&self, refuse: bool) {
        self.refuse_writes.store(refuse, Ordering::Relaxed);
    }

    fn take_manufacture(&self) -> bool {
        self.manufacture_budget
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                left => Some(left - 1),
            })
            .is_ok()
    }

    fn check_write(&self, node: NodeId) -> Result<(), MemoryHostError> {
        if self.refuse_writes.load(Ordering::Relaxed) {
            return Err(MemoryHostError::WriteRefused(node));
        }
        Ok(())
    }
}

impl Host for MemoryHost {
    type Prototype = NodeId;
    type Instance = NodeId;

    fn manufacture(&self, prototype: &NodeId) -> Result<NodeId, HostError> {
        if !self.take_manufacture() {
            return Err(MemoryHostError::ManufactureRefused(*prototype).into());
        }

        let mut scene = self.scene.lock();
        let copy = scene.deep_copy(*prototype, None)?;
        scene.node_mut(copy)?.parked = true;
        Ok(copy)
    }

    fn park(&self, instance: &NodeId) -> Result<(), HostError> {
        self.check_write(*instance)?;
        let mut scene = self.scene.lock();
        scene.node_mut(*instance)?.parked = true;
        Ok(())
    }

    fn destroy(&self, instance: &NodeId) -> Result<(), HostError> {
        let mut scene = self.scene.lock();
        let doomed = scene.descendants(*instance)?;
        scene.unlink(*instance);
        scene.nodes.remove(instance);
        for node in doomed {
            scene.nodes.remove(&node);
        }
        Ok(())
    }

    fn class_of(&self, node: &NodeId) -> Result<NodeClass, HostError> {
        Ok(self.scene.lock().node(*node)?.class.clone())
    }

    fn get_property(
        &self,
        node: &NodeId,
        name: &str,
    ) -> Result<Option<PropertyValue>, HostError> {
        Ok(self.scene.lock().node(*node)?.properties.get(name).cloned())
    }

    fn set_property(
        &self,
        node: &NodeId,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), HostError> {
        self.check_write(*node)?;
        let mut scene = self.scene.lock();
        scene
            .node_mut(*node)?
            .properties
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn descendants_of(&self, node: &NodeId) -> Result<Vec<NodeId>, HostError> {
        Ok(self.scene.lock().descendants(*node)?)
    }

    fn contains(&self, ancestor: &NodeId, node: &NodeId) -> Result<bool, HostError> {
        let scene = self.scene.lock();
        let mut current = scene.nodes.get(node).and_then(|node| node.parent);

        while let Some(parent) = current {
            if parent == *ancestor {
                return Ok(true);
            }
            current = scene.nodes.get(&parent).and_then(|node| node.parent);
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(host: &MemoryHost) -> (NodeId, NodeId, NodeId) {
        let name = |value: &str| [("Name", PropertyValue::from(value))];
        let root = host.create(NodeClass::named("Model"), name("Crate"));
        let lid = host.create(NodeClass::primitive("Part"), name("Lid"));
        let hinge = host.create(NodeClass::named("Hinge"), name("Hinge"));
        host.attach(root, lid);
        host.attach(lid, hinge);
        (root, lid, hinge)
    }

    #[test]
    fn descendants_are_depth_first_in_child_order() {
        let host = MemoryHost::new();
        let (root, lid, hinge) = model(&host);
        let base = host.create(NodeClass::primitive("Part"), Vec::<(String, PropertyValue)>::new());
        host.attach(root, base);

        assert_eq!(host.descendants_of(&root).unwrap(), [lid, hinge, base]);
    }

    #[test]
    fn manufacture_copies_the_subtree_parked() {
        let host = MemoryHost::new();
        let (root, ..) = model(&host);

        let copy = host.manufacture(&root).unwrap();

        assert_ne!(copy, root);
        assert!(host.is_parked(copy));
        assert!(!host.is_parked(root));
        let copied = host.descendants_of(&copy).unwrap();
        assert_eq!(copied.len(), 2);
        assert_eq!(host.property(copied[1], "Name"), Some(PropertyValue::from("Hinge")));

        host.set(copied[1], "Name", "Changed");
        assert_eq!(
            host.property(host.descendants_of(&root).unwrap()[1], "Name"),
            Some(PropertyValue::from("Hinge"))
        );
    }

    #[test]
    fn contains_walks_the_parent_chain() {
        let host = MemoryHost::new();
        let (root, lid, hinge) = model(&host);

        assert!(host.contains(&root, &hinge).unwrap());
        assert!(!host.contains(&lid, &root).unwrap());

        host.detach(lid);
        assert!(!host.contains(&root, &hinge).unwrap());
        assert!(host.contains(&lid, &hinge).unwrap());
    }

    #[test]
    fn destroy_removes_the_whole_subtree() {
        let host = MemoryHost::new();
        let (root, lid, hinge) = model(&host);

        host.destroy(&lid).unwrap();

        assert!(host.is_alive(root));
        assert!(!host.is_alive(lid));
        assert!(!host.is_alive(hinge));
        assert!(host.children(root).is_empty());
    }

    #[test]
    fn operations_on_dead_nodes_fail() {
        let host = MemoryHost::new();
        let (root, ..) = model(&host);
        host.destroy(&root).unwrap();

        assert!(host.park(&root).is_err());
        assert!(host.get_property(&root, "Name").is_err());
        assert!(host.manufacture(&root).is_err());
    }

    #[test]
    fn refused_manufacture_reports_the_prototype() {
        let host = MemoryHost::new();
        let (root, ..) = model(&host);
        host.refuse_manufacture(true);

        let error = host.manufacture(&root).unwrap_err();
        assert!(error.to_string().contains(&format!("{root:?}")));
    }

    #[test]
    fn manufacture_limit_runs_out() {
        let host = MemoryHost::new();
        let (root, ..) = model(&host);
        host.limit_manufacture(2);

        assert!(host.manufacture(&root).is_ok());
        assert!(host.manufacture(&root).is_ok());
        assert!(host.manufacture(&root).is_err());

        host.refuse_manufacture(false);
        assert!(host.manufacture(&root).is_ok());
    }

    #[test]
    fn refused_writes_leave_the_node_untouched() {
        let host = MemoryHost::new();
        let (root, ..) = model(&host);
        host.refuse_writes(true);

        assert!(host.park(&root).is_err());
        assert!(host.set_property(&root, "Name", &"Other".into()).is_err());
        assert!(!host.is_parked(root));
        assert_eq!(host.property(root, "Name"), Some(PropertyValue::from("Crate")));

        host.refuse_writes(false);
        assert!(host.park(&root).is_ok());
    }
}
