//! Capture and reapply restorable property state of an instance tree

use std::fmt;

use tracing::trace;

use crate::errors::{PoolError, PoolResult};
use crate::host::Host;
use crate::schema::{Kind, RestorationSchema};
use crate::value::PropertyValue;

/// Captured values of one node, in schema order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    values: Vec<(String, PropertyValue)>,
}

impl PropertyMap {
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values
            .iter()
            .find(|(property, _)| property == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Captured state of one descendant.
///
/// `slot` is the descendant's position in the enumeration taken at capture
/// time and identifies it independently of its name.
#[derive(Debug, Clone)]
pub struct DescendantSnapshot<N> {
    pub slot: usize,
    pub node: N,
    pub properties: PropertyMap,
}

/// Pre-lease state of an instance and, optionally, its descendants
#[derive(Debug, Clone)]
pub struct Snapshot<N> {
    properties: PropertyMap,
    descendants: Vec<DescendantSnapshot<N>>,
}

impl<N> Snapshot<N> {
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn descendants(&self) -> &[DescendantSnapshot<N>] {
        &self.descendants
    }

    pub fn descendant(&self, slot: usize) -> Option<&DescendantSnapshot<N>> {
        self.descendants.get(slot)
    }
}

impl<N> Snapshot<N> {
    /// Write every captured value back to `instance` and to those captured
    /// descendants that are still part of its tree.
    pub fn apply<H>(&self, host: &H, instance: &N) -> PoolResult<()>
    where
        H: Host<Instance = N>,
        N: fmt::Debug,
    {
        write_properties(host, instance, &self.properties)?;

        for descendant in &self.descendants {
            if host.contains(instance, &descendant.node)? {
                write_properties(host, &descendant.node, &descendant.properties)?;
            } else {
                trace!(
                    slot = descendant.slot,
                    node = ?descendant.node,
                    "descendant left the tree, skipping restore"
                );
            }
        }

        Ok(())
    }
}

fn write_properties<H: Host>(
    host: &H,
    node: &H::Instance,
    properties: &PropertyMap,
) -> PoolResult<()> {
    for (name, value) in properties.iter() {
        host.set_property(node, name, value)?;
    }
    Ok(())
}

/// Reads schema-listed properties off instances
pub struct SnapshotRecorder<'a, H: Host> {
    host: &'a H,
    schema: &'a RestorationSchema,
    include_descendants: bool,
    strict: bool,
}

impl<'a, H: Host> SnapshotRecorder<'a, H> {
    pub fn new(host: &'a H, schema: &'a RestorationSchema) -> Self {
        Self {
            host,
            schema,
            include_descendants: true,
            strict: true,
        }
    }

    pub fn with_descendants(mut self, include: bool) -> Self {
        self.include_descendants = include;
        self
    }

    pub fn with_strict_properties(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn capture(&self, instance: &H::Instance) -> PoolResult<Snapshot<H::Instance>> {
        let properties = self.capture_node(instance)?;

        let descendants = if self.include_descendants {
            self.host
                .descendants_of(instance)?
                .into_iter()
                .enumerate()
                .map(|(slot, node)| {
                    let properties = self.capture_node(&node)?;
                    Ok(DescendantSnapshot {
                        slot,
                        node,
                        properties,
                    })
                })
                .collect::<PoolResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        Ok(Snapshot {
            properties,
            descendants,
        })
    }

    fn capture_node(&self, node: &H::Instance) -> PoolResult<PropertyMap> {
        let kind = Kind::of(&self.host.class_of(node)?);
        let mut values = Vec::new();

        for name in self.schema.properties_for(&kind) {
            match self.host.get_property(node, name)? {
                Some(value) => values.push((name.clone(), value)),
                None if self.strict => {
                    return Err(PoolError::MissingProperty {
                        kind: kind.to_string(),
                        property: name.clone(),
                    });
                }
                None => {}
            }
        }

        Ok(PropertyMap { values })
    }
}
