//! Restoration schema: which properties of which kinds get snapshotted

use std::collections::HashMap;
use std::fmt;

/// Classification of a node as reported by the host
///
/// `base_primitive` marks members of the host's base visual primitive
/// family (parts, meshes, wedges ...). All of them share one schema entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeClass {
    pub name: String,
    pub base_primitive: bool,
}

impl NodeClass {
    /// A class outside the base primitive family
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_primitive: false,
        }
    }

    /// A class inside the base primitive family
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_primitive: true,
        }
    }
}

/// Schema lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Every base visual primitive, whatever its concrete class
    BasePrimitive,
    Class(String),
}

impl Kind {
    /// Resolve the schema kind of a node class
    pub fn of(class: &NodeClass) -> Self {
        if class.base_primitive {
            Self::BasePrimitive
        } else {
            Self::Class(class.name.clone())
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BasePrimitive => f.write_str("BasePrimitive"),
            Self::Class(name) => f.write_str(name),
        }
    }
}

/// Immutable mapping from [`Kind`] to the property names to capture
///
/// # Examples
///
/// ```
/// use esox_leasepool::{Kind, NodeClass, RestorationSchema};
///
/// let schema = RestorationSchema::builder()
///     .kind(Kind::BasePrimitive, ["Transparency", "Color"])
///     .kind(Kind::Class("PointLight".into()), ["Brightness"])
///     .build();
///
/// let wedge = Kind::of(&NodeClass::primitive("WedgePart"));
/// assert_eq!(schema.properties_for(&wedge), ["Transparency", "Color"]);
/// assert!(schema.properties_for(&Kind::Class("Folder".into())).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RestorationSchema {
    entries: HashMap<Kind, Vec<String>>,
}

impl RestorationSchema {
    pub fn builder() -> RestorationSchemaBuilder {
        RestorationSchemaBuilder::default()
    }

    /// Schema covering the usual visual state of a scene object tree
    pub fn visual_defaults() -> Self {
        Self::builder()
            .kind(
                Kind::BasePrimitive,
                [
                    "Transparency",
                    "Color",
                    "Size",
                    "Position",
                    "Anchored",
                    "CanCollide",
                    "Material",
                    "Reflectance",
                ],
            )
            .kind(Kind::Class("Decal".into()), ["Transparency", "Color3"])
            .kind(Kind::Class("Texture".into()), ["Transparency", "Color3"])
            .kind(
                Kind::Class("PointLight".into()),
                ["Brightness", "Range", "Color", "Enabled"],
            )
            .kind(
                Kind::Class("ParticleEmitter".into()),
                ["Enabled", "Rate", "Color"],
            )
            .kind(Kind::Class("Beam".into()), ["Enabled", "Transparency", "Width0", "Width1"])
            .kind(Kind::Class("Sound".into()), ["Volume", "PlaybackSpeed", "Playing"])
            .build()
    }

    /// Property names for a kind; empty when the kind has no entry
    pub fn properties_for(&self, kind: &Kind) -> &[String] {
        self.entries.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, kind: &Kind) -> bool {
        self.entries.contains_key(kind)
    }
}

#[derive(Debug, Default)]
pub struct RestorationSchemaBuilder {
    entries: HashMap<Kind, Vec<String>>,
}

impl RestorationSchemaBuilder {
    /// Add properties for a kind. Repeated calls for one kind extend its list.
    pub fn kind<I, S>(mut self, kind: Kind, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = self.entries.entry(kind).or_default();
        for property in properties {
            let property = property.into();
            if !names.contains(&property) {
                names.push(property);
            }
        }
        self
    }

    pub fn build(self) -> RestorationSchema {
        RestorationSchema {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_subtypes_collapse_to_one_kind() {
        assert_eq!(Kind::of(&NodeClass::primitive("Part")), Kind::BasePrimitive);
        assert_eq!(Kind::of(&NodeClass::primitive("MeshPart")), Kind::BasePrimitive);
        assert_eq!(
            Kind::of(&NodeClass::named("Decal")),
            Kind::Class("Decal".to_string())
        );
    }

    #[test]
    fn builder_extends_without_duplicates() {
        let schema = RestorationSchema::builder()
            .kind(Kind::BasePrimitive, ["Color", "Size"])
            .kind(Kind::BasePrimitive, ["Size", "Transparency"])
            .build();

        assert_eq!(
            schema.properties_for(&Kind::BasePrimitive),
            ["Color", "Size", "Transparency"]
        );
    }

    #[test]
    fn visual_defaults_cover_primitives() {
        let schema = RestorationSchema::visual_defaults();
        assert!(schema.contains(&Kind::BasePrimitive));
        assert!(schema.properties_for(&Kind::BasePrimitive).contains(&"Color".to_string()));
    }
}
