//! Type records: the reflected description of a struct or class.
//!
//! A record is built once at start-up with [`TypeRecord::class`] or
//! [`TypeRecord::structure`], registered with a
//! [`TypeRegistry`](crate::TypeRegistry), and linked. Linking flattens the
//! parent's properties (reached through the parent upcast) in front of the
//! record's own, and is a one-time fill: records are immutable afterwards.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use ember_core::Object;

use crate::property::{accessor, Accessor, PropertyDescriptor, Reflected};

/// Whether a record describes a plain struct or an arena object class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// A value type nested inside other records.
    Struct,
    /// An [`Object`] type that can live in an arena.
    Class,
}

/// Default-construct an object of a registered class.
pub type Factory = fn() -> Box<dyn Object>;

fn default_object<T: Object + Default>() -> Box<dyn Object> {
    Box::new(T::default())
}

struct ParentLink {
    name: String,
    type_id: TypeId,
    upcast: Accessor,
}

struct Linked {
    parent: Option<Arc<TypeRecord>>,
    properties: Vec<PropertyDescriptor>,
}

/// Reflected description of one Rust type.
pub struct TypeRecord {
    name: String,
    kind: TypeKind,
    type_id: TypeId,
    parent: Option<ParentLink>,
    properties: Vec<PropertyDescriptor>,
    factory: Option<Factory>,
    linked: OnceLock<Linked>,
}

/// Builder returned by the [`TypeRecord`] constructors.
///
/// `T` is the Rust type being described; it fixes the argument type of the
/// accessor closures.
pub struct TypeRecordBuilder<T> {
    record: TypeRecord,
    _type: std::marker::PhantomData<fn(&mut T)>,
}

impl TypeRecord {
    /// Describe a default-constructible object class.
    pub fn class<T: Object + Default>(name: &str) -> TypeRecordBuilder<T> {
        let mut builder = Self::abstract_class::<T>(name);
        builder.record.factory = Some(default_object::<T>);
        builder
    }

    /// Describe an object class that [`construct`](Self::construct) cannot
    /// create.
    pub fn abstract_class<T: Object>(name: &str) -> TypeRecordBuilder<T> {
        TypeRecordBuilder::new(name, TypeKind::Class)
    }

    /// Describe a struct nested in other records. Pair it with
    /// [`reflect_struct!`](crate::reflect_struct).
    pub fn structure<T: Reflected>(name: &str) -> TypeRecordBuilder<T> {
        TypeRecordBuilder::new(name, TypeKind::Struct)
    }

    /// Record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Struct or class.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Rust type described by this record.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the parent record, if any.
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.name.as_str())
    }

    /// Resolved parent record. `None` for roots and before linking.
    pub fn parent(&self) -> Option<&Arc<TypeRecord>> {
        self.linked.get().and_then(|l| l.parent.as_ref())
    }

    /// Properties declared by this type itself.
    pub fn own_properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Flattened property list, parent fields first. Empty until linked.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        self.linked
            .get()
            .map(|l| l.properties.as_slice())
            .unwrap_or_default()
    }

    /// Linked property called `name`.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties().iter().find(|p| p.name() == name)
    }

    /// Whether the record has been linked.
    pub fn is_linked(&self) -> bool {
        self.linked.get().is_some()
    }

    /// Whether this type is `ancestor` or derives from it. Walks resolved
    /// parents, so it only sees ancestry after linking.
    pub fn is_child_of(&self, ancestor: &str) -> bool {
        if self.name == ancestor {
            return true;
        }
        let mut current = self.parent();
        while let Some(record) = current {
            if record.name == ancestor {
                return true;
            }
            current = record.parent();
        }
        false
    }

    /// Whether [`construct`](Self::construct) can create instances.
    pub fn is_constructible(&self) -> bool {
        self.factory.is_some()
    }

    /// Default-construct an instance. `None` for structs and abstract
    /// classes.
    pub fn construct(&self) -> Option<Box<dyn Object>> {
        self.factory.map(|make| make())
    }

    /// Parent upcast, for linking.
    pub(crate) fn parent_type_id(&self) -> Option<TypeId> {
        self.parent.as_ref().map(|p| p.type_id)
    }

    /// Fill the linked data from an already linked parent.
    pub(crate) fn link_with(&self, parent: Option<&Arc<TypeRecord>>) {
        self.linked.get_or_init(|| {
            let mut properties = Vec::new();
            if let (Some(parent), Some(link)) = (parent, &self.parent) {
                properties.extend(parent.properties().iter().map(|p| p.through(&link.upcast)));
            }
            for own in &self.properties {
                if properties.iter().any(|p| p.name() == own.name()) {
                    log::warn!(
                        "reflect: {}.{} shadows an inherited property; loads match the inherited one",
                        self.name,
                        own.name()
                    );
                }
                properties.push(own.clone());
            }
            log::debug!("reflect: linked {} ({} properties)", self.name, properties.len());
            Linked {
                parent: parent.cloned(),
                properties,
            }
        });
    }
}

impl fmt::Debug for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRecord")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent_name())
            .field("properties", &self.properties)
            .field("linked", &self.is_linked())
            .finish()
    }
}

impl<T: Any> TypeRecordBuilder<T> {
    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            record: TypeRecord {
                name: name.to_string(),
                kind,
                type_id: TypeId::of::<T>(),
                parent: None,
                properties: Vec::new(),
                factory: None,
                linked: OnceLock::new(),
            },
            _type: std::marker::PhantomData,
        }
    }

    /// Declare `name` as the parent type. `upcast` borrows the embedded
    /// parent value out of `T`.
    pub fn parent<P: Any>(
        mut self,
        name: &str,
        upcast: impl Fn(&mut T) -> &mut P + Send + Sync + 'static,
    ) -> Self {
        self.record.parent = Some(ParentLink {
            name: name.to_string(),
            type_id: TypeId::of::<P>(),
            upcast: accessor(move |any| {
                any.downcast_mut::<T>()
                    .map(|child| upcast(child) as &mut dyn Any)
            }),
        });
        self
    }

    /// Declare a property. `access` borrows the field out of `T`.
    pub fn property<F: Reflected>(
        mut self,
        name: &str,
        access: impl Fn(&mut T) -> &mut F + Send + Sync + 'static,
    ) -> Self {
        let descriptor = PropertyDescriptor::new(&self.record.name, name, access);
        self.record.properties.push(descriptor);
        self
    }

    /// Finish the record.
    pub fn build(self) -> TypeRecord {
        self.record
    }
}

impl<T: Any> From<TypeRecordBuilder<T>> for TypeRecord {
    fn from(builder: TypeRecordBuilder<T>) -> Self {
        builder.build()
    }
}
