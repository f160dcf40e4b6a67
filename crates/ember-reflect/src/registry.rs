//! The type registry.
//!
//! Maps record names to [`TypeRecord`]s in registration order. Records are
//! registered during start-up, then linked (all at once by
//! [`ObjectContext::new`](crate::ObjectContext::new), or on demand with
//! [`link`](TypeRegistry::link)). Linking only fills each record's
//! one-time cell, so a shared `&TypeRegistry` can link concurrently.

use std::sync::Arc;

use ember_core::Object;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::ReflectError;
use crate::record::TypeRecord;

/// Registry of reflected types, keyed by name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    records: IndexMap<String, Arc<TypeRecord>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record under its name.
    ///
    /// Idempotent: if the name is already registered the existing record is
    /// kept and `record` is discarded. Returns the record now registered.
    pub fn register_type(&mut self, record: impl Into<TypeRecord>) -> &Arc<TypeRecord> {
        let record = record.into();
        let index = match self.records.get_index_of(record.name()) {
            Some(index) => {
                log::debug!("reflect: {} already registered, keeping the first record", record.name());
                index
            }
            None => {
                log::debug!("reflect: registered {}", record.name());
                let (index, _) = self
                    .records
                    .insert_full(record.name().to_string(), Arc::new(record));
                index
            }
        };
        &self.records[index]
    }

    /// Record registered as `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<TypeRecord>> {
        self.records.get(name)
    }

    /// Record registered as `name`, or [`ReflectError::UnknownType`].
    pub fn require(&self, name: &str) -> Result<&Arc<TypeRecord>, ReflectError> {
        self.get(name).ok_or_else(|| ReflectError::UnknownType {
            name: name.to_string(),
        })
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeRecord>> {
        self.records.values()
    }

    /// Link `name` and its ancestors, root first.
    ///
    /// Already linked records are left as they are, so this is cheap to
    /// call repeatedly.
    pub fn link(&self, name: &str) -> Result<&Arc<TypeRecord>, ReflectError> {
        let target = self.require(name)?;

        // Walk up to the first linked ancestor (or the root), then link
        // back down.
        let mut chain: SmallVec<[&Arc<TypeRecord>; 8]> = SmallVec::new();
        let mut current = target;
        while !current.is_linked() {
            if chain.iter().any(|r| Arc::ptr_eq(r, current)) {
                return Err(ReflectError::InheritanceCycle {
                    type_name: current.name().to_string(),
                });
            }
            chain.push(current);
            let Some(parent_name) = current.parent_name() else {
                break;
            };
            let parent = self.get(parent_name).ok_or_else(|| ReflectError::UnknownParent {
                type_name: current.name().to_string(),
                parent: parent_name.to_string(),
            })?;
            if current.parent_type_id() != Some(parent.type_id()) {
                return Err(ReflectError::ParentMismatch {
                    type_name: current.name().to_string(),
                    parent: parent_name.to_string(),
                });
            }
            current = parent;
        }

        for record in chain.iter().rev() {
            let parent = record.parent_name().and_then(|p| self.get(p));
            record.link_with(parent);
        }
        Ok(target)
    }

    /// Link every registered record. Stops at the first error.
    pub fn link_all(&self) -> Result<(), ReflectError> {
        for name in self.records.keys() {
            self.link(name)?;
        }
        log::info!("reflect: linked {} types", self.records.len());
        Ok(())
    }

    /// Whether `type_name` is `ancestor` or derives from it.
    ///
    /// Follows declared parent names, so it works before linking. Unknown
    /// names and cycles yield `false`.
    pub fn is_child_of(&self, type_name: &str, ancestor: &str) -> bool {
        let mut current = self.get(type_name);
        // A chain longer than the registry must loop.
        for _ in 0..=self.records.len() {
            let Some(record) = current else {
                return false;
            };
            if record.name() == ancestor {
                return true;
            }
            current = record.parent_name().and_then(|p| self.get(p));
        }
        false
    }

    /// Default-construct an instance of the class registered as `name`.
    pub fn construct(&self, name: &str) -> Result<Box<dyn Object>, ReflectError> {
        self.require(name)?
            .construct()
            .ok_or_else(|| ReflectError::NotConstructible {
                type_name: name.to_string(),
            })
    }

    /// Linked record describing `object`'s runtime type.
    pub fn record_for(&self, object: &dyn Object) -> Result<&Arc<TypeRecord>, ReflectError> {
        let record = self.link(object.type_name())?;
        if record.type_id() != object.as_any().type_id() {
            return Err(ReflectError::TypeMismatch {
                type_name: record.name().to_string(),
            });
        }
        Ok(record)
    }
}

// Compile-time assertion: TypeRegistry must be Send + Sync so it can be
// shared behind an Arc.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<TypeRegistry>();
};
