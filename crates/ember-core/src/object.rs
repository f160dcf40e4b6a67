//! The [`Object`] trait and typed casting helpers.

use std::any::{Any, TypeId};

/// An engine object managed by an arena.
///
/// Objects are owned by the arena slot they live in and are shared through
/// strong and weak pointers. They must be `Send + Sync` because any thread
/// holding a pointer may read them.
///
/// [`type_name`](Object::type_name) names the reflected type record that
/// describes this object's layout; it is the key used to find the record
/// when the object is serialized.
pub trait Object: Any + Send + Sync {
    /// Name of the reflected type record for this object's runtime type.
    fn type_name(&self) -> &'static str;

    /// Upcast to `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Upcast to `&mut dyn Any` for downcasting and reflected field access.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Called exactly once, immediately before the object is dropped by
    /// its arena (last strong release or forced shutdown).
    fn on_destroy(&mut self) {}

    /// Called after the object's properties have been loaded from a package.
    fn post_load(&mut self) {}
}

/// A type a `dyn Object` can be viewed as.
///
/// Implemented for every concrete `T: Object` (by downcast) and for
/// `dyn Object` itself (identity), so typed pointers can be generic over
/// both.
pub trait ObjectType: 'static {
    /// Whether an object whose concrete type is `type_id` can be viewed as `Self`.
    fn matches(type_id: TypeId) -> bool;

    /// View `object` as `Self`, if its concrete type matches.
    fn cast_ref(object: &dyn Object) -> Option<&Self>;

    /// Mutable counterpart of [`cast_ref`](ObjectType::cast_ref).
    fn cast_mut(object: &mut dyn Object) -> Option<&mut Self>;
}

impl<T: Object> ObjectType for T {
    fn matches(type_id: TypeId) -> bool {
        type_id == TypeId::of::<T>()
    }

    fn cast_ref(object: &dyn Object) -> Option<&Self> {
        object.as_any().downcast_ref::<T>()
    }

    fn cast_mut(object: &mut dyn Object) -> Option<&mut Self> {
        object.as_any_mut().downcast_mut::<T>()
    }
}

impl ObjectType for dyn Object {
    fn matches(_type_id: TypeId) -> bool {
        true
    }

    fn cast_ref(object: &dyn Object) -> Option<&Self> {
        Some(object)
    }

    fn cast_mut(object: &mut dyn Object) -> Option<&mut Self> {
        Some(object)
    }
}

/// Implement [`Object`] for a type with the default lifecycle hooks.
///
/// ```
/// #[derive(Default)]
/// struct Lamp {
///     intensity: f32,
/// }
/// ember_core::impl_object!(Lamp, "Lamp");
///
/// use ember_core::Object;
/// assert_eq!(Lamp::default().type_name(), "Lamp");
/// ```
#[macro_export]
macro_rules! impl_object {
    ($ty:ty, $name:expr) => {
        impl $crate::Object for $ty {
            fn type_name(&self) -> &'static str {
                $name
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Crate {
        weight: u32,
    }
    crate::impl_object!(Crate, "Crate");

    struct Barrel;
    crate::impl_object!(Barrel, "Barrel");

    #[test]
    fn concrete_cast_checks_type() {
        let mut boxed: Box<dyn Object> = Box::new(Crate { weight: 5 });
        assert_eq!(Crate::cast_ref(boxed.as_ref()).map(|c| c.weight), Some(5));
        assert!(Barrel::cast_ref(boxed.as_ref()).is_none());

        Crate::cast_mut(boxed.as_mut()).unwrap().weight = 9;
        assert_eq!(Crate::cast_ref(boxed.as_ref()).unwrap().weight, 9);
    }

    #[test]
    fn dyn_object_matches_everything() {
        let boxed: Box<dyn Object> = Box::new(Barrel);
        assert!(<dyn Object as ObjectType>::matches(TypeId::of::<Crate>()));
        assert_eq!(
            <dyn Object as ObjectType>::cast_ref(boxed.as_ref())
                .unwrap()
                .type_name(),
            "Barrel"
        );
    }

    #[test]
    fn matches_compares_type_ids() {
        assert!(Crate::matches(TypeId::of::<Crate>()));
        assert!(!Crate::matches(TypeId::of::<Barrel>()));
    }
}
