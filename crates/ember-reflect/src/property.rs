//! Property types and the per-type serialization routines.
//!
//! Every field a type record exposes has a Rust type implementing
//! [`Reflected`]. The trait supplies two things: the stable
//! [`PropertyType`] written into each property tag, and the routine that
//! streams a value of that type through an [`Archive`]. The routine is
//! chosen statically from the field's type when the descriptor is built, so
//! serialization never dispatches on the tag.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use ember_archive::{Archive, ArchiveError};
use ember_arena::{ObjectPtr, WeakObjectPtr};

use crate::tagged::TaggedContext;

/// Type of a reflected property.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// `bool`, stored as a `u32`.
    Bool,
    /// `u8`.
    U8,
    /// `i8`.
    I8,
    /// `u16`.
    U16,
    /// `i16`.
    I16,
    /// `u32`.
    U32,
    /// `i32`.
    I32,
    /// `u64`.
    U64,
    /// `i64`.
    I64,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
    /// `String`.
    String,
    /// A nested struct with its own type record.
    Struct(&'static str),
    /// A fieldless enum stored by entry name.
    Enum(&'static str),
    /// A `Vec` of some element type.
    Array(Box<PropertyType>),
    /// A strong object reference.
    Object,
    /// A weak object reference.
    WeakObject,
}

impl PropertyType {
    /// Stable tag written into every property tag of this type.
    ///
    /// Loading matches stored properties by (tag, name), so changing a
    /// field's type makes old data for it skip rather than misread.
    pub fn type_tag(&self) -> String {
        match self {
            Self::Bool => "bool".into(),
            Self::U8 => "u8".into(),
            Self::I8 => "i8".into(),
            Self::U16 => "u16".into(),
            Self::I16 => "i16".into(),
            Self::U32 => "u32".into(),
            Self::I32 => "i32".into(),
            Self::U64 => "u64".into(),
            Self::I64 => "i64".into(),
            Self::F32 => "f32".into(),
            Self::F64 => "f64".into(),
            Self::String => "string".into(),
            Self::Struct(name) => format!("struct:{name}"),
            Self::Enum(name) => format!("enum:{name}"),
            Self::Array(element) => format!("array<{}>", element.type_tag()),
            Self::Object => "object".into(),
            Self::WeakObject => "weak_object".into(),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_tag())
    }
}

/// A Rust type that can appear as a reflected property.
///
/// Implemented here for the scalar types, `String`, `Vec<T>` and object
/// references; use [`reflect_struct!`](crate::reflect_struct) and
/// [`reflect_enum!`](crate::reflect_enum) for user types.
pub trait Reflected: Any + Send + Sync + Default {
    /// Property type of fields of this type.
    fn property_type() -> PropertyType;

    /// Write `self` to the archive, or overwrite it from the archive.
    fn serialize_value(&mut self, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>);

    /// Serialize a `Vec` of this type: a `u64` count, then the elements.
    ///
    /// The default goes element by element. Scalar types override it with a
    /// single little-endian block.
    ///
    /// Loading pushes each element only once it has decoded, so a corrupt
    /// count costs at most [`PREALLOCATE_LIMIT`] elements up front.
    fn serialize_elements(items: &mut Vec<Self>, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>) {
        let mut len = items.len() as u64;
        if !ar.serialize_len(&mut len) {
            items.clear();
            return;
        }

        if ar.is_writing() {
            for item in items.iter_mut() {
                item.serialize_value(ar, cx);
                if ar.has_error() {
                    break;
                }
            }
            return;
        }

        items.clear();
        items.reserve(len.min(PREALLOCATE_LIMIT) as usize);
        for _ in 0..len {
            let mut item = Self::default();
            item.serialize_value(ar, cx);
            if ar.has_error() {
                break;
            }
            items.push(item);
        }
    }
}

/// Most elements reserved ahead of decoding a non-scalar array.
pub const PREALLOCATE_LIMIT: u64 = 1024;

/// Serialize a block of fixed-width scalars in one archive call.
fn serialize_scalar_block<T: Copy, const N: usize>(
    items: &mut Vec<T>,
    ar: &mut dyn Archive,
    to_bytes: fn(T) -> [u8; N],
    from_bytes: fn([u8; N]) -> T,
) {
    let mut len = items.len() as u64;
    if !ar.serialize_len(&mut len) {
        items.clear();
        return;
    }

    if ar.is_writing() {
        let mut block: Vec<u8> = items.iter().flat_map(|&v| to_bytes(v)).collect();
        ar.serialize_bytes(&mut block);
        return;
    }

    let byte_len = len.saturating_mul(N as u64);
    if byte_len > ar.remaining() {
        let limit = ar.remaining() / N as u64;
        log::error!("tagged: array of {len} elements exceeds the {limit} that fit");
        ar.set_error(ArchiveError::LengthExceedsLimit { length: len, limit });
        items.clear();
        return;
    }
    let mut block = vec![0u8; byte_len as usize];
    ar.serialize_bytes(&mut block);
    *items = block
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            from_bytes(raw)
        })
        .collect();
}

macro_rules! reflect_scalar {
    ($($ty:ty => $variant:ident, $method:ident;)*) => {
        $(
            impl Reflected for $ty {
                fn property_type() -> PropertyType {
                    PropertyType::$variant
                }

                fn serialize_value(&mut self, ar: &mut dyn Archive, _cx: &mut TaggedContext<'_>) {
                    ar.$method(self);
                }

                fn serialize_elements(
                    items: &mut Vec<Self>,
                    ar: &mut dyn Archive,
                    _cx: &mut TaggedContext<'_>,
                ) {
                    serialize_scalar_block(items, ar, <$ty>::to_le_bytes, <$ty>::from_le_bytes);
                }
            }
        )*
    };
}

reflect_scalar! {
    u8 => U8, serialize_u8;
    i8 => I8, serialize_i8;
    u16 => U16, serialize_u16;
    i16 => I16, serialize_i16;
    u32 => U32, serialize_u32;
    i32 => I32, serialize_i32;
    u64 => U64, serialize_u64;
    i64 => I64, serialize_i64;
    f32 => F32, serialize_f32;
    f64 => F64, serialize_f64;
}

impl Reflected for bool {
    fn property_type() -> PropertyType {
        PropertyType::Bool
    }

    fn serialize_value(&mut self, ar: &mut dyn Archive, _cx: &mut TaggedContext<'_>) {
        ar.serialize_bool(self);
    }
}

impl Reflected for String {
    fn property_type() -> PropertyType {
        PropertyType::String
    }

    fn serialize_value(&mut self, ar: &mut dyn Archive, _cx: &mut TaggedContext<'_>) {
        ar.serialize_string(self);
    }
}

impl<T: Reflected> Reflected for Vec<T> {
    fn property_type() -> PropertyType {
        PropertyType::Array(Box::new(T::property_type()))
    }

    fn serialize_value(&mut self, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>) {
        T::serialize_elements(self, ar, cx);
    }
}

impl Reflected for Option<ObjectPtr> {
    fn property_type() -> PropertyType {
        PropertyType::Object
    }

    fn serialize_value(&mut self, ar: &mut dyn Archive, _cx: &mut TaggedContext<'_>) {
        ar.serialize_object(self);
    }
}

/// Stored as a strong reference; loading downgrades it. A stale weak
/// reference is written as null.
///
/// A writing archive that rewrites the reference (see
/// `ember_archive::ReferenceReplacer`) updates the weak field too.
impl Reflected for Option<WeakObjectPtr> {
    fn property_type() -> PropertyType {
        PropertyType::WeakObject
    }

    fn serialize_value(&mut self, ar: &mut dyn Archive, _cx: &mut TaggedContext<'_>) {
        let mut strong = if ar.is_writing() {
            self.as_ref().and_then(|weak| weak.lock())
        } else {
            None
        };
        let before = strong.as_ref().map(ObjectPtr::handle);
        ar.serialize_object(&mut strong);
        if ar.is_reading() || strong.as_ref().map(ObjectPtr::handle) != before {
            *self = strong.map(|object| object.downgrade());
        }
    }
}

/// A fieldless enum reflected by entry name.
///
/// Implemented by [`reflect_enum!`](crate::reflect_enum).
pub trait ReflectEnum: Copy + PartialEq + 'static {
    /// Reflected name of the enum.
    const NAME: &'static str;

    /// Every entry with its stored name, in declaration order.
    fn entries() -> &'static [(&'static str, Self)];

    /// Stored name of `self`.
    fn entry_name(self) -> Option<&'static str> {
        Self::entries()
            .iter()
            .find(|(_, value)| *value == self)
            .map(|(name, _)| *name)
    }

    /// Entry stored under `name`.
    fn from_entry_name(name: &str) -> Option<Self> {
        Self::entries()
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, value)| *value)
    }
}

/// Serialization routine for enum properties.
///
/// An unknown stored name leaves `value` unchanged and logs a warning.
pub fn serialize_enum<E: ReflectEnum>(value: &mut E, ar: &mut dyn Archive) {
    if ar.is_writing() {
        let mut name = value.entry_name().unwrap_or_default().to_string();
        ar.serialize_string(&mut name);
        return;
    }

    let mut name = String::new();
    ar.serialize_string(&mut name);
    if ar.has_error() {
        return;
    }
    match E::from_entry_name(&name) {
        Some(entry) => *value = entry,
        None => log::warn!("tagged: unknown entry '{name}' for enum {}", E::NAME),
    }
}

/// Borrow a field out of its owning value.
///
/// Receives the owner as `&mut dyn Any` and returns `None` if it is not the
/// Rust type the accessor was built for.
pub type Accessor = Arc<dyn Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync>;

/// Serialization routine bound to a field's Rust type.
pub type SerializeFn = fn(&mut dyn Any, &mut dyn Archive, &mut TaggedContext<'_>);

/// Erase a typed accessor.
pub(crate) fn accessor<C>(access: C) -> Accessor
where
    C: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(access)
}

fn serialize_field<F: Reflected>(field: &mut dyn Any, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>) {
    if let Some(value) = field.downcast_mut::<F>() {
        value.serialize_value(ar, cx);
    }
}

/// One reflected field of a type record.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    property_type: PropertyType,
    type_tag: String,
    owner: String,
    accessor: Accessor,
    serialize: SerializeFn,
}

impl PropertyDescriptor {
    /// Describe field `name` of `owner`, reached through `access`.
    pub fn new<T: Any, F: Reflected>(
        owner: &str,
        name: &str,
        access: impl Fn(&mut T) -> &mut F + Send + Sync + 'static,
    ) -> Self {
        let property_type = F::property_type();
        Self {
            name: name.to_string(),
            type_tag: property_type.type_tag(),
            property_type,
            owner: owner.to_string(),
            accessor: accessor(move |any| {
                any.downcast_mut::<T>()
                    .map(|owner| access(owner) as &mut dyn Any)
            }),
            serialize: serialize_field::<F>,
        }
    }

    /// Copy of this descriptor reached through `upcast` first.
    ///
    /// Used when linking to flatten a parent's fields into a child.
    pub(crate) fn through(&self, upcast: &Accessor) -> Self {
        let upcast = Arc::clone(upcast);
        let inner = Arc::clone(&self.accessor);
        Self {
            accessor: accessor(move |any| {
                let base = upcast(any)?;
                inner(base)
            }),
            ..self.clone()
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type.
    pub fn property_type(&self) -> &PropertyType {
        &self.property_type
    }

    /// Stable tag of the field type.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Name of the type that declares this field.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Borrow this field out of `owner`.
    pub fn access<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.accessor)(owner)
    }

    /// Stream the field value through `ar`. `field` is what
    /// [`access`](Self::access) returned.
    pub fn serialize(&self, field: &mut dyn Any, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>) {
        (self.serialize)(field, ar, cx);
    }

    /// Whether a stored property with this tag and name is this field.
    pub fn matches(&self, type_tag: &str, name: &str) -> bool {
        self.type_tag == type_tag && self.name == name
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Bind a struct to the nested-struct serialization routine.
///
/// The struct must also be registered with
/// [`TypeRecord::structure`](crate::TypeRecord::structure) under the same
/// name.
///
/// ```
/// use ember_reflect::{reflect_struct, PropertyType, Reflected};
///
/// #[derive(Default)]
/// struct Extent {
///     width: f32,
///     height: f32,
/// }
/// reflect_struct!(Extent, "Extent");
///
/// assert_eq!(Extent::property_type(), PropertyType::Struct("Extent"));
/// ```
#[macro_export]
macro_rules! reflect_struct {
    ($ty:ty, $name:expr) => {
        impl $crate::Reflected for $ty {
            fn property_type() -> $crate::PropertyType {
                $crate::PropertyType::Struct($name)
            }

            fn serialize_value(
                &mut self,
                ar: &mut dyn $crate::Archive,
                cx: &mut $crate::TaggedContext<'_>,
            ) {
                $crate::tagged::serialize_nested(self, $name, ar, cx);
            }
        }
    };
}

/// Bind a fieldless enum to the by-name enum serialization routine.
///
/// The enum must implement `Copy`, `PartialEq` and `Default`; the default is
/// what a field keeps when its stored entry name is unknown.
///
/// ```
/// use ember_reflect::{reflect_enum, ReflectEnum};
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// enum Facing {
///     #[default]
///     North,
///     South,
/// }
/// reflect_enum!(Facing, "Facing", [North, South]);
///
/// assert_eq!(Facing::South.entry_name(), Some("South"));
/// assert_eq!(Facing::from_entry_name("North"), Some(Facing::North));
/// ```
#[macro_export]
macro_rules! reflect_enum {
    ($ty:ident, $name:expr, [$($variant:ident),* $(,)?]) => {
        impl $crate::ReflectEnum for $ty {
            const NAME: &'static str = $name;

            fn entries() -> &'static [(&'static str, Self)] {
                &[$((stringify!($variant), $ty::$variant)),*]
            }
        }

        impl $crate::Reflected for $ty {
            fn property_type() -> $crate::PropertyType {
                $crate::PropertyType::Enum($name)
            }

            fn serialize_value(
                &mut self,
                ar: &mut dyn $crate::Archive,
                _cx: &mut $crate::TaggedContext<'_>,
            ) {
                $crate::property::serialize_enum(self, ar);
            }
        }
    };
}
