//! Structured archives.
//!
//! An alternate front end where values are addressed by scope rather than
//! by byte position: a [`Slot`] holds exactly one value, a [`Record`]
//! holds named fields, and an [`ArraySlot`] holds a counted sequence of
//! elements. Scopes borrow their parent mutably, so the nesting is enforced
//! at compile time.
//!
//! The byte layout is up to the [`StructuredFormatter`].
//! [`BinaryFormatter`] writes the flat binary form: field names are
//! dropped and values appear in declaration order, exactly as if they had
//! been serialized directly.

use ember_arena::ObjectPtr;

use crate::archive::Archive;

/// Back end of a [`StructuredArchive`].
///
/// Scope hooks are no-ops by default; a format that records structure
/// (names, nesting) overrides them.
pub trait StructuredFormatter {
    /// The byte archive values are written to.
    fn archive(&mut self) -> &mut dyn Archive;

    /// A record scope opens.
    fn enter_record(&mut self) {}

    /// The innermost record scope closes.
    fn leave_record(&mut self) {}

    /// A named field opens inside the current record.
    fn enter_field(&mut self, name: &str) {
        let _ = name;
    }

    /// The current field closes.
    fn leave_field(&mut self) {}

    /// An array scope opens; serializes its element count. Returns `false`
    /// if the count was rejected.
    fn enter_array(&mut self, len: &mut u64) -> bool {
        self.archive().serialize_len(len)
    }

    /// The innermost array scope closes.
    fn leave_array(&mut self) {}
}

/// Flat binary formatter.
pub struct BinaryFormatter<'a> {
    inner: &'a mut dyn Archive,
}

impl<'a> BinaryFormatter<'a> {
    /// Format into `inner`.
    pub fn new(inner: &'a mut dyn Archive) -> Self {
        Self { inner }
    }
}

impl StructuredFormatter for BinaryFormatter<'_> {
    fn archive(&mut self) -> &mut dyn Archive {
        &mut *self.inner
    }
}

/// Entry point of a structured serialization pass.
pub struct StructuredArchive<F: StructuredFormatter> {
    formatter: F,
}

impl<F: StructuredFormatter> StructuredArchive<F> {
    /// Wrap a formatter.
    pub fn new(formatter: F) -> Self {
        Self { formatter }
    }

    /// The root slot.
    pub fn open(&mut self) -> Slot<'_> {
        Slot {
            formatter: &mut self.formatter,
            leave: Leave::Nothing,
        }
    }

    /// Whether the underlying archive is reading.
    pub fn is_reading(&mut self) -> bool {
        self.formatter.archive().is_reading()
    }

    /// Consume the archive and return its formatter.
    pub fn into_inner(self) -> F {
        self.formatter
    }
}

impl<'a> StructuredArchive<BinaryFormatter<'a>> {
    /// Structured archive over the flat binary format.
    pub fn binary(inner: &'a mut dyn Archive) -> Self {
        Self::new(BinaryFormatter::new(inner))
    }
}

/// What a scope must close on its parent when it finishes.
#[derive(Clone, Copy)]
enum Leave {
    Nothing,
    Field,
}

impl Leave {
    fn apply(self, formatter: &mut dyn StructuredFormatter) {
        match self {
            Self::Nothing => {}
            Self::Field => formatter.leave_field(),
        }
    }
}

macro_rules! slot_scalar {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Store a `", stringify!($ty), "` in this slot.")]
            pub fn $name(self, value: &mut $ty) {
                self.formatter.archive().$name(value);
                self.leave.apply(self.formatter);
            }
        )*
    };
}

/// Scope holding exactly one value. Consumed by whatever it stores.
pub struct Slot<'a> {
    formatter: &'a mut dyn StructuredFormatter,
    leave: Leave,
}

impl<'a> Slot<'a> {
    slot_scalar!(
        serialize_u8: u8,
        serialize_i8: i8,
        serialize_u16: u16,
        serialize_i16: i16,
        serialize_u32: u32,
        serialize_i32: i32,
        serialize_u64: u64,
        serialize_i64: i64,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_bool: bool,
        serialize_string: String,
    );

    /// Store an object reference in this slot.
    pub fn serialize_object(self, object: &mut Option<ObjectPtr>) {
        self.formatter.archive().serialize_object(object);
        self.leave.apply(self.formatter);
    }

    /// Store raw bytes in this slot.
    pub fn serialize_bytes(self, data: &mut [u8]) {
        self.formatter.archive().serialize_bytes(data);
        self.leave.apply(self.formatter);
    }

    /// Store a record in this slot.
    pub fn enter_record(self) -> Record<'a> {
        self.formatter.enter_record();
        Record {
            formatter: self.formatter,
            leave: self.leave,
        }
    }

    /// Store an array of `len` elements in this slot.
    ///
    /// When reading, `len` receives the stored count. Returns `None` if the
    /// count was rejected by the archive's limits.
    pub fn enter_array(self, len: &mut u64) -> Option<ArraySlot<'a>> {
        if !self.formatter.enter_array(len) {
            self.leave.apply(self.formatter);
            return None;
        }
        Some(ArraySlot {
            formatter: self.formatter,
            remaining: *len,
            leave: self.leave,
        })
    }

    /// Whether the underlying archive is reading.
    pub fn is_reading(&mut self) -> bool {
        self.formatter.archive().is_reading()
    }
}

/// Scope holding named fields.
pub struct Record<'a> {
    formatter: &'a mut dyn StructuredFormatter,
    leave: Leave,
}

impl Record<'_> {
    /// Open the field `name`. The returned slot must receive its value
    /// before the next field is opened.
    pub fn field(&mut self, name: &str) -> Slot<'_> {
        self.formatter.enter_field(name);
        Slot {
            formatter: &mut *self.formatter,
            leave: Leave::Field,
        }
    }
}

impl Drop for Record<'_> {
    fn drop(&mut self) {
        self.formatter.leave_record();
        self.leave.apply(&mut *self.formatter);
    }
}

/// Scope holding a counted sequence of element slots.
pub struct ArraySlot<'a> {
    formatter: &'a mut dyn StructuredFormatter,
    remaining: u64,
    leave: Leave,
}

impl ArraySlot<'_> {
    /// Elements not yet visited.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Slot for the next element, or `None` once all have been visited.
    pub fn element(&mut self) -> Option<Slot<'_>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(Slot {
            formatter: &mut *self.formatter,
            leave: Leave::Nothing,
        })
    }
}

impl Drop for ArraySlot<'_> {
    fn drop(&mut self) {
        self.formatter.leave_array();
        self.leave.apply(&mut *self.formatter);
    }
}
