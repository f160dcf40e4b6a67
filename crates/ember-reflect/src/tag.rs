//! On-wire property tags.

use ember_archive::Archive;

/// Header written in front of every serialized property.
///
/// Layout: `[type_tag:string][name:string][offset:i64][size:i32]`, followed
/// by `size` bytes of payload starting at absolute position `offset`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyTag {
    /// Stable tag of the property type.
    pub type_tag: String,
    /// Property name.
    pub name: String,
    /// Absolute archive position of the payload.
    pub offset: i64,
    /// Payload length in bytes.
    pub size: i32,
}

impl PropertyTag {
    /// Tag for a property whose payload has not been written yet.
    pub fn new(type_tag: &str, name: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            name: name.to_string(),
            offset: 0,
            size: 0,
        }
    }

    /// Write or read the tag through `ar`.
    pub fn serialize(&mut self, ar: &mut dyn Archive) {
        ar.serialize_string(&mut self.type_tag);
        ar.serialize_string(&mut self.name);
        ar.serialize_i64(&mut self.offset);
        ar.serialize_i32(&mut self.size);
    }
}
