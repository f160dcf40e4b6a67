//! Tagged property serialization.
//!
//! A value described by a linked [`TypeRecord`] is stored as a property
//! count followed by one tagged entry per property:
//!
//! ```text
//! [count:u32] { [PropertyTag][payload] }*
//! ```
//!
//! Writing emits a placeholder tag, streams the payload, then seeks back to
//! patch the tag's offset and size and finally the count. Reading matches
//! each stored tag against the record by (type tag, name), expecting
//! declaration order but accepting any order, and skips entries it does not
//! recognise by their stored size. Every entry is left by seeking to
//! `payload_start + size`, so a payload routine that under- or over-reads
//! cannot desynchronise the rest of the stream.

use std::any::Any;

use ember_archive::{Archive, ArchiveError};

use crate::error::ReflectError;
use crate::property::Reflected;
use crate::record::TypeRecord;
use crate::registry::TypeRegistry;
use crate::tag::PropertyTag;

/// A stored property that loading did not match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedProperty {
    /// Dotted path of the property (`field` or `outer.field`).
    pub path: String,
    /// Stored type tag.
    pub type_tag: String,
    /// Stored payload size.
    pub size: i32,
}

/// What a tagged pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaggedReport {
    /// Dotted paths of properties written or loaded, in stream order.
    pub serialized: Vec<String>,
    /// Stored properties skipped while loading.
    pub skipped: Vec<SkippedProperty>,
}

impl TaggedReport {
    /// Whether the property at `path` was skipped.
    pub fn was_skipped(&self, path: &str) -> bool {
        self.skipped.iter().any(|s| s.path == path)
    }
}

/// State threaded through one tagged pass.
pub struct TaggedContext<'a> {
    registry: &'a TypeRegistry,
    report: TaggedReport,
    path: Vec<String>,
}

impl<'a> TaggedContext<'a> {
    /// Start a pass that resolves nested struct records in `registry`.
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            report: TaggedReport::default(),
            path: Vec::new(),
        }
    }

    /// Registry nested struct records are looked up in.
    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    /// Report so far.
    pub fn report(&self) -> &TaggedReport {
        &self.report
    }

    /// Finish the pass.
    pub fn into_report(self) -> TaggedReport {
        self.report
    }

    fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path.join("."))
        }
    }
}

/// Serialize `target`, an instance of `record`'s type, in either direction.
///
/// Errors are reported through the archive's error flag.
pub fn serialize_tagged(
    record: &TypeRecord,
    target: &mut dyn Any,
    ar: &mut dyn Archive,
    cx: &mut TaggedContext<'_>,
) {
    if record.type_id() != (*target).type_id() {
        log::error!("tagged: value is not a {}", record.name());
        ar.set_error(ArchiveError::Malformed {
            detail: format!("value is not a {}", record.name()),
        });
        return;
    }
    if ar.is_writing() {
        write_tagged(record, target, ar, cx);
    } else {
        read_tagged(record, target, ar, cx);
    }
}

fn write_tagged(record: &TypeRecord, target: &mut dyn Any, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>) {
    let count_position = ar.tell();
    let mut count = 0u32;
    ar.serialize_u32(&mut count);

    for property in record.properties() {
        let Some(field) = property.access(target) else {
            continue;
        };
        let tag_position = ar.tell();
        let mut tag = PropertyTag::new(property.type_tag(), property.name());
        tag.serialize(ar);

        let start = ar.tell();
        cx.path.push(property.name().to_string());
        property.serialize(field, ar, cx);
        cx.path.pop();
        let end = ar.tell();

        let Ok(size) = i32::try_from(end - start) else {
            ar.set_error(ArchiveError::LengthExceedsLimit {
                length: end - start,
                limit: i32::MAX as u64,
            });
            return;
        };
        tag.offset = start as i64;
        tag.size = size;
        ar.seek(tag_position);
        tag.serialize(ar);
        ar.seek(end);

        count += 1;
        let path = cx.qualify(property.name());
        cx.report.serialized.push(path);
    }

    let end = ar.tell();
    ar.seek(count_position);
    ar.serialize_u32(&mut count);
    ar.seek(end);
}

fn read_tagged(record: &TypeRecord, target: &mut dyn Any, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>) {
    let mut count = 0u32;
    ar.serialize_u32(&mut count);

    let properties = record.properties();
    let mut expected = 0;
    for _ in 0..count {
        let mut tag = PropertyTag::default();
        tag.serialize(ar);
        if ar.has_error() {
            return;
        }
        if tag.size < 0 {
            ar.set_error(ArchiveError::Malformed {
                detail: format!("property '{}' has negative size {}", tag.name, tag.size),
            });
            return;
        }
        let start = ar.tell();
        let end = start + tag.size as u64;

        let found = if properties
            .get(expected)
            .is_some_and(|p| p.matches(&tag.type_tag, &tag.name))
        {
            Some(expected)
        } else {
            properties
                .iter()
                .position(|p| p.matches(&tag.type_tag, &tag.name))
        };

        let field = match found {
            Some(index) => properties[index].access(target).map(|field| (index, field)),
            None => None,
        };
        match field {
            Some((index, field)) => {
                let property = &properties[index];
                expected = index + 1;
                cx.path.push(property.name().to_string());
                property.serialize(field, ar, cx);
                cx.path.pop();
                if ar.tell() != end && !ar.has_error() {
                    log::warn!(
                        "tagged: {}.{} read {} bytes of a {} byte payload",
                        record.name(),
                        tag.name,
                        ar.tell() as i64 - start as i64,
                        tag.size
                    );
                }
                let path = cx.qualify(property.name());
                cx.report.serialized.push(path);
            }
            None => {
                log::warn!(
                    "tagged: skipping unknown property {}.{} ({}, {} bytes)",
                    record.name(),
                    tag.name,
                    tag.type_tag,
                    tag.size
                );
                let path = cx.qualify(&tag.name);
                cx.report.skipped.push(SkippedProperty {
                    path,
                    type_tag: tag.type_tag,
                    size: tag.size,
                });
            }
        }

        if ar.has_error() {
            return;
        }
        ar.seek(end);
    }
}

/// Serialization routine for nested struct properties; used by
/// [`reflect_struct!`](crate::reflect_struct).
pub fn serialize_nested(value: &mut dyn Any, type_name: &str, ar: &mut dyn Archive, cx: &mut TaggedContext<'_>) {
    let registry = cx.registry();
    match registry.link(type_name) {
        Ok(record) => serialize_tagged(record, value, ar, cx),
        Err(e) => {
            log::error!("tagged: cannot serialize nested {type_name}: {e}");
            ar.set_error(ArchiveError::Malformed { detail: e.to_string() });
        }
    }
}

/// Serialize any reflected value through `ar` and check the archive's
/// error flag afterwards.
///
/// For a struct bound with [`reflect_struct!`](crate::reflect_struct) this
/// is a full tagged pass.
pub fn serialize_reflected<T: Reflected>(
    registry: &TypeRegistry,
    value: &mut T,
    ar: &mut dyn Archive,
) -> Result<TaggedReport, ReflectError> {
    let mut cx = TaggedContext::new(registry);
    value.serialize_value(ar, &mut cx);
    match ar.error() {
        Some(e) => Err(ReflectError::Archive(e.clone())),
        None => Ok(cx.into_report()),
    }
}
