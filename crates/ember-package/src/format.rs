//! Package file layout.
//!
//! ```text
//! [PackageHeader]
//! [export payload 0] ... [export payload N-1]
//! [import table: ImportEntry * import_count]
//! [export table: ExportEntry * export_count]
//! ```
//!
//! Export payloads are tagged property streams whose object references are
//! package indices. Both tables sit after the payloads so the header can be
//! patched once everything else is written.

use ember_archive::{Archive, ArchiveError};

use crate::error::PackageError;
use crate::{FORMAT_VERSION, MAGIC};

/// Fixed-size file header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageHeader {
    /// Must equal [`MAGIC`].
    pub magic: [u8; 4],
    /// Must equal [`FORMAT_VERSION`].
    pub version: u32,
    /// Entries in the import table.
    pub import_count: u32,
    /// Entries in the export table.
    pub export_count: u32,
    /// Absolute position of the import table.
    pub import_table_offset: u64,
    /// Absolute position of the export table.
    pub export_table_offset: u64,
}

impl PackageHeader {
    /// Encoded size in bytes.
    pub const SIZE: u64 = 4 + 4 + 4 + 4 + 8 + 8;

    /// Header for the current format with empty tables.
    pub fn current() -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            ..Self::default()
        }
    }

    /// Write or read the header through `ar`.
    pub fn serialize(&mut self, ar: &mut dyn Archive) {
        ar.serialize_bytes(&mut self.magic);
        ar.serialize_u32(&mut self.version);
        ar.serialize_u32(&mut self.import_count);
        ar.serialize_u32(&mut self.export_count);
        ar.serialize_u64(&mut self.import_table_offset);
        ar.serialize_u64(&mut self.export_table_offset);
    }

    /// Check magic and version.
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.magic != MAGIC {
            return Err(PackageError::InvalidMagic { found: self.magic });
        }
        if self.version != FORMAT_VERSION {
            return Err(PackageError::UnsupportedVersion {
                found: self.version,
            });
        }
        Ok(())
    }
}

/// An object another package provides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportEntry {
    /// Name of the package exporting the object.
    pub package: String,
    /// Export name inside that package.
    pub object_name: String,
    /// Class the importer expects.
    pub class_name: String,
}

impl ImportEntry {
    /// Smallest possible encoding: three empty strings.
    pub const MIN_SIZE: u64 = 3 * 8;

    /// Write or read the entry through `ar`.
    pub fn serialize(&mut self, ar: &mut dyn Archive) {
        ar.serialize_string(&mut self.package);
        ar.serialize_string(&mut self.object_name);
        ar.serialize_string(&mut self.class_name);
    }
}

/// An object this package provides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportEntry {
    /// Export name, unique within the package.
    pub object_name: String,
    /// Registered class of the object.
    pub class_name: String,
    /// Absolute position of the payload.
    pub offset: u64,
    /// Payload length in bytes.
    pub size: u64,
}

impl ExportEntry {
    /// Smallest possible encoding: two empty strings and two `u64`s.
    pub const MIN_SIZE: u64 = 2 * 8 + 2 * 8;

    /// Write or read the entry through `ar`.
    pub fn serialize(&mut self, ar: &mut dyn Archive) {
        ar.serialize_string(&mut self.object_name);
        ar.serialize_string(&mut self.class_name);
        ar.serialize_u64(&mut self.offset);
        ar.serialize_u64(&mut self.size);
    }
}

/// Parsed header and tables of a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageTables {
    /// The header.
    pub header: PackageHeader,
    /// Import table.
    pub imports: Vec<ImportEntry>,
    /// Export table.
    pub exports: Vec<ExportEntry>,
}

/// Read and validate the header and tables of a package.
///
/// Table counts are checked against the data size before any table is
/// allocated, and every export payload must lie inside the data.
pub fn read_tables(ar: &mut dyn Archive) -> Result<PackageTables, PackageError> {
    let total = ar.total_size();
    if total < PackageHeader::SIZE {
        return Err(PackageError::Malformed {
            detail: format!("{total} bytes is smaller than the header"),
        });
    }
    let mut header = PackageHeader::default();
    header.serialize(ar);
    archive_result(ar)?;
    header.validate()?;

    let imports = read_table(
        ar,
        header.import_table_offset,
        header.import_count,
        ImportEntry::MIN_SIZE,
        "import",
        |entry: &mut ImportEntry, ar| entry.serialize(ar),
    )?;
    let exports = read_table(
        ar,
        header.export_table_offset,
        header.export_count,
        ExportEntry::MIN_SIZE,
        "export",
        |entry: &mut ExportEntry, ar| entry.serialize(ar),
    )?;

    for export in &exports {
        let in_bounds = export
            .offset
            .checked_add(export.size)
            .is_some_and(|end| export.offset >= PackageHeader::SIZE && end <= total);
        if !in_bounds {
            return Err(PackageError::Malformed {
                detail: format!(
                    "export '{}' payload {}+{} lies outside {total} bytes",
                    export.object_name, export.offset, export.size
                ),
            });
        }
    }

    Ok(PackageTables {
        header,
        imports,
        exports,
    })
}

fn read_table<T: Default>(
    ar: &mut dyn Archive,
    offset: u64,
    count: u32,
    min_size: u64,
    what: &str,
    mut read: impl FnMut(&mut T, &mut dyn Archive),
) -> Result<Vec<T>, PackageError> {
    let total = ar.total_size();
    let fits = offset <= total && u64::from(count) * min_size <= total - offset;
    if !fits {
        return Err(PackageError::Malformed {
            detail: format!("{what} table of {count} entries at {offset} exceeds {total} bytes"),
        });
    }
    ar.seek(offset);
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut entry = T::default();
        read(&mut entry, &mut *ar);
        archive_result(ar)?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Turn the archive's sticky error into a `Result`.
pub(crate) fn archive_result(ar: &dyn Archive) -> Result<(), ArchiveError> {
    match ar.error() {
        Some(e) => Err(e.clone()),
        None => Ok(()),
    }
}
