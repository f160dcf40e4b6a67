//! The bidirectional [`Archive`] contract.
//!
//! One code path serves both directions: a routine hands the archive a
//! mutable reference to a value, and the archive either writes it out or
//! overwrites it with what it reads. Every multi-byte scalar is stored
//! little-endian.

use ember_arena::ObjectPtr;

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;

/// Direction of an archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Values are overwritten with data from the archive.
    Reading,
    /// Values are copied into the archive.
    Writing,
}

macro_rules! scalar_method {
    ($(#[$meta:meta])* $name:ident, $ty:ty) => {
        $(#[$meta])*
        fn $name(&mut self, value: &mut $ty) {
            let mut bytes = value.to_le_bytes();
            self.serialize_bytes(&mut bytes);
            if self.is_reading() {
                *value = <$ty>::from_le_bytes(bytes);
            }
        }
    };
}

/// A seekable, bidirectional byte stream with a sticky error flag.
///
/// Implementors provide the byte-level operations; the typed overloads are
/// provided on top of [`serialize_bytes`](Archive::serialize_bytes) and may
/// be overridden by wrappers that need to see them.
///
/// Once an error is recorded, reads yield zeroed data and the first error
/// is kept. Callers check [`error`](Archive::error) after a complete pass.
pub trait Archive {
    /// Direction of this archive.
    fn mode(&self) -> ArchiveMode;

    /// Copy `data` out (writing) or fill it from the archive (reading).
    fn serialize_bytes(&mut self, data: &mut [u8]);

    /// Move the cursor to an absolute byte position.
    fn seek(&mut self, position: u64);

    /// Current absolute byte position.
    fn tell(&self) -> u64;

    /// Total size of the underlying data in bytes.
    fn total_size(&self) -> u64;

    /// The first error recorded, if any.
    fn error(&self) -> Option<&ArchiveError>;

    /// Record an error. Ignored if one is already recorded.
    fn set_error(&mut self, error: ArchiveError);

    /// Largest length prefix a read will accept.
    fn max_serialize_size(&self) -> u64 {
        ArchiveConfig::DEFAULT_MAX_SERIALIZE_SIZE
    }

    /// Whether values are being read from the archive.
    fn is_reading(&self) -> bool {
        self.mode() == ArchiveMode::Reading
    }

    /// Whether values are being written to the archive.
    fn is_writing(&self) -> bool {
        self.mode() == ArchiveMode::Writing
    }

    /// Whether an error has been recorded.
    fn has_error(&self) -> bool {
        self.error().is_some()
    }

    /// Bytes between the cursor and the end of the data.
    fn remaining(&self) -> u64 {
        self.total_size().saturating_sub(self.tell())
    }

    scalar_method!(
        /// Serialize a `u8`.
        serialize_u8, u8
    );
    scalar_method!(
        /// Serialize an `i8`.
        serialize_i8, i8
    );
    scalar_method!(
        /// Serialize a little-endian `u16`.
        serialize_u16, u16
    );
    scalar_method!(
        /// Serialize a little-endian `i16`.
        serialize_i16, i16
    );
    scalar_method!(
        /// Serialize a little-endian `u32`.
        serialize_u32, u32
    );
    scalar_method!(
        /// Serialize a little-endian `i32`.
        serialize_i32, i32
    );
    scalar_method!(
        /// Serialize a little-endian `u64`.
        serialize_u64, u64
    );
    scalar_method!(
        /// Serialize a little-endian `i64`.
        serialize_i64, i64
    );
    scalar_method!(
        /// Serialize a little-endian `f32`.
        serialize_f32, f32
    );
    scalar_method!(
        /// Serialize a little-endian `f64`.
        serialize_f64, f64
    );

    /// Serialize a `bool` as a `u32`. Reading any value other than 0 or 1
    /// records [`ArchiveError::InvalidBool`].
    fn serialize_bool(&mut self, value: &mut bool) {
        let mut raw = u32::from(*value);
        self.serialize_u32(&mut raw);
        if self.is_reading() {
            if raw > 1 {
                self.set_error(ArchiveError::InvalidBool { value: raw });
                *value = false;
            } else {
                *value = raw == 1;
            }
        }
    }

    /// Serialize a `u64` length prefix.
    ///
    /// When reading, the length is checked against
    /// [`max_serialize_size`](Archive::max_serialize_size) and against the
    /// bytes remaining before the caller allocates anything. On failure the
    /// error flag is set, `len` is zeroed and `false` is returned: the
    /// caller must abandon the value.
    fn serialize_len(&mut self, len: &mut u64) -> bool {
        self.serialize_u64(len);
        if self.has_error() {
            *len = 0;
            return false;
        }
        if self.is_reading() {
            let limit = self.max_serialize_size().min(self.remaining());
            if *len > limit {
                log::error!(
                    "archive: length {} at {} exceeds limit {}",
                    len,
                    self.tell(),
                    limit
                );
                self.set_error(ArchiveError::LengthExceedsLimit {
                    length: *len,
                    limit,
                });
                *len = 0;
                return false;
            }
        }
        true
    }

    /// Serialize a UTF-8 string as a `u64` byte length and the bytes.
    fn serialize_string(&mut self, value: &mut String) {
        if self.is_writing() {
            let mut len = value.len() as u64;
            self.serialize_len(&mut len);
            let mut bytes = value.as_bytes().to_vec();
            self.serialize_bytes(&mut bytes);
            return;
        }

        let mut len = 0u64;
        if !self.serialize_len(&mut len) {
            value.clear();
            return;
        }
        let position = self.tell();
        let mut bytes = vec![0u8; len as usize];
        self.serialize_bytes(&mut bytes);
        match String::from_utf8(bytes) {
            Ok(s) => *value = s,
            Err(_) => {
                self.set_error(ArchiveError::InvalidUtf8 { position });
                value.clear();
            }
        }
    }

    /// Serialize a reference to an arena object.
    ///
    /// Plain byte archives cannot represent object identity; they record
    /// [`ArchiveError::ObjectReferencesUnsupported`]. Archives that can
    /// (such as [`PackageIndexArchive`](crate::PackageIndexArchive))
    /// override this.
    fn serialize_object(&mut self, object: &mut Option<ObjectPtr>) {
        let _ = object;
        log::error!("archive: object reference serialized through a plain byte archive");
        self.set_error(ArchiveError::ObjectReferencesUnsupported);
    }
}
