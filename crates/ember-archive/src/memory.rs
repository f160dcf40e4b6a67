//! In-memory archives.
//!
//! [`MemoryWriter`] grows a `Vec<u8>` and supports seeking backwards to
//! patch earlier bytes. [`MemoryReader`] reads any byte buffer; it is
//! generic over `B: AsRef<[u8]>` so it can borrow a slice or share an
//! `Arc<[u8]>`.

use crate::archive::{Archive, ArchiveMode};
use crate::config::ArchiveConfig;
use crate::error::ArchiveError;

/// Writing archive backed by a growable buffer.
///
/// # Examples
///
/// ```
/// use ember_archive::{Archive, MemoryReader, MemoryWriter};
///
/// let mut writer = MemoryWriter::new();
/// let mut count = 0u32;
/// writer.serialize_u32(&mut count);
/// let mut name = String::from("lamp");
/// writer.serialize_string(&mut name);
///
/// // Patch the placeholder written first.
/// let end = writer.tell();
/// writer.seek(0);
/// let mut count = 1u32;
/// writer.serialize_u32(&mut count);
/// writer.seek(end);
///
/// let bytes = writer.into_inner();
/// let mut reader = MemoryReader::new(bytes.as_slice());
/// let mut count = 0u32;
/// reader.serialize_u32(&mut count);
/// let mut name = String::new();
/// reader.serialize_string(&mut name);
/// assert_eq!((count, name.as_str()), (1, "lamp"));
/// assert!(!reader.has_error());
/// ```
#[derive(Debug, Default)]
pub struct MemoryWriter {
    buffer: Vec<u8>,
    position: usize,
    error: Option<ArchiveError>,
    config: ArchiveConfig,
}

impl MemoryWriter {
    /// Create an empty writer with the default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with the given config.
    pub fn with_config(config: ArchiveConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return its buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl Archive for MemoryWriter {
    fn mode(&self) -> ArchiveMode {
        ArchiveMode::Writing
    }

    fn serialize_bytes(&mut self, data: &mut [u8]) {
        let end = self.position + data.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(data);
        self.position = end;
    }

    fn seek(&mut self, position: u64) {
        // Seeking past the end is allowed; the gap is zero-filled by the
        // next write.
        self.position = position as usize;
    }

    fn tell(&self) -> u64 {
        self.position as u64
    }

    fn total_size(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn error(&self) -> Option<&ArchiveError> {
        self.error.as_ref()
    }

    fn set_error(&mut self, error: ArchiveError) {
        self.error.get_or_insert(error);
    }

    fn max_serialize_size(&self) -> u64 {
        self.config.max_serialize_size
    }
}

/// Reading archive over a byte buffer.
#[derive(Debug)]
pub struct MemoryReader<B: AsRef<[u8]>> {
    data: B,
    position: usize,
    error: Option<ArchiveError>,
    config: ArchiveConfig,
}

impl<B: AsRef<[u8]>> MemoryReader<B> {
    /// Create a reader over `data` with the default config.
    pub fn new(data: B) -> Self {
        Self::with_config(data, ArchiveConfig::default())
    }

    /// Create a reader over `data` with the given config.
    pub fn with_config(data: B, config: ArchiveConfig) -> Self {
        Self {
            data,
            position: 0,
            error: None,
            config,
        }
    }

    /// Consume the reader and return its buffer.
    pub fn into_inner(self) -> B {
        self.data
    }
}

impl<B: AsRef<[u8]>> Archive for MemoryReader<B> {
    fn mode(&self) -> ArchiveMode {
        ArchiveMode::Reading
    }

    fn serialize_bytes(&mut self, data: &mut [u8]) {
        if self.error.is_some() {
            data.fill(0);
            return;
        }
        let bytes = self.data.as_ref();
        let end = self.position.checked_add(data.len());
        match end {
            Some(end) if end <= bytes.len() => {
                data.copy_from_slice(&bytes[self.position..end]);
                self.position = end;
            }
            _ => {
                let total = bytes.len() as u64;
                data.fill(0);
                self.set_error(ArchiveError::UnexpectedEof {
                    position: self.position as u64,
                    requested: data.len() as u64,
                    total,
                });
            }
        }
    }

    fn seek(&mut self, position: u64) {
        let total = self.data.as_ref().len() as u64;
        if position > total {
            self.set_error(ArchiveError::SeekOutOfBounds { position, total });
            self.position = total as usize;
        } else {
            self.position = position as usize;
        }
    }

    fn tell(&self) -> u64 {
        self.position as u64
    }

    fn total_size(&self) -> u64 {
        self.data.as_ref().len() as u64
    }

    fn error(&self) -> Option<&ArchiveError> {
        self.error.as_ref()
    }

    fn set_error(&mut self, error: ArchiveError) {
        self.error.get_or_insert(error);
    }

    fn max_serialize_size(&self) -> u64 {
        self.config.max_serialize_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn written(f: impl FnOnce(&mut MemoryWriter)) -> Vec<u8> {
        let mut writer = MemoryWriter::new();
        f(&mut writer);
        assert!(!writer.has_error());
        writer.into_inner()
    }

    #[test]
    fn scalars_are_little_endian() {
        let bytes = written(|w| {
            w.serialize_u32(&mut 0x0102_0304);
            w.serialize_i16(&mut -2);
        });
        assert_eq!(bytes, [0x04, 0x03, 0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn bool_is_stored_as_u32() {
        let bytes = written(|w| w.serialize_bool(&mut true));
        assert_eq!(bytes, [1, 0, 0, 0]);
    }

    #[test]
    fn bool_greater_than_one_is_an_error() {
        let mut reader = MemoryReader::new(2u32.to_le_bytes());
        let mut value = true;
        reader.serialize_bool(&mut value);
        assert!(!value);
        assert_eq!(reader.error(), Some(&ArchiveError::InvalidBool { value: 2 }));
    }

    #[test]
    fn eof_sets_sticky_error_and_zero_fills() {
        let mut reader = MemoryReader::new([1u8, 2]);
        let mut value = 7u32;
        reader.serialize_u32(&mut value);
        assert_eq!(value, 0);
        assert!(matches!(
            reader.error(),
            Some(ArchiveError::UnexpectedEof { requested: 4, .. })
        ));

        // Subsequent reads keep the first error and yield zeroes.
        let mut byte = 9u8;
        reader.serialize_u8(&mut byte);
        assert_eq!(byte, 0);
        assert!(matches!(
            reader.error(),
            Some(ArchiveError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn oversized_string_length_aborts_without_allocating() {
        let mut data = u64::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(b"abc");
        let mut reader = MemoryReader::new(data);
        let mut s = String::from("previous");
        reader.serialize_string(&mut s);
        assert!(s.is_empty());
        assert!(matches!(
            reader.error(),
            Some(ArchiveError::LengthExceedsLimit { length: u64::MAX, .. })
        ));
    }

    #[test]
    fn configured_ceiling_is_enforced() {
        let mut data = 10u64.to_le_bytes().to_vec();
        data.extend_from_slice(&[b'x'; 10]);
        let mut reader = MemoryReader::with_config(data, ArchiveConfig::new(4));
        let mut s = String::new();
        reader.serialize_string(&mut s);
        assert_eq!(
            reader.error(),
            Some(&ArchiveError::LengthExceedsLimit {
                length: 10,
                limit: 4
            })
        );
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut data = 2u64.to_le_bytes().to_vec();
        data.extend_from_slice(&[0xC3, 0x28]);
        let mut reader = MemoryReader::new(data);
        let mut s = String::new();
        reader.serialize_string(&mut s);
        assert_eq!(reader.error(), Some(&ArchiveError::InvalidUtf8 { position: 8 }));
    }

    #[test]
    fn writer_seek_patches_in_place() {
        let mut writer = MemoryWriter::new();
        writer.serialize_u64(&mut 0);
        writer.serialize_u8(&mut 0xAA);
        writer.seek(0);
        writer.serialize_u64(&mut 5);
        writer.seek(9);
        assert_eq!(writer.total_size(), 9);
        assert_eq!(&writer.as_bytes()[..8], &5u64.to_le_bytes());
        assert_eq!(writer.as_bytes()[8], 0xAA);
    }

    #[test]
    fn reader_seek_past_end_is_an_error() {
        let mut reader = MemoryReader::new(vec![0u8; 4]);
        reader.seek(5);
        assert_eq!(
            reader.error(),
            Some(&ArchiveError::SeekOutOfBounds {
                position: 5,
                total: 4
            })
        );
    }

    #[test]
    fn plain_archives_reject_object_references() {
        let mut writer = MemoryWriter::new();
        writer.serialize_object(&mut None);
        assert_eq!(
            writer.error(),
            Some(&ArchiveError::ObjectReferencesUnsupported)
        );
    }

    proptest! {
        #[test]
        fn string_round_trip(s in ".{0,64}") {
            let mut original = s.clone();
            let bytes = written(|w| w.serialize_string(&mut original));
            let mut reader = MemoryReader::new(bytes);
            let mut decoded = String::new();
            reader.serialize_string(&mut decoded);
            prop_assert!(!reader.has_error());
            prop_assert_eq!(decoded, s);
        }

        #[test]
        fn truncated_input_never_panics(data in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut reader = MemoryReader::new(data);
            let mut s = String::new();
            let mut n = 0u64;
            reader.serialize_string(&mut s);
            let mut flag = false;
            reader.serialize_u64(&mut n);
            reader.serialize_bool(&mut flag);
        }
    }
}
