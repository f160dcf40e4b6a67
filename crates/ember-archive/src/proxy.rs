//! Proxy archives.
//!
//! A proxy wraps another archive and forwards every operation to it
//! unchanged. Specialized proxies implement [`ArchiveProxy`] and override
//! only the hook they care about; the blanket [`Archive`] impl does the
//! forwarding.

use ember_arena::ObjectPtr;

use crate::archive::{Archive, ArchiveMode};
use crate::error::ArchiveError;

/// An archive that delegates to an inner archive.
pub trait ArchiveProxy {
    /// The wrapped archive.
    fn inner(&self) -> &dyn Archive;

    /// The wrapped archive, mutably.
    fn inner_mut(&mut self) -> &mut dyn Archive;

    /// Hook for object references. Forwards by default.
    fn proxy_serialize_object(&mut self, object: &mut Option<ObjectPtr>) {
        self.inner_mut().serialize_object(object);
    }
}

macro_rules! forward {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            fn $name(&mut self, value: &mut $ty) {
                self.inner_mut().$name(value);
            }
        )*
    };
}

impl<P: ArchiveProxy> Archive for P {
    fn mode(&self) -> ArchiveMode {
        self.inner().mode()
    }

    fn serialize_bytes(&mut self, data: &mut [u8]) {
        self.inner_mut().serialize_bytes(data);
    }

    fn seek(&mut self, position: u64) {
        self.inner_mut().seek(position);
    }

    fn tell(&self) -> u64 {
        self.inner().tell()
    }

    fn total_size(&self) -> u64 {
        self.inner().total_size()
    }

    fn error(&self) -> Option<&ArchiveError> {
        self.inner().error()
    }

    fn set_error(&mut self, error: ArchiveError) {
        self.inner_mut().set_error(error);
    }

    fn max_serialize_size(&self) -> u64 {
        self.inner().max_serialize_size()
    }

    fn serialize_len(&mut self, len: &mut u64) -> bool {
        self.inner_mut().serialize_len(len)
    }

    forward!(
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

    fn serialize_object(&mut self, object: &mut Option<ObjectPtr>) {
        self.proxy_serialize_object(object);
    }
}

/// The plain proxy: forwards everything unchanged.
pub struct ProxyArchive<'a> {
    inner: &'a mut dyn Archive,
}

impl<'a> ProxyArchive<'a> {
    /// Wrap `inner`.
    pub fn new(inner: &'a mut dyn Archive) -> Self {
        Self { inner }
    }
}

impl ArchiveProxy for ProxyArchive<'_> {
    fn inner(&self) -> &dyn Archive {
        &*self.inner
    }

    fn inner_mut(&mut self) -> &mut dyn Archive {
        &mut *self.inner
    }
}
