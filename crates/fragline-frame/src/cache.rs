//! Format descriptors and the per-session version cache.

use std::fmt;
use std::sync::Arc;

use crate::error::{FrameError, Result};

/// Number of format version slots.
pub const VERSION_SLOTS: usize = 8;

/// A 3-bit format version index.
///
/// Version 0 belongs to the descriptor established at session setup.
/// Versions 1-7 are handed out round-robin for inlined descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FormatVersion(u8);

impl FormatVersion {
    /// The out-of-band (session setup) version.
    pub const OUT_OF_BAND: FormatVersion = FormatVersion(0);

    /// Highest valid version index.
    pub const MAX: u8 = 7;

    /// Create a version, rejecting values above 7.
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(FrameError::InvalidFormatVersion(value));
        }
        Ok(Self(value))
    }

    /// Take the low three bits of a header field.
    pub(crate) const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MAX)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// The version following this one in the in-band rotation (1..=7, skipping 0).
    pub const fn next_inline(self) -> Self {
        Self(self.0 % Self::MAX + 1)
    }

    fn slot(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, immutable description of a frame's format.
///
/// The protocol never looks inside; descriptors are compared only to decide
/// whether a new version must be announced. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FormatDescriptor(Arc<str>);

impl FormatDescriptor {
    pub fn new(descriptor: impl Into<Arc<str>>) -> Self {
        Self(descriptor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for FormatDescriptor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FormatDescriptor {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for FormatDescriptor {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Most recently announced descriptor for each of the 8 version slots.
///
/// Sender and receiver each own one; they stay consistent only through the
/// version indices carried on the wire.
#[derive(Debug, Clone, Default)]
pub struct FormatCache {
    slots: [Option<FormatDescriptor>; VERSION_SLOTS],
}

impl FormatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a slot, returning the descriptor it held before.
    pub fn store(
        &mut self,
        version: FormatVersion,
        descriptor: FormatDescriptor,
    ) -> Option<FormatDescriptor> {
        self.slots[version.slot()].replace(descriptor)
    }

    pub fn lookup(&self, version: FormatVersion) -> Option<&FormatDescriptor> {
        self.slots[version.slot()].as_ref()
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
