//! Part resolution collaborator.
//!
//! The core never reads part files. Whatever needs geometry for a reference
//! name (synthesis, dimensions, the missing-pieces check) asks a
//! [`PartLibrary`] passed in by the caller.

use std::collections::HashMap;

use thiserror::Error;

use crate::geometry::BoundingBox;

/// Opaque handle to resolved part geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartHandle(u32);

impl PartHandle {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPart {
    handle: PartHandle,
    bounds: BoundingBox,
}

impl ResolvedPart {
    pub fn new(handle: PartHandle, bounds: BoundingBox) -> Self {
        Self { handle, bounds }
    }

    pub fn handle(&self) -> PartHandle {
        self.handle
    }

    /// Bounding box in the part's own space
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartLibraryError {
    #[error("unresolved part `{0}`")]
    UnresolvedPart(String),
}

/// Looks up part geometry by reference name.
pub trait PartLibrary {
    /// Resolves a lower-case reference name.
    ///
    /// # Errors
    ///
    /// Returns [`PartLibraryError::UnresolvedPart`] when the library has no
    /// such part. Callers degrade per part and never abort on this error.
    fn resolve(&self, reference_name: &str) -> Result<ResolvedPart, PartLibraryError>;
}

/// Returns the lookup key for a part name: lower case, forward slashes.
///
/// # Examples
///
/// ```
/// # use brickyard_core::part_library::reference_name;
/// assert_eq!(reference_name("S\\3001S01.DAT"), "s/3001s01.dat");
/// ```
pub fn reference_name(display_name: &str) -> String {
    display_name.to_lowercase().replace('\\', "/")
}

/// An in-memory part library keyed by reference name.
#[derive(Debug, Default, Clone)]
pub struct PartCatalog {
    entries: HashMap<String, ResolvedPart>,
}

impl PartCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a part, returning its handle.
    pub fn insert(&mut self, name: &str, bounds: BoundingBox) -> PartHandle {
        let key = reference_name(name);
        let handle = match self.entries.get(&key) {
            Some(existing) => existing.handle,
            None => PartHandle::new(self.entries.len() as u32),
        };
        self.entries.insert(key, ResolvedPart::new(handle, bounds));
        handle
    }

    /// Builder-style variant of [`PartCatalog::insert`].
    pub fn with_part(mut self, name: &str, bounds: BoundingBox) -> Self {
        self.insert(name, bounds);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartLibrary for PartCatalog {
    fn resolve(&self, name: &str) -> Result<ResolvedPart, PartLibraryError> {
        self.entries
            .get(&reference_name(name))
            .copied()
            .ok_or_else(|| PartLibraryError::UnresolvedPart(name.to_string()))
    }
}
