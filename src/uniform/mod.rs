//! Named uniform values and their binding onto programs.
//!
//! A [`UniformBag`] is the declarative per-pass input: built fresh for each
//! pass, consumed by [`binder::plan`] and then dropped.

use crate::gpu::texture::TextureId;

/// Uniform binding plans and bind group creation.
pub mod binder;

/// A tagged uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// A scalar.
    Float(f32),
    /// A two-component vector.
    Vec2([f32; 2]),
    /// A 2D texture handle.
    Texture2D(TextureId),
    /// A cubemap handle.
    Cubemap(TextureId),
}

impl UniformValue {
    /// The texture handle, for texture-valued entries.
    #[must_use]
    pub fn texture(self) -> Option<TextureId> {
        match self {
            Self::Texture2D(id) | Self::Cubemap(id) => Some(id),
            Self::Float(_) | Self::Vec2(_) => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        Self::Float(if v { 1.0 } else { 0.0 })
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(v)
    }
}

/// Name → value map with unique names, kept sorted by name.
///
/// Iteration is always in ascending byte order of the names, which is what
/// makes texture-unit assignment deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBag {
    entries: Vec<(String, UniformValue)>,
}

impl UniformBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`. Returns the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<UniformValue>,
    ) -> Option<UniformValue> {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .binary_search_by(|(n, _)| n.as_str().cmp(name.as_str()))
        {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            Err(i) => {
                self.entries.insert(i, (name, value));
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<UniformValue>,
    ) -> Self {
        let _ = self.insert(name, value);
        self
    }

    /// Look up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entries
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Entries in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, UniformValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Every texture handle in the bag, in name order.
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.entries.iter().filter_map(|(_, v)| v.texture())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<UniformValue>> FromIterator<(N, V)>
    for UniformBag
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (name, value) in iter {
            let _ = bag.insert(name, value);
        }
        bag
    }
}
