//! Image assets and the ordered set handed to an export.

use crate::error::{ConvertError, Result};

/// One raw image blob. Nothing is decoded until export time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Images in drop order. Duplicates are allowed; identity is position.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    items: Vec<ImageAsset>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one image at the end.
    pub fn push(&mut self, asset: ImageAsset) {
        self.items.push(asset);
    }

    /// Remove the image at `index`, shifting later images down.
    pub fn remove(&mut self, index: usize) -> Result<ImageAsset> {
        if index >= self.items.len() {
            return Err(ConvertError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&ImageAsset> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageAsset> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total size of all blobs in bytes.
    pub fn total_bytes(&self) -> usize {
        self.items.iter().map(ImageAsset::len).sum()
    }
}

impl Extend<ImageAsset> for ImageSet {
    fn extend<I: IntoIterator<Item = ImageAsset>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl FromIterator<ImageAsset> for ImageSet {
    fn from_iter<I: IntoIterator<Item = ImageAsset>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ImageSet {
    type Item = &'a ImageAsset;
    type IntoIter = std::slice::Iter<'a, ImageAsset>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
