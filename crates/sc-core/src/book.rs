//! Catalog metadata for a library book.
//!
//! Only the in-memory model lives here; persistence belongs to the catalog
//! service. [`BookMetadata::update`] reports whether the patch actually
//! changed anything so callers can skip persisting no-op updates.

use serde::{Deserialize, Deserializer, Serialize};

/// Descriptive metadata for a single book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookMetadata {
    pub olid: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub series: Option<String>,
    pub publish_year: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub genres: Vec<String>,
}

/// A partial update.
///
/// For every field: absent leaves the value untouched, `null` clears it,
/// anything else replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookUpdate {
    #[serde(deserialize_with = "present")]
    pub olid: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub author: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub series: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub publish_year: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub publisher: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub cover: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub genres: Option<Option<Vec<String>>>,
}

/// Maps a present field (including an explicit `null`) to `Some`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn apply<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl BookMetadata {
    /// Apply `patch` and return `true` iff at least one field changed.
    pub fn update(&mut self, patch: BookUpdate) -> bool {
        let mut changed = false;

        if let Some(v) = patch.olid {
            changed |= apply(&mut self.olid, v);
        }
        if let Some(v) = patch.title {
            changed |= apply(&mut self.title, v);
        }
        if let Some(v) = patch.author {
            changed |= apply(&mut self.author, v);
        }
        if let Some(v) = patch.series {
            changed |= apply(&mut self.series, v);
        }
        if let Some(v) = patch.publish_year {
            changed |= apply(&mut self.publish_year, v);
        }
        if let Some(v) = patch.publisher {
            changed |= apply(&mut self.publisher, v);
        }
        if let Some(v) = patch.description {
            changed |= apply(&mut self.description, v);
        }
        if let Some(v) = patch.cover {
            changed |= apply(&mut self.cover, v);
        }
        if let Some(genres) = patch.genres {
            changed |= apply(&mut self.genres, genres.unwrap_or_default());
        }

        changed
    }
}
