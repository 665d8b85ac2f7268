//! Collection types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agape_core::CollectionId;

/// A merchandising collection (e.g. "Kente Collection").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub featured: bool,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A collection with the number of active products in it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CollectionWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub collection: Collection,
    pub product_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollection {
    pub name: String,
    /// Derived from the name when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub color: Option<String>,
}

impl NewCollection {
    /// The explicit slug, or one derived from the name.
    #[must_use]
    pub fn resolved_slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => super::slugify(s),
            _ => super::slugify(&self.name),
        }
    }
}

/// Partial collection update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub featured: Option<bool>,
    pub color: Option<String>,
}

impl CollectionPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.featured.is_none()
            && self.color.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_collection_slug_from_name() {
        let input: NewCollection = serde_json::from_str(r#"{"name": "Bridal Lace"}"#).unwrap();
        assert_eq!(input.resolved_slug(), "bridal-lace");
        assert!(!input.featured);
    }

    #[test]
    fn test_patch_is_empty() {
        let patch: CollectionPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
        let patch: CollectionPatch = serde_json::from_str(r#"{"featured": true}"#).unwrap();
        assert!(!patch.is_empty());
    }
}
