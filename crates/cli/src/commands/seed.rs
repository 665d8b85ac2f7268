//! Seed the catalog from a YAML file.
//!
//! Collections are created first so products can reference them by slug.
//! Without `--skip-existing`, a collection slug or product SKU that is
//! already in the database aborts the run.
//!
//! ```yaml
//! collections:
//!   - name: Royal Collection
//!     slug: royal-collection
//!     featured: true
//! products:
//!   - sku: KNT-001
//!     title: Royal Asante Kente
//!     price: "450.00"
//!     inventory: 8
//!     collection: royal-collection
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info, warn};

use agape_core::CollectionId;
use agape_storefront::db::{CollectionRepository, ProductRepository, RepositoryError};
use agape_storefront::models::{NewCollection, NewProduct};

/// Top-level shape of a catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub collections: Vec<NewCollection>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

/// A product plus the slug of the collection it belongs to.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub collection: Option<String>,
    #[serde(flatten)]
    pub product: NewProduct,
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub collections_created: usize,
    pub collections_skipped: usize,
    pub products_created: usize,
    pub products_skipped: usize,
}

/// Check a catalog before touching the database.
///
/// Returns one message per problem: invalid products, duplicate slugs or
/// SKUs within the file, and blank collection names.
#[must_use]
pub fn validate_catalog(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut slugs = HashSet::new();
    for collection in &catalog.collections {
        if collection.name.trim().is_empty() {
            errors.push("collection with a blank name".to_string());
            continue;
        }
        let slug = collection.resolved_slug();
        if !slugs.insert(slug.clone()) {
            errors.push(format!("duplicate collection slug: {slug}"));
        }
    }

    let mut skus = HashSet::new();
    let mut product_slugs = HashSet::new();
    for seed in &catalog.products {
        let product = &seed.product;
        if let Err(msg) = product.validate() {
            errors.push(format!("{}: {msg}", product.sku));
        }
        if !skus.insert(product.sku.trim().to_owned()) {
            errors.push(format!("duplicate SKU: {}", product.sku));
        }
        let slug = product.resolved_slug();
        if !product_slugs.insert(slug.clone()) {
            errors.push(format!("duplicate product slug: {slug}"));
        }
    }

    errors
}

/// Seed collections and products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file can't be read or fails validation, the
/// database is unreachable, or (without `skip_existing`) an entry already
/// exists.
pub async fn catalog(
    file_path: &str,
    skip_existing: bool,
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    info!(
        collections = catalog.collections.len(),
        products = catalog.products.len(),
        "Parsed catalog"
    );

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = super::connect().await?;
    let mut summary = SeedSummary::default();

    let collection_ids = seed_collections(&pool, &catalog, skip_existing, &mut summary).await?;
    seed_products(&pool, &catalog, &collection_ids, skip_existing, &mut summary).await?;

    info!("Seeding complete!");
    info!(
        "  Collections: {} created, {} skipped",
        summary.collections_created, summary.collections_skipped
    );
    info!(
        "  Products: {} created, {} skipped",
        summary.products_created, summary.products_skipped
    );

    pool.close().await;
    Ok(summary)
}

async fn seed_collections(
    pool: &PgPool,
    catalog: &CatalogFile,
    skip_existing: bool,
    summary: &mut SeedSummary,
) -> Result<HashMap<String, CollectionId>, Box<dyn std::error::Error>> {
    let repo = CollectionRepository::new(pool);
    let mut ids = HashMap::new();

    for collection in &catalog.collections {
        let slug = collection.resolved_slug();

        if let Some(existing) = repo.get_by_slug(&slug).await? {
            if !skip_existing {
                return Err(format!("Collection {slug} already exists").into());
            }
            info!("Collection {slug} already exists, skipping...");
            ids.insert(slug, existing.collection.id);
            summary.collections_skipped += 1;
            continue;
        }

        let created = repo.create(collection, &slug).await?;
        info!("Created collection: {}", created.name);
        ids.insert(slug, created.id);
        summary.collections_created += 1;
    }

    Ok(ids)
}

async fn seed_products(
    pool: &PgPool,
    catalog: &CatalogFile,
    collection_ids: &HashMap<String, CollectionId>,
    skip_existing: bool,
    summary: &mut SeedSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = ProductRepository::new(pool);
    let collections = CollectionRepository::new(pool);

    for seed in &catalog.products {
        let mut product = seed.product.clone();

        if repo.sku_exists(&product.sku).await? {
            if !skip_existing {
                return Err(format!("Product {} already exists", product.sku).into());
            }
            info!("Product {} already exists, skipping...", product.sku);
            summary.products_skipped += 1;
            continue;
        }

        if let Some(collection_slug) = seed.collection.as_deref() {
            product.collection_id = match collection_ids.get(collection_slug) {
                Some(id) => Some(*id),
                None => collections
                    .get_by_slug(collection_slug)
                    .await?
                    .map(|c| c.collection.id),
            };
            if product.collection_id.is_none() {
                warn!(
                    sku = %product.sku,
                    collection = %collection_slug,
                    "Unknown collection, creating product without one"
                );
            }
        }

        let slug = product.resolved_slug();
        match repo.create(&product, &slug, None).await {
            Ok(created) => {
                info!("Created product: {}", created.title);
                summary.products_created += 1;
            }
            Err(RepositoryError::Conflict(msg)) if skip_existing => {
                info!("Product {} skipped: {msg}", product.sku);
                summary.products_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
collections:
  - name: Royal Collection
    slug: royal-collection
    featured: true
  - name: Everyday Elegance
products:
  - sku: KNT-001
    title: Royal Asante Kente
    price: "450.00"
    inventory: 8
    tags: [Handwoven, Royal]
    collection: royal-collection
    metadata:
      is_featured: true
  - sku: LACE-001
    title: Beaded Lace Black
    price: "1200.00"
    images:
      - url: /beaded-lace-style-black1.jpeg
        altText: Beaded Lace Black - Style
"#;

    #[test]
    fn test_parses_catalog_file() {
        let catalog: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        assert_eq!(catalog.collections.len(), 2);
        assert_eq!(catalog.collections[1].resolved_slug(), "everyday-elegance");
        assert_eq!(catalog.products.len(), 2);
        assert_eq!(
            catalog.products[0].collection.as_deref(),
            Some("royal-collection")
        );
        assert_eq!(catalog.products[0].product.inventory, 8);
        assert_eq!(catalog.products[1].product.images.len(), 1);
        assert!(validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn test_rejects_duplicates_within_file() {
        let yaml = r#"
collections:
  - name: Wedding
  - name: wedding
products:
  - sku: KNT-001
    title: One
    price: "10"
  - sku: KNT-001
    title: Two
    price: "10"
"#;
        let catalog: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        let errors = validate_catalog(&catalog);
        assert!(errors.contains(&"duplicate collection slug: wedding".to_string()));
        assert!(errors.contains(&"duplicate SKU: KNT-001".to_string()));
    }

    #[test]
    fn test_reports_invalid_products() {
        let yaml = r#"
products:
  - sku: KNT-009
    title: Negative
    price: "-1"
"#;
        let catalog: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            validate_catalog(&catalog),
            vec!["KNT-009: Price must not be negative".to_string()]
        );
    }

    #[test]
    fn test_bundled_catalog_is_valid() {
        let content = include_str!("../../../../seed/catalog.yaml");
        let catalog: CatalogFile = serde_yaml::from_str(content).unwrap();
        assert!(!catalog.products.is_empty());
        assert!(validate_catalog(&catalog).is_empty());
    }
}
