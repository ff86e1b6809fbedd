//! Product Models

use std::collections::BTreeMap;

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{money::CurrencyCode, uuids::TypedUuid};

/// Product UUID
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Variant UUID
pub type VariantUuid = TypedUuid<VariantRecord>;

/// Marker for category ids. Category CRUD lives outside this core; products
/// and tax/coupon rules only reference categories by id.
#[derive(Debug, Clone, Copy)]
pub struct Category;

/// Category UUID
pub type CategoryUuid = TypedUuid<Category>;

/// A sellable product. When variants exist, per-variant price and stock
/// override the parent's.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub uuid: ProductUuid,
    pub name: String,
    pub sku: String,
    pub slug: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub is_active: bool,
    pub is_published: bool,
    /// When false, stock is not tracked and quantity is advisory only.
    pub track_quantity: bool,
    pub quantity: u32,
    pub categories: Vec<CategoryUuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProductRecord {
    /// Whether this product, on its own stock, can satisfy an order for
    /// `quantity` units.
    #[must_use]
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.is_active
            && self.is_published
            && (!self.track_quantity || self.quantity >= quantity)
    }
}

/// A purchasable variation of a product (size, colour, ...).
#[derive(Debug, Clone)]
pub struct VariantRecord {
    pub uuid: VariantUuid,
    pub product_uuid: ProductUuid,
    pub sku: String,
    /// Overrides the parent product price when set.
    pub price: Option<Decimal>,
    pub attributes: BTreeMap<String, String>,
    pub is_active: bool,
    pub quantity: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VariantRecord {
    /// Whether this variant can satisfy `quantity` units. Variants inherit
    /// the parent's `track_quantity` flag.
    #[must_use]
    pub fn can_supply(&self, quantity: u32, track_quantity: bool) -> bool {
        self.is_active && (!track_quantity || self.quantity >= quantity)
    }
}

/// New Product Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    pub sku: String,
    pub slug: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub is_active: bool,
    pub is_published: bool,
    pub track_quantity: bool,
    pub quantity: u32,
    pub categories: Vec<CategoryUuid>,
}

/// New Variant Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub uuid: VariantUuid,
    pub product_uuid: ProductUuid,
    pub sku: String,
    pub price: Option<Decimal>,
    pub attributes: BTreeMap<String, String>,
    pub is_active: bool,
    pub quantity: u32,
}

/// The row whose stock an inventory operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockTarget {
    Product(ProductUuid),
    Variant(VariantUuid),
}

/// Denormalized copy of display fields, embedded in cart and order lines so
/// historical display survives later product edits or deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub sku: String,
    pub slug: String,
    pub image: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ProductSnapshot {
    /// Captures the line-item snapshot for a product, preferring the
    /// variant's sku and attributes when one is involved.
    #[must_use]
    pub fn capture(product: &ProductRecord, variant: Option<&VariantRecord>) -> Self {
        Self {
            name: product.name.clone(),
            sku: variant.map_or_else(|| product.sku.clone(), |v| v.sku.clone()),
            slug: product.slug.clone(),
            image: product.image.clone(),
            attributes: variant.map(|v| v.attributes.clone()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(track_quantity: bool, quantity: u32) -> ProductRecord {
        let now = Timestamp::now();

        ProductRecord {
            uuid: ProductUuid::random(),
            name: "Desk Lamp".to_string(),
            sku: "LAMP-01".to_string(),
            slug: "desk-lamp".to_string(),
            image: None,
            price: Decimal::new(2500, 2),
            currency: CurrencyCode::usd(),
            is_active: true,
            is_published: true,
            track_quantity,
            quantity,
            categories: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn untracked_product_always_supplies() {
        let product = product(false, 0);

        assert!(product.can_supply(10_000));
    }

    #[test]
    fn tracked_product_supplies_up_to_quantity() {
        let product = product(true, 3);

        assert!(product.can_supply(3));
        assert!(!product.can_supply(4));
    }

    #[test]
    fn inactive_product_never_supplies() {
        let mut product = product(true, 10);
        product.is_active = false;

        assert!(!product.can_supply(1));
    }

    #[test]
    fn unpublished_product_never_supplies() {
        let mut product = product(true, 10);
        product.is_published = false;

        assert!(!product.can_supply(1));
    }

    #[test]
    fn snapshot_prefers_variant_sku_and_attributes() {
        let product = product(true, 5);

        let variant = VariantRecord {
            uuid: VariantUuid::random(),
            product_uuid: product.uuid,
            sku: "LAMP-01-RED".to_string(),
            price: None,
            attributes: BTreeMap::from([("colour".to_string(), "red".to_string())]),
            is_active: true,
            quantity: 5,
            created_at: product.created_at,
            updated_at: product.updated_at,
        };

        let snapshot = ProductSnapshot::capture(&product, Some(&variant));

        assert_eq!(snapshot.sku, "LAMP-01-RED");
        assert_eq!(snapshot.name, "Desk Lamp");
        assert_eq!(
            snapshot.attributes.get("colour").map(String::as_str),
            Some("red")
        );
    }
}
