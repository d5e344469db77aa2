//! Product entity
//!
//! Maps one-to-one onto the `products` row. The nested pricing shapes are
//! JSONB columns decoded through [`sqlx::types::Json`]; everything that
//! reasons about price or stock goes through the tagged [`Catalog`] view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::catalog::{Catalog, FlatOffer, LegacyMap, Selection, StockError, VariantMap};

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub variants: Json<VariantMap>,
    pub conditions: Json<LegacyMap>,
    pub price: f64,
    pub stock: i64,
    pub colors: Vec<String>,
    pub available_storages: Vec<String>,
    pub sold_count: i64,
    pub is_best_seller: bool,
    pub best_seller_order: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The authoritative pricing shape for this product.
    pub fn catalog(&self) -> Catalog {
        Catalog::from_parts(
            &self.variants,
            &self.conditions,
            FlatOffer { price: self.price, stock: self.stock, colors: self.colors.clone() },
        )
    }

    pub fn lowest_price(&self) -> f64 {
        self.catalog().lowest_price().unwrap_or(self.price)
    }

    pub fn in_stock(&self) -> bool {
        self.catalog().in_stock()
    }

    /// Drop unpurchasable data before a write: colors with negative stock,
    /// variant leaves without a price or any color left, then storages with
    /// no leaves. `available_storages` is recomputed so it can never drift
    /// from the variant keys.
    pub fn normalize(&mut self) {
        for by_condition in self.variants.0.values_mut() {
            for leaf in by_condition.values_mut() {
                leaf.colors.retain(|c| c.stock >= 0);
            }
            by_condition.retain(|_, leaf| leaf.price > 0.0 && !leaf.colors.is_empty());
        }
        self.variants.0.retain(|_, by_condition| !by_condition.is_empty());
        self.available_storages = self.variants.0.keys().map(|s| s.code().to_string()).collect();
    }

    /// Apply a pure stock decrement and bump `sold_count` by the quantity.
    /// All three models count sales the same way.
    pub fn apply_decrease(&mut self, sel: &Selection, quantity: i64) -> Result<(), StockError> {
        let next = self.catalog().decrease(sel, quantity)?;
        self.store_catalog(next);
        self.sold_count += quantity;
        Ok(())
    }

    /// Compensating counterpart of [`Product::apply_decrease`].
    pub fn apply_increase(&mut self, sel: &Selection, quantity: i64) -> Result<(), StockError> {
        let next = self.catalog().increase(sel, quantity)?;
        self.store_catalog(next);
        self.sold_count = (self.sold_count - quantity).max(0);
        Ok(())
    }

    fn store_catalog(&mut self, catalog: Catalog) {
        match catalog {
            Catalog::Variants(map) => self.variants = Json(map),
            Catalog::Legacy(map) => self.conditions = Json(map),
            Catalog::Flat(offer) => {
                self.price = offer.price;
                self.stock = offer.stock;
                self.colors = offer.colors;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{
        ColorStock, ConditionCode, Storage, VariantCondition, VariantLeaf,
    };
    use std::collections::BTreeMap;

    fn base_product() -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "iPhone 13".into(),
            description: None,
            brand: Some("Apple".into()),
            image_url: None,
            variants: Json(BTreeMap::new()),
            conditions: Json(BTreeMap::new()),
            price: 0.0,
            stock: 0,
            colors: vec![],
            available_storages: vec![],
            sold_count: 0,
            is_best_seller: false,
            best_seller_order: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn with_variants(leaves: &[(Storage, VariantCondition, f64, &[(&str, i64)])]) -> Product {
        let mut product = base_product();
        for (storage, condition, price, colors) in leaves {
            product
                .variants
                .0
                .entry(*storage)
                .or_default()
                .insert(
                    *condition,
                    VariantLeaf {
                        price: *price,
                        public_price: None,
                        colors: colors
                            .iter()
                            .map(|(n, s)| ColorStock { name: (*n).into(), stock: *s })
                            .collect(),
                    },
                );
        }
        product.normalize();
        product
    }

    fn variant_selection(storage: Storage, condition: VariantCondition, color: &str) -> Selection {
        Selection {
            storage: Some(storage),
            condition: Some(ConditionCode::Variant(condition)),
            color: Some(color.into()),
        }
    }

    #[test]
    fn normalize_prunes_unconfigured_leaves() {
        let product = with_variants(&[
            (Storage::Gb128, VariantCondition::EtatParfait, 300.0, &[("Noir", 2)]),
            // price missing: pruned
            (Storage::Gb128, VariantCondition::NeufSansBoite, 0.0, &[("Noir", 1)]),
            // only a negative-stock color: pruned with its storage
            (Storage::Gb512, VariantCondition::EtatParfait, 400.0, &[("Bleu", -1)]),
        ]);
        assert_eq!(product.variants.0.len(), 1);
        assert_eq!(product.variants.0[&Storage::Gb128].len(), 1);
        assert_eq!(product.available_storages, vec!["128".to_string()]);
    }

    #[test]
    fn nested_sale_decrements_color_and_counts_units() {
        // worked example: 128 / etat_parfait / Noir x2 at 300
        let mut product =
            with_variants(&[(Storage::Gb128, VariantCondition::EtatParfait, 300.0, &[("Noir", 2)])]);
        let sel = variant_selection(Storage::Gb128, VariantCondition::EtatParfait, "noir");

        product.apply_decrease(&sel, 2).unwrap();
        assert_eq!(product.sold_count, 2);
        assert_eq!(product.catalog().resolve(&sel).unwrap().available_stock, 0);

        assert_eq!(product.apply_decrease(&sel, 1), Err(StockError::Insufficient));
        assert_eq!(product.sold_count, 2);
    }

    #[test]
    fn flat_sale_counts_units_too() {
        let mut product = base_product();
        product.price = 50.0;
        product.stock = 5;

        product.apply_decrease(&Selection::default(), 3).unwrap();
        assert_eq!(product.stock, 2);
        assert_eq!(product.sold_count, 3);
    }

    #[test]
    fn increase_restores_stock_and_sale_count() {
        let mut product =
            with_variants(&[(Storage::Gb128, VariantCondition::EtatParfait, 300.0, &[("Noir", 2)])]);
        let sel = variant_selection(Storage::Gb128, VariantCondition::EtatParfait, "Noir");

        product.apply_decrease(&sel, 2).unwrap();
        product.apply_increase(&sel, 2).unwrap();
        assert_eq!(product.catalog().resolve(&sel).unwrap().available_stock, 2);
        assert_eq!(product.sold_count, 0);
    }

    #[test]
    fn lowest_price_falls_back_to_flat_field() {
        let mut product = base_product();
        product.price = 99.0;
        assert_eq!(product.lowest_price(), 99.0);

        let product =
            with_variants(&[(Storage::Gb128, VariantCondition::EtatParfait, 300.0, &[("Noir", 2)])]);
        assert_eq!(product.lowest_price(), 300.0);
    }
}
