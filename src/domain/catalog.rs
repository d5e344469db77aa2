//! Catalog models and price/stock resolution
//!
//! A product carries up to three pricing shapes, from newest to oldest:
//! nested variants (storage x condition x color), legacy per-condition
//! offers, and a flat price/stock pair. Exactly one shape is authoritative
//! at a time, picked by non-emptiness in that order. [`Catalog`] is the
//! tagged view of that choice; all resolution and stock arithmetic goes
//! through it so call sites never guess which shape is live.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Storage capacity codes, in GB. Wire names are the bare numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Storage {
    #[serde(rename = "64")]
    Gb64,
    #[serde(rename = "128")]
    Gb128,
    #[serde(rename = "256")]
    Gb256,
    #[serde(rename = "512")]
    Gb512,
    #[serde(rename = "1024")]
    Gb1024,
}

impl Storage {
    pub fn code(self) -> &'static str {
        match self {
            Self::Gb64 => "64",
            Self::Gb128 => "128",
            Self::Gb256 => "256",
            Self::Gb512 => "512",
            Self::Gb1024 => "1024",
        }
    }
}

/// Cosmetic grades used by the nested variant model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantCondition {
    NeufSousBlister,
    NeufSansBoite,
    EtatParfait,
    TresBonEtat,
}

impl VariantCondition {
    pub fn code(self) -> &'static str {
        match self {
            Self::NeufSousBlister => "neuf_sous_blister",
            Self::NeufSansBoite => "neuf_sans_boite",
            Self::EtatParfait => "etat_parfait",
            Self::TresBonEtat => "tres_bon_etat",
        }
    }
}

/// Cosmetic grades used by the legacy flat-condition model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyCondition {
    NewSealed,
    NewOpen,
    Perfect,
    Good,
}

impl LegacyCondition {
    pub fn code(self) -> &'static str {
        match self {
            Self::NewSealed => "new_sealed",
            Self::NewOpen => "new_open",
            Self::Perfect => "perfect",
            Self::Good => "good",
        }
    }
}

/// A condition code from either model. The two code sets are disjoint, so
/// a single wire field deserializes unambiguously.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionCode {
    Variant(VariantCondition),
    Legacy(LegacyCondition),
}

/// Per-color stock inside a variant leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorStock {
    pub name: String,
    pub stock: i64,
}

/// The innermost `(storage, condition)` offer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantLeaf {
    pub price: f64,
    #[serde(rename = "publicPrice", skip_serializing_if = "Option::is_none")]
    pub public_price: Option<f64>,
    pub colors: Vec<ColorStock>,
}

impl VariantLeaf {
    pub fn total_stock(&self) -> i64 {
        self.colors.iter().map(|c| c.stock.max(0)).sum()
    }

    pub fn color(&self, name: &str) -> Option<&ColorStock> {
        let wanted = normalize_color(name);
        self.colors.iter().find(|c| normalize_color(&c.name) == wanted)
    }

    pub fn color_index(&self, name: &str) -> Option<usize> {
        let wanted = normalize_color(name);
        self.colors.iter().position(|c| normalize_color(&c.name) == wanted)
    }

    /// A leaf is purchasable only when priced and carrying at least one
    /// valid color entry.
    pub fn is_configured(&self) -> bool {
        self.price > 0.0 && self.colors.iter().any(|c| c.stock >= 0)
    }
}

/// Legacy per-condition offer. Colors are names only; stock lives on the
/// condition, not the color.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyOffer {
    pub price: f64,
    pub stock: i64,
    pub colors: Vec<String>,
}

/// Oldest shape: one price/stock pair for the whole product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatOffer {
    pub price: f64,
    pub stock: i64,
    pub colors: Vec<String>,
}

pub type VariantMap = BTreeMap<Storage, BTreeMap<VariantCondition, VariantLeaf>>;
pub type LegacyMap = BTreeMap<LegacyCondition, LegacyOffer>;

/// The buyer's configuration choice. `condition` accepts codes from either
/// model; the active catalog shape decides which family is meaningful.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Resolution output: the price a unit sells at and how many units the
/// selected bucket still holds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub unit_price: f64,
    pub available_stock: i64,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("variant not found")]
    VariantNotFound,
    #[error("color not available")]
    ColorNotAvailable,
    #[error("condition not found")]
    ConditionNotFound,
    #[error("color not available for condition")]
    ColorNotAvailableForCondition,
    #[error("a storage and condition selection is required")]
    SelectionRequired,
    #[error("a color selection is required")]
    ColorRequired,
    #[error("invalid condition code for this product")]
    InvalidCondition,
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StockError {
    /// The bucket holds fewer units than requested. Retryable by the buyer
    /// with a smaller quantity; nothing was mutated.
    #[error("insufficient stock")]
    Insufficient,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Tagged view over whichever pricing shape is authoritative.
#[derive(Clone, Debug, PartialEq)]
pub enum Catalog {
    Variants(VariantMap),
    Legacy(LegacyMap),
    Flat(FlatOffer),
}

impl Catalog {
    /// Pick the authoritative shape once, by non-emptiness priority:
    /// variants, then legacy conditions, then the flat fields.
    pub fn from_parts(variants: &VariantMap, conditions: &LegacyMap, flat: FlatOffer) -> Self {
        if !variants.is_empty() {
            Catalog::Variants(variants.clone())
        } else if !conditions.is_empty() {
            Catalog::Legacy(conditions.clone())
        } else {
            Catalog::Flat(flat)
        }
    }

    /// Resolve a selection to a unit price and available stock.
    ///
    /// Variant model: storage and condition are mandatory; without a color
    /// the stock is the aggregate over all colors (display only). Legacy
    /// model: condition mandatory, a supplied color must be listed. Flat
    /// model: color is informational and unconstrained.
    pub fn resolve(&self, sel: &Selection) -> Result<Quote, CatalogError> {
        match self {
            Catalog::Variants(map) => {
                let (storage, condition) = variant_keys(sel)?;
                let leaf = map
                    .get(&storage)
                    .and_then(|m| m.get(&condition))
                    .ok_or(CatalogError::VariantNotFound)?;
                let available_stock = match sel.color.as_deref() {
                    Some(color) => leaf.color(color).ok_or(CatalogError::ColorNotAvailable)?.stock,
                    None => leaf.total_stock(),
                };
                Ok(Quote { unit_price: leaf.price, available_stock })
            }
            Catalog::Legacy(map) => {
                let condition = legacy_key(sel)?;
                let offer = map.get(&condition).ok_or(CatalogError::ConditionNotFound)?;
                if let Some(color) = sel.color.as_deref() {
                    let wanted = normalize_color(color);
                    if !offer.colors.iter().any(|c| normalize_color(c) == wanted) {
                        return Err(CatalogError::ColorNotAvailableForCondition);
                    }
                }
                Ok(Quote { unit_price: offer.price, available_stock: offer.stock })
            }
            Catalog::Flat(offer) => Ok(Quote { unit_price: offer.price, available_stock: offer.stock }),
        }
    }

    /// Lowest price across configured, stocked buckets of the active shape.
    /// `None` when nothing is stocked; callers fall back to the flat price.
    pub fn lowest_price(&self) -> Option<f64> {
        match self {
            Catalog::Variants(map) => map
                .values()
                .flat_map(|m| m.values())
                .filter(|leaf| leaf.is_configured() && leaf.total_stock() > 0)
                .map(|leaf| leaf.price)
                .fold(None, min_f64),
            Catalog::Legacy(map) => map
                .values()
                .filter(|offer| offer.price > 0.0 && offer.stock > 0)
                .map(|offer| offer.price)
                .fold(None, min_f64),
            Catalog::Flat(offer) => Some(offer.price),
        }
    }

    /// Product-level availability: true when any bucket anywhere holds
    /// stock. An OR across the whole structure, never an AND.
    pub fn in_stock(&self) -> bool {
        match self {
            Catalog::Variants(map) => map
                .values()
                .flat_map(|m| m.values())
                .any(|leaf| leaf.colors.iter().any(|c| c.stock > 0)),
            Catalog::Legacy(map) => map.values().any(|offer| offer.stock > 0),
            Catalog::Flat(offer) => offer.stock > 0,
        }
    }

    /// Subtract `quantity` from the selected bucket, returning the new
    /// catalog value. No partial mutation: insufficient stock leaves the
    /// input untouched. Purchasing from the variant model requires a
    /// concrete color; the aggregate bucket is display-only.
    pub fn decrease(&self, sel: &Selection, quantity: i64) -> Result<Catalog, StockError> {
        if quantity < 1 {
            return Err(CatalogError::InvalidQuantity.into());
        }
        match self {
            Catalog::Variants(map) => {
                let (storage, condition) = variant_keys(sel)?;
                let color = sel.color.as_deref().ok_or(CatalogError::ColorRequired)?;
                let mut map = map.clone();
                let leaf = map
                    .get_mut(&storage)
                    .and_then(|m| m.get_mut(&condition))
                    .ok_or(CatalogError::VariantNotFound)?;
                let idx = leaf.color_index(color).ok_or(CatalogError::ColorNotAvailable)?;
                if leaf.colors[idx].stock < quantity {
                    return Err(StockError::Insufficient);
                }
                leaf.colors[idx].stock -= quantity;
                Ok(Catalog::Variants(map))
            }
            Catalog::Legacy(map) => {
                let condition = legacy_key(sel)?;
                let mut map = map.clone();
                let offer = map.get_mut(&condition).ok_or(CatalogError::ConditionNotFound)?;
                if offer.stock < quantity {
                    return Err(StockError::Insufficient);
                }
                offer.stock -= quantity;
                Ok(Catalog::Legacy(map))
            }
            Catalog::Flat(offer) => {
                if offer.stock < quantity {
                    return Err(StockError::Insufficient);
                }
                let mut offer = offer.clone();
                offer.stock -= quantity;
                Ok(Catalog::Flat(offer))
            }
        }
    }

    /// Compensating counterpart of [`Catalog::decrease`]. The target bucket
    /// must exist; the add itself cannot fail.
    pub fn increase(&self, sel: &Selection, quantity: i64) -> Result<Catalog, StockError> {
        if quantity < 1 {
            return Err(CatalogError::InvalidQuantity.into());
        }
        match self {
            Catalog::Variants(map) => {
                let (storage, condition) = variant_keys(sel)?;
                let color = sel.color.as_deref().ok_or(CatalogError::ColorRequired)?;
                let mut map = map.clone();
                let leaf = map
                    .get_mut(&storage)
                    .and_then(|m| m.get_mut(&condition))
                    .ok_or(CatalogError::VariantNotFound)?;
                let idx = leaf.color_index(color).ok_or(CatalogError::ColorNotAvailable)?;
                leaf.colors[idx].stock += quantity;
                Ok(Catalog::Variants(map))
            }
            Catalog::Legacy(map) => {
                let condition = legacy_key(sel)?;
                let mut map = map.clone();
                let offer = map.get_mut(&condition).ok_or(CatalogError::ConditionNotFound)?;
                offer.stock += quantity;
                Ok(Catalog::Legacy(map))
            }
            Catalog::Flat(offer) => {
                let mut offer = offer.clone();
                offer.stock += quantity;
                Ok(Catalog::Flat(offer))
            }
        }
    }
}

fn variant_keys(sel: &Selection) -> Result<(Storage, VariantCondition), CatalogError> {
    let storage = sel.storage.ok_or(CatalogError::SelectionRequired)?;
    match sel.condition {
        Some(ConditionCode::Variant(c)) => Ok((storage, c)),
        Some(ConditionCode::Legacy(_)) => Err(CatalogError::InvalidCondition),
        None => Err(CatalogError::SelectionRequired),
    }
}

fn legacy_key(sel: &Selection) -> Result<LegacyCondition, CatalogError> {
    match sel.condition {
        Some(ConditionCode::Legacy(c)) => Ok(c),
        Some(ConditionCode::Variant(_)) => Err(CatalogError::InvalidCondition),
        None => Err(CatalogError::SelectionRequired),
    }
}

/// Color names are free text entered by the back office; matching is by
/// lowercased, trimmed key so "Noir " and "noir" are the same bucket.
pub fn normalize_color(name: &str) -> String {
    name.trim().to_lowercase()
}

fn min_f64(acc: Option<f64>, x: f64) -> Option<f64> {
    match acc {
        Some(m) if m <= x => Some(m),
        _ => Some(x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(price: f64, colors: &[(&str, i64)]) -> VariantLeaf {
        VariantLeaf {
            price,
            public_price: None,
            colors: colors
                .iter()
                .map(|(name, stock)| ColorStock { name: (*name).into(), stock: *stock })
                .collect(),
        }
    }

    fn variant_catalog() -> Catalog {
        let mut by_condition = BTreeMap::new();
        by_condition.insert(VariantCondition::EtatParfait, leaf(300.0, &[("Noir", 2), ("Bleu", 1)]));
        by_condition.insert(VariantCondition::TresBonEtat, leaf(250.0, &[("Noir", 0)]));
        let mut map = BTreeMap::new();
        map.insert(Storage::Gb128, by_condition);
        Catalog::Variants(map)
    }

    fn selection(storage: Storage, condition: VariantCondition, color: Option<&str>) -> Selection {
        Selection {
            storage: Some(storage),
            condition: Some(ConditionCode::Variant(condition)),
            color: color.map(Into::into),
        }
    }

    #[test]
    fn variant_quote_with_color_uses_that_bucket() {
        let catalog = variant_catalog();
        let quote = catalog
            .resolve(&selection(Storage::Gb128, VariantCondition::EtatParfait, Some("noir")))
            .unwrap();
        assert_eq!(quote.unit_price, 300.0);
        assert_eq!(quote.available_stock, 2);
    }

    #[test]
    fn variant_quote_without_color_aggregates() {
        let catalog = variant_catalog();
        let quote = catalog
            .resolve(&selection(Storage::Gb128, VariantCondition::EtatParfait, None))
            .unwrap();
        assert_eq!(quote.available_stock, 3);
    }

    #[test]
    fn unknown_variant_and_color_are_distinct_errors() {
        let catalog = variant_catalog();
        assert_eq!(
            catalog.resolve(&selection(Storage::Gb256, VariantCondition::EtatParfait, None)),
            Err(CatalogError::VariantNotFound)
        );
        assert_eq!(
            catalog.resolve(&selection(Storage::Gb128, VariantCondition::EtatParfait, Some("rouge"))),
            Err(CatalogError::ColorNotAvailable)
        );
    }

    #[test]
    fn variant_model_requires_a_full_selection() {
        let catalog = variant_catalog();
        let sel = Selection { storage: Some(Storage::Gb128), condition: None, color: None };
        assert_eq!(catalog.resolve(&sel), Err(CatalogError::SelectionRequired));
    }

    #[test]
    fn legacy_code_rejected_on_variant_product() {
        let catalog = variant_catalog();
        let sel = Selection {
            storage: Some(Storage::Gb128),
            condition: Some(ConditionCode::Legacy(LegacyCondition::Perfect)),
            color: None,
        };
        assert_eq!(catalog.resolve(&sel), Err(CatalogError::InvalidCondition));
    }

    #[test]
    fn legacy_quote_and_color_membership() {
        let mut map = BTreeMap::new();
        map.insert(
            LegacyCondition::Perfect,
            LegacyOffer { price: 220.0, stock: 4, colors: vec!["Noir".into(), "Or".into()] },
        );
        let catalog = Catalog::Legacy(map);
        let mut sel = Selection {
            storage: None,
            condition: Some(ConditionCode::Legacy(LegacyCondition::Perfect)),
            color: Some("  OR ".into()),
        };
        let quote = catalog.resolve(&sel).unwrap();
        assert_eq!(quote.unit_price, 220.0);
        assert_eq!(quote.available_stock, 4);

        sel.color = Some("rose".into());
        assert_eq!(catalog.resolve(&sel), Err(CatalogError::ColorNotAvailableForCondition));

        sel.condition = Some(ConditionCode::Legacy(LegacyCondition::Good));
        sel.color = None;
        assert_eq!(catalog.resolve(&sel), Err(CatalogError::ConditionNotFound));
    }

    #[test]
    fn flat_quote_ignores_selection_details() {
        let catalog = Catalog::Flat(FlatOffer { price: 50.0, stock: 5, colors: vec![] });
        let quote = catalog.resolve(&Selection::default()).unwrap();
        assert_eq!(quote.unit_price, 50.0);
        assert_eq!(quote.available_stock, 5);
    }

    #[test]
    fn decrease_takes_whole_quantity_or_nothing() {
        let catalog = variant_catalog();
        let sel = selection(Storage::Gb128, VariantCondition::EtatParfait, Some("noir"));

        let after = catalog.decrease(&sel, 2).unwrap();
        assert_eq!(after.resolve(&sel).unwrap().available_stock, 0);
        // original value untouched
        assert_eq!(catalog.resolve(&sel).unwrap().available_stock, 2);

        assert_eq!(after.decrease(&sel, 1), Err(StockError::Insufficient));
    }

    #[test]
    fn decrease_requires_a_color_on_variant_products() {
        let catalog = variant_catalog();
        let sel = selection(Storage::Gb128, VariantCondition::EtatParfait, None);
        assert_eq!(catalog.decrease(&sel, 1), Err(StockError::Catalog(CatalogError::ColorRequired)));
    }

    #[test]
    fn increase_is_the_inverse_of_decrease() {
        let catalog = variant_catalog();
        let sel = selection(Storage::Gb128, VariantCondition::EtatParfait, Some("Noir"));
        let roundtrip = catalog.decrease(&sel, 2).unwrap().increase(&sel, 2).unwrap();
        assert_eq!(roundtrip, catalog);
    }

    #[test]
    fn zero_quantity_rejected_before_stock_is_read() {
        let catalog = Catalog::Flat(FlatOffer { price: 10.0, stock: 1, colors: vec![] });
        assert_eq!(
            catalog.decrease(&Selection::default(), 0),
            Err(StockError::Catalog(CatalogError::InvalidQuantity))
        );
    }

    #[test]
    fn lowest_price_skips_unstocked_leaves() {
        let catalog = variant_catalog();
        // tres_bon_etat at 250 has zero stock, so 300 wins
        assert_eq!(catalog.lowest_price(), Some(300.0));
    }

    #[test]
    fn in_stock_is_an_or_across_buckets() {
        let catalog = variant_catalog();
        assert!(catalog.in_stock());

        let mut by_condition = BTreeMap::new();
        by_condition.insert(VariantCondition::EtatParfait, leaf(300.0, &[("Noir", 0)]));
        let mut map = BTreeMap::new();
        map.insert(Storage::Gb128, by_condition);
        assert!(!Catalog::Variants(map).in_stock());
    }

    #[test]
    fn condition_codes_keep_their_wire_names() {
        let json = serde_json::to_string(&VariantCondition::NeufSousBlister).unwrap();
        assert_eq!(json, "\"neuf_sous_blister\"");
        let json = serde_json::to_string(&LegacyCondition::NewSealed).unwrap();
        assert_eq!(json, "\"new_sealed\"");
        let json = serde_json::to_string(&Storage::Gb1024).unwrap();
        assert_eq!(json, "\"1024\"");

        let code: ConditionCode = serde_json::from_str("\"etat_parfait\"").unwrap();
        assert_eq!(code, ConditionCode::Variant(VariantCondition::EtatParfait));
        let code: ConditionCode = serde_json::from_str("\"new_open\"").unwrap();
        assert_eq!(code, ConditionCode::Legacy(LegacyCondition::NewOpen));
    }
}
