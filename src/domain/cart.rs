//! Cart model
//!
//! The cart itself lives in the client; the server sees it as the order
//! payload. What matters is the line identity rule: a line is keyed by
//! product id *plus* the full selection, so two configurations of the same
//! phone (128GB black vs 256GB blue) are distinct lines, while repeats of
//! the same configuration merge into one.

use uuid::Uuid;

use super::catalog::{normalize_color, Selection};

#[derive(Clone, Debug, PartialEq)]
pub struct CartItem {
    pub product_id: Uuid,
    pub selection: Selection,
    pub quantity: i64,
    /// Price quoted when the line was added; orders re-resolve at creation.
    pub unit_price: f64,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Add a line, merging quantities when the configuration already sits
    /// in the cart.
    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id && same_selection(&i.selection, &item.selection))
        {
            existing.quantity += item.quantity;
        } else {
            self.items.push(item);
        }
    }

    /// Set a line's quantity; zero removes the line.
    pub fn update_quantity(&mut self, product_id: Uuid, selection: &Selection, quantity: i64) -> bool {
        match self
            .items
            .iter()
            .position(|i| i.product_id == product_id && same_selection(&i.selection, selection))
        {
            Some(idx) if quantity == 0 => {
                self.items.remove(idx);
                true
            }
            Some(idx) => {
                self.items[idx].quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn remove_item(&mut self, product_id: Uuid, selection: &Selection) -> bool {
        let before = self.items.len();
        self.items
            .retain(|i| !(i.product_id == product_id && same_selection(&i.selection, selection)));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

/// Selections compare with normalized colors, matching the catalog's own
/// lookup rule.
pub fn same_selection(a: &Selection, b: &Selection) -> bool {
    let colors_match = match (a.color.as_deref(), b.color.as_deref()) {
        (Some(x), Some(y)) => normalize_color(x) == normalize_color(y),
        (None, None) => true,
        _ => false,
    };
    a.storage == b.storage && a.condition == b.condition && colors_match
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{ConditionCode, Storage, VariantCondition};

    fn selection(storage: Storage, color: &str) -> Selection {
        Selection {
            storage: Some(storage),
            condition: Some(ConditionCode::Variant(VariantCondition::EtatParfait)),
            color: Some(color.into()),
        }
    }

    fn item(product_id: Uuid, sel: Selection, quantity: i64, unit_price: f64) -> CartItem {
        CartItem { product_id, selection: sel, quantity, unit_price }
    }

    #[test]
    fn same_configuration_merges() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add_item(item(id, selection(Storage::Gb128, "Noir"), 1, 300.0));
        cart.add_item(item(id, selection(Storage::Gb128, "noir "), 2, 300.0));
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.subtotal(), 900.0);
    }

    #[test]
    fn different_configurations_stay_distinct() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add_item(item(id, selection(Storage::Gb128, "Noir"), 1, 300.0));
        cart.add_item(item(id, selection(Storage::Gb256, "Noir"), 1, 350.0));
        cart.add_item(item(id, selection(Storage::Gb128, "Bleu"), 1, 300.0));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn zero_quantity_removes_the_line() {
        let id = Uuid::new_v4();
        let sel = selection(Storage::Gb128, "Noir");
        let mut cart = Cart::new();
        cart.add_item(item(id, sel.clone(), 2, 300.0));

        assert!(cart.update_quantity(id, &sel, 1));
        assert_eq!(cart.items()[0].quantity, 1);
        assert!(cart.update_quantity(id, &sel, 0));
        assert!(cart.is_empty());
        assert!(!cart.update_quantity(id, &sel, 1));
    }

    #[test]
    fn remove_only_touches_the_matching_line() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add_item(item(id, selection(Storage::Gb128, "Noir"), 1, 300.0));
        cart.add_item(item(id, selection(Storage::Gb256, "Noir"), 1, 350.0));

        assert!(cart.remove_item(id, &selection(Storage::Gb128, "NOIR")));
        assert_eq!(cart.item_count(), 1);
        assert!(!cart.remove_item(id, &selection(Storage::Gb128, "Noir")));
    }
}
