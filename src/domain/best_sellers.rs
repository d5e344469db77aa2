//! Best-seller slot assembly
//!
//! Four featured positions on the storefront. Admins may pin products to
//! specific slots; whatever is left over is filled automatically from the
//! sales counter. The arithmetic lives here so the handlers only run
//! queries.

use serde::Serialize;

use super::product::Product;

pub const SLOT_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BestSellerMode {
    /// At least one slot is admin-pinned.
    Hybrid,
    /// Every slot is filled from `sold_count` alone.
    Automatic,
}

/// Place each pinned product at its slot, then fill the free slots in
/// ascending position with the automatic candidates (already ranked by
/// `sold_count` descending). Returns at most [`SLOT_COUNT`] products.
pub fn assemble(
    manual: Vec<Product>,
    automatic: Vec<Product>,
) -> (Vec<Product>, BestSellerMode) {
    let mode = if manual.is_empty() { BestSellerMode::Automatic } else { BestSellerMode::Hybrid };

    let mut slots: Vec<Option<Product>> = (0..SLOT_COUNT).map(|_| None).collect();
    let mut overflow = Vec::new();
    for product in manual.into_iter().take(SLOT_COUNT) {
        match product.best_seller_order {
            Some(order) if (1..=SLOT_COUNT as i32).contains(&order) => {
                let slot = &mut slots[(order - 1) as usize];
                if slot.is_none() {
                    *slot = Some(product);
                } else {
                    overflow.push(product);
                }
            }
            // pinned without a usable slot number: treat as first-free
            _ => overflow.push(product),
        }
    }

    let mut fillers = overflow.into_iter().chain(automatic);
    for slot in slots.iter_mut() {
        if slot.is_none() {
            *slot = fillers.next();
        }
    }

    (slots.into_iter().flatten().collect(), mode)
}

/// Lowest unused slot number in 1..=4, if any remain.
pub fn lowest_free_slot(used: &[i32]) -> Option<i32> {
    (1..=SLOT_COUNT as i32).find(|slot| !used.contains(slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn product(name: &str, sold_count: i64, best_seller_order: Option<i32>) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            brand: None,
            image_url: None,
            variants: Json(BTreeMap::new()),
            conditions: Json(BTreeMap::new()),
            price: 100.0,
            stock: 1,
            colors: vec![],
            available_storages: vec![],
            sold_count,
            is_best_seller: best_seller_order.is_some(),
            best_seller_order,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pinned_product_keeps_its_slot_among_automatic_fill() {
        // one pin at slot 2, the rest ranked by sales
        let manual = vec![product("pinned", 0, Some(2))];
        let automatic = vec![
            product("top", 90, None),
            product("second", 80, None),
            product("third", 70, None),
            product("fourth", 60, None),
        ];
        let (products, mode) = assemble(manual, automatic);

        assert_eq!(mode, BestSellerMode::Hybrid);
        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["top", "pinned", "second", "third"]);
    }

    #[test]
    fn all_automatic_when_nothing_is_pinned() {
        let automatic = vec![product("a", 3, None), product("b", 2, None)];
        let (products, mode) = assemble(vec![], automatic);
        assert_eq!(mode, BestSellerMode::Automatic);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "a");
    }

    #[test]
    fn four_pins_leave_no_room_for_fill() {
        let manual = vec![
            product("p1", 0, Some(1)),
            product("p2", 0, Some(2)),
            product("p3", 0, Some(3)),
            product("p4", 0, Some(4)),
        ];
        let (products, mode) = assemble(manual, vec![product("auto", 99, None)]);
        assert_eq!(mode, BestSellerMode::Hybrid);
        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn fewer_candidates_than_slots_is_fine() {
        let (products, _) = assemble(vec![product("only", 0, Some(4))], vec![]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "only");
    }

    #[test]
    fn lowest_free_slot_fills_gaps_first() {
        assert_eq!(lowest_free_slot(&[]), Some(1));
        assert_eq!(lowest_free_slot(&[1, 2]), Some(3));
        assert_eq!(lowest_free_slot(&[1, 3]), Some(2));
        assert_eq!(lowest_free_slot(&[1, 2, 3, 4]), None);
    }
}
