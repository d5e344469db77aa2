//! Product persistence and the stock mutation engine
//!
//! Stock changes are conditional single-statement updates: the sufficiency
//! check (`stock >= quantity`) runs inside the database, so two concurrent
//! orders for the last unit cannot both win. The pure catalog mutation is
//! run first against a snapshot to validate the selection; the SQL predicate
//! is the authority on the actual stock level.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::catalog::{Catalog, ConditionCode, Selection, StockError, Storage, VariantCondition};
use crate::domain::product::Product;
use crate::error::ApiError;

/// Bounded retries for the variant path, where a concurrent catalog edit
/// can shift the color index between our read and our update.
const STOCK_RETRY_LIMIT: usize = 3;

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_active(pool: &PgPool, id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND is_active = TRUE")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    page: u32,
    per_page: u32,
    search: Option<&str>,
) -> Result<(Vec<Product>, i64), sqlx::Error> {
    let pattern = search.map(|s| format!("%{s}%"));
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products \
         WHERE is_active = TRUE AND ($1::text IS NULL OR name ILIKE $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(&pattern)
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(pool)
    .await?;
    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE is_active = TRUE AND ($1::text IS NULL OR name ILIKE $1)",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;
    Ok((products, total.0))
}

pub async fn insert(pool: &PgPool, product: &Product) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO products (id, name, description, brand, image_url, variants, conditions, \
         price, stock, colors, available_storages, sold_count, is_best_seller, best_seller_order, \
         is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.brand)
    .bind(&product.image_url)
    .bind(&product.variants)
    .bind(&product.conditions)
    .bind(product.price)
    .bind(product.stock)
    .bind(&product.colors)
    .bind(&product.available_storages)
    .bind(product.sold_count)
    .bind(product.is_best_seller)
    .bind(product.best_seller_order)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Overwrite the catalog-facing fields from an admin edit. Sales counters
/// and best-seller slots are managed by their own operations.
pub async fn update(pool: &PgPool, product: &Product) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET name = $2, description = $3, brand = $4, image_url = $5, \
         variants = $6, conditions = $7, price = $8, stock = $9, colors = $10, \
         available_storages = $11, updated_at = now() \
         WHERE id = $1",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.brand)
    .bind(&product.image_url)
    .bind(&product.variants)
    .bind(&product.conditions)
    .bind(product.price)
    .bind(product.stock)
    .bind(&product.colors)
    .bind(&product.available_storages)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET is_active = FALSE, is_best_seller = FALSE, best_seller_order = NULL, \
         updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Take `quantity` units out of the bucket a selection points at.
///
/// `Ok(true)` means the whole quantity was taken and `sold_count` grew by
/// the same amount; `Ok(false)` means insufficient stock and nothing
/// changed. Invalid selections (bad codes, unknown variant or color) are
/// errors, rejected before any write.
pub async fn decrease_stock(
    pool: &PgPool,
    product_id: Uuid,
    sel: &Selection,
    quantity: i64,
) -> Result<bool, ApiError> {
    mutate_stock(pool, product_id, sel, quantity, StockOp::Decrease).await
}

/// Compensating counterpart of [`decrease_stock`]: puts units back and
/// walks `sold_count` down (never below zero).
pub async fn increase_stock(
    pool: &PgPool,
    product_id: Uuid,
    sel: &Selection,
    quantity: i64,
) -> Result<bool, ApiError> {
    mutate_stock(pool, product_id, sel, quantity, StockOp::Increase).await
}

#[derive(Clone, Copy, PartialEq)]
enum StockOp {
    Decrease,
    Increase,
}

async fn mutate_stock(
    pool: &PgPool,
    product_id: Uuid,
    sel: &Selection,
    quantity: i64,
    op: StockOp,
) -> Result<bool, ApiError> {
    for _ in 0..STOCK_RETRY_LIMIT {
        let product = get(pool, product_id).await?.ok_or(ApiError::NotFound("product"))?;
        let catalog = product.catalog();

        // Validate the selection against a snapshot first. The database
        // predicate below re-checks stock; this pass turns structural
        // problems into typed errors without touching the row.
        let check = match op {
            StockOp::Decrease => catalog.decrease(sel, quantity),
            StockOp::Increase => catalog.increase(sel, quantity),
        };
        match check {
            Ok(_) => {}
            Err(StockError::Insufficient) => return Ok(false),
            Err(StockError::Catalog(e)) => return Err(e.into()),
        }

        let rows = match &catalog {
            Catalog::Variants(map) => {
                let (Some(storage), Some(ConditionCode::Variant(condition)), Some(color)) =
                    (sel.storage, sel.condition, sel.color.as_deref())
                else {
                    // unreachable: the snapshot check requires all three
                    return Err(ApiError::Validation("incomplete variant selection".into()));
                };
                let leaf = map
                    .get(&storage)
                    .and_then(|m| m.get(&condition))
                    .ok_or(ApiError::NotFound("variant"))?;
                let idx = leaf
                    .color_index(color)
                    .ok_or_else(|| ApiError::Validation("color not available".into()))?;
                variant_stock_update(pool, product_id, storage, condition, idx, color, quantity, op)
                    .await?
            }
            Catalog::Legacy(_) => {
                let Some(ConditionCode::Legacy(condition)) = sel.condition else {
                    return Err(ApiError::Validation("incomplete condition selection".into()));
                };
                legacy_stock_update(pool, product_id, condition.code(), quantity, op).await?
            }
            Catalog::Flat(_) => flat_stock_update(pool, product_id, quantity, op).await?,
        };

        if rows == 1 {
            return Ok(true);
        }
        // Zero rows: either the stock moved under us or the catalog was
        // edited between read and write. Re-read and decide again.
    }
    Ok(false)
}

#[allow(clippy::too_many_arguments)]
async fn variant_stock_update(
    pool: &PgPool,
    product_id: Uuid,
    storage: Storage,
    condition: VariantCondition,
    color_index: usize,
    color: &str,
    quantity: i64,
    op: StockOp,
) -> Result<u64, sqlx::Error> {
    let base = [storage.code().to_string(), condition.code().to_string(), "colors".to_string()];
    let stock_path: Vec<String> =
        base.iter().cloned().chain([color_index.to_string(), "stock".to_string()]).collect();
    let name_path: Vec<String> =
        base.iter().cloned().chain([color_index.to_string(), "name".to_string()]).collect();
    let normalized = crate::domain::catalog::normalize_color(color);

    let sql = match op {
        // The WHERE clause is the oversell guard: the color at our index
        // must still be the one we resolved, and it must hold enough stock.
        StockOp::Decrease => {
            "UPDATE products \
             SET variants = jsonb_set(variants, $2::text[], to_jsonb((variants #>> $2::text[])::bigint - $4)), \
                 sold_count = sold_count + $4, updated_at = now() \
             WHERE id = $1 \
               AND lower(btrim(variants #>> $3::text[])) = $5 \
               AND (variants #>> $2::text[])::bigint >= $4"
        }
        StockOp::Increase => {
            "UPDATE products \
             SET variants = jsonb_set(variants, $2::text[], to_jsonb((variants #>> $2::text[])::bigint + $4)), \
                 sold_count = GREATEST(sold_count - $4, 0), updated_at = now() \
             WHERE id = $1 \
               AND lower(btrim(variants #>> $3::text[])) = $5"
        }
    };
    let result = sqlx::query(sql)
        .bind(product_id)
        .bind(&stock_path)
        .bind(&name_path)
        .bind(quantity)
        .bind(&normalized)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn legacy_stock_update(
    pool: &PgPool,
    product_id: Uuid,
    condition_code: &str,
    quantity: i64,
    op: StockOp,
) -> Result<u64, sqlx::Error> {
    let stock_path = vec![condition_code.to_string(), "stock".to_string()];
    let sql = match op {
        StockOp::Decrease => {
            "UPDATE products \
             SET conditions = jsonb_set(conditions, $2::text[], to_jsonb((conditions #>> $2::text[])::bigint - $3)), \
                 sold_count = sold_count + $3, updated_at = now() \
             WHERE id = $1 AND (conditions #>> $2::text[])::bigint >= $3"
        }
        StockOp::Increase => {
            "UPDATE products \
             SET conditions = jsonb_set(conditions, $2::text[], to_jsonb((conditions #>> $2::text[])::bigint + $3)), \
                 sold_count = GREATEST(sold_count - $3, 0), updated_at = now() \
             WHERE id = $1 AND conditions #> $2::text[] IS NOT NULL"
        }
    };
    let result = sqlx::query(sql)
        .bind(product_id)
        .bind(&stock_path)
        .bind(quantity)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn flat_stock_update(
    pool: &PgPool,
    product_id: Uuid,
    quantity: i64,
    op: StockOp,
) -> Result<u64, sqlx::Error> {
    let sql = match op {
        StockOp::Decrease => {
            "UPDATE products SET stock = stock - $2, sold_count = sold_count + $2, updated_at = now() \
             WHERE id = $1 AND stock >= $2"
        }
        StockOp::Increase => {
            "UPDATE products SET stock = stock + $2, sold_count = GREATEST(sold_count - $2, 0), \
             updated_at = now() WHERE id = $1"
        }
    };
    let result = sqlx::query(sql).bind(product_id).bind(quantity).execute(pool).await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Best-seller slots
// ---------------------------------------------------------------------------

pub async fn manual_best_sellers(pool: &PgPool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_best_seller = TRUE AND is_active = TRUE \
         ORDER BY best_seller_order ASC NULLS LAST LIMIT 4",
    )
    .fetch_all(pool)
    .await
}

pub async fn top_sold_excluding(
    pool: &PgPool,
    exclude: &[Uuid],
    limit: i64,
) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_active = TRUE AND id <> ALL($1) \
         ORDER BY sold_count DESC, created_at ASC LIMIT $2",
    )
    .bind(exclude)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn used_slots(pool: &PgPool) -> Result<Vec<i32>, sqlx::Error> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        "SELECT best_seller_order FROM products \
         WHERE is_best_seller = TRUE AND best_seller_order IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(slot,)| slot).collect())
}

/// Pin a product into a featured slot. The partial unique index on
/// `best_seller_order` turns a lost race into a conflict instead of a
/// duplicate slot.
pub async fn pin_best_seller(pool: &PgPool, id: Uuid, slot: i32) -> Result<(), ApiError> {
    let result = sqlx::query(
        "UPDATE products SET is_best_seller = TRUE, best_seller_order = $2, updated_at = now() \
         WHERE id = $1 AND is_active = TRUE",
    )
    .bind(id)
    .bind(slot)
    .execute(pool)
    .await;
    match result {
        Ok(r) if r.rows_affected() == 1 => Ok(()),
        Ok(_) => Err(ApiError::NotFound("product")),
        Err(e) if super::is_unique_violation(&e) => {
            Err(ApiError::Conflict("best-seller slot already taken".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Move a pinned product to another slot, swapping with the current holder
/// so no two products ever share a slot number.
pub async fn set_best_seller_order(pool: &PgPool, id: Uuid, new_order: i32) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let current: Option<(Option<i32>,)> = sqlx::query_as(
        "SELECT best_seller_order FROM products WHERE id = $1 AND is_best_seller = TRUE FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((old_order,)) = current else {
        return Err(ApiError::NotFound("best seller"));
    };
    if old_order == Some(new_order) {
        return Ok(());
    }

    let holder: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM products WHERE best_seller_order = $1 AND id <> $2 FOR UPDATE",
    )
    .bind(new_order)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    // Vacate our slot first so the unique index never sees a duplicate.
    sqlx::query("UPDATE products SET best_seller_order = NULL WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if let Some((holder_id,)) = holder {
        sqlx::query("UPDATE products SET best_seller_order = $2, updated_at = now() WHERE id = $1")
            .bind(holder_id)
            .bind(old_order)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("UPDATE products SET best_seller_order = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(new_order)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn clear_best_seller(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET is_best_seller = FALSE, best_seller_order = NULL, updated_at = now() \
         WHERE id = $1 AND is_best_seller = TRUE",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
