//! Persistence layer (PostgreSQL via sqlx)
pub mod orders;
pub mod products;

/// Postgres unique-constraint violation, surfaced when two writers race
/// for the same best-seller slot.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
