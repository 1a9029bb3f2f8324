use sqlx::SqliteConnection;

use crate::{db_types::Vendor, traits::StorageError};

pub async fn fetch_vendor(vendor_id: i64, conn: &mut SqliteConnection) -> Result<Option<Vendor>, StorageError> {
    let vendor = sqlx::query_as("SELECT id, owner_id, display_name FROM vendors WHERE id = $1")
        .bind(vendor_id)
        .fetch_optional(conn)
        .await?;
    Ok(vendor)
}

/// Inserts a vendor row. Vendor registration belongs to the surrounding marketplace; this exists for
/// seeding and integration tests.
pub async fn insert_vendor(
    owner_id: &str,
    display_name: &str,
    conn: &mut SqliteConnection,
) -> Result<Vendor, StorageError> {
    let vendor = sqlx::query_as(
        "INSERT INTO vendors (owner_id, display_name) VALUES ($1, $2) RETURNING id, owner_id, display_name",
    )
    .bind(owner_id)
    .bind(display_name)
    .fetch_one(conn)
    .await?;
    Ok(vendor)
}
