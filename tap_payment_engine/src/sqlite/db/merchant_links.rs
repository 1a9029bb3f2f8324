use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CredentialRotation, MerchantLink, NewMerchantLink},
    traits::StorageError,
};

pub async fn fetch_by_vendor(
    vendor_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantLink>, StorageError> {
    let link = sqlx::query_as("SELECT * FROM merchant_links WHERE vendor_id = $1")
        .bind(vendor_id)
        .fetch_optional(conn)
        .await?;
    Ok(link)
}

/// Creates the link for a vendor, or replaces every credential field if one already exists. The
/// `vendor_id` uniqueness constraint is what makes "at most one link per vendor" hold; this statement
/// leans on it rather than checking first.
pub async fn upsert(link: NewMerchantLink, conn: &mut SqliteConnection) -> Result<MerchantLink, StorageError> {
    let link: MerchantLink = sqlx::query_as(
        r#"
            INSERT INTO merchant_links (vendor_id, external_merchant_id, access_token, refresh_token, live_mode, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (vendor_id) DO UPDATE SET
                external_merchant_id = excluded.external_merchant_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                live_mode = excluded.live_mode,
                expires_at = excluded.expires_at,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(link.vendor_id)
    .bind(link.external_merchant_id)
    .bind(link.access_token)
    .bind(link.refresh_token)
    .bind(link.live_mode)
    .bind(link.expires_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Merchant link for vendor {} saved (merchant {}).", link.vendor_id, link.external_merchant_id);
    Ok(link)
}

/// Overwrites the credential fields after a successful token refresh. The merchant id and live-mode flag
/// are left alone; they do not change on refresh.
pub async fn rotate_credentials(
    vendor_id: i64,
    rotation: CredentialRotation,
    conn: &mut SqliteConnection,
) -> Result<MerchantLink, StorageError> {
    let link: Option<MerchantLink> = sqlx::query_as(
        r#"
            UPDATE merchant_links
            SET access_token = $1, refresh_token = $2, expires_at = $3, updated_at = CURRENT_TIMESTAMP
            WHERE vendor_id = $4
            RETURNING *;
        "#,
    )
    .bind(rotation.access_token)
    .bind(rotation.refresh_token)
    .bind(rotation.expires_at)
    .bind(vendor_id)
    .fetch_optional(conn)
    .await?;
    link.ok_or_else(|| StorageError::NotFound(format!("No merchant link exists for vendor {vendor_id}")))
}
