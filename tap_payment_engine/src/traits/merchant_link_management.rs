use crate::{
    db_types::{CredentialRotation, MerchantLink, NewMerchantLink},
    traits::StorageError,
};

/// Persistence of per-vendor provider credentials.
///
/// The merchant link row is the only mutable shared state in the payment core: the callback handler writes
/// it on linking, and the refresh service rotates it. Implementations must make both writes atomic —
/// a failed rotation must leave the stored credentials untouched.
#[allow(async_fn_in_trait)]
pub trait MerchantLinkManagement {
    async fn fetch_merchant_link(&self, vendor_id: i64) -> Result<Option<MerchantLink>, StorageError>;

    /// Create the link for a vendor, or replace it wholesale if one already exists. Relinking is a
    /// supported recovery path, not an error.
    async fn upsert_merchant_link(&self, link: NewMerchantLink) -> Result<MerchantLink, StorageError>;

    /// Overwrite the credential fields after a successful refresh. Fails with [`StorageError::NotFound`]
    /// if the vendor has no link (it was never created, or was removed out from under us).
    async fn rotate_link_credentials(
        &self,
        vendor_id: i64,
        rotation: CredentialRotation,
    ) -> Result<MerchantLink, StorageError>;
}
