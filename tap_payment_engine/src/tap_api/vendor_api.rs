use std::fmt::Debug;

use crate::{
    db_types::Vendor,
    traits::{StorageError, VendorManagement},
};

/// Vendor lookups and ownership checks for the OAuth handlers.
pub struct VendorApi<B> {
    db: B,
}

impl<B> Debug for VendorApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VendorApi")
    }
}

impl<B> VendorApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B: VendorManagement> VendorApi<B> {
    pub async fn fetch_vendor(&self, vendor_id: i64) -> Result<Option<Vendor>, StorageError> {
        self.db.fetch_vendor(vendor_id).await
    }

    /// The vendor, if it exists *and* is owned by `user_id`. An absent vendor and a foreign vendor are
    /// deliberately indistinguishable to the caller.
    pub async fn vendor_owned_by(&self, vendor_id: i64, user_id: &str) -> Result<Option<Vendor>, StorageError> {
        let vendor = self.db.fetch_vendor(vendor_id).await?;
        Ok(vendor.filter(|v| v.owner_id == user_id))
    }
}
