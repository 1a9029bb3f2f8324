use crate::{db_types::Vendor, traits::StorageError};

/// Read access to vendor ownership records. Vendors themselves are created and managed by the surrounding
/// marketplace; the payment core only ever asks "does this vendor exist, and who owns it?".
#[allow(async_fn_in_trait)]
pub trait VendorManagement {
    async fn fetch_vendor(&self, vendor_id: i64) -> Result<Option<Vendor>, StorageError>;
}
