use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{MerchantLink, NewMerchantLink},
    tap_api::errors::LinkFlowError,
    traits::{MerchantLinkManagement, PaymentProvider},
};

/// `LinkFlowApi` finishes the OAuth linking flow: it exchanges the authorization code the provider handed
/// back and persists the resulting merchant credentials against the vendor.
pub struct LinkFlowApi<B, P> {
    db: B,
    provider: P,
}

impl<B, P> Debug for LinkFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinkFlowApi")
    }
}

impl<B, P> LinkFlowApi<B, P> {
    pub fn new(db: B, provider: P) -> Self {
        Self { db, provider }
    }
}

impl<B, P> LinkFlowApi<B, P>
where
    B: MerchantLinkManagement,
    P: PaymentProvider,
{
    /// Exchange `code` and upsert the merchant link for `vendor_id`.
    ///
    /// The caller has already verified the state token and vendor ownership — this method trusts
    /// `vendor_id` completely and must therefore never be reachable without those checks.
    pub async fn complete_link(&self, vendor_id: i64, code: &str) -> Result<MerchantLink, LinkFlowError> {
        let grant = self.provider.exchange_code(code).await?;
        let external_merchant_id = grant.external_merchant_id.ok_or(LinkFlowError::MissingMerchantId)?;
        let expires_at = grant.expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
        let link = NewMerchantLink {
            vendor_id,
            external_merchant_id,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            live_mode: grant.live_mode,
            expires_at,
        };
        let link = self.db.upsert_merchant_link(link).await?;
        info!(
            "🔗️ Vendor {vendor_id} linked to merchant account {} (live_mode={}).",
            link.external_merchant_id, link.live_mode
        );
        Ok(link)
    }
}
