use std::{collections::HashMap, fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use tokio::sync::Mutex;

use crate::{
    db_types::{CredentialRotation, MerchantLink},
    tap_api::errors::LinkApiError,
    traits::{MerchantLinkManagement, PaymentProvider},
};

/// Tokens within this many minutes of expiry are refreshed proactively, so a token cannot die between
/// being handed out and being used.
const REFRESH_BUFFER_MINUTES: i64 = 5;

/// `CredentialApi` is the token store and refresh service: it guarantees that the access token it hands
/// out is valid right now (or fails with a typed error saying why it cannot).
///
/// Refreshes for the same vendor are serialized through a per-vendor async mutex. Without it, two
/// concurrent requests near expiry would both post a refresh grant, and providers that rotate refresh
/// tokens on every grant would invalidate one of the two results — a self-inflicted unlink. The loser of
/// the race re-reads the link after acquiring the lock and simply reuses the winner's fresh token.
///
/// Cloning shares the lock map, so every clone participates in the same single-flight discipline.
#[derive(Clone)]
pub struct CredentialApi<B, P> {
    db: B,
    provider: P,
    // One entry per vendor that has ever refreshed through this process; bounded by the vendor count.
    refresh_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl<B, P> Debug for CredentialApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialApi")
    }
}

impl<B, P> CredentialApi<B, P> {
    pub fn new(db: B, provider: P) -> Self {
        Self { db, provider, refresh_locks: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn lock_for_vendor(&self, vendor_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        Arc::clone(locks.entry(vendor_id).or_default())
    }
}

impl<B, P> CredentialApi<B, P>
where
    B: MerchantLinkManagement,
    P: PaymentProvider,
{
    /// Return an access token for the vendor that is valid now.
    ///
    /// * No link on record ⇒ [`LinkApiError::NotLinked`].
    /// * Fresh token ⇒ returned as-is, zero provider calls.
    /// * Expired or expiring within the buffer ⇒ refreshed, persisted, and the new token returned.
    /// * Unknown expiry ⇒ returned as-is (the provider did not tell us a lifetime, so we do not guess).
    pub async fn get_valid_access_token(&self, vendor_id: i64) -> Result<String, LinkApiError> {
        let buffer = Duration::minutes(REFRESH_BUFFER_MINUTES);
        let link =
            self.db.fetch_merchant_link(vendor_id).await?.ok_or(LinkApiError::NotLinked(vendor_id))?;
        if !link.needs_refresh(buffer) {
            trace!("🔑️ Access token for vendor {vendor_id} is still valid.");
            return Ok(link.access_token);
        }
        let lock = self.lock_for_vendor(vendor_id).await;
        let _guard = lock.lock().await;
        // Another request may have completed the refresh while we waited on the lock.
        let link =
            self.db.fetch_merchant_link(vendor_id).await?.ok_or(LinkApiError::NotLinked(vendor_id))?;
        if !link.needs_refresh(buffer) {
            debug!("🔑️ Access token for vendor {vendor_id} was refreshed by a concurrent request.");
            return Ok(link.access_token);
        }
        let refreshed = self.refresh(&link).await?;
        Ok(refreshed.access_token)
    }

    async fn refresh(&self, link: &MerchantLink) -> Result<MerchantLink, LinkApiError> {
        let vendor_id = link.vendor_id;
        let refresh_token = link
            .refresh_token
            .clone()
            .ok_or_else(|| LinkApiError::RefreshFailed("No refresh token is on record".to_string()))?;
        info!("🔑️ Refreshing access token for vendor {vendor_id}.");
        let grant = self
            .provider
            .refresh_token(&refresh_token)
            .await
            .map_err(|e| LinkApiError::RefreshFailed(e.to_string()))?;
        let expires_at = grant.expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
        let rotation = CredentialRotation {
            access_token: grant.access_token,
            // The provider sometimes rotates the refresh token and sometimes returns the old one; always
            // store whatever came back, keeping the old value only when the field is absent.
            refresh_token: grant.refresh_token.or(Some(refresh_token)),
            expires_at,
        };
        let updated = self
            .db
            .rotate_link_credentials(vendor_id, rotation)
            .await
            .map_err(|e| LinkApiError::RefreshFailed(format!("Could not persist new credentials: {e}")))?;
        info!("🔑️ Access token for vendor {vendor_id} refreshed; now valid until {:?}.", updated.expires_at);
        Ok(updated)
    }
}
