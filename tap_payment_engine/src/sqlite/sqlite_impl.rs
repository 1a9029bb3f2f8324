//! `SqliteDatabase` is the concrete SQLite implementation of the payment engine's storage traits.
//!
//! It is a thin stateful wrapper over a connection pool; the actual SQL lives in the plain-function
//! modules under [`db`](super::db). Migrations are embedded and run on connection, so pointing the server
//! (or a test) at a fresh database file — or `sqlite::memory:` — just works.

use std::fmt::Debug;

use log::trace;
use sqlx::SqlitePool;

use super::db::{db_url, merchant_links, new_pool, orders, vendors};
use crate::{
    db_types::{CredentialRotation, MerchantLink, NewMerchantLink, NewOrder, Order, OrderId, OrderPaymentUpdate, Vendor},
    traits::{
        MerchantLinkManagement,
        OrderManagement,
        PaymentUpdateOutcome,
        StorageError,
        VendorManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, StorageError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failure: {e}")))?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) {
        self.pool.close().await;
    }

    /// Seed helper: create a vendor. Vendor registration is otherwise out of the payment core's scope.
    pub async fn insert_vendor(&self, owner_id: &str, display_name: &str) -> Result<Vendor, StorageError> {
        let mut conn = self.pool.acquire().await?;
        vendors::insert_vendor(owner_id, display_name, &mut conn).await
    }

    /// Seed helper: create an order. Order intake is otherwise out of the payment core's scope.
    pub async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }
}

impl VendorManagement for SqliteDatabase {
    async fn fetch_vendor(&self, vendor_id: i64) -> Result<Option<Vendor>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        vendors::fetch_vendor(vendor_id, &mut conn).await
    }
}

impl MerchantLinkManagement for SqliteDatabase {
    async fn fetch_merchant_link(&self, vendor_id: i64) -> Result<Option<MerchantLink>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        merchant_links::fetch_by_vendor(vendor_id, &mut conn).await
    }

    async fn upsert_merchant_link(&self, link: NewMerchantLink) -> Result<MerchantLink, StorageError> {
        let mut conn = self.pool.acquire().await?;
        merchant_links::upsert(link, &mut conn).await
    }

    async fn rotate_link_credentials(
        &self,
        vendor_id: i64,
        rotation: CredentialRotation,
    ) -> Result<MerchantLink, StorageError> {
        let mut conn = self.pool.acquire().await?;
        merchant_links::rotate_credentials(vendor_id, rotation, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn apply_payment_update(
        &self,
        id: OrderId,
        update: OrderPaymentUpdate,
    ) -> Result<PaymentUpdateOutcome, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::apply_payment_update(id, update, &mut conn).await
    }

    async fn set_preference_id(&self, id: OrderId, preference_id: &str) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_preference_id(id, preference_id, &mut conn).await
    }
}
