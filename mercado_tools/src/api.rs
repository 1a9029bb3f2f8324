use std::{sync::Arc, time::Duration};

use log::*;
use rand::Rng;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::MercadoConfig,
    data_objects::{NewPreference, PaymentResponse, PreferenceResponse, TokenResponse},
    MercadoApiError,
};

/// Every outbound call to the provider is bounded by this timeout. A slow provider must never hold a request
/// handler (or a webhook delivery) hostage.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct MercadoApi {
    config: MercadoConfig,
    client: Arc<Client>,
}

impl MercadoApi {
    pub fn new(config: MercadoConfig) -> Result<Self, MercadoApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MercadoApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &MercadoConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    async fn json_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        idempotency_key: Option<String>,
        body: Option<B>,
    ) -> Result<T, MercadoApiError> {
        let url = self.url(path);
        trace!("Sending {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        if let Some(key) = idempotency_key {
            req = req.header("X-Idempotency-Key", key);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| MercadoApiError::ResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("Query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MercadoApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| MercadoApiError::ResponseError(e.to_string()))?;
            Err(MercadoApiError::QueryError { status, message })
        }
    }

    /// POST to the OAuth token endpoint. The provider insists on a form-encoded body for this endpoint,
    /// unlike the rest of its API.
    async fn token_grant(&self, params: &[(&str, &str)]) -> Result<TokenResponse, MercadoApiError> {
        let url = self.url("/oauth/token");
        trace!("Sending token grant request to {url}");
        let response = self
            .client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| MercadoApiError::ResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<TokenResponse>().await.map_err(|e| MercadoApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| MercadoApiError::ResponseError(e.to_string()))?;
            Err(MercadoApiError::QueryError { status, message })
        }
    }

    /// Exchange an authorization code for merchant credentials.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, MercadoApiError> {
        debug!("Exchanging authorization code for tokens");
        let grant = self
            .token_grant(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.reveal().as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .await?;
        info!("Authorization code exchanged for merchant {:?}", grant.user_id);
        Ok(grant)
    }

    /// Renew an access token with a refresh token. The response may or may not rotate the refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, MercadoApiError> {
        debug!("Refreshing access token");
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.reveal().as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Fetch the authoritative payment resource, using the given merchant (or application) access token.
    pub async fn get_payment(&self, payment_id: &str, access_token: &str) -> Result<PaymentResponse, MercadoApiError> {
        let path = format!("/v1/payments/{payment_id}");
        debug!("Fetching payment {payment_id}");
        self.json_query::<PaymentResponse, ()>(Method::GET, &path, Some(access_token), None, None).await
    }

    /// Create a checkout preference on behalf of the merchant owning `access_token`.
    pub async fn create_preference(
        &self,
        preference: &NewPreference,
        access_token: &str,
    ) -> Result<PreferenceResponse, MercadoApiError> {
        debug!("Creating checkout preference for reference {}", preference.external_reference);
        let result = self
            .json_query::<PreferenceResponse, &NewPreference>(
                Method::POST,
                "/checkout/preferences",
                Some(access_token),
                Some(idempotency_key()),
                Some(preference),
            )
            .await?;
        info!("Created checkout preference {}", result.id);
        Ok(result)
    }
}

/// A random idempotency key for preference creation, so a retried POST cannot create two checkout sessions.
fn idempotency_key() -> String {
    let mut rng = rand::thread_rng();
    let key: u128 = rng.gen();
    format!("{key:032x}")
}
