use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//--------------------------------------   TokenResponse   -----------------------------------------------------------
/// Response of the OAuth token endpoint for both the `authorization_code` and `refresh_token` grants.
/// The provider omits fields freely depending on the grant and the account type, so everything that has ever
/// been observed missing is optional here.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    /// The merchant account id on the provider side.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub live_mode: Option<bool>,
}

//--------------------------------------   PaymentResponse   ---------------------------------------------------------
/// The authoritative payment resource, `GET /v1/payments/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentResponse {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub preference_id: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<f64>,
    #[serde(default)]
    pub currency_id: Option<String>,
    #[serde(default)]
    pub live_mode: Option<bool>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_approved: Option<DateTime<Utc>>,
}

//--------------------------------------   Preferences   -------------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    pub currency_id: String,
    /// Decimal major units. The provider takes floats here; amounts are converted from integer cents at this
    /// boundary only.
    pub unit_price: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreferencePayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreferenceBackUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Body of `POST /checkout/preferences`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPreference {
    pub items: Vec<PreferenceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<PreferencePayer>,
    /// Our order id, echoed back in payment resources and webhook notifications.
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketplace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketplace_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_urls: Option<PreferenceBackUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_return: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceResponse {
    pub id: String,
    #[serde(default)]
    pub init_point: Option<String>,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_response_with_all_fields() {
        let json = r#"{
            "access_token": "APP_USR-123",
            "token_type": "Bearer",
            "expires_in": 21600,
            "scope": "offline_access payments",
            "user_id": 987654321,
            "refresh_token": "TG-456",
            "live_mode": true
        }"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "APP_USR-123");
        assert_eq!(response.user_id, Some(987654321));
        assert_eq!(response.refresh_token.as_deref(), Some("TG-456"));
        assert_eq!(response.expires_in, Some(21600));
        assert_eq!(response.live_mode, Some(true));
    }

    #[test]
    fn token_response_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token": "X"}"#).unwrap();
        assert_eq!(response.access_token, "X");
        assert!(response.refresh_token.is_none());
        assert!(response.expires_in.is_none());
        assert!(response.user_id.is_none());
    }

    #[test]
    fn payment_response_tolerates_missing_reference() {
        let json = r#"{"id": 1337, "status": "approved"}"#;
        let payment: PaymentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(payment.id, 1337);
        assert_eq!(payment.status, "approved");
        assert!(payment.external_reference.is_none());
    }
}
