use actix_web::{
    body::MessageBody,
    cookie::Cookie,
    dev::{Service, ServiceResponse},
    http::{header::HeaderMap, StatusCode},
    test,
};
use chrono::{DateTime, Duration, Utc};
use mercado_tools::MercadoConfig;
use tap_common::Secret;
use tap_payment_engine::{
    db_types::{MerchantLink, Order, OrderId, OrderStatusType, Vendor},
    helpers::StateTokenCodec,
};

use crate::{
    auth::{sign_session_token, SessionClaims, SESSION_COOKIE},
    config::{AuthConfig, ServerOptions},
};

pub const TEST_SESSION_SECRET: &str = "endpoint-test-session-secret-0123456789";
pub const TEST_STATE_SECRET: &str = "endpoint-test-state-secret";
pub const TEST_WEBHOOK_SECRET: &str = "endpoint-test-webhook-secret";

// Creates a test `AuthConfig` for verifying session tokens. DO NOT re-use these secrets anywhere.
pub fn auth_config() -> AuthConfig {
    AuthConfig { session_secret: Secret::new(TEST_SESSION_SECRET.to_string()) }
}

pub fn state_codec() -> StateTokenCodec {
    StateTokenCodec::with_default_max_age(Secret::new(TEST_STATE_SECRET.to_string()))
}

pub fn mercado_config() -> MercadoConfig {
    MercadoConfig {
        client_id: "app-123".to_string(),
        client_secret: Secret::new("shhh".to_string()),
        redirect_uri: "https://tap.example/oauth/callback".to_string(),
        api_base: "https://api.mercadopago.com".to_string(),
        auth_base: "https://auth.mercadopago.com".to_string(),
    }
}

pub fn server_options() -> ServerOptions {
    ServerOptions {
        use_x_forwarded_for: false,
        use_forwarded: false,
        app_base_url: "https://tap.example".to_string(),
    }
}

pub fn session_cookie(user_id: &str) -> Cookie<'static> {
    let claims = SessionClaims { user_id: user_id.to_string(), email: None };
    let token =
        sign_session_token(&auth_config().session_secret, &claims, Utc::now().timestamp() + 3600);
    Cookie::new(SESSION_COOKIE, token)
}

pub fn vendor(id: i64, owner_id: &str) -> Vendor {
    Vendor { id, owner_id: owner_id.to_string(), display_name: format!("Vendor {id}") }
}

pub fn merchant_link(vendor_id: i64, access_token: &str, expires_at: Option<DateTime<Utc>>) -> MerchantLink {
    MerchantLink {
        id: 1,
        vendor_id,
        external_merchant_id: "MERCHANT-1".to_string(),
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        live_mode: false,
        expires_at,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn healthy_link(vendor_id: i64, access_token: &str) -> MerchantLink {
    merchant_link(vendor_id, access_token, Some(Utc::now() + Duration::hours(6)))
}

pub fn order(id: i64, vendor_id: i64, buyer_id: &str, status: OrderStatusType) -> Order {
    Order {
        id: OrderId::from(id),
        vendor_id,
        buyer_id: buyer_id.to_string(),
        total_price: 125_000.into(),
        currency: "ARS".to_string(),
        status,
        payment_id: None,
        preference_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Drive a request through the test service and normalise handler errors into their rendered responses,
/// so assertions can treat success and error paths uniformly.
pub async fn call<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, HeaderMap, String)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(res) => {
            let status = res.status();
            let headers = res.headers().clone();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, headers, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let headers = res.headers().clone();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, headers, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn location_header(headers: &HeaderMap) -> String {
    headers.get("Location").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string()
}
