use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::{Duration, Utc};
use tap_payment_engine::{db_types::NewMerchantLink, traits::TokenGrant, LinkFlowApi, VendorApi};

use crate::{
    endpoint_tests::{
        helpers::{auth_config, call, location_header, mercado_config, server_options, session_cookie, state_codec, vendor},
        mocks::{MockBackend, MockProvider},
    },
    oauth_routes::{OauthCallbackRoute, OauthStartRoute},
};

macro_rules! start_app {
    ($backend:expr) => {{
        test::init_service(
            App::new()
                .app_data(web::Data::new(auth_config()))
                .app_data(web::Data::new(VendorApi::new($backend)))
                .app_data(web::Data::new(state_codec()))
                .app_data(web::Data::new(mercado_config()))
                .service(web::scope("/oauth").service(OauthStartRoute::<MockBackend>::new())),
        )
        .await
    }};
}

macro_rules! callback_app {
    ($vendor_backend:expr, $link_backend:expr, $provider:expr) => {{
        test::init_service(
            App::new()
                .app_data(web::Data::new(auth_config()))
                .app_data(web::Data::new(VendorApi::new($vendor_backend)))
                .app_data(web::Data::new(LinkFlowApi::new($link_backend, $provider)))
                .app_data(web::Data::new(state_codec()))
                .app_data(web::Data::new(server_options()))
                .service(
                    web::scope("/oauth")
                        .service(OauthCallbackRoute::<MockBackend, MockBackend, MockProvider>::new()),
                ),
        )
        .await
    }};
}

//----------------------------------------------   /oauth/start   ----------------------------------------------------

#[actix_web::test]
async fn start_redirects_the_owner_to_the_provider() {
    let mut backend = MockBackend::new();
    backend.expect_fetch_vendor().withf(|id| *id == 42).returning(|id| Ok(Some(vendor(id, "user-abc"))));
    let app = start_app!(backend);

    let req = TestRequest::get().uri("/oauth/start?vendorId=42").cookie(session_cookie("user-abc")).to_request();
    let (status, headers, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location_header(&headers);
    assert!(location.starts_with("https://auth.mercadopago.com/authorization?"), "was: {location}");
    assert!(location.contains("client_id=app-123"));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("redirect_uri=https%3A%2F%2Ftap.example%2Foauth%2Fcallback"));

    // The state parameter decodes back to the vendor we asked to link.
    let state = location
        .split("state=")
        .nth(1)
        .and_then(|s| s.split('&').next())
        .expect("Location should carry a state parameter");
    let decoded = state_codec().decode(state).expect("State should verify");
    assert_eq!(decoded.vendor_id, 42);
}

#[actix_web::test]
async fn start_without_vendor_id_is_a_400() {
    let app = start_app!(MockBackend::new());
    let req = TestRequest::get().uri("/oauth/start").cookie(session_cookie("user-abc")).to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("vendorId"));
}

#[actix_web::test]
async fn start_without_a_session_redirects_to_login() {
    let app = start_app!(MockBackend::new());
    let req = TestRequest::get().uri("/oauth/start?vendorId=42").to_request();
    let (status, headers, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location_header(&headers);
    // The original URL, query string included, comes along so the flow can resume after login.
    assert_eq!(location, "/login?return_to=%2Foauth%2Fstart%3FvendorId%3D42");
}

#[actix_web::test]
async fn start_for_someone_elses_vendor_is_a_403() {
    let mut backend = MockBackend::new();
    backend.expect_fetch_vendor().returning(|id| Ok(Some(vendor(id, "someone-else"))));
    let app = start_app!(backend);
    let req = TestRequest::get().uri("/oauth/start?vendorId=42").cookie(session_cookie("user-abc")).to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn start_for_a_missing_vendor_is_a_403() {
    let mut backend = MockBackend::new();
    backend.expect_fetch_vendor().returning(|_| Ok(None));
    let app = start_app!(backend);
    let req = TestRequest::get().uri("/oauth/start?vendorId=42").cookie(session_cookie("user-abc")).to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

//----------------------------------------------   /oauth/callback   -------------------------------------------------

#[actix_web::test]
async fn callback_exchanges_the_code_and_links_the_vendor() {
    let mut vendor_backend = MockBackend::new();
    vendor_backend.expect_fetch_vendor().returning(|id| Ok(Some(vendor(id, "user-abc"))));
    let mut link_backend = MockBackend::new();
    link_backend
        .expect_upsert_merchant_link()
        .withf(|link: &NewMerchantLink| {
            let expiry_ok = link
                .expires_at
                .map(|t| {
                    let expected = Utc::now() + Duration::seconds(3600);
                    (t - expected).num_seconds().abs() <= 2
                })
                .unwrap_or(false);
            link.vendor_id == 42
                && link.external_merchant_id == "U1"
                && link.access_token == "X"
                && link.refresh_token.as_deref() == Some("Y")
                && !link.live_mode
                && expiry_ok
        })
        .times(1)
        .returning(|link| {
            Ok(tap_payment_engine::db_types::MerchantLink {
                id: 1,
                vendor_id: link.vendor_id,
                external_merchant_id: link.external_merchant_id,
                access_token: link.access_token,
                refresh_token: link.refresh_token,
                live_mode: link.live_mode,
                expires_at: link.expires_at,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        });
    let mut provider = MockProvider::new();
    provider.expect_exchange_code().withf(|code| code == "abc").times(1).returning(|_| {
        Ok(TokenGrant {
            access_token: "X".to_string(),
            refresh_token: Some("Y".to_string()),
            expires_in: Some(3600),
            external_merchant_id: Some("U1".to_string()),
            live_mode: false,
        })
    });
    let app = callback_app!(vendor_backend, link_backend, provider);

    let state = state_codec().encode(42);
    let req = TestRequest::get()
        .uri(&format!("/oauth/callback?code=abc&state={state}"))
        .cookie(session_cookie("user-abc"))
        .to_request();
    let (status, headers, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location_header(&headers), "https://tap.example/dashboard");
}

#[actix_web::test]
async fn callback_with_missing_params_is_a_400() {
    let app = callback_app!(MockBackend::new(), MockBackend::new(), MockProvider::new());
    let req = TestRequest::get().uri("/oauth/callback?code=abc").cookie(session_cookie("user-abc")).to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("state"));

    let state = state_codec().encode(42);
    let req = TestRequest::get()
        .uri(&format!("/oauth/callback?state={state}"))
        .cookie(session_cookie("user-abc"))
        .to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("code"));
}

#[actix_web::test]
async fn callback_with_a_forged_state_is_a_400_and_makes_no_provider_call() {
    // No expectations on the mocks: any call panics the test.
    let app = callback_app!(MockBackend::new(), MockBackend::new(), MockProvider::new());
    let mut state = state_codec().encode(42);
    // Clobber the signature half.
    state.replace_range(state.len() - 4.., "AAAA");
    let req = TestRequest::get()
        .uri(&format!("/oauth/callback?code=abc&state={state}"))
        .cookie(session_cookie("user-abc"))
        .to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn callback_without_a_session_redirects_to_login_with_the_full_query() {
    let app = callback_app!(MockBackend::new(), MockBackend::new(), MockProvider::new());
    let state = state_codec().encode(42);
    let req = TestRequest::get().uri(&format!("/oauth/callback?code=abc&state={state}")).to_request();
    let (status, headers, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location_header(&headers);
    assert!(location.starts_with("/login?return_to=%2Foauth%2Fcallback%3Fcode%3Dabc%26state%3D"));
}

#[actix_web::test]
async fn callback_for_someone_elses_vendor_is_a_403_and_persists_nothing() {
    let mut vendor_backend = MockBackend::new();
    vendor_backend.expect_fetch_vendor().returning(|id| Ok(Some(vendor(id, "someone-else"))));
    // link_backend has no expectations: an upsert would panic the test.
    let app = callback_app!(vendor_backend, MockBackend::new(), MockProvider::new());
    let state = state_codec().encode(42);
    let req = TestRequest::get()
        .uri(&format!("/oauth/callback?code=abc&state={state}"))
        .cookie(session_cookie("user-abc"))
        .to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn callback_relays_the_provider_error_on_a_failed_exchange() {
    let mut vendor_backend = MockBackend::new();
    vendor_backend.expect_fetch_vendor().returning(|id| Ok(Some(vendor(id, "user-abc"))));
    let mut provider = MockProvider::new();
    provider.expect_exchange_code().times(1).returning(|_| {
        Err(tap_payment_engine::traits::ProviderError::Rejected {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        })
    });
    let app = callback_app!(vendor_backend, MockBackend::new(), provider);
    let state = state_codec().encode(42);
    let req = TestRequest::get()
        .uri(&format!("/oauth/callback?code=expired&state={state}"))
        .cookie(session_cookie("user-abc"))
        .to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("invalid_grant"));
}
