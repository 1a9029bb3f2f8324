use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use tap_payment_engine::{
    db_types::OrderStatusType,
    traits::{CheckoutSession, ProviderError},
    CheckoutApi,
    CheckoutSettings,
    CredentialApi,
};

use crate::{
    endpoint_tests::{
        helpers::{auth_config, call, healthy_link, order, session_cookie},
        mocks::{MockBackend, MockProvider},
    },
    routes::CheckoutRoute,
};

macro_rules! checkout_app {
    ($backend:expr, $provider:expr) => {{
        let credentials = CredentialApi::new($backend, $provider);
        let api = CheckoutApi::new(credentials, CheckoutSettings::default());
        test::init_service(
            App::new()
                .app_data(web::Data::new(auth_config()))
                .app_data(web::Data::new(api))
                .service(web::scope("/api").service(CheckoutRoute::<MockBackend, MockProvider>::new())),
        )
        .await
    }};
}

#[actix_web::test]
async fn checkout_opens_a_session_and_records_the_preference() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .withf(|id| id.value() == 77)
        .returning(|id| Ok(Some(order(id.value(), 5, "buyer-1", OrderStatusType::Pending))));
    backend.expect_fetch_merchant_link().returning(|id| Ok(Some(healthy_link(id, "vendor-token"))));
    backend
        .expect_set_preference_id()
        .withf(|id, preference_id| id.value() == 77 && preference_id == "pref-1")
        .times(1)
        .returning(|_, _| Ok(()));
    let mut provider = MockProvider::new();
    provider
        .expect_create_checkout()
        .withf(|request, token| {
            // 10% marketplace fee on a $1250.00 order.
            request.external_reference == "77"
                && request.marketplace_fee.value() == 12_500
                && request.amount.value() == 125_000
                && token == "vendor-token"
        })
        .times(1)
        .returning(|_, _| {
            Ok(CheckoutSession {
                preference_id: "pref-1".to_string(),
                init_point: Some("https://provider.example/init/pref-1".to_string()),
            })
        });
    let app = checkout_app!(backend, provider);

    let req = TestRequest::post()
        .uri("/api/orders/77/checkout")
        .cookie(session_cookie("buyer-1"))
        .to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("pref-1"));
    assert!(body.contains("init_point"));
}

#[actix_web::test]
async fn checkout_requires_a_session() {
    let app = checkout_app!(MockBackend::new(), MockProvider::new());
    let req = TestRequest::post().uri("/api/orders/77/checkout").to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn checkout_of_a_foreign_order_is_indistinguishable_from_a_missing_one() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id.value(), 5, "someone-else", OrderStatusType::Pending))));
    let app = checkout_app!(backend, MockProvider::new());
    let req = TestRequest::post()
        .uri("/api/orders/77/checkout")
        .cookie(session_cookie("buyer-1"))
        .to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(None));
    let app = checkout_app!(backend, MockProvider::new());
    let req = TestRequest::post()
        .uri("/api/orders/77/checkout")
        .cookie(session_cookie("buyer-1"))
        .to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn checkout_for_an_unlinked_vendor_is_a_503() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id.value(), 5, "buyer-1", OrderStatusType::Pending))));
    backend.expect_fetch_merchant_link().returning(|_| Ok(None));
    let app = checkout_app!(backend, MockProvider::new());
    let req = TestRequest::post()
        .uri("/api/orders/77/checkout")
        .cookie(session_cookie("buyer-1"))
        .to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("unavailable"));
}

#[actix_web::test]
async fn a_provider_failure_during_checkout_is_a_500() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id.value(), 5, "buyer-1", OrderStatusType::Pending))));
    backend.expect_fetch_merchant_link().returning(|id| Ok(Some(healthy_link(id, "vendor-token"))));
    let mut provider = MockProvider::new();
    provider
        .expect_create_checkout()
        .times(1)
        .returning(|_, _| Err(ProviderError::Unreachable("connection reset".to_string())));
    let app = checkout_app!(backend, provider);
    let req = TestRequest::post()
        .uri("/api/orders/77/checkout")
        .cookie(session_cookie("buyer-1"))
        .to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
