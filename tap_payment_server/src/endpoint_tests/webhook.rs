use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use tap_common::Secret;
use tap_payment_engine::{
    db_types::OrderStatusType,
    traits::{PaymentRecord, PaymentUpdateOutcome, StorageError},
    CredentialApi,
    ReconciliationApi,
};

use crate::{
    endpoint_tests::{
        helpers::{call, healthy_link, order, TEST_WEBHOOK_SECRET},
        mocks::{MockBackend, MockProvider},
    },
    helpers::calculate_hmac,
    middleware::{SignatureMiddlewareFactory, SIGNATURE_HEADER},
    webhook_routes::WebhookRoute,
};

macro_rules! webhook_app {
    ($backend:expr, $provider:expr, $fallback:expr, $checks:expr) => {{
        let credentials = CredentialApi::new($backend, $provider);
        let api = ReconciliationApi::new(credentials, $fallback);
        test::init_service(
            App::new().app_data(web::Data::new(api)).service(
                web::scope("/mp")
                    .wrap(SignatureMiddlewareFactory::new(
                        SIGNATURE_HEADER,
                        Secret::new(TEST_WEBHOOK_SECRET.to_string()),
                        $checks,
                    ))
                    .service(WebhookRoute::<MockBackend, MockProvider>::new()),
            ),
        )
        .await
    }};
}

fn signed_request(body: &'static str) -> actix_http::Request {
    TestRequest::post()
        .uri("/mp/webhook")
        .insert_header((SIGNATURE_HEADER, calculate_hmac(TEST_WEBHOOK_SECRET, body.as_bytes())))
        .set_payload(body)
        .to_request()
}

#[actix_web::test]
async fn an_approved_payment_approves_the_order() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .withf(|id| id.value() == 77)
        .returning(|id| Ok(Some(order(id.value(), 5, "buyer-1", OrderStatusType::Pending))));
    backend
        .expect_fetch_merchant_link()
        .withf(|vendor_id| *vendor_id == 5)
        .returning(|id| Ok(Some(healthy_link(id, "vendor-token"))));
    backend
        .expect_apply_payment_update()
        .withf(|id, update| {
            id.value() == 77 && update.status == OrderStatusType::Approved && update.payment_id == "P1"
        })
        .times(1)
        .returning(|id, update| {
            let mut order = order(id.value(), 5, "buyer-1", update.status);
            order.payment_id = Some(update.payment_id.clone());
            Ok(PaymentUpdateOutcome::Applied(order))
        });
    let mut provider = MockProvider::new();
    provider
        .expect_fetch_payment()
        .withf(|id, token| id == "P1" && token == "vendor-token")
        .times(1)
        .returning(|_, _| {
            Ok(PaymentRecord {
                id: "P1".to_string(),
                status: "approved".to_string(),
                external_reference: Some("77".to_string()),
                preference_id: None,
            })
        });
    let app = webhook_app!(backend, provider, None, true);

    let (status, _, body) = call(&app, signed_request(r#"{"id":"P1","external_reference":"77"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ok":true"#));
}

#[actix_web::test]
async fn a_stale_delivery_is_acknowledged_but_ignored() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id.value(), 5, "buyer-1", OrderStatusType::Approved))));
    backend.expect_fetch_merchant_link().returning(|id| Ok(Some(healthy_link(id, "vendor-token"))));
    backend
        .expect_apply_payment_update()
        .times(1)
        .returning(|_, _| Ok(PaymentUpdateOutcome::Forbidden { current: OrderStatusType::Approved }));
    let mut provider = MockProvider::new();
    provider.expect_fetch_payment().times(1).returning(|_, _| {
        Ok(PaymentRecord {
            id: "P1".to_string(),
            status: "pending".to_string(),
            external_reference: Some("77".to_string()),
            preference_id: None,
        })
    });
    let app = webhook_app!(backend, provider, None, true);

    // A 200, so the provider does not redeliver something that can never apply.
    let (status, _, body) = call(&app, signed_request(r#"{"id":"P1","external_reference":"77"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ok":true"#));
}

#[actix_web::test]
async fn deliveries_without_a_valid_signature_are_rejected() {
    // No expectations anywhere: the request must never reach the handler.
    let app = webhook_app!(MockBackend::new(), MockProvider::new(), None, true);

    let req = TestRequest::post()
        .uri("/mp/webhook")
        .insert_header((SIGNATURE_HEADER, "bm90LXRoZS1yaWdodC1zaWduYXR1cmU="))
        .set_payload(r#"{"id":"P1"}"#)
        .to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post().uri("/mp/webhook").set_payload(r#"{"id":"P1"}"#).to_request();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_bodies_are_acknowledged_so_the_provider_stops_retrying() {
    let app = webhook_app!(MockBackend::new(), MockProvider::new(), None, false);
    let req = TestRequest::post().uri("/mp/webhook").set_payload("this is not json {{{").to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ok":true"#));
}

#[actix_web::test]
async fn an_unactionable_payload_is_acknowledged() {
    let app = webhook_app!(MockBackend::new(), MockProvider::new(), None, false);
    let req = TestRequest::post().uri("/mp/webhook").set_payload(r#"{"action":"test.ping"}"#).to_request();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""ok":true"#));
}

#[actix_web::test]
async fn internal_failures_return_a_500_to_trigger_redelivery() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|_| Err(StorageError::DatabaseError("database is on fire".to_string())));
    let app = webhook_app!(backend, MockProvider::new(), None, true);

    let (status, _, body) = call(&app, signed_request(r#"{"id":"P1","external_reference":"77"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains(r#""ok":false"#));
}
