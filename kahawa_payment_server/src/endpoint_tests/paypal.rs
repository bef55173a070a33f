use actix_web::{http::StatusCode, test::TestRequest, web};
use kahawa_payment_engine::{
    db_types::PaymentStatus,
    traits::{CaptureOutcome, PaymentGatewayDatabase},
    PaymentFlowApi,
    SqliteDatabase,
};
use kps_common::Cents;
use serde_json::{json, Value};

use crate::{
    config::ServerConfig,
    endpoint_tests::{
        helpers::{memory_db, seeded_paypal_order, send_request, test_config},
        mocks::MockPaypalProvider,
    },
    routes::{PaypalCaptureOrderRoute, PaypalCreateOrderRoute, PaypalWebhookRoute},
};

const SESSION_ID: &str = "5O190127TN364715T";
const CAPTURE_ID: &str = "3C679366HH908993F";

fn two_bags_body() -> Value {
    json!({
        "cartItems": [{ "id": "arabica-250g", "quantity": 2 }],
        "total": 37.0,
        "name": "Wanjiku Kamau",
        "email": "wanjiku@example.com"
    })
}

fn capture_body(local_order_id: &str) -> Value {
    json!({ "orderID": SESSION_ID, "localOrderId": local_order_id })
}

#[actix_web::test]
async fn create_order_opens_a_checkout_session() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal
        .expect_create_order()
        .withf(|total, currency| *total == Cents::from(3700) && currency == "USD")
        .returning(|_, _| Ok(SESSION_ID.to_string()));
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::post().uri("/payments/paypal/create-order").set_json(two_bags_body());
    let (status, body) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .service(PaypalCreateOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["orderID"], SESSION_ID);
    let local_id = body["localOrderId"].as_str().unwrap();
    let order = db.fetch_order_by_payment_ref(SESSION_ID).await.unwrap().unwrap();
    assert_eq!(order.id.to_string(), local_id);
    assert_eq!(order.total_price, Cents::from(3700));
}

#[actix_web::test]
async fn tampered_total_is_rejected_before_paypal_is_contacted() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_create_order().never();
    let api = PaymentFlowApi::new(db.clone());
    let mut body = two_bags_body();
    body["total"] = json!(1.0);
    let req = TestRequest::post().uri("/payments/paypal/create-order").set_json(body);
    let (status, _) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .service(PaypalCreateOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(db.fetch_order_by_payment_ref(SESSION_ID).await.unwrap().is_none());
}

#[actix_web::test]
async fn capture_marks_the_order_paid() {
    let db = memory_db().await;
    let order = seeded_paypal_order(&db, SESSION_ID).await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_capture_order().times(1).returning(|_| {
        Ok(CaptureOutcome {
            status: "COMPLETED".to_string(),
            capture_id: Some(CAPTURE_ID.to_string()),
            raw: json!({ "status": "COMPLETED" }),
        })
    });
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::post()
        .uri("/payments/paypal/capture-order")
        .set_json(capture_body(&order.id.to_string()));
    let (status, body) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .service(PaypalCaptureOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["captureId"], CAPTURE_ID);
    let order = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payment_ref.as_deref(), Some(CAPTURE_ID));
}

#[actix_web::test]
async fn declined_capture_fails_the_order() {
    let db = memory_db().await;
    let order = seeded_paypal_order(&db, SESSION_ID).await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_capture_order().times(1).returning(|_| {
        Ok(CaptureOutcome { status: "DECLINED".to_string(), capture_id: None, raw: json!({ "status": "DECLINED" }) })
    });
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::post()
        .uri("/payments/paypal/capture-order")
        .set_json(capture_body(&order.id.to_string()));
    let (status, body) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .service(PaypalCaptureOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "failed");
    let order = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);
}

#[actix_web::test]
async fn capturing_a_paid_order_acknowledges_without_a_provider_call() {
    let db = memory_db().await;
    let order = seeded_paypal_order(&db, SESSION_ID).await;
    db.mark_order_paid(&order.id, Some(CAPTURE_ID), Some(CAPTURE_ID)).await.unwrap();
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_capture_order().never();
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::post()
        .uri("/payments/paypal/capture-order")
        .set_json(capture_body(&order.id.to_string()));
    let (status, body) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .service(PaypalCaptureOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["alreadyCaptured"], true);
}

#[actix_web::test]
async fn capturing_an_unknown_order_is_a_404() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_capture_order().never();
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::post()
        .uri("/payments/paypal/capture-order")
        .set_json(capture_body("00112233445566778899aabb"));
    let (status, _) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .service(PaypalCaptureOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn capture_with_a_malformed_order_id_is_a_400() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_capture_order().never();
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::post().uri("/payments/paypal/capture-order").set_json(capture_body("NOPE"));
    let (status, _) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .service(PaypalCaptureOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn webhook_event(event_id: &str, event_type: &str) -> Value {
    json!({
        "id": event_id,
        "event_type": event_type,
        "resource": {
            "id": CAPTURE_ID,
            "supplementary_data": { "related_ids": { "order_id": SESSION_ID } }
        }
    })
}

fn signed_webhook_request(event: &Value) -> TestRequest {
    TestRequest::post()
        .uri("/payments/paypal/webhook")
        .insert_header(("paypal-transmission-id", "tx-1"))
        .insert_header(("paypal-transmission-time", "2026-08-01T10:00:00Z"))
        .insert_header(("paypal-transmission-sig", "sig"))
        .insert_header(("paypal-cert-url", "https://api.paypal.com/cert.pem"))
        .insert_header(("paypal-auth-algo", "SHA256withRSA"))
        .set_json(event)
}

async fn post_webhook(
    db: &SqliteDatabase,
    config: ServerConfig,
    paypal: MockPaypalProvider,
    req: TestRequest,
) -> (StatusCode, String) {
    let api = PaymentFlowApi::new(db.clone());
    send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paypal))
            .app_data(web::Data::new(config))
            .service(PaypalWebhookRoute::<SqliteDatabase, MockPaypalProvider>::new());
    })
    .await
}

#[actix_web::test]
async fn verified_webhook_confirms_payment() {
    let db = memory_db().await;
    let order = seeded_paypal_order(&db, SESSION_ID).await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_verify_webhook_signature().returning(|_, _| Ok(true));
    let event = webhook_event("WH-1", "PAYMENT.CAPTURE.COMPLETED");
    let (status, body) = post_webhook(&db, test_config(), paypal, signed_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "paid");
    let order = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert!(order.is_paid());
}

#[actix_web::test]
async fn webhook_with_a_bad_signature_is_a_401() {
    let db = memory_db().await;
    let order = seeded_paypal_order(&db, SESSION_ID).await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_verify_webhook_signature().returning(|_, _| Ok(false));
    let event = webhook_event("WH-1", "PAYMENT.CAPTURE.COMPLETED");
    let (status, _) = post_webhook(&db, test_config(), paypal, signed_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let order = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert!(!order.is_paid());
}

#[actix_web::test]
async fn webhook_without_transmission_headers_is_a_400() {
    let db = memory_db().await;
    seeded_paypal_order(&db, SESSION_ID).await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_verify_webhook_signature().never();
    let event = webhook_event("WH-1", "PAYMENT.CAPTURE.COMPLETED");
    let req = TestRequest::post().uri("/payments/paypal/webhook").set_json(&event);
    let (status, _) = post_webhook(&db, test_config(), paypal, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_without_a_configured_webhook_id_is_a_500() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_verify_webhook_signature().never();
    let event = webhook_event("WH-1", "PAYMENT.CAPTURE.COMPLETED");
    // The default config has no webhook id.
    let (status, _) = post_webhook(&db, ServerConfig::default(), paypal, signed_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn signed_but_malformed_event_is_a_400() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_verify_webhook_signature().returning(|_, _| Ok(true));
    let event = json!({ "event_type": "PAYMENT.CAPTURE.COMPLETED" });
    let (status, _) = post_webhook(&db, test_config(), paypal, signed_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
