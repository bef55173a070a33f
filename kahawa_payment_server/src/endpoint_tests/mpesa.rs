use actix_web::{http::StatusCode, test::TestRequest, web};
use kahawa_payment_engine::{
    db_types::{PaymentProvider, PaymentStatus},
    traits::{PaymentGatewayDatabase, PushOutcome},
    PaymentFlowApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use crate::{
    config::ServerConfig,
    endpoint_tests::{
        helpers::{memory_db, seeded_mpesa_order, send_request, test_config, TEST_CALLBACK_TOKEN},
        mocks::MockMpesaProvider,
    },
    routes::{MpesaCallbackRoute, MpesaInitiateRoute},
};

const CHECKOUT_REQUEST_ID: &str = "ws_CO_191220191020363925";

fn initiate_body() -> Value {
    json!({
        "phone": "0712345678",
        "cartItems": [{ "id": "robusta-500g", "quantity": 1 }],
        "total": 24.0,
        "name": "Wanjiku Kamau"
    })
}

fn callback_body(result_code: i64) -> Value {
    json!({
        "Body": { "stkCallback": {
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": CHECKOUT_REQUEST_ID,
            "ResultCode": result_code,
            "ResultDesc": if result_code == 0 { "Processed successfully." } else { "Request cancelled by user" }
        }}
    })
}

fn accepted_push() -> PushOutcome {
    PushOutcome {
        checkout_request_id: CHECKOUT_REQUEST_ID.to_string(),
        merchant_request_id: Some("29115-34620561-1".to_string()),
        customer_message: Some("Success. Request accepted for processing".to_string()),
        mock: false,
        raw: json!({ "ResponseCode": "0" }),
    }
}

async fn post_initiate(db: &SqliteDatabase, mpesa: MockMpesaProvider, body: Value) -> (StatusCode, String) {
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::post().uri("/payments/mpesa/initiate").set_json(body);
    send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(mpesa))
            .service(MpesaInitiateRoute::<SqliteDatabase, MockMpesaProvider>::new());
    })
    .await
}

#[actix_web::test]
async fn initiate_creates_an_order_and_sends_a_push() {
    let db = memory_db().await;
    let mut mpesa = MockMpesaProvider::new();
    mpesa.expect_initiate_push().times(1).returning(|request| {
        assert_eq!(request.phone, "254712345678");
        Ok(accepted_push())
    });
    let (status, body) = post_initiate(&db, mpesa, initiate_body()).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["checkoutRequestId"], CHECKOUT_REQUEST_ID);
    assert_eq!(body["mock"], false);
    let order = db.fetch_order_by_payment_ref(CHECKOUT_REQUEST_ID).await.unwrap().unwrap();
    assert_eq!(body["localOrderId"], order.id.to_string());
    assert_eq!(order.payment_provider, PaymentProvider::Mpesa);
    assert_eq!(order.customer_phone.as_deref(), Some("254712345678"));
}

#[actix_web::test]
async fn initiate_with_a_known_order_id_retries_that_order() {
    let db = memory_db().await;
    let order = seeded_mpesa_order(&db).await;
    let mut mpesa = MockMpesaProvider::new();
    mpesa.expect_initiate_push().times(1).returning(|_| Ok(accepted_push()));
    let mut body = initiate_body();
    body["localOrderId"] = json!(order.id.to_string());
    let (status, response) = post_initiate(&db, mpesa, body).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response["localOrderId"], order.id.to_string());
    let order = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_ref.as_deref(), Some(CHECKOUT_REQUEST_ID));
}

#[actix_web::test]
async fn initiate_for_a_paid_order_reports_already_paid() {
    let db = memory_db().await;
    let order = seeded_mpesa_order(&db).await;
    db.mark_order_paid(&order.id, Some(CHECKOUT_REQUEST_ID), None).await.unwrap();
    let mut mpesa = MockMpesaProvider::new();
    mpesa.expect_initiate_push().never();
    let mut body = initiate_body();
    body["localOrderId"] = json!(order.id.to_string());
    let (status, response) = post_initiate(&db, mpesa, body).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response["alreadyPaid"], true);
    assert_eq!(response["localOrderId"], order.id.to_string());
}

#[actix_web::test]
async fn invalid_phone_is_rejected_before_any_order_exists() {
    let db = memory_db().await;
    let mut mpesa = MockMpesaProvider::new();
    mpesa.expect_initiate_push().never();
    let mut body = initiate_body();
    body["phone"] = json!("0812345678");
    let (status, _) = post_initiate(&db, mpesa, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn post_callback_with_config(
    db: &SqliteDatabase,
    config: ServerConfig,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, String) {
    let api = PaymentFlowApi::new(db.clone());
    let uri = match token {
        Some(t) => format!("/payments/mpesa/callback?token={t}"),
        None => "/payments/mpesa/callback".to_string(),
    };
    let req = TestRequest::post().uri(&uri).set_json(body);
    send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(config))
            .service(MpesaCallbackRoute::<SqliteDatabase>::new());
    })
    .await
}

async fn post_callback(db: &SqliteDatabase, token: Option<&str>, body: Value) -> (StatusCode, String) {
    post_callback_with_config(db, test_config(), token, body).await
}

#[actix_web::test]
async fn callback_with_a_bad_token_is_a_401() {
    let db = memory_db().await;
    let (status, _) = post_callback(&db, Some("wrong-token"), callback_body(0)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = post_callback(&db, None, callback_body(0)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn callback_without_a_configured_token_is_accepted() {
    let db = memory_db().await;
    let order = seeded_mpesa_order(&db).await;
    db.set_mpesa_checkout_request(&order.id, CHECKOUT_REQUEST_ID).await.unwrap();
    let (status, body) = post_callback_with_config(&db, ServerConfig::default(), None, callback_body(0)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], true);
    let order = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
}

#[actix_web::test]
async fn callback_for_an_unknown_checkout_request_is_acknowledged_and_dropped() {
    let db = memory_db().await;
    let (status, body) = post_callback(&db, Some(TEST_CALLBACK_TOKEN), callback_body(0)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ignored"], true);
}

#[actix_web::test]
async fn successful_callback_marks_the_order_paid_and_replays_are_suppressed() {
    let db = memory_db().await;
    let order = seeded_mpesa_order(&db).await;
    let order = db.set_mpesa_checkout_request(&order.id, CHECKOUT_REQUEST_ID).await.unwrap();

    let (status, body) = post_callback(&db, Some(TEST_CALLBACK_TOKEN), callback_body(0)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], true);
    let paid = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    let (status, body) = post_callback(&db, Some(TEST_CALLBACK_TOKEN), callback_body(0)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["duplicate"], true);

    // A late cancellation after payment never unseats the paid status.
    let (status, body) = post_callback(&db, Some(TEST_CALLBACK_TOKEN), callback_body(1032)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["alreadyProcessed"], true);
    let order = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
}

#[actix_web::test]
async fn callback_without_a_checkout_request_id_is_a_400() {
    let db = memory_db().await;
    let (status, _) = post_callback(&db, Some(TEST_CALLBACK_TOKEN), json!({ "Body": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
