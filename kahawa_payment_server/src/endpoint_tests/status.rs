use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use kahawa_payment_engine::{PaymentFlowApi, SqliteDatabase};
use serde_json::Value;

use crate::{
    endpoint_tests::helpers::{memory_db, seeded_paypal_order, send_request},
    routes::{health, OrderStatusRoute},
};

#[actix_web::test]
async fn health_is_always_ok() {
    let service = test::init_service(App::new().service(health)).await;
    let req = TestRequest::get().uri("/health").to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn status_projection_exposes_no_customer_details() {
    let db = memory_db().await;
    let order = seeded_paypal_order(&db, "5O190127TN364715T").await;
    let api = PaymentFlowApi::new(db.clone());
    let uri = format!("/payments/orders/{}/status", order.id);
    let req = TestRequest::get().uri(&uri);
    let (status, body) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api)).service(OrderStatusRoute::<SqliteDatabase>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["id"], order.id.to_string());
    assert_eq!(json["paymentStatus"], "pending");
    assert_eq!(json["orderStatus"], "pending");
    assert_eq!(json["paymentProvider"], "paypal");
    assert!(!body.contains("email"));
    assert!(!body.contains("customer"));
    assert!(!body.contains("address"));
}

#[actix_web::test]
async fn status_of_an_unknown_order_is_a_404() {
    let db = memory_db().await;
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::get().uri("/payments/orders/0123456789abcdef01234567/status");
    let (status, _) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api)).service(OrderStatusRoute::<SqliteDatabase>::new());
    })
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn status_of_a_malformed_order_id_is_a_400() {
    let db = memory_db().await;
    let api = PaymentFlowApi::new(db.clone());
    let req = TestRequest::get().uri("/payments/orders/not-a-real-id/status");
    let (status, _) = send_request(req, move |cfg| {
        cfg.app_data(web::Data::new(api)).service(OrderStatusRoute::<SqliteDatabase>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
