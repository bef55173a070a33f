use actix_web::{http::StatusCode, test, test::TestRequest, web, App, HttpResponse};
use kahawa_payment_engine::{PaymentFlowApi, SqliteDatabase};
use serde_json::json;

use crate::{
    endpoint_tests::{helpers::memory_db, mocks::MockPaypalProvider},
    middleware::RateLimiterStore,
    routes::PaypalCreateOrderRoute,
};

/// Requests over the per-route ceiling are refused with a 429 before the handler runs. Even rejected requests
/// count against the window.
#[actix_web::test]
async fn bursts_over_the_route_ceiling_are_refused() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_create_order().never();
    let api = PaymentFlowApi::new(db.clone());
    let store = web::Data::new(RateLimiterStore::new());
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(paypal))
        .app_data(store)
        .service(PaypalCreateOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    let service = test::init_service(app).await;

    // An empty cart is a 400, but the middleware counts the hit all the same.
    let body = json!({ "cartItems": [] });
    for _ in 0..20 {
        let req = TestRequest::post().uri("/payments/paypal/create-order").set_json(&body).to_request();
        let status = match test::try_call_service(&service, req).await {
            Ok(res) => res.status(),
            Err(e) => HttpResponse::from_error(e).status(),
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    let req = TestRequest::post().uri("/payments/paypal/create-order").set_json(&body).to_request();
    let status = match test::try_call_service(&service, req).await {
        Ok(res) => res.status(),
        Err(e) => HttpResponse::from_error(e).status(),
    };
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

/// Routes skip the limiter when no store is registered, so the other endpoint tests run unthrottled.
#[actix_web::test]
async fn no_store_means_no_throttling() {
    let db = memory_db().await;
    let mut paypal = MockPaypalProvider::new();
    paypal.expect_create_order().never();
    let api = PaymentFlowApi::new(db.clone());
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(paypal))
        .service(PaypalCreateOrderRoute::<SqliteDatabase, MockPaypalProvider>::new());
    let service = test::init_service(app).await;
    let body = json!({ "cartItems": [] });
    for _ in 0..25 {
        let req = TestRequest::post().uri("/payments/paypal/create-order").set_json(&body).to_request();
        let status = match test::try_call_service(&service, req).await {
            Ok(res) => res.status(),
            Err(e) => HttpResponse::from_error(e).status(),
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
