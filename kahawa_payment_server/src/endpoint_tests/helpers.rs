use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App, HttpResponse};
use kahawa_payment_engine::{
    db_types::{NewOrder, NewOrderItem, Order, PaymentProvider},
    sqlite::db::products,
    traits::PaymentGatewayDatabase,
    SqliteDatabase,
};
use kps_common::{Cents, Secret};

use crate::config::ServerConfig;

pub const TEST_CALLBACK_TOKEN: &str = "kahawa-test-token";
pub const TEST_WEBHOOK_ID: &str = "1JE84502H8002860M";

/// A server config with the callback token and webhook id set. Provider credentials stay empty; endpoint tests
/// talk to mocked gateways.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.mpesa.callback_token = Secret::new(TEST_CALLBACK_TOKEN.to_string());
    config.paypal.webhook_id = TEST_WEBHOOK_ID.to_string();
    config
}

/// An in-memory database with the schema applied and a small catalog loaded. The pool is capped at one connection
/// so every query sees the same in-memory database.
pub async fn memory_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating in-memory database");
    db.migrate().await.expect("Error running migrations");
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    products::upsert_product("arabica-250g", "Arabica 250g", Cents::from(1850), &mut conn).await.unwrap();
    products::upsert_product("robusta-500g", "Robusta 500g", Cents::from(2400), &mut conn).await.unwrap();
    db
}

/// Inserts a pending M-Pesa order for one bag of robusta.
pub async fn seeded_mpesa_order(db: &SqliteDatabase) -> Order {
    let items = vec![NewOrderItem {
        product_id: "robusta-500g".to_string(),
        name: "Robusta 500g".to_string(),
        quantity: 1,
        price: Cents::from(2400),
    }];
    db.insert_order(NewOrder::new(items, Cents::from(2400), PaymentProvider::Mpesa)).await.unwrap()
}

/// Inserts a pending PayPal order for two bags of arabica, attached to the given checkout session id.
pub async fn seeded_paypal_order(db: &SqliteDatabase, session_id: &str) -> Order {
    let items = vec![NewOrderItem {
        product_id: "arabica-250g".to_string(),
        name: "Arabica 250g".to_string(),
        quantity: 2,
        price: Cents::from(1850),
    }];
    let order = db.insert_order(NewOrder::new(items, Cents::from(3700), PaymentProvider::Paypal)).await.unwrap();
    db.set_paypal_order_id(&order.id, session_id).await.unwrap()
}

/// Builds an app from `configure`, fires `req` at it, and returns the status and body. Handler errors are rendered
/// through the error response path, the same way a live server renders them.
pub async fn send_request(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let (_, res) = res.into_parts();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        Err(e) => {
            let res = HttpResponse::from_error(e);
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
    }
}
