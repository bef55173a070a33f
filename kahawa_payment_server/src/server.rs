use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use kahawa_payment_engine::{PaymentFlowApi, SqliteDatabase};
use log::{info, warn};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{MpesaGateway, PaypalGateway},
    middleware::RateLimiterStore,
    routes::{
        health,
        MpesaCallbackRoute,
        MpesaInitiateRoute,
        OrderStatusRoute,
        PaypalCaptureOrderRoute,
        PaypalCreateOrderRoute,
        PaypalWebhookRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database migrations are up to date");
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let paypal =
        PaypalGateway::new(config.paypal.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if !paypal.is_configured() {
        warn!("🪛️ PayPal credentials are not set. PayPal checkout will fail until they are configured.");
    }
    let mpesa = MpesaGateway::new(config.mpesa.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // One store for the whole server, shared across workers.
    let rate_limiter = web::Data::new(RateLimiterStore::new());
    let host = config.host.clone();
    let port = config.port;
    let config = Arc::new(config);
    let srv = HttpServer::new(move || {
        let flow_api = PaymentFlowApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("kps::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(paypal.clone()))
            .app_data(web::Data::new(mpesa.clone()))
            .app_data(web::Data::from(config.clone()))
            .app_data(rate_limiter.clone())
            .service(health)
            .service(PaypalCreateOrderRoute::<SqliteDatabase, PaypalGateway>::new())
            .service(PaypalCaptureOrderRoute::<SqliteDatabase, PaypalGateway>::new())
            .service(PaypalWebhookRoute::<SqliteDatabase, PaypalGateway>::new())
            .service(MpesaInitiateRoute::<SqliteDatabase, MpesaGateway>::new())
            .service(MpesaCallbackRoute::<SqliteDatabase>::new())
            .service(OrderStatusRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
