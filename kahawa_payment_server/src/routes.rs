//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (e.g. I/O, database operations,
//! provider REST calls) must be expressed as futures or asynchronous functions, so worker threads can interleave them.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use kahawa_payment_engine::{
    flow::{CaptureResult, MpesaOrderSource, NotificationOutcome, PushInitiation},
    traits::{
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PushProvider,
        RedirectProvider,
        StorefrontDatabase,
        WebhookSignature,
    },
    PaymentFlowApi,
};
use log::*;
use serde_json::{json, Value};

use crate::{
    config::ServerConfig,
    data_objects::{
        parse_stk_callback,
        parse_webhook_event,
        CallbackTokenQuery,
        CaptureOrderBody,
        CheckoutBody,
        PaypalCreateOrderResponse,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where limit $max:literal) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::RateLimitMiddlewareFactory::new($max));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//-----------------------------------------   PayPal checkout  -------------------------------------------------

route!(paypal_create_order => Post "/payments/paypal/create-order" impl StorefrontDatabase, RedirectProvider where limit 20);
/// Prices the submitted cart against the catalog and opens a PayPal checkout session for it.
///
/// The client-declared total is only a cross-check; the catalog price is what gets charged. A total off by more
/// than one cent is a 400.
pub async fn paypal_create_order<B, P>(
    api: web::Data<PaymentFlowApi<B>>,
    provider: web::Data<P>,
    body: web::Json<CheckoutBody>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    P: RedirectProvider,
{
    trace!("💻️ Received PayPal create-order request");
    let checkout = body.to_checkout_request()?;
    let result = api.create_paypal_order(provider.get_ref(), checkout).await?;
    debug!("💻️ Order [{}] opened as PayPal session {}", result.local_order_id, result.paypal_order_id);
    let response = PaypalCreateOrderResponse {
        order_id: result.paypal_order_id,
        local_order_id: result.local_order_id.to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(paypal_capture_order => Post "/payments/paypal/capture-order" impl PaymentGatewayDatabase, RedirectProvider where limit 25);
/// Captures an approved PayPal checkout session. Safe to retry: capturing an already-paid order acknowledges
/// without contacting PayPal again.
pub async fn paypal_capture_order<B, P>(
    api: web::Data<PaymentFlowApi<B>>,
    provider: web::Data<P>,
    body: web::Json<CaptureOrderBody>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    P: RedirectProvider,
{
    trace!("💻️ Received PayPal capture request for {}", body.order_id);
    let local_id = body.local_order_id.parse().map_err(PaymentGatewayError::from)?;
    let result = api.capture_paypal_order(provider.get_ref(), &local_id, &body.order_id).await?;
    let response = match result {
        CaptureResult::Captured { order_id, capture_id } => Ok(HttpResponse::Ok()
            .json(json!({ "ok": true, "status": "paid", "orderId": order_id, "captureId": capture_id }))),
        CaptureResult::AlreadyCaptured { order_id } => {
            Ok(HttpResponse::Ok().json(json!({ "ok": true, "alreadyCaptured": true, "orderId": order_id })))
        },
        CaptureResult::Declined { order_id } => Ok(HttpResponse::BadRequest()
            .json(json!({ "ok": false, "status": "failed", "orderId": order_id }))),
    };
    response
}

//-----------------------------------------   M-Pesa STK push  -------------------------------------------------

route!(mpesa_initiate => Post "/payments/mpesa/initiate" impl StorefrontDatabase, PushProvider where limit 20);
/// Sends an STK push, either for an existing order (retry) or a fresh cart.
///
/// A `localOrderId` that matches no order falls through to creating a new one, so a storefront that lost its
/// local state can still check out.
pub async fn mpesa_initiate<B, P>(
    api: web::Data<PaymentFlowApi<B>>,
    provider: web::Data<P>,
    body: web::Json<CheckoutBody>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    P: PushProvider,
{
    trace!("💻️ Received M-Pesa initiate request");
    let mut source = None;
    if let Some(id) = &body.local_order_id {
        if let Ok(order_id) = id.parse() {
            if api.fetch_order(&order_id).await?.is_some() {
                source = Some(MpesaOrderSource::Existing(order_id));
            }
        }
    }
    let source = match source {
        Some(source) => source,
        None => MpesaOrderSource::New(body.to_checkout_request()?),
    };
    let phone = body.phone.clone().unwrap_or_default();
    let result = api.initiate_mpesa_push(provider.get_ref(), &phone, source).await?;
    let response = match result {
        PushInitiation::Sent { order_id, checkout_request_id, customer_message, mock } => json!({
            "ok": true,
            "localOrderId": order_id,
            "checkoutRequestId": checkout_request_id,
            "customerMessage": customer_message,
            "mock": mock,
        }),
        PushInitiation::AlreadyPaid { order_id } => {
            json!({ "ok": true, "alreadyPaid": true, "localOrderId": order_id })
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(mpesa_callback => Post "/payments/mpesa/callback" impl PaymentGatewayDatabase where limit 120);
/// Receives STK result callbacks from Daraja.
///
/// Daraja does not sign callbacks; the shared token in the query string is the only authentication, and it is only
/// enforced when a token is configured. Once past the token check, the callback is always acknowledged with a 200
/// so Daraja stops redelivering, whatever the reconciliation outcome was.
pub async fn mpesa_callback<B>(
    api: web::Data<PaymentFlowApi<B>>,
    config: web::Data<ServerConfig>,
    query: web::Query<CallbackTokenQuery>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
{
    trace!("💻️ Received M-Pesa callback");
    let expected = config.mpesa.callback_token.reveal();
    if !expected.is_empty() && query.token.as_deref() != Some(expected.as_str()) {
        warn!("💻️ M-Pesa callback presented an invalid token. Rejected.");
        return Err(ServerError::InvalidCallbackToken);
    }
    let raw = body.into_inner();
    let Some(callback) = parse_stk_callback(&raw) else {
        warn!("💻️ M-Pesa callback carries no checkout request id. Rejected.");
        return Err(ServerError::InvalidRequestBody("CheckoutRequestID missing".to_string()));
    };
    let outcome = api.handle_mpesa_callback(callback, raw).await?;
    Ok(HttpResponse::Ok().json(notification_ack(outcome)))
}

//-----------------------------------------   PayPal webhooks  -------------------------------------------------

route!(paypal_webhook => Post "/payments/paypal/webhook" impl PaymentGatewayDatabase, RedirectProvider where limit 120);
/// Receives webhook events from PayPal.
///
/// Every delivery is verified against PayPal's verification endpoint before the engine sees it. Verified
/// deliveries are always acknowledged with a 200, whatever the reconciliation outcome was.
pub async fn paypal_webhook<B, P>(
    req: HttpRequest,
    api: web::Data<PaymentFlowApi<B>>,
    provider: web::Data<P>,
    config: web::Data<ServerConfig>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    P: RedirectProvider,
{
    trace!("💻️ Received PayPal webhook");
    if config.paypal.webhook_id.is_empty() {
        return Err(ServerError::ConfigurationError("PAYPAL_WEBHOOK_ID is not configured".to_string()));
    }
    let signature = webhook_signature_from_headers(&req)
        .ok_or_else(|| ServerError::BadRequest("Missing PayPal signature headers".to_string()))?;
    let event = body.into_inner();
    let verified = provider
        .verify_webhook_signature(&signature, &event)
        .await
        .map_err(|e| ServerError::UpstreamError(e.to_string()))?;
    if !verified {
        warn!("💻️ PayPal webhook failed signature verification. Rejected.");
        return Err(ServerError::InvalidWebhookSignature);
    }
    let Some(notification) = parse_webhook_event(&event) else {
        warn!("💻️ PayPal webhook body has no event id or type. Rejected.");
        return Err(ServerError::InvalidRequestBody("Malformed PayPal webhook event".to_string()));
    };
    let outcome = api.handle_paypal_webhook(notification).await?;
    Ok(HttpResponse::Ok().json(notification_ack(outcome)))
}

fn webhook_signature_from_headers(req: &HttpRequest) -> Option<WebhookSignature> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok()).map(String::from);
    Some(WebhookSignature {
        transmission_id: header("paypal-transmission-id")?,
        transmission_time: header("paypal-transmission-time")?,
        transmission_sig: header("paypal-transmission-sig")?,
        cert_url: header("paypal-cert-url")?,
        auth_algo: header("paypal-auth-algo")?,
    })
}

fn notification_ack(outcome: NotificationOutcome) -> Value {
    match outcome {
        NotificationOutcome::Applied { order_id, status } => {
            json!({ "ok": true, "orderId": order_id, "status": status })
        },
        NotificationOutcome::Duplicate { order_id } => json!({ "ok": true, "orderId": order_id, "duplicate": true }),
        NotificationOutcome::AlreadyPaid { order_id } => {
            json!({ "ok": true, "orderId": order_id, "alreadyProcessed": true })
        },
        NotificationOutcome::Recorded { order_id } => json!({ "ok": true, "ignored": true, "orderId": order_id }),
        NotificationOutcome::Unmatched => json!({ "ok": true, "ignored": true }),
    }
}

//-----------------------------------------    Order status    -------------------------------------------------

route!(order_status => Get "/payments/orders/{order_id}/status" impl PaymentGatewayDatabase where limit 60);
/// The status projection the storefront polls after checkout. Only status fields leave the server; customer
/// details stay in the database.
pub async fn order_status<B>(
    api: web::Data<PaymentFlowApi<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
{
    let order_id = path.into_inner();
    trace!("💻️ Received status request for order {order_id}");
    let projection = api.order_status(&order_id).await?;
    Ok(HttpResponse::Ok().json(projection))
}
