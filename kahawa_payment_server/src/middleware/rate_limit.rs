//! Fixed-window rate limiting middleware. It can be placed on any route or service.
//!
//! Each route carries its own request ceiling; counts are keyed on client IP and path, so a burst against one
//! endpoint does not starve the others. When the ceiling is hit the request is refused with a 429 before the
//! handler runs.

use std::{
    collections::HashMap,
    pin::Pin,
    rc::Rc,
    sync::Mutex,
    time::{Duration, Instant},
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures::{
    future::{ok, Ready},
    Future,
};

use crate::{config::ServerConfig, errors::ServerError, helpers::get_remote_ip};

/// Length of the counting window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Shared request counters. One store serves the whole server; entries are replaced in place when their window
/// expires, so the map stays bounded by the number of active (ip, path) pairs.
#[derive(Default)]
pub struct RateLimiterStore {
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit against `key` and reports whether it is still within `max` for the current window.
    pub fn check(&self, key: &str, max: u32) -> bool {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // The map stays usable even if a worker panicked while holding the lock.
            Err(poisoned) => poisoned.into_inner(),
        };
        match windows.get_mut(key) {
            Some((start, count)) if now.duration_since(*start) < RATE_LIMIT_WINDOW => {
                if *count >= max {
                    return false;
                }
                *count += 1;
                true
            },
            _ => {
                windows.insert(key.to_string(), (now, 1));
                true
            },
        }
    }
}

pub struct RateLimitMiddlewareFactory {
    max_requests: u32,
}

impl RateLimitMiddlewareFactory {
    pub fn new(max_requests: u32) -> Self {
        Self { max_requests }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = RateLimitMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddlewareService { max_requests: self.max_requests, service: Rc::new(service) })
    }
}

pub struct RateLimitMiddlewareService<S> {
    max_requests: u32,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let max_requests = self.max_requests;
        Box::pin(async move {
            let store = req.app_data::<web::Data<RateLimiterStore>>().cloned();
            let config = req.app_data::<web::Data<ServerConfig>>().cloned();
            if let Some(store) = store {
                let (use_xff, use_fwd) = config.map(|c| (c.use_x_forwarded_for, c.use_forwarded)).unwrap_or((false, false));
                let ip = get_remote_ip(req.request(), use_xff, use_fwd)
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let key = format!("{ip}:{}", req.path());
                if !store.check(&key, max_requests) {
                    log::warn!("💻️ Rate limit hit for {key}");
                    return Err(ServerError::RateLimited.into());
                }
            }
            service.call(req).await
        })
    }
}
