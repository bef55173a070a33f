use std::env;

use kps_common::parse_boolean_flag;
use log::*;
use mpesa_tools::MpesaConfig;
use paypal_tools::PaypalConfig;

const DEFAULT_KPS_HOST: &str = "127.0.0.1";
const DEFAULT_KPS_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address. Only enable this behind a trusted proxy; the rate limiter keys on this IP.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    pub paypal: PaypalConfig,
    pub mpesa: MpesaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_KPS_HOST.to_string(),
            port: DEFAULT_KPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            paypal: PaypalConfig::default(),
            mpesa: MpesaConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("KPS_HOST").ok().unwrap_or_else(|| DEFAULT_KPS_HOST.into());
        let port = env::var("KPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for KPS_PORT. {e} Using the default, {DEFAULT_KPS_PORT}, instead."
                    );
                    DEFAULT_KPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_KPS_PORT);
        let database_url = env::var("KPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ KPS_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("KPS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("KPS_USE_FORWARDED").ok(), false);
        let paypal = PaypalConfig::new_from_env_or_default();
        let mpesa = MpesaConfig::new_from_env_or_default();
        Self { host, port, database_url, use_x_forwarded_for, use_forwarded, paypal, mpesa }
    }
}
