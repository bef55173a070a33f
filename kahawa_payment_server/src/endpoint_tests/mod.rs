mod helpers;
mod mocks;
mod mpesa;
mod paypal;
mod rate_limit;
mod status;
