use crate::{db_types::Product, traits::PaymentGatewayError};

/// Read-only catalog access. The engine never writes to the catalog; it only needs current prices and names to
/// price a cart server-side.
#[allow(async_fn_in_trait)]
pub trait CatalogReader {
    /// Fetches the products with the given ids. Ids that do not exist are simply absent from the result; the
    /// caller decides whether that is an error.
    async fn fetch_products(&self, ids: &[String]) -> Result<Vec<Product>, PaymentGatewayError>;
}
