use kps_common::Cents;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::Product;

pub async fn fetch_products(ids: &[String], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("SELECT id, name, price FROM products WHERE id IN (");
    let mut values = builder.separated(", ");
    for id in ids {
        values.push_bind(id);
    }
    builder.push(")");
    let products = builder.build_query_as().fetch_all(conn).await?;
    Ok(products)
}

/// Inserts or replaces a catalog entry. The storefront admin back office owns the catalog; this is exposed for
/// seeding and tests.
pub async fn upsert_product(
    id: &str,
    name: &str,
    price: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO products (id, name, price) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = $2, price = $3, updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(price)
    .execute(conn)
    .await?;
    Ok(())
}
