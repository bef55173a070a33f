use kahawa_payment_engine::{sqlite::db::products, SqliteDatabase};
use kps_common::Cents;

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
