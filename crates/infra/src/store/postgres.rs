//! Postgres-backed product store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (check violation) | `23514` | `Backend` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / network / decode | N/A | `Backend` |
//!
//! `update` and `delete` report a missing row as `NotFound` based on the
//! affected row count.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use catalog_core::{Entity, ProductId};
use catalog_products::{NewProduct, Product, ProductFields};

use super::{ProductStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS product (
    id            SERIAL PRIMARY KEY,
    code          VARCHAR(10)   NOT NULL UNIQUE CHECK (CHAR_LENGTH(code) = 10),
    name          VARCHAR(32),
    price_source  NUMERIC(12,2) NOT NULL CHECK (price_source >= 0),
    price_target  NUMERIC(12,2) NOT NULL CHECK (price_target >= 0),
    description   VARCHAR(128),
    is_available  BOOLEAN       NOT NULL
)
"#;

const SELECT_COLUMNS: &str =
    "id, code, name, price_source, price_target, description, is_available";

/// Product store over a `product` table.
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Create the `product` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self), err)]
    async fn find_all(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM product ORDER BY id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_all", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM product WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, product), fields(code = %product.fields.code), err)]
    async fn insert(&self, product: NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO product (code, name, price_source, price_target, description, is_available)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&product.fields.code)
        .bind(&product.fields.name)
        .bind(product.fields.price_source)
        .bind(product.price_target)
        .bind(&product.fields.description)
        .bind(product.fields.is_available)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        product_from_row(&row)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id()), err)]
    async fn update(&self, product: Product) -> Result<Product, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE product
            SET code = $2, name = $3, price_source = $4, price_target = $5,
                description = $6, is_available = $7
            WHERE id = $1
            "#,
        )
        .bind(product.id().get())
        .bind(product.code())
        .bind(product.name())
        .bind(product.price_source())
        .bind(product.price_target())
        .bind(product.description())
        .bind(product.is_available())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(product.id()));
        }
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete(&self, id: ProductId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Backend(format!("failed to decode product row: {e}"));

    let id: i32 = row.try_get("id").map_err(decode)?;
    let id = ProductId::new(id).map_err(|e| StoreError::Backend(e.to_string()))?;
    let price_target: Decimal = row.try_get("price_target").map_err(decode)?;

    let fields = ProductFields {
        code: row.try_get("code").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        price_source: row.try_get("price_source").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        is_available: row.try_get("is_available").map_err(decode)?,
    };

    Ok(Product::from_new(id, NewProduct::new(fields, price_target)))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::UniqueViolation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Backend(format!("{} failed: {}", operation, other)),
    }
}
