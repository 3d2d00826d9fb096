//! # Product Repository
//!
//! Database operations for products and their recipes.
//!
//! A product loads as two queries (row + ordered recipe lines); balances
//! are owned by the ledger, exactly as for materials.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use fieldpos_core::{Product, ProductCategory, RecipeLine};

use crate::error::{DbError, DbResult};
use crate::repository::parse_decimal;

#[derive(Debug, FromRow)]
pub(crate) struct ProductRow {
    id: String,
    name: String,
    category: String,
    produced: bool,
    stock: String,
    selling_price: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RecipeLineRow {
    material_id: String,
    amount_per_unit: String,
}

impl ProductRow {
    fn into_product(self, recipe: Vec<RecipeLine>) -> DbResult<Product> {
        let category = match self.category.as_str() {
            "food" => ProductCategory::Food,
            "beverage" => ProductCategory::Beverage,
            other => {
                return Err(DbError::Corrupt {
                    entity: "Product".to_string(),
                    id: self.id.clone(),
                    field: "category".to_string(),
                    value: other.to_string(),
                })
            }
        };
        Ok(Product {
            stock: parse_decimal("Product", &self.id, "stock", &self.stock)?,
            selling_price: parse_decimal(
                "Product",
                &self.id,
                "selling_price",
                &self.selling_price,
            )?,
            id: self.id,
            name: self.name,
            category,
            recipe,
            produced: self.produced,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_PRODUCT: &str = "SELECT id, name, category, produced, stock, selling_price, \
                              created_at, updated_at FROM products";

/// Repository for product catalog operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists all products (with recipes) ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let recipe = self.recipe_of(&row.id).await?;
            products.push(row.into_product(recipe)?);
        }
        Ok(products)
    }

    /// Gets a product by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let recipe = self.recipe_of(&row.id).await?;
                Ok(Some(row.into_product(recipe)?))
            }
            None => Ok(None),
        }
    }

    async fn recipe_of(&self, product_id: &str) -> DbResult<Vec<RecipeLine>> {
        let rows = sqlx::query_as::<_, RecipeLineRow>(
            "SELECT material_id, amount_per_unit FROM recipe_lines \
             WHERE product_id = ?1 ORDER BY position",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(RecipeLine {
                    amount_per_unit: parse_decimal(
                        "RecipeLine",
                        product_id,
                        "amount_per_unit",
                        &r.amount_per_unit,
                    )?,
                    material_id: r.material_id,
                })
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped operations
    // -------------------------------------------------------------------------

    /// Gets a product (with recipe) inside an atomic unit.
    pub async fn get_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let recipe = Self::recipe_in_tx(conn, &row.id).await?;
                Ok(Some(row.into_product(recipe)?))
            }
            None => Ok(None),
        }
    }

    /// Looks a product up by its unique name.
    pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE name = ?1"))
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let recipe = Self::recipe_in_tx(conn, &row.id).await?;
                Ok(Some(row.into_product(recipe)?))
            }
            None => Ok(None),
        }
    }

    async fn recipe_in_tx(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<Vec<RecipeLine>> {
        let rows = sqlx::query_as::<_, RecipeLineRow>(
            "SELECT material_id, amount_per_unit FROM recipe_lines \
             WHERE product_id = ?1 ORDER BY position",
        )
        .bind(product_id)
        .fetch_all(conn)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(RecipeLine {
                    amount_per_unit: parse_decimal(
                        "RecipeLine",
                        product_id,
                        "amount_per_unit",
                        &r.amount_per_unit,
                    )?,
                    material_id: r.material_id,
                })
            })
            .collect()
    }

    /// Inserts a product and its recipe lines.
    pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, produced, stock, selling_price,
                                  created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.category.as_str())
        .bind(product.produced)
        .bind(product.stock.to_string())
        .bind(product.selling_price.to_string())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *conn)
        .await?;

        for (position, line) in product.recipe.iter().enumerate() {
            sqlx::query(
                "INSERT INTO recipe_lines (product_id, position, material_id, amount_per_unit) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&product.id)
            .bind(position as i64)
            .bind(&line.material_id)
            .bind(line.amount_per_unit.to_string())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}
