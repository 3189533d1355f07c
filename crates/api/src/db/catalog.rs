//! Catalog repository: categories, products and variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use lumina_core::pricing::round_cents;
use lumina_core::{CategoryId, ProductId, UserId, VariantId};

use super::{RepositoryError, contains_pattern, map_constraint};
use crate::models::{
    Category, LowStockEntry, Product, ProductDetail, ProductVariant, ViewedProduct,
};

const PRODUCT_COLUMNS: &str = "id, category_id, name, slug, sku, description, price, sale_price, \
     stock_quantity, is_active, is_featured, rating, review_count, created_at, updated_at";

/// `PRODUCT_COLUMNS` for queries joining `products p` to another table.
pub(crate) const JOINED_PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.slug, p.sku, \
     p.description, p.price, p.sale_price, p.stock_quantity, p.is_active, p.is_featured, \
     p.rating, p.review_count, p.created_at, p.updated_at";

const VARIANT_COLUMNS: &str =
    "id, product_id, name, sku, price, sale_price, stock_quantity, is_active";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    sort_order: i32,
    products_count: i64,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            sort_order: row.sort_order,
            products_count: row.products_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: i64,
    category_id: i64,
    name: String,
    slug: String,
    sku: String,
    description: Option<String>,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock_quantity: i32,
    is_active: bool,
    is_featured: bool,
    rating: Decimal,
    review_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            category_id: CategoryId::new(row.category_id),
            name: row.name,
            slug: row.slug,
            sku: row.sku,
            description: row.description,
            price: round_cents(row.price),
            sale_price: row.sale_price.map(round_cents),
            stock_quantity: row.stock_quantity,
            is_active: row.is_active,
            is_featured: row.is_featured,
            rating: row.rating,
            review_count: row.review_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i64,
    product_id: i64,
    name: String,
    sku: String,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock_quantity: i32,
    is_active: bool,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            sku: row.sku,
            price: round_cents(row.price),
            sale_price: row.sale_price.map(round_cents),
            stock_quantity: row.stock_quantity,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ViewedProductRow {
    viewed_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl From<ViewedProductRow> for ViewedProduct {
    fn from(row: ViewedProductRow) -> Self {
        Self {
            product: row.product.into(),
            viewed_at: row.viewed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LowStockRow {
    product_id: i64,
    product_name: String,
    variant_id: Option<i64>,
    variant_name: Option<String>,
    sku: String,
    stock_quantity: i32,
}

impl From<LowStockRow> for LowStockEntry {
    fn from(row: LowStockRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            variant_id: row.variant_id.map(VariantId::new),
            variant_name: row.variant_name,
            sku: row.sku,
            stock_quantity: row.stock_quantity,
        }
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Column a product listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Price,
    Rating,
    #[default]
    Newest,
    Name,
}

impl ProductSort {
    const fn column(self) -> &'static str {
        match self {
            Self::Price => "LEAST(COALESCE(sale_price, price), price)",
            Self::Rating => "rating",
            Self::Newest => "created_at",
            Self::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters for the public product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub order: SortOrder,
}

/// Fields for a new category.
#[derive(Debug, Clone)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub sort_order: i32,
}

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub category_id: CategoryId,
    pub name: &'a str,
    pub slug: &'a str,
    pub sku: &'a str,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub is_featured: bool,
    pub rating: Decimal,
}

/// Fields for a new variant.
#[derive(Debug, Clone)]
pub struct NewVariant<'a> {
    pub product_id: ProductId,
    pub name: &'a str,
    pub sku: &'a str,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads and seeding.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List purchasable products (active and in stock).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active AND stock_quantity > 0"
        ));

        if let Some(category_id) = filter.category_id {
            query.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = contains_pattern(search);
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(r" ESCAPE '\' OR description ILIKE ")
                .push_bind(pattern)
                .push(r" ESCAPE '\')");
        }
        if let Some(min_price) = filter.min_price {
            query.push(" AND price >= ").push_bind(min_price);
        }
        if let Some(max_price) = filter.max_price {
            query.push(" AND price <= ").push_bind(max_price);
        }

        let direction = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        query
            .push(format!(
                " ORDER BY {} {direction}, id {direction}",
                filter.sort.column()
            ))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Newest featured products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active AND is_featured
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Match active products by name, description or SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active
              AND (name ILIKE $1 ESCAPE '\' OR description ILIKE $1 ESCAPE '\'
                   OR sku ILIKE $1 ESCAPE '\')
            ORDER BY rating DESC, name ASC
            LIMIT $2
            "
        ))
        .bind(contains_pattern(term))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product regardless of whether it is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get an active product with its category and active variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_detail(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = self.get_product(id).await?.filter(|p| p.is_active) else {
            return Ok(None);
        };

        let category = self.get_category(product.category_id).await?;
        let variants = self.active_variants(id).await?;

        Ok(Some(ProductDetail {
            product,
            category,
            variants,
        }))
    }

    /// Active variants of a product, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn active_variants(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            SELECT {VARIANT_COLUMNS}
            FROM product_variants
            WHERE product_id = $1 AND is_active
            ORDER BY LEAST(COALESCE(sale_price, price), price) ASC, id ASC
            "
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a variant by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Best-rated active products from the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn similar(&self, product: &Product, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE category_id = $1 AND id <> $2 AND is_active AND stock_quantity > 0
            ORDER BY rating DESC, id ASC
            LIMIT $3
            "
        ))
        .bind(product.category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Remember that `user_id` opened the product. Repeat views only move
    /// `viewed_at` forward.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn record_view(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO recently_viewed (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO UPDATE SET viewed_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Products the user viewed, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn recently_viewed(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<ViewedProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, ViewedProductRow>(&format!(
            r"
            SELECT rv.viewed_at, {JOINED_PRODUCT_COLUMNS}
            FROM recently_viewed rv
            JOIN products p ON p.id = rv.product_id
            WHERE rv.user_id = $1
            ORDER BY rv.viewed_at DESC, p.id DESC
            LIMIT $2
            "
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active categories with their count of purchasable products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT c.id, c.name, c.slug, c.description, c.sort_order,
                   (SELECT COUNT(*) FROM products p
                     WHERE p.category_id = c.id AND p.is_active AND p.stock_quantity > 0)
                     AS products_count
            FROM categories c
            WHERE c.is_active
            ORDER BY c.sort_order ASC, c.name ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an active category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT c.id, c.name, c.slug, c.description, c.sort_order,
                   (SELECT COUNT(*) FROM products p
                     WHERE p.category_id = c.id AND p.is_active AND p.stock_quantity > 0)
                     AS products_count
            FROM categories c
            WHERE c.id = $1 AND c.is_active
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Active products and variants whose stock is at or below `threshold`.
    ///
    /// Products with variants are reported per variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r"
            SELECT p.id AS product_id, p.name AS product_name,
                   NULL::BIGINT AS variant_id, NULL::TEXT AS variant_name,
                   p.sku, p.stock_quantity
            FROM products p
            WHERE p.is_active
              AND p.stock_quantity <= $1
              AND NOT EXISTS (SELECT 1 FROM product_variants v WHERE v.product_id = p.id)
            UNION ALL
            SELECT p.id, p.name, v.id, v.name, v.sku, v.stock_quantity
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE p.is_active AND v.is_active AND v.stock_quantity <= $1
            ORDER BY stock_quantity ASC, sku ASC
            ",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, category), fields(slug = category.slug))]
    pub async fn create_category(
        &self,
        category: &NewCategory<'_>,
    ) -> Result<CategoryId, RepositoryError> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO categories (name, slug, description, sort_order)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(category.name)
        .bind(category.slug)
        .bind(category.description)
        .bind(category.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "category slug already exists"))?;

        Ok(CategoryId::new(id))
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    #[instrument(skip(self, product), fields(sku = product.sku))]
    pub async fn create_product(&self, product: &NewProduct<'_>) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products
                (category_id, name, slug, sku, description, price, sale_price,
                 stock_quantity, is_featured, rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(product.category_id)
        .bind(product.name)
        .bind(product.slug)
        .bind(product.sku)
        .bind(product.description)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(product.stock_quantity)
        .bind(product.is_featured)
        .bind(product.rating)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "product slug or sku already exists"))?;

        Ok(row.into())
    }

    /// Insert a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken.
    #[instrument(skip(self, variant), fields(sku = variant.sku))]
    pub async fn create_variant(
        &self,
        variant: &NewVariant<'_>,
    ) -> Result<ProductVariant, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            INSERT INTO product_variants
                (product_id, name, sku, price, sale_price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(variant.product_id)
        .bind(variant.name)
        .bind(variant.sku)
        .bind(variant.price)
        .bind(variant.sale_price)
        .bind(variant.stock_quantity)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "variant sku already exists"))?;

        Ok(row.into())
    }
}
