//! Seed the database with a small demo catalog.
//!
//! Safe to run repeatedly: categories are matched by slug and products and
//! variants by SKU, so existing rows are left alone.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;

struct SeedCategory {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
}

struct SeedVariant {
    name: &'static str,
    sku: &'static str,
    price_cents: i64,
    stock: i32,
}

struct SeedProduct {
    category_slug: &'static str,
    name: &'static str,
    slug: &'static str,
    sku: &'static str,
    description: &'static str,
    price_cents: i64,
    sale_price_cents: Option<i64>,
    stock: i32,
    featured: bool,
    /// Hundredths of a star.
    rating: i64,
    variants: &'static [SeedVariant],
}

const CATEGORIES: &[SeedCategory] = &[
    SeedCategory {
        name: "Skincare",
        slug: "skincare",
        description: "Products for healthy skin",
    },
    SeedCategory {
        name: "Makeup",
        slug: "makeup",
        description: "Cosmetics and beauty products",
    },
    SeedCategory {
        name: "Hair Care",
        slug: "hair-care",
        description: "Shampoos, conditioners and hair treatments",
    },
    SeedCategory {
        name: "Fragrance",
        slug: "fragrance",
        description: "Perfumes and colognes",
    },
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        category_slug: "skincare",
        name: "Hydrating Facial Cleanser",
        slug: "hydrating-facial-cleanser",
        sku: "HFC001",
        description: "Gentle cleanser for all skin types",
        price_cents: 2599,
        sale_price_cents: None,
        stock: 100,
        featured: true,
        rating: 450,
        variants: &[],
    },
    SeedProduct {
        category_slug: "skincare",
        name: "Vitamin C Brightening Serum",
        slug: "vitamin-c-brightening-serum",
        sku: "VCS001",
        description: "Daily serum for an even, radiant tone",
        price_cents: 3800,
        sale_price_cents: Some(3200),
        stock: 40,
        featured: true,
        rating: 480,
        variants: &[],
    },
    SeedProduct {
        category_slug: "makeup",
        name: "Matte Lipstick",
        slug: "matte-lipstick",
        sku: "MLS001",
        description: "Long-lasting matte lipstick",
        price_cents: 1850,
        sale_price_cents: None,
        stock: 75,
        featured: false,
        rating: 420,
        variants: &[
            SeedVariant {
                name: "Ruby Red",
                sku: "MLS001-RR",
                price_cents: 1850,
                stock: 30,
            },
            SeedVariant {
                name: "Nude Rose",
                sku: "MLS001-NR",
                price_cents: 1850,
                stock: 25,
            },
            SeedVariant {
                name: "Berry Bold",
                sku: "MLS001-BB",
                price_cents: 1950,
                stock: 8,
            },
        ],
    },
    SeedProduct {
        category_slug: "hair-care",
        name: "Argan Oil Hair Treatment",
        slug: "argan-oil-hair-treatment",
        sku: "AOHT001",
        description: "Nourishing treatment for damaged hair",
        price_cents: 3200,
        sale_price_cents: None,
        stock: 50,
        featured: false,
        rating: 470,
        variants: &[],
    },
    SeedProduct {
        category_slug: "fragrance",
        name: "Eau de Parfum Bloom",
        slug: "eau-de-parfum-bloom",
        sku: "EDPB001",
        description: "Floral fragrance with notes of peony and musk",
        price_cents: 6400,
        sale_price_cents: None,
        stock: 20,
        featured: true,
        rating: 460,
        variants: &[
            SeedVariant {
                name: "30 ml",
                sku: "EDPB001-30",
                price_cents: 6400,
                stock: 12,
            },
            SeedVariant {
                name: "50 ml",
                sku: "EDPB001-50",
                price_cents: 8900,
                stock: 6,
            },
        ],
    },
];

fn cents(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Insert the demo categories, products and variants.
///
/// # Errors
///
/// Returns an error if the connection or any insert fails.
pub async fn catalog() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let mut tx = pool.begin().await?;
    let mut inserted = 0_u32;

    for (sort_order, category) in (0_i32..).zip(CATEGORIES) {
        sqlx::query(
            r"
            INSERT INTO categories (name, slug, description, sort_order)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(category.name)
        .bind(category.slug)
        .bind(category.description)
        .bind(sort_order)
        .execute(&mut *tx)
        .await?;
    }

    for product in PRODUCTS {
        let product_id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO products
                (category_id, name, slug, sku, description, price, sale_price,
                 stock_quantity, is_featured, rating)
            SELECT c.id, $2, $3, $4, $5, $6, $7, $8, $9, $10
            FROM categories c
            WHERE c.slug = $1
            ON CONFLICT (sku) DO NOTHING
            RETURNING id
            ",
        )
        .bind(product.category_slug)
        .bind(product.name)
        .bind(product.slug)
        .bind(product.sku)
        .bind(product.description)
        .bind(cents(product.price_cents))
        .bind(product.sale_price_cents.map(cents))
        .bind(product.stock)
        .bind(product.featured)
        .bind(cents(product.rating))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(product_id) = product_id else {
            info!(sku = product.sku, "product exists, skipping");
            continue;
        };
        inserted += 1;

        for variant in product.variants {
            sqlx::query(
                r"
                INSERT INTO product_variants (product_id, name, sku, price, stock_quantity)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (sku) DO NOTHING
                ",
            )
            .bind(product_id)
            .bind(variant.name)
            .bind(variant.sku)
            .bind(cents(variant.price_cents))
            .bind(variant.stock)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    report(&pool, inserted).await
}

async fn report(pool: &PgPool, inserted: u32) -> Result<(), Box<dyn std::error::Error>> {
    let (categories, products, variants) = sqlx::query_as::<_, (i64, i64, i64)>(
        r"
        SELECT (SELECT COUNT(*) FROM categories),
               (SELECT COUNT(*) FROM products),
               (SELECT COUNT(*) FROM product_variants)
        ",
    )
    .fetch_one(pool)
    .await?;

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Catalog now has {categories} categories, {products} products, {variants} variants");
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_cents() {
        assert_eq!(cents(2599), dec!(25.99));
        assert_eq!(cents(3200), dec!(32.00));
    }

    #[test]
    fn test_seed_data_is_consistent() {
        for product in PRODUCTS {
            assert!(
                CATEGORIES.iter().any(|c| c.slug == product.category_slug),
                "{} has unknown category",
                product.sku
            );
            if let Some(sale) = product.sale_price_cents {
                assert!(sale < product.price_cents);
            }
            for variant in product.variants {
                assert!(variant.sku.starts_with(product.sku));
            }
        }
    }
}
