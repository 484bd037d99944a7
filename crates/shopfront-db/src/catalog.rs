use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use shopfront_common::{Error, Money, Result};
use tracing::info;

use crate::database::{Database, db_err, format_timestamp, parse_datetime};
use crate::slug::slugify;

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Active products in this category.
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Fields an admin can edit.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub category_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub image_url: Option<String>,
    pub is_active: bool,
}

impl ProductInput {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("product name is required".into()));
        }
        if self.price.cents() < 0 {
            return Err(Error::Validation("price cannot be negative".into()));
        }
        if self.price > Money::MAX_PRICE {
            return Err(Error::Validation(format!(
                "price cannot exceed {}",
                Money::MAX_PRICE
            )));
        }
        if self.stock < 0 {
            return Err(Error::Validation("stock cannot be negative".into()));
        }
        Ok(())
    }
}

/// One page of results plus enough to render pagination links.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 1;
        }
        let pages = (self.total as u64).div_ceil(u64::from(self.per_page));
        pages.max(1) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

const CATEGORY_SELECT: &str = "SELECT c.id, c.name, c.slug, c.description, c.created_at,
        (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id AND p.is_active = 1)
     FROM categories c";

const PRODUCT_SELECT: &str = "SELECT p.id, p.category_id, c.name, c.slug, p.name, p.slug,
        p.description, p.price_cents, p.stock, p.image_url, p.is_active, p.created_at, p.updated_at
     FROM products p
     LEFT JOIN categories c ON c.id = p.category_id";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
        product_count: row.get(5)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        category_id: row.get(1)?,
        category_name: row.get(2)?,
        category_slug: row.get(3)?,
        name: row.get(4)?,
        slug: row.get(5)?,
        description: row.get(6)?,
        price: Money::from_cents(row.get(7)?),
        stock: row.get(8)?,
        image_url: row.get(9)?,
        is_active: row.get(10)?,
        created_at: parse_datetime(row.get::<_, String>(11)?),
        updated_at: parse_datetime(row.get::<_, String>(12)?),
    })
}

fn query_products<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Product>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(db_err("failed to prepare product query"))?;
    let rows = stmt
        .query_map(params, product_from_row)
        .map_err(db_err("failed to query products"))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err("failed to read product row"))
}

/// `base`, `base-2`, `base-3`, ... whichever is free first.
fn unique_slug(conn: &Connection, table: &'static str, base: &str) -> Result<String> {
    let sql = format!("SELECT count(*) > 0 FROM {table} WHERE slug = ?1");
    let mut candidate = base.to_string();
    let mut suffix = 2;
    loop {
        let taken: bool = conn
            .query_row(&sql, params![candidate], |row| row.get(0))
            .map_err(db_err("failed to check slug"))?;
        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

impl Database {
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!("{CATEGORY_SELECT} ORDER BY c.name COLLATE NOCASE"))
            .map_err(db_err("failed to prepare category query"))?;
        let rows = stmt
            .query_map([], category_from_row)
            .map_err(db_err("failed to query categories"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("failed to read category row"))
    }

    pub fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{CATEGORY_SELECT} WHERE c.slug = ?1"),
            params![slug],
            category_from_row,
        )
        .optional()
        .map_err(db_err("failed to load category"))
    }

    pub fn category_by_id(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{CATEGORY_SELECT} WHERE c.id = ?1"),
            params![id],
            category_from_row,
        )
        .optional()
        .map_err(db_err("failed to load category"))
    }

    pub fn create_category(&self, name: &str, description: &str) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("category name is required".into()));
        }

        let conn = self.connection()?;
        let slug = unique_slug(&conn, "categories", &slugify(name))?;
        conn.execute(
            "INSERT INTO categories (name, slug, description) VALUES (?1, ?2, ?3)",
            params![name, slug, description.trim()],
        )
        .map_err(db_err("failed to create category"))?;

        let id = conn.last_insert_rowid();
        info!("created category {id} ({slug})");
        Ok(id)
    }

    /// Products in the category keep existing and become uncategorized.
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let conn = self.connection()?;
        let removed = conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id])
            .map_err(db_err("failed to delete category"))?;
        if removed == 0 {
            return Err(Error::NotFound(format!("category {id}")));
        }
        info!("deleted category {id}");
        Ok(())
    }

    /// Active products, newest first, optionally limited to one category.
    pub fn products_page(&self, category_id: Option<i64>, page: u32, per_page: u32) -> Result<Page<Product>> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let conn = self.connection()?;
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM products
                 WHERE is_active = 1 AND (?1 IS NULL OR category_id = ?1)",
                params![category_id],
                |row| row.get(0),
            )
            .map_err(db_err("failed to count products"))?;

        let items = query_products(
            &conn,
            &format!(
                "{PRODUCT_SELECT}
                 WHERE p.is_active = 1 AND (?1 IS NULL OR p.category_id = ?1)
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?2 OFFSET ?3"
            ),
            params![category_id, i64::from(per_page), offset],
        )?;

        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    pub fn latest_products(&self, limit: u32) -> Result<Vec<Product>> {
        let conn = self.connection()?;
        query_products(
            &conn,
            &format!(
                "{PRODUCT_SELECT} WHERE p.is_active = 1
                 ORDER BY p.created_at DESC, p.id DESC LIMIT ?1"
            ),
            params![i64::from(limit)],
        )
    }

    /// Case-insensitive substring match on name and description.
    pub fn search_products(&self, term: &str, limit: u32) -> Result<Vec<Product>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connection()?;
        query_products(
            &conn,
            &format!(
                "{PRODUCT_SELECT}
                 WHERE p.is_active = 1
                   AND (p.name LIKE ?1 ESCAPE '\\' OR p.description LIKE ?1 ESCAPE '\\')
                 ORDER BY p.name COLLATE NOCASE LIMIT ?2"
            ),
            params![like_pattern(term), i64::from(limit)],
        )
    }

    /// Storefront lookup: inactive products are hidden.
    pub fn product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{PRODUCT_SELECT} WHERE p.slug = ?1 AND p.is_active = 1"),
            params![slug],
            product_from_row,
        )
        .optional()
        .map_err(db_err("failed to load product"))
    }

    pub fn product_by_id(&self, id: i64) -> Result<Option<Product>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{PRODUCT_SELECT} WHERE p.id = ?1"),
            params![id],
            product_from_row,
        )
        .optional()
        .map_err(db_err("failed to load product"))
    }

    /// Every product including inactive ones, for the backoffice.
    pub fn all_products(&self) -> Result<Vec<Product>> {
        let conn = self.connection()?;
        query_products(
            &conn,
            &format!("{PRODUCT_SELECT} ORDER BY p.name COLLATE NOCASE"),
            params![],
        )
    }

    pub fn create_product(&self, input: &ProductInput) -> Result<i64> {
        input.validate()?;
        let conn = self.connection()?;
        let slug = unique_slug(&conn, "products", &slugify(&input.name))?;
        conn.execute(
            "INSERT INTO products
                (category_id, name, slug, description, price_cents, stock, image_url, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                input.category_id,
                input.name.trim(),
                slug,
                input.description.trim(),
                input.price.cents(),
                input.stock,
                input.image_url,
                input.is_active,
            ],
        )
        .map_err(db_err("failed to create product"))?;

        let id = conn.last_insert_rowid();
        info!("created product {id} ({slug})");
        Ok(id)
    }

    /// The slug is kept so existing links stay valid.
    pub fn update_product(&self, id: i64, input: &ProductInput) -> Result<()> {
        input.validate()?;
        let conn = self.connection()?;
        let updated = conn
            .execute(
                "UPDATE products SET
                    category_id = ?1, name = ?2, description = ?3, price_cents = ?4,
                    stock = ?5, image_url = ?6, is_active = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    input.category_id,
                    input.name.trim(),
                    input.description.trim(),
                    input.price.cents(),
                    input.stock,
                    input.image_url,
                    input.is_active,
                    format_timestamp(Utc::now()),
                    id,
                ],
            )
            .map_err(db_err("failed to update product"))?;
        if updated == 0 {
            return Err(Error::NotFound(format!("product {id}")));
        }
        info!("updated product {id}");
        Ok(())
    }

    /// Add `delta` units to stock (negative to remove). Stock never goes
    /// below zero. Returns the new level.
    pub fn adjust_stock(&self, id: i64, delta: i64) -> Result<i64> {
        let conn = self.connection()?;
        let stock: Option<i64> = conn
            .query_row(
                "UPDATE products SET stock = stock + ?1, updated_at = ?2
                 WHERE id = ?3 AND stock + ?1 >= 0
                 RETURNING stock",
                params![delta, format_timestamp(Utc::now()), id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("failed to adjust stock"))?;

        match stock {
            Some(stock) => {
                info!("product {id} stock adjusted by {delta} to {stock}");
                Ok(stock)
            }
            None => {
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1)",
                        params![id],
                        |row| row.get(0),
                    )
                    .map_err(db_err("failed to load product"))?;
                if exists {
                    Err(Error::Validation("stock cannot go below zero".into()))
                } else {
                    Err(Error::NotFound(format!("product {id}")))
                }
            }
        }
    }

    /// Order history keeps its snapshot of the product.
    pub fn delete_product(&self, id: i64) -> Result<()> {
        let conn = self.connection()?;
        let removed = conn
            .execute("DELETE FROM products WHERE id = ?1", params![id])
            .map_err(db_err("failed to delete product"))?;
        if removed == 0 {
            return Err(Error::NotFound(format!("product {id}")));
        }
        info!("deleted product {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, category_id: Option<i64>, cents: i64, stock: i64) -> ProductInput {
        ProductInput {
            category_id,
            name: name.to_string(),
            description: format!("All about {name}"),
            price: Money::from_cents(cents),
            stock,
            image_url: None,
            is_active: true,
        }
    }

    #[test]
    fn categories_count_only_active_products() {
        let db = Database::in_memory_migrated().unwrap();
        let coffee = db.create_category("Coffee", "Beans").unwrap();
        db.create_product(&input("House Blend", Some(coffee), 1200, 5)).unwrap();
        let mut hidden = input("Old Stock", Some(coffee), 900, 1);
        hidden.is_active = false;
        db.create_product(&hidden).unwrap();

        let categories = db.list_categories().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].slug, "coffee");
        assert_eq!(categories[0].product_count, 1);
    }

    #[test]
    fn slugs_are_made_unique() {
        let db = Database::in_memory_migrated().unwrap();
        let first = db.create_product(&input("Mug", None, 800, 1)).unwrap();
        let second = db.create_product(&input("Mug", None, 900, 1)).unwrap();

        assert_eq!(db.product_by_id(first).unwrap().unwrap().slug, "mug");
        assert_eq!(db.product_by_id(second).unwrap().unwrap().slug, "mug-2");
    }

    #[test]
    fn inactive_products_are_hidden_from_storefront_lookups() {
        let db = Database::in_memory_migrated().unwrap();
        let mut product = input("Secret", None, 100, 1);
        product.is_active = false;
        let id = db.create_product(&product).unwrap();

        assert!(db.product_by_slug("secret").unwrap().is_none());
        assert!(db.product_by_id(id).unwrap().is_some());
        assert_eq!(db.all_products().unwrap().len(), 1);
        assert!(db.latest_products(10).unwrap().is_empty());
    }

    #[test]
    fn pages_through_a_category() {
        let db = Database::in_memory_migrated().unwrap();
        let cat = db.create_category("Tea", "").unwrap();
        for i in 0..5 {
            db.create_product(&input(&format!("Tea {i}"), Some(cat), 500, 3)).unwrap();
        }
        db.create_product(&input("Elsewhere", None, 500, 3)).unwrap();

        let page = db.products_page(Some(cat), 2, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next() && page.has_prev());

        let all = db.products_page(None, 1, 100).unwrap();
        assert_eq!(all.total, 6);
    }

    #[test]
    fn search_matches_name_and_description_and_escapes_wildcards() {
        let db = Database::in_memory_migrated().unwrap();
        db.create_product(&input("Espresso Beans", None, 1500, 2)).unwrap();
        db.create_product(&input("Filter Papers", None, 300, 2)).unwrap();

        assert_eq!(db.search_products("espresso", 10).unwrap().len(), 1);
        assert_eq!(db.search_products("about filter", 10).unwrap().len(), 1);
        assert!(db.search_products("%", 10).unwrap().is_empty());
        assert!(db.search_products("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn update_keeps_slug_and_delete_reports_missing() {
        let db = Database::in_memory_migrated().unwrap();
        let id = db.create_product(&input("Grinder", None, 9900, 1)).unwrap();

        db.update_product(id, &input("Burr Grinder", None, 8900, 4)).unwrap();
        let product = db.product_by_id(id).unwrap().unwrap();
        assert_eq!(product.name, "Burr Grinder");
        assert_eq!(product.slug, "grinder");
        assert_eq!(product.price.cents(), 8900);

        db.delete_product(id).unwrap();
        assert!(matches!(db.delete_product(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn rejects_invalid_product_input() {
        let db = Database::in_memory_migrated().unwrap();
        assert!(db.create_product(&input("  ", None, 100, 1)).is_err());
        assert!(db.create_product(&input("Thing", None, 100, -1)).is_err());
        assert!(db.create_category(" ", "").is_err());
    }

    #[test]
    fn rejects_prices_above_the_ceiling() {
        let db = Database::in_memory_migrated().unwrap();
        let max = Money::MAX_PRICE.cents();
        assert!(db.create_product(&input("Yacht", None, max, 1)).is_ok());
        assert!(matches!(
            db.create_product(&input("Island", None, max + 1, 1)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn deleting_a_category_uncategorizes_its_products() {
        let db = Database::in_memory_migrated().unwrap();
        let cat = db.create_category("Gear", "").unwrap();
        let id = db.create_product(&input("Scale", Some(cat), 2500, 1)).unwrap();

        db.delete_category(cat).unwrap();
        assert_eq!(db.product_by_id(id).unwrap().unwrap().category_id, None);
    }

    #[test]
    fn stock_adjustments_never_go_negative() {
        let db = Database::in_memory_migrated().unwrap();
        let id = db.create_product(&input("Kettle", None, 4500, 2)).unwrap();

        assert_eq!(db.adjust_stock(id, 5).unwrap(), 7);
        assert_eq!(db.adjust_stock(id, -7).unwrap(), 0);
        assert!(matches!(db.adjust_stock(id, -1), Err(Error::Validation(_))));
        assert!(matches!(db.adjust_stock(999, 1), Err(Error::NotFound(_))));
    }
}
