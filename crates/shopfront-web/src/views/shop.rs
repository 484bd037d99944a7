use std::fmt::Write;

use axum::response::Html;
use shopfront_common::Money;
use shopfront_db::{Category, Page, Product};

use super::{PageContext, escape, layout, pagination};

fn product_card(ctx: &PageContext, product: &Product) -> String {
    let image = product
        .image_url
        .as_deref()
        .map(|url| format!(r#"<img src="{}" alt="" width="180">"#, escape(url)))
        .unwrap_or_default();
    let availability = if product.in_stock() { "" } else { r#"<p class="muted">Sold out</p>"# };
    format!(
        r#"<div class="card">{image}<h3><a href="/product/{slug}">{name}</a></h3><p>{price}</p>{availability}</div>"#,
        slug = escape(&product.slug),
        name = escape(&product.name),
        price = ctx.money(product.price),
    )
}

fn product_grid(ctx: &PageContext, products: &[Product]) -> String {
    if products.is_empty() {
        return r#"<p class="muted">No products here yet.</p>"#.to_string();
    }
    let cards: String = products.iter().map(|p| product_card(ctx, p)).collect();
    format!(r#"<div class="grid">{cards}</div>"#)
}

fn category_list(categories: &[Category]) -> String {
    let mut out = String::from("<ul>");
    for category in categories {
        let _ = write!(
            out,
            r#"<li><a href="/category/{}">{}</a> <span class="muted">({})</span></li>"#,
            escape(&category.slug),
            escape(&category.name),
            category.product_count
        );
    }
    out.push_str("</ul>");
    out
}

pub fn home(
    ctx: &PageContext,
    categories: &[Category],
    featured: &[Product],
    catalog: &Page<Product>,
) -> Html<String> {
    let mut body = String::new();
    if catalog.page == 1 && !featured.is_empty() {
        let _ = write!(body, "<h2>New arrivals</h2>{}", product_grid(ctx, featured));
    }
    let _ = write!(
        body,
        "<h2>Categories</h2>{}<h2>All products</h2>{}{}",
        category_list(categories),
        product_grid(ctx, &catalog.items),
        pagination(catalog, "/")
    );
    layout(ctx, "Home", &body)
}

pub fn category(ctx: &PageContext, category: &Category, products: &Page<Product>) -> Html<String> {
    let base = format!("/category/{}", escape(&category.slug));
    let body = format!(
        "<h1>{name}</h1><p>{description}</p>{grid}{pages}",
        name = escape(&category.name),
        description = escape(&category.description),
        grid = product_grid(ctx, &products.items),
        pages = pagination(products, &base),
    );
    layout(ctx, &category.name, &body)
}

pub fn product(ctx: &PageContext, product: &Product) -> Html<String> {
    let category = match (&product.category_name, &product.category_slug) {
        (Some(name), Some(slug)) => format!(
            r#"<p class="muted">In <a href="/category/{}">{}</a></p>"#,
            escape(slug),
            escape(name)
        ),
        _ => String::new(),
    };
    let image = product
        .image_url
        .as_deref()
        .map(|url| format!(r#"<img src="{}" alt="{}" width="360">"#, escape(url), escape(&product.name)))
        .unwrap_or_default();
    let buy = if product.in_stock() {
        format!(
            r#"<form method="post" action="/cart/add" class="inline">
<input type="hidden" name="product_id" value="{id}">
<input type="number" name="quantity" value="1" min="1" max="{max}">
<button>Add to cart</button>
</form>
<p class="muted">{stock} in stock</p>"#,
            id = product.id,
            max = product.stock.min(i64::from(shopfront_security::validation::MAX_QUANTITY)),
            stock = product.stock,
        )
    } else {
        r#"<p><strong>Sold out</strong></p>"#.to_string()
    };

    let body = format!(
        "<h1>{name}</h1>{category}{image}<p><strong>{price}</strong></p><p>{description}</p>{buy}",
        name = escape(&product.name),
        price = ctx.money(product.price),
        description = escape(&product.description),
    );
    layout(ctx, &product.name, &body)
}

pub fn search(ctx: &PageContext, term: &str, results: &[Product]) -> Html<String> {
    let heading = if term.trim().is_empty() {
        "<h1>Search</h1>".to_string()
    } else {
        format!(
            "<h1>Results for &ldquo;{}&rdquo;</h1><p class=\"muted\">{} found</p>",
            escape(term),
            results.len()
        )
    };
    let body = format!("{heading}{}", product_grid(ctx, results));
    layout(ctx, "Search", &body)
}

/// A cart entry resolved against the catalog.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Money,
}

pub fn cart(ctx: &PageContext, lines: &[CartItem], total: Money) -> Html<String> {
    if lines.is_empty() {
        return layout(
            ctx,
            "Cart",
            r#"<h1>Your cart</h1><p>Your cart is empty. <a href="/">Keep shopping</a>.</p>"#,
        );
    }

    let mut rows = String::new();
    for CartItem { product, quantity, line_total } in lines {
        let _ = write!(
            rows,
            r#"<tr>
<td><a href="/product/{slug}">{name}</a></td>
<td>{price}</td>
<td><form method="post" action="/cart/update" class="inline">
<input type="hidden" name="product_id" value="{id}">
<input type="number" name="quantity" value="{quantity}" min="0">
<button>Update</button></form></td>
<td>{line_total}</td>
<td><form method="post" action="/cart/remove" class="inline">
<input type="hidden" name="product_id" value="{id}"><button>Remove</button></form></td>
</tr>"#,
            slug = escape(&product.slug),
            name = escape(&product.name),
            price = ctx.money(product.price),
            id = product.id,
            line_total = ctx.money(*line_total),
        );
    }

    let body = format!(
        r#"<h1>Your cart</h1>
<table><tr><th>Product</th><th>Price</th><th>Quantity</th><th>Total</th><th></th></tr>{rows}</table>
<p><strong>Total: {total}</strong></p>
<p><a href="/checkout">Proceed to checkout</a></p>"#,
        total = ctx.money(total),
    );
    layout(ctx, "Cart", &body)
}
