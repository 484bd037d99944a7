use std::fmt::Write;

use axum::response::Html;
use shopfront_common::OrderStatus;
use shopfront_db::{Category, DashboardStats, Order, Product};

use super::account::order_items;
use super::{PageContext, escape, form_error, layout};

const ADMIN_NAV: &str = r#"<p><a href="/admin">Dashboard</a> | <a href="/admin/products">Products</a> | <a href="/admin/categories">Categories</a> | <a href="/admin/orders">Orders</a></p>"#;

fn admin_layout(ctx: &PageContext, title: &str, body: &str) -> Html<String> {
    layout(ctx, title, &format!("{ADMIN_NAV}{body}"))
}

pub fn dashboard(ctx: &PageContext, stats: &DashboardStats, recent: &[Order]) -> Html<String> {
    let body = format!(
        r#"<h1>Dashboard</h1>
<div class="grid">
<div class="card"><h3>Revenue</h3><p>{revenue}</p></div>
<div class="card"><h3>Orders</h3><p>{orders} ({pending} pending)</p></div>
<div class="card"><h3>Products</h3><p>{active} active of {products}, {low} low on stock</p></div>
<div class="card"><h3>Customers</h3><p>{users} accounts, {categories} categories</p></div>
</div>
<h2>Recent orders</h2>{recent}"#,
        revenue = ctx.money(stats.revenue),
        orders = stats.orders,
        pending = stats.pending_orders,
        active = stats.active_products,
        products = stats.products,
        low = stats.low_stock_products,
        users = stats.users,
        categories = stats.categories,
        recent = order_table(ctx, recent),
    );
    admin_layout(ctx, "Dashboard", &body)
}

pub fn products(ctx: &PageContext, products: &[Product]) -> Html<String> {
    let mut rows = String::new();
    for product in products {
        let _ = write!(
            rows,
            r#"<tr><td>{name}</td><td>{category}</td><td>{price}</td>
<td>{stock} <form method="post" action="/admin/products/{id}/stock" class="inline">
<input name="delta" size="4" placeholder="+/-"><button>Adjust</button></form></td><td>{active}</td>
<td><a href="/admin/products/{id}/edit">Edit</a>
<form method="post" action="/admin/products/{id}/delete" class="inline"><button>Delete</button></form></td></tr>"#,
            name = escape(&product.name),
            category = escape(product.category_name.as_deref().unwrap_or("-")),
            price = ctx.money(product.price),
            stock = product.stock,
            active = if product.is_active { "yes" } else { "no" },
            id = product.id,
        );
    }
    let body = format!(
        r#"<h1>Products</h1><p><a href="/admin/products/new">New product</a></p>
<table><tr><th>Name</th><th>Category</th><th>Price</th><th>Stock</th><th>Active</th><th></th></tr>{rows}</table>"#
    );
    admin_layout(ctx, "Products", &body)
}

/// Raw form values, so a rejected submit can be shown again as typed.
#[derive(Debug, Clone)]
pub struct ProductFormValues {
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
    pub category_id: Option<i64>,
    pub image_url: String,
    pub is_active: bool,
}

impl Default for ProductFormValues {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            price: String::new(),
            stock: "0".to_string(),
            category_id: None,
            image_url: String::new(),
            is_active: true,
        }
    }
}

impl From<&Product> for ProductFormValues {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_decimal_string(),
            stock: product.stock.to_string(),
            category_id: product.category_id,
            image_url: product.image_url.clone().unwrap_or_default(),
            is_active: product.is_active,
        }
    }
}

/// `action` is the form target: `/admin/products/new` or `/admin/products/{id}/edit`.
pub fn product_form(
    ctx: &PageContext,
    title: &str,
    action: &str,
    values: &ProductFormValues,
    categories: &[Category],
    error: Option<&str>,
) -> Html<String> {
    let mut options = String::from(r#"<option value="">No category</option>"#);
    for category in categories {
        let selected = if values.category_id == Some(category.id) { " selected" } else { "" };
        let _ = write!(
            options,
            r#"<option value="{}"{selected}>{}</option>"#,
            category.id,
            escape(&category.name)
        );
    }

    let body = format!(
        r#"<h1>{title}</h1>{error}
<form method="post" action="{action}">
<label>Name <input name="name" value="{name}" required></label>
<label>Category <select name="category_id">{options}</select></label>
<label>Price <input name="price" value="{price}" placeholder="12.50" required></label>
<label>Stock <input type="number" name="stock" value="{stock}" min="0"></label>
<label>Image URL <input name="image_url" value="{image_url}"></label>
<label>Description <textarea name="description" rows="5">{description}</textarea></label>
<label class="inline"><input type="checkbox" name="is_active" value="on"{checked}> Visible in the shop</label>
<button>Save</button>
</form>"#,
        title = escape(title),
        error = form_error(error),
        action = escape(action),
        name = escape(&values.name),
        price = escape(&values.price),
        stock = escape(&values.stock),
        image_url = escape(&values.image_url),
        description = escape(&values.description),
        checked = if values.is_active { " checked" } else { "" },
    );
    admin_layout(ctx, title, &body)
}

pub fn categories(
    ctx: &PageContext,
    categories: &[Category],
    name: &str,
    description: &str,
    error: Option<&str>,
) -> Html<String> {
    let mut rows = String::new();
    for category in categories {
        let _ = write!(
            rows,
            r#"<tr><td>{name}</td><td>{slug}</td><td>{count}</td>
<td><form method="post" action="/admin/categories/{id}/delete" class="inline"><button>Delete</button></form></td></tr>"#,
            name = escape(&category.name),
            slug = escape(&category.slug),
            count = category.product_count,
            id = category.id,
        );
    }
    let body = format!(
        r#"<h1>Categories</h1>
<table><tr><th>Name</th><th>Slug</th><th>Active products</th><th></th></tr>{rows}</table>
<h2>New category</h2>{error}
<form method="post" action="/admin/categories">
<label>Name <input name="name" value="{name}" required></label>
<label>Description <textarea name="description" rows="2">{description}</textarea></label>
<button>Create</button>
</form>"#,
        error = form_error(error),
        name = escape(name),
        description = escape(description),
    );
    admin_layout(ctx, "Categories", &body)
}

fn order_table(ctx: &PageContext, orders: &[Order]) -> String {
    if orders.is_empty() {
        return r#"<p class="muted">No orders.</p>"#.to_string();
    }
    let mut rows = String::new();
    for order in orders {
        let _ = write!(
            rows,
            r#"<tr><td><a href="/admin/orders/{id}">#{id}</a></td><td>{date}</td><td>{customer}</td><td>{total}</td><td>{status}</td></tr>"#,
            id = order.id,
            date = order.created_at.format("%Y-%m-%d %H:%M"),
            customer = escape(&order.customer_name),
            total = ctx.money(order.total),
            status = order.status.label(),
        );
    }
    format!(
        "<table><tr><th>Order</th><th>Placed</th><th>Customer</th><th>Total</th><th>Status</th></tr>{rows}</table>"
    )
}

pub fn orders(ctx: &PageContext, orders: &[Order], filter: Option<OrderStatus>) -> Html<String> {
    let mut filters = String::from(r#"<p><a href="/admin/orders">All</a>"#);
    for status in OrderStatus::ALL {
        let label = if filter == Some(status) {
            format!("<strong>{}</strong>", status.label())
        } else {
            status.label().to_string()
        };
        let _ = write!(filters, r#" | <a href="/admin/orders?status={}">{label}</a>"#, status.as_str());
    }
    filters.push_str("</p>");

    let body = format!("<h1>Orders</h1>{filters}{}", order_table(ctx, orders));
    admin_layout(ctx, "Orders", &body)
}

pub fn order(ctx: &PageContext, order: &Order) -> Html<String> {
    let status_form = if order.status.releases_stock() {
        r#"<p class="muted">Cancelled orders are final.</p>"#.to_string()
    } else {
        let mut options = String::new();
        for status in OrderStatus::ALL {
            let selected = if status == order.status { " selected" } else { "" };
            let _ = write!(
                options,
                r#"<option value="{}"{selected}>{}</option>"#,
                status.as_str(),
                status.label()
            );
        }
        format!(
            r#"<form method="post" action="/admin/orders/{}/status" class="inline">
<select name="status">{options}</select> <button>Update status</button></form>"#,
            order.id
        )
    };

    let account = order
        .user_id
        .map(|id| format!(r#" <span class="muted">(account #{id})</span>"#))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>Order #{id}</h1>
<p>Status: <strong>{status}</strong></p>{status_form}
{items}
<h2>Customer</h2>
<p>{name}{account}<br>{email}</p><pre>{address}</pre>
<p class="muted">Placed {placed}, last updated {updated}</p>"#,
        id = order.id,
        status = order.status.label(),
        items = order_items(ctx, order),
        name = escape(&order.customer_name),
        email = escape(&order.customer_email),
        address = escape(&order.shipping_address),
        placed = order.created_at.format("%Y-%m-%d %H:%M"),
        updated = order.updated_at.format("%Y-%m-%d %H:%M"),
    );
    admin_layout(ctx, &format!("Order #{}", order.id), &body)
}
