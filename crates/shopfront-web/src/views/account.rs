use std::fmt::Write;

use axum::response::Html;
use shopfront_common::Money;
use shopfront_db::Order;

use super::shop::CartItem;
use super::{PageContext, escape, form_error, layout};

pub fn login(ctx: &PageContext, email: &str, next: &str, error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"<h1>Log in</h1>{error}
<form method="post" action="/login">
<input type="hidden" name="next" value="{next}">
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Password <input type="password" name="password" required></label>
<button>Log in</button>
</form>
<p>New here? <a href="/register">Create an account</a>.</p>"#,
        error = form_error(error),
        next = escape(next),
        email = escape(email),
    );
    layout(ctx, "Log in", &body)
}

pub fn register(ctx: &PageContext, name: &str, email: &str, error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"<h1>Create an account</h1>{error}
<form method="post" action="/register">
<label>Name <input name="name" value="{name}" required></label>
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Password <input type="password" name="password" minlength="{min}" required></label>
<button>Register</button>
</form>"#,
        error = form_error(error),
        name = escape(name),
        email = escape(email),
        min = shopfront_security::validation::MIN_PASSWORD_LEN,
    );
    layout(ctx, "Register", &body)
}

/// Values typed into the checkout form, kept so a failed submit can show them again.
#[derive(Debug, Default, Clone)]
pub struct CheckoutValues {
    pub name: String,
    pub email: String,
    pub address: String,
}

pub fn checkout(
    ctx: &PageContext,
    lines: &[CartItem],
    total: Money,
    values: &CheckoutValues,
    error: Option<&str>,
) -> Html<String> {
    let mut summary = String::from("<ul>");
    for item in lines {
        let _ = write!(
            summary,
            "<li>{} &times; {} &mdash; {}</li>",
            item.quantity,
            escape(&item.product.name),
            ctx.money(item.line_total)
        );
    }
    summary.push_str("</ul>");

    let body = format!(
        r#"<h1>Checkout</h1>{error}
<h2>Order summary</h2>{summary}<p><strong>Total: {total}</strong></p>
<form method="post" action="/checkout">
<label>Full name <input name="name" value="{name}" required></label>
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Shipping address <textarea name="address" rows="3" required>{address}</textarea></label>
<button>Place order</button>
</form>"#,
        error = form_error(error),
        total = ctx.money(total),
        name = escape(&values.name),
        email = escape(&values.email),
        address = escape(&values.address),
    );
    layout(ctx, "Checkout", &body)
}

/// Item table shared by the receipt and the admin order page.
pub fn order_items(ctx: &PageContext, order: &Order) -> String {
    let mut rows = String::new();
    for item in &order.items {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&item.product_name),
            ctx.money(item.unit_price),
            item.quantity,
            ctx.money(item.line_total),
        );
    }
    format!(
        "<table><tr><th>Product</th><th>Price</th><th>Quantity</th><th>Total</th></tr>{rows}</table>\
         <p><strong>Total: {}</strong></p>",
        ctx.money(order.total)
    )
}

pub fn order_receipt(ctx: &PageContext, order: &Order) -> Html<String> {
    let body = format!(
        r#"<h1>Order #{id}</h1>
<p>Status: <strong>{status}</strong> <span class="muted">placed {placed}</span></p>
{items}
<h2>Shipping to</h2>
<p>{name}<br>{email}</p><pre>{address}</pre>"#,
        id = order.id,
        status = order.status.label(),
        placed = order.created_at.format("%Y-%m-%d %H:%M"),
        items = order_items(ctx, order),
        name = escape(&order.customer_name),
        email = escape(&order.customer_email),
        address = escape(&order.shipping_address),
    );
    layout(ctx, &format!("Order #{}", order.id), &body)
}

pub fn order_history(ctx: &PageContext, orders: &[Order]) -> Html<String> {
    if orders.is_empty() {
        return layout(
            ctx,
            "Your orders",
            r#"<h1>Your orders</h1><p>You have not placed any orders yet.</p>"#,
        );
    }

    let mut rows = String::new();
    for order in orders {
        let _ = write!(
            rows,
            r#"<tr><td><a href="/orders/{id}">#{id}</a></td><td>{date}</td><td>{items}</td><td>{total}</td><td>{status}</td></tr>"#,
            id = order.id,
            date = order.created_at.format("%Y-%m-%d"),
            items = order.item_count(),
            total = ctx.money(order.total),
            status = order.status.label(),
        );
    }
    let body = format!(
        "<h1>Your orders</h1><table><tr><th>Order</th><th>Date</th><th>Items</th><th>Total</th><th>Status</th></tr>{rows}</table>"
    );
    layout(ctx, "Your orders", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PageContext {
        PageContext {
            store_name: "Shop".to_string(),
            currency: "$".to_string(),
            user: None,
            cart_count: 0,
            flash: None,
        }
    }

    #[test]
    fn login_form_keeps_next_and_escapes_email() {
        let Html(page) = login(&ctx(), "\"><script>", "/checkout", Some("Invalid email or password."));
        assert!(page.contains(r#"name="next" value="/checkout""#));
        assert!(page.contains("&quot;&gt;&lt;script&gt;"));
        assert!(page.contains("Invalid email or password."));
    }

    #[test]
    fn checkout_form_refills_values() {
        let values = CheckoutValues {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            address: "1 <Harbour> Rd".to_string(),
        };
        let Html(page) = checkout(&ctx(), &[], Money::ZERO, &values, None);
        assert!(page.contains(r#"value="Grace""#));
        assert!(page.contains("1 &lt;Harbour&gt; Rd</textarea>"));
    }
}
