//! HTML rendering. Every page is built with `format!`; any value that came
//! from a visitor or the database goes through [`escape`] first.

pub mod account;
pub mod admin;
pub mod shop;

use std::fmt::Write;

use axum::response::Html;
use shopfront_common::Money;
use shopfront_db::{Flash, FlashKind, Page, User};

/// Everything the shared layout needs besides the page body.
pub struct PageContext {
    pub store_name: String,
    pub currency: String,
    pub user: Option<User>,
    pub cart_count: u32,
    pub flash: Option<Flash>,
}

impl PageContext {
    pub fn money(&self, amount: Money) -> String {
        escape(&amount.display_with(&self.currency))
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.is_admin)
    }
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode a value for use inside a query string.
pub fn encode_query(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:0;color:#222}\
header,main,footer{max-width:960px;margin:0 auto;padding:1rem}\
header{display:flex;justify-content:space-between;align-items:center;border-bottom:1px solid #ddd}\
nav a,nav form{margin-left:1rem;display:inline}\
.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(200px,1fr));gap:1rem}\
.card{border:1px solid #ddd;border-radius:6px;padding:1rem}\
.flash{padding:.75rem;border-radius:4px;margin-bottom:1rem}\
.flash-info{background:#e8f4ea}.flash-error{background:#fbeaea}\
table{width:100%;border-collapse:collapse}td,th{padding:.4rem;border-bottom:1px solid #eee;text-align:left}\
label{display:block;margin:.5rem 0}input,textarea,select{display:block;width:100%;max-width:28rem}\
.inline input,.inline select{display:inline;width:auto}\
.muted{color:#777}";

pub fn layout(ctx: &PageContext, title: &str, body: &str) -> Html<String> {
    let store = escape(&ctx.store_name);

    let mut nav = String::new();
    let _ = write!(nav, r#"<a href="/cart">Cart ({})</a>"#, ctx.cart_count);
    match &ctx.user {
        Some(user) => {
            if user.is_admin {
                nav.push_str(r#"<a href="/admin">Admin</a>"#);
            }
            let _ = write!(
                nav,
                r#"<a href="/account/orders">{}</a><form method="post" action="/logout"><button>Log out</button></form>"#,
                escape(&user.name)
            );
        }
        None => nav.push_str(r#"<a href="/login">Log in</a><a href="/register">Register</a>"#),
    }

    let flash = ctx.flash.as_ref().map(flash_html).unwrap_or_default();

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | {store}</title>
<style>{STYLE}</style>
</head>
<body>
<header>
<a href="/"><strong>{store}</strong></a>
<form action="/search" class="inline"><input name="q" placeholder="Search products"></form>
<nav>{nav}</nav>
</header>
<main>
{flash}{body}
</main>
<footer class="muted">&copy; {store}</footer>
</body>
</html>"#,
        title = escape(title),
    ))
}

fn flash_html(flash: &Flash) -> String {
    let class = match flash.kind {
        FlashKind::Info => "flash-info",
        FlashKind::Error => "flash-error",
    };
    format!(
        r#"<div class="flash {class}">{}</div>"#,
        escape(&flash.message)
    )
}

/// An inline error box for forms that are shown again after a failed submit.
pub fn form_error(message: Option<&str>) -> String {
    message
        .map(|message| format!(r#"<div class="flash flash-error">{}</div>"#, escape(message)))
        .unwrap_or_default()
}

/// Previous/next links for a paginated list. `base` must already be escaped
/// and may carry other query parameters.
pub fn pagination<T>(page: &Page<T>, base: &str) -> String {
    if page.total_pages() <= 1 {
        return String::new();
    }
    let sep = if base.contains('?') { "&amp;" } else { "?" };
    let mut out = String::from("<p>");
    if page.has_prev() {
        let _ = write!(out, r#"<a href="{base}{sep}page={}">&larr; Previous</a> "#, page.page - 1);
    }
    let _ = write!(out, "Page {} of {}", page.page, page.total_pages());
    if page.has_next() {
        let _ = write!(out, r#" <a href="{base}{sep}page={}">Next &rarr;</a>"#, page.page + 1);
    }
    out.push_str("</p>");
    out
}

/// Standalone page used when the request failed before a session was loaded.
pub fn error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title><style>{STYLE}</style></head>
<body><main><h1>{title}</h1><p>{message}</p><p><a href="/">Back to the shop</a></p></main></body>
</html>"#,
        title = escape(title),
        message = escape(message),
    )
}
