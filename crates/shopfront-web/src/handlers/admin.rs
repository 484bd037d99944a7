use axum::Form;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use shopfront_common::{Money, OrderStatus};
use shopfront_db::{FlashKind, ProductInput};
use shopfront_security::InputValidator;
use tracing::info;

use super::validation_message;
use crate::error::{WebError, WebResult};
use crate::session::AdminUser;
use crate::state::SharedState;
use crate::views;
use crate::views::admin::ProductFormValues;

const RECENT_ORDERS: usize = 5;
/// Largest restock or write-off accepted in one step.
const MAX_STOCK_DELTA: i64 = 100_000;

pub async fn dashboard(
    State(state): State<SharedState>,
    AdminUser { mut session, .. }: AdminUser,
) -> WebResult<Html<String>> {
    let stats = state.db.dashboard_stats()?;
    let mut recent = state.db.list_orders(None)?;
    recent.truncate(RECENT_ORDERS);

    let ctx = session.page(&state)?;
    Ok(views::admin::dashboard(&ctx, &stats, &recent))
}

pub async fn products(
    State(state): State<SharedState>,
    AdminUser { mut session, .. }: AdminUser,
) -> WebResult<Html<String>> {
    let products = state.db.all_products()?;
    let ctx = session.page(&state)?;
    Ok(views::admin::products(&ctx, &products))
}

#[derive(Debug, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub image_url: String,
    /// Checkbox: present only when ticked.
    pub is_active: Option<String>,
}

impl ProductForm {
    fn values(&self) -> ProductFormValues {
        ProductFormValues {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price.clone(),
            stock: self.stock.clone(),
            category_id: self.category_id.trim().parse().ok(),
            image_url: self.image_url.clone(),
            is_active: self.is_active.is_some(),
        }
    }

    fn to_input(&self) -> shopfront_common::Result<ProductInput> {
        let name = InputValidator::required("name", &self.name)?;
        let price = Money::parse(&self.price)?;
        let stock = match self.stock.trim() {
            "" => 0,
            raw => raw.parse::<i64>().map_err(|_| {
                shopfront_common::Error::Validation("stock must be a whole number".into())
            })?,
        };
        let category_id = match self.category_id.trim() {
            "" => None,
            raw => Some(raw.parse::<i64>().map_err(|_| {
                shopfront_common::Error::Validation("unknown category".into())
            })?),
        };
        let image_url = InputValidator::sanitize(self.image_url.trim());

        Ok(ProductInput {
            category_id,
            name,
            description: InputValidator::sanitize(&self.description),
            price,
            stock,
            image_url: (!image_url.is_empty()).then_some(image_url),
            is_active: self.is_active.is_some(),
        })
    }
}

pub async fn new_product_form(
    State(state): State<SharedState>,
    AdminUser { mut session, .. }: AdminUser,
) -> WebResult<Html<String>> {
    let categories = state.db.list_categories()?;
    let ctx = session.page(&state)?;
    Ok(views::admin::product_form(
        &ctx,
        "New product",
        "/admin/products/new",
        &ProductFormValues::default(),
        &categories,
        None,
    ))
}

pub async fn create_product(
    State(state): State<SharedState>,
    AdminUser { mut session, user }: AdminUser,
    Form(form): Form<ProductForm>,
) -> WebResult<Response> {
    let created = form
        .to_input()
        .and_then(|input| state.db.create_product(&input));

    match created {
        Ok(id) => {
            info!("admin {} created product {id}", user.id);
            session.flash(&state, FlashKind::Info, format!("Created {}.", form.name.trim()))?;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e) if e.is_user_facing() => {
            let categories = state.db.list_categories()?;
            let ctx = session.page(&state)?;
            let message = validation_message(e);
            Ok(views::admin::product_form(
                &ctx,
                "New product",
                "/admin/products/new",
                &form.values(),
                &categories,
                Some(&message),
            )
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn edit_product_form(
    State(state): State<SharedState>,
    AdminUser { mut session, .. }: AdminUser,
    Path(id): Path<i64>,
) -> WebResult<Html<String>> {
    let product = state.db.product_by_id(id)?.ok_or(WebError::NotFound)?;
    let categories = state.db.list_categories()?;
    let ctx = session.page(&state)?;
    Ok(views::admin::product_form(
        &ctx,
        &format!("Edit {}", product.name),
        &format!("/admin/products/{id}/edit"),
        &ProductFormValues::from(&product),
        &categories,
        None,
    ))
}

pub async fn update_product(
    State(state): State<SharedState>,
    AdminUser { mut session, user }: AdminUser,
    Path(id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> WebResult<Response> {
    let product = state.db.product_by_id(id)?.ok_or(WebError::NotFound)?;
    let updated = form
        .to_input()
        .and_then(|input| state.db.update_product(id, &input));

    match updated {
        Ok(()) => {
            info!("admin {} updated product {id}", user.id);
            session.flash(&state, FlashKind::Info, format!("Saved {}.", form.name.trim()))?;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e) if e.is_user_facing() => {
            let categories = state.db.list_categories()?;
            let ctx = session.page(&state)?;
            let message = validation_message(e);
            Ok(views::admin::product_form(
                &ctx,
                &format!("Edit {}", product.name),
                &format!("/admin/products/{id}/edit"),
                &form.values(),
                &categories,
                Some(&message),
            )
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_product(
    State(state): State<SharedState>,
    AdminUser { mut session, user }: AdminUser,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    state.db.delete_product(id)?;
    info!("admin {} deleted product {id}", user.id);
    session.flash(&state, FlashKind::Info, "Product deleted.")?;
    Ok(Redirect::to("/admin/products"))
}

#[derive(Debug, Deserialize)]
pub struct StockForm {
    #[serde(default)]
    pub delta: String,
}

fn parse_delta(raw: &str) -> shopfront_common::Result<i64> {
    let raw = raw.trim();
    let delta = raw
        .strip_prefix('+')
        .unwrap_or(raw)
        .parse::<i64>()
        .map_err(|_| {
            shopfront_common::Error::Validation(
                "stock change must be a whole number such as 5 or -2".into(),
            )
        })?;
    if delta == 0 || !(-MAX_STOCK_DELTA..=MAX_STOCK_DELTA).contains(&delta) {
        return Err(shopfront_common::Error::Validation(format!(
            "stock change must be between 1 and {MAX_STOCK_DELTA} units"
        )));
    }
    Ok(delta)
}

pub async fn adjust_stock(
    State(state): State<SharedState>,
    AdminUser { mut session, user }: AdminUser,
    Path(id): Path<i64>,
    Form(form): Form<StockForm>,
) -> WebResult<Redirect> {
    match parse_delta(&form.delta).and_then(|delta| state.db.adjust_stock(id, delta)) {
        Ok(stock) => {
            info!("admin {} adjusted stock of product {id} to {stock}", user.id);
            session.flash(&state, FlashKind::Info, format!("Stock is now {stock}."))?;
        }
        Err(shopfront_common::Error::NotFound(_)) => return Err(WebError::NotFound),
        Err(e) if e.is_user_facing() => {
            session.flash(&state, FlashKind::Error, validation_message(e))?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/admin/products"))
}

pub async fn categories(
    State(state): State<SharedState>,
    AdminUser { mut session, .. }: AdminUser,
) -> WebResult<Html<String>> {
    let categories = state.db.list_categories()?;
    let ctx = session.page(&state)?;
    Ok(views::admin::categories(&ctx, &categories, "", "", None))
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_category(
    State(state): State<SharedState>,
    AdminUser { mut session, user }: AdminUser,
    Form(form): Form<CategoryForm>,
) -> WebResult<Response> {
    let created = InputValidator::required("name", &form.name).and_then(|name| {
        state
            .db
            .create_category(&name, &InputValidator::sanitize(&form.description))
    });

    match created {
        Ok(id) => {
            info!("admin {} created category {id}", user.id);
            session.flash(&state, FlashKind::Info, "Category created.")?;
            Ok(Redirect::to("/admin/categories").into_response())
        }
        Err(e) if e.is_user_facing() => {
            let categories = state.db.list_categories()?;
            let ctx = session.page(&state)?;
            let message = validation_message(e);
            Ok(views::admin::categories(
                &ctx,
                &categories,
                &form.name,
                &form.description,
                Some(&message),
            )
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_category(
    State(state): State<SharedState>,
    AdminUser { mut session, user }: AdminUser,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    state.db.delete_category(id)?;
    info!("admin {} deleted category {id}", user.id);
    session.flash(&state, FlashKind::Info, "Category deleted.")?;
    Ok(Redirect::to("/admin/categories"))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
}

pub async fn orders(
    State(state): State<SharedState>,
    AdminUser { mut session, .. }: AdminUser,
    Query(filter): Query<OrderFilter>,
) -> WebResult<Html<String>> {
    let status = match filter.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<OrderStatus>()?),
    };
    let orders = state.db.list_orders(status)?;
    let ctx = session.page(&state)?;
    Ok(views::admin::orders(&ctx, &orders, status))
}

pub async fn order(
    State(state): State<SharedState>,
    AdminUser { mut session, .. }: AdminUser,
    Path(id): Path<i64>,
) -> WebResult<Html<String>> {
    let order = state.db.order_by_id(id)?.ok_or(WebError::NotFound)?;
    let ctx = session.page(&state)?;
    Ok(views::admin::order(&ctx, &order))
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

pub async fn update_order_status(
    State(state): State<SharedState>,
    AdminUser { mut session, user }: AdminUser,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> WebResult<Redirect> {
    let result = form
        .status
        .parse::<OrderStatus>()
        .and_then(|status| state.db.update_order_status(id, status));

    match result {
        Ok(()) => {
            info!("admin {} set order {id} to {}", user.id, form.status);
            session.flash(&state, FlashKind::Info, "Order updated.")?;
        }
        Err(shopfront_common::Error::NotFound(_)) => return Err(WebError::NotFound),
        Err(e) if e.is_user_facing() => {
            session.flash(&state, FlashKind::Error, validation_message(e))?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to(&format!("/admin/orders/{id}")))
}
