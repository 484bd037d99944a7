use axum::Form;
use axum::extract::State;
use axum::response::{Html, Redirect};
use serde::Deserialize;
use shopfront_common::Money;
use shopfront_db::FlashKind;
use shopfront_security::InputValidator;

use super::validation_message;
use crate::error::WebResult;
use crate::session::CurrentSession;
use crate::state::{AppState, SharedState};
use crate::views;
use crate::views::shop::CartItem;

/// Resolve cart entries to products. Entries whose product is gone or hidden,
/// or whose price pushes the total out of range, are dropped from the session.
pub fn resolve_cart(
    state: &AppState,
    session: &mut CurrentSession,
) -> WebResult<(Vec<CartItem>, Money)> {
    let mut items = Vec::new();
    let mut total = Money::ZERO;
    let mut stale = Vec::new();
    for (&product_id, &quantity) in &session.data.cart {
        let product = match state.db.product_by_id(product_id)? {
            Some(product) if product.is_active => product,
            _ => {
                stale.push(product_id);
                continue;
            }
        };
        let priced = product
            .price
            .times(quantity)
            .and_then(|line_total| Ok((line_total, total.checked_add(line_total)?)));
        match priced {
            Ok((line_total, running)) => {
                total = running;
                items.push(CartItem { product, quantity, line_total });
            }
            Err(_) => stale.push(product_id),
        }
    }

    if !stale.is_empty() {
        for product_id in stale {
            session.data.remove_from_cart(product_id);
        }
        session.data.set_flash(
            FlashKind::Error,
            "Some items are no longer available and were removed from your cart.",
        );
        session.save(state)?;
    }

    Ok((items, total))
}

pub async fn show(
    State(state): State<SharedState>,
    mut session: CurrentSession,
) -> WebResult<Html<String>> {
    let (lines, total) = resolve_cart(&state, &mut session)?;
    let ctx = session.page(&state)?;
    Ok(views::shop::cart(&ctx, &lines, total))
}

#[derive(Debug, Deserialize)]
pub struct CartForm {
    pub product_id: i64,
    #[serde(default)]
    pub quantity: Option<String>,
}

pub async fn add(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Form(form): Form<CartForm>,
) -> WebResult<Redirect> {
    let Some(product) = state
        .db
        .product_by_id(form.product_id)?
        .filter(|product| product.is_active)
    else {
        session.flash(&state, FlashKind::Error, "That product is not available.")?;
        return Ok(Redirect::to("/cart"));
    };
    let back = format!("/product/{}", product.slug);

    let quantity = match InputValidator::quantity(form.quantity.as_deref().unwrap_or("1")) {
        Ok(quantity) => quantity,
        Err(e) => {
            session.flash(&state, FlashKind::Error, validation_message(e))?;
            return Ok(Redirect::to(&back));
        }
    };

    let in_cart = session.data.cart.get(&product.id).copied().unwrap_or(0);
    if i64::from(in_cart) + i64::from(quantity) > product.stock {
        session.flash(
            &state,
            FlashKind::Error,
            format!("Only {} of {} left in stock.", product.stock, product.name),
        )?;
        return Ok(Redirect::to(&back));
    }

    session.data.add_to_cart(product.id, quantity);
    session.flash(&state, FlashKind::Info, format!("Added {} to your cart.", product.name))?;
    Ok(Redirect::to("/cart"))
}

pub async fn update(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Form(form): Form<CartForm>,
) -> WebResult<Redirect> {
    let raw = form.quantity.as_deref().unwrap_or("0").trim();
    if raw == "0" {
        session.data.remove_from_cart(form.product_id);
        session.save(&state)?;
        return Ok(Redirect::to("/cart"));
    }

    match InputValidator::quantity(raw) {
        Ok(quantity) => {
            let stock = state
                .db
                .product_by_id(form.product_id)?
                .map(|product| product.stock)
                .unwrap_or(0);
            if i64::from(quantity) > stock {
                session.flash(
                    &state,
                    FlashKind::Error,
                    format!("Only {stock} left in stock."),
                )?;
            } else {
                session.data.set_quantity(form.product_id, quantity);
                session.save(&state)?;
            }
        }
        Err(e) => session.flash(&state, FlashKind::Error, validation_message(e))?,
    }
    Ok(Redirect::to("/cart"))
}

#[derive(Debug, Deserialize)]
pub struct RemoveForm {
    pub product_id: i64,
}

pub async fn remove(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Form(form): Form<RemoveForm>,
) -> WebResult<Redirect> {
    session.data.remove_from_cart(form.product_id);
    session.save(&state)?;
    Ok(Redirect::to("/cart"))
}
