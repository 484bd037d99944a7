use axum::Form;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use shopfront_db::{CheckoutDetails, FlashKind};
use shopfront_security::InputValidator;
use tracing::info;

use super::cart::resolve_cart;
use super::validation_message;
use crate::error::{WebError, WebResult};
use crate::session::{CurrentSession, SignedIn};
use crate::state::SharedState;
use crate::views;
use crate::views::account::CheckoutValues;

pub async fn show(
    State(state): State<SharedState>,
    mut session: CurrentSession,
) -> WebResult<Response> {
    let (lines, total) = resolve_cart(&state, &mut session)?;
    if lines.is_empty() {
        session.flash(&state, FlashKind::Info, "Your cart is empty.")?;
        return Ok(Redirect::to("/cart").into_response());
    }

    let values = match session.user(&state)? {
        Some(user) => CheckoutValues {
            name: user.name,
            email: user.email,
            address: String::new(),
        },
        None => CheckoutValues::default(),
    };

    let ctx = session.page(&state)?;
    Ok(views::account::checkout(&ctx, &lines, total, &values, None).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
}

fn validate(form: &CheckoutForm) -> shopfront_common::Result<CheckoutValues> {
    Ok(CheckoutValues {
        name: InputValidator::required("name", &form.name)?,
        email: InputValidator::email(&form.email)?,
        address: InputValidator::required("shipping address", &form.address)?,
    })
}

pub async fn submit(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Form(form): Form<CheckoutForm>,
) -> WebResult<Response> {
    let (lines, total) = resolve_cart(&state, &mut session)?;
    if lines.is_empty() {
        session.flash(&state, FlashKind::Info, "Your cart is empty.")?;
        return Ok(Redirect::to("/cart").into_response());
    }

    let values = match validate(&form) {
        Ok(values) => values,
        Err(e) => {
            let typed = CheckoutValues {
                name: form.name,
                email: form.email,
                address: form.address,
            };
            let ctx = session.page(&state)?;
            let message = validation_message(e);
            return Ok(
                views::account::checkout(&ctx, &lines, total, &typed, Some(&message)).into_response(),
            );
        }
    };

    let details = CheckoutDetails {
        user_id: session.data.user_id,
        customer_name: values.name.clone(),
        customer_email: values.email.clone(),
        shipping_address: values.address.clone(),
    };

    match state.db.place_order(&details, &session.data.cart_lines()) {
        Ok(order_id) => {
            session.data.clear_cart();
            session.data.placed_orders.push(order_id);
            session.data.set_flash(FlashKind::Info, "Thank you! Your order has been placed.");
            session.save(&state)?;
            info!("checkout completed for order {order_id}");
            Ok(Redirect::to(&format!("/orders/{order_id}")).into_response())
        }
        Err(e @ shopfront_common::Error::Validation(_)) => {
            let ctx = session.page(&state)?;
            let message = validation_message(e);
            Ok(views::account::checkout(&ctx, &lines, total, &values, Some(&message)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn order(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Path(id): Path<i64>,
) -> WebResult<Html<String>> {
    let order = state.db.order_by_id(id)?.ok_or(WebError::NotFound)?;

    let user = session.user(&state)?;
    let owns = session.data.owns_order(order.id)
        || user
            .as_ref()
            .is_some_and(|user| user.is_admin || order.user_id == Some(user.id));
    if !owns {
        return Err(WebError::NotFound);
    }

    let ctx = session.page(&state)?;
    Ok(views::account::order_receipt(&ctx, &order))
}

pub async fn history(
    State(state): State<SharedState>,
    SignedIn { user, mut session }: SignedIn,
) -> WebResult<Html<String>> {
    let orders = state.db.orders_for_user(user.id)?;
    let ctx = session.page(&state)?;
    Ok(views::account::order_history(&ctx, &orders))
}
