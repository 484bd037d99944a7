use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::{not_found_response, panic_response};
use crate::handlers::{admin, auth, cart, checkout, health, shop};
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let storefront = Router::new()
        .route("/", get(shop::home))
        .route("/category/{slug}", get(shop::category))
        .route("/product/{slug}", get(shop::product))
        .route("/search", get(shop::search))
        .route("/cart", get(cart::show))
        .route("/cart/add", post(cart::add))
        .route("/cart/update", post(cart::update))
        .route("/cart/remove", post(cart::remove))
        .route("/checkout", get(checkout::show).post(checkout::submit))
        .route("/orders/{id}", get(checkout::order))
        .route("/account/orders", get(checkout::history))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/logout", post(auth::logout));

    let backoffice = Router::new()
        .route("/admin", get(admin::dashboard))
        .route("/admin/products", get(admin::products))
        .route(
            "/admin/products/new",
            get(admin::new_product_form).post(admin::create_product),
        )
        .route(
            "/admin/products/{id}/edit",
            get(admin::edit_product_form).post(admin::update_product),
        )
        .route("/admin/products/{id}/delete", post(admin::delete_product))
        .route("/admin/products/{id}/stock", post(admin::adjust_stock))
        .route(
            "/admin/categories",
            get(admin::categories).post(admin::create_category),
        )
        .route("/admin/categories/{id}/delete", post(admin::delete_category))
        .route("/admin/orders", get(admin::orders))
        .route("/admin/orders/{id}", get(admin::order))
        .route("/admin/orders/{id}/status", post(admin::update_order_status));

    Router::new()
        .merge(storefront)
        .merge(backoffice)
        .route("/health", get(health::health))
        .fallback(|| async { not_found_response() })
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new()),
        )
        .with_state(state)
}
