use axum::extract::{Path, Query, State};
use axum::response::Html;
use serde::Deserialize;

use super::PageQuery;
use crate::error::{WebError, WebResult};
use crate::session::CurrentSession;
use crate::state::SharedState;
use crate::views;

const SEARCH_LIMIT: u32 = 50;

pub async fn home(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Query(query): Query<PageQuery>,
) -> WebResult<Html<String>> {
    let store = &state.config.store;
    let categories = state.db.list_categories()?;
    let featured = state.db.latest_products(store.featured_count)?;
    let catalog = state
        .db
        .products_page(None, query.page(), store.products_per_page)?;

    let ctx = session.page(&state)?;
    Ok(views::shop::home(&ctx, &categories, &featured, &catalog))
}

pub async fn category(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> WebResult<Html<String>> {
    let category = state
        .db
        .category_by_slug(&slug)?
        .ok_or(WebError::NotFound)?;
    let products = state.db.products_page(
        Some(category.id),
        query.page(),
        state.config.store.products_per_page,
    )?;

    let ctx = session.page(&state)?;
    Ok(views::shop::category(&ctx, &category, &products))
}

pub async fn product(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Path(slug): Path<String>,
) -> WebResult<Html<String>> {
    let product = state
        .db
        .product_by_slug(&slug)?
        .ok_or(WebError::NotFound)?;

    let ctx = session.page(&state)?;
    Ok(views::shop::product(&ctx, &product))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Query(query): Query<SearchQuery>,
) -> WebResult<Html<String>> {
    let results = state.db.search_products(&query.q, SEARCH_LIMIT)?;
    let ctx = session.page(&state)?;
    Ok(views::shop::search(&ctx, &query.q, &results))
}
