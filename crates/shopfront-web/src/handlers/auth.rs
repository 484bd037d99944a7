use axum::Form;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use shopfront_db::{FlashKind, NewUser};
use shopfront_security::{InputValidator, hash_password, verify_password};
use tracing::{info, warn};

use super::validation_message;
use crate::error::WebResult;
use crate::session::CurrentSession;
use crate::state::{AppState, SharedState};
use crate::views;

const LOGIN_FAILED: &str = "Invalid email or password.";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

fn redirect_target(next: &str) -> &str {
    InputValidator::safe_redirect(next).unwrap_or("/")
}

pub async fn login_form(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Query(query): Query<NextQuery>,
) -> WebResult<Html<String>> {
    let ctx = session.page(&state)?;
    Ok(views::account::login(&ctx, "", redirect_target(&query.next), None))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

pub async fn login(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    let next = redirect_target(&form.next).to_string();

    let credentials = state.db.credentials_by_email(form.email.trim())?;
    let user = match credentials {
        Some((user, hash)) if verify_password(&form.password, &hash) => user,
        _ => {
            warn!("failed login attempt");
            let ctx = session.page(&state)?;
            return Ok(views::account::login(&ctx, &form.email, &next, Some(LOGIN_FAILED)).into_response());
        }
    };

    session.log_in(&state, user.id)?;
    session.flash(&state, FlashKind::Info, format!("Welcome back, {}.", user.name))?;
    Ok(Redirect::to(&next).into_response())
}

pub async fn register_form(
    State(state): State<SharedState>,
    mut session: CurrentSession,
) -> WebResult<Html<String>> {
    let ctx = session.page(&state)?;
    Ok(views::account::register(&ctx, "", "", None))
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn create_account(state: &AppState, form: &RegisterForm) -> shopfront_common::Result<i64> {
    let name = InputValidator::required("name", &form.name)?;
    let email = InputValidator::email(&form.email)?;
    InputValidator::password(&form.password)?;
    let password_hash = hash_password(&form.password)?;
    state.db.create_user(&NewUser {
        email: &email,
        name: &name,
        password_hash: &password_hash,
        is_admin: false,
    })
}

pub async fn register(
    State(state): State<SharedState>,
    mut session: CurrentSession,
    Form(form): Form<RegisterForm>,
) -> WebResult<Response> {
    match create_account(&state, &form) {
        Ok(user_id) => {
            info!("registered user {user_id}");
            session.log_in(&state, user_id)?;
            session.flash(&state, FlashKind::Info, "Your account is ready.")?;
            Ok(Redirect::to("/").into_response())
        }
        Err(e) if e.is_user_facing() => {
            let ctx = session.page(&state)?;
            let message = validation_message(e);
            Ok(views::account::register(&ctx, &form.name, &form.email, Some(&message)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(State(state): State<SharedState>, session: CurrentSession) -> WebResult<Redirect> {
    session.log_out(&state)?;
    Ok(Redirect::to("/"))
}
