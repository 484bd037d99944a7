//! Cookie-backed visitor sessions.
//!
//! The cookie only carries a random id; the cart, the signed-in user and the
//! pending flash message live in the `sessions` table. Every request that
//! loads a session refreshes its activity time, and a session left idle for
//! longer than the configured timeout is discarded and replaced.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shopfront_db::{FlashKind, SessionData, User};
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use tracing::{debug, info};

use crate::error::{WebError, WebResult};
use crate::state::{AppState, SharedState};
use crate::views::PageContext;

pub struct CurrentSession {
    id: String,
    pub data: SessionData,
    cookies: Cookies,
}

fn session_cookie(state: &AppState, id: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(state.config.session.cookie_name.clone(), id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    if state.config.session.secure_cookie {
        cookie.set_secure(true);
    }
    cookie
}

impl FromRequestParts<SharedState> for CurrentSession {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> WebResult<Self> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| WebError::Internal(message.to_string()))?;

        let existing = match cookies.get(&state.config.session.cookie_name) {
            Some(cookie) => state.db.load_session(cookie.value(), state.idle_timeout())?,
            None => None,
        };

        let session = match existing {
            Some(session) => {
                state.db.save_session(&session.id, &session.data)?;
                session
            }
            None => {
                let session = state.db.create_session()?;
                cookies.add(session_cookie(state, session.id.clone()));
                session
            }
        };

        Ok(Self {
            id: session.id,
            data: session.data,
            cookies,
        })
    }
}

impl CurrentSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn save(&self, state: &AppState) -> WebResult<()> {
        state.db.save_session(&self.id, &self.data)?;
        Ok(())
    }

    /// Queue a message for the next page and persist it.
    pub fn flash(&mut self, state: &AppState, kind: FlashKind, message: impl Into<String>) -> WebResult<()> {
        self.data.set_flash(kind, message);
        self.save(state)
    }

    /// The signed-in user, if the account still exists.
    pub fn user(&self, state: &AppState) -> WebResult<Option<User>> {
        match self.data.user_id {
            Some(id) => Ok(state.db.user_by_id(id)?),
            None => Ok(None),
        }
    }

    /// Layout data for a rendered page. Consumes the pending flash message.
    pub fn page(&mut self, state: &AppState) -> WebResult<PageContext> {
        let flash = self.data.take_flash();
        if flash.is_some() {
            self.save(state)?;
        }
        Ok(PageContext {
            store_name: state.config.store.name.clone(),
            currency: state.config.store.currency_symbol.clone(),
            user: self.user(state)?,
            cart_count: self.data.cart_count(),
            flash,
        })
    }

    /// Sign `user_id` in under a fresh session id, carrying the cart over.
    pub fn log_in(&mut self, state: &AppState, user_id: i64) -> WebResult<()> {
        let fresh = state.db.create_session()?;
        self.data.user_id = Some(user_id);
        state.db.save_session(&fresh.id, &self.data)?;
        state.db.delete_session(&self.id)?;

        self.cookies.add(session_cookie(state, fresh.id.clone()));
        self.id = fresh.id;
        info!("user {user_id} signed in");
        Ok(())
    }

    pub fn log_out(self, state: &AppState) -> WebResult<()> {
        state.db.delete_session(&self.id)?;
        self.cookies.remove(session_cookie(state, String::new()));
        debug!("session {} ended", self.id);
        Ok(())
    }
}

/// A signed-in visitor. Anyone else is sent to the login page.
pub struct SignedIn {
    pub user: User,
    pub session: CurrentSession,
}

/// A signed-in administrator. Anyone else is sent to the login page.
pub struct AdminUser {
    pub user: User,
    pub session: CurrentSession,
}

async fn require_user(
    parts: &mut Parts,
    state: &SharedState,
    admin: bool,
) -> WebResult<(User, CurrentSession)> {
    let session = CurrentSession::from_request_parts(parts, state).await?;
    match session.user(state)? {
        Some(user) if user.is_admin || !admin => Ok((user, session)),
        _ => Err(WebError::login_required(parts.uri.path())),
    }
}

impl FromRequestParts<SharedState> for SignedIn {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> WebResult<Self> {
        let (user, session) = require_user(parts, state, false).await?;
        Ok(Self { user, session })
    }
}

impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> WebResult<Self> {
        let (user, session) = require_user(parts, state, true).await?;
        Ok(Self { user, session })
    }
}
