pub mod error;
mod handlers;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
mod views;

pub use error::WebError;
pub use router::build_router;
pub use server::StorefrontServer;
pub use state::{AppState, SharedState};
