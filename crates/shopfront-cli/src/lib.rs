pub mod admin;
pub mod banner;
pub mod context;
pub mod logging;
pub mod migrate;
pub mod wizard;
