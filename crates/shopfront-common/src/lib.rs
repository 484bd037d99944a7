pub mod error;
pub mod money;
pub mod order_status;

pub use error::{Error, Result};
pub use money::Money;
pub use order_status::OrderStatus;
