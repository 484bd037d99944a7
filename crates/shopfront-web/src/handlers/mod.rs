pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod shop;

use serde::Deserialize;

/// `?page=` on paginated listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

/// The message of a validation error, capitalized for display.
pub fn validation_message(error: shopfront_common::Error) -> String {
    let message = match error {
        shopfront_common::Error::Validation(message)
        | shopfront_common::Error::Conflict(message) => message,
        other => other.to_string(),
    };
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::validation_message;

    #[test]
    fn validation_messages_are_capitalized() {
        let message = validation_message(shopfront_common::Error::Validation(
            "quantity must be a whole number".into(),
        ));
        assert_eq!(message, "Quantity must be a whole number");
    }
}
