use std::sync::LazyLock;

use regex::Regex;
use shopfront_common::{Error, Result};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_FIELD_LEN: usize = 500;
/// Largest quantity of a single product accepted from a form.
pub const MAX_QUANTITY: u32 = 99;

/// Validation and sanitization for submitted form fields.
pub struct InputValidator;

impl InputValidator {
    /// Sanitize user input by removing control characters.
    pub fn sanitize(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect()
    }

    /// Sanitized, trimmed value of a field that must not be blank.
    pub fn required(field: &str, value: &str) -> Result<String> {
        let value = Self::sanitize(value).trim().to_string();
        if value.is_empty() {
            return Err(Error::Validation(format!("{field} is required")));
        }
        if value.chars().count() > MAX_FIELD_LEN {
            return Err(Error::Validation(format!("{field} is too long")));
        }
        Ok(value)
    }

    pub fn email(value: &str) -> Result<String> {
        let value = Self::required("email", value)?.to_lowercase();
        if !EMAIL_RE.is_match(&value) {
            return Err(Error::Validation("enter a valid email address".into()));
        }
        Ok(value)
    }

    pub fn password(value: &str) -> Result<()> {
        if value.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Parse a quantity field, accepting 1 through `MAX_QUANTITY`.
    pub fn quantity(value: &str) -> Result<u32> {
        let quantity: u32 = value
            .trim()
            .parse()
            .map_err(|_| Error::Validation("quantity must be a whole number".into()))?;
        if quantity == 0 || quantity > MAX_QUANTITY {
            return Err(Error::Validation(format!(
                "quantity must be between 1 and {MAX_QUANTITY}"
            )));
        }
        Ok(quantity)
    }

    /// Only local paths are allowed as post-login redirect targets.
    pub fn safe_redirect(target: &str) -> Option<&str> {
        let local = target.starts_with('/') && !target.starts_with("//") && !target.contains('\\');
        local.then_some(target)
    }
}
