use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use shopfront_common::{Error, Result};

/// `<14-digit timestamp>_<snake_case name>`
static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{14})_([a-z0-9]+(?:_[a-z0-9]+)*)$").expect("identifier pattern is valid")
});

static SNAKE_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)*$").expect("name pattern is valid"));

pub const TIMESTAMP_LEN: usize = 14;

/// The parts of a unit identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitName<'a> {
    pub timestamp: &'a str,
    pub name: &'a str,
}

impl<'a> UnitName<'a> {
    pub fn parse(identifier: &'a str) -> Option<Self> {
        let caps = IDENTIFIER_RE.captures(identifier)?;
        let timestamp = caps.get(1)?.as_str();
        let name = caps.get(2)?.as_str();
        Some(Self { timestamp, name })
    }

    /// `add_foo_column` → `AddFooColumn`.
    pub fn type_name(&self) -> String {
        pascal_case(self.name)
    }
}

pub fn is_valid_identifier(identifier: &str) -> bool {
    IDENTIFIER_RE.is_match(identifier)
}

/// Type name of the unit an identifier maps to, with the timestamp prefix
/// stripped. Returns `None` for identifiers that break the convention.
pub fn type_name(identifier: &str) -> Option<String> {
    UnitName::parse(identifier).map(|unit| unit.type_name())
}

pub fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Validate a human name given to `create`.
pub fn validate_unit_name(name: &str) -> Result<()> {
    if SNAKE_CASE_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "migration name must be snake_case (lowercase letters, digits, underscores): {name:?}"
        )))
    }
}

pub fn timestamp_prefix(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

pub fn identifier(now: DateTime<Utc>, name: &str) -> String {
    format!("{}_{name}", timestamp_prefix(now))
}
