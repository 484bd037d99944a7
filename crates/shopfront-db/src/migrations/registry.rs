use std::collections::BTreeMap;
use std::path::Path;

use shopfront_common::{Error, Result};
use tracing::debug;

use super::naming::is_valid_identifier;
use super::{Migration, SqlMigration, builtin};

/// Maps unit identifiers to executable units. Iteration follows identifier
/// order, which is timestamp order because of the fixed-width prefix.
#[derive(Default)]
pub struct MigrationRegistry {
    units: BTreeMap<String, Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the units compiled into this crate.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for unit in builtin::units() {
            registry.register(unit)?;
        }
        Ok(registry)
    }

    /// Built-in units plus every `.sql` unit found in `dir`.
    pub fn with_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin()?;
        registry.discover(dir)?;
        Ok(registry)
    }

    pub fn discover(&mut self, dir: &Path) -> Result<usize> {
        let units = SqlMigration::load_dir(dir)?;
        let count = units.len();
        for unit in units {
            self.register(Box::new(unit))?;
        }
        debug!("discovered {count} sql units in {}", dir.display());
        Ok(count)
    }

    pub fn register(&mut self, unit: Box<dyn Migration>) -> Result<()> {
        let name = unit.name().to_string();
        if !is_valid_identifier(&name) {
            return Err(Error::Migration(format!(
                "unit identifier {name:?} must be <14-digit timestamp>_<snake_case>"
            )));
        }
        if self.units.contains_key(&name) {
            return Err(Error::Migration(format!("unit {name} is registered twice")));
        }
        self.units.insert(name, unit);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Migration> {
        self.units.get(name).map(|unit| &**unit)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Identifiers in application order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> Box<dyn Migration> {
        Box::new(SqlMigration::new(name, "", ""))
    }

    #[test]
    fn names_follow_timestamp_order_not_registration_order() {
        let mut registry = MigrationRegistry::new();
        registry.register(unit("20240301000000_c")).unwrap();
        registry.register(unit("20240101000000_a")).unwrap();
        registry.register(unit("20240201000000_b")).unwrap();

        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["20240101000000_a", "20240201000000_b", "20240301000000_c"]);
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let mut registry = MigrationRegistry::new();
        registry.register(unit("20240101000000_a")).unwrap();
        let err = registry.register(unit("20240101000000_a")).unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        let mut registry = MigrationRegistry::new();
        assert!(registry.register(unit("create_users")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn builtin_units_are_registered() {
        let registry = MigrationRegistry::builtin().unwrap();
        assert!(!registry.is_empty());
        assert!(registry.contains("20240101000001_create_categories_table"));
    }

    #[test]
    fn with_dir_merges_sql_units_after_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("20990101000000_add_gift_wrap.sql"),
            "-- migrate:up\nALTER TABLE orders ADD COLUMN gift_wrap INTEGER NOT NULL DEFAULT 0;\n-- migrate:down\nALTER TABLE orders DROP COLUMN gift_wrap;\n",
        )
        .unwrap();

        let registry = MigrationRegistry::with_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), builtin::units().len() + 1);
        assert_eq!(registry.names().last(), Some("20990101000000_add_gift_wrap"));
    }
}
