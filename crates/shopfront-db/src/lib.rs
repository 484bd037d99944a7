pub mod catalog;
pub mod database;
pub mod importer;
pub mod migrations;
pub mod orders;
pub mod session_store;
pub mod slug;
pub mod users;

pub use catalog::{Category, Page, Product, ProductInput};
pub use database::{Database, TIMESTAMP_FORMAT, open_connection, open_in_memory_connection};
pub use importer::{BUNDLED_SCHEMA, KEY_TABLES, KNOWN_TABLES, SchemaImporter};
pub use migrations::{
    MigrateReport, Migration, MigrationManager, MigrationRegistry, RollbackReport, StatusReport,
};
pub use orders::{CartLine, CheckoutDetails, DashboardStats, Order, OrderItem};
pub use session_store::{Flash, FlashKind, Session, SessionData};
pub use users::{NewUser, User};
